use super::{join, normalize, Reader, Storage, StorageError, Writer};
use itertools::Itertools;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};
use tracing::trace;

/// Storage backed by a directory, usually on a filesystem mounted on every node (NFS, Lustre,
/// BeeGFS, ...)
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

fn map_io(path: &str, error: io::Error) -> StorageError {
    match error.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(path.to_owned()),
        _ => StorageError::Io(error),
    }
}

impl LocalStorage {
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(root)?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path).trim_start_matches('/'))
    }
}

impl Storage for LocalStorage {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match fs::metadata(self.resolve(path)) {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    fn create(&self, path: &str) -> Result<Writer, StorageError> {
        let target = self.resolve(path);

        if target.is_dir() {
            return Err(StorageError::IsDirectory(path.to_owned()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|error| map_io(path, error))?;
        }

        trace!(path = path, "Creating file");
        let file = File::create(&target).map_err(|error| map_io(path, error))?;

        Ok(Box::new(BufWriter::new(file)))
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        let target = self.resolve(path);
        let metadata = match fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(error) => return Err(error.into()),
        };

        let result = if !metadata.is_dir() {
            fs::remove_file(&target)
        } else if recursive {
            fs::remove_dir_all(&target)
        } else {
            if fs::read_dir(&target)?.next().is_some() {
                return Err(StorageError::NotEmpty(path.to_owned()));
            }
            fs::remove_dir(&target)
        };

        match result {
            Ok(()) => Ok(true),
            // lost a race against another node deleting the same path
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let target = self.resolve(path);
        let entries = match fs::read_dir(&target) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        let parent = normalize(path);

        entries
            .map(|entry| entry.map(|entry| join(&parent, &entry.file_name().to_string_lossy())))
            .collect::<Result<Vec<_>, io::Error>>()
            .map(|children| children.into_iter().sorted().collect_vec())
            .map_err(StorageError::from)
    }

    fn mkdirs(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path);

        if target.is_file() {
            return Err(StorageError::NotADirectory(path.to_owned()));
        }

        fs::create_dir_all(target).map_err(|error| map_io(path, error))
    }

    fn open_read(&self, path: &str) -> Result<Reader, StorageError> {
        let target = self.resolve(path);

        if target.is_dir() {
            return Err(StorageError::IsDirectory(path.to_owned()));
        }

        let file = File::open(target).map_err(|error| map_io(path, error))?;

        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> Result<Writer, StorageError> {
        let file = OpenOptions::new()
            .append(true)
            .open(self.resolve(path))
            .map_err(|error| map_io(path, error))?;

        Ok(Box::new(BufWriter::new(file)))
    }
}
