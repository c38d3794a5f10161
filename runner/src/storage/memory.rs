use super::{normalize, Reader, Storage, StorageError, Writer};
use itertools::Itertools;
use parking_lot::{lock_api::ArcMutexGuard, FairMutex, RawFairMutex};
use std::{
    collections::BTreeMap,
    io::{self, Cursor, Write},
    ops::Bound,
    sync::Arc,
};
use tracing::{error, trace};

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Directory,
}

type Namespace = BTreeMap<String, Entry>;

/// In-process storage, clones share the same namespace
///
/// Used for dry runs and to simulate several nodes inside a single process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage(Arc<FairMutex<Namespace>>);

fn child_prefix(directory: &str) -> String {
    if directory == "/" {
        directory.to_owned()
    } else {
        format!("{directory}/")
    }
}

/// all keys strictly below `directory`
fn descendants<'a>(
    namespace: &'a Namespace,
    directory: &str,
) -> impl Iterator<Item = (&'a String, &'a Entry)> {
    let prefix = child_prefix(directory);

    namespace
        .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(&prefix))
}

fn ensure_parents(namespace: &mut Namespace, path: &str) -> Result<(), StorageError> {
    let mut current = String::new();
    let parts = path.split('/').filter(|part| !part.is_empty()).collect_vec();

    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(part);

        match namespace.get(&current) {
            Some(Entry::Directory) => {}
            Some(Entry::File(_)) => return Err(StorageError::NotADirectory(current)),
            None => {
                namespace.insert(current.clone(), Entry::Directory);
            }
        }
    }

    Ok(())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ArcMutexGuard<RawFairMutex, Namespace> {
        self.0.lock_arc()
    }

    fn writer(&self, path: String, buffer: Vec<u8>) -> Writer {
        Box::new(MemoryWriter {
            namespace: Arc::clone(&self.0),
            path,
            buffer,
        })
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize(path);

        Ok(path == "/" || self.lock().contains_key(&path))
    }

    fn create(&self, path: &str) -> Result<Writer, StorageError> {
        let path = normalize(path);
        let mut namespace = self.lock();

        if path == "/" || matches!(namespace.get(&path), Some(Entry::Directory)) {
            return Err(StorageError::IsDirectory(path));
        }

        ensure_parents(&mut namespace, &path)?;
        namespace.insert(path.clone(), Entry::File(Vec::new()));
        trace!(path = %path, "Created file");
        drop(namespace);

        Ok(self.writer(path, Vec::new()))
    }

    fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        let path = normalize(path);
        let mut namespace = self.lock();

        let is_root = path == "/";
        let is_directory = match namespace.get(&path) {
            Some(Entry::Directory) => true,
            Some(Entry::File(_)) => false,
            None if is_root => true,
            None => return Ok(false),
        };

        if is_directory {
            let children = descendants(&namespace, &path)
                .map(|(key, _)| key.clone())
                .collect_vec();

            if !children.is_empty() && !recursive {
                return Err(StorageError::NotEmpty(path));
            }
            for child in children {
                namespace.remove(&child);
            }
        }

        Ok(namespace.remove(&path).is_some() || is_root)
    }

    fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let path = normalize(path);
        let prefix = child_prefix(&path);
        let namespace = self.lock();

        Ok(descendants(&namespace, &path)
            .map(|(key, _)| key)
            .filter(|key| !key[prefix.len()..].contains('/'))
            .cloned()
            .collect_vec())
    }

    fn mkdirs(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path);

        if path == "/" {
            return Ok(());
        }

        let mut namespace = self.lock();
        ensure_parents(&mut namespace, &path)?;

        match namespace.get(&path) {
            Some(Entry::File(_)) => Err(StorageError::NotADirectory(path)),
            Some(Entry::Directory) => Ok(()),
            None => {
                namespace.insert(path, Entry::Directory);

                Ok(())
            }
        }
    }

    fn open_read(&self, path: &str) -> Result<Reader, StorageError> {
        let path = normalize(path);

        match self.lock().get(&path) {
            Some(Entry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(Entry::Directory) => Err(StorageError::IsDirectory(path)),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn open_write(&self, path: &str) -> Result<Writer, StorageError> {
        let path = normalize(path);
        let content = match self.lock().get(&path) {
            Some(Entry::File(content)) => content.clone(),
            Some(Entry::Directory) => return Err(StorageError::IsDirectory(path)),
            None => return Err(StorageError::NotFound(path)),
        };

        Ok(self.writer(path, content))
    }
}

/// Buffers writes and publishes the full content on flush and on drop
#[derive(Debug)]
struct MemoryWriter {
    namespace: Arc<FairMutex<Namespace>>,
    path: String,
    buffer: Vec<u8>,
}

impl MemoryWriter {
    fn publish(&self) -> io::Result<()> {
        let mut namespace = self.namespace.lock();

        match namespace.get(&self.path) {
            Some(Entry::Directory) => Err(io::Error::new(
                io::ErrorKind::Other,
                StorageError::IsDirectory(self.path.clone()),
            )),
            // a concurrent delete wins, the file stays gone
            None => Ok(()),
            Some(Entry::File(_)) => {
                namespace.insert(self.path.clone(), Entry::File(self.buffer.clone()));

                Ok(())
            }
        }
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish()
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if let Err(error) = self.publish() {
            error!(error = ?error, path = %self.path, "Failed to publish file content");
        }
    }
}
