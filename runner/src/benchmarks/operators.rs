use crate::storage::{Storage, StorageError};
use rand::Rng;
use std::io::{ErrorKind, Read, Write};

/// Write `length` bytes to a new file in chunks of `buffer_size`, returns the bytes written
pub fn write_single_file(
    storage: &dyn Storage,
    path: &str,
    length: u64,
    buffer_size: usize,
) -> Result<u64, StorageError> {
    let mut writer = storage.create(path)?;
    let buffer = (0..buffer_size.max(1))
        .map(|index| (index % 251) as u8)
        .collect::<Vec<_>>();
    let mut remaining = length;

    while remaining > 0 {
        let chunk = remaining.min(buffer.len() as u64) as usize;
        writer.write_all(&buffer[..chunk])?;
        remaining -= chunk as u64;
    }
    writer.flush()?;

    Ok(length)
}

/// Read a whole file in chunks of `buffer_size`, returns the bytes read
pub fn read_single_file(
    storage: &dyn Storage,
    path: &str,
    buffer_size: usize,
) -> Result<u64, StorageError> {
    let mut reader = storage.open_read(path)?;
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => total += read as u64,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }

    Ok(total)
}

/// `count` files drawn uniformly (with replacement) from `candidates`
pub fn random_read_list<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    candidates: &[String],
) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }

    (0..count)
        .map(|_| candidates[rng.gen_range(0..candidates.len())].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn write_then_read_counts_bytes() {
        let storage = MemoryStorage::new();

        assert_eq!(
            write_single_file(&storage, "/data/0/1-0-0", 10_000, 4096).unwrap(),
            10_000
        );
        assert_eq!(read_single_file(&storage, "/data/0/1-0-0", 333).unwrap(), 10_000);
    }

    #[test]
    fn empty_file() {
        let storage = MemoryStorage::new();

        write_single_file(&storage, "/empty", 0, 16).unwrap();
        assert!(storage.exists("/empty").unwrap());
        assert_eq!(read_single_file(&storage, "/empty", 16).unwrap(), 0);
    }

    #[test]
    fn reading_missing_file_fails() {
        let storage = MemoryStorage::new();

        assert!(matches!(
            read_single_file(&storage, "/missing", 16),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn random_list_draws_from_candidates() {
        let mut rng = rand::thread_rng();
        let candidates = vec!["/a".to_owned(), "/b".to_owned()];

        let list = random_read_list(&mut rng, 10, &candidates);
        assert_eq!(list.len(), 10);
        assert!(list.iter().all(|path| candidates.contains(path)));

        assert!(random_read_list(&mut rng, 10, &[]).is_empty());
    }
}
