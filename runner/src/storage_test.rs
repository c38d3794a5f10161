use crate::{
    config::StorageConfig,
    storage::{self, join, local::LocalStorage, memory::MemoryStorage, normalize, Storage, StorageError},
};
use std::io::{Read, Write};

fn read_all(storage: &dyn Storage, path: &str) -> Vec<u8> {
    let mut content = Vec::new();
    storage
        .open_read(path)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();

    content
}

fn check_files(storage: &dyn Storage) {
    assert!(!storage.exists("/work/a").unwrap());

    let mut writer = storage.create("/work/a").unwrap();
    writer.write_all(b"hello").unwrap();
    writer.flush().unwrap();
    drop(writer);

    // parents are created implicitly
    assert!(storage.exists("/work").unwrap());
    assert!(storage.exists("/work/a").unwrap());
    assert_eq!(read_all(storage, "/work/a"), b"hello");

    let mut writer = storage.open_write("/work/a").unwrap();
    writer.write_all(b" world").unwrap();
    writer.flush().unwrap();
    drop(writer);
    assert_eq!(read_all(storage, "/work/a"), b"hello world");

    // create truncates
    storage.create_empty("/work/a").unwrap();
    assert!(read_all(storage, "/work/a").is_empty());

    assert!(matches!(
        storage.open_read("/work/missing"),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.open_write("/work/missing"),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.create("/work"),
        Err(StorageError::IsDirectory(_))
    ));
}

fn check_directories(storage: &dyn Storage) {
    storage.mkdirs("/sync/0").unwrap();
    storage.mkdirs("/sync/0").unwrap();
    assert!(storage.list("/sync/0").unwrap().is_empty());
    assert!(storage.list("/sync/never").unwrap().is_empty());

    for token in ["1-1", "0-1", "0-0"] {
        storage.create_empty(&join("/sync/0", token)).unwrap();
    }
    storage.create_empty("/sync/0/nested/deeper").unwrap();

    assert_eq!(
        storage.list("/sync/0").unwrap(),
        vec!["/sync/0/0-0", "/sync/0/0-1", "/sync/0/1-1", "/sync/0/nested"]
    );

    assert!(matches!(
        storage.delete("/sync/0", false),
        Err(StorageError::NotEmpty(_))
    ));
    assert!(storage.delete("/sync/0/0-0", false).unwrap());
    assert!(!storage.delete("/sync/0/0-0", false).unwrap());

    assert!(storage.delete("/sync", true).unwrap());
    assert!(!storage.exists("/sync/0/1-1").unwrap());
    assert!(!storage.exists("/sync").unwrap());
    assert!(!storage.delete("/sync", true).unwrap());

    storage.create_empty("/file").unwrap();
    assert!(matches!(
        storage.mkdirs("/file"),
        Err(StorageError::NotADirectory(_))
    ));
}

#[test]
pub fn memory_files() {
    check_files(&MemoryStorage::new());
}

#[test]
pub fn memory_directories() {
    check_directories(&MemoryStorage::new());
}

#[test]
pub fn local_files() {
    let root = tempfile::tempdir().unwrap();

    check_files(&LocalStorage::open(root.path()).unwrap());
}

#[test]
pub fn local_directories() {
    let root = tempfile::tempdir().unwrap();

    check_directories(&LocalStorage::open(root.path()).unwrap());
}

#[test]
pub fn local_storage_stays_below_root() {
    let root = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(&root.path().join("nested")).unwrap();

    storage.create_empty("/a/b").unwrap();
    assert!(root.path().join("nested/a/b").is_file());
}

#[test]
pub fn local_storage_rejects_escaping_the_root() {
    let parent = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(&parent.path().join("root")).unwrap();

    storage.create_empty("/../x").unwrap();
    storage.mkdirs("../../work/../sync").unwrap();

    assert!(parent.path().join("root/x").is_file());
    assert!(parent.path().join("root/sync").is_dir());
    assert!(!parent.path().join("x").exists());
    assert!(!parent.path().join("sync").exists());
    assert_eq!(storage.list("/..").unwrap(), vec!["/sync", "/x"]);
}

#[test]
pub fn memory_clones_share_the_namespace() {
    let first = MemoryStorage::new();
    let second = first.clone();

    first.create_empty("/shared").unwrap();
    assert!(second.exists("/shared").unwrap());
    assert!(second.delete("/shared", false).unwrap());
    assert!(!first.exists("/shared").unwrap());
}

#[test]
pub fn memory_delete_wins_over_open_writer() {
    let storage = MemoryStorage::new();

    let mut writer = storage.create("/racy").unwrap();
    storage.delete("/racy", false).unwrap();
    writer.write_all(b"late").unwrap();
    drop(writer);

    assert!(!storage.exists("/racy").unwrap());
}

#[test]
pub fn load_backends() {
    let root = tempfile::tempdir().unwrap();

    let local = storage::load(&StorageConfig::Local {
        root: root.path().to_path_buf(),
    })
    .unwrap();
    local.create_empty("/x").unwrap();
    assert!(root.path().join("x").exists());

    let memory = storage::load(&StorageConfig::Memory).unwrap();
    assert!(!memory.exists("/x").unwrap());
}

#[test]
pub fn paths() {
    assert_eq!(normalize("a//b/"), "/a/b");
    assert_eq!(normalize("/"), "/");
    assert_eq!(normalize(""), "/");
    assert_eq!(normalize("/a/./b/../c"), "/a/c");
    assert_eq!(normalize("/../x"), "/x");
    assert_eq!(normalize("a/../../../b"), "/b");
    assert_eq!(join("/work/", "/sync"), "/work/sync");
    assert_eq!(join("/work", "0"), "/work/0");
}
