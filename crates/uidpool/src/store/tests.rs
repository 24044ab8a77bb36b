use crate::{Error, FileStore, Store, testing::TempDir};
use std::fs;

use super::file::parse_record;

#[test]
fn initialize_creates_missing_file() {
    let dir = TempDir::new("store-create");
    let path = dir.join("last-used-id.txt");
    assert!(!path.exists());

    let mut store = FileStore::new(&path);
    assert_eq!(store.initialize().unwrap(), None);
    assert!(path.exists());
    assert_eq!(fs::read(&path).unwrap(), b"");
}

#[cfg(unix)]
#[test]
fn initialize_resets_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new("store-chmod");
    let path = dir.join("last-used-id.txt");
    fs::write(&path, "7").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    FileStore::new(&path).initialize().unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[cfg(unix)]
#[test]
fn initialize_repairs_read_only_record() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new("store-readonly");
    let path = dir.join("last-used-id.txt");
    fs::write(&path, "7").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

    let mut store = FileStore::new(&path);
    assert_eq!(store.initialize().unwrap(), Some(7));

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);

    store.persist(8).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "8");
}

#[test]
fn initialize_reads_last_issued() {
    let dir = TempDir::new("store-read");
    let path = dir.join("last-used-id.txt");
    fs::write(&path, "123").unwrap();

    assert_eq!(FileStore::new(&path).initialize().unwrap(), Some(123));
}

#[test]
fn initialize_tolerates_trailing_newline() {
    let dir = TempDir::new("store-newline");
    let path = dir.join("last-used-id.txt");
    fs::write(&path, "123\n").unwrap();

    assert_eq!(FileStore::new(&path).initialize().unwrap(), Some(123));
}

#[test]
fn initialize_rejects_corrupted_contents() {
    let dir = TempDir::new("store-corrupt");
    let path = dir.join("last-used-id.txt");
    fs::write(&path, "not-a-uint64").unwrap();

    let err = FileStore::new(&path).initialize().unwrap_err();
    assert!(err.is_fatal());
    match err {
        Error::Corrupted { contents, .. } => assert_eq!(contents, "not-a-uint64"),
        other => panic!("unexpected error: {other:?}"),
    }
    // Corruption is reported, never repaired.
    assert_eq!(fs::read(&path).unwrap(), b"not-a-uint64");
}

#[test]
fn initialize_fails_when_parent_is_missing() {
    let dir = TempDir::new("store-noparent");
    let path = dir.join("missing").join("last-used-id.txt");

    let err = FileStore::new(&path).initialize().unwrap_err();
    assert!(matches!(err, Error::StoreInit { .. }));
    assert!(err.is_fatal());
}

#[test]
fn persist_overwrites_instead_of_appending() {
    let dir = TempDir::new("store-overwrite");
    let path = dir.join("last-used-id.txt");
    let mut store = FileStore::new(&path);
    store.initialize().unwrap();

    store.persist(100).unwrap();
    store.persist(99).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "99");
    assert!(!dir.join("last-used-id.txt.tmp").exists());
    assert_eq!(FileStore::new(&path).initialize().unwrap(), Some(99));
}

#[test]
fn persist_without_sync_still_replaces_record() {
    let dir = TempDir::new("store-nosync");
    let path = dir.join("last-used-id.txt");
    let mut store = FileStore::new(&path).with_sync(false);
    store.initialize().unwrap();

    store.persist(5).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "5");
}

#[test]
fn persist_reports_io_failure() {
    let dir = TempDir::new("store-persist-fail");
    let sub = dir.join("state");
    fs::create_dir(&sub).unwrap();
    let mut store = FileStore::new(sub.join("last-used-id.txt"));
    store.initialize().unwrap();

    fs::remove_dir_all(&sub).unwrap();

    let err = store.persist(1).unwrap_err();
    assert!(matches!(err, Error::Persist { id: 1, .. }));
    assert!(!err.is_fatal());
}

#[test]
fn parse_record_accepts_only_plain_decimal() {
    let path = std::path::Path::new("record");

    assert_eq!(parse_record(path, b"").unwrap(), None);
    assert_eq!(parse_record(path, b" \n").unwrap(), None);
    assert_eq!(parse_record(path, b"0").unwrap(), Some(0));
    assert_eq!(
        parse_record(path, b"18446744073709551615").unwrap(),
        Some(u64::MAX)
    );

    for bad in [
        &b"+1"[..],
        b"-1",
        b"0x10",
        b"1 2",
        b"18446744073709551616",
        b"\xff\xfe",
    ] {
        assert!(
            matches!(parse_record(path, bad), Err(Error::Corrupted { .. })),
            "{bad:?} should be rejected"
        );
    }
}
