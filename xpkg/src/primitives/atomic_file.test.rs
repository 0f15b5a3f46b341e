use std::fs;

use tempfile::tempdir;

use super::*;
use crate::internal::test_utils::assert;

#[test]
fn commit_renames_temp_file_into_place() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("pkgdb.json");

    let mut f = AtomicFile::create(&dest).unwrap();
    f.write_all(b"hello").unwrap();
    f.commit().unwrap();

    assert!(fs::read(&dest).unwrap() == b"hello");
}

#[test]
fn drop_without_commit_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("pkgdb.json");

    {
        let mut f = AtomicFile::create(&dest).unwrap();
        f.write_all(b"hello").unwrap();
    }

    let leftover: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftover.is_empty());
    assert!(!dest.exists());
}

#[test]
fn commit_overwrites_existing_destination() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("pkgdb.json");
    fs::write(&dest, b"old").unwrap();

    let mut f = AtomicFile::create(&dest).unwrap();
    f.write_all(b"new").unwrap();
    f.commit().unwrap();

    assert!(fs::read(&dest).unwrap() == b"new");
}
