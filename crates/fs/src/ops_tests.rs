// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{test_fs, test_fs_with_quota, FsError};

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());

    fs.write_file("configs/server.properties", b"server-port=25565\n").unwrap();
    let contents = fs.read_file("configs/server.properties").unwrap();
    assert_eq!(contents, b"server-port=25565\n");
}

#[test]
fn read_rejects_directory() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.create_directory("plugins").unwrap();

    let err = fs.read_file("plugins").unwrap_err();
    assert!(matches!(err, FsError::IsDirectory(_)));
}

#[test]
fn write_outside_root_is_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    std::os::unix::fs::symlink(outside.path(), fs.root().join("link")).unwrap();

    let err = fs.write_file("link/escape.txt", b"nope").unwrap_err();
    assert!(err.is_path_escape());
    assert!(!outside.path().join("escape.txt").exists());
}

#[test]
fn write_enforces_quota() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs_with_quota(dir.path(), 8);
    fs.refresh_usage().unwrap();

    let err = fs.write_file("big.bin", &[0u8; 64]).unwrap_err();
    assert!(err.is_quota());
}

#[test]
fn overwrite_counts_only_the_delta() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs_with_quota(dir.path(), 100);
    fs.refresh_usage().unwrap();

    fs.write_file("grow.txt", &[b'a'; 80]).unwrap();
    // same file rewritten at 90 bytes only needs 10 more
    fs.write_file("grow.txt", &[b'b'; 90]).unwrap();
    assert_eq!(fs.cached_usage(), 90);
}

#[test]
fn list_sorts_directories_first_then_alphabetic() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("banana.txt", b"x").unwrap();
    fs.write_file("apple.txt", b"x").unwrap();
    fs.create_directory("zoo").unwrap();
    fs.create_directory("bar").unwrap();

    let names: Vec<String> =
        fs.list_directory("/").unwrap().into_iter().map(|e| e.stat.name).collect();
    assert_eq!(names, vec!["bar", "zoo", "apple.txt", "banana.txt"]);
}

#[test]
fn stat_reports_mime_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("motd.txt", b"hello world").unwrap();

    let stat = fs.stat("motd.txt").unwrap();
    assert_eq!(stat.size, 11);
    assert!(!stat.directory);
    assert_eq!(stat.mime, "text/plain");
}

#[test]
fn rename_refuses_overwrite_and_creates_parent() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("a.txt", b"a").unwrap();
    fs.write_file("b.txt", b"b").unwrap();

    let err = fs.rename("a.txt", "b.txt").unwrap_err();
    assert!(matches!(err, FsError::DestinationExists(_)));

    fs.rename("a.txt", "deep/nested/a.txt").unwrap();
    assert!(fs.root().join("deep/nested/a.txt").exists());
    assert!(!fs.root().join("a.txt").exists());
}

#[test]
fn copy_suffixes_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("map.dat", b"level").unwrap();

    assert_eq!(fs.copy_file("map.dat").unwrap(), "map copy.dat");
    assert_eq!(fs.copy_file("map.dat").unwrap(), "map copy 2.dat");
    assert_eq!(fs.copy_file("map.dat").unwrap(), "map copy 3.dat");
}

#[test]
fn delete_refuses_root_but_removes_trees() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("world/region/r.0.0.mca", b"chunk").unwrap();

    assert!(matches!(fs.delete("/").unwrap_err(), FsError::DeleteRoot));
    fs.delete("world").unwrap();
    assert!(!fs.root().join("world").exists());
}

#[test]
fn delete_removes_symlink_entry_not_target() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let victim = outside.path().join("keep.txt");
    std::fs::write(&victim, b"keep me").unwrap();

    let fs = test_fs(dir.path());
    std::os::unix::fs::symlink(&victim, fs.root().join("link.txt")).unwrap();

    fs.delete("link.txt").unwrap();
    assert!(victim.exists(), "delete must not follow the symlink");
    assert!(std::fs::symlink_metadata(fs.root().join("link.txt")).is_err());
}

#[test]
fn delete_updates_disk_cache() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("junk.bin", &[0u8; 512]).unwrap();
    assert_eq!(fs.cached_usage(), 512);

    fs.delete("junk.bin").unwrap();
    assert_eq!(fs.cached_usage(), 0);
}
