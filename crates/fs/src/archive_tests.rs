// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{test_fs, test_fs_with_quota, FsError};
use std::io::Write;

fn make_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("server.properties", b"motd=hi\n").unwrap();
    fs.write_file("world/level.dat", b"nbt").unwrap();

    let archive = fs.archive_to(Vec::new(), None).unwrap();

    let dest_dir = tempfile::tempdir().unwrap();
    let dest = test_fs(dest_dir.path());
    dest.extract_archive(archive.as_slice()).unwrap();

    assert_eq!(dest.read_file("server.properties").unwrap(), b"motd=hi\n");
    assert_eq!(dest.read_file("world/level.dat").unwrap(), b"nbt");
}

#[test]
fn ignore_file_filters_backup_set() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("keep.txt", b"keep").unwrap();
    fs.write_file("cache/tmp.bin", b"drop").unwrap();
    fs.write_file(".pteroignore", b"cache/\n").unwrap();

    let archive = fs.archive_to(Vec::new(), None).unwrap();

    let dest_dir = tempfile::tempdir().unwrap();
    let dest = test_fs(dest_dir.path());
    dest.extract_archive(archive.as_slice()).unwrap();
    assert!(dest.root().join("keep.txt").exists());
    assert!(!dest.root().join("cache").exists());
}

#[test]
fn caller_rules_apply_on_top_of_ignore_file() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    fs.write_file("logs/latest.log", b"log").unwrap();
    fs.write_file("data.db", b"db").unwrap();

    let archive = fs.archive_to(Vec::new(), Some("*.log\n")).unwrap();

    let dest_dir = tempfile::tempdir().unwrap();
    let dest = test_fs(dest_dir.path());
    dest.extract_archive(archive.as_slice()).unwrap();
    assert!(dest.root().join("data.db").exists());
    assert!(!dest.root().join("logs/latest.log").exists());
}

#[test]
fn uncompressed_size_sums_entries() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    let archive = make_tar_gz(&[("a.bin", &[0u8; 300]), ("b.bin", &[0u8; 700])]);
    assert_eq!(fs.archive_uncompressed_size(archive.as_slice()).unwrap(), 1000);
}

#[test]
fn decompression_bomb_is_refused_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs_with_quota(dir.path(), 1024);
    // 900 bytes already used, archive declares 500 more
    fs.write_file("existing.bin", &[0u8; 900]).unwrap();
    let bomb = make_tar_gz(&[("payload.bin", &[0u8; 500])]);
    fs.write_file("bomb.tar.gz", &bomb).unwrap();

    let err = fs.decompress_file("bomb.tar.gz").unwrap_err();
    assert!(err.is_quota());
    assert!(!fs.root().join("payload.bin").exists());
}

#[test]
fn zip_slip_entries_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    let evil = make_tar_gz(&[("../../outside.txt", b"escape")]);

    // `..` components are clamped to the root rather than escaping
    fs.extract_archive(evil.as_slice()).unwrap();
    assert!(fs.root().join("outside.txt").exists());
    assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
}

#[test]
fn corrupt_archive_reports_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    let garbage = b"definitely not a tarball";
    let err = fs.archive_uncompressed_size(&garbage[..]).unwrap_err();
    assert!(matches!(err, FsError::ArchiveFormat(_)));
}
