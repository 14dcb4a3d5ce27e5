// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{test_fs, FsError};
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    plain = { "server.properties", "server.properties" },
    nested = { "configs/bukkit.yml", "configs/bukkit.yml" },
    dot_segments = { "./configs/../configs/./bukkit.yml", "configs/bukkit.yml" },
    leading_slash = { "/configs/bukkit.yml", "configs/bukkit.yml" },
    climb_clamped = { "../../../../etc/passwd", "etc/passwd" },
)]
fn cleaning_stays_inside_root(input: &str, expected_rel: &str) {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    let resolved = fs.safe_path(input).unwrap();
    assert_eq!(resolved, fs.root().join(expected_rel));
}

#[test]
fn absolute_root_prefix_is_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());
    let inside = fs.root().join("data/level.dat");
    assert_eq!(fs.safe_path(&inside).unwrap(), inside);
}

#[test]
fn symlink_escape_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());

    std::os::unix::fs::symlink(outside.path(), fs.root().join("evil")).unwrap();

    let err = fs.safe_path("evil/target.txt").unwrap_err();
    assert!(matches!(err, FsError::PathEscape(_)), "got {err:?}");
}

#[test]
fn symlink_inside_root_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());

    std::fs::create_dir(fs.root().join("real")).unwrap();
    std::os::unix::fs::symlink(fs.root().join("real"), fs.root().join("alias")).unwrap();

    let resolved = fs.safe_path("alias/file.txt").unwrap();
    assert_eq!(resolved, fs.root().join("real/file.txt"));
}

#[test]
fn nonexistent_tail_resolves_through_existing_parent() {
    let dir = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());

    let resolved = fs.safe_path("brand/new/tree/file.txt").unwrap();
    assert_eq!(resolved, fs.root().join("brand/new/tree/file.txt"));
}

#[test]
fn unresolved_path_keeps_symlink_itself() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let fs = test_fs(dir.path());

    std::os::unix::fs::symlink(outside.path(), fs.root().join("evil")).unwrap();

    // The symlink entry itself is addressable (so it can be deleted)…
    let unresolved = fs.unresolved_path("evil").unwrap();
    assert_eq!(unresolved, fs.root().join("evil"));

    // …but anything under it still may not resolve through it.
    assert!(fs.safe_path("evil/x").is_err());
}

proptest! {
    /// No combination of `..`, `.`, separators, and names may escape.
    #[test]
    fn fuzzed_traversal_never_escapes(parts in prop::collection::vec("[a-z.]{1,8}|\\.\\.|\\.", 1..8)) {
        let dir = tempfile::tempdir().unwrap();
        let fs = test_fs(dir.path());
        let candidate = parts.join("/");
        if let Ok(resolved) = fs.safe_path(&candidate) {
            prop_assert!(resolved.starts_with(fs.root()));
        }
    }
}
