// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safe path resolution.
//!
//! Resolution rule: clean the user path relative to the root, resolve
//! symlinks along every component that exists, and require the result
//! to stay inside the root. For a path whose tail does not exist yet,
//! the nearest existing ancestor is resolved and the remaining
//! components are appended lexically.

use crate::{Filesystem, FsError};
use std::io;
use std::path::{Component, Path, PathBuf};

impl Filesystem {
    /// Resolve a user-supplied path to a location inside the root.
    ///
    /// Symlinks are followed; escaping ones fail with
    /// [`FsError::PathEscape`].
    pub fn safe_path(&self, user: impl AsRef<Path>) -> Result<PathBuf, FsError> {
        let cleaned = self.clean_path(user.as_ref());
        self.resolve_inside_root(&cleaned)
    }

    /// Clean a user path without resolving symlinks.
    ///
    /// Operations that must not write *through* a symlink (delete,
    /// chown) act on this path after validating that its parent
    /// resolves inside the root.
    pub fn unresolved_path(&self, user: impl AsRef<Path>) -> Result<PathBuf, FsError> {
        let cleaned = self.clean_path(user.as_ref());
        if let Some(parent) = cleaned.parent() {
            self.resolve_inside_root(parent)?;
        }
        Ok(cleaned)
    }

    /// Lexically normalize `user` against the root: strip an absolute
    /// root prefix, drop `.`, and clamp `..` so it never climbs above
    /// the root.
    fn clean_path(&self, user: &Path) -> PathBuf {
        let root = self.root();
        let relative = user.strip_prefix(root).unwrap_or(user);

        let mut cleaned = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => cleaned.push(part),
                Component::ParentDir => {
                    cleaned.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        root.join(cleaned)
    }

    /// Resolve symlinks along `cleaned` and verify the result stays
    /// inside the root.
    fn resolve_inside_root(&self, cleaned: &Path) -> Result<PathBuf, FsError> {
        let root = self.root();

        let mut probe = cleaned.to_path_buf();
        let mut tail: Vec<std::ffi::OsString> = Vec::new();
        let resolved_base = loop {
            match probe.canonicalize() {
                Ok(resolved) => break resolved,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    let Some(name) = probe.file_name() else {
                        return Err(FsError::PathEscape(cleaned.to_path_buf()));
                    };
                    tail.push(name.to_os_string());
                    let Some(parent) = probe.parent() else {
                        return Err(FsError::PathEscape(cleaned.to_path_buf()));
                    };
                    probe = parent.to_path_buf();
                }
                Err(err) => return Err(err.into()),
            }
        };

        let mut resolved = resolved_base;
        for name in tail.into_iter().rev() {
            resolved.push(name);
        }

        if resolved == *root || resolved.starts_with(root) {
            Ok(resolved)
        } else {
            Err(FsError::PathEscape(cleaned.to_path_buf()))
        }
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
