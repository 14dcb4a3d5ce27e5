// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File operations against the instance root.

use crate::{Filesystem, FsError};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum numbered ` copy N` suffix before falling back to a timestamp.
const MAX_COPY_SUFFIX: u32 = 50;

/// Stat result for a single path.
#[derive(Debug, Clone, Serialize)]
pub struct FileStat {
    pub name: String,
    pub size: u64,
    /// Unix permission bits.
    pub mode: u32,
    /// Seconds since the epoch.
    pub modified: i64,
    pub created: i64,
    pub directory: bool,
    pub mime: String,
}

/// One entry in a directory listing.
#[derive(Debug, Clone, Serialize)]
pub struct DirEntryInfo {
    #[serde(flatten)]
    pub stat: FileStat,
    pub symlink: bool,
}

impl Filesystem {
    /// Read an entire file. Directories are rejected.
    pub fn read_file(&self, user: impl AsRef<Path>) -> Result<Vec<u8>, FsError> {
        let path = self.safe_path(user)?;
        let meta = fs::metadata(&path)?;
        if meta.is_dir() {
            return Err(FsError::IsDirectory(path));
        }
        let mut file = open_with_busy_retry(&path, OpenOptions::new().read(true))?;
        let mut buf = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write a file, truncating any existing content.
    ///
    /// Parent directories are created and the file is chowned to the
    /// configured uid/gid. The disk cache is adjusted by the size delta
    /// and the quota is enforced before any byte is written.
    pub fn write_file(&self, user: impl AsRef<Path>, contents: &[u8]) -> Result<(), FsError> {
        let path = self.safe_path(user)?;
        if path == self.root() {
            return Err(FsError::IsDirectory(path));
        }
        if let Ok(meta) = fs::metadata(&path) {
            if meta.is_dir() {
                return Err(FsError::IsDirectory(path));
            }
        }

        let previous = fs::symlink_metadata(&path).map(|m| m.len() as i64).unwrap_or(0);
        let delta = contents.len() as i64 - previous;
        if !self.has_space_for(delta) {
            return Err(FsError::NotEnoughDiskSpace);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = open_with_busy_retry(
            &path,
            OpenOptions::new().create(true).write(true).truncate(true),
        )?;
        file.write_all(contents)?;
        drop(file);

        self.add_usage(delta);
        self.chown_entry(&path);
        Ok(())
    }

    /// Stat a file or directory, sniffing the MIME type.
    pub fn stat(&self, user: impl AsRef<Path>) -> Result<FileStat, FsError> {
        let path = self.safe_path(user)?;
        let meta = fs::metadata(&path)?;
        Ok(stat_from(&path, &meta))
    }

    /// List a directory: entries sorted directories-first, then by
    /// name; MIME sniffing runs across worker threads.
    pub fn list_directory(&self, user: impl AsRef<Path>) -> Result<Vec<DirEntryInfo>, FsError> {
        let path = self.safe_path(user)?;

        let mut names: Vec<(PathBuf, bool)> = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let symlink = entry.file_type()?.is_symlink();
            names.push((entry.path(), symlink));
        }

        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let chunk = names.len().div_ceil(workers.max(1)).max(1);
        let mut listed: Vec<DirEntryInfo> = std::thread::scope(|scope| {
            let handles: Vec<_> = names
                .chunks(chunk)
                .map(|batch| {
                    scope.spawn(move || {
                        batch
                            .iter()
                            .filter_map(|(entry_path, symlink)| {
                                let meta = fs::metadata(entry_path)
                                    .or_else(|_| fs::symlink_metadata(entry_path))
                                    .ok()?;
                                Some(DirEntryInfo {
                                    stat: stat_from(entry_path, &meta),
                                    symlink: *symlink,
                                })
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap_or_default()).collect()
        });

        listed.sort_by(|a, b| {
            b.stat
                .directory
                .cmp(&a.stat.directory)
                .then_with(|| a.stat.name.to_lowercase().cmp(&b.stat.name.to_lowercase()))
        });
        Ok(listed)
    }

    /// Create a directory (and any missing parents).
    pub fn create_directory(&self, user: impl AsRef<Path>) -> Result<(), FsError> {
        let path = self.safe_path(user)?;
        fs::create_dir_all(&path)?;
        self.chown_entry(&path);
        Ok(())
    }

    /// Rename without overwriting; the target parent is created.
    pub fn rename(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<(), FsError> {
        let source = self.safe_path(from)?;
        let target = self.unresolved_path(to)?;
        if source == *self.root() || target == *self.root() {
            return Err(FsError::DeleteRoot);
        }
        if fs::symlink_metadata(&target).is_ok() {
            return Err(FsError::DestinationExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &target)?;
        Ok(())
    }

    /// Chown the whole tree under `user` to the configured uid/gid.
    ///
    /// Symlinks are never followed; the entries themselves are skipped.
    pub fn chown_recursive(&self, user: impl AsRef<Path>) -> Result<(), FsError> {
        let path = self.unresolved_path(user)?;
        self.chown_tree(&path)?;
        Ok(())
    }

    /// Copy a file next to itself with a ` copy` suffix.
    ///
    /// Returns the new relative name.
    pub fn copy_file(&self, user: impl AsRef<Path>) -> Result<String, FsError> {
        let source = self.safe_path(user)?;
        let meta = fs::metadata(&source)?;
        if meta.is_dir() {
            return Err(FsError::IsDirectory(source));
        }
        if !self.has_space_for(meta.len() as i64) {
            return Err(FsError::NotEnoughDiskSpace);
        }

        let target = next_copy_name(&source)?;
        fs::copy(&source, &target)?;
        self.add_usage(meta.len() as i64);
        self.chown_entry(&target);

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(name)
    }

    /// Delete a file or directory tree.
    ///
    /// Operates on the unresolved path so a symlink entry is removed
    /// rather than followed. The root itself is never deletable.
    pub fn delete(&self, user: impl AsRef<Path>) -> Result<(), FsError> {
        let path = self.unresolved_path(user)?;
        if path == *self.root() {
            return Err(FsError::DeleteRoot);
        }

        let Ok(meta) = fs::symlink_metadata(&path) else {
            return Ok(()); // already gone
        };

        let freed = if meta.is_dir() { tree_size(&path) } else { meta.len() };
        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        self.add_usage(-(freed as i64));
        Ok(())
    }

    pub(crate) fn chown_entry(&self, path: &Path) {
        if fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(true) {
            return;
        }
        let uid = nix::unistd::Uid::from_raw(self.uid());
        let gid = nix::unistd::Gid::from_raw(self.gid());
        if let Err(err) = nix::unistd::chown(path, Some(uid), Some(gid)) {
            tracing::debug!(path = %path.display(), %err, "chown failed");
        }
    }

    fn chown_tree(&self, path: &Path) -> Result<(), FsError> {
        self.chown_entry(path);
        let meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if meta.is_dir() {
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                self.chown_tree(&entry.path())?;
            }
        }
        Ok(())
    }
}

fn stat_from(path: &Path, meta: &fs::Metadata) -> FileStat {
    FileStat {
        name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        size: meta.len(),
        mode: meta.mode() & 0o7777,
        modified: meta.mtime(),
        created: meta.ctime(),
        directory: meta.is_dir(),
        mime: sniff_mime(path, meta.is_dir()),
    }
}

/// Best-effort MIME detection: directories get `inode/directory`,
/// known extensions their registered type, and everything else is
/// sniffed for text vs binary content.
fn sniff_mime(path: &Path, is_dir: bool) -> String {
    if is_dir {
        return "inode/directory".to_string();
    }
    if let Some(guess) = mime_guess::from_path(path).first() {
        return guess.essence_str().to_string();
    }

    let mut head = [0u8; 512];
    let read = File::open(path).and_then(|mut f| f.read(&mut head)).unwrap_or(0);
    if read == 0 || std::str::from_utf8(&head[..read]).is_ok() {
        "text/plain; charset=utf-8".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// Pick ` copy` / ` copy N` names, falling back to an RFC3339
/// timestamp after [`MAX_COPY_SUFFIX`] collisions.
fn next_copy_name(source: &Path) -> Result<PathBuf, FsError> {
    let parent = source.parent().unwrap_or(Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 1..=MAX_COPY_SUFFIX {
        let name = if n == 1 {
            format!("{stem} copy{extension}")
        } else {
            format!("{stem} copy {n}{extension}")
        };
        let candidate = parent.join(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    Ok(parent.join(format!("{stem} copy {stamp}{extension}")))
}

/// Total size of a directory tree, not following symlinks.
pub(crate) fn tree_size(path: &Path) -> u64 {
    let mut total = 0;
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            total += tree_size(&entry.path());
        } else {
            total += meta.len();
        }
    }
    total
}

/// Open a file, retrying up to 3 times on "text file busy" with
/// 100ms·2ⁿ backoff.
pub(crate) fn open_with_busy_retry(
    path: &Path,
    options: &OpenOptions,
) -> Result<File, io::Error> {
    let mut attempt = 0u32;
    loop {
        match options.open(path) {
            Ok(file) => return Ok(file),
            Err(err)
                if attempt < 3
                    && err.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32) =>
            {
                std::thread::sleep(Duration::from_millis(100) * 2u32.pow(attempt));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
