// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive creation and extraction.
//!
//! Creation walks the instance root honoring gitignore-style ignore
//! patterns (`.pteroignore` at the root plus any caller-supplied
//! rules). Extraction is guarded twice: the declared uncompressed
//! size is summed before anything is written (decompression bombs),
//! and every entry path must pass the safe-path check (zip-slip).

use crate::{Filesystem, FsError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// The ignore file read from the instance root when building backups.
const IGNORE_FILE: &str = ".pteroignore";

/// Ignore files larger than this are skipped entirely.
const IGNORE_FILE_MAX: u64 = 32 * 1024;

/// What an extraction actually wrote.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractSummary {
    pub files: u64,
    pub bytes: u64,
}

impl Filesystem {
    /// Stream a gzip'd tar of the instance root into `writer`.
    ///
    /// `extra_ignore` holds newline-separated gitignore rules that are
    /// applied after (and therefore override) the root ignore file.
    pub fn archive_to<W: Write>(
        &self,
        writer: W,
        extra_ignore: Option<&str>,
    ) -> Result<W, FsError> {
        let matcher = self.build_ignore(extra_ignore)?;

        let encoder = GzEncoder::new(writer, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        self.append_dir(&mut builder, self.root(), &matcher)?;

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }

    fn append_dir<W: Write>(
        &self,
        builder: &mut tar::Builder<W>,
        dir: &Path,
        matcher: &Gitignore,
    ) -> Result<(), FsError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(self.root()) else { continue };
            let Ok(file_type) = entry.file_type() else { continue };

            if matcher.matched(relative, file_type.is_dir()).is_ignore() {
                continue;
            }

            if file_type.is_dir() {
                builder.append_path_with_name(&path, relative)?;
                self.append_dir(builder, &path, matcher)?;
            } else {
                builder.append_path_with_name(&path, relative)?;
            }
        }
        Ok(())
    }

    fn build_ignore(&self, extra: Option<&str>) -> Result<Gitignore, FsError> {
        let mut builder = GitignoreBuilder::new(self.root());

        let ignore_path = self.root().join(IGNORE_FILE);
        if let Ok(meta) = fs::symlink_metadata(&ignore_path) {
            // never read the ignore file through a symlink
            if meta.is_file() && meta.len() <= IGNORE_FILE_MAX {
                let contents = fs::read_to_string(&ignore_path)?;
                for line in contents.lines() {
                    let _ = builder.add_line(None, line);
                }
            }
        }

        if let Some(rules) = extra {
            for line in rules.lines() {
                let _ = builder.add_line(None, line);
            }
        }

        builder
            .build()
            .map_err(|err| FsError::ArchiveFormat(format!("invalid ignore rules: {err}")))
    }

    /// Sum the declared uncompressed sizes inside a tar.gz stream.
    pub fn archive_uncompressed_size<R: Read>(&self, reader: R) -> Result<u64, FsError> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let mut total = 0u64;
        let entries = archive
            .entries()
            .map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
            total = total.saturating_add(entry.header().size().unwrap_or(0));
        }
        Ok(total)
    }

    /// Extract a tar.gz stream into the root.
    ///
    /// Callers must run the decompression-bomb check first (see
    /// [`Filesystem::decompress_file`]). Every entry is re-checked
    /// against the safe-path rule before it is written.
    pub fn extract_archive<R: Read>(&self, reader: R) -> Result<ExtractSummary, FsError> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let mut summary = ExtractSummary::default();

        let entries = archive
            .entries()
            .map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
            let name = entry
                .path()
                .map_err(|err| FsError::ArchiveFormat(err.to_string()))?
                .into_owned();

            let target = self.safe_path(&name)?;
            match entry.header().entry_type() {
                tar::EntryType::Directory => {
                    fs::create_dir_all(&target)?;
                    self.chown_entry(&target);
                }
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mut file = crate::ops::open_with_busy_retry(
                        &target,
                        OpenOptions::new().create(true).write(true).truncate(true),
                    )?;
                    let written = io::copy(&mut entry, &mut file)?;
                    self.add_usage(written as i64);
                    self.chown_entry(&target);
                    summary.files += 1;
                    summary.bytes += written;
                }
                tar::EntryType::Symlink => {
                    // only recreate links whose target stays inside the root
                    if let Ok(Some(link)) = entry.link_name() {
                        let link_abs = if link.is_absolute() {
                            link.into_owned()
                        } else {
                            target.parent().unwrap_or(self.root()).join(link)
                        };
                        if self.safe_path(&link_abs).is_ok() {
                            let _ = std::os::unix::fs::symlink(&link_abs, &target);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Walk a tar.gz stream invoking `callback` for every regular
    /// file entry with its root-relative name and content reader.
    pub fn restore_archive<R: Read>(
        &self,
        reader: R,
        mut callback: impl FnMut(&str, &mut dyn Read) -> Result<(), FsError>,
    ) -> Result<(), FsError> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let entries = archive
            .entries()
            .map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|err| FsError::ArchiveFormat(err.to_string()))?;
            if !matches!(
                entry.header().entry_type(),
                tar::EntryType::Regular | tar::EntryType::Continuous
            ) {
                continue;
            }
            let name = entry
                .path()
                .map_err(|err| FsError::ArchiveFormat(err.to_string()))?
                .to_string_lossy()
                .into_owned();
            callback(&name, &mut entry)?;
        }
        Ok(())
    }

    /// Decompress an archive that already lives inside the root.
    ///
    /// Walks the archive for its declared size first and refuses with
    /// a quota error when current usage plus the expected payload
    /// exceeds the limit; only then are entries written.
    pub fn decompress_file(&self, user: impl AsRef<Path>) -> Result<ExtractSummary, FsError> {
        let path = self.safe_path(user)?;

        let expected = self.archive_uncompressed_size(File::open(&path)?)?;
        if let Some(limit) = self.disk_limit() {
            let current = self.disk_usage(false)?;
            if current.saturating_add(expected) > limit {
                return Err(FsError::NotEnoughDiskSpace);
            }
        }

        self.extract_archive(File::open(&path)?)
    }

    /// Create a tar.gz of specific relative paths (transfer archives).
    pub fn archive_paths_to<W: Write>(
        &self,
        writer: W,
        paths: &[PathBuf],
    ) -> Result<W, FsError> {
        let encoder = GzEncoder::new(writer, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        for user in paths {
            let resolved = self.safe_path(user)?;
            let Ok(relative) = resolved.strip_prefix(self.root()) else { continue };
            let Ok(meta) = fs::symlink_metadata(&resolved) else { continue };
            if meta.is_dir() {
                builder.append_dir_all(relative, &resolved)?;
            } else {
                builder.append_path_with_name(&resolved, relative)?;
            }
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
