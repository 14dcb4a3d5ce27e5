// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quay-parser: rewrites instance config files from declarative patches.
//!
//! The control plane declares, per file, which keys get which values;
//! the daemon applies those patches before every start so the file the
//! application reads matches the allocation and limits the daemon
//! decided. Six backends cover the common formats; values may embed
//! `{{config.*}}` and `{{server.*}}` placeholders resolved against
//! JSON snapshots of the daemon and instance configuration.

mod ini_file;
mod json_file;
mod properties;
mod template;
mod text;
mod xml_file;
mod yaml_file;

pub use template::TemplateContext;

use quay_core::{ConfigurationFile, ConfigurationParser};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure applying a patch set; always carries the file for context.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}: invalid JSON: {source}")]
    Json {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{file}: invalid YAML: {source}")]
    Yaml {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{file}: invalid INI: {detail}")]
    Ini { file: PathBuf, detail: String },
    #[error("{file}: invalid XML: {detail}")]
    Xml { file: PathBuf, detail: String },
}

/// Apply one file's patch list at `path` (already resolved inside the
/// instance root by the caller).
///
/// A missing file is created from the format's empty representation,
/// except XML, where no root element can be inferred and the patch is
/// skipped. Any individual key failure aborts the whole file so a
/// half-rewritten config is never left behind; the line-oriented
/// `file` backend is the exception by design.
pub fn apply(
    path: &Path,
    config: &ConfigurationFile,
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    tracing::debug!(file = %path.display(), parser = ?config.parser, "applying config patches");
    match config.parser {
        ConfigurationParser::File => text::apply(path, &config.replace, ctx),
        ConfigurationParser::Properties => properties::apply(path, &config.replace, ctx),
        ConfigurationParser::Ini => ini_file::apply(path, &config.replace, ctx),
        ConfigurationParser::Json => json_file::apply(path, &config.replace, ctx),
        ConfigurationParser::Yaml => yaml_file::apply(path, &config.replace, ctx),
        ConfigurationParser::Xml => xml_file::apply(path, &config.replace, ctx),
    }
}

fn read_or_default(path: &Path) -> Result<Option<String>, ParserError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ParserError::Io { file: path.to_path_buf(), source: err }),
    }
}

fn write_output(path: &Path, contents: &str) -> Result<(), ParserError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| ParserError::Io { file: path.to_path_buf(), source: err })?;
    }
    std::fs::write(path, contents)
        .map_err(|err| ParserError::Io { file: path.to_path_buf(), source: err })
}
