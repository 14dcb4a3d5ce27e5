// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! INI rewriting. A dotted match addresses `section.key`; a single
//! token addresses the default (sectionless) area. Missing sections
//! and keys are created.

use crate::template::TemplateContext;
use crate::{write_output, ParserError};
use ini::Ini;
use quay_core::FileReplacement;
use std::path::Path;

pub(crate) fn apply(
    path: &Path,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    let mut document = if path.exists() {
        Ini::load_from_file(path)
            .map_err(|err| ParserError::Ini { file: path.to_path_buf(), detail: err.to_string() })?
    } else {
        Ini::new()
    };

    for replacement in replacements {
        let rendered = ctx.render(&replacement.value);
        let (section, key) = split_match(&replacement.matcher);
        document.with_section(section).set(key, rendered);
    }

    let mut buf = Vec::new();
    document
        .write_to(&mut buf)
        .map_err(|err| ParserError::Ini { file: path.to_path_buf(), detail: err.to_string() })?;
    write_output(path, &String::from_utf8_lossy(&buf))
}

/// `a.b` → section `a`, key `b`; a bare token targets the default
/// section. Only the first dot splits, so `server.query.port`
/// addresses key `query.port` inside section `server`.
fn split_match(matcher: &str) -> (Option<String>, &str) {
    match matcher.split_once('.') {
        Some((section, key)) => (Some(section.to_string()), key),
        None => (None, matcher),
    }
}

#[cfg(test)]
#[path = "ini_tests.rs"]
mod tests;
