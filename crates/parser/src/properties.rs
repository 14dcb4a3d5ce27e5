// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `.properties` rewriting.
//!
//! Existing lines keep their position and comments survive untouched;
//! a matched key has its value overwritten in place, and keys that do
//! not exist yet are appended. Output is UTF-8 `key=value` lines, so
//! applying the same patch twice is byte-stable.

use crate::template::TemplateContext;
use crate::{read_or_default, write_output, ParserError};
use quay_core::FileReplacement;
use std::path::Path;

pub(crate) fn apply(
    path: &Path,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    let contents = read_or_default(path)?.unwrap_or_default();
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();

    for replacement in replacements {
        let rendered = ctx.render(&replacement.value);
        let mut found = false;
        for line in &mut lines {
            if let Some(key) = property_key(line) {
                if key == replacement.matcher {
                    *line = format!("{}={rendered}", replacement.matcher);
                    found = true;
                }
            }
        }
        if !found {
            lines.push(format!("{}={rendered}", replacement.matcher));
        }
    }

    let mut output = lines.join("\n");
    if !output.is_empty() {
        output.push('\n');
    }
    write_output(path, &output)
}

/// The key of a `key=value` line; comments and blanks yield `None`.
fn property_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim_end())
}

#[cfg(test)]
#[path = "properties_tests.rs"]
mod tests;
