// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented find-and-replace for files without a structured
//! parser. A line is replaced wholesale when it starts with the match
//! needle; an `if_value` guard additionally requires the line to
//! contain that substring.

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
    let had_trailing_newline = contents.ends_with('\n') || contents.is_empty();

    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
    for replacement in replacements {
        let rendered = ctx.render(&replacement.value);
        for line in &mut lines {
            if !line.starts_with(&replacement.matcher) {
                continue;
            }
            if let Some(guard) = &replacement.if_value {
                if !line.contains(guard.as_str()) {
                    continue;
                }
            }
            *line = rendered.clone();
        }
    }

    let mut output = lines.join("\n");
    if had_trailing_newline && !output.is_empty() {
        output.push('\n');
    }
    write_output(path, &output)
}

#[cfg(test)]
#[path = "text_tests.rs"]
mod tests;
