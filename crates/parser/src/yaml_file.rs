// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML rewriting: the document is converted to JSON, patched with the
//! JSON backend, and converted back. Comments and key order do not
//! survive the round trip; value kinds do.

use crate::template::TemplateContext;
use crate::{json_file, read_or_default, write_output, ParserError};
use quay_core::FileReplacement;
use std::path::Path;

pub(crate) fn apply(
    path: &Path,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    let contents = read_or_default(path)?;
    let mut root: serde_json::Value = match contents.as_deref().map(str::trim) {
        None | Some("") => serde_json::Value::Object(serde_json::Map::new()),
        Some(raw) => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(raw)
                .map_err(|source| ParserError::Yaml { file: path.to_path_buf(), source })?;
            serde_json::to_value(yaml)
                .map_err(|source| ParserError::Json { file: path.to_path_buf(), source })?
        }
    };

    json_file::apply_to_value(&mut root, replacements, ctx);

    let output = serde_yaml::to_string(&root)
        .map_err(|source| ParserError::Yaml { file: path.to_path_buf(), source })?;
    write_output(path, &output)
}

#[cfg(test)]
#[path = "yaml_tests.rs"]
mod tests;
