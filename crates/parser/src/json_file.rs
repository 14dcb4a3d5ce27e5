// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON rewriting: dotted paths traverse the document, missing
//! intermediate objects are created, and replacements keep the type
//! kind of the value they overwrite.

use crate::template::TemplateContext;
use crate::{read_or_default, write_output, ParserError};
use quay_core::{FileReplacement, Scalar};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

pub(crate) fn apply(
    path: &Path,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    let contents = read_or_default(path)?;
    let mut root: Value = match contents.as_deref().map(str::trim) {
        None | Some("") => Value::Object(serde_json::Map::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|source| ParserError::Json { file: path.to_path_buf(), source })?,
    };

    apply_to_value(&mut root, replacements, ctx);

    write_output(path, &to_pretty_string(&root))
}

pub(crate) fn apply_to_value(
    root: &mut Value,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) {
    for replacement in replacements {
        let rendered = ctx.render(&replacement.value);
        set_dotted(root, &replacement.matcher, &rendered, &replacement.value);
    }
}

/// Four-space-indented output with a trailing newline.
pub(crate) fn to_pretty_string(root: &Value) -> String {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    let mut output = match root.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => root.to_string(),
    };
    output.push('\n');
    output
}

/// Set `dotted` inside `root`, creating missing intermediate objects.
fn set_dotted(root: &mut Value, dotted: &str, rendered: &str, original: &Scalar) {
    let mut current = root;
    let mut parts = dotted.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Some(map) = current.as_object_mut() else { return };
        if parts.peek().is_none() {
            let existing = map.get(part);
            let value = coerce(rendered, existing, original);
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

/// Choose the JSON kind for a replacement: the existing value's kind
/// wins; otherwise the declared scalar's own kind.
pub(crate) fn coerce(rendered: &str, existing: Option<&Value>, original: &Scalar) -> Value {
    match existing {
        Some(Value::Number(_)) => {
            if let Ok(n) = rendered.parse::<i64>() {
                return Value::from(n);
            }
            if let Ok(f) = rendered.parse::<f64>() {
                if let Some(n) = serde_json::Number::from_f64(f) {
                    return Value::Number(n);
                }
            }
            Value::String(rendered.to_string())
        }
        Some(Value::Bool(_)) => rendered
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(rendered.to_string())),
        Some(Value::String(_)) => Value::String(rendered.to_string()),
        _ => match original {
            // a non-string scalar that needed no substitution keeps its kind
            Scalar::String(_) => Value::String(rendered.to_string()),
            other if other.to_string() == rendered => other.to_json(),
            _ => Value::String(rendered.to_string()),
        },
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
