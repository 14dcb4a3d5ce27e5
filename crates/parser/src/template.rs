// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder interpolation for patch values.
//!
//! `{{config.<dot.path>}}` resolves against a JSON snapshot of the
//! daemon's own configuration, `{{server.<dot.path>}}` against the
//! instance (covering `server.build.env.<KEY>` and
//! `server.allocations.default.ip/port`). Unknown references resolve
//! to the empty string.

use quay_core::Scalar;
use regex::Regex;
use std::sync::LazyLock;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(config|server)\.([A-Za-z0-9_][A-Za-z0-9_.-]*)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// JSON snapshots the placeholders resolve against.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub config: serde_json::Value,
    pub server: serde_json::Value,
}

impl TemplateContext {
    pub fn new(config: serde_json::Value, server: serde_json::Value) -> Self {
        Self { config, server }
    }

    /// Render a patch value: substitute every placeholder with the
    /// string form of the referenced value.
    pub fn render(&self, value: &Scalar) -> String {
        let raw = value.to_string();
        if !raw.contains("{{") {
            return raw;
        }
        PLACEHOLDER
            .replace_all(&raw, |caps: &regex::Captures| {
                let root = match &caps[1] {
                    "config" => &self.config,
                    _ => &self.server,
                };
                lookup(root, &caps[2]).unwrap_or_default()
            })
            .into_owned()
    }
}

/// Walk a dotted path through a JSON value, returning the scalar's
/// string form.
fn lookup(root: &serde_json::Value, dotted: &str) -> Option<String> {
    let mut current = root;
    for part in dotted.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(part)?,
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(match current {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
