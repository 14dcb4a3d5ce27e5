// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! XML rewriting: the dotted match walks element names from the root
//! and the final element's text content is replaced. Missing elements
//! are created along the way.

use crate::template::TemplateContext;
use crate::{read_or_default, write_output, ParserError};
use quay_core::FileReplacement;
use std::path::Path;
use xmltree::{Element, EmitterConfig, XMLNode};

pub(crate) fn apply(
    path: &Path,
    replacements: &[FileReplacement],
    ctx: &TemplateContext,
) -> Result<(), ParserError> {
    let Some(contents) = read_or_default(path)? else {
        // no root element to infer for a brand-new document
        tracing::debug!(file = %path.display(), "xml file missing, skipping patches");
        return Ok(());
    };

    let mut root = Element::parse(contents.as_bytes())
        .map_err(|err| ParserError::Xml { file: path.to_path_buf(), detail: err.to_string() })?;

    for replacement in replacements {
        let rendered = ctx.render(&replacement.value);
        set_element_text(&mut root, &replacement.matcher, rendered);
    }

    let mut buf = Vec::new();
    let config = EmitterConfig::new().perform_indent(true);
    root.write_with_config(&mut buf, config)
        .map_err(|err| ParserError::Xml { file: path.to_path_buf(), detail: err.to_string() })?;
    let mut output = String::from_utf8_lossy(&buf).into_owned();
    if !output.ends_with('\n') {
        output.push('\n');
    }
    write_output(path, &output)
}

/// Walk `dotted` below the document root, creating elements as
/// needed, and replace the final element's children with a text node.
fn set_element_text(root: &mut Element, dotted: &str, value: String) {
    let mut current = root;
    for part in dotted.split('.') {
        let exists = current.get_child(part).is_some();
        if !exists {
            current.children.push(XMLNode::Element(Element::new(part)));
        }
        // the child we just ensured exists
        let Some(next) = current.get_mut_child(part) else { return };
        current = next;
    }
    current.children = vec![XMLNode::Text(value)];
}

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;
