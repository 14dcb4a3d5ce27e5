// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loosely typed values from the control plane.
//!
//! Environment variables and config-file replacement values arrive as
//! whatever JSON type the panel operator happened to save: `25565`,
//! `"25565"`, `true`. [`Scalar`] keeps the original kind so structured
//! parsers can preserve it, while `Display` gives the canonical string
//! form used for environment variables and plain-text substitution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A string, integer, float, or boolean value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// The canonical string projection.
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    /// Convert to a JSON value, preserving the original kind.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::String(s) => serde_json::Value::String(s.clone()),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into)
            }
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::String(String::new())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

#[cfg(test)]
#[path = "scalar_tests.rs"]
mod tests;
