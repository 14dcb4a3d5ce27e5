// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration: how an instance signals "started", how it is
//! stopped, and which config files the daemon rewrites before boot.

use crate::scalar::Scalar;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How to stop the instance process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StopDescriptor {
    /// Write `value` followed by a newline to the container's stdin.
    Command { value: String },
    /// Send the named POSIX signal (e.g. `SIGTERM`).
    Signal { value: String },
    /// Use the runtime's graceful stop.
    Stop,
}

impl Default for StopDescriptor {
    fn default() -> Self {
        StopDescriptor::Stop
    }
}

/// One startup-done matcher: a literal substring, or a regex when the
/// raw string carries the `regex:` prefix.
#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern { raw: String, re: Regex },
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Literal(s) => line.contains(s.as_str()),
            Matcher::Pattern { re, .. } => re.is_match(line),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Matcher::Literal(s) => s,
            Matcher::Pattern { raw, .. } => raw,
        }
    }
}

/// Ordered console matchers; any single match counts.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMatchers(Vec<Matcher>);

impl ConsoleMatchers {
    /// Build from raw matcher strings. Fails on an invalid `regex:` pattern.
    pub fn parse(raw: &[String]) -> Result<Self, regex::Error> {
        let mut matchers = Vec::with_capacity(raw.len());
        for entry in raw {
            match entry.strip_prefix("regex:") {
                Some(pattern) => matchers.push(Matcher::Pattern {
                    raw: entry.clone(),
                    re: Regex::new(pattern)?,
                }),
                None => matchers.push(Matcher::Literal(entry.clone())),
            }
        }
        Ok(Self(matchers))
    }

    /// True when any matcher matches the console line.
    pub fn matches(&self, line: &str) -> bool {
        self.0.iter().any(|m| m.matches(line))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for ConsoleMatchers {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.raw() == b.raw())
    }
}

impl Serialize for ConsoleMatchers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Matcher::raw))
    }
}

impl<'de> Deserialize<'de> for ConsoleMatchers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        ConsoleMatchers::parse(&raw).map_err(D::Error::custom)
    }
}

/// Which rewrite backend handles a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationParser {
    /// Line-oriented find and replace for unstructured files.
    File,
    Properties,
    Ini,
    Json,
    Yaml,
    Xml,
}

/// One declarative replacement inside a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReplacement {
    /// Key path (dotted for structured formats) or line needle.
    #[serde(rename = "match")]
    pub matcher: String,
    /// Only replace a line when its current value matches (file parser).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_value: Option<String>,
    /// Replacement, possibly containing `{{config.*}}`/`{{server.*}}`
    /// placeholders.
    pub value: Scalar,
}

/// One file the daemon rewrites before every start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFile {
    /// Path relative to the instance data root.
    pub file: String,
    pub parser: ConfigurationParser,
    #[serde(default)]
    pub replace: Vec<FileReplacement>,
}

/// Startup detection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupConfiguration {
    /// Matching any one of these on the console flips starting → running.
    #[serde(default)]
    pub done: ConsoleMatchers,
    /// Strip ANSI escape sequences before matching.
    #[serde(default)]
    pub strip_ansi: bool,
}

/// The full process configuration delivered by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfiguration {
    #[serde(default)]
    pub startup: StartupConfiguration,
    #[serde(default)]
    pub stop: StopDescriptor,
    #[serde(default)]
    pub configs: Vec<ConfigurationFile>,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
