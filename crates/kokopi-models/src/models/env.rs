/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Environment Text Codec
//!
//! Maps between the `KEY=VALUE` text block operators type into the deploy and
//! environment forms and the ordered list stored on a workload's container.
//!
//! - Lines are split on `\n` and trimmed; blank lines are skipped.
//! - Only the first `=` separates key from value: `A=B=C` is key `A`, value `B=C`.
//! - Lines with an empty key (`=value`) are skipped.
//! - A repeated key keeps the position of its first occurrence and the value of
//!   its last.

use serde::{Deserialize, Serialize};

/// One environment variable of a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
}

impl EnvEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parses a newline-delimited `KEY=VALUE` block.
pub fn decode(text: &str) -> Vec<EnvEntry> {
    let mut entries: Vec<EnvEntry> = Vec::new();

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        if key.is_empty() {
            continue;
        }

        match entries.iter_mut().find(|entry| entry.name == key) {
            Some(existing) => existing.value = value.to_string(),
            None => entries.push(EnvEntry::new(key, value)),
        }
    }

    entries
}

/// Renders entries back into the text form, one `KEY=VALUE` per line.
pub fn encode(entries: &[EnvEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}={}", entry.name, entry.value))
        .collect::<Vec<_>>()
        .join("\n")
}
