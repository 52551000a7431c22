// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Run identifiers
//!
//! A run id is used verbatim as a directory name under the checkpoint root,
//! so only the canonical hyphenated UUID shape is accepted.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::AgentflowError;

fn run_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("run id pattern is valid")
    })
}

/// A validated run identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh random run id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate a run id string
    pub fn parse(raw: &str) -> Result<Self, AgentflowError> {
        if run_id_pattern().is_match(raw) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(AgentflowError::InvalidRunIdFormat {
                run_id: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
