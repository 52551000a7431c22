// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Unit run conditions
//!
//! Conditions are parsed once while the graph is built and evaluated by the
//! engine against the results recorded so far.

use std::fmt;

/// Output recorded for units skipped because their condition was false
pub const SKIPPED_SENTINEL: &str = "[Skipped due to condition]";

/// A parsed run condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `previous.success`: every result recorded so far succeeded
    PreviousSuccess,
    /// `<name>.success`: the named unit has a successful result
    NodeSuccess(String),
}

impl Condition {
    /// Parse a condition string, returning `None` for anything unsupported
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let target = raw.strip_suffix(".success")?;

        if target.is_empty() {
            return None;
        }

        if target == "previous" {
            Some(Self::PreviousSuccess)
        } else {
            Some(Self::NodeSuccess(target.to_string()))
        }
    }

    /// The unit this condition refers to, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::PreviousSuccess => None,
            Self::NodeSuccess(name) => Some(name),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreviousSuccess => write!(f, "previous.success"),
            Self::NodeSuccess(name) => write!(f, "{}.success", name),
        }
    }
}
