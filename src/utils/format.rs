// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Terminal formatting helpers

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::checkpoint::{NodeStatus, RunStatus};

/// Human-readable duration from milliseconds
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1_000.0)
    } else {
        let secs = ms / 1_000;
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// `1.20s, 30 tokens`
pub fn status_line(duration_ms: u64, tokens: u64) -> String {
    format!("{}, {} tokens", format_duration(duration_ms), tokens)
}

/// How long ago a timestamp was, relative to `now`
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);

    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

pub fn run_status(status: RunStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        RunStatus::Completed => label.green(),
        RunStatus::Failed => label.red(),
        RunStatus::InProgress => label.yellow(),
    }
}

pub fn node_status(status: NodeStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        NodeStatus::Completed => label.green(),
        NodeStatus::Failed => label.red(),
        NodeStatus::Skipped => label.dimmed(),
        NodeStatus::Pending => label.yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1_200), "1.20s");
        assert_eq!(format_duration(125_000), "2m05s");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::days(3), now), "3d ago");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now, now), "just now");
    }
}
