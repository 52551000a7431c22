// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Execution timeline
//!
//! Start and end offsets (milliseconds from the start of the run) for every
//! unit that actually ran. Bookkeeping only; scheduling never reads it.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub name: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub level: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TimelineEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Largest number of units observed running at the same instant
    pub fn max_overlap(&self) -> usize {
        // (time, delta) with ends sorted before starts at equal times
        let mut events: Vec<(u64, i64)> = self
            .entries
            .iter()
            .flat_map(|e| [(e.start_ms, 1), (e.end_ms, -1)])
            .collect();
        events.sort();

        let mut current: i64 = 0;
        let mut peak: i64 = 0;
        for (_, delta) in events {
            current += delta;
            peak = peak.max(current);
        }
        peak as usize
    }

    /// Render as a text table sorted by start time
    pub fn to_text(&self) -> String {
        let mut entries: Vec<&TimelineEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| (e.start_ms, e.level));

        let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        let mut output = String::new();
        for e in entries {
            output.push_str(&format!(
                "{:<width$}  L{}  {:>6}ms .. {:>6}ms  ({}ms)\n",
                e.name,
                e.level,
                e.start_ms,
                e.end_ms,
                e.end_ms.saturating_sub(e.start_ms),
                width = width
            ));
        }
        output
    }
}
