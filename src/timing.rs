// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Named-phase timing and the KVS-shaped sink.
//!
//! The executor (`crate::executor`) already records per-task `starttime`
//! and `duration`; this module adds four named phase spans — `configure`,
//! `solve`, `deps`, and `prepare` — plus the trait a caller implements to
//! receive the combined array when timing is enabled.

use std::time::Instant;

use crate::executor::TimingRecord;

/// Accumulates named phase spans plus per-task timing records relative to
/// a single run's `t0`, only when enabled.
pub struct PhaseTimer {
    t0: Instant,
    records: Vec<TimingRecord>,
}

impl PhaseTimer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            t0: Instant::now(),
            records: Vec::new(),
        }
    }

    /// Elapsed seconds since this timer started.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.t0.elapsed().as_secs_f64()
    }

    /// Records a named phase span from `started_at` (an earlier
    /// [`Self::timestamp`] reading) through now.
    pub fn record_phase(&mut self, name: impl Into<String>, started_at: f64) {
        let now = self.timestamp();
        self.records.push(TimingRecord {
            name: name.into(),
            starttime: started_at,
            duration: now - started_at,
        });
    }

    /// Merges in per-task timing records from an [`crate::executor::RunReport`].
    pub fn record_tasks(&mut self, tasks: &[TimingRecord]) {
        self.records.extend(tasks.iter().cloned());
    }

    /// Returns the accumulated records, sorted by `starttime`.
    #[must_use]
    pub fn into_sorted(mut self) -> Vec<TimingRecord> {
        self.records
            .sort_by(|a, b| a.starttime.partial_cmp(&b.starttime).unwrap_or(std::cmp::Ordering::Equal));
        self.records
    }
}

/// One entry of the timing array committed to the timing sink.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct TimingEntry {
    pub name: String,
    pub starttime: f64,
    pub duration: f64,
}

impl From<&TimingRecord> for TimingEntry {
    fn from(record: &TimingRecord) -> Self {
        Self {
            name: record.name.clone(),
            starttime: record.starttime,
            duration: record.duration,
        }
    }
}

/// Sink a completed run's timing array is committed to, on rank 0, under a
/// well-known key. The core ships no real KVS client; a concrete
/// implementation is an external collaborator (see `LocalTimingSink` in the
/// demo binary for an in-memory stand-in).
pub trait TimingSink: Send + Sync {
    /// Commits `entries` under `key` (conventionally `"modprobe.stats"`).
    fn put(&self, key: &str, entries: Vec<TimingEntry>);
}

/// The well-known KVS key the timing array is committed under.
pub const TIMING_KVS_KEY: &str = "modprobe.stats";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_and_task_records_sort_by_starttime() {
        let mut timer = PhaseTimer::start();
        timer.record_phase("solve", 0.5);
        timer.record_tasks(&[
            TimingRecord {
                name: "b".into(),
                starttime: 0.1,
                duration: 0.2,
            },
            TimingRecord {
                name: "a".into(),
                starttime: 0.0,
                duration: 0.05,
            },
        ]);

        let sorted = timer.into_sorted();
        let order: Vec<&str> = sorted.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "solve"]);
    }

    #[test]
    fn timing_entry_converts_from_record() {
        let record = TimingRecord {
            name: "kvs".into(),
            starttime: 1.0,
            duration: 2.0,
        };
        let entry: TimingEntry = (&record).into();
        assert_eq!(entry.name, "kvs");
        assert_eq!(entry.duration, 2.0);
    }
}
