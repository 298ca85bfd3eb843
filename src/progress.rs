//! Run progress accounting.
//!
//! Counts are kept per document type so long runs can report how much of
//! each type is left. "Seen" totals are registered a batch at a time before
//! the batch is processed, which gives the denominator ahead of time.

use std::collections::BTreeMap;

use crate::models::OutcomeStatus;

/// Aggregate counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Documents that reached a verdict (SUCCESS or any failure).
    pub processed: u64,
    pub failures: u64,
    pub skipped: u64,
}

/// Progress of one document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeProgress {
    pub doc_type: i64,
    pub processed: u64,
    pub seen: u64,
}

impl TypeProgress {
    pub fn remaining(&self) -> u64 {
        self.seen.saturating_sub(self.processed)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressCounters {
    seen_by_type: BTreeMap<i64, u64>,
    processed_by_type: BTreeMap<i64, u64>,
    stats: RunStats,
    interval: u64,
}

impl ProgressCounters {
    pub fn new(interval: u64) -> Self {
        Self {
            seen_by_type: BTreeMap::new(),
            processed_by_type: BTreeMap::new(),
            stats: RunStats::default(),
            interval: interval.max(1),
        }
    }

    /// Add documents about to be processed to the per-type totals.
    pub fn register<I: IntoIterator<Item = i64>>(&mut self, doc_types: I) {
        for doc_type in doc_types {
            *self.seen_by_type.entry(doc_type).or_insert(0) += 1;
        }
    }

    /// Record one finished document. Returns `true` when a progress summary
    /// is due, i.e. the processed count just reached a multiple of the
    /// reporting interval. Documents without a type code only move the
    /// run totals.
    pub fn record(&mut self, doc_type: Option<i64>, status: OutcomeStatus) -> bool {
        if let Some(doc_type) = doc_type {
            *self.processed_by_type.entry(doc_type).or_insert(0) += 1;
        }

        match status {
            OutcomeStatus::Skipped => {
                self.stats.skipped += 1;
                false
            }
            status => {
                self.stats.processed += 1;
                if status.is_failure() {
                    self.stats.failures += 1;
                }
                self.stats.processed % self.interval == 0
            }
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Types that still have unprocessed documents, in type-code order.
    pub fn pending(&self) -> Vec<TypeProgress> {
        self.seen_by_type
            .iter()
            .map(|(&doc_type, &seen)| TypeProgress {
                doc_type,
                processed: self.processed_by_type.get(&doc_type).copied().unwrap_or(0),
                seen,
            })
            .filter(|p| p.remaining() > 0)
            .collect()
    }
}

/// Format a count with thousands separators: `1234567` → `1,234,567`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}
