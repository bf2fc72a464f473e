//! Test doubles for driving dsync runs without a network.

mod fake_registry;

pub use fake_registry::{FakeCall, FakeRegistry};

use anyhow::{bail, Result};
use dsync_reconcile::{NumberEntry, RawRow};
use dsync_runtime::{ReportSink, StageReport};

/// Raw rows from `(number, branded_name)` pairs.
pub fn rows(pairs: &[(&str, Option<&str>)]) -> Vec<RawRow> {
    pairs.iter().map(|(n, b)| RawRow::new(*n, *b)).collect()
}

/// `count` distinct raw rows `5550000000 + start ..`, unlabeled.
pub fn numbered_rows(start: u64, count: usize) -> Vec<RawRow> {
    (0..count as u64)
        .map(|i| RawRow::new((5_550_000_000 + start + i).to_string(), None))
        .collect()
}

/// Canonical numbers of `entries`, in order.
pub fn numbers_of(entries: &[NumberEntry]) -> Vec<String> {
    entries.iter().map(|e| e.number.to_string()).collect()
}

/// Sink that rejects every publish.
#[derive(Debug, Default)]
pub struct FailingSink;

impl ReportSink for FailingSink {
    fn publish(&mut self, report: &StageReport) -> Result<()> {
        bail!("sink unavailable for {}", report.stage)
    }
}
