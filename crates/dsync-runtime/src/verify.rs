//! Direct-lookup verification of a raw diff.
//!
//! The registry's list view can lag its single-record view, so a raw diff may
//! carry numbers that are already correct. Only direct lookups are trusted:
//!
//! | candidate  | Found  | NotFound | Error |
//! |------------|--------|----------|-------|
//! | to_add     | drop   | keep     | keep  |
//! | to_delete  | keep   | drop     | keep  |
//!
//! `mismatched` passes through untouched. Lookups run one at a time, adds
//! first, then deletes, each in diff order.

use std::time::{Duration, Instant};

use dsync_reconcile::{NumberEntry, ReconcileResult};
use dsync_registry::{LookupOutcome, RegistryReader};
use tracing::{info, warn};

/// Progress is reported after every this-many lookups, and on completion.
pub const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    ToAdd,
    ToDelete,
}

impl VerifyPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyPhase::ToAdd => "to_add",
            VerifyPhase::ToDelete => "to_delete",
        }
    }
}

/// Snapshot of a verification pass in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: VerifyPhase,
    pub done: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

pub trait ProgressObserver: Send {
    fn on_progress(&mut self, progress: &Progress);
}

/// Default observer: one `info` line per report.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, p: &Progress) {
        info!(
            phase = p.phase.as_str(),
            done = p.done,
            total = p.total,
            percent = %format!("{:.1}", p.percent()),
            elapsed_ms = p.elapsed.as_millis() as u64,
            "verification progress"
        );
    }
}

/// Collects progress reports; handy in tests.
impl ProgressObserver for Vec<Progress> {
    fn on_progress(&mut self, progress: &Progress) {
        self.push(*progress);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub lookups: usize,
    /// to_add candidates dropped because they already exist.
    pub add_already_present: usize,
    /// to_delete candidates dropped because they are already gone.
    pub delete_already_absent: usize,
    /// Lookups that were neither found nor a clean not-found.
    pub ambiguous: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub result: ReconcileResult,
    pub stats: VerifyStats,
}

/// Filter `diff` through direct lookups. Returns a new diff; the input is
/// left as-is.
pub async fn verify_diff(
    diff: &ReconcileResult,
    reader: &dyn RegistryReader,
    progress: &mut dyn ProgressObserver,
) -> VerificationOutcome {
    let mut stats = VerifyStats::default();

    let to_add = filter_phase(
        VerifyPhase::ToAdd,
        &diff.to_add,
        reader,
        progress,
        &mut stats,
    )
    .await;
    let to_delete = filter_phase(
        VerifyPhase::ToDelete,
        &diff.to_delete,
        reader,
        progress,
        &mut stats,
    )
    .await;

    info!(
        lookups = stats.lookups,
        add_already_present = stats.add_already_present,
        delete_already_absent = stats.delete_already_absent,
        ambiguous = stats.ambiguous,
        "verification finished"
    );

    VerificationOutcome {
        result: ReconcileResult {
            to_add,
            to_delete,
            mismatched: diff.mismatched.clone(),
        },
        stats,
    }
}

async fn filter_phase(
    phase: VerifyPhase,
    candidates: &[NumberEntry],
    reader: &dyn RegistryReader,
    progress: &mut dyn ProgressObserver,
    stats: &mut VerifyStats,
) -> Vec<NumberEntry> {
    let total = candidates.len();
    let started = Instant::now();
    let mut kept = Vec::with_capacity(total);

    for (i, entry) in candidates.iter().enumerate() {
        let outcome = reader.lookup(&entry.number).await;
        stats.lookups += 1;

        let keep = match (&outcome, phase) {
            (LookupOutcome::Found, VerifyPhase::ToAdd) => {
                stats.add_already_present += 1;
                false
            }
            (LookupOutcome::NotFound, VerifyPhase::ToDelete) => {
                stats.delete_already_absent += 1;
                false
            }
            (LookupOutcome::Found, VerifyPhase::ToDelete)
            | (LookupOutcome::NotFound, VerifyPhase::ToAdd) => true,
            (LookupOutcome::Error(detail), _) => {
                stats.ambiguous += 1;
                warn!(
                    phase = phase.as_str(),
                    number = %entry.number,
                    detail = %detail,
                    "ambiguous lookup; keeping candidate"
                );
                true
            }
        };
        if keep {
            kept.push(entry.clone());
        }

        let done = i + 1;
        if done % PROGRESS_EVERY == 0 || done == total {
            progress.on_progress(&Progress {
                phase,
                done,
                total,
                elapsed: started.elapsed(),
            });
        }
    }

    kept
}
