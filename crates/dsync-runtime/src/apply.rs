//! Apply executor.
//!
//! Order of operations:
//! 1. [`check_apply_gate`]: confirmation, then add limit, then delete limit.
//!    A refusal means zero registry calls.
//! 2. `to_add` split into batches of [`BULK_BATCH_SIZE`] in diff order, each
//!    submitted as one bulk `add`, one at a time.
//! 3. `to_delete` likewise with bulk `delete`.
//!
//! The first failing batch stops everything. Batches that already landed
//! stay landed; there is no compensating call. The caller gets the landed
//! batches, the failed batch and how many were never attempted.

use std::fmt;

use dsync_reconcile::{
    check_apply_gate, normalize, ApplyGate, ApplyLimits, ApplyRefusal, DidNumber, NumberEntry,
    ReconcileResult,
};
use dsync_registry::{BulkAction, RegistryError, RegistryWriter};
use tracing::{error, info, warn};

/// Entries per bulk call.
pub const BULK_BATCH_SIZE: usize = 100;

/// One bulk call, before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    pub action: BulkAction,
    /// 1-based position within its action.
    pub index: usize,
    /// Number of batches for this action.
    pub of: usize,
    pub entries: Vec<NumberEntry>,
}

impl PlannedBatch {
    fn record(&self) -> BatchRecord {
        BatchRecord {
            action: self.action,
            index: self.index,
            of: self.of,
            numbers: self.entries.iter().map(|e| e.number.clone()).collect(),
        }
    }
}

/// What was (or was meant to be) sent in one bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub action: BulkAction,
    pub index: usize,
    pub of: usize,
    pub numbers: Vec<DidNumber>,
}

impl fmt::Display for BatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batch {}/{} ({} numbers)",
            self.action,
            self.index,
            self.of,
            self.numbers.len()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub batches: Vec<BatchRecord>,
    pub added: usize,
    pub deleted: usize,
    /// Entries dropped by the pre-submit canonical re-check.
    pub excluded: usize,
}

/// Apply stopped at a failed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyAbort {
    pub completed: Vec<BatchRecord>,
    pub failed: BatchRecord,
    pub error: RegistryError,
    /// Batches after the failed one that were never sent.
    pub not_attempted: usize,
}

impl fmt::Display for ApplyAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.failed, self.error)?;

        let preview: Vec<&str> = self.failed.numbers.iter().take(5).map(DidNumber::as_str).collect();
        write!(f, "; numbers=[{}", preview.join(","))?;
        if self.failed.numbers.len() > preview.len() {
            write!(f, ",...+{}", self.failed.numbers.len() - preview.len())?;
        }
        write!(f, "]")?;

        let landed: Vec<String> = self
            .completed
            .iter()
            .map(|b| format!("{} {}/{}", b.action, b.index, b.of))
            .collect();
        write!(
            f,
            "; landed=[{}]; not_attempted={}",
            landed.join(", "),
            self.not_attempted
        )
    }
}

impl std::error::Error for ApplyAbort {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(ApplyReport),
    Refused(ApplyRefusal),
    Aborted(ApplyAbort),
}

/// Split a diff into bulk calls: all adds, then all deletes.
///
/// Entries failing the canonical re-check are left out of their batch; a
/// batch left empty by that is not planned at all. Returns the plan and the
/// number of excluded entries.
pub fn plan_batches(diff: &ReconcileResult) -> (Vec<PlannedBatch>, usize) {
    let mut plan = Vec::new();
    let mut excluded = 0;

    for (action, entries) in [
        (BulkAction::Add, &diff.to_add),
        (BulkAction::Delete, &diff.to_delete),
    ] {
        let chunks: Vec<Vec<NumberEntry>> = entries
            .chunks(BULK_BATCH_SIZE)
            .map(|chunk| {
                let kept: Vec<NumberEntry> = chunk
                    .iter()
                    .filter(|e| {
                        let ok = still_canonical(&e.number);
                        if !ok {
                            warn!(action = %action, number = %e.number, "excluded from batch: not canonical");
                        }
                        ok
                    })
                    .cloned()
                    .collect();
                excluded += chunk.len() - kept.len();
                kept
            })
            .filter(|kept| !kept.is_empty())
            .collect();

        let of = chunks.len();
        plan.extend(
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, entries)| PlannedBatch {
                    action,
                    index: i + 1,
                    of,
                    entries,
                }),
        );
    }

    (plan, excluded)
}

fn still_canonical(number: &DidNumber) -> bool {
    normalize(number.as_str()).as_ref() == Some(number)
}

/// Submit an already-permitted diff. Callers must have passed the gate.
pub async fn execute_plan(
    diff: &ReconcileResult,
    writer: &dyn RegistryWriter,
) -> Result<ApplyReport, ApplyAbort> {
    let (plan, excluded) = plan_batches(diff);
    let total = plan.len();
    let mut report = ApplyReport {
        excluded,
        ..ApplyReport::default()
    };

    for (pos, batch) in plan.iter().enumerate() {
        info!(
            action = %batch.action,
            batch = batch.index,
            of = batch.of,
            size = batch.entries.len(),
            "submitting bulk batch"
        );

        if let Err(err) = writer.bulk_mutate(batch.action, &batch.entries).await {
            let not_attempted = total - pos - 1;
            error!(
                action = %batch.action,
                batch = batch.index,
                of = batch.of,
                size = batch.entries.len(),
                not_attempted,
                error = %err,
                "bulk batch failed; stopping apply"
            );
            return Err(ApplyAbort {
                completed: report.batches,
                failed: batch.record(),
                error: err,
                not_attempted,
            });
        }

        match batch.action {
            BulkAction::Add => report.added += batch.entries.len(),
            BulkAction::Delete => report.deleted += batch.entries.len(),
        }
        report.batches.push(batch.record());
    }

    info!(
        batches = report.batches.len(),
        added = report.added,
        deleted = report.deleted,
        excluded = report.excluded,
        "apply complete"
    );
    Ok(report)
}

/// Gate, then execute.
pub async fn apply_diff(
    diff: &ReconcileResult,
    limits: ApplyLimits,
    confirmed: bool,
    writer: &dyn RegistryWriter,
) -> ApplyOutcome {
    if let ApplyGate::Refused(refusal) = check_apply_gate(diff, limits, confirmed) {
        warn!(reason = %refusal, "apply refused");
        return ApplyOutcome::Refused(refusal);
    }

    match execute_plan(diff, writer).await {
        Ok(report) => ApplyOutcome::Applied(report),
        Err(abort) => ApplyOutcome::Aborted(abort),
    }
}
