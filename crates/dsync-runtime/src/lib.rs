//! dsync-runtime
//!
//! Drives one reconciliation run against a live (or fake) registry:
//! load both sides, diff, verify against direct lookups, report, and when
//! asked to, apply the trusted diff in gated, chunked, sequential batches.
//!
//! Invariants:
//! - Exactly one registry call is in flight at any time
//! - No mutation is attempted unless the apply gate permits it
//! - A failed batch stops the apply; earlier batches are never rolled back
//! - Every run state change goes through [`RunStateMachine`]

mod apply;
mod orchestrator;
mod sink;
mod snapshot;
mod source;
mod verify;

pub use apply::{
    apply_diff, execute_plan, plan_batches, ApplyAbort, ApplyOutcome, ApplyReport, BatchRecord,
    PlannedBatch, BULK_BATCH_SIZE,
};
pub use orchestrator::{
    FailureKind, Orchestrator, RunConfiguration, RunFailure, RunMode, RunReport, RunState,
    RunStateMachine, TransitionError,
};
pub use sink::{ReportSink, ReportStage, StageReport};
pub use snapshot::{load_registry_snapshot, load_source, Snapshot};
pub use source::{SourceProvider, StaticSource};
pub use verify::{
    verify_diff, LogProgress, Progress, ProgressObserver, VerificationOutcome, VerifyPhase,
    VerifyStats, PROGRESS_EVERY,
};
