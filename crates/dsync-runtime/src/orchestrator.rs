//! Run orchestrator and its state machine.
//!
//! # State diagram
//!
//! ```text
//!   INIT ─► LOADED ─► DIFFED ─► VERIFIED ─┬─► REPORTED                     (dry run, terminal)
//!                                         └─► GATED ─┬─► REFUSED          (terminal)
//!                                                    └─► APPLYING ─► APPLIED ─► POST_VERIFIED ─► DONE
//!
//!   any non-terminal state ─► FAILED (terminal)
//! ```
//!
//! `DIFFED ─► VERIFIED` is a pass-through when verification is skipped.
//! `REFUSED` is distinct from `FAILED`: the gate said no before any mutation,
//! and the operator can fix that by re-running.
//!
//! Every log line emitted while a run is in progress carries the run's
//! `run_id` through the enclosing `run` span.

use std::fmt;

use dsync_reconcile::{
    check_apply_gate, reconcile, ApplyGate, ApplyLimits, ApplyRefusal, DedupeStats,
    ReconcileResult,
};
use dsync_registry::{RegistryError, RegistryReader, RegistryWriter};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::apply::{execute_plan, ApplyAbort, ApplyReport};
use crate::sink::{ReportSink, ReportStage, StageReport};
use crate::snapshot::{load_registry_snapshot, load_source, Snapshot};
use crate::source::SourceProvider;
use crate::verify::{verify_diff, LogProgress, ProgressObserver, VerifyStats};

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Loaded,
    Diffed,
    Verified,
    /// Dry run published its diff. **Terminal.**
    Reported,
    Gated,
    Applying,
    Applied,
    PostVerified,
    /// Apply and post-apply check finished. **Terminal.**
    Done,
    /// Apply gate refused; nothing was mutated. **Terminal.**
    Refused,
    /// Unrecoverable error. **Terminal.**
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "INIT",
            RunState::Loaded => "LOADED",
            RunState::Diffed => "DIFFED",
            RunState::Verified => "VERIFIED",
            RunState::Reported => "REPORTED",
            RunState::Gated => "GATED",
            RunState::Applying => "APPLYING",
            RunState::Applied => "APPLIED",
            RunState::PostVerified => "POST_VERIFIED",
            RunState::Done => "DONE",
            RunState::Refused => "REFUSED",
            RunState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Reported | RunState::Done | RunState::Refused | RunState::Failed
        )
    }

    pub fn can_transition_to(&self, to: RunState) -> bool {
        use RunState::*;
        match (*self, to) {
            (Init, Loaded)
            | (Loaded, Diffed)
            | (Diffed, Verified)
            | (Verified, Reported)
            | (Verified, Gated)
            | (Gated, Refused)
            | (Gated, Applying)
            | (Applying, Applied)
            | (Applied, PostVerified)
            | (PostVerified, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An illegal state change was requested. This is a programming error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: RunState,
    pub to: RunState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal run transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Current state plus every state visited, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStateMachine {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn transition(&mut self, to: RunState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        info!(from = self.state.as_str(), to = to.as_str(), "run state");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `FAILED`, returning the state the run was in. A run already in
    /// a terminal state stays where it is.
    pub fn fail(&mut self) -> RunState {
        let last = self.state;
        if !last.is_terminal() {
            self.state = RunState::Failed;
            self.history.push(RunState::Failed);
        }
        last
    }
}

// ---------------------------------------------------------------------------
// Configuration + results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Apply,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::DryRun => "dry_run",
            RunMode::Apply => "apply",
        }
    }
}

/// The only knobs that change core behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfiguration {
    pub max_add: Option<usize>,
    pub max_delete: Option<usize>,
    /// Operator confirmed the apply. Never defaulted to true.
    pub confirmed: bool,
    pub skip_verification: bool,
}

impl RunConfiguration {
    pub fn limits(&self) -> ApplyLimits {
        ApplyLimits {
            max_add: self.max_add,
            max_delete: self.max_delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub final_state: RunState,
    pub history: Vec<RunState>,
    pub source_stats: DedupeStats,
    pub registry_stats: DedupeStats,
    pub raw_diff: ReconcileResult,
    /// Diff after verification (equal to `raw_diff` when skipped).
    pub planned: ReconcileResult,
    pub verify_stats: Option<VerifyStats>,
    pub refusal: Option<ApplyRefusal>,
    pub apply: Option<ApplyReport>,
    pub post_apply: Option<ReconcileResult>,
    pub post_verify_stats: Option<VerifyStats>,
}

impl RunReport {
    pub fn is_refused(&self) -> bool {
        self.final_state == RunState::Refused
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Source rows could not be obtained.
    Source(String),
    /// Registry snapshot could not be obtained.
    Registry(RegistryError),
    /// A report sink rejected a publish.
    Report(String),
    /// A bulk batch failed mid-apply.
    Mutation(ApplyAbort),
    Transition(TransitionError),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Source(msg) => write!(f, "source unavailable: {msg}"),
            FailureKind::Registry(err) => write!(f, "registry snapshot unavailable: {err}"),
            FailureKind::Report(msg) => write!(f, "report publish failed: {msg}"),
            FailureKind::Mutation(abort) => write!(f, "apply aborted: {abort}"),
            FailureKind::Transition(err) => write!(f, "{err}"),
        }
    }
}

/// Run ended in `FAILED`. `last_state` is the last state successfully reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub run_id: Uuid,
    pub last_state: RunState,
    pub kind: FailureKind,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RUN_FAILED run_id={} last_state={}: {}",
            self.run_id, self.last_state, self.kind
        )
    }
}

impl std::error::Error for RunFailure {}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a> {
    run_id: Uuid,
    mode: RunMode,
    config: RunConfiguration,
    page_size: u32,
    source: &'a dyn SourceProvider,
    reader: &'a dyn RegistryReader,
    writer: &'a dyn RegistryWriter,
    progress: Box<dyn ProgressObserver + 'a>,
    machine: RunStateMachine,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        mode: RunMode,
        config: RunConfiguration,
        source: &'a dyn SourceProvider,
        reader: &'a dyn RegistryReader,
        writer: &'a dyn RegistryWriter,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            config,
            page_size: 100,
            source,
            reader,
            writer,
            progress: Box::new(LogProgress),
            machine: RunStateMachine::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressObserver + 'a>) -> Self {
        self.progress = progress;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.machine.state()
    }

    /// Drive the run to a terminal state.
    pub async fn run(mut self, sink: &mut dyn ReportSink) -> Result<RunReport, RunFailure> {
        let span = info_span!("run", run_id = %self.run_id, mode = self.mode.as_str());
        self.drive(sink).instrument(span).await
    }

    async fn drive(&mut self, sink: &mut dyn ReportSink) -> Result<RunReport, RunFailure> {
        info!(
            max_add = ?self.config.max_add,
            max_delete = ?self.config.max_delete,
            confirmed = self.config.confirmed,
            skip_verification = self.config.skip_verification,
            "run started"
        );

        // INIT -> LOADED
        let source = match load_source(self.source) {
            Ok(s) => s,
            Err(e) => return Err(self.fail(FailureKind::Source(format!("{e:#}")))),
        };
        let registry = self.registry_snapshot().await?;
        self.advance(RunState::Loaded)?;

        // LOADED -> DIFFED
        let raw_diff = reconcile(&source.entries, &registry.entries);
        info!(summary = %raw_diff.summary(), "raw diff");
        self.advance(RunState::Diffed)?;

        // DIFFED -> VERIFIED
        let (planned, verify_stats) = self.verify(&raw_diff).await;
        self.advance(RunState::Verified)?;

        self.publish(sink, ReportStage::Planned, &planned)?;

        let mut report = RunReport {
            run_id: self.run_id,
            mode: self.mode,
            final_state: RunState::Verified,
            history: Vec::new(),
            source_stats: source.stats,
            registry_stats: registry.stats,
            raw_diff,
            planned,
            verify_stats,
            refusal: None,
            apply: None,
            post_apply: None,
            post_verify_stats: None,
        };

        if self.mode == RunMode::DryRun {
            self.advance(RunState::Reported)?;
            return Ok(self.finish(report));
        }

        // VERIFIED -> GATED
        self.advance(RunState::Gated)?;
        if let ApplyGate::Refused(refusal) =
            check_apply_gate(&report.planned, self.config.limits(), self.config.confirmed)
        {
            warn!(reason = %refusal, "apply refused; registry untouched");
            report.refusal = Some(refusal);
            self.advance(RunState::Refused)?;
            return Ok(self.finish(report));
        }

        // GATED -> APPLYING -> APPLIED
        self.advance(RunState::Applying)?;
        let applied = match execute_plan(&report.planned, self.writer).await {
            Ok(applied) => applied,
            Err(abort) => return Err(self.fail(FailureKind::Mutation(abort))),
        };
        report.apply = Some(applied);
        self.advance(RunState::Applied)?;

        // APPLIED -> POST_VERIFIED: fresh snapshot, fresh diff
        let fresh = self.registry_snapshot().await?;
        let post_raw = reconcile(&source.entries, &fresh.entries);
        let (post_apply, post_verify_stats) = self.verify(&post_raw).await;
        if !post_apply.is_clean() {
            warn!(summary = %post_apply.summary(), "post-apply diff is not empty");
        }
        self.advance(RunState::PostVerified)?;

        self.publish(sink, ReportStage::PostApply, &post_apply)?;
        report.post_apply = Some(post_apply);
        report.post_verify_stats = post_verify_stats;

        self.advance(RunState::Done)?;
        Ok(self.finish(report))
    }

    async fn registry_snapshot(&mut self) -> Result<Snapshot, RunFailure> {
        match load_registry_snapshot(self.reader, self.page_size).await {
            Ok(s) => Ok(s),
            Err(e) => Err(self.fail(FailureKind::Registry(e))),
        }
    }

    async fn verify(&mut self, diff: &ReconcileResult) -> (ReconcileResult, Option<VerifyStats>) {
        if self.config.skip_verification {
            info!("verification skipped by configuration");
            return (diff.clone(), None);
        }
        let outcome = verify_diff(diff, self.reader, self.progress.as_mut()).await;
        info!(summary = %outcome.result.summary(), "verified diff");
        (outcome.result, Some(outcome.stats))
    }

    fn publish(
        &mut self,
        sink: &mut dyn ReportSink,
        stage: ReportStage,
        result: &ReconcileResult,
    ) -> Result<(), RunFailure> {
        let report = StageReport::new(self.run_id, self.mode, stage, result.clone());
        match sink.publish(&report) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(FailureKind::Report(format!("{stage}: {e:#}")))),
        }
    }

    fn advance(&mut self, to: RunState) -> Result<(), RunFailure> {
        match self.machine.transition(to) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(FailureKind::Transition(e))),
        }
    }

    fn fail(&mut self, kind: FailureKind) -> RunFailure {
        let last_state = self.machine.fail();
        error!(last_state = last_state.as_str(), error = %kind, "run failed");
        RunFailure {
            run_id: self.run_id,
            last_state,
            kind,
        }
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.final_state = self.machine.state();
        report.history = self.machine.history().to_vec();
        info!(final_state = report.final_state.as_str(), "run finished");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_path_is_legal() {
        let mut m = RunStateMachine::new();
        for s in [
            RunState::Loaded,
            RunState::Diffed,
            RunState::Verified,
            RunState::Reported,
        ] {
            m.transition(s).unwrap();
        }
        assert!(m.state().is_terminal());
        assert_eq!(m.history().len(), 5);
    }

    #[test]
    fn apply_path_is_legal() {
        let mut m = RunStateMachine::new();
        for s in [
            RunState::Loaded,
            RunState::Diffed,
            RunState::Verified,
            RunState::Gated,
            RunState::Applying,
            RunState::Applied,
            RunState::PostVerified,
            RunState::Done,
        ] {
            m.transition(s).unwrap();
        }
        assert_eq!(m.state(), RunState::Done);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut m = RunStateMachine::new();
        m.transition(RunState::Loaded).unwrap();
        let err = m.transition(RunState::Applying).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: RunState::Loaded,
                to: RunState::Applying
            }
        );
        assert_eq!(err.to_string(), "illegal run transition: LOADED -> APPLYING");
        assert_eq!(m.state(), RunState::Loaded);
    }

    #[test]
    fn dry_run_cannot_continue_into_apply() {
        assert!(!RunState::Reported.can_transition_to(RunState::Gated));
        assert!(!RunState::Refused.can_transition_to(RunState::Applying));
    }

    #[test]
    fn fail_records_last_state_and_is_sticky() {
        let mut m = RunStateMachine::new();
        m.transition(RunState::Loaded).unwrap();
        assert_eq!(m.fail(), RunState::Loaded);
        assert_eq!(m.state(), RunState::Failed);
        assert_eq!(m.fail(), RunState::Failed);
        assert!(!RunState::Failed.can_transition_to(RunState::Failed));
        assert_eq!(
            m.history(),
            &[RunState::Init, RunState::Loaded, RunState::Failed]
        );
    }

    #[test]
    fn config_limits_carry_over() {
        let cfg = RunConfiguration {
            max_add: Some(10),
            max_delete: None,
            confirmed: true,
            skip_verification: false,
        };
        assert_eq!(
            cfg.limits(),
            ApplyLimits {
                max_add: Some(10),
                max_delete: None
            }
        );
        assert!(!RunConfiguration::default().confirmed);
    }
}
