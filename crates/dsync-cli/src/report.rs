//! Report sinks: human-readable stdout and `diff.<stage>.json` files.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dsync_reconcile::{DiffSummary, NumberEntry, ReconcileResult};
use dsync_runtime::{ReportSink, ReportStage, RunMode, StageReport};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Rows shown per category before `...and N more`.
pub const SAMPLE_ROWS: usize = 5;

// ---------------------------------------------------------------------------
// stdout
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn publish(&mut self, report: &StageReport) -> Result<()> {
        print!("{}", render_stage(report));
        Ok(())
    }
}

pub fn render_stage(report: &StageReport) -> String {
    let mut out = String::new();
    let title = match report.stage {
        ReportStage::Planned => "planned changes",
        ReportStage::PostApply => "post-apply check",
    };
    let _ = writeln!(
        out,
        "== {title} ({}) run_id={} ==",
        report.mode.as_str(),
        report.run_id
    );
    let _ = writeln!(out, "{}", report.summary);
    if report.result.is_clean() {
        let _ = writeln!(out, "registry matches source");
        return out;
    }
    render_diff(&mut out, &report.result, SAMPLE_ROWS);
    out
}

/// Category headings plus up to `limit` sample rows each.
pub fn render_diff(out: &mut String, result: &ReconcileResult, limit: usize) {
    render_entries(out, "to_add", &result.to_add, limit);
    render_entries(out, "to_delete", &result.to_delete, limit);

    if !result.mismatched.is_empty() {
        let _ = writeln!(out, "mismatched:");
        for m in result.mismatched.iter().take(limit) {
            let _ = writeln!(
                out,
                "  {} source={} registry={}",
                m.number,
                label(m.source_branded_name.as_deref()),
                label(m.api_branded_name.as_deref())
            );
        }
        more(out, result.mismatched.len(), limit);
    }
}

fn render_entries(out: &mut String, heading: &str, entries: &[NumberEntry], limit: usize) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading}:");
    for e in entries.iter().take(limit) {
        let _ = writeln!(out, "  {} {}", e.number, label(e.branded_name.as_deref()));
    }
    more(out, entries.len(), limit);
}

fn more(out: &mut String, total: usize, limit: usize) {
    if total > limit {
        let _ = writeln!(out, "  ...and {} more", total - limit);
    }
}

fn label(name: Option<&str>) -> String {
    match name {
        Some(n) => format!("{n:?}"),
        None => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// JSON files
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    mode: RunMode,
    stage: ReportStage,
    generated_at_utc: DateTime<Utc>,
    summary: DiffSummary,
    #[serde(flatten)]
    result: &'a ReconcileResult,
}

/// Writes each stage to `<dir>/diff.<stage>.json`, replacing earlier runs.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, stage: ReportStage) -> PathBuf {
        self.dir.join(format!("diff.{}.json", stage.as_str()))
    }
}

impl ReportSink for JsonFileSink {
    fn publish(&mut self, report: &StageReport) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create report dir: {}", self.dir.display()))?;

        let doc = JsonReport {
            run_id: report.run_id,
            mode: report.mode,
            stage: report.stage,
            generated_at_utc: Utc::now(),
            summary: report.summary,
            result: &report.result,
        };
        let body = serde_json::to_string_pretty(&doc).context("serialize json report")?;

        let path = self.path_for(report.stage);
        fs::write(&path, body).with_context(|| format!("write report: {}", path.display()))?;
        info!(path = %path.display(), stage = report.stage.as_str(), "json report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsync_reconcile::{DidNumber, MismatchEntry};

    fn entry(n: &str, name: Option<&str>) -> NumberEntry {
        NumberEntry::new(n.parse::<DidNumber>().unwrap(), name.map(str::to_string))
    }

    fn sample_report() -> StageReport {
        let to_add = (0..7)
            .map(|i| entry(&format!("555000000{i}"), Some("Acme")))
            .collect();
        let result = ReconcileResult {
            to_add,
            to_delete: vec![entry("5553333333", None)],
            mismatched: vec![MismatchEntry {
                number: "5552222222".parse().unwrap(),
                source_branded_name: Some("Beta".into()),
                api_branded_name: None,
            }],
        };
        StageReport::new(Uuid::nil(), RunMode::DryRun, ReportStage::Planned, result)
    }

    #[test]
    fn stdout_render_caps_samples() {
        let text = render_stage(&sample_report());
        assert!(text.contains("to_add=7 to_delete=1 mismatched=1"), "{text}");
        assert!(text.contains("  5550000004 \"Acme\""), "{text}");
        assert!(!text.contains("5550000005"), "{text}");
        assert!(text.contains("  ...and 2 more"), "{text}");
        assert!(text.contains("  5553333333 -"), "{text}");
        assert!(text.contains("  5552222222 source=\"Beta\" registry=-"), "{text}");
    }

    #[test]
    fn clean_diff_says_so() {
        let report = StageReport::new(
            Uuid::nil(),
            RunMode::Apply,
            ReportStage::PostApply,
            ReconcileResult::empty(),
        );
        let text = render_stage(&report);
        assert!(text.contains("post-apply check (apply)"));
        assert!(text.contains("registry matches source"));
    }

    #[test]
    fn json_sink_writes_stage_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonFileSink::new(dir.path().join("nested"));
        let report = sample_report();
        sink.publish(&report).unwrap();

        let path = dir.path().join("nested").join("diff.planned.json");
        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["stage"], "planned");
        assert_eq!(v["mode"], "dry_run");
        assert_eq!(v["run_id"], Uuid::nil().to_string());
        assert_eq!(v["summary"]["to_add"], 7);
        assert_eq!(v["toAdd"].as_array().unwrap().len(), 7);
        assert_eq!(v["toDelete"][0]["number"], "5553333333");
        assert!(v["toDelete"][0].get("brandedName").is_none());
        assert_eq!(v["mismatched"][0]["sourceBrandedName"], "Beta");
        assert!(v["generated_at_utc"].is_string());
    }
}
