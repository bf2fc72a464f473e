use std::fmt;

use anyhow::Result;
use dsync_reconcile::{DiffSummary, ReconcileResult};
use serde::Serialize;
use uuid::Uuid;

use crate::RunMode;

/// Which diff a report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    /// Verified diff before any mutation (the whole output of a dry run).
    Planned,
    /// Fresh diff after apply; ideally empty.
    PostApply,
}

impl ReportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStage::Planned => "planned",
            ReportStage::PostApply => "post_apply",
        }
    }
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub stage: ReportStage,
    pub summary: DiffSummary,
    pub result: ReconcileResult,
}

impl StageReport {
    pub fn new(run_id: Uuid, mode: RunMode, stage: ReportStage, result: ReconcileResult) -> Self {
        Self {
            run_id,
            mode,
            stage,
            summary: result.summary(),
            result,
        }
    }
}

/// Where diffs go: stdout, JSON files, a test buffer.
pub trait ReportSink: Send {
    fn publish(&mut self, report: &StageReport) -> Result<()>;
}

/// Collects every published report in order.
impl ReportSink for Vec<StageReport> {
    fn publish(&mut self, report: &StageReport) -> Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

/// Fan out to several sinks; the first failure stops the fan-out.
impl ReportSink for Vec<Box<dyn ReportSink>> {
    fn publish(&mut self, report: &StageReport) -> Result<()> {
        for sink in self.iter_mut() {
            sink.publish(report)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsync_reconcile::{MismatchEntry, NumberEntry};

    #[test]
    fn stage_report_serializes_camel_case_result() {
        let result = ReconcileResult {
            to_add: vec![NumberEntry::new(
                "5551111111".parse().unwrap(),
                Some("Acme".into()),
            )],
            to_delete: vec![NumberEntry::new("5553333333".parse().unwrap(), None)],
            mismatched: vec![MismatchEntry {
                number: "5552222222".parse().unwrap(),
                source_branded_name: Some("Beta".into()),
                api_branded_name: None,
            }],
        };
        let report = StageReport::new(Uuid::nil(), RunMode::Apply, ReportStage::PostApply, result);

        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["run_id"], Uuid::nil().to_string());
        assert_eq!(v["mode"], "apply");
        assert_eq!(v["stage"], "post_apply");
        assert_eq!(v["summary"]["to_add"], 1);
        assert_eq!(v["result"]["toAdd"][0]["brandedName"], "Acme");
        assert!(v["result"]["toDelete"][0].get("brandedName").is_none());
        assert_eq!(v["result"]["mismatched"][0]["sourceBrandedName"], "Beta");
        assert!(v["result"]["mismatched"][0].get("apiBrandedName").is_none());
    }
}
