//! `dsync sync`: one reconciliation run, dry or applied.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use dsync_config::{ConfigMode, SyncSettings};
use dsync_runtime::{Orchestrator, ReportSink, RunConfiguration, RunMode, RunReport};
use tracing::info;

use super::{connect, load_context};
use crate::report::{JsonFileSink, StdoutSink};
use crate::source_csv::{resolve_source_path, CsvSourceProvider};
use crate::RegistryArgs;

pub struct SyncArgs {
    pub registry: RegistryArgs,
    pub csv: Option<PathBuf>,
    pub apply: bool,
    pub yes: bool,
    pub max_add: Option<usize>,
    pub max_delete: Option<usize>,
    pub skip_verify: bool,
    pub json_dir: Option<PathBuf>,
    pub no_json: bool,
}

pub async fn run_sync(args: SyncArgs) -> Result<()> {
    let (run_mode, cfg_mode) = if args.apply {
        (RunMode::Apply, ConfigMode::Apply)
    } else {
        (RunMode::DryRun, ConfigMode::DryRun)
    };

    let ctx = load_context(&args.registry, cfg_mode)?;
    let config = run_configuration(&args, &ctx.settings.sync);

    let csv_path = resolve_source_path(Path::new("."), args.csv.clone())?;
    info!(source = %csv_path.display(), "source csv selected");
    let source = CsvSourceProvider::new(csv_path);

    let client = connect(&ctx).await?;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(StdoutSink)];
    if !args.no_json {
        let dir = args
            .json_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&ctx.settings.report.json_dir));
        sinks.push(Box::new(JsonFileSink::new(dir)));
    }

    let report = Orchestrator::new(run_mode, config, &source, &client, &client)
        .with_page_size(ctx.settings.registry.page_size)
        .run(&mut sinks)
        .await?;

    print_outcome(&report);

    if let Some(refusal) = &report.refusal {
        bail!("{refusal}");
    }
    Ok(())
}

/// Flags override config. `confirmed` only ever comes from `--yes`.
fn run_configuration(args: &SyncArgs, sync: &SyncSettings) -> RunConfiguration {
    RunConfiguration {
        max_add: args.max_add.or(sync.max_add),
        max_delete: args.max_delete.or(sync.max_delete),
        confirmed: args.yes,
        skip_verification: args.skip_verify || sync.skip_verification,
    }
}

fn print_outcome(report: &RunReport) {
    println!("run_id={}", report.run_id);
    println!("final_state={}", report.final_state.as_str());
    if let Some(stats) = &report.verify_stats {
        println!(
            "verify lookups={} add_already_present={} delete_already_absent={} ambiguous={}",
            stats.lookups, stats.add_already_present, stats.delete_already_absent, stats.ambiguous
        );
    }
    if let Some(applied) = &report.apply {
        println!(
            "applied added={} deleted={} batches={} excluded={}",
            applied.added,
            applied.deleted,
            applied.batches.len(),
            applied.excluded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SyncArgs {
        SyncArgs {
            registry: RegistryArgs::default(),
            csv: None,
            apply: true,
            yes: false,
            max_add: None,
            max_delete: None,
            skip_verify: false,
            json_dir: None,
            no_json: true,
        }
    }

    #[test]
    fn flags_override_config_limits() {
        let sync = SyncSettings {
            max_add: Some(10),
            max_delete: Some(20),
            skip_verification: false,
        };
        let mut a = args();
        a.max_add = Some(3);
        let cfg = run_configuration(&a, &sync);
        assert_eq!(cfg.max_add, Some(3));
        assert_eq!(cfg.max_delete, Some(20));
        assert!(!cfg.skip_verification);
    }

    #[test]
    fn confirmation_only_from_flag() {
        let sync = SyncSettings::default();
        assert!(!run_configuration(&args(), &sync).confirmed);

        let mut a = args();
        a.yes = true;
        assert!(run_configuration(&a, &sync).confirmed);
    }

    #[test]
    fn skip_verification_from_either_side() {
        let sync = SyncSettings {
            skip_verification: true,
            ..SyncSettings::default()
        };
        assert!(run_configuration(&args(), &sync).skip_verification);

        let mut a = args();
        a.skip_verify = true;
        assert!(run_configuration(&a, &SyncSettings::default()).skip_verification);
    }
}
