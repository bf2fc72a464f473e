//! `dsync export`: registry snapshot to CSV.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use dsync_config::ConfigMode;
use dsync_reconcile::NumberEntry;
use dsync_runtime::load_registry_snapshot;
use tracing::info;

use super::{connect, load_context};
use crate::RegistryArgs;

pub const DEFAULT_EXPORT_DIR: &str = "reports/csv";

pub async fn run_export(registry: RegistryArgs, out: Option<PathBuf>) -> Result<()> {
    let ctx = load_context(&registry, ConfigMode::Read)?;
    let client = connect(&ctx).await?;

    let snapshot = load_registry_snapshot(&client, ctx.settings.registry.page_size)
        .await
        .context("registry snapshot failed")?;

    let path = out.unwrap_or_else(|| {
        default_export_path(&ctx.account_id, &ctx.org_id, Utc::now().timestamp_millis())
    });
    write_export_csv(&path, &snapshot.entries)?;

    info!(
        rows = snapshot.len(),
        duplicates = snapshot.stats.duplicates,
        rejected = snapshot.stats.rejected,
        "export complete"
    );
    println!("exported={} path={}", snapshot.len(), path.display());
    Ok(())
}

pub fn default_export_path(account_id: &str, org_id: &str, unix_ms: i64) -> PathBuf {
    Path::new(DEFAULT_EXPORT_DIR).join(format!("dids_{account_id}_{org_id}_{unix_ms}.csv"))
}

/// `number,branded_name`; absent labels are written as empty cells.
pub fn write_export_csv(path: &Path, entries: &[NumberEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export dir: {}", parent.display()))?;
    }

    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("open export csv: {}", path.display()))?;
    w.write_record(["number", "branded_name"])?;
    for e in entries {
        w.write_record([e.number.as_str(), e.branded_name.as_deref().unwrap_or("")])?;
    }
    w.flush()
        .with_context(|| format!("flush export csv: {}", path.display()))?;
    Ok(())
}
