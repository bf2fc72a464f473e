//! `dsync verify`: direct per-number lookups, bypassing the list view.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use dsync_config::ConfigMode;
use dsync_reconcile::{normalize, DidNumber};
use dsync_registry::{LookupOutcome, RegistryReader};
use tracing::warn;

use super::{connect, load_context};
use crate::source_csv::read_csv_file;
use crate::RegistryArgs;

/// Returns `true` when every input is confirmed present.
pub async fn run_verify(
    registry: RegistryArgs,
    numbers: Vec<String>,
    csv: Option<PathBuf>,
) -> Result<bool> {
    let inputs = collect_inputs(numbers, csv)?;
    let (valid, invalid) = canonical_inputs(&inputs);
    for raw in &invalid {
        println!("{raw:?} exists=false error=invalid number");
    }

    let ctx = load_context(&registry, ConfigMode::Read)?;
    let client = connect(&ctx).await?;

    let mut present = 0usize;
    let mut ambiguous = 0usize;
    for number in &valid {
        match client.lookup(number).await {
            LookupOutcome::Found => {
                present += 1;
                println!("{number} exists=true");
            }
            LookupOutcome::NotFound => println!("{number} exists=false"),
            LookupOutcome::Error(detail) => {
                ambiguous += 1;
                warn!(number = %number, detail = %detail, "lookup inconclusive");
                println!("{number} exists=false error={detail}");
            }
        }
    }

    let checked = valid.len() + invalid.len();
    println!(
        "checked={checked} present={present} missing={} ambiguous={ambiguous} invalid={}",
        valid.len() - present - ambiguous,
        invalid.len()
    );
    Ok(present == checked)
}

fn collect_inputs(numbers: Vec<String>, csv: Option<PathBuf>) -> Result<Vec<String>> {
    let inputs: Vec<String> = match csv {
        Some(path) => read_csv_file(&path)?
            .into_iter()
            .map(|row| row.number_raw)
            .filter(|n| !n.is_empty())
            .collect(),
        None => numbers
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect(),
    };
    if inputs.is_empty() {
        bail!("nothing to verify: pass --numbers or a --csv with at least one number");
    }
    Ok(inputs)
}

/// Canonical numbers in first-seen order, plus the inputs that failed to
/// normalize.
fn canonical_inputs(inputs: &[String]) -> (Vec<DidNumber>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for raw in inputs {
        match normalize(raw) {
            Some(n) => {
                if seen.insert(n.clone()) {
                    valid.push(n);
                }
            }
            None => invalid.push(raw.clone()),
        }
    }
    (valid, invalid)
}
