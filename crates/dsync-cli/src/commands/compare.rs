//! `dsync compare-csv`: offline diff of a source file against an export.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use dsync_reconcile::{dedupe, reconcile, NumberEntry, ReconcileResult};

use crate::report::render_diff;
use crate::source_csv::read_csv_file;

const COMPARE_SAMPLES: usize = 10;

pub fn run_compare(src: &Path, dst: &Path) -> Result<()> {
    let source = load_entries(src)?;
    let export = load_entries(dst)?;
    let result = reconcile(&source, &export);
    print!("{}", render_compare(source.len(), export.len(), &result));
    Ok(())
}

fn load_entries(path: &Path) -> Result<Vec<NumberEntry>> {
    let rows = read_csv_file(path)?;
    Ok(dedupe(&rows))
}

fn render_compare(source_count: usize, export_count: usize, result: &ReconcileResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "source_count={source_count} export_count={export_count}");
    let _ = writeln!(out, "{}", result.summary());
    render_diff(&mut out, result, COMPARE_SAMPLES);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_two_files_offline() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.csv");
        let dst = dir.path().join("dst.csv");
        std::fs::write(
            &src,
            "number,branded_name\n5551111111,Acme\n555-222-2222,Beta\n5551111111,Dup\n",
        )
        .unwrap();
        std::fs::write(&dst, "number,branded_name\n5552222222,Old\n5553333333,\n").unwrap();

        let source = load_entries(&src).unwrap();
        let export = load_entries(&dst).unwrap();
        assert_eq!(source.len(), 2);

        let text = render_compare(source.len(), export.len(), &reconcile(&source, &export));
        assert!(text.contains("source_count=2 export_count=2"), "{text}");
        assert!(text.contains("to_add=1 to_delete=1 mismatched=1"), "{text}");
        assert!(text.contains("  5551111111 \"Acme\""), "{text}");
        assert!(text.contains("  5553333333 -"), "{text}");
    }
}
