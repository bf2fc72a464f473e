//! CSV source provider.
//!
//! Header row required. Number column: `number` or `Phone Number`.
//! Label column (optional): `branded_name`, `Branded Name` or `brandedName`.
//! When several alias columns are present, each row takes the first
//! non-empty cell in the alias order above. Cells are trimmed; blank labels
//! count as absent.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use dsync_reconcile::RawRow;
use dsync_runtime::SourceProvider;

const NUMBER_HEADERS: &[&str] = &["number", "Phone Number"];
const LABEL_HEADERS: &[&str] = &["branded_name", "Branded Name", "brandedName"];

pub const DEFAULT_INPUT_DIR: &str = "data/input";
pub const SAMPLE_CSV: &str = "data/samples/sample_numbers.csv";

#[derive(Debug, Clone)]
pub struct CsvSourceProvider {
    path: PathBuf,
}

impl CsvSourceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceProvider for CsvSourceProvider {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_rows(&self) -> Result<Vec<RawRow>> {
        read_csv_file(&self.path)
    }
}

pub fn read_csv_file(path: &Path) -> Result<Vec<RawRow>> {
    let file =
        File::open(path).with_context(|| format!("open source csv: {}", path.display()))?;
    decode_rows(file).with_context(|| format!("decode source csv: {}", path.display()))
}

pub fn decode_rows<R: Read>(input: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = rdr.headers().context("read csv header")?.clone();
    let columns = |aliases: &[&str]| -> Vec<usize> {
        aliases
            .iter()
            .filter_map(|a| headers.iter().position(|h| h == *a))
            .collect()
    };

    let number_cols = columns(NUMBER_HEADERS);
    if number_cols.is_empty() {
        bail!(
            "CSV_MISSING_COLUMN: expected one of {:?}, found {:?}",
            NUMBER_HEADERS,
            headers.iter().collect::<Vec<_>>()
        );
    }
    let label_cols = columns(LABEL_HEADERS);

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("csv record {}", i + 1))?;
        let number = first_filled(&rec, &number_cols).unwrap_or("");
        let label = first_filled(&rec, &label_cols);
        if number.is_empty() && label.is_none() {
            continue;
        }
        out.push(RawRow::new(number, label));
    }
    Ok(out)
}

fn first_filled<'r>(rec: &'r csv::StringRecord, cols: &[usize]) -> Option<&'r str> {
    cols.iter()
        .filter_map(|c| rec.get(*c))
        .find(|cell| !cell.is_empty())
}

/// Explicit path wins. Otherwise the newest `*.csv` in `<root>/data/input`,
/// then `<root>/data/samples/sample_numbers.csv`.
pub fn resolve_source_path(root: &Path, explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p);
    }

    if let Some(newest) = newest_csv(&root.join(DEFAULT_INPUT_DIR))? {
        return Ok(newest);
    }

    let sample = root.join(SAMPLE_CSV);
    if sample.is_file() {
        return Ok(sample);
    }

    bail!(
        "no source CSV: pass --csv, drop a file into {} or provide {}",
        DEFAULT_INPUT_DIR,
        SAMPLE_CSV
    )
}

fn newest_csv(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if best.as_ref().map_or(true, |(t, _)| modified > *t) {
            best = Some((modified, path));
        }
    }
    Ok(best.map(|(_, p)| p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn decodes_canonical_headers() {
        let csv = "number,branded_name\n555-111-1111, Acme \n5552222222,\n";
        let rows = decode_rows(csv.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                RawRow::new("555-111-1111", Some("Acme")),
                RawRow::new("5552222222", None),
            ]
        );
    }

    #[test]
    fn accepts_alternate_headers_in_any_order() {
        let csv = "Branded Name,Phone Number\nBeta,(555) 222-2222\n";
        let rows = decode_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows, vec![RawRow::new("(555) 222-2222", Some("Beta"))]);

        let csv = "brandedName,number\nGamma,5553333333\n";
        let rows = decode_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].branded_name_raw.as_deref(), Some("Gamma"));
    }

    #[test]
    fn alias_columns_fall_back_per_row() {
        let csv = "brandedName,number,Branded Name,Phone Number,branded_name\n\
                   Camel,5551111111,Spaced,,Snake\n\
                   Camel,,Spaced,5552222222,\n\
                   Camel,5553333333,,,\n";
        let rows = decode_rows(csv.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                RawRow::new("5551111111", Some("Snake")),
                RawRow::new("5552222222", Some("Spaced")),
                RawRow::new("5553333333", Some("Camel")),
            ]
        );
    }

    #[test]
    fn label_column_is_optional() {
        let rows = decode_rows("number\n5551111111\n".as_bytes()).unwrap();
        assert_eq!(rows, vec![RawRow::new("5551111111", None)]);
    }

    #[test]
    fn missing_number_column_is_an_error() {
        let err = decode_rows("phone,label\n5551111111,x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("CSV_MISSING_COLUMN"));
    }

    #[test]
    fn quoted_labels_with_commas_survive() {
        let rows = decode_rows("number,branded_name\n5551111111,\"Acme, Inc.\"\n".as_bytes()).unwrap();
        assert_eq!(rows[0].branded_name_raw.as_deref(), Some("Acme, Inc."));
    }

    #[test]
    fn default_resolution_prefers_newest_input_then_sample() {
        let root = tempfile::tempdir().unwrap();
        assert!(resolve_source_path(root.path(), None).is_err());

        let samples = root.path().join("data/samples");
        std::fs::create_dir_all(&samples).unwrap();
        std::fs::write(samples.join("sample_numbers.csv"), "number\n").unwrap();
        assert_eq!(
            resolve_source_path(root.path(), None).unwrap(),
            root.path().join(SAMPLE_CSV)
        );

        let input = root.path().join("data/input");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("old.csv"), "number\n").unwrap();
        std::fs::write(input.join("new.csv"), "number\n").unwrap();
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(input.join("old.csv"))
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();
        std::fs::write(input.join("notes.txt"), "ignore me").unwrap();
        assert_eq!(
            resolve_source_path(root.path(), None).unwrap(),
            input.join("new.csv")
        );

        let explicit = PathBuf::from("/tmp/explicit.csv");
        assert_eq!(
            resolve_source_path(root.path(), Some(explicit.clone())).unwrap(),
            explicit
        );
    }
}
