use anyhow::Result;
use dsync_reconcile::RawRow;

/// Supplies the authoritative source rows for a run.
///
/// Decoding (CSV, JSON, whatever) lives in the implementation. Rows come back
/// raw; normalization and dedupe happen in [`crate::load_source`].
pub trait SourceProvider: Send + Sync {
    /// Human-readable origin for logs, e.g. a file path.
    fn describe(&self) -> String;

    fn load_rows(&self) -> Result<Vec<RawRow>>;
}

/// Fixed in-memory rows. Used by tests and by callers that decoded elsewhere.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    label: String,
    rows: Vec<RawRow>,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self {
            label: label.into(),
            rows,
        }
    }
}

impl SourceProvider for StaticSource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn load_rows(&self) -> Result<Vec<RawRow>> {
        Ok(self.rows.clone())
    }
}
