//! Collection building: normalize, drop invalid rows, first occurrence wins.
//!
//! The same [`Deduplicator`] is used for the source list and for the registry
//! snapshot. The registry side feeds it page by page, so duplicates that show
//! up across pages (registry mutated mid-pagination) resolve exactly like
//! duplicates inside one source file.
//!
//! Labels: source rows are trimmed ([`LabelRule::Trimmed`]); registry records
//! keep their label verbatim ([`LabelRule::Verbatim`]) so stray whitespace in
//! the registry is reported as a mismatch.

use std::collections::HashSet;

use crate::normalize::{clean_branded_name, normalize, registry_branded_name};
use crate::{DidNumber, NumberEntry, RawRow};

/// What happened to the rows fed into a [`Deduplicator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DedupeStats {
    /// Rows kept (first sighting of a canonical number).
    pub kept: usize,
    /// Rows whose number could not be canonicalized.
    pub rejected: usize,
    /// Rows whose canonical number had already been kept.
    pub duplicates: usize,
}

impl DedupeStats {
    pub fn seen(&self) -> usize {
        self.kept + self.rejected + self.duplicates
    }
}

/// How a row's raw label becomes the entry's `branded_name`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelRule {
    /// Trim; blank becomes absent. Source rows.
    #[default]
    Trimmed,
    /// As stored; only the empty string becomes absent. Registry records.
    Verbatim,
}

impl LabelRule {
    fn apply(self, raw: Option<&str>) -> Option<String> {
        match self {
            LabelRule::Trimmed => clean_branded_name(raw),
            LabelRule::Verbatim => registry_branded_name(raw),
        }
    }
}

/// Incremental first-occurrence-wins collector.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DidNumber>,
    entries: Vec<NumberEntry>,
    stats: DedupeStats,
    labels: LabelRule,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label_rule(labels: LabelRule) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    /// Feed one row. Returns `true` if it was kept.
    pub fn push(&mut self, row: &RawRow) -> bool {
        let Some(number) = normalize(&row.number_raw) else {
            self.stats.rejected += 1;
            return false;
        };

        if !self.seen.insert(number.clone()) {
            self.stats.duplicates += 1;
            return false;
        }

        self.entries.push(NumberEntry::new(
            number,
            self.labels.apply(row.branded_name_raw.as_deref()),
        ));
        self.stats.kept += 1;
        true
    }

    pub fn extend<'a, I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = &'a RawRow>,
    {
        for row in rows {
            self.push(row);
        }
    }

    pub fn stats(&self) -> DedupeStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the collector, returning entries in first-seen order.
    pub fn finish(self) -> (Vec<NumberEntry>, DedupeStats) {
        (self.entries, self.stats)
    }
}

/// One-shot convenience over [`Deduplicator`].
pub fn dedupe<'a, I>(rows: I) -> Vec<NumberEntry>
where
    I: IntoIterator<Item = &'a RawRow>,
{
    let mut d = Deduplicator::new();
    d.extend(rows);
    d.finish().0
}
