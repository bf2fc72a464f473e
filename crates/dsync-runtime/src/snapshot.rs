//! Building the two canonical collections a run diffs.
//!
//! Registry paging: page 1 is fetched first and its `total_pages` is the
//! only one trusted. Pages `2..=total_pages` follow strictly in order, each
//! feeding the same [`Deduplicator`], so a number that moves between pages
//! mid-listing is kept once (first sighting wins).

use anyhow::{Context, Result};
use dsync_reconcile::{DedupeStats, Deduplicator, LabelRule, NumberEntry};
use dsync_registry::{RegistryError, RegistryReader};
use tracing::{debug, info};

use crate::SourceProvider;

/// A deduplicated, canonical collection plus how it was built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: Vec<NumberEntry>,
    pub stats: DedupeStats,
    /// Registry pages read; 0 for a source snapshot.
    pub pages: u32,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_source(provider: &dyn SourceProvider) -> Result<Snapshot> {
    let origin = provider.describe();
    let rows = provider
        .load_rows()
        .with_context(|| format!("load source rows from {origin}"))?;

    let mut dedupe = Deduplicator::new();
    dedupe.extend(&rows);
    let (entries, stats) = dedupe.finish();

    info!(
        origin = %origin,
        rows = stats.seen(),
        kept = stats.kept,
        rejected = stats.rejected,
        duplicates = stats.duplicates,
        "source loaded"
    );

    Ok(Snapshot {
        entries,
        stats,
        pages: 0,
    })
}

pub async fn load_registry_snapshot(
    reader: &dyn RegistryReader,
    page_size: u32,
) -> Result<Snapshot, RegistryError> {
    let page_size = page_size.max(1);
    let mut dedupe = Deduplicator::with_label_rule(LabelRule::Verbatim);

    let first = reader.fetch_page(1, page_size).await?;
    let total_pages = first.total_pages.max(1);
    dedupe.extend(&first.records);
    debug!(page = 1, total_pages, records = first.records.len(), "registry page");

    for page in 2..=total_pages {
        let next = reader.fetch_page(page, page_size).await?;
        dedupe.extend(&next.records);
        debug!(page, total_pages, records = next.records.len(), "registry page");
    }

    let (entries, stats) = dedupe.finish();
    info!(
        source = reader.source_name(),
        pages = total_pages,
        records = stats.seen(),
        kept = stats.kept,
        rejected = stats.rejected,
        duplicates = stats.duplicates,
        "registry snapshot loaded"
    );

    Ok(Snapshot {
        entries,
        stats,
        pages: total_pages,
    })
}
