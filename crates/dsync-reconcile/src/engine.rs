use std::collections::HashMap;

use crate::{DidNumber, MismatchEntry, NumberEntry, ReconcileResult};

fn label_map(entries: &[NumberEntry]) -> HashMap<&DidNumber, Option<&str>> {
    entries
        .iter()
        .map(|e| (&e.number, e.branded_name.as_deref()))
        .collect()
}

/// Three-way diff of a source list against a registry snapshot:
/// - in source, not in registry => `to_add`
/// - in registry, not in source => `to_delete`
/// - in both, labels differ (including present vs absent) => `mismatched`
///
/// Both inputs must already be canonical and deduplicated (see
/// [`crate::Deduplicator`]); this function does not re-normalize.
///
/// Ordering: `to_add` and `mismatched` follow source order, `to_delete`
/// follows registry order. Callers comparing results should treat each
/// category as a set.
pub fn reconcile(source: &[NumberEntry], registry: &[NumberEntry]) -> ReconcileResult {
    let source_map = label_map(source);
    let registry_map = label_map(registry);

    let mut out = ReconcileResult::empty();

    for entry in source {
        match registry_map.get(&entry.number).copied() {
            None => out.to_add.push(entry.clone()),
            Some(api_name) if api_name != entry.branded_name.as_deref() => {
                out.mismatched.push(MismatchEntry {
                    number: entry.number.clone(),
                    source_branded_name: entry.branded_name.clone(),
                    api_branded_name: api_name.map(str::to_string),
                });
            }
            Some(_) => {}
        }
    }

    for entry in registry {
        if !source_map.contains_key(&entry.number) {
            out.to_delete.push(entry.clone());
        }
    }

    out
}
