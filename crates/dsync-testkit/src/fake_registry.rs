use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use dsync_reconcile::{normalize, DidNumber, NumberEntry, RawRow};
use dsync_registry::{
    BulkAction, LookupOutcome, RegistryError, RegistryPage, RegistryReader, RegistryWriter,
};

/// Every call the fake received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    FetchPage { page: u32, page_size: u32 },
    Lookup(String),
    Bulk { action: BulkAction, numbers: Vec<String> },
}

#[derive(Default)]
struct State {
    /// Authoritative records, raw, in list order.
    records: Vec<RawRow>,
    /// When set, the list endpoint serves these rows instead of `records`.
    /// Direct lookups always read `records`.
    stale_list: Option<Vec<RawRow>>,
    lookup_errors: HashMap<String, String>,
    /// 1-based bulk call ordinals that fail.
    failing_bulk_calls: HashSet<usize>,
    failing_pages: HashSet<u32>,
    bulk_calls: usize,
    calls: Vec<FakeCall>,
}

/// In-memory registry with fault injection.
///
/// Bulk `add` appends records that are not already present; bulk `delete`
/// removes every record whose number normalizes to a deleted number. A
/// failing bulk call changes nothing.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RawRow>) -> Self {
        let fake = Self::new();
        fake.lock().records = records;
        fake
    }

    /// List endpoint lags: it serves `rows` until [`FakeRegistry::clear_stale_list`].
    pub fn set_stale_list(&self, rows: Vec<RawRow>) {
        self.lock().stale_list = Some(rows);
    }

    pub fn clear_stale_list(&self) {
        self.lock().stale_list = None;
    }

    /// Direct lookups for `number` return `LookupOutcome::Error(detail)`.
    pub fn fail_lookup(&self, number: &str, detail: &str) {
        self.lock()
            .lookup_errors
            .insert(number.to_string(), detail.to_string());
    }

    /// The `nth` bulk call (1-based, counting adds and deletes) is rejected.
    pub fn fail_bulk_call(&self, nth: usize) {
        self.lock().failing_bulk_calls.insert(nth);
    }

    pub fn fail_page(&self, page: u32) {
        self.lock().failing_pages.insert(page);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    /// `(action, batch size)` per bulk call, in order.
    pub fn bulk_calls(&self) -> Vec<(BulkAction, usize)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                FakeCall::Bulk { action, numbers } => Some((*action, numbers.len())),
                _ => None,
            })
            .collect()
    }

    pub fn lookup_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, FakeCall::Lookup(_)))
            .count()
    }

    /// Canonical numbers currently recorded, sorted.
    pub fn numbers(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .lock()
            .records
            .iter()
            .filter_map(|r| normalize(&r.number_raw))
            .map(String::from)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn branded_name(&self, number: &str) -> Option<String> {
        self.lock()
            .records
            .iter()
            .find(|r| normalize(&r.number_raw).map(String::from).as_deref() == Some(number))
            .and_then(|r| r.branded_name_raw.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn holds(records: &[RawRow], number: &DidNumber) -> bool {
    records
        .iter()
        .any(|r| normalize(&r.number_raw).as_ref() == Some(number))
}

#[async_trait::async_trait]
impl RegistryReader for FakeRegistry {
    fn source_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<RegistryPage, RegistryError> {
        let mut st = self.lock();
        st.calls.push(FakeCall::FetchPage { page, page_size });

        if st.failing_pages.contains(&page) {
            return Err(RegistryError::Api {
                status: 503,
                message: format!("page {page} unavailable"),
            });
        }

        let view = st.stale_list.as_ref().unwrap_or(&st.records);
        let size = page_size.max(1) as usize;
        let total_pages = view.len().div_ceil(size).max(1) as u32;
        let start = (page.saturating_sub(1) as usize) * size;
        let records = view.iter().skip(start).take(size).cloned().collect();

        Ok(RegistryPage {
            records,
            total_pages,
        })
    }

    async fn lookup(&self, number: &DidNumber) -> LookupOutcome {
        let mut st = self.lock();
        st.calls.push(FakeCall::Lookup(number.to_string()));

        if let Some(detail) = st.lookup_errors.get(number.as_str()) {
            return LookupOutcome::Error(detail.clone());
        }
        if holds(&st.records, number) {
            LookupOutcome::Found
        } else {
            LookupOutcome::NotFound
        }
    }
}

#[async_trait::async_trait]
impl RegistryWriter for FakeRegistry {
    async fn bulk_mutate(
        &self,
        action: BulkAction,
        batch: &[NumberEntry],
    ) -> Result<(), RegistryError> {
        let mut st = self.lock();
        st.bulk_calls += 1;
        st.calls.push(FakeCall::Bulk {
            action,
            numbers: batch.iter().map(|e| e.number.to_string()).collect(),
        });

        if st.failing_bulk_calls.contains(&st.bulk_calls) {
            return Err(RegistryError::Api {
                status: 500,
                message: format!("bulk {action} rejected"),
            });
        }

        match action {
            BulkAction::Add => {
                for e in batch {
                    if !holds(&st.records, &e.number) {
                        st.records.push(RawRow {
                            number_raw: e.number.to_string(),
                            branded_name_raw: e.branded_name.clone(),
                        });
                    }
                }
            }
            BulkAction::Delete => {
                let gone: HashSet<&DidNumber> = batch.iter().map(|e| &e.number).collect();
                st.records.retain(|r| match normalize(&r.number_raw) {
                    Some(n) => !gone.contains(&n),
                    None => true,
                });
            }
        }
        Ok(())
    }
}
