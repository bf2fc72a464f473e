//! dsync-registry
//!
//! Collaborator boundary for the remote DID registry.
//!
//! This crate owns the reader/writer contracts the sync runtime talks to and
//! the concrete HTTP adapter. It does **not** diff, verify or gate anything:
//! callers (dsync-runtime) decide what to read and what to mutate.
//!
//! Outcomes are deliberately three-valued where the runtime needs them to be:
//! a direct lookup is `Found`, `NotFound`, or `Error`, and only a clean 404
//! counts as `NotFound`.

mod http;

pub use http::{Credentials, HttpRegistryClient, RegistryEndpoint, Session};

use std::fmt;

use dsync_reconcile::{DidNumber, NumberEntry, RawRow};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// One page of the registry's list endpoint, still undecoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryPage {
    pub records: Vec<RawRow>,
    /// Total page count as reported by the registry. Only the first page's
    /// value is trusted by callers.
    pub total_pages: u32,
}

/// Result of an authoritative single-record lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupOutcome {
    Found,
    NotFound,
    /// Anything other than a clean not-found: unexpected status, transport
    /// failure, timeout. Carries a human-readable detail.
    Error(String),
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Found => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::Error(_) => "error",
        }
    }
}

/// Bulk mutation verb understood by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BulkAction {
    Add,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Add => "add",
            BulkAction::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a registry adapter may return. Never carries credential values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Network or transport failure (connect, timeout, TLS).
    Transport(String),
    /// Login failed or the session was rejected.
    Auth(String),
    /// The registry answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The adapter is misconfigured (bad base URL, client build failure).
    Config(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Transport(msg) => write!(f, "transport error: {msg}"),
            RegistryError::Auth(msg) => write!(f, "auth error: {msg}"),
            RegistryError::Api { status, message } => {
                write!(f, "registry api error status={status}: {message}")
            }
            RegistryError::Decode(msg) => write!(f, "decode error: {msg}"),
            RegistryError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Read side of the registry.
///
/// Implementations must be object-safe (`&dyn RegistryReader`) and must not
/// issue concurrent requests on their own; the runtime drives every call one
/// at a time.
#[async_trait::async_trait]
pub trait RegistryReader: Send + Sync {
    /// Short name for logs (e.g. `"http"`, `"fake"`).
    fn source_name(&self) -> &'static str;

    /// Fetch one 1-based page of the list endpoint.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<RegistryPage, RegistryError>;

    /// Authoritative existence check for a single number.
    async fn lookup(&self, number: &DidNumber) -> LookupOutcome;
}

/// Write side of the registry.
#[async_trait::async_trait]
pub trait RegistryWriter: Send + Sync {
    /// Submit one batch. The registry applies it or rejects it; there is no
    /// partial success reported at this level.
    async fn bulk_mutate(
        &self,
        action: BulkAction,
        batch: &[NumberEntry],
    ) -> Result<(), RegistryError>;
}
