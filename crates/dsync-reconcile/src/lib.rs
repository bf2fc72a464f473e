//! dsync-reconcile
//!
//! Number canonicalization, deduplication, three-way diffing and the apply
//! gate for keeping a remote DID registry in step with a source list.
//!
//! Architectural decisions:
//! - Every number in every collection is a canonical [`DidNumber`]
//! - First occurrence wins when a collection is built
//! - Diffing is a pure function over immutable snapshots
//! - Apply requires explicit confirmation AND size limits to pass
//!
//! Deterministic, pure logic. No IO. No registry calls.

mod dedupe;
mod engine;
mod gate;
mod normalize;
mod types;

pub use dedupe::{dedupe, DedupeStats, Deduplicator, LabelRule};
pub use engine::reconcile;
pub use gate::{check_apply_gate, ApplyGate, ApplyLimits, ApplyRefusal};
pub use normalize::{clean_branded_name, normalize, registry_branded_name};
pub use types::*;
