//! Apply gate
//!
//! Every registry mutation MUST pass through [`check_apply_gate`] first. The
//! checks run in a fixed order and the first failure wins:
//!
//! 1. **Confirmation**: the operator explicitly confirmed the apply. This is
//!    a separate safety step from the size limits.
//! 2. **Add limit**: `to_add.len() <= max_add` when a limit is set.
//! 3. **Delete limit**: `to_delete.len() <= max_delete` when a limit is set.
//!
//! A limit breach refuses the WHOLE apply, not just the excess.
//!
//! Pure deterministic. No IO, no clock.

use std::fmt;

use crate::ReconcileResult;

/// Optional caps on how much one apply may change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyLimits {
    pub max_add: Option<usize>,
    pub max_delete: Option<usize>,
}

impl ApplyLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Why an apply was refused. Recoverable by operator action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyRefusal {
    NotConfirmed,
    AddLimitExceeded { observed: usize, limit: usize },
    DeleteLimitExceeded { observed: usize, limit: usize },
}

impl fmt::Display for ApplyRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyRefusal::NotConfirmed => write!(
                f,
                "APPLY_REFUSED: apply not confirmed (re-run with --yes to mutate the registry)"
            ),
            ApplyRefusal::AddLimitExceeded { observed, limit } => write!(
                f,
                "APPLY_REFUSED: {observed} number(s) to add exceeds max_add={limit}"
            ),
            ApplyRefusal::DeleteLimitExceeded { observed, limit } => write!(
                f,
                "APPLY_REFUSED: {observed} number(s) to delete exceeds max_delete={limit}"
            ),
        }
    }
}

impl std::error::Error for ApplyRefusal {}

/// Result of the pre-mutation check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyGate {
    Permitted,
    /// No mutation may be attempted. Callers must treat this as a hard stop.
    Refused(ApplyRefusal),
}

impl ApplyGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, ApplyGate::Permitted)
    }

    pub fn is_refused(&self) -> bool {
        !self.is_permitted()
    }
}

/// Evaluate the apply preconditions for `diff`.
pub fn check_apply_gate(diff: &ReconcileResult, limits: ApplyLimits, confirmed: bool) -> ApplyGate {
    if !confirmed {
        return ApplyGate::Refused(ApplyRefusal::NotConfirmed);
    }

    if let Some(limit) = limits.max_add {
        let observed = diff.to_add.len();
        if observed > limit {
            return ApplyGate::Refused(ApplyRefusal::AddLimitExceeded { observed, limit });
        }
    }

    if let Some(limit) = limits.max_delete {
        let observed = diff.to_delete.len();
        if observed > limit {
            return ApplyGate::Refused(ApplyRefusal::DeleteLimitExceeded { observed, limit });
        }
    }

    ApplyGate::Permitted
}
