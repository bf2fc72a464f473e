//! Apply gate ordering and limit semantics.
//!
//! GREEN when:
//! - Missing confirmation refuses regardless of limits.
//! - A limit breach refuses the whole apply with observed vs limit counts.
//! - Add limit is checked before delete limit.
//! - Counts exactly at the limit are permitted.

use dsync_reconcile::*;

fn diff(adds: usize, deletes: usize) -> ReconcileResult {
    let entry = |k: usize| NumberEntry::new((2_000_000_000 + k).to_string().parse().unwrap(), None);
    ReconcileResult {
        to_add: (0..adds).map(entry).collect(),
        to_delete: (1000..1000 + deletes).map(entry).collect(),
        mismatched: Vec::new(),
    }
}

#[test]
fn unconfirmed_is_refused_even_when_empty() {
    let g = check_apply_gate(&diff(0, 0), ApplyLimits::unlimited(), false);
    assert_eq!(g, ApplyGate::Refused(ApplyRefusal::NotConfirmed));
    assert!(g.is_refused());
}

#[test]
fn confirmation_is_checked_before_limits() {
    let limits = ApplyLimits {
        max_add: Some(1),
        max_delete: Some(1),
    };
    let g = check_apply_gate(&diff(50, 50), limits, false);
    assert_eq!(g, ApplyGate::Refused(ApplyRefusal::NotConfirmed));
}

#[test]
fn add_limit_breach_refuses_whole_apply() {
    let limits = ApplyLimits {
        max_add: Some(10),
        max_delete: None,
    };
    let g = check_apply_gate(&diff(50, 0), limits, true);
    assert_eq!(
        g,
        ApplyGate::Refused(ApplyRefusal::AddLimitExceeded {
            observed: 50,
            limit: 10
        })
    );
}

#[test]
fn add_limit_is_checked_before_delete_limit() {
    let limits = ApplyLimits {
        max_add: Some(1),
        max_delete: Some(1),
    };
    let g = check_apply_gate(&diff(2, 2), limits, true);
    assert!(matches!(
        g,
        ApplyGate::Refused(ApplyRefusal::AddLimitExceeded { .. })
    ));
}

#[test]
fn delete_limit_breach_refuses() {
    let limits = ApplyLimits {
        max_add: Some(100),
        max_delete: Some(3),
    };
    let g = check_apply_gate(&diff(5, 4), limits, true);
    assert_eq!(
        g,
        ApplyGate::Refused(ApplyRefusal::DeleteLimitExceeded {
            observed: 4,
            limit: 3
        })
    );
}

#[test]
fn counts_at_limit_are_permitted() {
    let limits = ApplyLimits {
        max_add: Some(5),
        max_delete: Some(4),
    };
    assert!(check_apply_gate(&diff(5, 4), limits, true).is_permitted());
    assert!(check_apply_gate(&diff(5, 4), ApplyLimits::unlimited(), true).is_permitted());
}

#[test]
fn refusal_message_names_counts() {
    let msg = ApplyRefusal::AddLimitExceeded {
        observed: 50,
        limit: 10,
    }
    .to_string();
    assert!(msg.contains("50"));
    assert!(msg.contains("max_add=10"));
}
