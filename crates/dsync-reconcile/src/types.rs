use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Canonical DID key: exactly 10 ASCII digits, first digit in `2..=9`.
///
/// The only ways to obtain one are [`normalize`] and serde deserialization
/// (which runs the same normalizer), so holding a `DidNumber` is proof the
/// value is canonical.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DidNumber(String);

impl DidNumber {
    /// Crate-internal constructor. Callers must have validated `digits`.
    pub(crate) fn from_canonical(digits: String) -> Self {
        debug_assert!(digits.len() == 10, "canonical DID must be 10 digits");
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DidNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DidNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<DidNumber> for String {
    fn from(n: DidNumber) -> Self {
        n.0
    }
}

impl TryFrom<String> for DidNumber {
    type Error = InvalidNumber;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        normalize(&raw).ok_or(InvalidNumber { raw })
    }
}

impl std::str::FromStr for DidNumber {
    type Err = InvalidNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).ok_or_else(|| InvalidNumber { raw: s.to_string() })
    }
}

/// A raw string that could not be canonicalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidNumber {
    pub raw: String,
}

impl fmt::Display for InvalidNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a canonical DID number: '{}'", self.raw)
    }
}

impl std::error::Error for InvalidNumber {}

/// Undecoded row as handed over by a source provider or a registry page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    pub number_raw: String,
    pub branded_name_raw: Option<String>,
}

impl RawRow {
    pub fn new(number_raw: impl Into<String>, branded_name_raw: Option<&str>) -> Self {
        Self {
            number_raw: number_raw.into(),
            branded_name_raw: branded_name_raw.map(str::to_string),
        }
    }
}

/// One DID with its optional display label. `number` is the collection key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberEntry {
    pub number: DidNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branded_name: Option<String>,
}

impl NumberEntry {
    pub fn new(number: DidNumber, branded_name: Option<String>) -> Self {
        Self {
            number,
            branded_name,
        }
    }
}

/// A number present on both sides whose labels differ.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MismatchEntry {
    pub number: DidNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branded_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_branded_name: Option<String>,
}

/// Three-way diff. Recomputed per stage, never mutated in place by the
/// pipeline: raw diff, verified diff and post-apply diff are distinct values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub to_add: Vec<NumberEntry>,
    pub to_delete: Vec<NumberEntry>,
    pub mismatched: Vec<MismatchEntry>,
}

impl ReconcileResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when the registry already matches the source exactly.
    pub fn is_clean(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty() && self.mismatched.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            to_add: self.to_add.len(),
            to_delete: self.to_delete.len(),
            mismatched: self.mismatched.len(),
        }
    }
}

/// Counts only; cheap to log and to embed in reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub to_add: usize,
    pub to_delete: usize,
    pub mismatched: usize,
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "to_add={} to_delete={} mismatched={}",
            self.to_add, self.to_delete, self.mismatched
        )
    }
}
