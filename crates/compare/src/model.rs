use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::value::Value;

/// Text shown for a side that does not carry a field or entity.
pub const NOT_PRESENT_LABEL: &str = "not present";

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One side of a [`DiffEntry`]. `NotPresent` is distinct from every value,
/// `Value::Null` included.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Present(Value),
    NotPresent,
}

impl Slot {
    pub fn is_present(&self) -> bool {
        matches!(self, Slot::Present(_))
    }

    pub fn is_not_present(&self) -> bool {
        !self.is_present()
    }

    pub fn of(v: impl Into<Value>) -> Self {
        Slot::Present(v.into())
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Present(v) => Some(v),
            Slot::NotPresent => None,
        }
    }
}

impl From<Value> for Slot {
    fn from(v: Value) -> Self {
        Slot::Present(v)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Present(v) => write!(f, "{v}"),
            Slot::NotPresent => write!(f, "{NOT_PRESENT_LABEL}"),
        }
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Present(v) => v.serialize(serializer),
            Slot::NotPresent => serializer.serialize_none(),
        }
    }
}

/// `(candidate, current)` pair for a field whose values differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    #[serde(skip_serializing_if = "Slot::is_not_present")]
    pub candidate: Slot,
    #[serde(skip_serializing_if = "Slot::is_not_present")]
    pub current: Slot,
}

impl DiffEntry {
    pub fn new(candidate: Slot, current: Slot) -> Self {
        Self { candidate, current }
    }

    /// Both sides present with different values.
    pub fn changed(candidate: impl Into<Value>, current: impl Into<Value>) -> Self {
        Self { candidate: Slot::of(candidate), current: Slot::of(current) }
    }

    pub fn candidate_only(candidate: impl Into<Value>) -> Self {
        Self { candidate: Slot::Present(candidate.into()), current: Slot::NotPresent }
    }

    pub fn current_only(current: impl Into<Value>) -> Self {
        Self { candidate: Slot::NotPresent, current: Slot::Present(current.into()) }
    }
}

// ---------------------------------------------------------------------------
// Flat shape
// ---------------------------------------------------------------------------

/// A differing field: a value pair, or the diff of a nested attribute map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDiff {
    Entry(DiffEntry),
    Nested(FlatDiff),
}

impl From<DiffEntry> for FieldDiff {
    fn from(e: DiffEntry) -> Self {
        FieldDiff::Entry(e)
    }
}

impl From<FlatDiff> for FieldDiff {
    fn from(d: FlatDiff) -> Self {
        FieldDiff::Nested(d)
    }
}

/// Field name → difference.
pub type FlatDiff = BTreeMap<String, FieldDiff>;

// ---------------------------------------------------------------------------
// Area-partitioned shape
// ---------------------------------------------------------------------------

/// Differences between two keyed indexes.
///
/// Entities only present on the current side are not listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreaDiff {
    /// Present in the candidate only, in candidate order.
    pub new_entities: Vec<String>,
    /// Present on both sides with at least one differing field.
    pub changed_entities: BTreeMap<String, BTreeMap<String, DiffEntry>>,
}

impl AreaDiff {
    pub fn is_empty(&self) -> bool {
        self.new_entities.is_empty() && self.changed_entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "entries", rename_all = "snake_case")]
pub enum Diff {
    Flat(FlatDiff),
    AreaPartitioned(AreaDiff),
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        match self {
            Diff::Flat(d) => d.is_empty(),
            Diff::AreaPartitioned(d) => d.is_empty(),
        }
    }

    pub fn as_flat(&self) -> Option<&FlatDiff> {
        match self {
            Diff::Flat(d) => Some(d),
            Diff::AreaPartitioned(_) => None,
        }
    }

    pub fn as_area_partitioned(&self) -> Option<&AreaDiff> {
        match self {
            Diff::AreaPartitioned(d) => Some(d),
            Diff::Flat(_) => None,
        }
    }
}

/// Build a [`FlatDiff`] from `(field, diff)` pairs.
pub fn flat_diff<K, D, I>(entries: I) -> FlatDiff
where
    K: Into<String>,
    D: Into<FieldDiff>,
    I: IntoIterator<Item = (K, D)>,
{
    entries.into_iter().map(|(k, d)| (k.into(), d.into())).collect()
}
