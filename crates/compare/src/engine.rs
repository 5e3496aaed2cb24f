use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::KeyedIndex;
use crate::model::{AreaDiff, DiffEntry, FieldDiff, FlatDiff, Slot};
use crate::value::{Record, ToleranceMode, Value};

/// Whether nested attribute maps are diffed field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recursion {
    /// A differing nested map is reported as one value pair.
    Flat,
    #[default]
    Nested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct EngineOptions {
    #[serde(default)]
    pub tolerance: ToleranceMode,
    #[serde(default)]
    pub recursion: Recursion,
}

impl EngineOptions {
    /// Strict equality, no descent into nested maps.
    pub fn strict() -> Self {
        Self { tolerance: ToleranceMode::Exact, recursion: Recursion::Flat }
    }
}

/// Computes differences between a candidate and a current configuration.
///
/// Stateless; one engine can serve any number of comparisons.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    options: EngineOptions,
}

impl ReconciliationEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Field-level diff of two attribute maps.
    ///
    /// Fields that compare equal under the tolerance mode are left out.
    /// Fields missing on one side are paired with [`Slot::NotPresent`].
    pub fn compare_flat(&self, candidate: &Record, current: &Record) -> FlatDiff {
        diff_records(candidate, current, self.options)
    }

    /// Entity-level diff of two keyed indexes.
    ///
    /// Always strict: no numeric tolerance, no recursion. Entities that only
    /// exist on the current side are not visited.
    pub fn compare_areas(&self, candidate: &KeyedIndex, current: &KeyedIndex) -> AreaDiff {
        let mut diff = AreaDiff::default();

        for (ident, candidate_attrs) in candidate {
            let Some(current_attrs) = current.get(ident) else {
                diff.new_entities.push(ident.clone());
                continue;
            };

            let fields: BTreeMap<String, DiffEntry> =
                diff_records(candidate_attrs, current_attrs, EngineOptions::strict())
                    .into_iter()
                    .filter_map(|(name, d)| match d {
                        FieldDiff::Entry(e) => Some((name, e)),
                        FieldDiff::Nested(_) => None,
                    })
                    .collect();

            if !fields.is_empty() {
                diff.changed_entities.insert(ident.clone(), fields);
            }
        }

        diff
    }
}

fn present(v: Option<&Value>) -> Slot {
    v.map_or(Slot::NotPresent, |v| Slot::Present(v.clone()))
}

fn diff_records(candidate: &Record, current: &Record, options: EngineOptions) -> FlatDiff {
    let empty = Record::new();
    let mut diff = FlatDiff::new();

    for (name, candidate_value) in candidate {
        let current_value = current.get(name);
        if let Some(cv) = current_value {
            if candidate_value.loosely_equal(cv, options.tolerance) {
                continue;
            }
        }

        if options.recursion == Recursion::Nested {
            if let Value::Map(candidate_map) = candidate_value {
                let current_map = match current_value {
                    None => Some(&empty),
                    Some(Value::Map(m)) => Some(m),
                    Some(_) => None,
                };
                // A scalar on the current side falls through to a plain pair.
                if let Some(current_map) = current_map {
                    let nested = diff_records(candidate_map, current_map, options);
                    if !nested.is_empty() {
                        diff.insert(name.clone(), FieldDiff::Nested(nested));
                        continue;
                    }
                    // Equal within tolerance. An empty map with no current
                    // counterpart still differs in presence and becomes a pair.
                    if current_value.is_some() {
                        continue;
                    }
                }
            }
        }

        diff.insert(
            name.clone(),
            FieldDiff::Entry(DiffEntry::new(Slot::Present(candidate_value.clone()), present(current_value))),
        );
    }

    for (name, current_value) in current {
        if !candidate.contains_key(name) {
            diff.insert(name.clone(), FieldDiff::Entry(DiffEntry::current_only(current_value.clone())));
        }
    }

    diff
}
