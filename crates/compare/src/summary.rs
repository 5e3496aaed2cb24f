use serde::Serialize;

use crate::model::{AreaDiff, Diff, DiffEntry, FieldDiff, FlatDiff, Slot};

/// Counts over a [`Diff`], for headlines and exit codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Fields present on both sides with different values.
    pub changed: usize,
    pub candidate_only: usize,
    pub current_only: usize,
    /// Nested attribute maps (buckets, structures) with at least one difference.
    pub nested_groups: usize,
    pub new_entities: usize,
    pub changed_entities: usize,
}

impl DiffSummary {
    pub fn of(diff: &Diff) -> Self {
        let mut s = Self::default();
        match diff {
            Diff::Flat(d) => s.add_flat(d),
            Diff::AreaPartitioned(d) => s.add_areas(d),
        }
        s
    }

    pub fn fields(&self) -> usize {
        self.changed + self.candidate_only + self.current_only
    }

    pub fn is_empty(&self) -> bool {
        self.fields() == 0 && self.new_entities == 0 && self.changed_entities == 0
    }

    fn add_entry(&mut self, entry: &DiffEntry) {
        match (&entry.candidate, &entry.current) {
            (Slot::Present(_), Slot::Present(_)) => self.changed += 1,
            (Slot::Present(_), Slot::NotPresent) => self.candidate_only += 1,
            (Slot::NotPresent, Slot::Present(_)) => self.current_only += 1,
            (Slot::NotPresent, Slot::NotPresent) => {}
        }
    }

    fn add_flat(&mut self, diff: &FlatDiff) {
        for field in diff.values() {
            match field {
                FieldDiff::Entry(e) => self.add_entry(e),
                FieldDiff::Nested(inner) => {
                    self.nested_groups += 1;
                    self.add_flat(inner);
                }
            }
        }
    }

    fn add_areas(&mut self, diff: &AreaDiff) {
        self.new_entities += diff.new_entities.len();
        self.changed_entities += diff.changed_entities.len();
        for fields in diff.changed_entities.values() {
            for e in fields.values() {
                self.add_entry(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::flat_diff;
    use std::collections::BTreeMap;

    #[test]
    fn flat_counts_include_nested_fields() {
        let diff = Diff::Flat(flat_diff([
            ("DIEPTE", FieldDiff::from(DiffEntry::changed("1.17", "1.18"))),
            ("PEIL", FieldDiff::from(DiffEntry::candidate_only("0.5"))),
            (
                "B1",
                FieldDiff::from(flat_diff([
                    ("SURFTYPE", DiffEntry::changed(0.0, 0.1)),
                    ("OPPERVL", DiffEntry::current_only(12.0)),
                ])),
            ),
        ]));
        let s = DiffSummary::of(&diff);
        assert_eq!(s.changed, 2);
        assert_eq!(s.candidate_only, 1);
        assert_eq!(s.current_only, 1);
        assert_eq!(s.nested_groups, 1);
        assert_eq!(s.fields(), 4);
        assert!(!s.is_empty());
    }

    #[test]
    fn area_counts() {
        let mut changed = BTreeMap::new();
        changed.insert(
            "3201".to_string(),
            BTreeMap::from([("DIEPTE".to_string(), DiffEntry::changed("1.17", "1.18"))]),
        );
        let diff = Diff::AreaPartitioned(AreaDiff {
            new_entities: vec!["3202".into(), "3203".into()],
            changed_entities: changed,
        });
        let s = DiffSummary::of(&diff);
        assert_eq!(s.new_entities, 2);
        assert_eq!(s.changed_entities, 1);
        assert_eq!(s.changed, 1);
    }

    #[test]
    fn empty_diff_is_empty_summary() {
        assert!(DiffSummary::of(&Diff::Flat(FlatDiff::new())).is_empty());
        assert!(DiffSummary::of(&Diff::AreaPartitioned(AreaDiff::default())).is_empty());
    }
}
