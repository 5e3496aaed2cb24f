//! Human rendering of comparison results, field names translated through the
//! descriptor's `[labels]` tables and sorted by the translated name.

use std::borrow::Cow;
use std::io::{self, Write};

use confdiff_compare::config::{Descriptor, LabelConfig};
use confdiff_compare::model::{AreaDiff, DiffEntry, FieldDiff, FlatDiff};
use confdiff_compare::{Comparison, Diff};

pub const MANUAL_SUFFIX: &str = " (manual)";

pub struct Labels<'a> {
    config: &'a LabelConfig,
}

impl<'a> Labels<'a> {
    pub fn new(config: &'a LabelConfig) -> Self {
        Self { config }
    }

    /// Value-field label, else manual-field label with a suffix, else the raw name.
    pub fn label<'f>(&self, field: &'f str) -> Cow<'f, str> {
        if let Some(label) = self.config.value.get(field) {
            return Cow::Owned(label.clone());
        }
        if let Some(label) = self.config.manual.get(field) {
            return Cow::Owned(format!("{label}{MANUAL_SUFFIX}"));
        }
        Cow::Borrowed(field)
    }
}

pub fn render_human(
    out: &mut dyn Write,
    descriptor: &Descriptor,
    comparisons: &[Comparison],
    labels: &Labels<'_>,
) -> io::Result<()> {
    let area = &descriptor.area;
    if area.name != area.ident {
        write!(out, "area {} ({})", area.ident, area.name)?;
    } else {
        write!(out, "area {}", area.ident)?;
    }
    write!(out, ", configuration {}", descriptor.config_type)?;
    if !descriptor.data_set.is_empty() {
        write!(out, ", data set {}", descriptor.data_set)?;
    }
    writeln!(out)?;

    for comparison in comparisons {
        let title = comparison.kind.title();
        if comparison.diff.is_empty() {
            writeln!(out, "{title}: no differences")?;
            continue;
        }
        let s = &comparison.summary;
        match &comparison.diff {
            Diff::Flat(diff) => {
                writeln!(out, "{title}: {} {}", s.fields(), plural(s.fields(), "difference"))?;
                write_flat(out, diff, labels, 1)?;
            }
            Diff::AreaPartitioned(diff) => {
                writeln!(out, "{title}: {} new, {} changed", s.new_entities, s.changed_entities)?;
                write_areas(out, diff, labels)?;
            }
        }
    }
    Ok(())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn write_entry(out: &mut dyn Write, depth: usize, label: &str, entry: &DiffEntry) -> io::Result<()> {
    writeln!(out, "{}{label}: {} -> {}", "  ".repeat(depth), entry.candidate, entry.current)
}

fn write_flat(out: &mut dyn Write, diff: &FlatDiff, labels: &Labels<'_>, depth: usize) -> io::Result<()> {
    let mut rows: Vec<(Cow<'_, str>, &FieldDiff)> =
        diff.iter().map(|(field, d)| (labels.label(field), d)).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    for (label, field) in rows {
        match field {
            FieldDiff::Entry(entry) => write_entry(out, depth, &label, entry)?,
            FieldDiff::Nested(inner) => {
                writeln!(out, "{}{label}:", "  ".repeat(depth))?;
                write_flat(out, inner, labels, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn write_areas(out: &mut dyn Write, diff: &AreaDiff, labels: &Labels<'_>) -> io::Result<()> {
    for ident in &diff.new_entities {
        writeln!(out, "  new: {ident}")?;
    }
    for (ident, fields) in &diff.changed_entities {
        writeln!(out, "  {ident}:")?;
        let mut rows: Vec<(Cow<'_, str>, &DiffEntry)> =
            fields.iter().map(|(field, e)| (labels.label(field), e)).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (label, entry) in rows {
            write_entry(out, 2, &label, entry)?;
        }
    }
    Ok(())
}
