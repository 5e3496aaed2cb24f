//! Folding a record source into keyed mappings.
//!
//! Three strategies: pick the single record of an area, index every record
//! by its key field, or collect the bucket records of one area. Faults never
//! propagate: an unavailable resource yields an empty result and a warning,
//! and a malformed record stops the scan (or is skipped, by policy).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::Descriptor;
use crate::diagnostics::{DiagnosticSink, Warning, WarningKind};
use crate::source::{RecordSource, ScopedHandle};
use crate::value::{Record, Value};

/// Identifier → record.
pub type KeyedIndex = BTreeMap<String, Record>;

/// How an area-level retrieval treats the records of other areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaPolicy {
    /// Keep only the record of the requested area.
    #[default]
    SelectOne,
    /// Keep every area, keyed by identifier.
    IndexAll,
}

/// What a scan does with a record that lacks a field it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Warn once and stop the scan, keeping what was collected so far.
    #[default]
    Abort,
    /// Warn and continue with the next record.
    Skip,
}

// ---------------------------------------------------------------------------
// Scan loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanEnd {
    Exhausted,
    Stopped,
    Aborted,
    Unavailable,
}

enum Visit {
    Next,
    Done,
    Missing(String),
}

fn scan<F>(
    source: &dyn RecordSource,
    descriptor: &Descriptor,
    policy: MalformedPolicy,
    sink: &dyn DiagnosticSink,
    mut visit: F,
) -> ScanEnd
where
    F: FnMut(Record) -> Visit,
{
    let resource = source.describe(descriptor);
    let warn = |kind: WarningKind| {
        sink.warn(Warning {
            resource: resource.clone(),
            area: Some(descriptor.area.ident.clone()),
            kind,
        })
    };

    let mut handle = match source.open(descriptor) {
        Ok(h) => ScopedHandle::new(h),
        Err(e) => {
            warn(WarningKind::ResourceUnavailable { reason: e.reason().to_string() });
            return ScanEnd::Unavailable;
        }
    };

    let end = loop {
        let record = match handle.next() {
            None => break ScanEnd::Exhausted,
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                warn(WarningKind::ReadFailed { reason: e.reason().to_string() });
                break ScanEnd::Aborted;
            }
        };
        match visit(record) {
            Visit::Next => {}
            Visit::Done => break ScanEnd::Stopped,
            Visit::Missing(field) => {
                warn(WarningKind::MissingField { field });
                if policy == MalformedPolicy::Abort {
                    break ScanEnd::Aborted;
                }
            }
        }
    };

    handle.close();
    end
}

fn identifier(record: &Record, field: &str) -> Option<String> {
    record.get(field).and_then(Value::as_identifier)
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// The record whose `key_field` equals the descriptor's area, or an empty
/// record when there is none.
pub fn select_one(
    source: &dyn RecordSource,
    descriptor: &Descriptor,
    key_field: &str,
    policy: MalformedPolicy,
    sink: &dyn DiagnosticSink,
) -> Record {
    let target = &descriptor.area.ident;
    let mut found = None;

    let end = scan(source, descriptor, policy, sink, |record| {
        match identifier(&record, key_field) {
            None => Visit::Missing(key_field.to_string()),
            Some(id) if id == *target => {
                found = Some(record);
                Visit::Done
            }
            Some(_) => Visit::Next,
        }
    });

    if end == ScanEnd::Exhausted && found.is_none() {
        sink.warn(Warning {
            resource: source.describe(descriptor),
            area: Some(target.clone()),
            kind: WarningKind::Unmatched { field: key_field.to_string(), ident: target.clone() },
        });
    }

    found.unwrap_or_default()
}

/// Every record, keyed by its `key_field`. A later record with the same
/// identifier replaces an earlier one.
pub fn index_all(
    source: &dyn RecordSource,
    descriptor: &Descriptor,
    key_field: &str,
    policy: MalformedPolicy,
    sink: &dyn DiagnosticSink,
) -> KeyedIndex {
    let mut index = KeyedIndex::new();

    scan(source, descriptor, policy, sink, |record| match identifier(&record, key_field) {
        None => Visit::Missing(key_field.to_string()),
        Some(id) => {
            if index.insert(id.clone(), record).is_some() {
                tracing::debug!("duplicate {key_field} '{id}' in {}", source.describe(descriptor));
            }
            Visit::Next
        }
    });

    index
}

/// The records whose `filter_field` equals the descriptor's area, keyed by
/// `key_field`.
pub fn buckets(
    source: &dyn RecordSource,
    descriptor: &Descriptor,
    filter_field: &str,
    key_field: &str,
    policy: MalformedPolicy,
    sink: &dyn DiagnosticSink,
) -> KeyedIndex {
    let target = &descriptor.area.ident;
    let mut index = KeyedIndex::new();

    scan(source, descriptor, policy, sink, |record| {
        let Some(area) = identifier(&record, filter_field) else {
            return Visit::Missing(filter_field.to_string());
        };
        let Some(id) = identifier(&record, key_field) else {
            return Visit::Missing(key_field.to_string());
        };
        if area == *target {
            index.insert(id, record);
        }
        Visit::Next
    });

    index
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStrategy {
    SelectOne { key_field: String },
    IndexAll { key_field: String },
    Buckets { filter_field: String, key_field: String },
}

/// Result of a retrieval: one area record, or a keyed index.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved {
    Single { ident: String, record: Record },
    Keyed(KeyedIndex),
}

impl Retrieved {
    /// Flat form. A keyed index becomes a record of nested maps.
    pub fn into_record(self) -> Record {
        match self {
            Self::Single { record, .. } => record,
            Self::Keyed(index) => index.into_iter().map(|(k, r)| (k, Value::Map(r))).collect(),
        }
    }

    /// Keyed form. A single record is keyed by the identifier it was
    /// selected by; an empty one contributes nothing.
    pub fn into_index(self) -> KeyedIndex {
        match self {
            Self::Single { ident, record } => {
                let mut index = KeyedIndex::new();
                if !record.is_empty() {
                    index.insert(ident, record);
                }
                index
            }
            Self::Keyed(index) => index,
        }
    }
}

/// A record source bound to an index strategy.
pub struct Retriever {
    source: Box<dyn RecordSource>,
    strategy: IndexStrategy,
    malformed: MalformedPolicy,
}

impl Retriever {
    pub fn new(source: impl RecordSource + 'static, strategy: IndexStrategy) -> Self {
        Self {
            source: Box::new(source),
            strategy,
            malformed: MalformedPolicy::default(),
        }
    }

    pub fn select_one(source: impl RecordSource + 'static, key_field: &str) -> Self {
        Self::new(source, IndexStrategy::SelectOne { key_field: key_field.into() })
    }

    pub fn index_all(source: impl RecordSource + 'static, key_field: &str) -> Self {
        Self::new(source, IndexStrategy::IndexAll { key_field: key_field.into() })
    }

    pub fn buckets(source: impl RecordSource + 'static, filter_field: &str, key_field: &str) -> Self {
        Self::new(
            source,
            IndexStrategy::Buckets { filter_field: filter_field.into(), key_field: key_field.into() },
        )
    }

    pub fn with_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub fn strategy(&self) -> &IndexStrategy {
        &self.strategy
    }

    pub fn retrieve(&self, descriptor: &Descriptor, sink: &dyn DiagnosticSink) -> Retrieved {
        let source = self.source.as_ref();
        match &self.strategy {
            IndexStrategy::SelectOne { key_field } => Retrieved::Single {
                ident: descriptor.area.ident.clone(),
                record: select_one(source, descriptor, key_field, self.malformed, sink),
            },
            IndexStrategy::IndexAll { key_field } => {
                Retrieved::Keyed(index_all(source, descriptor, key_field, self.malformed, sink))
            }
            IndexStrategy::Buckets { filter_field, key_field } => Retrieved::Keyed(buckets(
                source,
                descriptor,
                filter_field,
                key_field,
                self.malformed,
                sink,
            )),
        }
    }
}
