//! Warning channel for faults the core absorbs instead of returning.
//!
//! Every retrieval takes a `&dyn DiagnosticSink`. The CLI collects warnings
//! with [`CollectingSink`] so they can land in the JSON report as well as on
//! stderr.

use std::cell::RefCell;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Resource the fault was found in (file path, store table, export name).
    pub resource: String,
    /// Area the retrieval was for, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WarningKind {
    /// The resource could not be opened; treated as holding no records.
    ResourceUnavailable { reason: String },
    /// A record lacks a field the index needs.
    MissingField { field: String },
    /// No record carries the requested identifier.
    Unmatched { field: String, ident: String },
    /// A record could not be read from an open resource.
    ReadFailed { reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let area = self.area.as_deref().unwrap_or("?");
        match &self.kind {
            WarningKind::ResourceUnavailable { reason } => {
                write!(f, "configuration resource '{}' cannot be opened: {reason}", self.resource)
            }
            WarningKind::MissingField { field } => write!(
                f,
                "configuration resource '{}' for area '{area}' has a record without a {field} field",
                self.resource
            ),
            WarningKind::Unmatched { field, ident } => write!(
                f,
                "configuration resource '{}' has no record with {field} = '{ident}'",
                self.resource
            ),
            WarningKind::ReadFailed { reason } => {
                write!(f, "configuration resource '{}' cannot be read: {reason}", self.resource)
            }
        }
    }
}

pub trait DiagnosticSink {
    fn warn(&self, warning: Warning);
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: RefCell<Vec<Warning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.warnings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.borrow().is_empty()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    pub fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }
}

impl DiagnosticSink for CollectingSink {
    fn warn(&self, warning: Warning) {
        self.warnings.borrow_mut().push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(field: &str) -> Warning {
        Warning {
            resource: "esf1.csv".into(),
            area: Some("3201".into()),
            kind: WarningKind::MissingField { field: field.into() },
        }
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.warn(missing("GAFIDENT"));
        sink.warn(missing("ID"));
        assert_eq!(sink.len(), 2);
        let taken = sink.take();
        assert_eq!(taken[1], missing("ID"));
        assert!(sink.is_empty());
    }

    #[test]
    fn display_names_resource_and_field() {
        let msg = missing("GAFIDENT").to_string();
        assert!(msg.contains("esf1.csv"));
        assert!(msg.contains("GAFIDENT"));
        assert!(msg.contains("3201"));
    }
}
