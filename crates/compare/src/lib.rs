//! `confdiff-compare`: record reconciliation and structural diff engine.
//!
//! Pure engine crate: record sources go in, a diff comes out. No file format
//! or query code lives here; see `confdiff-io` for concrete sources.

pub mod comparer;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod source;
pub mod summary;
pub mod value;

pub use comparer::{run_comparisons, Comparison, ComparisonKind, ConfigComparer, SourceProvider};
pub use config::{CompareConfig, Descriptor};
pub use diagnostics::{CollectingSink, DiagnosticSink, Warning};
pub use engine::{EngineOptions, ReconciliationEngine};
pub use error::{CompareError, SourceError};
pub use index::{KeyedIndex, Retriever};
pub use model::{AreaDiff, Diff, DiffEntry, FieldDiff, FlatDiff, Slot};
pub use source::{RecordHandle, RecordSource};
pub use summary::DiffSummary;
pub use value::{Record, Value};
