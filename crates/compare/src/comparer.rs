//! Composition of two retrievals and the engine into one comparison.

use serde::{Deserialize, Serialize};

use crate::config::{CompareConfig, ConfigType, Descriptor, FileRole, IndexConfig};
use crate::diagnostics::DiagnosticSink;
use crate::engine::{EngineOptions, ReconciliationEngine};
use crate::index::{AreaPolicy, Retriever};
use crate::model::Diff;
use crate::source::RecordSource;
use crate::summary::DiffSummary;

/// Which result shape a comparer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    #[default]
    Flat,
    AreaPartitioned,
}

/// Compares a candidate configuration with the current one.
pub struct ConfigComparer {
    candidate: Retriever,
    current: Retriever,
    mode: CompareMode,
    engine: ReconciliationEngine,
}

impl ConfigComparer {
    pub fn new(candidate: Retriever, current: Retriever) -> Self {
        Self {
            candidate,
            current,
            mode: CompareMode::default(),
            engine: ReconciliationEngine::default(),
        }
    }

    pub fn with_mode(mut self, mode: CompareMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_engine(mut self, options: EngineOptions) -> Self {
        self.engine = ReconciliationEngine::new(options);
        self
    }

    pub fn mode(&self) -> CompareMode {
        self.mode
    }

    /// Retrieve both sides and diff them. Never fails: unreadable sources
    /// count as empty and are reported through `sink`.
    pub fn compare(&self, descriptor: &Descriptor, sink: &dyn DiagnosticSink) -> Diff {
        let candidate = self.candidate.retrieve(descriptor, sink);
        let current = self.current.retrieve(descriptor, sink);
        match self.mode {
            CompareMode::Flat => {
                Diff::Flat(self.engine.compare_flat(&candidate.into_record(), &current.into_record()))
            }
            CompareMode::AreaPartitioned => Diff::AreaPartitioned(
                self.engine.compare_areas(&candidate.into_index(), &current.into_index()),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in comparisons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    /// ESF area file against the store table for the ESF type.
    EsfArea,
    /// Water-balance area file against the area export.
    WbArea,
    /// Water-balance bucket file against the bucket export.
    WbBucket,
    /// Water-balance structure file against the structure export.
    WbStructure,
}

impl ComparisonKind {
    pub fn for_type(config_type: &ConfigType) -> &'static [ComparisonKind] {
        match config_type {
            ConfigType::Esf(_) => &[Self::EsfArea],
            ConfigType::Waterbalance => &[Self::WbArea, Self::WbBucket, Self::WbStructure],
        }
    }

    /// Store export that holds the current records, for water-balance kinds.
    pub fn export_name(&self) -> Option<&'static str> {
        match self {
            Self::EsfArea => None,
            Self::WbArea => Some("areaconfiguration"),
            Self::WbBucket => Some("bucketconfiguration"),
            Self::WbStructure => Some("structureconfiguration"),
        }
    }

    pub fn file_role(&self) -> FileRole {
        match self {
            Self::EsfArea | Self::WbArea => FileRole::Area,
            Self::WbBucket => FileRole::Buckets,
            Self::WbStructure => FileRole::Structures,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::EsfArea => "area",
            Self::WbArea => "water balance area",
            Self::WbBucket => "buckets",
            Self::WbStructure => "structures",
        }
    }
}

impl std::fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EsfArea => write!(f, "esf_area"),
            Self::WbArea => write!(f, "wb_area"),
            Self::WbBucket => write!(f, "wb_bucket"),
            Self::WbStructure => write!(f, "wb_structure"),
        }
    }
}

/// Hands out the concrete record sources the built-in comparisons need.
pub trait SourceProvider {
    /// Candidate file for `role`.
    fn candidate_file(&self, role: FileRole) -> Box<dyn RecordSource>;
    /// Store table for the descriptor's ESF type.
    fn store_table(&self) -> Box<dyn RecordSource>;
    /// Named store export.
    fn store_export(&self, name: &str) -> Box<dyn RecordSource>;
}

/// Wire the comparer for `kind`.
pub fn build_comparer(
    kind: ComparisonKind,
    provider: &dyn SourceProvider,
    index: &IndexConfig,
    engine: EngineOptions,
) -> ConfigComparer {
    let candidate_source = provider.candidate_file(kind.file_role());
    let current_source = match kind.export_name() {
        Some(name) => provider.store_export(name),
        None => provider.store_table(),
    };

    let (candidate, current, mode) = match kind {
        ComparisonKind::EsfArea if index.area_policy == AreaPolicy::IndexAll => (
            Retriever::index_all(candidate_source, &index.area_key),
            Retriever::index_all(current_source, &index.area_key),
            CompareMode::AreaPartitioned,
        ),
        ComparisonKind::EsfArea | ComparisonKind::WbArea => (
            Retriever::select_one(candidate_source, &index.area_key),
            Retriever::select_one(current_source, &index.area_key),
            CompareMode::Flat,
        ),
        ComparisonKind::WbBucket | ComparisonKind::WbStructure => (
            Retriever::buckets(candidate_source, &index.bucket_area_field, &index.bucket_key),
            Retriever::buckets(current_source, &index.bucket_area_field, &index.bucket_key),
            CompareMode::Flat,
        ),
    };

    ConfigComparer::new(candidate.with_malformed(index.malformed), current.with_malformed(index.malformed))
        .with_mode(mode)
        .with_engine(engine)
}

/// The outcome of one built-in comparison.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub kind: ComparisonKind,
    pub summary: DiffSummary,
    pub diff: Diff,
}

/// Run every comparison the configuration type calls for.
pub fn run_comparisons(
    config: &CompareConfig,
    provider: &dyn SourceProvider,
    sink: &dyn DiagnosticSink,
) -> Vec<Comparison> {
    let descriptor = config.descriptor();
    ComparisonKind::for_type(&descriptor.config_type)
        .iter()
        .map(|&kind| {
            let comparer = build_comparer(kind, provider, &config.index, config.engine);
            let diff = comparer.compare(&descriptor, sink);
            let summary = DiffSummary::of(&diff);
            tracing::debug!("{kind}: {} differing fields", summary.fields());
            Comparison { kind, summary, diff }
        })
        .collect()
}
