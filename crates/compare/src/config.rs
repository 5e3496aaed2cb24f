use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::EngineOptions;
use crate::error::CompareError;
use crate::index::{AreaPolicy, MalformedPolicy};

/// Configuration type that runs the three water-balance comparisons.
pub const WATERBALANCE_TYPE: &str = "waterbalans";

// ---------------------------------------------------------------------------
// Descriptor (what the sources open)
// ---------------------------------------------------------------------------

/// The configuration under validation. Record sources pick their own locator
/// out of it: a file path for the candidate side, a type or data-set key for
/// the store side.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub area: AreaRef,
    pub config_type: ConfigType,
    pub data_set: String,
    pub files: FileLocators,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaRef {
    pub ident: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigType {
    /// An ESF configuration; the name doubles as the store table.
    Esf(String),
    Waterbalance,
}

impl ConfigType {
    pub fn parse(s: &str) -> Self {
        if s == WATERBALANCE_TYPE {
            Self::Waterbalance
        } else {
            Self::Esf(s.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Esf(name) => name,
            Self::Waterbalance => WATERBALANCE_TYPE,
        }
    }
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which candidate file a file-backed source reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Area,
    Buckets,
    Structures,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Area => write!(f, "area"),
            Self::Buckets => write!(f, "buckets"),
            Self::Structures => write!(f, "structures"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileLocators {
    #[serde(default)]
    pub area: Option<PathBuf>,
    #[serde(default)]
    pub buckets: Option<PathBuf>,
    #[serde(default)]
    pub structures: Option<PathBuf>,
}

impl FileLocators {
    pub fn get(&self, role: FileRole) -> Option<&Path> {
        match role {
            FileRole::Area => self.area.as_deref(),
            FileRole::Buckets => self.buckets.as_deref(),
            FileRole::Structures => self.structures.as_deref(),
        }
    }

    fn resolved(&self, base_dir: &Path) -> Self {
        let join = |p: &Option<PathBuf>| p.as_ref().map(|p| base_dir.join(p));
        Self {
            area: join(&self.area),
            buckets: join(&self.buckets),
            structures: join(&self.structures),
        }
    }
}

impl Descriptor {
    /// Descriptor for `area` with no files attached, mostly for tests.
    pub fn for_area(ident: impl Into<String>, config_type: &str) -> Self {
        let ident = ident.into();
        Self {
            area: AreaRef { name: ident.clone(), ident },
            config_type: ConfigType::parse(config_type),
            data_set: String::new(),
            files: FileLocators::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    pub area: String,
    #[serde(default)]
    pub area_name: Option<String>,
    pub config_type: String,
    #[serde(default)]
    pub data_set: String,
    #[serde(default)]
    pub files: FileLocators,
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Export name → SQL with a single `?1` parameter bound to the data set.
    #[serde(default)]
    pub exports: HashMap<String, String>,
    #[serde(default)]
    pub labels: LabelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_area_key")]
    pub area_key: String,
    #[serde(default = "default_bucket_area_field")]
    pub bucket_area_field: String,
    #[serde(default = "default_bucket_key")]
    pub bucket_key: String,
    #[serde(default)]
    pub area_policy: AreaPolicy,
    #[serde(default)]
    pub malformed: MalformedPolicy,
}

fn default_area_key() -> String {
    "GAFIDENT".into()
}

fn default_bucket_area_field() -> String {
    "GEBIED".into()
}

fn default_bucket_key() -> String {
    "ID".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            area_key: default_area_key(),
            bucket_area_field: default_bucket_area_field(),
            bucket_key: default_bucket_key(),
            area_policy: AreaPolicy::default(),
            malformed: MalformedPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    /// Field delimiter; sniffed from the file when absent.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Columns always parsed as floating point numbers.
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    /// Columns always kept as text, even when every cell is a number.
    #[serde(default)]
    pub text_columns: Vec<String>,
    /// Treat a column as numeric when every non-blank cell parses as one.
    #[serde(default = "default_infer_types")]
    pub infer_types: bool,
}

fn default_infer_types() -> bool {
    true
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            numeric_columns: Vec::new(),
            text_columns: Vec::new(),
            infer_types: default_infer_types(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_data_set_column")]
    pub data_set_column: String,
    /// TEXT columns parsed as fixed-point decimals.
    #[serde(default)]
    pub decimal_columns: Vec<String>,
}

fn default_data_set_column() -> String {
    "data_set".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            data_set_column: default_data_set_column(),
            decimal_columns: Vec::new(),
        }
    }
}

/// Human labels for field names, keyed by field name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub value: HashMap<String, String>,
    #[serde(default)]
    pub manual: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CompareConfig {
    pub fn from_toml(input: &str) -> Result<Self, CompareError> {
        let config: CompareConfig =
            toml::from_str(input).map_err(|e| CompareError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, CompareError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| CompareError::Io(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&input)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base_dir);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CompareError> {
        if self.area.trim().is_empty() {
            return Err(CompareError::ConfigValidation("area must not be empty".into()));
        }
        if self.config_type.trim().is_empty() {
            return Err(CompareError::ConfigValidation("config_type must not be empty".into()));
        }

        // The ESF type name and the data-set column end up inside SQL.
        if self.config_type != WATERBALANCE_TYPE && !is_sql_identifier(&self.config_type) {
            return Err(CompareError::ConfigValidation(format!(
                "config_type '{}' is not a valid table name",
                self.config_type
            )));
        }
        if !is_sql_identifier(&self.store.data_set_column) {
            return Err(CompareError::ConfigValidation(format!(
                "store.data_set_column '{}' is not a valid column name",
                self.store.data_set_column
            )));
        }

        for (name, key) in [
            ("area_key", &self.index.area_key),
            ("bucket_area_field", &self.index.bucket_area_field),
            ("bucket_key", &self.index.bucket_key),
        ] {
            if key.is_empty() {
                return Err(CompareError::ConfigValidation(format!("index.{name} must not be empty")));
            }
        }

        for (name, sql) in &self.exports {
            if !sql.contains("?1") {
                return Err(CompareError::ConfigValidation(format!(
                    "export '{name}' must bind the data set as ?1"
                )));
            }
        }

        Ok(())
    }

    /// Resolve relative file and store paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        self.files = self.files.resolved(base_dir);
        if let Some(ref p) = self.store.path {
            self.store.path = Some(base_dir.join(p));
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            area: AreaRef {
                ident: self.area.clone(),
                name: self.area_name.clone().unwrap_or_else(|| self.area.clone()),
            },
            config_type: ConfigType::parse(&self.config_type),
            data_set: self.data_set.clone(),
            files: self.files.clone(),
        }
    }

    /// SQL for a named export: the configured query, or a scan of the table
    /// with the same name filtered on the data-set column.
    pub fn export_query(&self, name: &str) -> Result<String, CompareError> {
        if let Some(sql) = self.exports.get(name) {
            return Ok(sql.clone());
        }
        if !is_sql_identifier(name) {
            return Err(CompareError::ConfigValidation(format!(
                "export '{name}' is not configured and is not a valid table name"
            )));
        }
        Ok(format!(
            "SELECT * FROM \"{name}\" WHERE \"{}\" = ?1",
            self.store.data_set_column
        ))
    }
}

/// ASCII letter or underscore, then letters, digits or underscores.
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
