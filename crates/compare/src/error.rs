use std::fmt;

/// Errors raised while loading a comparison descriptor.
///
/// Comparisons themselves never fail; see [`crate::comparer::ConfigComparer::compare`].
#[derive(Debug)]
pub enum CompareError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Descriptor validation error (empty area, bad identifier, missing file, etc.).
    ConfigValidation(String),
    /// IO error (descriptor read, etc.).
    Io(String),
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for CompareError {}

/// Errors raised by a record source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The resource behind the source cannot be opened (missing file, bad store, etc.).
    Open { resource: String, reason: String },
    /// A record could not be read from an open resource.
    Read { resource: String, reason: String },
}

impl SourceError {
    pub fn open(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Open { resource: resource.into(), reason: reason.to_string() }
    }

    pub fn read(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read { resource: resource.into(), reason: reason.to_string() }
    }

    pub fn resource(&self) -> &str {
        match self {
            Self::Open { resource, .. } | Self::Read { resource, .. } => resource,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Open { reason, .. } | Self::Read { reason, .. } => reason,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { resource, reason } => write!(f, "cannot open '{resource}': {reason}"),
            Self::Read { resource, reason } => write!(f, "cannot read '{resource}': {reason}"),
        }
    }
}

impl std::error::Error for SourceError {}
