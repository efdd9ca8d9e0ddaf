// iocsweep - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every stage of a module run reports through `ModuleError`, which the
// runner classifies into skip / stop / fail outcomes.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Boxed error used to carry arbitrary causes out of module code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all iocsweep operations.
#[derive(Debug)]
pub enum IocSweepError {
    /// Writing or reading structured output failed.
    Export(ExportError),

    /// Loading an indicator source failed.
    Indicator(IndicatorError),

    /// A module slug was requested that no built-in module provides.
    UnknownModule { slug: String },
}

impl fmt::Display for IocSweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Indicator(e) => write!(f, "Indicator error: {e}"),
            Self::UnknownModule { slug } => write!(f, "Unknown module '{slug}'"),
        }
    }
}

impl std::error::Error for IocSweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Export(e) => Some(e),
            Self::Indicator(e) => Some(e),
            Self::UnknownModule { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Module stage errors
// ---------------------------------------------------------------------------

/// Outcome of a module stage that did not succeed.
///
/// `NotImplemented` is the explicit "this module does not provide this stage"
/// sentinel; the remaining variants describe why extraction could not run.
#[derive(Debug)]
pub enum ModuleError {
    /// The module deliberately does not support this stage.
    NotImplemented,

    /// The data the module extracts from is absent. Expected on most devices.
    SourceNotFound { path: Option<PathBuf>, reason: String },

    /// The data is present but unreadable beyond recovery.
    SourceCorrupted { path: Option<PathBuf>, reason: String },

    /// The caller lacks the rights to read the data.
    InsufficientPrivileges { path: Option<PathBuf>, reason: String },

    /// Any other failure.
    Failed {
        reason: String,
        source: Option<BoxError>,
    },
}

impl ModuleError {
    /// Classify an I/O error raised while reading `path`.
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::SourceNotFound {
                path: Some(path),
                reason: err.to_string(),
            },
            io::ErrorKind::PermissionDenied => Self::InsufficientPrivileges {
                path: Some(path),
                reason: err.to_string(),
            },
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => Self::SourceCorrupted {
                path: Some(path),
                reason: err.to_string(),
            },
            _ => Self::Failed {
                reason: format!("I/O error on '{}'", path.display()),
                source: Some(Box::new(err)),
            },
        }
    }

    /// Wrap an arbitrary error as an unclassified failure.
    pub fn failed(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Short machine-readable label for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotImplemented => "not_implemented",
            Self::SourceNotFound { .. } => "source_not_found",
            Self::SourceCorrupted { .. } => "source_corrupted",
            Self::InsufficientPrivileges { .. } => "insufficient_privileges",
            Self::Failed { .. } => "failed",
        }
    }
}

fn write_with_path(
    f: &mut fmt::Formatter<'_>,
    what: &str,
    path: &Option<PathBuf>,
    reason: &str,
) -> fmt::Result {
    match path {
        Some(p) => write!(f, "{what} '{}': {reason}", p.display()),
        None => write!(f, "{what}: {reason}"),
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented => f.write_str("stage not implemented by this module"),
            Self::SourceNotFound { path, reason } => {
                write_with_path(f, "Source not found", path, reason)
            }
            Self::SourceCorrupted { path, reason } => {
                write_with_path(f, "Source corrupted", path, reason)
            }
            Self::InsufficientPrivileges { path, reason } => {
                write_with_path(f, "Insufficient privileges for", path, reason)
            }
            Self::Failed { reason, source } => match source {
                Some(s) => write!(f, "{reason}: {s}"),
                None => f.write_str(reason),
            },
        }
    }
}

impl std::error::Error for ModuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed {
                source: Some(s), ..
            } => Some(s.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to structured result files and timeline rendering.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error reading or writing an output file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON (de)serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Output I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV timeline error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON results error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for IocSweepError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Indicator errors
// ---------------------------------------------------------------------------

/// Errors related to loading indicator sources.
#[derive(Debug)]
pub enum IndicatorError {
    /// I/O error reading the indicator file.
    Io { path: PathBuf, source: io::Error },

    /// The indicator file is not a valid indicator document.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The indicator file parsed but contains no indicators at all.
    Empty { path: PathBuf },

    /// The indicator file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },
}

impl fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Cannot read indicators '{}': {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "Malformed indicators '{}': {source}", path.display())
            }
            Self::Empty { path } => {
                write!(f, "Indicator file '{}' contains no indicators", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Indicator file '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
        }
    }
}

impl std::error::Error for IndicatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<IndicatorError> for IocSweepError {
    fn from(e: IndicatorError) -> Self {
        Self::Indicator(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Convenience type alias for iocsweep results.
pub type Result<T> = std::result::Result<T, IocSweepError>;
