// iocsweep - core/model.rs
//
// Core data model types. Pure data definitions with no I/O.
//
// These types are the shared vocabulary across all layers: the record shape
// modules produce, the normalised timeline entry every module maps its
// records to, and the per-module configuration and lifecycle stage.

use crate::core::lenient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Records
// =============================================================================

/// One result or detection entry. The shape is module-specific; the core
/// only needs it to be serialisable.
pub type Record = serde_json::Value;

/// Convert any serialisable value into a `Record`.
///
/// Parts serde_json cannot represent (maps with non-string keys, failing
/// custom `Serialize` impls) are coerced to strings one field at a time;
/// the rest of the record keeps its structure. Only a value that fails as a
/// whole falls back to its debug string.
pub fn to_record<T: Serialize + std::fmt::Debug>(value: &T) -> Record {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Record not fully serialisable; coercing offending fields");
            lenient::to_value(value).unwrap_or_else(|_| Record::String(format!("{value:?}")))
        }
    }
}

// =============================================================================
// Timeline Entry
// =============================================================================

/// A normalised event for cross-module chronological reporting.
///
/// Value object: two entries are the same event iff every field matches.
/// The on-disk key for `description` is `data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Sortable timestamp string, `None` when the event has no time.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Label of the module that produced the event.
    pub module: String,

    /// Short event label (e.g. "file_modified").
    pub event: String,

    /// Human-readable description.
    #[serde(rename = "data")]
    pub description: String,
}

impl TimelineEntry {
    pub fn new(
        timestamp: Option<String>,
        module: impl Into<String>,
        event: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            module: module.into(),
            event: event.into(),
            description: description.into(),
        }
    }

    /// Sort key used when rendering: an absent timestamp sorts as "".
    pub fn sort_key(&self) -> &str {
        self.timestamp.as_deref().unwrap_or("")
    }
}

/// Format a UTC instant the way every timeline timestamp is written.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(crate::util::constants::TIMESTAMP_FORMAT).to_string()
}

/// Format a Unix timestamp in seconds; `None` if out of range.
pub fn format_unix_timestamp(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(format_timestamp)
}

// =============================================================================
// Module configuration
// =============================================================================

/// Where a module reads from and writes to.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Path to the module's own database or log file, if it has one.
    pub file_path: Option<PathBuf>,

    /// Root of the backup or filesystem dump being examined.
    pub base_folder: Option<PathBuf>,

    /// Folder where structured results are written. `None` disables persistence.
    pub output_folder: Option<PathBuf>,

    /// Skip slow extraction paths.
    pub fast_mode: bool,
}

// =============================================================================
// Lifecycle stage
// =============================================================================

/// Position of a module in its run lifecycle.
///
/// `Created → Extracting → {Extracted | ExtractFailed} → Detecting →
/// Timelining → Persisted`. `ExtractFailed` and any stop before `Persisted`
/// are terminal for that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleStage {
    #[default]
    Created,
    Extracting,
    Extracted,
    ExtractFailed,
    Detecting,
    Timelining,
    Persisted,
}

impl ModuleStage {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleStage::Created => "created",
            ModuleStage::Extracting => "extracting",
            ModuleStage::Extracted => "extracted",
            ModuleStage::ExtractFailed => "extract_failed",
            ModuleStage::Detecting => "detecting",
            ModuleStage::Timelining => "timelining",
            ModuleStage::Persisted => "persisted",
        }
    }
}

impl std::fmt::Display for ModuleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
