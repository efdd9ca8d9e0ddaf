// iocsweep - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "iocsweep";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "iocsweep";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Structured output
// =============================================================================

/// Extension of per-module structured result files.
pub const RESULTS_FILE_EXTENSION: &str = "json";

/// Suffix appended to a module slug for its detections file
/// (`{slug}_detected.json`).
pub const DETECTED_FILE_SUFFIX: &str = "_detected";

/// Indentation used for structured result files.
pub const JSON_INDENT: &[u8] = b"    ";

// =============================================================================
// Timeline
// =============================================================================

/// Header row of every merged timeline file.
pub const TIMELINE_HEADER: [&str; 4] = ["UTC Timestamp", "Plugin", "Event", "Description"];

/// Default file name of the merged timeline of all results.
pub const DEFAULT_TIMELINE_FILE_NAME: &str = "timeline.csv";

/// Default file name of the merged timeline of detections only.
pub const DEFAULT_TIMELINE_DETECTED_FILE_NAME: &str = "timeline_detected.csv";

/// chrono format used for every timestamp written to a timeline entry.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// =============================================================================
// Indicators
// =============================================================================

/// Maximum size of a single indicator file in bytes.
pub const MAX_INDICATOR_FILE_SIZE: u64 = 32 * 1024 * 1024; // 32 MB

/// Length at which the kernel truncates process names in listings.
/// Indicators are also matched against this truncated form.
pub const PROCESS_NAME_TRUNCATION: usize = 15;

// =============================================================================
// Built-in modules
// =============================================================================

/// Directory depth walked by the file listing module in fast mode.
pub const FAST_MODE_MAX_DEPTH: usize = 1;

/// Directory depth walked by the file listing module otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Location of the shutdown log relative to a filesystem dump root.
pub const SHUTDOWN_LOG_RELATIVE_PATH: &str = "private/var/db/diagnostics/shutdown.log";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log levels accepted in config.toml.
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
