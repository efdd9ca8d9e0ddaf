// iocsweep - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for iocsweep configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/iocsweep/ or %APPDATA%\iocsweep\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[run]` section.
    pub run: RunSection,
    /// `[indicators]` section.
    pub indicators: IndicatorsSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[run]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Folder receiving structured results and timelines.
    pub output_folder: Option<String>,
    /// Skip slow extraction paths.
    pub fast_mode: Option<bool>,
    /// Run one worker per module.
    pub parallel: Option<bool>,
    /// File name of the merged timeline inside the output folder.
    pub timeline_file: Option<String>,
    /// File name of the merged detections timeline inside the output folder.
    pub timeline_detected_file: Option<String>,
}

/// `[indicators]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct IndicatorsSection {
    /// Indicator files loaded on every run.
    pub files: Vec<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated configuration derived from `config.toml`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_folder: Option<PathBuf>,
    pub fast_mode: bool,
    pub parallel: bool,
    pub timeline_file: String,
    pub timeline_detected_file: String,
    pub indicator_files: Vec<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_folder: None,
            fast_mode: false,
            parallel: false,
            timeline_file: constants::DEFAULT_TIMELINE_FILE_NAME.to_string(),
            timeline_detected_file: constants::DEFAULT_TIMELINE_DETECTED_FILE_NAME.to_string(),
            indicator_files: Vec::new(),
            log_level: None,
        }
    }
}

/// A bare file name: non-empty and without any path separator.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Parse config.toml text and validate it.
///
/// Returns the validated config and any non-fatal warnings. Invalid values
/// fall back to their defaults.
pub fn parse_config(content: &str, path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut warnings = Vec::new();
    let mut config = AppConfig::default();

    if let Some(folder) = raw.run.output_folder.filter(|f| !f.is_empty()) {
        config.output_folder = Some(PathBuf::from(folder));
    }
    config.fast_mode = raw.run.fast_mode.unwrap_or(false);
    config.parallel = raw.run.parallel.unwrap_or(false);

    for (field, value, target) in [
        ("timeline_file", raw.run.timeline_file, &mut config.timeline_file),
        (
            "timeline_detected_file",
            raw.run.timeline_detected_file,
            &mut config.timeline_detected_file,
        ),
    ] {
        if let Some(name) = value {
            if is_plain_file_name(&name) {
                *target = name;
            } else {
                warnings.push(format!(
                    "[run] {field} = \"{name}\" must be a plain file name. Using default ({target}).",
                ));
            }
        }
    }

    config.indicator_files = raw
        .indicators
        .files
        .into_iter()
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect();

    if let Some(level) = raw.logging.level {
        if constants::VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level);
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    Ok((config, warnings))
}

/// Load and validate a config file.
///
/// A missing file yields defaults with no warnings. A file that exists but
/// cannot be read or parsed yields defaults plus a warning, so a bad config
/// never prevents a run.
pub fn load_config(path: &Path) -> (AppConfig, Vec<String>) {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            };
            return (AppConfig::default(), vec![format!("{err}. Using defaults.")]);
        }
    };

    match parse_config(&content, path) {
        Ok((config, warnings)) => {
            tracing::info!(path = %path.display(), "Loaded config.toml");
            if !warnings.is_empty() {
                tracing::warn!(count = warnings.len(), "Config validation produced warnings");
            }
            (config, warnings)
        }
        Err(e) => (AppConfig::default(), vec![format!("{e}. Using defaults.")]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            [run]
            output_folder = "/cases/42"
            fast_mode = true
            parallel = true
            timeline_file = "all.csv"

            [indicators]
            files = ["/iocs/a.json", "/iocs/b.json"]

            [logging]
            level = "debug"
        "#;
        let (config, warnings) = parse_config(toml, Path::new("config.toml")).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.output_folder, Some(PathBuf::from("/cases/42")));
        assert!(config.fast_mode);
        assert!(config.parallel);
        assert_eq!(config.timeline_file, "all.csv");
        assert_eq!(
            config.timeline_detected_file,
            constants::DEFAULT_TIMELINE_DETECTED_FILE_NAME
        );
        assert_eq!(config.indicator_files.len(), 2);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_values_warn_and_fall_back() {
        let toml = r#"
            [run]
            timeline_file = "../escape.csv"
            [logging]
            level = "loud"
        "#;
        let (config, warnings) = parse_config(toml, Path::new("config.toml")).unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(config.timeline_file, constants::DEFAULT_TIMELINE_FILE_NAME);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let toml = "[future]\nthing = 1\n[run]\nfast_mode = true\n";
        let (config, _) = parse_config(toml, Path::new("config.toml")).unwrap();
        assert!(config.fast_mode);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = parse_config("[run\nfast_mode = ", Path::new("config.toml"));
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(&dir.path().join("config.toml"));
        assert!(warnings.is_empty());
        assert!(!config.fast_mode);
    }

    #[test]
    fn test_load_config_malformed_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let (_, warnings) = load_config(&path);
        assert_eq!(warnings.len(), 1);
    }
}
