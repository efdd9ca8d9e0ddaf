// iocsweep - modules/file_listing.rs
//
// Lists every regular file under the dump root with its size and last
// modification time, and flags files whose name, path, or hash-like name
// matches an indicator.
//
// Fast mode only lists the top level of the dump root. Unreadable
// subdirectories are skipped; an unreadable root stops the module.

use crate::core::model::{format_timestamp, ModuleConfig, Record, TimelineEntry};
use crate::core::module::{Module, ModuleState};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::ModuleError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

/// One listed file.
#[derive(Debug, Serialize)]
struct FileRecord {
    /// Path relative to the dump root, with a leading `/`.
    path: String,
    size: u64,
    modified: Option<String>,
}

pub struct FileListing {
    state: ModuleState,
}

impl FileListing {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            state: ModuleState::new(config),
        }
    }

    fn relative_display(root: &Path, path: &Path) -> String {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}")
    }
}

/// Hex strings of MD5, SHA-1, or SHA-256 length.
fn looks_like_hash(value: &str) -> bool {
    matches!(value.len(), 32 | 40 | 64) && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl Module for FileListing {
    fn name(&self) -> &'static str {
        "FileListing"
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn from_state(state: ModuleState) -> Self {
        Self { state }
    }

    fn extract(&mut self) -> Result<(), ModuleError> {
        let Some(root) = self.state.config.base_folder.clone() else {
            return Err(ModuleError::SourceNotFound {
                path: None,
                reason: "no base folder configured".to_string(),
            });
        };
        fs::ensure_readable_dir(&root)?;

        let max_depth = if self.state.config.fast_mode {
            constants::FAST_MODE_MAX_DEPTH
        } else {
            constants::DEFAULT_MAX_DEPTH
        };

        let mut skipped = 0usize;
        for entry_result in WalkDir::new(&root).min_depth(1).max_depth(max_depth) {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(error = %e, "Skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(path = %entry.path().display(), error = %e, "No metadata");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .ok()
                .map(|t| format_timestamp(DateTime::<Utc>::from(t)));

            self.state.push_result(&FileRecord {
                path: Self::relative_display(&root, entry.path()),
                size: metadata.len(),
                modified,
            });
        }

        tracing::info!(
            root = %root.display(),
            files = self.state.results.len(),
            skipped,
            fast_mode = self.state.config.fast_mode,
            "Listed files"
        );
        Ok(())
    }

    fn check_indicators(&mut self) -> Result<(), ModuleError> {
        let Some(indicators) = self.state.indicators.clone() else {
            return Ok(());
        };

        for record in &self.state.results {
            let Some(path) = record.get("path").and_then(|v| v.as_str()) else {
                continue;
            };
            let stem = Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let hit = indicators
                .check_file_path(path)
                .or_else(|| indicators.check_file_name(path))
                .or_else(|| {
                    looks_like_hash(&stem)
                        .then(|| indicators.check_hash(&stem))
                        .flatten()
                });

            if let Some(hit) = hit {
                self.state.detected.push(super::flag_record(record, &hit));
            }
        }
        Ok(())
    }

    fn serialize(&self, record: &Record) -> Result<Vec<TimelineEntry>, ModuleError> {
        let (Some(path), Some(modified)) = (
            record.get("path").and_then(|v| v.as_str()),
            record.get("modified").and_then(|v| v.as_str()),
        ) else {
            return Ok(Vec::new());
        };
        let size = record.get("size").and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(vec![TimelineEntry::new(
            Some(modified.to_string()),
            self.name(),
            "file_modified",
            format!("{path} ({size} bytes)"),
        )])
    }
}
