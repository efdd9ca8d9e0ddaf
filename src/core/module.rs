// iocsweep - core/module.rs
//
// The extraction module contract.
//
// A module is one self-contained extraction + detection unit for a category
// of artifacts. Concrete modules implement `extract`, `check_indicators`, and
// `serialize` as far as they support them; the defaults return
// `ModuleError::NotImplemented` so the runner can skip those stages
// explicitly. Everything else (identity, indicator binding, timeline
// conversion, persistence, reload) is provided here on top of `ModuleState`.

use crate::core::export;
use crate::core::indicators::{IndicatorPort, IndicatorSet};
use crate::core::model::{to_record, ModuleConfig, ModuleStage, Record, TimelineEntry};
use crate::core::timeline;
use crate::util::error::{ExportError, IndicatorError, ModuleError};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

// =============================================================================
// Module state
// =============================================================================

/// Per-instance configuration and accumulated output of a module.
///
/// Always built through a constructor so every instance owns fresh vectors.
#[derive(Default)]
pub struct ModuleState {
    pub config: ModuleConfig,

    /// Bound indicator port, shared with other modules of the same run.
    pub indicators: Option<Arc<dyn IndicatorPort>>,

    /// Raw extracted entries.
    pub results: Vec<Record>,

    /// Entries flagged by the module's own detection logic.
    pub detected: Vec<Record>,

    /// De-duplicated timeline of `results`; filled by `to_timeline`.
    pub timeline: Vec<TimelineEntry>,

    /// De-duplicated timeline of `detected`; filled by `to_timeline`.
    pub timeline_detected: Vec<TimelineEntry>,

    pub stage: ModuleStage,
}

impl ModuleState {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// State pre-populated with previously persisted results.
    pub fn with_results(config: ModuleConfig, results: Vec<Record>) -> Self {
        Self {
            config,
            results,
            ..Self::default()
        }
    }

    /// Append a result, coercing unserialisable values to strings.
    pub fn push_result<T: Serialize + std::fmt::Debug>(&mut self, value: &T) {
        self.results.push(to_record(value));
    }
}

impl std::fmt::Debug for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleState")
            .field("config", &self.config)
            .field("indicators", &self.indicators.as_ref().map(|i| i.len()))
            .field("results", &self.results.len())
            .field("detected", &self.detected.len())
            .field("timeline", &self.timeline.len())
            .field("timeline_detected", &self.timeline_detected.len())
            .field("stage", &self.stage)
            .finish()
    }
}

// =============================================================================
// Identity
// =============================================================================

fn camel_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"),
            Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"),
        )
    })
}

/// Derive a lowercase, underscore-separated slug from a type name.
///
/// Any module path prefix or generic arguments are ignored, so
/// `crate::modules::ContactList` becomes `contact_list`.
pub fn slug_from_type_name(name: &str) -> String {
    let bare = name.split('<').next().unwrap_or(name);
    let bare = bare.rsplit("::").next().unwrap_or(bare);
    let (upper_word, lower_upper) = camel_patterns();
    let pass = upper_word.replace_all(bare, "${1}_${2}");
    lower_upper.replace_all(&pass, "${1}_${2}").to_lowercase()
}

// =============================================================================
// Module trait
// =============================================================================

/// A single extraction module.
pub trait Module: Send {
    /// Display name of the module type (e.g. `"ContactList"`).
    fn name(&self) -> &'static str;

    fn state(&self) -> &ModuleState;

    fn state_mut(&mut self) -> &mut ModuleState;

    /// Rebuild a module of this type around an existing state.
    fn from_state(state: ModuleState) -> Self
    where
        Self: Sized;

    /// Explicit identity that takes precedence over the derived slug.
    fn slug_override(&self) -> Option<&'static str> {
        None
    }

    /// Whether batch runs should include this module.
    fn enabled(&self) -> bool {
        true
    }

    /// Populate `results` from the source data.
    fn extract(&mut self) -> Result<(), ModuleError> {
        Err(ModuleError::NotImplemented)
    }

    /// Compare `results` against the bound indicators, filling `detected`.
    fn check_indicators(&mut self) -> Result<(), ModuleError> {
        Err(ModuleError::NotImplemented)
    }

    /// Map one record to zero or more timeline entries.
    fn serialize(&self, _record: &Record) -> Result<Vec<TimelineEntry>, ModuleError> {
        Err(ModuleError::NotImplemented)
    }

    /// Stable identity used as the output-file stem.
    fn slug(&self) -> String {
        match self.slug_override() {
            Some(slug) => slug.to_string(),
            None => slug_from_type_name(self.name()),
        }
    }

    /// Load an indicator file and bind it to this module.
    fn load_indicators(&mut self, path: &Path) -> Result<(), IndicatorError> {
        let set = IndicatorSet::from_file(path)?;
        self.bind_indicators(Arc::new(set));
        Ok(())
    }

    /// Bind an already loaded indicator port.
    fn bind_indicators(&mut self, indicators: Arc<dyn IndicatorPort>) {
        self.state_mut().indicators = Some(indicators);
    }

    /// Build both timelines from `results` and `detected`.
    ///
    /// Replaces any previous timelines. Propagates `NotImplemented` from
    /// `serialize` untouched so the runner can skip the stage.
    fn to_timeline(&mut self) -> Result<(), ModuleError> {
        let mut timeline = Vec::new();
        for record in &self.state().results {
            timeline.extend(self.serialize(record)?);
        }

        let mut timeline_detected = Vec::new();
        for record in &self.state().detected {
            timeline_detected.extend(self.serialize(record)?);
        }

        let state = self.state_mut();
        state.timeline = timeline::deduplicate(timeline);
        state.timeline_detected = timeline::deduplicate(timeline_detected);
        Ok(())
    }

    /// Write `results` and `detected` to the output folder.
    ///
    /// Each file is attempted independently; failures are logged and
    /// returned alongside the paths that were written.
    fn persist(&self) -> (Vec<PathBuf>, Vec<ExportError>) {
        write_outputs(self, true)
    }

    /// Write only `detected`, leaving the results file untouched.
    ///
    /// Used when `results` were reloaded from the output folder itself.
    fn persist_detected(&self) -> (Vec<PathBuf>, Vec<ExportError>) {
        write_outputs(self, false)
    }

    /// Reconstruct a module from a results file written by `persist`.
    fn from_json(path: &Path, config: ModuleConfig) -> Result<Self, ExportError>
    where
        Self: Sized,
    {
        let results = export::load_records(path)?;
        Ok(Self::from_state(ModuleState::with_results(config, results)))
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Write the module's non-empty record sets to its output folder.
fn write_outputs<M: Module + ?Sized>(
    module: &M,
    include_results: bool,
) -> (Vec<PathBuf>, Vec<ExportError>) {
    let mut written = Vec::new();
    let mut errors = Vec::new();

    let state = module.state();
    let Some(folder) = state.config.output_folder.as_deref() else {
        return (written, errors);
    };
    let slug = module.slug();

    let mut targets = Vec::with_capacity(2);
    if include_results {
        targets.push((&state.results, export::results_path(folder, &slug)));
    }
    targets.push((&state.detected, export::detected_path(folder, &slug)));

    for (records, path) in targets {
        if records.is_empty() {
            continue;
        }
        match export::write_records(records, &path) {
            Ok(_) => written.push(path),
            Err(e) => {
                tracing::error!(
                    module = module.name(),
                    path = %path.display(),
                    error = %e,
                    "Unable to store module results"
                );
                errors.push(e);
            }
        }
    }

    (written, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct ContactList {
        state: ModuleState,
    }

    impl Module for ContactList {
        fn name(&self) -> &'static str {
            "ContactList"
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
        fn serialize(&self, record: &Record) -> Result<Vec<TimelineEntry>, ModuleError> {
            let Some(ts) = record.get("ts").and_then(|v| v.as_str()) else {
                return Ok(Vec::new());
            };
            let name = record["name"].as_str().unwrap_or_default();
            Ok(vec![
                TimelineEntry::new(Some(ts.to_string()), "contact_list", "added", name),
                TimelineEntry::new(Some(ts.to_string()), "contact_list", "seen", name),
            ])
        }
    }

    struct Renamed {
        state: ModuleState,
    }

    impl Module for Renamed {
        fn name(&self) -> &'static str {
            "SomethingElse"
        }
        fn slug_override(&self) -> Option<&'static str> {
            Some("custom_slug")
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
    }

    #[test]
    fn test_slug_derivation() {
        assert_eq!(slug_from_type_name("ContactList"), "contact_list");
        assert_eq!(slug_from_type_name("SMS"), "sms");
        assert_eq!(slug_from_type_name("SMSAttachments"), "sms_attachments");
        assert_eq!(slug_from_type_name("WebkitLocalStorage"), "webkit_local_storage");
        assert_eq!(slug_from_type_name("Sha256Cache"), "sha256_cache");
        assert_eq!(
            slug_from_type_name("iocsweep::modules::ShutdownLog"),
            "shutdown_log"
        );
    }

    #[test]
    fn test_slug_override_wins() {
        let m = Renamed::from_state(ModuleState::default());
        assert_eq!(m.slug(), "custom_slug");
        let c = ContactList::from_state(ModuleState::default());
        assert_eq!(c.slug(), "contact_list");
    }

    #[test]
    fn test_states_do_not_share_vectors() {
        let mut a = ContactList::from_state(ModuleState::new(ModuleConfig::default()));
        let b = ContactList::from_state(ModuleState::new(ModuleConfig::default()));
        a.state_mut().push_result(&json!({"name": "x"}));
        assert_eq!(a.state().results.len(), 1);
        assert!(b.state().results.is_empty());
    }

    #[test]
    fn test_to_timeline_keeps_sequences_separate_and_deduplicated() {
        let mut m = ContactList::from_state(ModuleState::default());
        let alice = json!({"name": "alice", "ts": "2023-01-01"});
        m.state_mut().results = vec![alice.clone(), alice.clone(), json!({"name": "undated"})];
        m.state_mut().detected = vec![alice];

        m.to_timeline().unwrap();
        assert_eq!(m.state().timeline.len(), 2);
        assert_eq!(m.state().timeline_detected.len(), 2);

        // A second conversion replaces rather than accumulates.
        m.to_timeline().unwrap();
        assert_eq!(m.state().timeline.len(), 2);
    }

    #[test]
    fn test_default_stages_are_not_implemented() {
        let mut m = Renamed::from_state(ModuleState::default());
        assert!(matches!(m.extract(), Err(ModuleError::NotImplemented)));
        assert!(matches!(m.check_indicators(), Err(ModuleError::NotImplemented)));
        m.state_mut().results.push(json!({}));
        assert!(matches!(m.to_timeline(), Err(ModuleError::NotImplemented)));
    }

    #[test]
    fn test_persist_without_output_folder_is_noop() {
        let mut m = ContactList::from_state(ModuleState::default());
        m.state_mut().results.push(json!({"name": "x"}));
        let (written, errors) = m.persist();
        assert!(written.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_persist_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModuleConfig {
            output_folder: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut m = ContactList::from_state(ModuleState::new(config));
        m.state_mut().results = vec![
            json!({"name": "alice", "ts": "2023-01-01", "tags": ["a", "b"]}),
            json!({"name": "bob", "score": 1.5, "extra": null}),
        ];

        let (written, errors) = m.persist();
        assert!(errors.is_empty());
        assert_eq!(written, vec![dir.path().join("contact_list.json")]);
        assert!(!dir.path().join("contact_list_detected.json").exists());

        let reloaded =
            ContactList::from_json(&written[0], ModuleConfig::default()).unwrap();
        assert_eq!(reloaded.state().results, m.state().results);
    }

    #[test]
    fn test_persist_results_failure_still_writes_detected() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the results path makes that write fail.
        std::fs::create_dir(dir.path().join("contact_list.json")).unwrap();

        let config = ModuleConfig {
            output_folder: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut m = ContactList::from_state(ModuleState::new(config));
        m.state_mut().results.push(json!({"name": "x"}));
        m.state_mut().detected.push(json!({"name": "x"}));

        let (written, errors) = m.persist();
        assert_eq!(errors.len(), 1);
        assert_eq!(written, vec![dir.path().join("contact_list_detected.json")]);
    }
}
