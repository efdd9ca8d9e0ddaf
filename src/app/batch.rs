// iocsweep - app/batch.rs
//
// Runs a set of modules and merges their timelines.
//
// Modules share no mutable state, so the parallel path simply gives each
// module its own rayon task. The merged timeline files are the one shared
// resource: all entries are funnelled into `TimelineWriter`, which holds a
// lock for the duration of each append.

use crate::app::runner::{self, ModuleReport, RunOutcome};
use crate::core::export;
use crate::core::model::TimelineEntry;
use crate::core::module::Module;
use crate::util::error::ExportError;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Outcome counts and per-module reports of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<ModuleReport>,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn from_reports(reports: Vec<ModuleReport>) -> Self {
        let mut summary = Self::default();
        for report in &reports {
            match report.outcome {
                RunOutcome::Completed => summary.completed += 1,
                RunOutcome::Skipped(_) => summary.skipped += 1,
                RunOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary.reports = reports;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Total detections across all modules.
    pub fn detections(&self) -> usize {
        self.reports.iter().map(|r| r.detected).sum()
    }
}

fn run_one(module: &mut Box<dyn Module>, run: fn(&mut dyn Module) -> ModuleReport) -> ModuleReport {
    if module.enabled() {
        run(module.as_mut())
    } else {
        tracing::info!(module = module.name(), "Module is disabled, skipping");
        ModuleReport::disabled(module.as_ref())
    }
}

fn run_each(
    modules: &mut [Box<dyn Module>],
    parallel: bool,
    run: fn(&mut dyn Module) -> ModuleReport,
) -> BatchSummary {
    let reports: Vec<ModuleReport> = if parallel {
        modules.par_iter_mut().map(|m| run_one(m, run)).collect()
    } else {
        modules.iter_mut().map(|m| run_one(m, run)).collect()
    };

    let summary = BatchSummary::from_reports(reports);
    tracing::info!(
        modules = summary.reports.len(),
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        detections = summary.detections(),
        "Batch finished"
    );
    summary
}

/// Run every enabled module through its full lifecycle.
pub fn run_all(modules: &mut [Box<dyn Module>], parallel: bool) -> BatchSummary {
    run_each(modules, parallel, runner::run_module)
}

/// Run detection only on modules rebuilt from saved results.
pub fn check_all(modules: &mut [Box<dyn Module>], parallel: bool) -> BatchSummary {
    run_each(modules, parallel, runner::run_detection)
}

/// Concatenate the timelines of all modules: `(timeline, timeline_detected)`.
pub fn collect_timelines(modules: &[Box<dyn Module>]) -> (Vec<TimelineEntry>, Vec<TimelineEntry>) {
    let mut timeline = Vec::new();
    let mut detected = Vec::new();
    for module in modules {
        timeline.extend_from_slice(&module.state().timeline);
        detected.extend_from_slice(&module.state().timeline_detected);
    }
    (timeline, detected)
}

// =============================================================================
// Merged timeline writer
// =============================================================================

/// Single-writer funnel for one merged timeline file.
///
/// Appends from different threads are serialised so blocks never interleave.
#[derive(Debug)]
pub struct TimelineWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TimelineWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a sorted block of `entries` (with header) to the file.
    pub fn append(&self, entries: &[TimelineEntry]) -> Result<usize, ExportError> {
        // A poisoned lock only means another append panicked; the file
        // handle is reopened per call so it is safe to continue.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        export::save_timeline(entries, &self.path)
    }
}

/// Rows written to each merged timeline file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimelineCounts {
    pub timeline: usize,
    pub timeline_detected: usize,
}

/// Append `entries` unless empty, logging a failure before returning it.
fn append_logged(writer: &TimelineWriter, entries: &[TimelineEntry]) -> Result<usize, ExportError> {
    if entries.is_empty() {
        return Ok(0);
    }
    writer.append(entries).map_err(|e| {
        tracing::error!(
            path = %writer.path().display(),
            error = %e,
            "Unable to write merged timeline"
        );
        e
    })
}

/// Write the merged timelines of `modules` to the two writers.
///
/// Both files are attempted independently so a failure on one never costs
/// the other; errors are logged and returned with the row counts. Empty
/// timelines are not written.
pub fn save_merged_timelines(
    modules: &[Box<dyn Module>],
    timeline: &TimelineWriter,
    timeline_detected: &TimelineWriter,
) -> (TimelineCounts, Vec<ExportError>) {
    let (all, detected) = collect_timelines(modules);
    let mut counts = TimelineCounts::default();
    let mut errors = Vec::new();

    match append_logged(timeline, &all) {
        Ok(rows) => counts.timeline = rows,
        Err(e) => errors.push(e),
    }
    match append_logged(timeline_detected, &detected) {
        Ok(rows) => counts.timeline_detected = rows,
        Err(e) => errors.push(e),
    }
    (counts, errors)
}

/// Append only the merged detection timeline.
///
/// Used when re-checking saved results: their full timeline was already
/// written by the extraction run.
pub fn save_detected_timeline(
    modules: &[Box<dyn Module>],
    timeline_detected: &TimelineWriter,
) -> Result<usize, ExportError> {
    let detected: Vec<TimelineEntry> = modules
        .iter()
        .flat_map(|m| m.state().timeline_detected.iter().cloned())
        .collect();
    append_logged(timeline_detected, &detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ModuleConfig, Record};
    use crate::core::module::ModuleState;
    use crate::util::error::ModuleError;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixed {
        state: ModuleState,
        fail: bool,
        enabled: bool,
    }

    impl Fixed {
        fn boxed(records: Vec<Record>, fail: bool) -> Box<dyn Module> {
            Box::new(Fixed {
                state: ModuleState::with_results(ModuleConfig::default(), records),
                fail,
                enabled: true,
            })
        }
    }

    impl Module for Fixed {
        fn name(&self) -> &'static str {
            "FixedModule"
        }
        fn state(&self) -> &ModuleState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut ModuleState {
            &mut self.state
        }
        fn from_state(state: ModuleState) -> Self {
            Self {
                state,
                fail: false,
                enabled: true,
            }
        }
        fn enabled(&self) -> bool {
            self.enabled
        }
        fn extract(&mut self) -> Result<(), ModuleError> {
            if self.fail {
                Err(ModuleError::SourceCorrupted {
                    path: None,
                    reason: "truncated".into(),
                })
            } else {
                Ok(())
            }
        }
        fn check_indicators(&mut self) -> Result<(), ModuleError> {
            self.state.detected = self
                .state
                .results
                .iter()
                .filter(|r| r["bad"].as_bool() == Some(true))
                .cloned()
                .collect();
            Ok(())
        }
        fn serialize(&self, record: &Record) -> Result<Vec<TimelineEntry>, ModuleError> {
            Ok(vec![TimelineEntry::new(
                record["ts"].as_str().map(String::from),
                self.name(),
                "event",
                record["what"].as_str().unwrap_or_default(),
            )])
        }
    }

    fn modules() -> Vec<Box<dyn Module>> {
        vec![
            Fixed::boxed(
                vec![
                    json!({"ts": "2023-01-02", "what": "b"}),
                    json!({"ts": null, "what": "undated", "bad": true}),
                ],
                false,
            ),
            Fixed::boxed(vec![json!({"ts": "2023-01-01", "what": "a"})], false),
            Fixed::boxed(vec![json!({"ts": "2023-01-03", "what": "never"})], true),
        ]
    }

    #[test]
    fn test_failure_is_isolated_to_one_module() {
        for parallel in [false, true] {
            let mut mods = modules();
            let summary = run_all(&mut mods, parallel);
            assert_eq!(summary.completed, 2);
            assert_eq!(summary.failed, 1);
            assert!(summary.has_failures());
            assert_eq!(summary.detections(), 1);
            assert!(summary.reports[2].is_failure());
        }
    }

    #[test]
    fn test_disabled_modules_are_skipped() {
        let mut mods = vec![Box::new(Fixed {
            state: ModuleState::default(),
            fail: true,
            enabled: false,
        }) as Box<dyn Module>];
        let summary = run_all(&mut mods, false);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_merged_timeline_is_sorted_across_modules() {
        let dir = tempfile::tempdir().unwrap();
        let mut mods = modules();
        run_all(&mut mods, false);

        let all = TimelineWriter::new(dir.path().join("timeline.csv"));
        let detected = TimelineWriter::new(dir.path().join("timeline_detected.csv"));
        let (counts, errors) = save_merged_timelines(&mods, &all, &detected);
        assert!(errors.is_empty());
        assert_eq!(
            counts,
            TimelineCounts {
                timeline: 3,
                timeline_detected: 1
            }
        );

        let content = std::fs::read_to_string(all.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "UTC Timestamp,Plugin,Event,Description");
        assert!(lines[1].ends_with("undated"));
        assert!(lines[2].ends_with(",a"));
        assert!(lines[3].ends_with(",b"));
    }

    #[test]
    fn test_unwritable_timeline_does_not_block_detected_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut mods = modules();
        run_all(&mut mods, false);

        let blocked = dir.path().join("timeline.csv");
        std::fs::create_dir(&blocked).unwrap();
        let all = TimelineWriter::new(blocked.clone());
        let detected = TimelineWriter::new(dir.path().join("timeline_detected.csv"));

        let (counts, errors) = save_merged_timelines(&mods, &all, &detected);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ExportError::Io { .. }));
        assert_eq!(counts.timeline, 0);
        assert_eq!(counts.timeline_detected, 1);
        let content = std::fs::read_to_string(detected.path()).unwrap();
        assert!(content.lines().nth(1).unwrap().ends_with("undated"));
    }

    #[test]
    fn test_detected_timeline_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut mods = modules();
        check_all(&mut mods, false);

        let detected = TimelineWriter::new(dir.path().join("timeline_detected.csv"));
        assert_eq!(save_detected_timeline(&mods, &detected).unwrap(), 1);
        assert!(!dir.path().join("timeline.csv").exists());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(TimelineWriter::new(dir.path().join("timeline.csv")));
        let entries: Vec<TimelineEntry> = (0..200)
            .map(|i| TimelineEntry::new(Some(format!("{i:05}")), "m", "e", "x".repeat(64)))
            .collect();

        std::thread::scope(|s| {
            for _ in 0..4 {
                let writer = Arc::clone(&writer);
                let entries = &entries;
                s.spawn(move || writer.append(entries).unwrap());
            }
        });

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4 * 201);
        for block in lines.chunks(201) {
            assert_eq!(block[0], "UTC Timestamp,Plugin,Event,Description");
            assert!(block[1..].windows(2).all(|w| w[0] < w[1]));
        }
    }
}
