// iocsweep - app/runner.rs
//
// Module run lifecycle:
//
//   Created → Extracting → {Extracted | ExtractFailed}
//           → Detecting → Timelining → Persisted
//
// Every failure is caught and classified here so one module can never abort
// its siblings. "Nothing to extract" and "no access" are expected outcomes
// and logged at INFO; corruption and unclassified errors stop the module and
// are reported as failures.

use crate::core::model::ModuleStage;
use crate::core::module::Module;
use crate::util::error::ModuleError;
use std::path::PathBuf;

/// Why a module run ended early without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The module provides no extraction step.
    NotImplemented,
    /// The module's source data is absent.
    NoData,
    /// The module's source data could not be accessed.
    InsufficientPrivileges,
    /// The module is disabled and was not run.
    Disabled,
}

/// Final outcome of one module run.
#[derive(Debug)]
pub enum RunOutcome {
    /// All reachable stages ran.
    Completed,
    /// The run stopped early for an expected reason.
    Skipped(SkipReason),
    /// The run stopped on an error.
    Failed(ModuleError),
}

/// Summary of one module run.
#[derive(Debug)]
pub struct ModuleReport {
    pub module: &'static str,
    pub slug: String,
    /// Last stage the module entered.
    pub stage: ModuleStage,
    pub outcome: RunOutcome,
    pub results: usize,
    pub detected: usize,
    /// Indicators were bound and checking found nothing.
    pub no_detections: bool,
    /// Files written by the persistence stage.
    pub written: Vec<PathBuf>,
    /// Number of structured files that failed to write.
    pub persist_errors: usize,
}

impl ModuleReport {
    fn new(module: &dyn Module) -> Self {
        Self {
            module: module.name(),
            slug: module.slug(),
            stage: module.state().stage,
            outcome: RunOutcome::Completed,
            results: 0,
            detected: 0,
            no_detections: false,
            written: Vec::new(),
            persist_errors: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed(_))
    }

    /// Report for a module that a batch run left out.
    pub fn disabled(module: &dyn Module) -> Self {
        let mut report = Self::new(module);
        report.outcome = RunOutcome::Skipped(SkipReason::Disabled);
        report
    }

    fn finish(mut self, module: &dyn Module, outcome: RunOutcome) -> Self {
        let state = module.state();
        self.stage = state.stage;
        self.results = state.results.len();
        self.detected = state.detected.len();
        self.outcome = outcome;
        self
    }
}

/// Render an error and all of its sources on one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

fn enter(module: &mut dyn Module, stage: ModuleStage) {
    tracing::debug!(module = module.name(), stage = %stage, "Entering stage");
    module.state_mut().stage = stage;
}

/// Run a module through its full lifecycle.
pub fn run_module(module: &mut dyn Module) -> ModuleReport {
    let name = module.name();
    let report = ModuleReport::new(module);
    tracing::info!(module = name, "Running module {name}...");

    enter(module, ModuleStage::Extracting);
    let stop = match module.extract() {
        Ok(()) => None,
        Err(ModuleError::NotImplemented) => {
            tracing::error!(
                module = name,
                "The extraction procedure of module {name} was not implemented yet!"
            );
            Some(RunOutcome::Skipped(SkipReason::NotImplemented))
        }
        Err(e @ ModuleError::SourceNotFound { .. }) => {
            tracing::info!(
                module = name,
                reason = %e,
                "There might be no data to extract by module {name}"
            );
            Some(RunOutcome::Skipped(SkipReason::NoData))
        }
        Err(e @ ModuleError::InsufficientPrivileges { .. }) => {
            tracing::info!(
                module = name,
                reason = %e,
                "Insufficient privileges for module {name}"
            );
            Some(RunOutcome::Skipped(SkipReason::InsufficientPrivileges))
        }
        Err(e @ ModuleError::SourceCorrupted { .. }) => {
            tracing::error!(
                module = name,
                kind = e.kind(),
                reason = %e,
                "The {name} module database seems to be corrupted and recovery failed"
            );
            Some(RunOutcome::Failed(e))
        }
        Err(e @ ModuleError::Failed { .. }) => {
            tracing::error!(
                module = name,
                kind = e.kind(),
                error = %error_chain(&e),
                detail = ?e,
                "Error in running extraction from module {name}"
            );
            Some(RunOutcome::Failed(e))
        }
    };

    if let Some(outcome) = stop {
        enter(module, ModuleStage::ExtractFailed);
        return report.finish(module, outcome);
    }

    enter(module, ModuleStage::Extracted);
    continue_pipeline(module, report, true)
}

/// Run detection, timeline, and persistence on a module whose results are
/// already populated, e.g. one rebuilt with `Module::from_json`.
///
/// Only `detected` is written; the results file the module was rebuilt from
/// is left as it was.
pub fn run_detection(module: &mut dyn Module) -> ModuleReport {
    let report = ModuleReport::new(module);
    tracing::info!(
        module = module.name(),
        results = module.state().results.len(),
        "Checking saved results of module {}...",
        module.name()
    );
    continue_pipeline(module, report, false)
}

fn continue_pipeline(
    module: &mut dyn Module,
    mut report: ModuleReport,
    persist_results: bool,
) -> ModuleReport {
    let name = module.name();

    enter(module, ModuleStage::Detecting);
    match module.check_indicators() {
        Ok(()) => {
            let state = module.state();
            if state.indicators.is_some() && state.detected.is_empty() {
                tracing::info!(module = name, "The {name} module produced no detections!");
                report.no_detections = true;
            }
        }
        Err(ModuleError::NotImplemented) => {
            tracing::info!(
                module = name,
                "The {name} module does not support checking for indicators"
            );
        }
        Err(e) => {
            tracing::error!(
                module = name,
                kind = e.kind(),
                error = %error_chain(&e),
                detail = ?e,
                "Error while checking indicators in module {name}"
            );
            return report.finish(module, RunOutcome::Failed(e));
        }
    }

    enter(module, ModuleStage::Timelining);
    match module.to_timeline() {
        Ok(()) | Err(ModuleError::NotImplemented) => {}
        Err(e) => {
            tracing::error!(
                module = name,
                kind = e.kind(),
                error = %error_chain(&e),
                detail = ?e,
                "Error while building the timeline of module {name}"
            );
            return report.finish(module, RunOutcome::Failed(e));
        }
    }

    let (written, errors) = if persist_results {
        module.persist()
    } else {
        module.persist_detected()
    };
    report.written = written;
    report.persist_errors = errors.len();
    enter(module, ModuleStage::Persisted);

    report.finish(module, RunOutcome::Completed)
}
