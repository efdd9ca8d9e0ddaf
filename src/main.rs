// iocsweep - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation
// 3. Indicator loading
// 4. Dispatch to a batch run over the built-in modules

use clap::{Parser, Subcommand};
use iocsweep::app::{batch, registry};
use iocsweep::core::indicators::{IndicatorPort, IndicatorSet};
use iocsweep::core::model::ModuleConfig;
use iocsweep::core::module::Module;
use iocsweep::platform::config::{self, AppConfig, PlatformPaths};
use iocsweep::util;
use iocsweep::util::error::{self, ExportError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// iocsweep - extract forensic artifacts and check them against indicators.
#[derive(Parser, Debug)]
#[command(name = "iocsweep", version, about)]
struct Cli {
    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract artifacts from a filesystem dump or backup and check them.
    CheckFs {
        /// Root of the filesystem dump.
        base: PathBuf,

        /// Folder for structured results and timelines.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Indicator file (repeatable).
        #[arg(short = 'i', long = "iocs")]
        iocs: Vec<PathBuf>,

        /// Skip slow extraction paths.
        #[arg(short = 'f', long = "fast")]
        fast: bool,

        /// Only run the named module (repeatable).
        #[arg(short = 'm', long = "module")]
        modules: Vec<String>,

        /// Run one worker per module.
        #[arg(long = "parallel")]
        parallel: bool,
    },

    /// Re-check results saved by a previous run against indicators.
    CheckSaved {
        /// Folder holding `{module}.json` result files.
        folder: PathBuf,

        /// Indicator file (repeatable).
        #[arg(short = 'i', long = "iocs")]
        iocs: Vec<PathBuf>,

        /// Run one worker per module.
        #[arg(long = "parallel")]
        parallel: bool,
    },

    /// List the built-in modules.
    ListModules,
}

/// Load every indicator file from the CLI and config into one shared set.
fn load_indicators(
    cli_files: &[PathBuf],
    app_config: &AppConfig,
) -> error::Result<Option<Arc<dyn IndicatorPort>>> {
    let files: Vec<PathBuf> = cli_files
        .iter()
        .chain(app_config.indicator_files.iter())
        .cloned()
        .collect();
    if files.is_empty() {
        return Ok(None);
    }

    let set = IndicatorSet::from_files(&files)?;
    tracing::info!(indicators = set.len(), files = files.len(), "Indicators ready");
    Ok(Some(Arc::new(set)))
}

fn bind_all(modules: &mut [Box<dyn Module>], indicators: &Option<Arc<dyn IndicatorPort>>) {
    if let Some(indicators) = indicators {
        for module in modules.iter_mut() {
            module.bind_indicators(Arc::clone(indicators));
        }
    }
}

fn check_fs(
    base: PathBuf,
    output: Option<PathBuf>,
    iocs: &[PathBuf],
    fast: bool,
    slugs: &[String],
    parallel: bool,
    app_config: &AppConfig,
) -> error::Result<ExitCode> {
    let indicators = load_indicators(iocs, app_config)?;

    let output_folder = output.or_else(|| app_config.output_folder.clone());
    if let Some(ref folder) = output_folder {
        std::fs::create_dir_all(folder).map_err(|e| ExportError::Io {
            path: folder.clone(),
            source: e,
        })?;
    }

    let module_config = ModuleConfig {
        file_path: None,
        base_folder: Some(base),
        output_folder: output_folder.clone(),
        fast_mode: fast || app_config.fast_mode,
    };

    let mut modules = registry::build_modules(slugs, &module_config)?;
    bind_all(&mut modules, &indicators);

    let summary = batch::run_all(&mut modules, parallel || app_config.parallel);

    if let Some(folder) = output_folder {
        let timeline = batch::TimelineWriter::new(folder.join(&app_config.timeline_file));
        let detected =
            batch::TimelineWriter::new(folder.join(&app_config.timeline_detected_file));
        // Failures are logged by the writer; the module outputs already stand.
        let _ = batch::save_merged_timelines(&modules, &timeline, &detected);
    }

    Ok(report(&summary))
}

fn check_saved(
    folder: &Path,
    iocs: &[PathBuf],
    parallel: bool,
    app_config: &AppConfig,
) -> error::Result<ExitCode> {
    let Some(indicators) = load_indicators(iocs, app_config)? else {
        eprintln!("Error: no indicators given; pass --iocs or set [indicators] files");
        return Ok(ExitCode::FAILURE);
    };

    let module_config = ModuleConfig {
        output_folder: Some(folder.to_path_buf()),
        ..Default::default()
    };
    let mut modules = registry::load_saved_modules(folder, &module_config);
    if modules.is_empty() {
        tracing::warn!(folder = %folder.display(), "No saved module results found");
    }
    bind_all(&mut modules, &Some(indicators));

    let summary = batch::check_all(&mut modules, parallel || app_config.parallel);

    let detected = batch::TimelineWriter::new(folder.join(&app_config.timeline_detected_file));
    // Logged by the writer.
    let _ = batch::save_detected_timeline(&modules, &detected);

    Ok(report(&summary))
}

fn report(summary: &batch::BatchSummary) -> ExitCode {
    println!(
        "{} modules: {} completed, {} skipped, {} failed, {} detections",
        summary.reports.len(),
        summary.completed,
        summary.skipped,
        summary.failed,
        summary.detections()
    );
    if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());
    let (app_config, config_warnings) = config::load_config(&config_path);

    util::logging::init(cli.debug, app_config.log_level.as_deref());
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "{} starting",
        util::constants::APP_NAME
    );

    let result = match cli.command {
        Command::CheckFs {
            base,
            output,
            iocs,
            fast,
            modules,
            parallel,
        } => check_fs(base, output, &iocs, fast, &modules, parallel, &app_config),
        Command::CheckSaved {
            folder,
            iocs,
            parallel,
        } => check_saved(&folder, &iocs, parallel, &app_config),
        Command::ListModules => {
            for builtin in registry::builtins() {
                println!("{:<16} {}", builtin.slug, builtin.description);
            }
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
