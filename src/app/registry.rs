// iocsweep - app/registry.rs
//
// Table of built-in modules, addressable by slug.

use crate::core::export;
use crate::core::model::ModuleConfig;
use crate::core::module::Module;
use crate::modules::{FileListing, ShutdownLog};
use crate::util::error::{self, ExportError, IocSweepError};
use std::path::Path;

/// Constructors for one built-in module type.
pub struct Builtin {
    pub slug: &'static str,
    pub description: &'static str,
    build: fn(ModuleConfig) -> Box<dyn Module>,
    load: fn(&Path, ModuleConfig) -> Result<Box<dyn Module>, ExportError>,
}

impl Builtin {
    pub fn build(&self, config: ModuleConfig) -> Box<dyn Module> {
        (self.build)(config)
    }

    /// Rebuild the module from a saved results file.
    pub fn load(&self, path: &Path, config: ModuleConfig) -> Result<Box<dyn Module>, ExportError> {
        (self.load)(path, config)
    }
}

fn boxed<M: Module + 'static>(m: M) -> Box<dyn Module> {
    Box::new(m)
}

static BUILTINS: &[Builtin] = &[
    Builtin {
        slug: "file_listing",
        description: "Every file under the dump root with size and modification time",
        build: |c| boxed(FileListing::new(c)),
        load: |p, c| FileListing::from_json(p, c).map(boxed),
    },
    Builtin {
        slug: "shutdown_log",
        description: "Processes still running at each recorded shutdown",
        build: |c| boxed(ShutdownLog::new(c)),
        load: |p, c| ShutdownLog::from_json(p, c).map(boxed),
    },
];

/// All built-in modules in run order.
pub fn builtins() -> &'static [Builtin] {
    BUILTINS
}

/// Look up a built-in by slug.
pub fn find(slug: &str) -> error::Result<&'static Builtin> {
    BUILTINS
        .iter()
        .find(|b| b.slug == slug)
        .ok_or_else(|| IocSweepError::UnknownModule {
            slug: slug.to_string(),
        })
}

/// Build the selected modules, or all of them when `slugs` is empty.
pub fn build_modules(
    slugs: &[String],
    config: &ModuleConfig,
) -> error::Result<Vec<Box<dyn Module>>> {
    if slugs.is_empty() {
        return Ok(BUILTINS.iter().map(|b| b.build(config.clone())).collect());
    }
    slugs
        .iter()
        .map(|s| find(s).map(|b| b.build(config.clone())))
        .collect()
}

/// Rebuild every built-in module that has a results file in `folder`.
///
/// Modules whose file is missing are skipped; a file that cannot be parsed
/// is logged and skipped so the remaining modules can still be checked.
pub fn load_saved_modules(folder: &Path, config: &ModuleConfig) -> Vec<Box<dyn Module>> {
    let mut modules = Vec::new();
    for builtin in BUILTINS {
        let path = export::results_path(folder, builtin.slug);
        if !path.is_file() {
            tracing::debug!(module = builtin.slug, path = %path.display(), "No saved results");
            continue;
        }
        match builtin.load(&path, config.clone()) {
            Ok(m) => modules.push(m),
            Err(e) => tracing::error!(
                module = builtin.slug,
                error = %e,
                "Unable to load saved results"
            ),
        }
    }
    modules
}
