// iocsweep - platform/fs.rs
//
// Filesystem helpers for extraction modules. Every failure is mapped onto
// the module error taxonomy so modules can simply `?` their reads.

use crate::util::error::ModuleError;
use std::path::{Path, PathBuf};

/// Resolve a module's source file: an explicit `file_path` wins, otherwise
/// `relative` is joined onto the dump root.
///
/// Returns `SourceNotFound` when neither is configured.
pub fn resolve_source(
    file_path: Option<&Path>,
    base_folder: Option<&Path>,
    relative: &str,
) -> Result<PathBuf, ModuleError> {
    match (file_path, base_folder) {
        (Some(p), _) => Ok(p.to_path_buf()),
        (None, Some(base)) => Ok(base.join(relative)),
        (None, None) => Err(ModuleError::SourceNotFound {
            path: None,
            reason: format!("no file path or base folder configured for '{relative}'"),
        }),
    }
}

/// Read a text source strictly as UTF-8.
///
/// Invalid UTF-8 is reported as `SourceCorrupted`; I/O errors are classified
/// through `ModuleError::from_io`.
pub fn read_text_source(path: &Path) -> Result<String, ModuleError> {
    let bytes = std::fs::read(path).map_err(|e| ModuleError::from_io(path, e))?;
    String::from_utf8(bytes).map_err(|e| ModuleError::SourceCorrupted {
        path: Some(path.to_path_buf()),
        reason: format!("not valid UTF-8: {e}"),
    })
}

/// Check that `path` is an existing, listable directory.
pub fn ensure_readable_dir(path: &Path) -> Result<(), ModuleError> {
    let metadata = std::fs::metadata(path).map_err(|e| ModuleError::from_io(path, e))?;
    if !metadata.is_dir() {
        return Err(ModuleError::SourceNotFound {
            path: Some(path.to_path_buf()),
            reason: "not a directory".to_string(),
        });
    }
    std::fs::read_dir(path).map_err(|e| ModuleError::from_io(path, e))?;
    Ok(())
}
