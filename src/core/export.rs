// iocsweep - core/export.rs
//
// Structured JSON result files and the merged CSV timeline.
//
// JSON files are written with four-space indentation and sorted keys so two
// runs over the same evidence produce byte-identical output. The CSV timeline
// is opened in append mode: successive runs accumulate in the same file, each
// block introduced by its own header row.

use crate::core::model::{Record, TimelineEntry};
use crate::core::timeline;
use crate::util::constants;
use crate::util::error::ExportError;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path of the results file for `slug` inside `folder`.
pub fn results_path(folder: &Path, slug: &str) -> PathBuf {
    folder.join(format!("{slug}.{}", constants::RESULTS_FILE_EXTENSION))
}

/// Path of the detections file for `slug` inside `folder`.
pub fn detected_path(folder: &Path, slug: &str) -> PathBuf {
    folder.join(format!(
        "{slug}{}.{}",
        constants::DETECTED_FILE_SUFFIX,
        constants::RESULTS_FILE_EXTENSION
    ))
}

/// Encode `records` as indented JSON into `writer`.
pub fn write_records_to<W: Write>(
    records: &[Record],
    writer: W,
    path: &Path,
) -> Result<(), ExportError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(constants::JSON_INDENT);
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    records.serialize(&mut ser).map_err(|e| ExportError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = ser.into_inner();
    writer.flush().map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `records` to `path`, replacing any previous file.
pub fn write_records(records: &[Record], path: &Path) -> Result<usize, ExportError> {
    let file = std::fs::File::create(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_records_to(records, BufWriter::new(file), path)?;

    tracing::debug!(path = %path.display(), count = records.len(), "Wrote structured records");
    Ok(records.len())
}

/// Read a previously written results file back into records.
///
/// A file holding a single JSON value rather than an array is returned as a
/// one-element list.
pub fn load_records(path: &Path) -> Result<Vec<Record>, ExportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: Record = serde_json::from_str(&content).map_err(|e| ExportError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let records = match value {
        Record::Array(items) => items,
        other => vec![other],
    };
    tracing::info!(
        path = %path.display(),
        count = records.len(),
        "Loaded results from file"
    );
    Ok(records)
}

/// Render `entries` as a CSV table (header + rows sorted by timestamp).
///
/// Returns the number of rows written, excluding the header.
pub fn write_timeline_to<W: Write>(
    entries: &[TimelineEntry],
    writer: W,
    path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e: csv::Error| ExportError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut sorted = entries.to_vec();
    timeline::sort_by_timestamp(&mut sorted);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(constants::TIMELINE_HEADER)
        .map_err(csv_err)?;

    for entry in &sorted {
        csv_writer
            .write_record([
                entry.timestamp.as_deref().unwrap_or(""),
                entry.module.as_str(),
                entry.event.as_str(),
                entry.description.as_str(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(sorted.len())
}

/// Append the rendered timeline to `path`, creating it if needed.
pub fn save_timeline(entries: &[TimelineEntry], path: &Path) -> Result<usize, ExportError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let count = write_timeline_to(entries, BufWriter::new(file), path)?;
    tracing::info!(path = %path.display(), rows = count, "Saved timeline");
    Ok(count)
}
