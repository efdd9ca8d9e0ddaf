// iocsweep - modules/shutdown_log.rs
//
// Parses the diagnostics shutdown log. Each shutdown block lists the
// processes still running ("remaining client pid: N (path)") and is closed
// by a "SIGTERM: [unix_ts]" marker whose time applies to every client in
// the block. Processes lingering at shutdown are a classic persistence tell,
// so each client path and process name is checked against indicators.

use crate::core::model::{format_unix_timestamp, ModuleConfig, Record, TimelineEntry};
use crate::core::module::{Module, ModuleState};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::ModuleError;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Serialize)]
struct ShutdownRecord {
    isodate: Option<String>,
    pid: u32,
    client: String,
}

fn client_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^remaining client pid:\s*(\d+)\s*\((.*)\)\s*$").expect("static regex")
    })
}

fn sigterm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^SIGTERM:\s*\[(-?\d+)\]").expect("static regex"))
}

pub struct ShutdownLog {
    state: ModuleState,
}

impl ShutdownLog {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            state: ModuleState::new(config),
        }
    }

    /// Parse shutdown log text into records. Clients listed after the last
    /// SIGTERM marker belong to no completed shutdown and are dropped.
    fn parse(content: &str) -> Vec<ShutdownRecord> {
        let mut records = Vec::new();
        let mut pending: Vec<(u32, String)> = Vec::new();

        for line in content.lines().map(str::trim) {
            if let Some(caps) = client_pattern().captures(line) {
                match caps[1].parse::<u32>() {
                    Ok(pid) => pending.push((pid, caps[2].to_string())),
                    Err(e) => tracing::debug!(line, error = %e, "Unparseable client pid"),
                }
            } else if let Some(caps) = sigterm_pattern().captures(line) {
                let isodate = caps[1].parse::<i64>().ok().and_then(format_unix_timestamp);
                if isodate.is_none() {
                    tracing::warn!(line, "Shutdown marker with invalid timestamp");
                }
                records.extend(pending.drain(..).map(|(pid, client)| ShutdownRecord {
                    isodate: isodate.clone(),
                    pid,
                    client,
                }));
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                clients = pending.len(),
                "Discarding clients without a closing shutdown marker"
            );
        }
        records
    }
}

impl Module for ShutdownLog {
    fn name(&self) -> &'static str {
        "ShutdownLog"
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
        let path = fs::resolve_source(
            self.state.config.file_path.as_deref(),
            self.state.config.base_folder.as_deref(),
            constants::SHUTDOWN_LOG_RELATIVE_PATH,
        )?;
        let content = fs::read_text_source(&path)?;

        for record in Self::parse(&content) {
            self.state.push_result(&record);
        }
        tracing::info!(
            path = %path.display(),
            entries = self.state.results.len(),
            "Extracted shutdown log entries"
        );
        Ok(())
    }

    fn check_indicators(&mut self) -> Result<(), ModuleError> {
        let Some(indicators) = self.state.indicators.clone() else {
            return Ok(());
        };

        for record in &self.state.results {
            let Some(client) = record.get("client").and_then(|v| v.as_str()) else {
                continue;
            };
            let hit = indicators
                .check_file_path(client)
                .or_else(|| indicators.check_process(client));
            if let Some(hit) = hit {
                self.state.detected.push(super::flag_record(record, &hit));
            }
        }
        Ok(())
    }

    fn serialize(&self, record: &Record) -> Result<Vec<TimelineEntry>, ModuleError> {
        let Some(client) = record.get("client").and_then(|v| v.as_str()) else {
            return Ok(Vec::new());
        };
        let pid = record.get("pid").and_then(|v| v.as_u64()).unwrap_or(0);
        let isodate = record
            .get("isodate")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(vec![TimelineEntry::new(
            isodate,
            self.name(),
            "shutdown",
            format!("Client {client} with PID {pid} was running when the device was shut down"),
        )])
    }
}
