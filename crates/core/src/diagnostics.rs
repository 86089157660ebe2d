//! Diagnostic sinks.
//!
//! Discovery reports what it looked at and what it skipped through a
//! [`DiagnosticSink`]. Every line carries the patient id and a [`Severity`]. The text is
//! informational only; nothing parses it back.
//!
//! A single sink is shared by every patient of a dataset, so implementations must be
//! `Send + Sync` and serialise their own writes.

use crate::constants::{DEFAULT_LOGS_FILENAME, DEFAULT_WARNINGS_FILENAME};
use crate::{CatalogError, CatalogResult};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Warning,
    Critical,
}

impl Severity {
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// One recorded diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub patient_id: String,
    pub severity: Severity,
    pub message: String,
}

/// Append-only destination for discovery diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, patient_id: &str, severity: Severity, message: &str);

    fn trace(&self, patient_id: &str, message: &str) {
        self.record(patient_id, Severity::Trace, message);
    }

    fn warning(&self, patient_id: &str, message: &str) {
        self.record(patient_id, Severity::Warning, message);
    }

    fn critical(&self, patient_id: &str, message: &str) {
        self.record(patient_id, Severity::Critical, message);
    }
}

fn emit_tracing(patient_id: &str, severity: Severity, message: &str) {
    match severity {
        Severity::Trace => tracing::debug!(patient = patient_id, "{}", message),
        Severity::Warning => tracing::warn!(patient = patient_id, "{}", message),
        Severity::Critical => tracing::error!(patient = patient_id, "{}", message),
    }
}

/// Forwards diagnostics to `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, patient_id: &str, severity: Severity, message: &str) {
        emit_tracing(patient_id, severity, message);
    }
}

/// Writes diagnostics to two append-only text files.
///
/// Every line goes to the trace log as `PID:{id} - {message}`. Warnings and critical
/// lines additionally go to the warnings log as `{SEVERITY} {id} - {message}`. Both are
/// prefixed with an RFC 3339 UTC timestamp. Events are also forwarded to `tracing`.
#[derive(Debug)]
pub struct FileSink {
    logs_path: PathBuf,
    warnings_path: PathBuf,
    logs: Mutex<File>,
    warnings: Mutex<File>,
}

impl FileSink {
    /// Opens (creating if needed) both log files in append mode.
    pub fn open(logs_path: &Path, warnings_path: &Path) -> CatalogResult<Self> {
        Ok(Self {
            logs_path: logs_path.to_path_buf(),
            warnings_path: warnings_path.to_path_buf(),
            logs: Mutex::new(open_append(logs_path)?),
            warnings: Mutex::new(open_append(warnings_path)?),
        })
    }

    /// Opens `logs.txt` and `warnings.txt` inside `dir`.
    pub fn in_directory(dir: &Path) -> CatalogResult<Self> {
        Self::open(
            &dir.join(DEFAULT_LOGS_FILENAME),
            &dir.join(DEFAULT_WARNINGS_FILENAME),
        )
    }

    pub fn logs_path(&self) -> &Path {
        &self.logs_path
    }

    pub fn warnings_path(&self) -> &Path {
        &self.warnings_path
    }
}

fn open_append(path: &Path) -> CatalogResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| CatalogError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })
}

fn append_line(file: &Mutex<File>, line: &str) -> std::io::Result<()> {
    // A poisoned lock only means another writer panicked mid-line; keep appending.
    let mut guard = match file.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    writeln!(guard, "{line}")
}

impl DiagnosticSink for FileSink {
    fn record(&self, patient_id: &str, severity: Severity, message: &str) {
        emit_tracing(patient_id, severity, message);

        let now = chrono::Utc::now().to_rfc3339();
        if let Err(e) = append_line(&self.logs, &format!("{now} PID:{patient_id} - {message}")) {
            tracing::warn!("failed to append to {}: {}", self.logs_path.display(), e);
        }

        if severity >= Severity::Warning {
            let line = format!("{now} {} {patient_id} - {message}", severity.tag());
            if let Err(e) = append_line(&self.warnings, &line) {
                tracing::warn!("failed to append to {}: {}", self.warnings_path.display(), e);
            }
        }
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|d| d.severity == severity)
            .collect()
    }

    /// Entries whose message contains `needle`.
    pub fn matching(&self, needle: &str) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|d| d.message.contains(needle))
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, patient_id: &str, severity: Severity, message: &str) {
        emit_tracing(patient_id, severity, message);
        let entry = Diagnostic {
            patient_id: patient_id.to_owned(),
            severity,
            message: message.to_owned(),
        };
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
