//! Append-only, line-oriented audit log sink.
//!
//! One line per lifecycle event: `[timestamp] [EVENT] {json}`. The sink is
//! best-effort: a write failure is reported through tracing and the call
//! proceeds, since losing an audit line must never fail the request itself.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

/// File-backed audit line sink. Construct with [`AuditLog::open`] for a real
/// file or [`AuditLog::disabled`] to rely on tracing output alone.
pub struct AuditLog {
    file: Option<Mutex<File>>,
}

impl AuditLog {
    /// A sink that drops lines; audit events still flow through tracing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Opens (creating if needed) the audit file in append mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// Whether a file sink is attached.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Appends one timestamped event line with the serialized record.
    pub fn append<T: Serialize>(&self, event: &str, record: &T) {
        let Some(file) = &self.file else {
            return;
        };
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(err) => {
                error!(%err, event, "failed to serialize audit record");
                return;
            }
        };
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f %z");
        let mut file = file.lock();
        if let Err(err) = writeln!(file, "[{stamp}] [{event}] {json}") {
            error!(%err, event, "failed to append audit line");
        }
    }
}
