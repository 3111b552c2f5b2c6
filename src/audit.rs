//! Append-only audit log of activation/validation attempts.
//!
//! The public contract is `append` only — no update or delete exists.
//! Entries are observational: the engine writes one per attempt, success
//! or failure, and never reads them back to make trust decisions, which
//! keeps logging out of the protocol's feedback path.

use crate::protocol::models::ValidationLogEntry;
use crate::LicenseError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Append-only sink for validation log entries.
pub trait AuditLog: Send + Sync {
    /// Append one entry. Failures surface as [`LicenseError::AuditIo`]
    /// and are treated as best-effort by the engine.
    fn append(&self, entry: &ValidationLogEntry) -> Result<(), LicenseError>;
}

/// In-memory audit log for tests and single-process embeddings.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<ValidationLogEntry>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries appended so far.
    pub fn entries(&self) -> Vec<ValidationLogEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: &ValidationLogEntry) -> Result<(), LicenseError> {
        self.entries
            .lock()
            .map_err(|_| LicenseError::AuditIo("audit log lock poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

/// File-backed audit log: one JSON object per line, append-only.
pub struct FileAuditLog {
    path: PathBuf,
    // Serializes appends so interleaved entries cannot shear a line.
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Create a log writing to the given file path.
    pub fn new(path: PathBuf) -> Result<Self, LicenseError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LicenseError::AuditIo(format!("Failed to create log dir: {}", e)))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a log under `dirs::data_dir()/<namespace>/audit.jsonl`.
    pub fn with_namespace(namespace: &str) -> Result<Self, LicenseError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LicenseError::AuditIo("Could not find data directory".to_string()))?;
        Self::new(base_dir.join(namespace).join("audit.jsonl"))
    }

    /// Read every entry back, oldest first.
    ///
    /// Operator/dispute tooling only; the trust path never calls this.
    pub fn read_all(&self) -> Result<Vec<ValidationLogEntry>, LicenseError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| LicenseError::AuditIo(format!("Failed to read log: {}", e)))?;

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| LicenseError::AuditIo(format!("Corrupt log line: {}", e)))
            })
            .collect()
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, entry: &ValidationLogEntry) -> Result<(), LicenseError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| LicenseError::AuditIo(format!("Failed to serialize entry: {}", e)))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LicenseError::AuditIo("audit log lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LicenseError::AuditIo(format!("Failed to open log: {}", e)))?;

        writeln!(file, "{}", line)
            .map_err(|e| LicenseError::AuditIo(format!("Failed to append entry: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::AttemptKind;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn entry(key: &str, success: bool) -> ValidationLogEntry {
        ValidationLogEntry {
            license_key: key.to_string(),
            device_fingerprint: "fp".repeat(16),
            kind: AttemptKind::Activation,
            success,
            failure_reason: (!success).then(|| "Device fingerprint mismatch".to_string()),
            caller: Some("10.0.0.7".to_string()),
            timestamp: Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn memory_log_records_in_order() {
        let log = MemoryAuditLog::new();
        log.append(&entry("K1", true)).unwrap();
        log.append(&entry("K2", false)).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].license_key, "K1");
        assert!(!entries[1].success);
        assert_eq!(
            entries[1].failure_reason.as_deref(),
            Some("Device fingerprint mismatch")
        );
    }

    #[test]
    fn file_log_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(temp_dir.path().join("audit.jsonl")).unwrap();

        log.append(&entry("K1", true)).unwrap();
        log.append(&entry("K1", false)).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].license_key, "K1");
        assert!(entries[0].success);
        assert!(!entries[1].success);
    }

    #[test]
    fn file_log_reads_empty_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(temp_dir.path().join("audit.jsonl")).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn file_log_entries_are_one_json_per_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.jsonl");
        let log = FileAuditLog::new(path.clone()).unwrap();

        log.append(&entry("K1", true)).unwrap();
        log.append(&entry("K2", true)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        for line in raw.lines() {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
    }
}
