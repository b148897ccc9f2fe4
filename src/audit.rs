// src/audit.rs
//
// Append-only violation log. One JSON object per line; every entry carries
// its own timestamp, kind, identifier and session reference so the file
// can be read without any surrounding context.

use crate::error::GateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const UNKNOWN_IDENTIFIER: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    UnauthorizedIdentifier,
    UnsafeSubject,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnauthorizedIdentifier => "UNAUTHORIZED_IDENTIFIER",
            Self::UnsafeSubject => "UNSAFE_SUBJECT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ViolationKind,
    pub identifier: String,
    pub session_reference: Uuid,
}

impl ViolationRecord {
    /// Empty identifiers are recorded as `UNKNOWN`.
    pub fn new(kind: ViolationKind, identifier: &str, session_reference: Uuid) -> Self {
        let identifier = if identifier.is_empty() {
            UNKNOWN_IDENTIFIER.to_string()
        } else {
            identifier.to_string()
        };
        Self {
            timestamp: Utc::now(),
            kind,
            identifier,
            session_reference,
        }
    }
}

pub trait AuditSink {
    fn record(&mut self, violation: &ViolationRecord) -> Result<(), GateError>;
}

/// JSON-lines file sink.
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    /// Parent directories are created lazily on each write so that a
    /// store which disappears mid-run recovers once it is back.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&mut self, violation: &ViolationRecord) -> Result<(), GateError> {
        let line = serde_json::to_string(violation)
            .map_err(|e| GateError::audit_write(format!("serialize violation: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GateError::audit_write(format!("create_dir_all {:?}: {}", parent, e)))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GateError::audit_write(format!("open audit log {:?}: {}", self.path, e)))?;
        f.write_all(line.as_bytes())
            .and_then(|_| f.write_all(b"\n"))
            .map_err(|e| GateError::audit_write(format!("write audit log {:?}: {}", self.path, e)))?;
        Ok(())
    }
}

/// In-process sink; keeps records for inspection.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Vec<ViolationRecord>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ViolationRecord] {
        &self.records
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn record(&mut self, violation: &ViolationRecord) -> Result<(), GateError> {
        self.records.push(violation.clone());
        Ok(())
    }
}

impl<S: AuditSink + ?Sized> AuditSink for Box<S> {
    fn record(&mut self, violation: &ViolationRecord) -> Result<(), GateError> {
        (**self).record(violation)
    }
}

/// Load a JSON-lines violation log back into records. Blank lines are skipped.
pub fn read_violations(path: impl AsRef<Path>) -> anyhow::Result<Vec<ViolationRecord>> {
    use anyhow::Context;

    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("read audit log {:?}", path))?;

    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: ViolationRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse violation at line {}", i + 1))?;
        records.push(record);
    }
    Ok(records)
}
