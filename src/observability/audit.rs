/// Proctoring audit trail
/// Structured, append-only record of violations and session lifecycle for later review
///
/// Every record carries the session correlation ids so entries from concurrent
/// candidates sharing one file can be separated again.
use crate::client::ProctoringSink;
use crate::config::settings::AuditConfig;
use crate::config::types::{ProctorError, Result};
use crate::session::types::FinalPayload;
use crate::violation::event::{Severity, ViolationEvent};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Correlation identifiers for one exam attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIds {
    /// Unique per attempt; a reloaded exam link gets a new one
    pub session_id: Uuid,
    pub exam_token: String,
    pub opened_at: DateTime<Utc>,
}

impl SessionIds {
    pub fn new(exam_token: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            exam_token: exam_token.into(),
            opened_at: Utc::now(),
        }
    }
}

/// Lifecycle records written next to violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRecordKind {
    SessionStarted,
    Violation,
    ExamSubmitted,
}

/// Log a violation at the level matching its severity
pub fn log_violation(token: &str, event: &ViolationEvent) {
    match event.severity() {
        Severity::Critical => error!(
            "PROCTORING CRITICAL: {} - {} (exam {})",
            event.kind(),
            event.message(),
            token
        ),
        Severity::High => error!(
            "PROCTORING HIGH: {} - {} (exam {})",
            event.kind(),
            event.message(),
            token
        ),
        Severity::Medium => warn!(
            "PROCTORING MEDIUM: {} - {} (exam {})",
            event.kind(),
            event.message(),
            token
        ),
        Severity::Low => info!(
            "PROCTORING LOW: {} - {} (exam {})",
            event.kind(),
            event.message(),
            token
        ),
    }
}

/// JSON-lines audit file. Also usable as a proctoring sink.
pub struct AuditTrail {
    file: Mutex<File>,
    path: PathBuf,
    session_id: Option<Uuid>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("path", &self.path)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl AuditTrail {
    /// Open (or create) the audit file; defaults to `$TMPDIR/proctorbox/proctoring-audit.jsonl`
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(default_audit_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ProctorError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ProctorError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            session_id: None,
        })
    }

    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        Self::new(config.path.clone())
    }

    /// Stamp every record with this session's id
    pub fn for_session(mut self, ids: &SessionIds) -> Self {
        self.session_id = Some(ids.session_id);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_session_started(&self, ids: &SessionIds, duration_seconds: u64) -> Result<()> {
        let mut entry = self.base_entry(AuditRecordKind::SessionStarted, &ids.exam_token);
        entry["session_id"] = serde_json::json!(ids.session_id);
        entry["duration_seconds"] = serde_json::json!(duration_seconds);
        self.write_entry(&entry)
    }

    pub fn record_submission(&self, token: &str, payload: &FinalPayload) -> Result<()> {
        let mut entry = self.base_entry(AuditRecordKind::ExamSubmitted, token);
        entry["session_id"] = serde_json::json!(payload.session_id);
        entry["reason"] = serde_json::to_value(payload.reason)?;
        entry["time_spent_seconds"] = serde_json::json!(payload.time_spent_seconds);
        entry["violations"] = serde_json::json!(payload.violation_log.len());
        entry["questions_submitted"] = serde_json::json!(payload.submissions.len());
        entry["fingerprint"] = serde_json::json!(payload.fingerprint);
        self.write_entry(&entry)
    }

    fn base_entry(&self, kind: AuditRecordKind, token: &str) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "record": kind,
            "exam_token": token,
            "process_id": std::process::id(),
        });
        if let Some(session_id) = self.session_id {
            entry["session_id"] = serde_json::json!(session_id);
        }
        entry
    }

    fn write_entry(&self, entry: &serde_json::Value) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| ProctorError::Config("Audit log lock poisoned".to_string()))?;
        writeln!(file, "{}", entry)?;
        file.flush()?;
        Ok(())
    }
}

impl ProctoringSink for AuditTrail {
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()> {
        let mut entry = self.base_entry(AuditRecordKind::Violation, token);
        entry["violation"] = serde_json::to_value(event)?;
        self.write_entry(&entry)
    }
}

fn default_audit_path() -> PathBuf {
    std::env::temp_dir()
        .join("proctorbox")
        .join("proctoring-audit.jsonl")
}
