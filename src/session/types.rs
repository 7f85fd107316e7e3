/// Exam session data types
/// JSON field names follow the exam service's camelCase wire format
use crate::config::types::{SessionPhase, SubmitReason};
use crate::violation::event::ViolationEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    pub input: String,
    pub output: String,
}

/// A coding question. Fixed once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub examples: Vec<CodeExample>,
}

/// Candidate's working copy for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBuffer {
    pub code: String,
    pub language: String,
}

impl CodeBuffer {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
        }
    }

    /// Whitespace-only buffers are never persisted
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// Snapshot taken when a question is individually submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub submitted: bool,
    pub code: String,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

/// Response of the question endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub saved_submissions: HashMap<String, CodeBuffer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub test_cases: Vec<TestCaseResult>,
    pub passed: u32,
    pub total: u32,
}

/// Result of running code against the question's tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Completed(RunReport),
    Failed { error: String },
}

impl RunOutcome {
    pub fn all_passed(&self) -> bool {
        match self {
            RunOutcome::Completed(report) => report.total > 0 && report.passed == report.total,
            RunOutcome::Failed { .. } => false,
        }
    }
}

/// Exam link metadata returned by link validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetails {
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub candidate_name: String,
    pub candidate_email: String,
    pub assessment_title: String,
    /// Minutes
    pub duration: u64,
    #[serde(default)]
    pub question_count: usize,
}

impl ExamDetails {
    pub fn duration_seconds(&self) -> u64 {
        self.duration.saturating_mul(60)
    }
}

/// Everything handed to the exam service on final submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPayload {
    pub session_id: Uuid,
    pub submissions: BTreeMap<String, Submission>,
    pub violation_log: Vec<ViolationEvent>,
    pub time_spent_seconds: u64,
    pub reason: SubmitReason,
    /// SHA-256 of the canonical submissions + violations + time spent
    pub fingerprint: String,
}

impl FinalPayload {
    pub fn new(
        session_id: Uuid,
        submissions: BTreeMap<String, Submission>,
        violation_log: Vec<ViolationEvent>,
        time_spent_seconds: u64,
        reason: SubmitReason,
    ) -> Self {
        let fingerprint = compute_fingerprint(&submissions, &violation_log, time_spent_seconds);
        Self {
            session_id,
            submissions,
            violation_log,
            time_spent_seconds,
            reason,
            fingerprint,
        }
    }

    /// Recompute the fingerprint and compare
    pub fn verify(&self) -> bool {
        compute_fingerprint(
            &self.submissions,
            &self.violation_log,
            self.time_spent_seconds,
        ) == self.fingerprint
    }
}

fn compute_fingerprint(
    submissions: &BTreeMap<String, Submission>,
    violation_log: &[ViolationEvent],
    time_spent_seconds: u64,
) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::json!({
        "submissions": submissions,
        "violationLog": violation_log,
        "timeSpentSeconds": time_spent_seconds,
    })
    .to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read-only projection of session state for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub remaining_seconds: u64,
    pub clock: String,
    pub timer_running: bool,
    pub current_question_index: usize,
    pub question_count: usize,
    pub current_question_id: Option<String>,
    pub code: String,
    pub language: String,
    pub submitted_question_ids: Vec<String>,
    pub violation_count: usize,
    pub warning_count: usize,
    /// Candidate should see the warning dialog
    pub show_warning: bool,
    pub camera_blocked: bool,
    pub last_violation: Option<ViolationEvent>,
}
