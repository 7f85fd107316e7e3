//! External collaborators
//!
//! The exam service, the proctoring log sink and the frame analyzer are reached
//! only through these traits. `http` talks to the real endpoints, `mock` keeps
//! everything in memory, and `worker` moves write-only calls off the caller's
//! thread.

pub mod http;
pub mod mock;
pub mod worker;

pub use worker::{CallWorker, DeferredExamService, DeferredSink};

use crate::config::types::Result;
use crate::session::portal::{ConsentRecord, FeedbackSubmission};
use crate::session::types::{CodeBuffer, ExamDetails, FinalPayload, QuestionSet, RunOutcome};
use crate::violation::event::{Severity, ViolationEvent};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Question and submission service
pub trait ExamService: Send + Sync {
    fn validate_link(&self, token: &str) -> Result<ExamDetails>;

    fn fetch_questions(&self, token: &str) -> Result<QuestionSet>;

    fn record_consent(&self, token: &str, consent: &ConsentRecord) -> Result<()>;

    fn record_start(&self, token: &str) -> Result<()>;

    fn save_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<()>;

    fn run_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<RunOutcome>;

    fn submit_exam(&self, token: &str, payload: &FinalPayload) -> Result<()>;

    fn send_feedback(&self, feedback: &FeedbackSubmission) -> Result<()>;
}

/// Destination for violation records. Callers treat failures as non-fatal.
pub trait ProctoringSink: Send + Sync {
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()>;
}

/// Still image captured from the candidate's camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFrame {
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
}

/// Supplies frames for analysis; `None` when the camera has nothing yet
pub trait FrameSource: Send {
    fn capture(&mut self) -> Option<CapturedFrame>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<CapturedFrame> + Send,
{
    fn capture(&mut self) -> Option<CapturedFrame> {
        self()
    }
}

/// Alert produced by the face/eye analysis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAlert {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub message: String,
}

impl ExternalAlert {
    pub fn into_violation(self) -> ViolationEvent {
        let severity = self.severity.unwrap_or(Severity::Medium);
        let message = if self.message.is_empty() {
            format!("External analysis reported {}", self.kind)
        } else {
            self.message
        };
        ViolationEvent::external(self.kind, severity, message)
    }
}

/// Face/eye analysis service
pub trait FrameAnalyzer: Send + Sync {
    fn analyze_frame(&self, token: &str, frame: &CapturedFrame) -> Result<Vec<ExternalAlert>>;
}

/// Forwards every violation to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProctoringSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProctoringSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProctoringSink for FanoutSink {
    /// Every sink is tried; the first failure is returned after all attempts
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_violation(token, event) {
                warn!("Proctoring sink failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
