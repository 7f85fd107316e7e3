//! Exam session
//!
//! `types` holds the data exchanged with the exam service, `portal` the steps
//! around the exam (link validation, consent, feedback) and `controller` the
//! stateful session itself.

pub mod controller;
pub mod portal;
pub mod types;

pub use controller::{ExamSession, SaveOutcome, SessionNotice, SessionNotifier};
pub use portal::{ConsentRecord, ExamPortal, Feedback};
pub use types::{CodeBuffer, ExamDetails, FinalPayload, Question, RunOutcome, SessionView};
