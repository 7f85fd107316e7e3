/// Candidate portal steps around the exam: link validation, consent, and feedback
use crate::client::ExamService;
use crate::config::types::{ProctorError, Result};
use crate::session::types::ExamDetails;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Proctoring acknowledgements; all four are required
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub video_recording: bool,
    pub face_detection: bool,
    pub screen_monitoring: bool,
    pub data_storage: bool,
}

impl ConsentRecord {
    pub fn full() -> Self {
        Self {
            video_recording: true,
            face_detection: true,
            screen_monitoring: true,
            data_storage: true,
        }
    }

    pub fn all_given(&self) -> bool {
        self.video_recording && self.face_detection && self.screen_monitoring && self.data_storage
    }

    /// Names of the acknowledgements still missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.video_recording {
            missing.push("video_recording");
        }
        if !self.face_detection {
            missing.push("face_detection");
        }
        if !self.screen_monitoring {
            missing.push("screen_monitoring");
        }
        if !self.data_storage {
            missing.push("data_storage");
        }
        missing
    }
}

/// Post-exam ratings (1..=5) and free-text comments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub difficulty: u8,
    pub clarity: u8,
    pub experience: u8,
    #[serde(default)]
    pub comments: String,
}

impl Feedback {
    pub fn validate(&self) -> Result<()> {
        for (name, rating) in [
            ("difficulty", self.difficulty),
            ("clarity", self.clarity),
            ("experience", self.experience),
        ] {
            if !(1..=5).contains(&rating) {
                return Err(ProctorError::Portal(format!(
                    "{} rating must be between 1 and 5, got {}",
                    name, rating
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub candidate_email: String,
    pub feedback: Feedback,
}

/// Entry point for an exam link
pub struct ExamPortal {
    service: Arc<dyn ExamService>,
    token: String,
}

impl ExamPortal {
    pub fn new(service: Arc<dyn ExamService>, token: impl Into<String>) -> Self {
        Self {
            service,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Validate the link against the current time
    pub fn validate(&self) -> Result<ExamDetails> {
        self.validate_at(Utc::now())
    }

    /// Fetch exam details; completed or expired links are rejected
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<ExamDetails> {
        let details = self.service.validate_link(&self.token)?;

        if details.status == "completed" {
            warn!("Exam link {} already completed", self.token);
            return Err(ProctorError::Portal(
                "This exam has already been completed".to_string(),
            ));
        }

        if details.expires_at < now {
            warn!("Exam link {} expired at {}", self.token, details.expires_at);
            return Err(ProctorError::Portal("This exam link has expired".to_string()));
        }

        info!(
            "Exam link validated: {} for {} ({} minutes)",
            details.assessment_title, details.candidate_name, details.duration
        );
        Ok(details)
    }

    /// Send completion feedback
    pub fn submit_feedback(&self, candidate_email: &str, feedback: Feedback) -> Result<()> {
        feedback.validate()?;
        let submission = FeedbackSubmission {
            candidate_email: candidate_email.to_string(),
            feedback,
        };
        self.service.send_feedback(&submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{sample_details, MockExamService, ServiceCall};
    use chrono::Duration;

    #[test]
    fn test_consent_requires_everything() {
        let mut consent = ConsentRecord::full();
        assert!(consent.all_given());

        consent.face_detection = false;
        assert!(!consent.all_given());
        assert_eq!(consent.missing(), vec!["face_detection"]);
    }

    #[test]
    fn test_feedback_rating_bounds() {
        let mut feedback = Feedback {
            difficulty: 3,
            clarity: 5,
            experience: 1,
            comments: String::new(),
        };
        assert!(feedback.validate().is_ok());

        feedback.clarity = 0;
        assert!(feedback.validate().is_err());
        feedback.clarity = 6;
        assert!(feedback.validate().is_err());
    }

    #[test]
    fn test_active_link_validates() {
        let portal = ExamPortal::new(Arc::new(MockExamService::new()), "tok");
        let details = portal.validate().unwrap();
        assert_eq!(details.assessment_title, "Software Engineer Assessment");
    }

    #[test]
    fn test_expired_link_rejected() {
        let mut details = sample_details();
        details.expires_at = Utc::now() - Duration::minutes(1);
        let portal = ExamPortal::new(Arc::new(MockExamService::new().with_details(details)), "tok");

        let err = portal.validate().unwrap_err();
        assert!(matches!(err, ProctorError::Portal(msg) if msg.contains("expired")));
    }

    #[test]
    fn test_completed_link_rejected() {
        let mut details = sample_details();
        details.status = "completed".to_string();
        let portal = ExamPortal::new(Arc::new(MockExamService::new().with_details(details)), "tok");
        assert!(portal.validate().is_err());
    }

    #[test]
    fn test_feedback_sent_once_valid() {
        let service = Arc::new(MockExamService::new());
        let portal = ExamPortal::new(service.clone(), "tok");

        let bad = Feedback::default();
        assert!(portal.submit_feedback("a@b.c", bad).is_err());

        let good = Feedback {
            difficulty: 4,
            clarity: 4,
            experience: 5,
            comments: "Smooth".to_string(),
        };
        portal.submit_feedback("a@b.c", good).unwrap();

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], ServiceCall::SendFeedback(_)));
    }
}
