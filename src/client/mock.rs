/// In-memory collaborators
/// Serves the built-in sample exam and records every call for inspection
use crate::client::{ExamService, ProctoringSink};
use crate::config::types::{ProctorError, Result};
use crate::session::portal::{ConsentRecord, FeedbackSubmission};
use crate::session::types::{
    CodeBuffer, CodeExample, ExamDetails, FinalPayload, Question, QuestionSet, RunOutcome,
    RunReport, TestCaseResult,
};
use crate::violation::event::ViolationEvent;
use chrono::{Duration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A recorded call on the mock service
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    ValidateLink,
    FetchQuestions,
    RecordConsent(ConsentRecord),
    RecordStart,
    SaveCode {
        question_id: String,
        buffer: CodeBuffer,
    },
    RunCode {
        question_id: String,
    },
    SubmitExam(Box<FinalPayload>),
    SendFeedback(FeedbackSubmission),
}

#[derive(Debug)]
struct MockState {
    details: ExamDetails,
    questions: QuestionSet,
    calls: Vec<ServiceCall>,
    fail_saves: bool,
    fail_submit: bool,
}

#[derive(Debug)]
pub struct MockExamService {
    state: Mutex<MockState>,
}

impl Default for MockExamService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExamService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                details: sample_details(),
                questions: QuestionSet {
                    questions: sample_questions(),
                    saved_submissions: HashMap::new(),
                },
                calls: Vec::new(),
                fail_saves: false,
                fail_submit: false,
            }),
        }
    }

    pub fn with_duration_minutes(self, minutes: u64) -> Self {
        self.lock().details.duration = minutes;
        self
    }

    pub fn with_details(self, details: ExamDetails) -> Self {
        self.lock().details = details;
        self
    }

    pub fn with_questions(self, questions: QuestionSet) -> Self {
        self.lock().questions = questions;
        self
    }

    pub fn failing_saves(self) -> Self {
        self.lock().fail_saves = true;
        self
    }

    pub fn failing_submit(self) -> Self {
        self.lock().fail_submit = true;
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn saves(&self) -> Vec<(String, CodeBuffer)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::SaveCode {
                    question_id,
                    buffer,
                } => Some((question_id.clone(), buffer.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn submitted_payloads(&self) -> Vec<FinalPayload> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::SubmitExam(payload) => Some((**payload).clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: ServiceCall) {
        debug!("Mock exam service call: {:?}", call);
        self.lock().calls.push(call);
    }
}

impl ExamService for MockExamService {
    fn validate_link(&self, _token: &str) -> Result<ExamDetails> {
        self.record(ServiceCall::ValidateLink);
        Ok(self.lock().details.clone())
    }

    fn fetch_questions(&self, _token: &str) -> Result<QuestionSet> {
        self.record(ServiceCall::FetchQuestions);
        Ok(self.lock().questions.clone())
    }

    fn record_consent(&self, _token: &str, consent: &ConsentRecord) -> Result<()> {
        self.record(ServiceCall::RecordConsent(*consent));
        Ok(())
    }

    fn record_start(&self, _token: &str) -> Result<()> {
        self.record(ServiceCall::RecordStart);
        Ok(())
    }

    fn save_code(&self, _token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<()> {
        if self.lock().fail_saves {
            return Err(ProctorError::Network("mock save unavailable".to_string()));
        }
        self.record(ServiceCall::SaveCode {
            question_id: question_id.to_string(),
            buffer: buffer.clone(),
        });
        Ok(())
    }

    fn run_code(&self, _token: &str, question_id: &str, _buffer: &CodeBuffer) -> Result<RunOutcome> {
        self.record(ServiceCall::RunCode {
            question_id: question_id.to_string(),
        });
        Ok(RunOutcome::Completed(sample_run_report()))
    }

    fn submit_exam(&self, _token: &str, payload: &FinalPayload) -> Result<()> {
        if self.lock().fail_submit {
            return Err(ProctorError::Network("mock submit unavailable".to_string()));
        }
        self.record(ServiceCall::SubmitExam(Box::new(payload.clone())));
        Ok(())
    }

    fn send_feedback(&self, feedback: &FeedbackSubmission) -> Result<()> {
        self.record(ServiceCall::SendFeedback(feedback.clone()));
        Ok(())
    }
}

/// Proctoring sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, ViolationEvent)>>,
    failing: bool,
    delay: Option<std::time::Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every write fails, for exercising the swallow path
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Sink that takes `delay` to accept each write, like a stalled backend
    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ViolationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl ProctoringSink for RecordingSink {
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing {
            return Err(ProctorError::Network("proctoring log unreachable".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((token.to_string(), event.clone()));
        Ok(())
    }
}

pub fn sample_details() -> ExamDetails {
    ExamDetails {
        status: "active".to_string(),
        expires_at: Utc::now() + Duration::hours(24),
        candidate_name: "Test Candidate".to_string(),
        candidate_email: "test@example.com".to_string(),
        assessment_title: "Software Engineer Assessment".to_string(),
        duration: 60,
        question_count: 3,
    }
}

pub fn sample_questions() -> Vec<Question> {
    vec![
        Question {
            id: "q1".to_string(),
            title: "Two Sum".to_string(),
            description: "Given an array of integers nums and an integer target, return indices of the two numbers such that they add up to target.".to_string(),
            difficulty: "easy".to_string(),
            starter_code: "function twoSum(nums, target) {\n  // Your code here\n  \n}".to_string(),
            examples: vec![
                CodeExample {
                    input: "nums = [2,7,11,15], target = 9".to_string(),
                    output: "[0,1]".to_string(),
                },
                CodeExample {
                    input: "nums = [3,2,4], target = 6".to_string(),
                    output: "[1,2]".to_string(),
                },
            ],
        },
        Question {
            id: "q2".to_string(),
            title: "Reverse String".to_string(),
            description: "Write a function that reverses a string. The input string is given as an array of characters.".to_string(),
            difficulty: "easy".to_string(),
            starter_code: "function reverseString(s) {\n  // Your code here\n  \n}".to_string(),
            examples: vec![CodeExample {
                input: r#"s = ["h","e","l","l","o"]"#.to_string(),
                output: r#"["o","l","l","e","h"]"#.to_string(),
            }],
        },
        Question {
            id: "q3".to_string(),
            title: "Valid Palindrome".to_string(),
            description: "A phrase is a palindrome if, after converting all uppercase letters into lowercase letters and removing all non-alphanumeric characters, it reads the same forward and backward.".to_string(),
            difficulty: "medium".to_string(),
            starter_code: "function isPalindrome(s) {\n  // Your code here\n  \n}".to_string(),
            examples: vec![
                CodeExample {
                    input: r#"s = "A man, a plan, a canal: Panama""#.to_string(),
                    output: "true".to_string(),
                },
                CodeExample {
                    input: r#"s = "race a car""#.to_string(),
                    output: "false".to_string(),
                },
            ],
        },
    ]
}

fn sample_run_report() -> RunReport {
    let case = |input: &str, out: &str| TestCaseResult {
        input: input.to_string(),
        expected: out.to_string(),
        actual: out.to_string(),
        passed: true,
    };
    RunReport {
        test_cases: vec![
            case("[2,7,11,15], 9", "[0,1]"),
            case("[3,2,4], 6", "[1,2]"),
            case("[3,3], 6", "[0,1]"),
        ],
        passed: 3,
        total: 3,
    }
}
