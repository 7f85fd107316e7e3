/// HTTP collaborators
/// Blocking JSON calls against the exam API and the frame-analysis service
use crate::client::{CapturedFrame, ExamService, ExternalAlert, FrameAnalyzer, ProctoringSink};
use crate::config::settings::ServicesConfig;
use crate::config::types::{ProctorError, Result};
use crate::session::portal::{ConsentRecord, FeedbackSubmission};
use crate::session::types::{CodeBuffer, ExamDetails, FinalPayload, QuestionSet, RunOutcome};
use crate::violation::event::ViolationEvent;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn build_agent(config: &ServicesConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
        .timeout_read(Duration::from_millis(config.request_timeout_ms))
        .timeout_write(Duration::from_millis(config.request_timeout_ms))
        .user_agent(concat!("proctorbox/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn network_error(endpoint: &str, err: ureq::Error) -> ProctorError {
    match err {
        ureq::Error::Status(code, _) => {
            ProctorError::Network(format!("{} failed with http status {}", endpoint, code))
        }
        ureq::Error::Transport(transport) => {
            ProctorError::Network(format!("{} transport error: {}", endpoint, transport))
        }
    }
}

fn read_json<T: DeserializeOwned>(endpoint: &str, response: ureq::Response) -> Result<T> {
    response
        .into_json::<T>()
        .map_err(|e| ProctorError::Protocol(format!("{} returned invalid JSON: {}", endpoint, e)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CodeRequest<'a> {
    question_id: &'a str,
    code: &'a str,
    language: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsentRequest<'a> {
    consent_given: bool,
    #[serde(flatten)]
    consent: &'a ConsentRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameRequest<'a> {
    frame: &'a str,
    candidate_id: &'a str,
}

#[derive(Deserialize)]
struct FrameResponse {
    #[serde(default)]
    alerts: Vec<ExternalAlert>,
}

/// Exam API client (`{api_base}/api/exam/...`)
pub struct HttpExamService {
    agent: ureq::Agent,
    api_base: String,
}

impl HttpExamService {
    pub fn new(config: &ServicesConfig) -> Self {
        Self {
            agent: build_agent(config),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, action: &str, token: &str) -> String {
        format!("{}/api/exam/{}/{}", self.api_base, action, token)
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<ureq::Response> {
        debug!("POST {}", url);
        let value = serde_json::to_value(body)?;
        self.agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_json(value)
            .map_err(|e| network_error(url, e))
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        debug!("GET {}", url);
        self.agent
            .get(url)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| network_error(url, e))
    }
}

impl ExamService for HttpExamService {
    fn validate_link(&self, token: &str) -> Result<ExamDetails> {
        let url = self.endpoint("validate", token);
        let response = self.get(&url)?;
        read_json(&url, response)
    }

    fn fetch_questions(&self, token: &str) -> Result<QuestionSet> {
        let url = self.endpoint("questions", token);
        let response = self.get(&url)?;
        read_json(&url, response)
    }

    fn record_consent(&self, token: &str, consent: &ConsentRecord) -> Result<()> {
        let url = self.endpoint("consent", token);
        self.post_json(
            &url,
            &ConsentRequest {
                consent_given: consent.all_given(),
                consent,
            },
        )?;
        Ok(())
    }

    fn record_start(&self, token: &str) -> Result<()> {
        let url = self.endpoint("start", token);
        debug!("POST {}", url);
        self.agent
            .post(&url)
            .call()
            .map_err(|e| network_error(&url, e))?;
        Ok(())
    }

    fn save_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<()> {
        let url = self.endpoint("save", token);
        self.post_json(
            &url,
            &CodeRequest {
                question_id,
                code: &buffer.code,
                language: &buffer.language,
            },
        )?;
        Ok(())
    }

    fn run_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<RunOutcome> {
        let url = self.endpoint("run-code", token);
        let response = self.post_json(
            &url,
            &CodeRequest {
                question_id,
                code: &buffer.code,
                language: &buffer.language,
            },
        )?;
        read_json(&url, response)
    }

    fn submit_exam(&self, token: &str, payload: &FinalPayload) -> Result<()> {
        let url = self.endpoint("submit", token);
        self.post_json(&url, payload)?;
        Ok(())
    }

    fn send_feedback(&self, feedback: &FeedbackSubmission) -> Result<()> {
        let url = format!("{}/api/exam/feedback", self.api_base);
        self.post_json(&url, feedback)?;
        Ok(())
    }
}

impl ProctoringSink for HttpExamService {
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()> {
        let url = self.endpoint("proctoring", token);
        self.post_json(&url, event)?;
        Ok(())
    }
}

/// Frame analysis client (`{analysis_base}/api/analyze-frame`)
pub struct HttpFrameAnalyzer {
    agent: ureq::Agent,
    url: String,
}

impl HttpFrameAnalyzer {
    pub fn new(config: &ServicesConfig) -> Self {
        Self {
            agent: build_agent(config),
            url: format!(
                "{}/api/analyze-frame",
                config.analysis_base.trim_end_matches('/')
            ),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameAnalyzer for HttpFrameAnalyzer {
    fn analyze_frame(&self, token: &str, frame: &CapturedFrame) -> Result<Vec<ExternalAlert>> {
        let body = serde_json::to_value(FrameRequest {
            frame: &frame.data_url,
            candidate_id: token,
        })?;
        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| network_error(&self.url, e))?;
        let parsed: FrameResponse = read_json(&self.url, response)?;
        Ok(parsed.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_layout() {
        let mut config = ServicesConfig::default();
        config.api_base = "http://localhost:5000/".to_string();
        let service = HttpExamService::new(&config);
        assert_eq!(
            service.endpoint("run-code", "abc123"),
            "http://localhost:5000/api/exam/run-code/abc123"
        );

        let analyzer = HttpFrameAnalyzer::new(&config);
        assert_eq!(analyzer.url(), "http://localhost:8000/api/analyze-frame");
    }

    #[test]
    fn test_code_request_wire_shape() {
        let value = serde_json::to_value(CodeRequest {
            question_id: "q1",
            code: "x",
            language: "python",
        })
        .unwrap();
        assert_eq!(value["questionId"], "q1");
        assert_eq!(value["language"], "python");
    }

    #[test]
    fn test_frame_response_without_alerts() {
        let parsed: FrameResponse = serde_json::from_str(r#"{"faces": 1}"#).unwrap();
        assert!(parsed.alerts.is_empty());
    }

    #[test]
    fn test_unreachable_service_is_network_error() {
        let mut config = ServicesConfig::default();
        config.api_base = "http://127.0.0.1:9".to_string();
        config.connect_timeout_ms = 200;
        let service = HttpExamService::new(&config);

        let err = service
            .save_code("tok", "q1", &CodeBuffer::new("x", "javascript"))
            .unwrap_err();
        assert!(matches!(err, ProctorError::Network(_)));
    }
}
