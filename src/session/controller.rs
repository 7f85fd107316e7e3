/// Exam session controller
///
/// Owns the session phase, the active code buffer, per-question submissions,
/// the violation log and the countdown. Violations and time-up arrive through
/// an inbox channel so that the monitor and timer callbacks never need a
/// reference back into the session; the inbox is drained by `pump`.
///
/// Once the session reaches `Submitted` it is inert: further violations are
/// dropped, ticks are ignored and a second submission is a no-op.
use crate::client::{ExamService, ProctoringSink};
use crate::config::settings::SessionConfig;
use crate::config::types::{ProctorError, Result, SessionPhase, SubmitReason};
use crate::observability::audit::{log_violation, SessionIds};
use crate::session::portal::ConsentRecord;
use crate::session::types::{
    CodeBuffer, ExamDetails, FinalPayload, Question, RunOutcome, SessionView, Submission,
};
use crate::timer::{ExamTimer, TimerTick};
use crate::violation::event::ViolationEvent;
use crate::violation::ledger::ViolationLog;
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Invoked once with the final payload
pub type CompletionCallback = Box<dyn FnOnce(&FinalPayload) + Send>;

/// Message delivered to the session inbox
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Violation(ViolationEvent),
    TimeUp,
}

/// Cloneable handle for callbacks that feed the session inbox
#[derive(Debug, Clone)]
pub struct SessionNotifier {
    tx: Sender<SessionNotice>,
}

impl SessionNotifier {
    pub fn violation(&self, event: ViolationEvent) {
        if self.tx.send(SessionNotice::Violation(event)).is_err() {
            debug!("Session inbox closed; violation discarded");
        }
    }

    pub fn time_up(&self) {
        if self.tx.send(SessionNotice::TimeUp).is_err() {
            debug!("Session inbox closed; time-up discarded");
        }
    }
}

/// Result of persisting the active buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Whitespace-only buffer; kept locally, not sent
    SkippedBlank,
    /// Service call failed; the next auto-save retries
    Failed,
    /// Session not in progress
    Inactive,
}

pub struct ExamSession {
    ids: SessionIds,
    details: ExamDetails,
    config: SessionConfig,
    service: Arc<dyn ExamService>,
    sink: Arc<dyn ProctoringSink>,
    phase: SessionPhase,
    consent: Option<ConsentRecord>,
    questions: Vec<Question>,
    current: usize,
    buffer: CodeBuffer,
    code_by_question: HashMap<String, CodeBuffer>,
    saved_submissions: HashMap<String, CodeBuffer>,
    submissions: BTreeMap<String, Submission>,
    violations: ViolationLog,
    timer: ExamTimer,
    inbox_tx: Sender<SessionNotice>,
    inbox_rx: Receiver<SessionNotice>,
    show_warning: bool,
    camera_blocked: bool,
    on_complete: Option<CompletionCallback>,
    final_payload: Option<FinalPayload>,
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSession")
            .field("ids", &self.ids)
            .field("phase", &self.phase)
            .field("current", &self.current)
            .field("violations", &self.violations.len())
            .field("timer", &self.timer)
            .finish()
    }
}

impl ExamSession {
    pub fn new(
        ids: SessionIds,
        details: ExamDetails,
        service: Arc<dyn ExamService>,
        sink: Arc<dyn ProctoringSink>,
        config: SessionConfig,
    ) -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        let buffer = CodeBuffer::new("", config.default_language.clone());
        Self {
            ids,
            details,
            config,
            service,
            sink,
            phase: SessionPhase::Loading,
            consent: None,
            questions: Vec::new(),
            current: 0,
            buffer,
            code_by_question: HashMap::new(),
            saved_submissions: HashMap::new(),
            submissions: BTreeMap::new(),
            violations: ViolationLog::new(),
            timer: ExamTimer::new(),
            inbox_tx,
            inbox_rx,
            show_warning: false,
            camera_blocked: false,
            on_complete: None,
            final_payload: None,
        }
    }

    /// Register the callback run after final submission
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnOnce(&FinalPayload) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn notifier(&self) -> SessionNotifier {
        SessionNotifier {
            tx: self.inbox_tx.clone(),
        }
    }

    fn expect_phase(&self, expected: SessionPhase, next: SessionPhase) -> Result<()> {
        if self.phase != expected {
            return Err(ProctorError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        Ok(())
    }

    fn require_in_progress(&self) -> Result<()> {
        if self.phase != SessionPhase::InProgress {
            return Err(ProctorError::NotInProgress(self.phase));
        }
        Ok(())
    }

    /// Load the question set and show the instructions
    pub fn open_instructions(&mut self) -> Result<usize> {
        self.expect_phase(SessionPhase::Loading, SessionPhase::Instructions)?;

        let set = self.service.fetch_questions(&self.ids.exam_token)?;
        if set.questions.is_empty() {
            return Err(ProctorError::Protocol(
                "Question set for exam is empty".to_string(),
            ));
        }

        self.questions = set.questions;
        self.saved_submissions = set.saved_submissions;
        self.current = 0;
        self.buffer = self.buffer_for(0);
        self.phase = SessionPhase::Instructions;

        info!(
            "Loaded {} questions for exam {}",
            self.questions.len(),
            self.ids.exam_token
        );
        Ok(self.questions.len())
    }

    pub fn acknowledge_instructions(&mut self) -> Result<()> {
        self.expect_phase(SessionPhase::Instructions, SessionPhase::Consent)?;
        self.phase = SessionPhase::Consent;
        Ok(())
    }

    /// Accept proctoring consent. All four acknowledgements are required.
    pub fn give_consent(&mut self, consent: ConsentRecord) -> Result<()> {
        self.expect_phase(SessionPhase::Consent, SessionPhase::InProgress)?;

        if !consent.all_given() {
            return Err(ProctorError::Portal(format!(
                "Missing consent: {}",
                consent.missing().join(", ")
            )));
        }

        if let Err(e) = self.service.record_consent(&self.ids.exam_token, &consent) {
            warn!("Failed to record consent for {}: {}", self.ids.exam_token, e);
        }
        self.consent = Some(consent);
        Ok(())
    }

    /// Start the exam clock
    pub fn begin(&mut self) -> Result<()> {
        self.expect_phase(SessionPhase::Consent, SessionPhase::InProgress)?;
        if self.consent.is_none() {
            return Err(ProctorError::Portal(
                "Consent must be given before the exam starts".to_string(),
            ));
        }

        let notifier = self.notifier();
        self.timer
            .start(self.details.duration_seconds(), move || notifier.time_up());
        self.phase = SessionPhase::InProgress;

        if let Err(e) = self.service.record_start(&self.ids.exam_token) {
            warn!("Failed to record exam start: {}", e);
        }

        info!(
            "Exam {} started (session {}, {} minutes)",
            self.ids.exam_token, self.ids.session_id, self.details.duration
        );
        Ok(())
    }

    /// Accept one violation; returns false when it was dropped
    pub fn record_violation(&mut self, event: ViolationEvent) -> bool {
        if self.phase != SessionPhase::InProgress {
            debug!("Dropping violation in phase {}: {}", self.phase, event);
            return false;
        }

        log_violation(&self.ids.exam_token, &event);

        let is_warning = event.is_warning();
        let warnings = self.violations.append(event.clone());

        if let Err(e) = self.sink.record_violation(&self.ids.exam_token, &event) {
            warn!("Failed to log violation: {}", e);
        }

        if is_warning {
            self.show_warning = true;
            if warnings >= self.config.max_warnings {
                warn!(
                    "Maximum violations reached ({}/{}), submitting exam",
                    warnings, self.config.max_warnings
                );
                self.submit_exam(SubmitReason::MaxViolations);
            }
        }
        true
    }

    /// Drain the inbox. Returns the number of notices handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notice) = self.inbox_rx.try_recv() {
            handled += 1;
            match notice {
                SessionNotice::Violation(event) => {
                    self.record_violation(event);
                }
                SessionNotice::TimeUp => {
                    info!("Time is up for exam {}", self.ids.exam_token);
                    self.submit_exam(SubmitReason::TimeUp);
                }
            }
        }
        handled
    }

    /// One-second countdown step
    pub fn tick(&mut self) -> TimerTick {
        if self.phase != SessionPhase::InProgress {
            return TimerTick::Idle;
        }
        let tick = self.timer.tick();
        self.pump();
        tick
    }

    pub fn autosave(&mut self) -> SaveOutcome {
        if self.phase != SessionPhase::InProgress {
            return SaveOutcome::Inactive;
        }
        self.persist_current()
    }

    /// Move to question `index`. Out-of-range indices are ignored.
    pub fn switch_question(&mut self, index: usize) -> bool {
        if self.phase != SessionPhase::InProgress || index >= self.questions.len() {
            debug!(
                "Ignoring switch to question {} ({} questions, phase {})",
                index,
                self.questions.len(),
                self.phase
            );
            return false;
        }

        self.persist_current();
        self.current = index;
        self.buffer = self.buffer_for(index);
        true
    }

    pub fn update_code(&mut self, code: impl Into<String>) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        self.buffer.code = code.into();
        true
    }

    pub fn set_language(&mut self, language: &str) -> Result<()> {
        self.require_in_progress()?;
        if !self.config.supports_language(language) {
            return Err(ProctorError::Config(format!(
                "Unsupported language: {}",
                language
            )));
        }
        self.buffer.language = language.to_string();
        Ok(())
    }

    /// Snapshot the active buffer as this question's submission
    pub fn submit_question(&mut self) -> Result<()> {
        self.require_in_progress()?;
        let question_id = self.current_question_id().map(str::to_string).ok_or_else(|| {
            ProctorError::Protocol("No active question".to_string())
        })?;

        self.persist_current();
        self.submissions.insert(
            question_id.clone(),
            Submission {
                submitted: true,
                code: self.buffer.code.clone(),
                language: self.buffer.language.clone(),
                timestamp: Utc::now(),
            },
        );
        info!("Question {} submitted", question_id);
        Ok(())
    }

    /// Run the active buffer against the question's tests
    pub fn run_code(&mut self) -> Result<RunOutcome> {
        self.require_in_progress()?;
        let question_id = self.current_question_id().map(str::to_string).ok_or_else(|| {
            ProctorError::Protocol("No active question".to_string())
        })?;

        match self
            .service
            .run_code(&self.ids.exam_token, &question_id, &self.buffer)
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Run code failed for {}: {}", question_id, e);
                Ok(RunOutcome::Failed {
                    error: "Failed to run code".to_string(),
                })
            }
        }
    }

    /// Finish the exam. Only the first call in `InProgress` has any effect.
    pub fn submit_exam(&mut self, reason: SubmitReason) -> Option<&FinalPayload> {
        match self.phase {
            SessionPhase::InProgress => {}
            SessionPhase::Submitted => {
                debug!("Exam already submitted; ignoring {:?}", reason);
                return None;
            }
            other => {
                warn!("Cannot submit exam in phase {}", other);
                return None;
            }
        }

        // set first so anything triggered below sees an inert session
        self.phase = SessionPhase::Submitted;
        self.persist_current();
        self.timer.cancel();

        let time_spent = self
            .details
            .duration_seconds()
            .saturating_sub(self.timer.remaining_seconds());
        let payload = FinalPayload::new(
            self.ids.session_id,
            self.submissions.clone(),
            self.violations.events().to_vec(),
            time_spent,
            reason,
        );

        match self.service.submit_exam(&self.ids.exam_token, &payload) {
            Ok(()) => info!(
                "Exam {} submitted ({:?}, {}s, {} violations)",
                self.ids.exam_token,
                reason,
                time_spent,
                payload.violation_log.len()
            ),
            Err(e) => error!("Failed to submit exam {}: {}", self.ids.exam_token, e),
        }

        let discarded = self.inbox_rx.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {} queued notices after submission", discarded);
        }

        if let Some(callback) = self.on_complete.take() {
            callback(&payload);
        }

        self.final_payload = Some(payload);
        self.final_payload.as_ref()
    }

    /// Camera could not be opened; recording is blocked for the rest of the session
    pub fn mark_camera_blocked(&mut self) {
        self.camera_blocked = true;
    }

    pub fn camera_blocked(&self) -> bool {
        self.camera_blocked
    }

    pub fn dismiss_warning(&mut self) {
        self.show_warning = false;
    }

    fn persist_current(&mut self) -> SaveOutcome {
        let question_id = match self.current_question_id() {
            Some(id) => id.to_string(),
            None => return SaveOutcome::Inactive,
        };

        self.code_by_question
            .insert(question_id.clone(), self.buffer.clone());
        if self.buffer.is_blank() {
            return SaveOutcome::SkippedBlank;
        }

        match self
            .service
            .save_code(&self.ids.exam_token, &question_id, &self.buffer)
        {
            Ok(()) => {
                debug!("Saved code for {}", question_id);
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!("Auto-save failed for {}: {}", question_id, e);
                SaveOutcome::Failed
            }
        }
    }

    /// Last buffer seen for the question, then the saved submission, then starter code
    fn buffer_for(&self, index: usize) -> CodeBuffer {
        let question = &self.questions[index];
        self.code_by_question
            .get(&question.id)
            .or_else(|| self.saved_submissions.get(&question.id))
            .cloned()
            .unwrap_or_else(|| {
                CodeBuffer::new(
                    question.starter_code.clone(),
                    self.config.default_language.clone(),
                )
            })
    }

    pub fn view(&self) -> SessionView {
        let remaining_seconds = if self.phase < SessionPhase::InProgress {
            self.details.duration_seconds()
        } else {
            self.timer.remaining_seconds()
        };

        SessionView {
            phase: self.phase,
            remaining_seconds,
            clock: crate::timer::format_clock(remaining_seconds),
            timer_running: self.timer.is_running(),
            current_question_index: self.current,
            question_count: self.questions.len(),
            current_question_id: self.current_question_id().map(str::to_string),
            code: self.buffer.code.clone(),
            language: self.buffer.language.clone(),
            submitted_question_ids: self.submissions.keys().cloned().collect(),
            violation_count: self.violations.len(),
            warning_count: self.violations.warning_count(),
            show_warning: self.show_warning,
            camera_blocked: self.camera_blocked,
            last_violation: self.violations.last().cloned(),
        }
    }

    pub fn ids(&self) -> &SessionIds {
        &self.ids
    }

    pub fn token(&self) -> &str {
        &self.ids.exam_token
    }

    pub fn details(&self) -> &ExamDetails {
        &self.details
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::InProgress
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    fn current_question_id(&self) -> Option<&str> {
        self.current_question().map(|q| q.id.as_str())
    }

    pub fn buffer(&self) -> &CodeBuffer {
        &self.buffer
    }

    pub fn submissions(&self) -> &BTreeMap<String, Submission> {
        &self.submissions
    }

    pub fn violations(&self) -> &ViolationLog {
        &self.violations
    }

    pub fn warning_count(&self) -> usize {
        self.violations.warning_count()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.timer.remaining_seconds()
    }

    pub fn timer(&self) -> &ExamTimer {
        &self.timer
    }

    pub fn final_payload(&self) -> Option<&FinalPayload> {
        self.final_payload.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockExamService, RecordingSink, ServiceCall};
    use crate::session::types::QuestionSet;
    use crate::violation::event::{Severity, ViolationKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session_with(service: Arc<MockExamService>, sink: Arc<RecordingSink>) -> ExamSession {
        let details = service.validate_link("tok").unwrap();
        ExamSession::new(
            SessionIds::new("tok"),
            details,
            service,
            sink,
            SessionConfig::default(),
        )
    }

    fn start(session: &mut ExamSession) {
        session.open_instructions().unwrap();
        session.acknowledge_instructions().unwrap();
        session.give_consent(ConsentRecord::full()).unwrap();
        session.begin().unwrap();
    }

    fn started(minutes: u64) -> (ExamSession, Arc<MockExamService>, Arc<RecordingSink>) {
        let service = Arc::new(MockExamService::new().with_duration_minutes(minutes));
        let sink = Arc::new(RecordingSink::new());
        let mut session = session_with(service.clone(), sink.clone());
        start(&mut session);
        (session, service, sink)
    }

    fn tab_switch() -> ViolationEvent {
        ViolationEvent::new(ViolationKind::TabSwitch, "Tab switch detected")
    }

    #[test]
    fn test_phases_only_move_forward() {
        let service = Arc::new(MockExamService::new());
        let mut session = session_with(service, Arc::new(RecordingSink::new()));

        let err = session.begin().unwrap_err();
        assert!(matches!(
            err,
            ProctorError::InvalidTransition {
                from: SessionPhase::Loading,
                to: SessionPhase::InProgress
            }
        ));

        assert_eq!(session.open_instructions().unwrap(), 3);
        assert_eq!(session.phase(), SessionPhase::Instructions);
        assert!(session.open_instructions().is_err());
    }

    #[test]
    fn test_partial_consent_rejected() {
        let service = Arc::new(MockExamService::new());
        let mut session = session_with(service.clone(), Arc::new(RecordingSink::new()));
        session.open_instructions().unwrap();
        session.acknowledge_instructions().unwrap();

        let mut consent = ConsentRecord::full();
        consent.data_storage = false;
        assert!(matches!(
            session.give_consent(consent),
            Err(ProctorError::Portal(msg)) if msg.contains("data_storage")
        ));
        assert!(session.begin().is_err());
        assert!(!service
            .calls()
            .iter()
            .any(|c| matches!(c, ServiceCall::RecordConsent(_))));
    }

    #[test]
    fn test_begin_starts_clock_and_records_start() {
        let (session, service, _) = started(60);
        assert!(session.is_active());
        assert_eq!(session.remaining_seconds(), 3600);
        assert!(service.calls().contains(&ServiceCall::RecordStart));
        assert!(service
            .calls()
            .contains(&ServiceCall::RecordConsent(ConsentRecord::full())));

        let view = session.view();
        assert_eq!(view.clock, "01:00:00");
        assert_eq!(view.current_question_id.as_deref(), Some("q1"));
        assert!(view.code.contains("twoSum"));
    }

    #[test]
    fn test_fifth_warning_forces_single_submission() {
        let (mut session, service, sink) = started(60);

        for _ in 0..4 {
            assert!(session.record_violation(tab_switch()));
        }
        assert!(session.is_active());
        assert!(session.view().show_warning);

        assert!(session.record_violation(tab_switch()));
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert!(!session.record_violation(tab_switch()));

        assert_eq!(session.violations().len(), 5);
        assert_eq!(sink.events().len(), 5);

        let payloads = service.submitted_payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].reason, SubmitReason::MaxViolations);
        assert_eq!(payloads[0].violation_log.len(), 5);
        assert!(payloads[0].verify());
    }

    #[test]
    fn test_medium_violations_never_escalate() {
        let (mut session, _, _) = started(60);
        for _ in 0..10 {
            session.record_violation(ViolationEvent::new(ViolationKind::WindowBlur, "blur"));
        }
        assert!(session.is_active());
        assert_eq!(session.warning_count(), 0);
        assert_eq!(session.violations().len(), 10);
        assert!(!session.view().show_warning);
    }

    #[test]
    fn test_external_critical_alerts_count() {
        let (mut session, _, _) = started(60);
        let alert = ViolationEvent::external("multiple_faces", Severity::Critical, "2 faces");
        session.record_violation(alert);
        assert_eq!(session.warning_count(), 1);
    }

    #[test]
    fn test_notifier_feeds_inbox() {
        let (mut session, _, _) = started(60);
        let notifier = session.notifier();
        notifier.violation(tab_switch());
        notifier.violation(tab_switch());

        assert_eq!(session.violations().len(), 0);
        assert_eq!(session.pump(), 2);
        assert_eq!(session.violations().len(), 2);
    }

    #[test]
    fn test_failing_sink_does_not_block_recording() {
        let service = Arc::new(MockExamService::new());
        let mut session = session_with(service, Arc::new(RecordingSink::failing()));
        start(&mut session);

        session.record_violation(tab_switch());
        assert_eq!(session.violations().len(), 1);
        assert!(session.is_active());
    }

    #[test]
    fn test_autosave_skips_blank_buffers() {
        let (mut session, service, _) = started(60);

        session.update_code("   \n\t");
        assert_eq!(session.autosave(), SaveOutcome::SkippedBlank);
        assert!(service.saves().is_empty());

        session.update_code("function twoSum() { return [0, 1]; }");
        assert_eq!(session.autosave(), SaveOutcome::Saved);
        let saves = service.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "q1");
    }

    #[test]
    fn test_autosave_failure_is_swallowed() {
        let service = Arc::new(MockExamService::new().failing_saves());
        let mut session = session_with(service, Arc::new(RecordingSink::new()));
        start(&mut session);

        assert_eq!(session.autosave(), SaveOutcome::Failed);
        assert!(session.is_active());
    }

    #[test]
    fn test_navigation_keeps_per_question_buffers() {
        let (mut session, service, _) = started(60);

        session.update_code("answer one");
        assert!(session.switch_question(1));
        assert!(session.buffer().code.contains("reverseString"));

        session.update_code("answer two");
        assert!(session.switch_question(0));
        assert_eq!(session.buffer().code, "answer one");

        let saved: Vec<String> = service.saves().into_iter().map(|(_, b)| b.code).collect();
        assert_eq!(saved, vec!["answer one", "answer two"]);
    }

    #[test]
    fn test_out_of_range_navigation_ignored() {
        let (mut session, service, _) = started(60);
        session.update_code("keep me");

        assert!(!session.switch_question(3));
        assert!(!session.switch_question(usize::MAX));
        assert_eq!(session.current_question_index(), 0);
        assert_eq!(session.buffer().code, "keep me");
        assert!(service.saves().is_empty());
    }

    #[test]
    fn test_saved_submission_restored() {
        let mut set = QuestionSet {
            questions: crate::client::mock::sample_questions(),
            ..Default::default()
        };
        set.saved_submissions
            .insert("q2".to_string(), CodeBuffer::new("print('hi')", "python"));
        let service = Arc::new(MockExamService::new().with_questions(set));
        let mut session = session_with(service, Arc::new(RecordingSink::new()));
        start(&mut session);

        session.switch_question(1);
        assert_eq!(session.buffer(), &CodeBuffer::new("print('hi')", "python"));
    }

    #[test]
    fn test_language_must_be_configured() {
        let (mut session, _, _) = started(60);
        session.set_language("python").unwrap();
        assert_eq!(session.buffer().language, "python");

        assert!(matches!(
            session.set_language("cobol"),
            Err(ProctorError::Config(_))
        ));
        assert_eq!(session.buffer().language, "python");
    }

    #[test]
    fn test_question_submission_snapshot() {
        let (mut session, _, _) = started(60);
        session.update_code("final answer");
        session.submit_question().unwrap();

        let submission = &session.submissions()["q1"];
        assert!(submission.submitted);
        assert_eq!(submission.code, "final answer");
        assert_eq!(session.view().submitted_question_ids, vec!["q1"]);
        assert!(session.is_active());
    }

    #[test]
    fn test_run_code_does_not_change_phase() {
        let (mut session, service, _) = started(60);
        let outcome = session.run_code().unwrap();
        assert!(outcome.all_passed());
        assert!(session.is_active());
        assert!(service.calls().contains(&ServiceCall::RunCode {
            question_id: "q1".to_string()
        }));
    }

    #[test]
    fn test_time_up_submits_with_full_duration() {
        let (mut session, service, _) = started(1);

        for _ in 0..59 {
            assert!(matches!(session.tick(), TimerTick::Running { .. }));
        }
        assert_eq!(session.tick(), TimerTick::Expired);
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert_eq!(session.tick(), TimerTick::Idle);

        let payloads = service.submitted_payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].reason, SubmitReason::TimeUp);
        assert_eq!(payloads[0].time_spent_seconds, 60);
    }

    #[test]
    fn test_manual_submit_is_idempotent() {
        let (mut session, service, _) = started(60);
        for _ in 0..90 {
            session.tick();
        }

        let payload = session.submit_exam(SubmitReason::Manual).cloned().unwrap();
        assert_eq!(payload.time_spent_seconds, 90);
        assert!(session.submit_exam(SubmitReason::Manual).is_none());
        assert!(session.submit_exam(SubmitReason::TimeUp).is_none());
        assert_eq!(service.submitted_payloads().len(), 1);
        assert!(!session.timer().is_running());
    }

    #[test]
    fn test_completion_callback_runs_once() {
        let (mut session, _, _) = started(60);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        session.on_complete(move |payload| {
            assert_eq!(payload.reason, SubmitReason::Manual);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        session.submit_exam(SubmitReason::Manual);
        session.submit_exam(SubmitReason::Manual);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_submission_keeps_payload() {
        let service = Arc::new(MockExamService::new().failing_submit());
        let mut session = session_with(service, Arc::new(RecordingSink::new()));
        start(&mut session);

        assert!(session.submit_exam(SubmitReason::Manual).is_some());
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert!(session.final_payload().is_some());
    }

    #[test]
    fn test_submit_before_start_is_ignored() {
        let service = Arc::new(MockExamService::new());
        let mut session = session_with(service.clone(), Arc::new(RecordingSink::new()));
        assert!(session.submit_exam(SubmitReason::Manual).is_none());
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert!(service.submitted_payloads().is_empty());
    }
}
