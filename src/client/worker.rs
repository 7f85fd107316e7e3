/// Background collaborator calls
///
/// Fire-and-forget calls (violation log, start and consent records, code saves,
/// final submission) run on a dedicated thread fed by a crossbeam queue, so a
/// slow or unreachable backend never holds up the caller. Jobs run in the order
/// they were queued, which keeps the last code save ahead of the submission.
use crate::client::{ExamService, ProctoringSink};
use crate::config::types::Result;
use crate::session::portal::{ConsentRecord, FeedbackSubmission};
use crate::session::types::{CodeBuffer, ExamDetails, FinalPayload, QuestionSet, RunOutcome};
use crate::violation::event::ViolationEvent;
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send>;

enum WorkItem {
    Run(Job),
    /// Acknowledged once every earlier job has run
    Flush(Sender<()>),
}

/// Single background thread draining a job queue
pub struct CallWorker {
    name: String,
    queue: Option<Sender<WorkItem>>,
    handle: Option<JoinHandle<()>>,
}

impl CallWorker {
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = unbounded::<WorkItem>();
        let thread_name = name.clone();

        let handle = thread::spawn(move || {
            debug!("Started {} worker", thread_name);
            for item in rx.iter() {
                match item {
                    WorkItem::Run(job) => job(),
                    WorkItem::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("{} worker shutting down", thread_name);
        });

        Self {
            name,
            queue: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue a job; returns false when the worker is gone
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.queue {
            Some(queue) => queue.send(WorkItem::Run(Box::new(job))).is_ok(),
            None => false,
        }
    }

    /// Block until every job queued so far has run
    pub fn flush(&self) -> bool {
        let queue = match &self.queue {
            Some(queue) => queue,
            None => return false,
        };
        let (ack_tx, ack_rx) = bounded(1);
        if queue.send(WorkItem::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv().is_ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CallWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallWorker").field("name", &self.name).finish()
    }
}

impl Drop for CallWorker {
    fn drop(&mut self) {
        // closing the queue lets the thread finish what is already queued
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} worker panicked", self.name);
            }
        }
    }
}

/// Proctoring sink that forwards on a background worker
pub struct DeferredSink {
    inner: Arc<dyn ProctoringSink>,
    worker: CallWorker,
}

impl DeferredSink {
    pub fn new(inner: Arc<dyn ProctoringSink>) -> Self {
        Self {
            inner,
            worker: CallWorker::spawn("proctoring-log"),
        }
    }

    /// Wait for queued violations to reach the inner sink
    pub fn flush(&self) -> bool {
        self.worker.flush()
    }
}

impl ProctoringSink for DeferredSink {
    /// Always succeeds; delivery failures are logged on the worker
    fn record_violation(&self, token: &str, event: &ViolationEvent) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let token = token.to_string();
        let event = event.clone();
        let queued = self.worker.submit(move || {
            if let Err(e) = inner.record_violation(&token, &event) {
                warn!("Failed to log violation: {}", e);
            }
        });
        if !queued {
            warn!("Proctoring log worker stopped; violation not forwarded");
        }
        Ok(())
    }
}

/// Exam service whose write-only calls run on a background worker.
/// Calls whose answer changes session state stay synchronous.
pub struct DeferredExamService {
    inner: Arc<dyn ExamService>,
    worker: CallWorker,
}

impl DeferredExamService {
    pub fn new(inner: Arc<dyn ExamService>) -> Self {
        Self {
            inner,
            worker: CallWorker::spawn("exam-service"),
        }
    }

    /// Wait for queued calls to reach the inner service
    pub fn flush(&self) -> bool {
        self.worker.flush()
    }

    fn defer<F>(&self, what: &'static str, call: F) -> Result<()>
    where
        F: FnOnce(&dyn ExamService) -> Result<()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let queued = self.worker.submit(move || {
            if let Err(e) = call(inner.as_ref()) {
                warn!("Background {} failed: {}", what, e);
            }
        });
        if !queued {
            warn!("Exam service worker stopped; {} dropped", what);
        }
        Ok(())
    }
}

impl ExamService for DeferredExamService {
    fn validate_link(&self, token: &str) -> Result<ExamDetails> {
        self.inner.validate_link(token)
    }

    fn fetch_questions(&self, token: &str) -> Result<QuestionSet> {
        self.inner.fetch_questions(token)
    }

    fn record_consent(&self, token: &str, consent: &ConsentRecord) -> Result<()> {
        let token = token.to_string();
        let consent = *consent;
        self.defer("consent record", move |service| {
            service.record_consent(&token, &consent)
        })
    }

    fn record_start(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.defer("start record", move |service| service.record_start(&token))
    }

    fn save_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<()> {
        let token = token.to_string();
        let question_id = question_id.to_string();
        let buffer = buffer.clone();
        self.defer("code save", move |service| {
            service.save_code(&token, &question_id, &buffer)
        })
    }

    fn run_code(&self, token: &str, question_id: &str, buffer: &CodeBuffer) -> Result<RunOutcome> {
        self.inner.run_code(token, question_id, buffer)
    }

    fn submit_exam(&self, token: &str, payload: &FinalPayload) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let token = token.to_string();
        let payload = payload.clone();
        let queued = self.worker.submit(move || match inner.submit_exam(&token, &payload) {
            Ok(()) => info!("Final submission for {} delivered", token),
            Err(e) => error!("Failed to submit exam {}: {}", token, e),
        });
        if !queued {
            error!("Exam service worker stopped; final submission not sent");
        }
        Ok(())
    }

    fn send_feedback(&self, feedback: &FeedbackSubmission) -> Result<()> {
        self.inner.send_feedback(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockExamService, RecordingSink, ServiceCall};
    use crate::violation::event::ViolationKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_jobs_run_in_order_before_flush_returns() {
        let worker = CallWorker::spawn("ordered");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            assert!(worker.submit(move || seen.lock().unwrap().push(i)));
        }
        assert!(worker.flush());
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(worker.name(), "ordered");
    }

    #[test]
    fn test_drop_finishes_queued_jobs() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let worker = CallWorker::spawn("draining");
            for _ in 0..3 {
                let ran = Arc::clone(&ran);
                worker.submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_slow_sink_does_not_hold_caller() {
        let slow = Arc::new(RecordingSink::slow(Duration::from_millis(200)));
        let sink = DeferredSink::new(slow.clone());
        let event = ViolationEvent::new(ViolationKind::WindowBlur, "blur");

        let started = Instant::now();
        for _ in 0..3 {
            assert!(sink.record_violation("tok", &event).is_ok());
        }
        assert!(started.elapsed() < Duration::from_millis(200));

        assert!(sink.flush());
        assert_eq!(slow.events().len(), 3);
    }

    #[test]
    fn test_failing_sink_is_swallowed() {
        let sink = DeferredSink::new(Arc::new(RecordingSink::failing()));
        let event = ViolationEvent::new(ViolationKind::TabSwitch, "tab");
        assert!(sink.record_violation("tok", &event).is_ok());
        assert!(sink.flush());
    }

    #[test]
    fn test_save_reaches_service_before_submission() {
        let mock = Arc::new(MockExamService::new());
        let service = DeferredExamService::new(mock.clone());
        let payload = FinalPayload::new(
            uuid::Uuid::new_v4(),
            Default::default(),
            Vec::new(),
            30,
            crate::config::types::SubmitReason::Manual,
        );

        service
            .save_code("tok", "q1", &CodeBuffer::new("answer", "javascript"))
            .unwrap();
        service.submit_exam("tok", &payload).unwrap();
        assert!(service.flush());

        let calls = mock.calls();
        assert!(matches!(calls[0], ServiceCall::SaveCode { .. }));
        assert!(matches!(calls[1], ServiceCall::SubmitExam(_)));
    }

    #[test]
    fn test_reads_stay_synchronous() {
        let mock = Arc::new(MockExamService::new());
        let service = DeferredExamService::new(mock.clone());
        let set = service.fetch_questions("tok").unwrap();
        assert_eq!(set.questions.len(), 3);
        assert_eq!(mock.calls(), vec![ServiceCall::FetchQuestions]);
    }
}
