/// Proctored exam runtime
///
/// Binds an `ExamSession` to a `SecurityMonitor` and, optionally, a frame
/// analyzer. Every stimulus (browser signal, timer tick, devtools poll,
/// auto-save, frame capture) is a `ProctorEvent` routed through `dispatch`,
/// which drains the session inbox afterwards. When the session reaches
/// `Submitted` the monitor is stopped at a single point (`settle`).
///
/// The countdown is charged from wall time: when a handler runs long, the
/// timer periods that passed meanwhile are applied on the next tick.
use crate::client::{CallWorker, FrameAnalyzer, FrameSource};
use crate::config::settings::ProctorConfig;
use crate::config::types::{ProctorError, Result};
use crate::monitor::host::BrowserHost;
use crate::monitor::security::{MonitorOptions, MonitorStart, SecurityMonitor};
use crate::monitor::signals::{BrowserSignal, Disposition};
use crate::observability::audit::AuditTrail;
use crate::session::controller::ExamSession;
use crate::violation::event::{ViolationEvent, ViolationKind};
use crossbeam_channel::{never, select, tick, unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A stimulus for the proctored exam
#[derive(Debug, Clone, PartialEq)]
pub enum ProctorEvent {
    Browser(BrowserSignal),
    TimerTick,
    DevtoolsPoll,
    AutosaveTick,
    FrameAnalysis,
}

/// Browser signal queued for the event loop, with an optional channel for the disposition
#[derive(Debug)]
pub struct SignalRequest {
    pub signal: BrowserSignal,
    pub reply: Option<Sender<Disposition>>,
}

impl SignalRequest {
    pub fn new(signal: BrowserSignal) -> Self {
        Self {
            signal,
            reply: None,
        }
    }

    /// Request whose disposition is sent back once the rules have run
    pub fn with_reply(signal: BrowserSignal) -> (Self, Receiver<Disposition>) {
        let (tx, rx) = unbounded();
        (
            Self {
                signal,
                reply: Some(tx),
            },
            rx,
        )
    }
}

impl From<BrowserSignal> for SignalRequest {
    fn from(signal: BrowserSignal) -> Self {
        Self::new(signal)
    }
}

/// Periods of the event-loop tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopIntervals {
    pub timer: Duration,
    pub devtools: Duration,
    pub autosave: Duration,
    pub frames: Duration,
}

impl Default for LoopIntervals {
    fn default() -> Self {
        Self::from(&ProctorConfig::default())
    }
}

impl From<&ProctorConfig> for LoopIntervals {
    fn from(config: &ProctorConfig) -> Self {
        Self {
            timer: Duration::from_secs(1),
            devtools: config.devtools_poll_interval(),
            autosave: config.autosave_interval(),
            frames: config.frame_interval(),
        }
    }
}

/// Why the event loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Submitted,
    /// Host stopped sending signals before the exam ended
    SignalsClosed,
}

struct FrameAnalysis {
    source: Box<dyn FrameSource>,
    analyzer: Arc<dyn FrameAnalyzer>,
    worker: CallWorker,
}

/// Whole timer periods owed since the loop started
struct TickClock {
    origin: Instant,
    period: Duration,
    charged: u64,
}

impl TickClock {
    fn new(period: Duration) -> Self {
        Self {
            origin: Instant::now(),
            period,
            charged: 0,
        }
    }

    fn owed(&mut self) -> u64 {
        let period = self.period.as_nanos().max(1);
        let elapsed = (self.origin.elapsed().as_nanos() / period) as u64;
        let owed = elapsed.saturating_sub(self.charged);
        self.charged = elapsed;
        owed
    }
}

pub struct ProctoredExam<H: BrowserHost> {
    session: ExamSession,
    monitor: SecurityMonitor<H>,
    options: MonitorOptions,
    camera_required: bool,
    intervals: LoopIntervals,
    analysis: Option<FrameAnalysis>,
    audit: Option<Arc<AuditTrail>>,
    started: bool,
    settled: bool,
}

impl<H: BrowserHost> ProctoredExam<H> {
    pub fn new(session: ExamSession, host: H, config: &ProctorConfig) -> Self {
        Self {
            session,
            monitor: SecurityMonitor::new(host),
            options: MonitorOptions::from(&config.lockdown),
            camera_required: config.lockdown.camera_required,
            intervals: LoopIntervals::from(config),
            analysis: None,
            audit: None,
            started: false,
            settled: false,
        }
    }

    pub fn with_frame_analysis<S>(mut self, source: S, analyzer: Arc<dyn FrameAnalyzer>) -> Self
    where
        S: FrameSource + 'static,
    {
        self.analysis = Some(FrameAnalysis {
            source: Box::new(source),
            analyzer,
            worker: CallWorker::spawn("frame-analysis"),
        });
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_intervals(mut self, intervals: LoopIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Open the camera and install the lockdown. The session must already be in progress.
    pub fn start(&mut self) -> Result<MonitorStart> {
        if !self.session.is_active() {
            return Err(ProctorError::NotInProgress(self.session.phase()));
        }
        if self.started {
            warn!("Proctored exam already started");
        }
        self.started = true;

        if let Some(audit) = &self.audit {
            if let Err(e) =
                audit.record_session_started(self.session.ids(), self.session.details().duration_seconds())
            {
                warn!("Failed to write audit record: {}", e);
            }
        }

        if self.camera_required {
            match self.monitor.host_mut().request_camera() {
                Ok(()) => info!("Camera access granted"),
                Err(denied) => {
                    warn!("Camera unavailable, recording blocked: {}", denied);
                    self.session.mark_camera_blocked();
                    self.session.record_violation(ViolationEvent::new(
                        ViolationKind::CameraDenied,
                        format!("Camera access denied: {}", denied.reason),
                    ));
                }
            }
        }

        let notifier = self.session.notifier();
        let outcome = self
            .monitor
            .start(move |event| notifier.violation(event), self.options.clone());
        self.session.pump();
        self.settle();
        Ok(outcome)
    }

    /// Route one event. Events arriving after submission are ignored.
    pub fn dispatch(&mut self, event: ProctorEvent) -> Disposition {
        if !self.session.is_active() {
            debug!("Ignoring {:?}; session is {}", event, self.session.phase());
            self.settle();
            return Disposition::Allow;
        }

        let disposition = match event {
            ProctorEvent::Browser(signal) => self.monitor.dispatch(&signal),
            ProctorEvent::TimerTick => {
                self.session.tick();
                Disposition::Allow
            }
            ProctorEvent::DevtoolsPoll => {
                self.monitor.poll_devtools();
                Disposition::Allow
            }
            ProctorEvent::AutosaveTick => {
                self.session.autosave();
                Disposition::Allow
            }
            ProctorEvent::FrameAnalysis => {
                self.analyze_frame();
                Disposition::Allow
            }
        };

        self.session.pump();
        self.settle();
        disposition
    }

    /// Capture a frame and hand it to the analyzer off the loop thread.
    /// Alerts come back through the session inbox.
    fn analyze_frame(&mut self) -> bool {
        if self.session.camera_blocked() {
            return false;
        }
        let analysis = match self.analysis.as_mut() {
            Some(analysis) => analysis,
            None => return false,
        };
        let frame = match analysis.source.capture() {
            Some(frame) => frame,
            None => {
                debug!("No camera frame available");
                return false;
            }
        };

        let analyzer = Arc::clone(&analysis.analyzer);
        let token = self.session.token().to_string();
        let notifier = self.session.notifier();
        analysis.worker.submit(move || match analyzer.analyze_frame(&token, &frame) {
            Ok(alerts) => {
                debug!("Frame analysis returned {} alerts", alerts.len());
                for alert in alerts {
                    notifier.violation(alert.into_violation());
                }
            }
            Err(e) => warn!("Frame analysis failed: {}", e),
        })
    }

    /// Wait for queued frame analyses and apply their alerts
    pub fn flush_analysis(&mut self) -> usize {
        if let Some(analysis) = &self.analysis {
            analysis.worker.flush();
        }
        let handled = self.session.pump();
        self.settle();
        handled
    }

    /// Stop monitoring once the session is over
    fn settle(&mut self) {
        if self.settled || self.session.is_active() {
            return;
        }
        self.settled = true;

        let released = self.monitor.stop();
        debug!("Session ended; released {} observers", released);

        if let (Some(audit), Some(payload)) = (&self.audit, self.session.final_payload()) {
            if let Err(e) = audit.record_submission(self.session.token(), payload) {
                warn!("Failed to write audit record: {}", e);
            }
        }
    }

    /// Event loop: browser signals plus the four tickers, until the exam is
    /// submitted or the host closes the signal channel.
    pub fn run(&mut self, signals: Receiver<SignalRequest>) -> Result<RunExit> {
        if !self.started {
            self.start()?;
        }

        let mut clock = TickClock::new(self.intervals.timer);
        let timer = tick(self.intervals.timer);
        let devtools = tick(self.intervals.devtools);
        let autosave = tick(self.intervals.autosave);
        let frames: Receiver<Instant> = if self.analysis.is_some() {
            tick(self.intervals.frames)
        } else {
            never()
        };

        info!("Proctoring loop running for exam {}", self.session.token());
        let exit = loop {
            if !self.session.is_active() {
                break RunExit::Submitted;
            }

            select! {
                recv(signals) -> msg => match msg {
                    Ok(request) => {
                        let disposition = self.dispatch(ProctorEvent::Browser(request.signal));
                        if let Some(reply) = request.reply {
                            // host may have stopped waiting
                            let _ = reply.send(disposition);
                        }
                    }
                    Err(_) => break RunExit::SignalsClosed,
                },
                recv(timer) -> _ => {
                    let owed = clock.owed();
                    if owed > 1 {
                        debug!("Applying {} late timer ticks", owed - 1);
                    }
                    for _ in 0..owed {
                        if !self.session.is_active() {
                            break;
                        }
                        self.dispatch(ProctorEvent::TimerTick);
                    }
                }
                recv(devtools) -> _ => {
                    self.dispatch(ProctorEvent::DevtoolsPoll);
                }
                recv(autosave) -> _ => {
                    self.dispatch(ProctorEvent::AutosaveTick);
                }
                recv(frames) -> _ => {
                    self.dispatch(ProctorEvent::FrameAnalysis);
                }
            }
        };

        self.monitor.stop();
        info!("Proctoring loop exited: {:?}", exit);
        Ok(exit)
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ExamSession {
        &mut self.session
    }

    pub fn monitor(&self) -> &SecurityMonitor<H> {
        &self.monitor
    }

    pub fn host(&self) -> &H {
        self.monitor.host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.monitor.host_mut()
    }

    /// Tear down the monitor and hand back the session
    pub fn into_session(self) -> ExamSession {
        let ProctoredExam {
            session,
            mut monitor,
            ..
        } = self;
        monitor.stop();
        session
    }
}
