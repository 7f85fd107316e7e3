/// Browser lockdown monitor
/// Installs passive observers on the host and turns raw signals into violations.
/// Every observer registered by `start` is recorded in a ledger and released by `stop`.
use crate::config::settings::LockdownConfig;
use crate::monitor::host::{BrowserHost, ObserverId, PermissionDenied};
use crate::monitor::rules::{self, Detection, LockdownPolicy};
use crate::monitor::signals::{BrowserSignal, Disposition, ObserverKind};
use crate::violation::event::ViolationEvent;
use log::{debug, info, warn};
use std::time::Instant;

/// Callback receiving each detected violation
pub type ViolationCallback = Box<dyn FnMut(ViolationEvent) + Send>;

/// Options for `SecurityMonitor::start`
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
    /// Toggles every detection rule
    pub enabled: bool,
    pub request_fullscreen: bool,
    pub policy: LockdownPolicy,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from(&LockdownConfig::default())
    }
}

impl From<&LockdownConfig> for MonitorOptions {
    fn from(config: &LockdownConfig) -> Self {
        Self {
            enabled: config.enabled,
            request_fullscreen: config.request_fullscreen,
            policy: LockdownPolicy::from(config),
        }
    }
}

/// What happened while starting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStart {
    pub observers_registered: usize,
    /// `None` when fullscreen was not requested
    pub fullscreen: Option<Result<(), PermissionDenied>>,
    pub multi_monitor_detected: bool,
}

/// Observer ledger entry
#[derive(Debug, Clone)]
pub struct ObserverEntry {
    pub kind: ObserverKind,
    pub id: ObserverId,
    pub registered_at: Instant,
}

/// Ledger of observers registered on the host.
/// Entries are recorded immediately after successful registration.
#[derive(Debug, Default)]
pub struct ObserverLedger {
    entries: Vec<ObserverEntry>,
}

impl ObserverLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ObserverKind, id: ObserverId) {
        let entry = ObserverEntry {
            kind,
            id,
            registered_at: Instant::now(),
        };
        debug!("Recording observer: {:?}", entry);
        self.entries.push(entry);
    }

    pub fn contains(&self, kind: ObserverKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Drain entries in reverse registration order (for release)
    pub fn drain_reverse(&mut self) -> Vec<ObserverEntry> {
        let mut drained: Vec<ObserverEntry> = self.entries.drain(..).collect();
        drained.reverse();
        drained
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Lockdown monitor bound to a browser host
pub struct SecurityMonitor<H: BrowserHost> {
    host: H,
    ledger: ObserverLedger,
    options: MonitorOptions,
    on_violation: Option<ViolationCallback>,
    emitted: usize,
}

impl<H: BrowserHost> SecurityMonitor<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            ledger: ObserverLedger::new(),
            options: MonitorOptions::default(),
            on_violation: None,
            emitted: 0,
        }
    }

    /// Begin observing. Restarting an active monitor releases the previous observers first.
    pub fn start<F>(&mut self, on_violation: F, options: MonitorOptions) -> MonitorStart
    where
        F: FnMut(ViolationEvent) + Send + 'static,
    {
        if self.is_active() {
            warn!("Security monitor restarted while active; releasing previous observers");
            self.stop();
        }

        self.options = options;
        self.on_violation = Some(Box::new(on_violation));

        if !self.options.enabled {
            info!("Security monitor disabled; no observers installed");
            return MonitorStart {
                observers_registered: 0,
                fullscreen: None,
                multi_monitor_detected: false,
            };
        }

        for kind in ObserverKind::ALL {
            let id = self.host.register(kind);
            self.ledger.record(kind, id);
        }

        // Denial here is logged only; leaving fullscreen later is the violation.
        let fullscreen = if self.options.request_fullscreen {
            let outcome = self.host.request_fullscreen();
            if let Err(e) = &outcome {
                warn!("Could not enter fullscreen: {}", e);
            }
            Some(outcome)
        } else {
            None
        };

        let multi_monitor_detected = self.check_displays();

        info!(
            "Security monitor started with {} observers",
            self.ledger.count()
        );

        MonitorStart {
            observers_registered: self.ledger.count(),
            fullscreen,
            multi_monitor_detected,
        }
    }

    /// Release every observer registered by `start`. Safe to call repeatedly.
    pub fn stop(&mut self) -> usize {
        let entries = self.ledger.drain_reverse();
        let released = entries.len();
        for entry in entries {
            debug!("Releasing observer {:?} ({:?})", entry.kind, entry.id);
            self.host.unregister(entry.id);
        }
        self.on_violation = None;

        if released > 0 {
            info!("Security monitor stopped, released {} observers", released);
        }
        released
    }

    pub fn is_active(&self) -> bool {
        self.on_violation.is_some() && !self.ledger.is_empty()
    }

    /// Route a browser signal through the rules.
    /// Suppression is decided in the same call that emits the violation.
    pub fn dispatch(&mut self, signal: &BrowserSignal) -> Disposition {
        if !self.ledger.contains(signal.observer()) {
            return Disposition::Allow;
        }

        let detections = rules::evaluate(signal, &self.options.policy);
        let suppress = detections.iter().any(|d| d.suppress);
        for detection in detections {
            self.emit(detection);
        }

        if suppress {
            Disposition::Suppress
        } else {
            Disposition::Allow
        }
    }

    /// Devtools viewport heuristic; runs on every poll interval. Returns true on detection.
    pub fn poll_devtools(&mut self) -> bool {
        if !self.ledger.contains(ObserverKind::DevtoolsPoll) {
            return false;
        }

        let viewport = self.host.viewport();
        match rules::devtools(&viewport, self.options.policy.devtools_threshold_px) {
            Some(detection) => {
                self.emit(detection);
                true
            }
            None => false,
        }
    }

    /// One-shot extended display check
    fn check_displays(&mut self) -> bool {
        match rules::multi_monitor(self.host.is_extended_display()) {
            Some(detection) => {
                self.emit(detection);
                true
            }
            None => false,
        }
    }

    fn emit(&mut self, detection: Detection) {
        if let Some(callback) = self.on_violation.as_mut() {
            let event = ViolationEvent::new(detection.kind, detection.message);
            debug!("Lockdown rule matched: {}", event);
            self.emitted += 1;
            callback(event);
        }
    }

    pub fn active_observers(&self) -> usize {
        self.ledger.count()
    }

    /// Violations emitted since construction
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: BrowserHost> Drop for SecurityMonitor<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
