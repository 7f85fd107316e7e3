//! Integration tests for the lockdown monitor and its configuration
//!
//! These tests verify that configuration flows into the rules and that every
//! observer installed by the monitor is released again.

use proctorbox::config::validator::validate_config;
use proctorbox::monitor::{
    BrowserSignal, Disposition, EventTarget, KeyStroke, MonitorOptions, SecurityMonitor, Viewport,
};
use proctorbox::testing::SimulatedBrowser;
use proctorbox::{ProctorConfig, ViolationEvent, ViolationKind};
use std::sync::{Arc, Mutex};

fn collector() -> (
    Arc<Mutex<Vec<ViolationEvent>>>,
    impl FnMut(ViolationEvent) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |event| sink.lock().unwrap().push(event))
}

#[test]
fn test_config_file_drives_editor_region() {
    let dir = std::env::temp_dir().join(format!("proctorbox-cfg-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("proctorbox.json");
    std::fs::write(
        &path,
        r#"{"lockdown": {"editor_region": "code-pane", "request_fullscreen": false}}"#,
    )
    .unwrap();

    let config = ProctorConfig::load_from_file(&path).unwrap();
    assert!(validate_config(&config).unwrap().is_valid());

    let (seen, callback) = collector();
    let mut monitor = SecurityMonitor::new(SimulatedBrowser::new());
    let start = monitor.start(callback, MonitorOptions::from(&config.lockdown));
    assert!(start.fullscreen.is_none());

    let paste_in_pane = BrowserSignal::Paste {
        target: EventTarget::inside("code-pane"),
    };
    assert_eq!(monitor.dispatch(&paste_in_pane), Disposition::Allow);

    let paste_in_default_region = BrowserSignal::Paste {
        target: EventTarget::inside("monaco-editor"),
    };
    assert_eq!(monitor.dispatch(&paste_in_default_region), Disposition::Suppress);
    assert_eq!(seen.lock().unwrap().len(), 1);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_listener_count_returns_to_zero() {
    let browser = SimulatedBrowser::new();
    let gauge = browser.listener_gauge();
    let (_, callback) = collector();

    let mut monitor = SecurityMonitor::new(browser);
    let start = monitor.start(callback, MonitorOptions::default());
    assert_eq!(gauge.get(), start.observers_registered);
    assert!(start.observers_registered > 0);

    assert_eq!(monitor.stop(), start.observers_registered);
    assert_eq!(gauge.get(), 0);
    assert_eq!(monitor.stop(), 0);
    assert_eq!(monitor.host().stray_unregisters(), 0);
}

#[test]
fn test_dropping_monitor_releases_observers() {
    let browser = SimulatedBrowser::new();
    let gauge = browser.listener_gauge();
    {
        let (_, callback) = collector();
        let mut monitor = SecurityMonitor::new(browser);
        monitor.start(callback, MonitorOptions::default());
        assert!(gauge.get() > 0);
    }
    assert_eq!(gauge.get(), 0);
}

#[test]
fn test_disabled_lockdown_installs_nothing() {
    let mut config = ProctorConfig::default();
    config.lockdown.enabled = false;

    let (seen, callback) = collector();
    let mut monitor = SecurityMonitor::new(SimulatedBrowser::new());
    let start = monitor.start(callback, MonitorOptions::from(&config.lockdown));
    assert_eq!(start.observers_registered, 0);

    let disposition = monitor.dispatch(&BrowserSignal::KeyDown {
        stroke: KeyStroke::plain("PrintScreen"),
        target: EventTarget::page(),
    });
    assert_eq!(disposition, Disposition::Allow);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_devtools_threshold_is_strict() {
    let (seen, callback) = collector();
    let mut monitor = SecurityMonitor::new(SimulatedBrowser::new());
    monitor.start(callback, MonitorOptions::default());

    monitor
        .host_mut()
        .set_viewport(Viewport::new(1440, 900, 1280, 900));
    assert!(!monitor.poll_devtools());

    monitor
        .host_mut()
        .set_viewport(Viewport::new(1440, 900, 1279, 900));
    assert!(monitor.poll_devtools());
    assert!(monitor.poll_devtools());

    let kinds: Vec<ViolationKind> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|v| v.kind().clone())
        .collect();
    assert_eq!(
        kinds,
        vec![ViolationKind::DevtoolsOpened, ViolationKind::DevtoolsOpened]
    );
}
