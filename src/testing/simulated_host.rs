/// In-memory browser host
/// Tracks observer registrations and permission prompts so lockdown behavior
/// can be exercised without a real page
use crate::config::types::Permission;
use crate::monitor::host::{BrowserHost, ObserverId, PermissionDenied, Viewport};
use crate::monitor::signals::ObserverKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared view of the number of live listeners, readable after the host has been moved
#[derive(Debug, Clone, Default)]
pub struct ListenerGauge(Arc<AtomicUsize>);

impl ListenerGauge {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, value: usize) {
        self.0.store(value, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct SimulatedBrowser {
    listeners: HashMap<ObserverId, ObserverKind>,
    next_id: u64,
    gauge: ListenerGauge,
    viewport: Viewport,
    extended_display: Option<bool>,
    fullscreen_allowed: bool,
    camera_allowed: bool,
    fullscreen: bool,
    fullscreen_requests: usize,
    camera_requests: usize,
    stray_unregisters: usize,
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
            gauge: ListenerGauge::default(),
            viewport: Viewport::undocked(1440, 900),
            extended_display: Some(false),
            fullscreen_allowed: true,
            camera_allowed: true,
            fullscreen: false,
            fullscreen_requests: 0,
            camera_requests: 0,
            stray_unregisters: 0,
        }
    }

    pub fn deny_fullscreen(mut self) -> Self {
        self.fullscreen_allowed = false;
        self
    }

    pub fn deny_camera(mut self) -> Self {
        self.camera_allowed = false;
        self
    }

    pub fn with_extended_display(mut self, extended: bool) -> Self {
        self.extended_display = Some(extended);
        self
    }

    /// Browser without the extended-display API
    pub fn without_display_api(mut self) -> Self {
        self.extended_display = None;
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener_gauge(&self) -> ListenerGauge {
        self.gauge.clone()
    }

    pub fn is_listening(&self, kind: ObserverKind) -> bool {
        self.listeners.values().any(|k| *k == kind)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Leave fullscreen the way Esc does
    pub fn exit_fullscreen(&mut self) {
        self.fullscreen = false;
    }

    pub fn fullscreen_requests(&self) -> usize {
        self.fullscreen_requests
    }

    pub fn camera_requests(&self) -> usize {
        self.camera_requests
    }

    /// Unregister calls for ids that were never registered (or already released)
    pub fn stray_unregisters(&self) -> usize {
        self.stray_unregisters
    }
}

impl BrowserHost for SimulatedBrowser {
    fn register(&mut self, kind: ObserverKind) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(id, kind);
        self.gauge.set(self.listeners.len());
        id
    }

    fn unregister(&mut self, id: ObserverId) {
        if self.listeners.remove(&id).is_none() {
            log::warn!("Unregister of unknown observer {:?}", id);
            self.stray_unregisters += 1;
        }
        self.gauge.set(self.listeners.len());
    }

    fn request_fullscreen(&mut self) -> Result<(), PermissionDenied> {
        self.fullscreen_requests += 1;
        if self.fullscreen_allowed {
            self.fullscreen = true;
            Ok(())
        } else {
            Err(PermissionDenied::new(
                Permission::Fullscreen,
                "Fullscreen request denied by user agent",
            ))
        }
    }

    fn request_camera(&mut self) -> Result<(), PermissionDenied> {
        self.camera_requests += 1;
        if self.camera_allowed {
            Ok(())
        } else {
            Err(PermissionDenied::new(
                Permission::Camera,
                "Camera access was denied",
            ))
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn is_extended_display(&self) -> Option<bool> {
        self.extended_display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister_balance() {
        let mut browser = SimulatedBrowser::new();
        let gauge = browser.listener_gauge();
        let a = browser.register(ObserverKind::Copy);
        let b = browser.register(ObserverKind::Paste);
        assert_ne!(a, b);
        assert_eq!(gauge.get(), 2);
        assert!(browser.is_listening(ObserverKind::Copy));

        browser.unregister(a);
        browser.unregister(a);
        assert_eq!(browser.listener_count(), 1);
        assert_eq!(browser.stray_unregisters(), 1);
        assert_eq!(gauge.get(), 1);
    }

    #[test]
    fn test_permission_prompts() {
        let mut browser = SimulatedBrowser::new().deny_camera();
        assert!(browser.request_fullscreen().is_ok());
        assert!(browser.is_fullscreen());
        assert!(browser.request_camera().is_err());
        assert_eq!(browser.camera_requests(), 1);
    }
}
