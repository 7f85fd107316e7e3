//! Browser lockdown monitoring
//!
//! Signals, the host abstraction, detection rules and the monitor that ties them together.

pub mod host;
pub mod rules;
pub mod security;
pub mod signals;

pub use host::{BrowserHost, ObserverId, PermissionDenied, Viewport};
pub use security::{MonitorOptions, MonitorStart, SecurityMonitor};
pub use signals::{BrowserSignal, Disposition, EventTarget, KeyStroke, ObserverKind};
