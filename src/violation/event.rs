/// Proctoring violation vocabulary
/// Every infraction the lockdown detects, or an external analyzer reports, becomes a `ViolationEvent`
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Violation severity levels, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// High and critical violations count toward forced submission
    pub fn is_warning(self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of violation we track
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ViolationKind {
    TabSwitch,
    RightClickAttempt,
    CopyAttempt,
    PasteAttempt,
    DevtoolsOpened,
    FullscreenExit,
    ScreenshotAttempt,
    MultiMonitorDetected,
    WindowBlur,
    ShortcutAttempt,
    CameraDenied,
    /// Kind reported by the face/eye analysis service
    External(String),
}

impl ViolationKind {
    /// Severity assigned at detection time. Not configurable.
    pub fn default_severity(&self) -> Severity {
        match self {
            ViolationKind::DevtoolsOpened => Severity::Critical,
            ViolationKind::CameraDenied => Severity::Critical,

            ViolationKind::TabSwitch => Severity::High,
            ViolationKind::CopyAttempt => Severity::High,
            ViolationKind::PasteAttempt => Severity::High,
            ViolationKind::FullscreenExit => Severity::High,
            ViolationKind::ScreenshotAttempt => Severity::High,

            ViolationKind::RightClickAttempt => Severity::Medium,
            ViolationKind::MultiMonitorDetected => Severity::Medium,
            ViolationKind::WindowBlur => Severity::Medium,
            ViolationKind::ShortcutAttempt => Severity::Medium,

            // external analyzers normally supply their own severity
            ViolationKind::External(_) => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::RightClickAttempt => "right_click_attempt",
            ViolationKind::CopyAttempt => "copy_attempt",
            ViolationKind::PasteAttempt => "paste_attempt",
            ViolationKind::DevtoolsOpened => "devtools_opened",
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::ScreenshotAttempt => "screenshot_attempt",
            ViolationKind::MultiMonitorDetected => "multi_monitor_detected",
            ViolationKind::WindowBlur => "window_blur",
            ViolationKind::ShortcutAttempt => "shortcut_attempt",
            ViolationKind::CameraDenied => "camera_denied",
            ViolationKind::External(name) => name,
        }
    }

    /// Parse a wire name. Unknown names become external kinds.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "tab_switch" => ViolationKind::TabSwitch,
            "right_click_attempt" => ViolationKind::RightClickAttempt,
            "copy_attempt" => ViolationKind::CopyAttempt,
            "paste_attempt" => ViolationKind::PasteAttempt,
            "devtools_opened" => ViolationKind::DevtoolsOpened,
            "fullscreen_exit" => ViolationKind::FullscreenExit,
            "screenshot_attempt" => ViolationKind::ScreenshotAttempt,
            "multi_monitor_detected" => ViolationKind::MultiMonitorDetected,
            "window_blur" => ViolationKind::WindowBlur,
            "shortcut_attempt" => ViolationKind::ShortcutAttempt,
            "camera_denied" => ViolationKind::CameraDenied,
            other => ViolationKind::External(other.to_string()),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ViolationKind::External(_))
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ViolationKind> for String {
    fn from(kind: ViolationKind) -> Self {
        match kind {
            ViolationKind::External(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl From<String> for ViolationKind {
    fn from(name: String) -> Self {
        ViolationKind::from_wire(&name)
    }
}

/// A single proctoring infraction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    #[serde(rename = "type")]
    kind: ViolationKind,
    severity: Severity,
    timestamp: DateTime<Utc>,
    message: String,
}

impl ViolationEvent {
    /// Create a violation with the kind's fixed severity
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        let severity = kind.default_severity();
        Self {
            kind,
            severity,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Create a violation reported by an external analyzer. The reported
    /// severity only applies to kinds outside the built-in set.
    pub fn external(kind: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        let kind = ViolationKind::from_wire(&kind.into());
        let severity = if matches!(kind, ViolationKind::External(_)) {
            severity
        } else {
            kind.default_severity()
        };
        Self {
            kind,
            severity,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &ViolationKind {
        &self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_warning(&self) -> bool {
        self.severity.is_warning()
    }
}

impl fmt::Display for ViolationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::High.is_warning());
        assert!(Severity::Critical.is_warning());
        assert!(!Severity::Medium.is_warning());
    }

    #[test]
    fn test_fixed_severities() {
        assert_eq!(ViolationKind::TabSwitch.default_severity(), Severity::High);
        assert_eq!(
            ViolationKind::DevtoolsOpened.default_severity(),
            Severity::Critical
        );
        assert_eq!(
            ViolationKind::RightClickAttempt.default_severity(),
            Severity::Medium
        );
        assert_eq!(
            ViolationKind::MultiMonitorDetected.default_severity(),
            Severity::Medium
        );
        assert_eq!(
            ViolationKind::CameraDenied.default_severity(),
            Severity::Critical
        );
    }

    #[test]
    fn test_event_serializes_with_wire_names() {
        let event = ViolationEvent::new(ViolationKind::CopyAttempt, "Copy attempt");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "copy_attempt");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["message"], "Copy attempt");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_external_kind_keeps_reported_name() {
        let event = ViolationEvent::external("multiple_faces", Severity::Critical, "2 faces");
        assert_eq!(
            event.kind(),
            &ViolationKind::External("multiple_faces".to_string())
        );
        assert_eq!(event.severity(), Severity::Critical);

        let parsed: ViolationEvent =
            serde_json::from_value(serde_json::to_value(&event).unwrap()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_external_with_known_name_maps_to_builtin_kind() {
        let event = ViolationEvent::external("tab_switch", Severity::Low, "reported");
        assert_eq!(event.kind(), &ViolationKind::TabSwitch);
        assert_eq!(event.severity(), Severity::High);
        assert!(event.is_warning());

        let devtools = ViolationEvent::external("devtools_opened", Severity::Medium, "reported");
        assert_eq!(devtools.severity(), Severity::Critical);
    }
}
