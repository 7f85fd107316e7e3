/// Lockdown detection rules
/// Pure functions from a browser signal to zero or more detections
use crate::config::settings::LockdownConfig;
use crate::monitor::host::Viewport;
use crate::monitor::signals::{BrowserSignal, EventTarget, KeyStroke};
use crate::violation::event::ViolationKind;

/// Inputs the rules need from config
#[derive(Debug, Clone, PartialEq)]
pub struct LockdownPolicy {
    pub devtools_threshold_px: u32,
    pub editor_region: String,
    pub blocked_shortcut_keys: Vec<char>,
}

impl Default for LockdownPolicy {
    fn default() -> Self {
        Self::from(&LockdownConfig::default())
    }
}

impl From<&LockdownConfig> for LockdownPolicy {
    fn from(config: &LockdownConfig) -> Self {
        Self {
            devtools_threshold_px: config.devtools_threshold_px,
            editor_region: config.editor_region.clone(),
            blocked_shortcut_keys: config
                .blocked_shortcut_keys
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
        }
    }
}

/// A rule match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub kind: ViolationKind,
    pub message: String,
    /// Default action must be prevented
    pub suppress: bool,
}

impl Detection {
    fn observed(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suppress: false,
        }
    }

    fn blocked(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suppress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardAction {
    Copy,
    Paste,
}

/// Evaluate every rule bound to `signal`
pub fn evaluate(signal: &BrowserSignal, policy: &LockdownPolicy) -> Vec<Detection> {
    match signal {
        BrowserSignal::VisibilityChanged { hidden } => tab_switch(*hidden).into_iter().collect(),
        BrowserSignal::ContextMenu { .. } => vec![context_menu()],
        BrowserSignal::Copy { target } => clipboard(ClipboardAction::Copy, target, policy)
            .into_iter()
            .collect(),
        BrowserSignal::Paste { target } => clipboard(ClipboardAction::Paste, target, policy)
            .into_iter()
            .collect(),
        BrowserSignal::FullscreenChanged { fullscreen_active } => {
            fullscreen_change(*fullscreen_active).into_iter().collect()
        }
        BrowserSignal::KeyDown { stroke, target } => screenshot(stroke)
            .into_iter()
            .chain(shortcut(stroke, target, policy))
            .collect(),
        BrowserSignal::WindowBlur => vec![window_blur()],
    }
}

pub fn tab_switch(hidden: bool) -> Option<Detection> {
    hidden.then(|| {
        Detection::observed(
            ViolationKind::TabSwitch,
            "Candidate switched tabs or minimized window",
        )
    })
}

/// Right-click is always blocked
pub fn context_menu() -> Detection {
    Detection::blocked(
        ViolationKind::RightClickAttempt,
        "Candidate attempted to right-click",
    )
}

/// Clipboard use is allowed only inside the editor region
pub fn clipboard(
    action: ClipboardAction,
    target: &EventTarget,
    policy: &LockdownPolicy,
) -> Option<Detection> {
    if target.is_within(&policy.editor_region) {
        return None;
    }
    Some(match action {
        ClipboardAction::Copy => Detection::blocked(
            ViolationKind::CopyAttempt,
            "Copy attempt detected outside code editor",
        ),
        ClipboardAction::Paste => Detection::blocked(
            ViolationKind::PasteAttempt,
            "Paste attempt detected outside code editor",
        ),
    })
}

/// Docked devtools shrink the inner viewport; strictly more than the threshold trips the rule
pub fn devtools(viewport: &Viewport, threshold_px: u32) -> Option<Detection> {
    let opened = viewport.width_delta() > threshold_px || viewport.height_delta() > threshold_px;
    opened.then(|| Detection::observed(ViolationKind::DevtoolsOpened, "Developer tools detected"))
}

pub fn fullscreen_change(fullscreen_active: bool) -> Option<Detection> {
    (!fullscreen_active).then(|| {
        Detection::observed(
            ViolationKind::FullscreenExit,
            "Candidate exited fullscreen mode",
        )
    })
}

/// PrintScreen, or Cmd+Shift+3/4/5 on macOS
pub fn screenshot(stroke: &KeyStroke) -> Option<Detection> {
    let print_screen = stroke.key == "PrintScreen";
    let mac_capture = stroke.meta && stroke.shift && matches!(stroke.key.as_str(), "3" | "4" | "5");

    (print_screen || mac_capture).then(|| {
        Detection::blocked(
            ViolationKind::ScreenshotAttempt,
            "Screenshot attempt detected",
        )
    })
}

/// Ctrl/Cmd + blocked key outside the editor region
pub fn shortcut(
    stroke: &KeyStroke,
    target: &EventTarget,
    policy: &LockdownPolicy,
) -> Option<Detection> {
    if !stroke.has_command_modifier() || target.is_within(&policy.editor_region) {
        return None;
    }

    let mut chars = stroke.key.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_ascii_lowercase(),
        _ => return None,
    };

    policy.blocked_shortcut_keys.contains(&key).then(|| {
        Detection::blocked(
            ViolationKind::ShortcutAttempt,
            format!(
                "Keyboard shortcut Ctrl+{} blocked",
                key.to_ascii_uppercase()
            ),
        )
    })
}

pub fn multi_monitor(extended: Option<bool>) -> Option<Detection> {
    (extended == Some(true)).then(|| {
        Detection::observed(
            ViolationKind::MultiMonitorDetected,
            "Multiple monitors detected",
        )
    })
}

pub fn window_blur() -> Detection {
    Detection::observed(ViolationKind::WindowBlur, "Window lost focus")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockdownPolicy {
        LockdownPolicy::default()
    }

    #[test]
    fn test_tab_switch_only_when_hidden() {
        assert!(tab_switch(false).is_none());
        let detection = tab_switch(true).unwrap();
        assert_eq!(detection.kind, ViolationKind::TabSwitch);
        assert!(!detection.suppress);
    }

    #[test]
    fn test_clipboard_inside_editor_allowed() {
        let target = EventTarget::inside("monaco-editor");
        assert!(clipboard(ClipboardAction::Copy, &target, &policy()).is_none());
        assert!(clipboard(ClipboardAction::Paste, &target, &policy()).is_none());
    }

    #[test]
    fn test_clipboard_outside_editor_blocked() {
        let detection = clipboard(ClipboardAction::Paste, &EventTarget::page(), &policy()).unwrap();
        assert_eq!(detection.kind, ViolationKind::PasteAttempt);
        assert!(detection.suppress);
    }

    #[test]
    fn test_devtools_threshold_is_strict() {
        assert!(devtools(&Viewport::new(1400, 900, 1240, 900), 160).is_none());
        assert!(devtools(&Viewport::new(1400, 900, 1239, 900), 160).is_some());
        assert!(devtools(&Viewport::new(1400, 900, 1400, 700), 160).is_some());
    }

    #[test]
    fn test_screenshot_keys() {
        assert!(screenshot(&KeyStroke::plain("PrintScreen")).is_some());
        assert!(screenshot(&KeyStroke::cmd_shift("4")).is_some());
        assert!(screenshot(&KeyStroke::cmd_shift("6")).is_none());
        assert!(screenshot(&KeyStroke::plain("4")).is_none());
    }

    #[test]
    fn test_shortcut_rules() {
        let page = EventTarget::page();
        let detection = shortcut(&KeyStroke::ctrl("C"), &page, &policy()).unwrap();
        assert_eq!(detection.message, "Keyboard shortcut Ctrl+C blocked");

        assert!(shortcut(&KeyStroke::ctrl("z"), &page, &policy()).is_none());
        assert!(shortcut(&KeyStroke::plain("c"), &page, &policy()).is_none());
        assert!(shortcut(&KeyStroke::ctrl("Control"), &page, &policy()).is_none());
        assert!(shortcut(
            &KeyStroke::ctrl("v"),
            &EventTarget::inside("monaco-editor"),
            &policy()
        )
        .is_none());
    }

    #[test]
    fn test_multi_monitor_requires_positive_answer() {
        assert!(multi_monitor(None).is_none());
        assert!(multi_monitor(Some(false)).is_none());
        assert!(multi_monitor(Some(true)).is_some());
    }

    #[test]
    fn test_evaluate_context_menu_always_blocked() {
        let detections = evaluate(
            &BrowserSignal::ContextMenu {
                target: EventTarget::inside("monaco-editor"),
            },
            &policy(),
        );
        assert_eq!(detections.len(), 1);
        assert!(detections[0].suppress);
    }
}
