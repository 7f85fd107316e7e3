/// Raw browser signals fed into the security monitor
use serde::{Deserialize, Serialize};

/// Browser observers the monitor installs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    Visibility,
    ContextMenu,
    Copy,
    Paste,
    FullscreenChange,
    KeyDown,
    WindowBlur,
    /// Periodic viewport-size heuristic for open devtools
    DevtoolsPoll,
}

impl ObserverKind {
    /// Every observer installed by an enabled monitor, in registration order
    pub const ALL: [ObserverKind; 8] = [
        ObserverKind::Visibility,
        ObserverKind::ContextMenu,
        ObserverKind::Copy,
        ObserverKind::Paste,
        ObserverKind::FullscreenChange,
        ObserverKind::KeyDown,
        ObserverKind::WindowBlur,
        ObserverKind::DevtoolsPoll,
    ];
}

/// Element an event was dispatched to, described by the class markers of the
/// element and its ancestors (innermost first)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    ancestry: Vec<String>,
}

impl EventTarget {
    pub fn new<I, S>(ancestry: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ancestry: ancestry.into_iter().map(Into::into).collect(),
        }
    }

    /// Target somewhere inside the given region
    pub fn inside(region: &str) -> Self {
        Self::new(["view-line", region, "exam-interface"])
    }

    /// Target on the page body, outside any editor
    pub fn page() -> Self {
        Self::new(["question-description", "exam-interface"])
    }

    /// True when this element or one of its ancestors carries `region`
    pub fn is_within(&self, region: &str) -> bool {
        self.ancestry.iter().any(|marker| marker == region)
    }
}

/// A key-down event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyStroke {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn cmd_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            meta: true,
            shift: true,
            ..Self::default()
        }
    }

    pub fn has_command_modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Browser event as observed by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BrowserSignal {
    VisibilityChanged { hidden: bool },
    ContextMenu { target: EventTarget },
    Copy { target: EventTarget },
    Paste { target: EventTarget },
    FullscreenChanged { fullscreen_active: bool },
    KeyDown { stroke: KeyStroke, target: EventTarget },
    WindowBlur,
}

impl BrowserSignal {
    /// Observer that receives this signal
    pub fn observer(&self) -> ObserverKind {
        match self {
            BrowserSignal::VisibilityChanged { .. } => ObserverKind::Visibility,
            BrowserSignal::ContextMenu { .. } => ObserverKind::ContextMenu,
            BrowserSignal::Copy { .. } => ObserverKind::Copy,
            BrowserSignal::Paste { .. } => ObserverKind::Paste,
            BrowserSignal::FullscreenChanged { .. } => ObserverKind::FullscreenChange,
            BrowserSignal::KeyDown { .. } => ObserverKind::KeyDown,
            BrowserSignal::WindowBlur => ObserverKind::WindowBlur,
        }
    }
}

/// What the page must do with the event's default action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Allow,
    /// preventDefault: the browser's default action must not run
    Suppress,
}

impl Disposition {
    pub fn is_suppressed(self) -> bool {
        self == Disposition::Suppress
    }
}
