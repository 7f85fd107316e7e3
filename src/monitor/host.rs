/// Browser host abstraction
/// The monitor only touches the page through this trait
use crate::config::types::{Permission, ProctorError};
use crate::monitor::signals::ObserverKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle returned when an observer is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

/// Outer and inner window dimensions in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
}

impl Viewport {
    pub fn new(outer_width: u32, outer_height: u32, inner_width: u32, inner_height: u32) -> Self {
        Self {
            outer_width,
            outer_height,
            inner_width,
            inner_height,
        }
    }

    /// Window without docked panels
    pub fn undocked(width: u32, height: u32) -> Self {
        Self::new(width, height, width, height.saturating_sub(80))
    }

    pub fn width_delta(&self) -> u32 {
        self.outer_width.saturating_sub(self.inner_width)
    }

    pub fn height_delta(&self) -> u32 {
        self.outer_height.saturating_sub(self.inner_height)
    }
}

/// Outcome of a refused permission prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDenied {
    pub permission: Permission,
    pub reason: String,
}

impl PermissionDenied {
    pub fn new(permission: Permission, reason: impl Into<String>) -> Self {
        Self {
            permission,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} permission denied: {}", self.permission, self.reason)
    }
}

impl std::error::Error for PermissionDenied {}

impl From<PermissionDenied> for ProctorError {
    fn from(err: PermissionDenied) -> Self {
        ProctorError::Permission {
            permission: err.permission,
            details: err.reason,
        }
    }
}

/// The page the exam runs in
pub trait BrowserHost {
    /// Install an observer; the returned id must be passed back to `unregister`
    fn register(&mut self, kind: ObserverKind) -> ObserverId;

    fn unregister(&mut self, id: ObserverId);

    /// Ask the browser to enter fullscreen
    fn request_fullscreen(&mut self) -> Result<(), PermissionDenied>;

    /// Ask for camera (and microphone) access
    fn request_camera(&mut self) -> Result<(), PermissionDenied>;

    fn viewport(&self) -> Viewport;

    /// Extended-display query; `None` when the browser does not expose it
    fn is_extended_display(&self) -> Option<bool>;
}
