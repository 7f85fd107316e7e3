/// Core types shared across the proctorbox system
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exam session lifecycle phase
///
/// Phases only move forward: `Loading -> Instructions -> Consent -> InProgress -> Submitted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    Instructions,
    Consent,
    InProgress,
    Submitted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Loading => "loading",
            SessionPhase::Instructions => "instructions",
            SessionPhase::Consent => "consent",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

/// Why the exam was submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    /// Candidate pressed submit
    Manual,
    /// Countdown reached zero
    TimeUp,
    /// High/critical violation threshold reached
    MaxViolations,
}

/// Browser permission that was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Fullscreen,
    Camera,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Fullscreen => f.write_str("fullscreen"),
            Permission::Camera => f.write_str("camera"),
        }
    }
}

/// Custom error types for proctorbox
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Permission denied: {permission} ({details})")]
    Permission {
        permission: Permission,
        details: String,
    },

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("Exam is not in progress (phase: {0})")]
    NotInProgress(SessionPhase),

    #[error("Exam portal error: {0}")]
    Portal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for proctorbox operations
pub type Result<T> = std::result::Result<T, ProctorError>;
