//! proctorbox: browser lockdown and session control for proctored coding exams
//!
//! # Architecture
//!
//! The crate is organized around the life of one exam attempt:
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: `proctorbox.json` loading and environment overrides
//! - [`config::validator`]: Configuration validation (strict mode fails fast)
//! - [`config::types`]: Error enum, result alias and shared closed enums
//!
//! ## Violations ([`violation`])
//! - [`violation::event`]: Violation kinds, fixed severities, immutable events
//! - [`violation::ledger`]: Append-only violation log with the warning tally
//!
//! ## Lockdown ([`monitor`])
//! - [`monitor::signals`]: Browser signals and default-action dispositions
//! - [`monitor::host`]: Browser host abstraction (observers, permissions, viewport)
//! - [`monitor::rules`]: Pure detection rules
//! - [`monitor::security`]: Security monitor with observer ledger
//!
//! ## Countdown ([`timer`])
//!
//! ## Session ([`session`])
//! - [`session::controller`]: Phase machine, buffers, escalation, submission
//! - [`session::portal`]: Link validation, consent, feedback
//! - [`session::types`]: Questions, submissions, final payload, view
//!
//! ## Collaborators ([`client`])
//! - [`client::http`]: Exam API and frame-analysis clients
//! - [`client::mock`]: In-memory exam service and recording sink
//! - [`client::worker`]: Background worker for fire-and-forget calls
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Severity-levelled logging and JSON-lines audit trail
//!
//! ## Runtime ([`runtime`])
//! - [`runtime::proctor`]: Proctored exam event loop
//!
//! ## Testing Infrastructure ([`testing`])
//! - [`testing::simulated_host`]: In-memory browser host
//!
//! # Design Principles
//!
//! 1. **One counter** - The violation log is the only source of the warning count
//! 2. **Decide where you detect** - Suppression is returned by the call that records the violation
//! 3. **Every observer is released** - Registrations are ledgered and undone in reverse
//! 4. **Submission is terminal** - After `submitted` nothing mutates the session
//! 5. **Collaborator failures are not exam failures** - Network errors are logged, never surfaced

// Configuration
pub mod config;

// Violations
pub mod violation;

// Lockdown
pub mod monitor;

// Countdown
pub mod timer;

// Session
pub mod session;

// Collaborators
pub mod client;

// Observability
pub mod observability;

// Runtime
pub mod runtime;

// Testing Infrastructure
pub mod testing;

// Re-export commonly used types for convenience
pub use config::types::*;

pub use config::settings::ProctorConfig;
pub use monitor::{BrowserHost, BrowserSignal, Disposition, SecurityMonitor};
pub use runtime::proctor::{ProctorEvent, ProctoredExam};
pub use session::controller::ExamSession;
pub use timer::ExamTimer;
pub use violation::{Severity, ViolationEvent, ViolationKind, ViolationLog};
