//! Observability
//!
//! Severity-levelled violation logging and the JSON-lines audit trail.

pub mod audit;

pub use audit::{log_violation, AuditRecordKind, AuditTrail, SessionIds};
