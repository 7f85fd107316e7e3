//! Violation model
//!
//! Shared vocabulary of proctoring infractions and the append-only session log.

pub mod event;
pub mod ledger;

pub use event::{Severity, ViolationEvent, ViolationKind};
pub use ledger::ViolationLog;
