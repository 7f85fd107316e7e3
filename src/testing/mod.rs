//! Testing infrastructure
//!
//! Simulated browser host for exercising lockdown and session behavior.

pub mod simulated_host;

pub use simulated_host::*;
