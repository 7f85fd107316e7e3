//! Configuration and policy
//!
//! Config loading, validation, and shared type definitions.

pub mod settings;
pub mod types;
pub mod validator;
