//! Runtime
//!
//! Drives a proctored exam: routes browser signals and periodic ticks into the
//! monitor and session, and tears the lockdown down when the exam ends.

pub mod proctor;

pub use proctor::{LoopIntervals, ProctorEvent, ProctoredExam, RunExit, SignalRequest};
