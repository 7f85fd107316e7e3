/// Append-only violation log
/// Entries are recorded in arrival order and never mutated or removed
use crate::violation::event::{ViolationEvent, ViolationKind};
use serde::Serialize;

/// Ordered record of every violation accepted during a session.
///
/// `warning_count` is the single authoritative tally of high/critical entries.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ViolationLog {
    entries: Vec<ViolationEvent>,
    #[serde(skip)]
    warnings: usize,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation and return the warning count after it
    pub fn append(&mut self, event: ViolationEvent) -> usize {
        if event.is_warning() {
            self.warnings += 1;
        }
        self.entries.push(event);
        self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> &[ViolationEvent] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViolationEvent> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ViolationEvent> {
        self.entries.last()
    }

    pub fn count_of(&self, kind: &ViolationKind) -> usize {
        self.entries.iter().filter(|e| e.kind() == kind).count()
    }
}
