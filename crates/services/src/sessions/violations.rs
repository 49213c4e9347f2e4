use chrono::{DateTime, Utc};
use proctor_core::model::{ViolationKind, ViolationRecord};

/// Append-only, time-ordered record of detected incidents.
#[derive(Debug, Clone, Default)]
pub struct ViolationLog {
    records: Vec<ViolationRecord>,
}

impl ViolationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. A timestamp earlier than the last entry is clamped to
    /// it so the log stays ordered.
    pub fn append(&mut self, kind: ViolationKind, at: DateTime<Utc>) -> ViolationRecord {
        let at = match self.records.last() {
            Some(last) if at < last.at() => last.at(),
            _ => at,
        };
        let record = ViolationRecord::new(kind, at);
        self.records.push(record);
        record
    }

    #[must_use]
    pub fn all(&self) -> &[ViolationRecord] {
        &self.records
    }

    #[must_use]
    pub fn last(&self) -> Option<&ViolationRecord> {
        self.records.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
