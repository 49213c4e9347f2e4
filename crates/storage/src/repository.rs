use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::model::{AnswerSheet, QuizId, SessionId, StudentId, ViolationRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Fallback records are keyed by quiz and student, one per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FallbackKey {
    pub quiz_id: QuizId,
    pub student_id: StudentId,
}

impl FallbackKey {
    #[must_use]
    pub fn new(quiz_id: QuizId, student_id: StudentId) -> Self {
        Self {
            quiz_id,
            student_id,
        }
    }
}

/// Local copy of a submission, written before delivery is attempted.
///
/// Read back only for manual recovery; never resubmitted automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub session_id: SessionId,
    pub quiz_id: QuizId,
    pub student_id: StudentId,
    pub answers: AnswerSheet,
    pub violations: Vec<ViolationRecord>,
    pub violated: bool,
    pub saved_at: DateTime<Utc>,
}

impl FallbackRecord {
    #[must_use]
    pub fn key(&self) -> FallbackKey {
        FallbackKey::new(self.quiz_id, self.student_id)
    }
}

/// Durable key-value store for fallback records.
#[async_trait]
pub trait FallbackStore: Send + Sync {
    /// Insert or replace the record for its key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn save(&self, record: &FallbackRecord) -> Result<(), StorageError>;

    /// Append violations to an existing record, keeping its answers untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no record exists for `key`.
    async fn append_violations(
        &self,
        key: FallbackKey,
        violations: &[ViolationRecord],
    ) -> Result<(), StorageError>;

    /// Fetch the record for a key, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get(&self, key: FallbackKey) -> Result<Option<FallbackRecord>, StorageError>;

    /// Remove the record for a key. Missing records are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear(&self, key: FallbackKey) -> Result<(), StorageError>;

    /// Newest records first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list(&self, limit: u32) -> Result<Vec<FallbackRecord>, StorageError>;
}

/// In-memory fallback store for tests and throwaway runs.
#[derive(Clone, Default)]
pub struct InMemoryFallbackStore {
    records: Arc<Mutex<HashMap<FallbackKey, FallbackRecord>>>,
}

impl InMemoryFallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FallbackStore for InMemoryFallbackStore {
    async fn save(&self, record: &FallbackRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.key(), record.clone());
        Ok(())
    }

    async fn append_violations(
        &self,
        key: FallbackKey,
        violations: &[ViolationRecord],
    ) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard.get_mut(&key).ok_or(StorageError::NotFound)?;
        record.violations.extend_from_slice(violations);
        Ok(())
    }

    async fn get(&self, key: FallbackKey) -> Result<Option<FallbackRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&key).cloned())
    }

    async fn clear(&self, key: FallbackKey) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&key);
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<FallbackRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut out: Vec<_> = guard.values().cloned().collect();
        out.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then(b.key().cmp(&a.key())));
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }
}

/// Storage backends behind trait objects for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub fallback: Arc<dyn FallbackStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let fallback: Arc<dyn FallbackStore> = Arc::new(InMemoryFallbackStore::new());
        Self { fallback }
    }
}
