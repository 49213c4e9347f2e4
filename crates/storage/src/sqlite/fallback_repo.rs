use proctor_core::model::ViolationRecord;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    answers_to_json, id_to_i64, map_fallback_row, ser, violations_from_json, violations_to_json,
};
use crate::repository::{FallbackKey, FallbackRecord, FallbackStore, StorageError};

fn key_i64(key: FallbackKey) -> Result<(i64, i64), StorageError> {
    Ok((
        id_to_i64("quiz_id", key.quiz_id.value())?,
        id_to_i64("student_id", key.student_id.value())?,
    ))
}

#[async_trait::async_trait]
impl FallbackStore for SqliteRepository {
    async fn save(&self, record: &FallbackRecord) -> Result<(), StorageError> {
        let (quiz_id, student_id) = key_i64(record.key())?;

        sqlx::query(
            r"
                INSERT INTO fallback_records (
                    quiz_id, student_id, session_id, answers, violations, violated, saved_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(quiz_id, student_id) DO UPDATE SET
                    session_id = excluded.session_id,
                    answers = excluded.answers,
                    violations = excluded.violations,
                    violated = excluded.violated,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(quiz_id)
        .bind(student_id)
        .bind(record.session_id.to_string())
        .bind(answers_to_json(&record.answers)?)
        .bind(violations_to_json(&record.violations)?)
        .bind(i64::from(record.violated))
        .bind(record.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn append_violations(
        &self,
        key: FallbackKey,
        violations: &[ViolationRecord],
    ) -> Result<(), StorageError> {
        let (quiz_id, student_id) = key_i64(key)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let row = sqlx::query(
            r"
                SELECT violations FROM fallback_records
                WHERE quiz_id = ?1 AND student_id = ?2
            ",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let mut stored = violations_from_json(&row.try_get::<String, _>("violations").map_err(ser)?)?;
        stored.extend_from_slice(violations);

        sqlx::query(
            r"
                UPDATE fallback_records SET violations = ?3
                WHERE quiz_id = ?1 AND student_id = ?2
            ",
        )
        .bind(quiz_id)
        .bind(student_id)
        .bind(violations_to_json(&stored)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: FallbackKey) -> Result<Option<FallbackRecord>, StorageError> {
        let (quiz_id, student_id) = key_i64(key)?;
        let row = sqlx::query(
            r"
                SELECT quiz_id, student_id, session_id, answers, violations, violated, saved_at
                FROM fallback_records
                WHERE quiz_id = ?1 AND student_id = ?2
            ",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_fallback_row).transpose()
    }

    async fn clear(&self, key: FallbackKey) -> Result<(), StorageError> {
        let (quiz_id, student_id) = key_i64(key)?;
        sqlx::query("DELETE FROM fallback_records WHERE quiz_id = ?1 AND student_id = ?2")
            .bind(quiz_id)
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<FallbackRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT quiz_id, student_id, session_id, answers, violations, violated, saved_at
                FROM fallback_records
                ORDER BY saved_at DESC, quiz_id DESC, student_id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_fallback_row(row)?);
        }
        Ok(out)
    }
}
