use proctor_core::model::{AnswerSheet, QuizId, SessionId, StudentId, ViolationRecord};
use sqlx::Row;

use crate::repository::{FallbackRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn violations_to_json(violations: &[ViolationRecord]) -> Result<String, StorageError> {
    serde_json::to_string(violations).map_err(ser)
}

pub(crate) fn violations_from_json(raw: &str) -> Result<Vec<ViolationRecord>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn answers_to_json(answers: &AnswerSheet) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn map_fallback_row(row: &sqlx::sqlite::SqliteRow) -> Result<FallbackRecord, StorageError> {
    let quiz_id = QuizId::new(i64_to_u64("quiz_id", row.try_get("quiz_id").map_err(ser)?)?);
    let student_id = StudentId::new(i64_to_u64(
        "student_id",
        row.try_get("student_id").map_err(ser)?,
    )?);
    let session_id: SessionId = row
        .try_get::<String, _>("session_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let answers: AnswerSheet =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let violations = violations_from_json(&row.try_get::<String, _>("violations").map_err(ser)?)?;
    let violated = row.try_get::<i64, _>("violated").map_err(ser)? != 0;
    let saved_at = row.try_get("saved_at").map_err(ser)?;

    Ok(FallbackRecord {
        session_id,
        quiz_id,
        student_id,
        answers,
        violations,
        violated,
        saved_at,
    })
}
