use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// One schema version: statements applied together in a transaction.
struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        r"
        CREATE TABLE IF NOT EXISTS fallback_records (
            quiz_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            answers TEXT NOT NULL,
            violations TEXT NOT NULL,
            violated INTEGER NOT NULL CHECK (violated IN (0, 1)),
            saved_at TEXT NOT NULL,
            PRIMARY KEY (quiz_id, student_id)
        )
        ",
        r"
        CREATE INDEX IF NOT EXISTS idx_fallback_records_saved_at
            ON fallback_records (saved_at)
        ",
    ],
}];

/// Apply every version in `MIGRATIONS` missing from `schema_migrations`.
pub(super) async fn apply_pending(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;

    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(migration.version)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}
