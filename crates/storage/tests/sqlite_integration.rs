use chrono::Duration;
use proctor_core::model::{
    AnswerSheet, AnswerValue, QuestionId, QuizId, SessionId, StudentId, ViolationKind,
    ViolationRecord,
};
use proctor_core::time::fixed_now;
use storage::repository::{FallbackKey, FallbackRecord, FallbackStore, Storage};
use storage::sqlite::SqliteRepository;

fn build_record(quiz: u64, student: u64, saved_offset_secs: i64) -> FallbackRecord {
    let mut answers = AnswerSheet::new();
    answers.insert(QuestionId::new(1), AnswerValue::Choice(2));
    answers.insert(QuestionId::new(2), AnswerValue::text("because of ARP"));
    FallbackRecord {
        session_id: SessionId::random(),
        quiz_id: QuizId::new(quiz),
        student_id: StudentId::new(student),
        answers,
        violations: vec![ViolationRecord::new(
            ViolationKind::FullscreenExit,
            fixed_now(),
        )],
        violated: true,
        saved_at: fixed_now() + Duration::seconds(saved_offset_secs),
    }
}

#[tokio::test]
async fn sqlite_fallback_roundtrip() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_fallback_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let record = build_record(7, 11, 0);
    repo.save(&record).await.unwrap();

    let fetched = repo.get(record.key()).await.unwrap().expect("record");
    assert_eq!(fetched, record);

    let missing = repo
        .get(FallbackKey::new(QuizId::new(7), StudentId::new(12)))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn sqlite_appends_late_violations_without_touching_answers() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_fallback_append?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let record = build_record(1, 1, 0);
    repo.save(&record).await.unwrap();

    let late = ViolationRecord::new(ViolationKind::FocusLost, fixed_now() + Duration::seconds(3));
    repo.append_violations(record.key(), &[late]).await.unwrap();

    let fetched = repo.get(record.key()).await.unwrap().unwrap();
    assert_eq!(fetched.answers, record.answers);
    assert_eq!(fetched.violations.len(), 2);
    assert_eq!(fetched.violations[1], late);

    let err = repo
        .append_violations(FallbackKey::new(QuizId::new(9), StudentId::new(9)), &[late])
        .await
        .unwrap_err();
    assert!(matches!(err, storage::repository::StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_lists_newest_first_and_clears() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_fallback_list?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // Migrations are re-runnable.
    repo.migrate().await.expect("migrate twice");

    let older = build_record(1, 1, 0);
    let newer = build_record(2, 1, 60);
    repo.save(&older).await.unwrap();
    repo.save(&newer).await.unwrap();

    let listed = repo.list(10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].quiz_id, QuizId::new(2));

    repo.clear(newer.key()).await.unwrap();
    let listed = repo.list(10).await.unwrap();
    assert_eq!(listed, vec![older]);
}

#[tokio::test]
async fn storage_sqlite_exposes_fallback_store() {
    let storage = Storage::sqlite("sqlite:file:memdb_fallback_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let record = build_record(5, 6, 0);
    storage.fallback.save(&record).await.unwrap();
    assert!(storage.fallback.get(record.key()).await.unwrap().is_some());
}
