mod common;

use std::time::Duration;

use common::{QUIZ, STUDENT, harness, two_question_quiz};
use proctor_core::model::{AnswerValue, QuestionId, QuizId, SessionState, ViolationKind};
use proctor_core::time::fixed_now;
use services::{LoadError, QuizDataError, SessionError, SubmissionStatus};

#[tokio::test]
async fn voluntary_submit_is_graded_once() {
    let h = harness(two_question_quiz());
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();

    session.start().unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(0))
        .unwrap();
    session
        .record_answer(QuestionId::new(2), AnswerValue::Choice(1))
        .unwrap();
    session.submit_voluntary().await.unwrap();

    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Submitted);
    let outcome = snapshot.outcome().expect("graded outcome");
    assert_eq!(outcome.score, Some(5));
    assert_eq!(outcome.max_score, 10);
    assert_eq!(outcome.graded_answers.len(), 2);
    assert_eq!(
        outcome.graded_answers[&QuestionId::new(2)].is_correct,
        Some(false)
    );

    let submissions = h.quiz_data.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    assert!(!submissions[0].violated);
    assert_eq!(submissions[0].student_id, STUDENT);
    assert!(h.service.recover(QUIZ, STUDENT).await.unwrap().is_none());
}

#[tokio::test]
async fn submit_with_missing_answer_is_rejected() {
    let h = harness(two_question_quiz());
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(0))
        .unwrap();

    let err = session.submit_voluntary().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Incomplete {
            missing: vec![QuestionId::new(2)]
        }
    );

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Active);
    assert_eq!(snapshot.answered, 1);
    assert_eq!(snapshot.submission, SubmissionStatus::NotSubmitted);
    assert!(h.quiz_data.submissions().unwrap().is_empty());
}

#[tokio::test]
async fn submit_before_start_is_rejected() {
    let h = harness(two_question_quiz());
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();

    let err = session.submit_voluntary().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::NotActive {
            state: SessionState::NotStarted
        }
    );
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_submits_with_violation() {
    let quiz = two_question_quiz().with_time_limit(1);
    let h = harness(quiz);
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(0))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(59_500)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Active);
    assert_eq!(snapshot.remaining_secs, Some(1));

    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Submitted);
    assert_eq!(snapshot.remaining_secs, Some(0));
    assert_eq!(snapshot.last_violation, Some(ViolationKind::TimeExpired));
    assert_eq!(snapshot.redirect_after_secs, Some(5));

    let submissions = h.quiz_data.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    assert!(submissions[0].violated);
    assert_eq!(submissions[0].answers.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn answers_after_suspension_are_ignored() {
    let h = harness(two_question_quiz());
    h.quiz_data.reject_submissions(true);
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(1))
        .unwrap();
    session.report_violation(ViolationKind::TabHidden).unwrap();
    session
        .record_answer(QuestionId::new(2), AnswerValue::Choice(0))
        .unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(0))
        .unwrap();

    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.answered, 1);
    assert!(snapshot.read_only);
    assert!(matches!(
        snapshot.submission,
        SubmissionStatus::SavedLocally { persisted: true, .. }
    ));

    let record = h
        .service
        .recover(QUIZ, STUDENT)
        .await
        .unwrap()
        .expect("fallback record kept");
    assert!(record.violated);
    assert_eq!(record.answers.len(), 1);
    assert_eq!(
        record.answers[&QuestionId::new(1)],
        AnswerValue::Choice(1)
    );
}

#[tokio::test(start_paused = true)]
async fn late_violations_are_appended_to_fallback_not_resubmitted() {
    let h = harness(two_question_quiz());
    h.quiz_data.reject_submissions(true);
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session.report_violation(ViolationKind::FocusLost).unwrap();
    session.settled().await.unwrap();

    session.report_violation(ViolationKind::TabHidden).unwrap();
    let snapshot = session.wait_for(|s| s.violation_count == 2).await.unwrap();
    assert_eq!(snapshot.state, SessionState::Submitted);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let record = h.service.recover(QUIZ, STUDENT).await.unwrap().unwrap();
    let kinds: Vec<_> = record.violations.iter().map(|v| v.kind()).collect();
    assert_eq!(kinds, vec![ViolationKind::FocusLost, ViolationKind::TabHidden]);

    let listed = h.service.list_fallbacks(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(h.quiz_data.submissions().unwrap().is_empty());
}

#[tokio::test]
async fn close_while_active_keeps_state() {
    let h = harness(two_question_quiz());
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session.wait_for(|s| s.state.is_active()).await.unwrap();

    let last = session.close().await;
    assert_eq!(last.state, SessionState::Active);
    assert_eq!(last.submission, SubmissionStatus::NotSubmitted);
    assert!(h.quiz_data.submissions().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_quiz_fails_to_load() {
    let h = harness(two_question_quiz());
    let err = h
        .service
        .open_attempt(QuizId::new(404), STUDENT)
        .await
        .err()
        .expect("load error");
    assert!(matches!(
        err,
        LoadError::QuizData(QuizDataError::NotFound(id)) if id == QuizId::new(404)
    ));
}

#[tokio::test]
async fn closed_quiz_fails_to_load() {
    let closed_at = fixed_now() - chrono::Duration::hours(1);
    let quiz = two_question_quiz().with_window(None, Some(closed_at));
    let h = harness(quiz);
    let err = h.service.load_quiz(QUIZ).await.unwrap_err();
    assert!(matches!(err, LoadError::Quiz(_)));
}
