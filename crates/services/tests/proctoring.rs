mod common;

use std::time::Duration;

use common::{QUIZ, STUDENT, harness, harness_with_host, two_question_quiz};
use proctor_core::model::{AnswerValue, DisplayStatus, QuestionId, SessionState, ViolationKind};
use services::{HostEnvironment, SimulatedHost};

#[tokio::test(start_paused = true)]
async fn hidden_tab_suspends_and_submits_once() {
    let h = harness(two_question_quiz().with_proctoring(true));
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .wait_for(|s| s.display == DisplayStatus::Exclusive)
        .await
        .unwrap();
    session
        .record_answer(QuestionId::new(1), AnswerValue::Choice(0))
        .unwrap();
    session.wait_for(|s| s.answered == 1).await.unwrap();

    h.host.hide_tab();

    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Submitted);
    assert_eq!(snapshot.violation_reason(), Some(ViolationKind::TabHidden.reason()));
    assert!(snapshot.outcome().is_some());

    // Watchers are gone; nothing further reaches the session.
    h.host.focus();
    h.host.blur();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let submissions = h.quiz_data.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    assert!(submissions[0].violated);
    assert_eq!(h.host.display_releases(), 1);
    assert_eq!(session.snapshot().violation_count, 1);
}

#[tokio::test(start_paused = true)]
async fn leaving_fullscreen_is_seen_on_next_poll() {
    let h = harness(two_question_quiz().with_proctoring(true));
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .wait_for(|s| s.display == DisplayStatus::Exclusive)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(session.snapshot().state, SessionState::Active);

    h.host.exit_exclusive_display();
    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.last_violation, Some(ViolationKind::FullscreenExit));
    assert_eq!(snapshot.violation_count, 1);
}

#[tokio::test(start_paused = true)]
async fn refused_display_is_reported_then_treated_as_exit() {
    let h = harness_with_host(
        two_question_quiz().with_proctoring(true),
        SimulatedHost::refusing_display(),
    );
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();

    let denied = session
        .wait_for(|s| s.display == DisplayStatus::Denied)
        .await
        .unwrap();
    assert_eq!(denied.state, SessionState::Active);

    let snapshot = session.settled().await.unwrap();
    assert_eq!(snapshot.last_violation, Some(ViolationKind::FullscreenExit));
}

#[tokio::test(start_paused = true)]
async fn unproctored_quiz_arms_no_watchers() {
    let h = harness(two_question_quiz());
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session.wait_for(|s| s.state.is_active()).await.unwrap();

    h.host.hide_tab();
    h.host.blur();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Active);
    assert_eq!(snapshot.violation_count, 0);
    assert_eq!(snapshot.display, DisplayStatus::NotRequested);
    assert_eq!(h.host.display_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_releases_the_display() {
    let h = harness(two_question_quiz().with_proctoring(true));
    let session = h.service.open_attempt(QUIZ, STUDENT).await.unwrap();
    session.start().unwrap();
    session
        .wait_for(|s| s.display == DisplayStatus::Exclusive)
        .await
        .unwrap();

    drop(session);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.host.display_releases(), 1);
    assert!(!h.host.is_exclusive_display());
}
