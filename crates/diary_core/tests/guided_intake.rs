mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{ScriptedProvider, ADMIN, STUDENT};
use diary_core::ai::ProviderFailureKind;
use diary_core::intake::guided::{DEADLINE_QUESTION, DESCRIPTION_QUESTION, SUBJECT_QUESTION};
use diary_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use diary_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use diary_core::{
    AdminPolicy, Difficulty, EnrichmentGateway, GuidedIntake, IntakeOutcome, IntakeStep,
    ServiceError, Store, Task,
};
use std::sync::Arc;
use std::time::Duration;

const CONVERSATION: i64 = 555;

fn intake_with(store: &Store, provider: ScriptedProvider) -> GuidedIntake {
    let gateway = EnrichmentGateway::new(Some(Arc::new(provider)), None);
    GuidedIntake::new(
        store.clone(),
        Arc::new(gateway),
        AdminPolicy::new(Some(ADMIN)),
        Duration::from_secs(600),
    )
}

fn tasks_of(store: &Store, external_id: i64) -> Vec<Task> {
    let owner = common::reload_user(store, external_id);
    store
        .with_conn(|conn| {
            SqliteTaskRepository::try_new(conn)?.list_tasks(&TaskListQuery {
                only_active: false,
                ..TaskListQuery::active_for(owner.id)
            })
        })
        .unwrap()
}

#[tokio::test]
async fn full_dialog_creates_task_even_when_classification_fails() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let intake = intake_with(
        &store,
        ScriptedProvider::failing("gemini", ProviderFailureKind::Transport),
    );

    assert_eq!(intake.begin(CONVERSATION, ADMIN).unwrap(), SUBJECT_QUESTION);
    assert!(matches!(
        intake.handle_message(CONVERSATION, ADMIN, "Math").await,
        IntakeOutcome::Prompt(q) if q == DESCRIPTION_QUESTION
    ));
    assert!(matches!(
        intake.handle_message(CONVERSATION, ADMIN, "Solve problems").await,
        IntakeOutcome::Prompt(q) if q == DEADLINE_QUESTION
    ));

    let before = Utc::now();
    let outcome = intake.handle_message(CONVERSATION, ADMIN, "2").await;
    let after = Utc::now();

    let task = match outcome {
        IntakeOutcome::Created(task) => task,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(task.subject, "Math");
    assert_eq!(task.description, "Solve problems");
    assert_eq!(task.difficulty, Difficulty::Normal);
    assert!(!task.is_completed);
    // Stored with millisecond precision.
    let slack = ChronoDuration::milliseconds(1);
    assert!(task.deadline >= before + ChronoDuration::hours(2) - slack);
    assert!(task.deadline <= after + ChronoDuration::hours(2));

    assert_eq!(intake.step(CONVERSATION), IntakeStep::Idle);
    assert_eq!(tasks_of(&store, ADMIN), vec![task]);
}

#[tokio::test]
async fn classification_answer_sets_difficulty_and_class_is_copied() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    store
        .with_conn(|conn| SqliteUserRepository::try_new(conn)?.set_class(ADMIN, "9А"))
        .unwrap();
    let provider = ScriptedProvider::always("gemini", "Hard.");
    let intake = intake_with(&store, provider);

    intake.begin(CONVERSATION, ADMIN).unwrap();
    intake.handle_message(CONVERSATION, ADMIN, "Physics").await;
    intake.handle_message(CONVERSATION, ADMIN, "Lab report").await;
    let task = match intake.handle_message(CONVERSATION, ADMIN, "24").await {
        IntakeOutcome::Created(task) => task,
        other => panic!("unexpected outcome {other:?}"),
    };

    assert_eq!(task.difficulty, Difficulty::Hard);
    assert_eq!(task.class_name.as_deref(), Some("9А"));
}

#[tokio::test]
async fn unrecognized_classification_defaults_to_normal() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "quite tricky"));

    intake.begin(CONVERSATION, ADMIN).unwrap();
    intake.handle_message(CONVERSATION, ADMIN, "Art").await;
    intake.handle_message(CONVERSATION, ADMIN, "Draw a tree").await;
    match intake.handle_message(CONVERSATION, ADMIN, "5").await {
        IntakeOutcome::Created(task) => assert_eq!(task.difficulty, Difficulty::Normal),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn non_numeric_deadline_keeps_step_and_persists_nothing() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let provider = Arc::new(ScriptedProvider::always("gemini", "easy"));
    let gateway = EnrichmentGateway::new(Some(provider.clone()), None);
    let intake = GuidedIntake::new(
        store.clone(),
        Arc::new(gateway),
        AdminPolicy::new(Some(ADMIN)),
        Duration::from_secs(600),
    );

    intake.begin(CONVERSATION, ADMIN).unwrap();
    intake.handle_message(CONVERSATION, ADMIN, "Math").await;
    intake.handle_message(CONVERSATION, ADMIN, "Solve problems").await;

    for answer in ["soon", "2.5", "-1", ""] {
        let outcome = intake.handle_message(CONVERSATION, ADMIN, answer).await;
        assert!(matches!(outcome, IntakeOutcome::Invalid(_)), "{answer:?}");
        assert_eq!(intake.step(CONVERSATION), IntakeStep::AwaitingDeadlineOffset);
    }
    assert_eq!(common::count_rows(&store, "tasks"), 0);
    assert_eq!(provider.calls(), 0);

    assert!(matches!(
        intake.handle_message(CONVERSATION, ADMIN, "3").await,
        IntakeOutcome::Created(_)
    ));
    assert_eq!(common::count_rows(&store, "tasks"), 1);
}

#[tokio::test]
async fn non_admin_cannot_start_intake() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, STUDENT);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "easy"));

    let err = intake.begin(CONVERSATION, STUDENT).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied { .. }));
    assert_eq!(intake.step(CONVERSATION), IntakeStep::Idle);
    assert!(matches!(
        intake.handle_message(CONVERSATION, STUDENT, "Math").await,
        IntakeOutcome::NotActive
    ));
    assert_eq!(common::count_rows(&store, "tasks"), 0);
}

#[tokio::test]
async fn empty_subject_is_rejected_without_advancing() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "easy"));

    intake.begin(CONVERSATION, ADMIN).unwrap();
    assert!(matches!(
        intake.handle_message(CONVERSATION, ADMIN, "   ").await,
        IntakeOutcome::Invalid(_)
    ));
    assert_eq!(intake.step(CONVERSATION), IntakeStep::AwaitingSubject);
}

#[tokio::test]
async fn cancel_discards_session() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "easy"));

    intake.begin(CONVERSATION, ADMIN).unwrap();
    intake.handle_message(CONVERSATION, ADMIN, "Math").await;
    assert!(intake.cancel(CONVERSATION, ADMIN));
    assert!(!intake.cancel(CONVERSATION, ADMIN));
    assert!(matches!(
        intake.handle_message(CONVERSATION, ADMIN, "2").await,
        IntakeOutcome::NotActive
    ));
}

#[tokio::test]
async fn only_initiator_drives_shared_conversation() {
    const GROUP: i64 = -777;
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    common::resolve(&store, STUDENT);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "hard"));

    intake.begin(GROUP, ADMIN).unwrap();
    assert!(matches!(
        intake.handle_message(GROUP, STUDENT, "Math").await,
        IntakeOutcome::NotActive
    ));
    assert_eq!(intake.step(GROUP), IntakeStep::AwaitingSubject);
    assert!(!intake.is_active_for(GROUP, STUDENT));
    assert!(intake.is_active_for(GROUP, ADMIN));

    intake.handle_message(GROUP, ADMIN, "Math").await;
    intake.handle_message(GROUP, ADMIN, "Solve problems").await;
    assert!(matches!(
        intake.handle_message(GROUP, STUDENT, "2").await,
        IntakeOutcome::NotActive
    ));
    assert!(!intake.cancel(GROUP, STUDENT));
    assert_eq!(intake.step(GROUP), IntakeStep::AwaitingDeadlineOffset);
    assert_eq!(common::count_rows(&store, "tasks"), 0);

    let task = match intake.handle_message(GROUP, ADMIN, "2").await {
        IntakeOutcome::Created(task) => task,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(task.description, "Solve problems");
    assert_eq!(tasks_of(&store, ADMIN), vec![task]);
    assert!(tasks_of(&store, STUDENT).is_empty());
}

#[tokio::test]
async fn sessions_are_independent_per_conversation() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let intake = intake_with(&store, ScriptedProvider::always("gemini", "easy"));

    intake.begin(1, ADMIN).unwrap();
    intake.begin(2, ADMIN).unwrap();
    intake.handle_message(1, ADMIN, "Math").await;

    assert_eq!(intake.step(1), IntakeStep::AwaitingDescription);
    assert_eq!(intake.step(2), IntakeStep::AwaitingSubject);
}

#[tokio::test]
async fn idle_session_expires() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, ADMIN);
    let gateway = EnrichmentGateway::new(
        Some(Arc::new(ScriptedProvider::always("gemini", "easy"))),
        None,
    );
    let intake = GuidedIntake::new(
        store.clone(),
        Arc::new(gateway),
        AdminPolicy::new(Some(ADMIN)),
        Duration::ZERO,
    );

    intake.begin(CONVERSATION, ADMIN).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(intake.evict_expired(), 1);
    assert_eq!(intake.step(CONVERSATION), IntakeStep::Idle);
}
