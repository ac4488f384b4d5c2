mod common;

use chrono::{Duration, Utc};
use common::{ADMIN, STUDENT};
use diary_core::repo::task_repo::{CompletionOutcome, SqliteTaskRepository};
use diary_core::service::task_service::TaskService;
use diary_core::{
    level_for, AdminPolicy, Difficulty, NewTask, ServiceError, ServiceResult, Store, Task, User,
};

fn with_tasks<T>(
    store: &Store,
    op: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> ServiceResult<T>,
) -> ServiceResult<T> {
    store.with_conn(|conn| {
        let service = TaskService::new(
            SqliteTaskRepository::try_new(conn)?,
            AdminPolicy::new(Some(ADMIN)),
        );
        op(&service)
    })
}

fn new_task(owner: &User, subject: &str, difficulty: Difficulty) -> NewTask {
    NewTask {
        user_id: owner.id,
        subject: subject.to_string(),
        description: "do it".to_string(),
        deadline: Utc::now() + Duration::hours(3),
        difficulty,
        steps: None,
        class_name: owner.class_name.clone(),
    }
}

fn seed(store: &Store, difficulty: Difficulty) -> (User, Task) {
    let owner = common::resolve(store, STUDENT);
    let task = with_tasks(store, |tasks| tasks.create(&new_task(&owner, "Math", difficulty))).unwrap();
    (owner, task)
}

#[test]
fn completing_twice_credits_once() {
    let store = Store::open_in_memory().unwrap();
    let (_, task) = seed(&store, Difficulty::Normal);

    assert!(with_tasks(&store, |tasks| tasks.complete(task.id)).unwrap());
    assert_eq!(common::reload_user(&store, STUDENT).xp, 20);

    assert!(!with_tasks(&store, |tasks| tasks.complete(task.id)).unwrap());
    assert_eq!(common::reload_user(&store, STUDENT).xp, 20);

    let outcome = with_tasks(&store, |tasks| tasks.complete_detailed(task.id)).unwrap();
    assert_eq!(outcome, CompletionOutcome::AlreadyCompleted);
}

#[test]
fn completing_missing_task_returns_false() {
    let store = Store::open_in_memory().unwrap();
    common::resolve(&store, STUDENT);

    assert!(!with_tasks(&store, |tasks| tasks.complete(9999)).unwrap());
}

#[test]
fn reward_follows_difficulty_table() {
    for (difficulty, expected) in [
        (Difficulty::Easy, 10),
        (Difficulty::Normal, 20),
        (Difficulty::Hard, 40),
    ] {
        let store = Store::open_in_memory().unwrap();
        let (_, task) = seed(&store, difficulty);

        let outcome = with_tasks(&store, |tasks| tasks.complete_detailed(task.id)).unwrap();
        match outcome {
            CompletionOutcome::Completed {
                awarded_xp, owner, ..
            } => {
                assert_eq!(awarded_xp, expected, "{difficulty}");
                assert_eq!(owner.xp, expected);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[test]
fn unknown_or_missing_stored_difficulty_credits_default() {
    let store = Store::open_in_memory().unwrap();
    let (_, legacy) = seed(&store, Difficulty::Easy);
    let (_, empty) = seed(&store, Difficulty::Easy);
    store
        .with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET difficulty = 'legendary' WHERE id = ?1;",
                [legacy.id],
            )?;
            conn.execute("UPDATE tasks SET difficulty = NULL WHERE id = ?1;", [empty.id])?;
            Ok::<_, diary_core::DbError>(())
        })
        .unwrap();

    let loaded = with_tasks(&store, |tasks| tasks.get(legacy.id)).unwrap().unwrap();
    assert_eq!(loaded.difficulty, Difficulty::Normal);

    assert!(with_tasks(&store, |tasks| tasks.complete(legacy.id)).unwrap());
    assert!(with_tasks(&store, |tasks| tasks.complete(empty.id)).unwrap());
    assert_eq!(common::reload_user(&store, STUDENT).xp, 40);
}

#[test]
fn level_tracks_accumulated_experience() {
    let store = Store::open_in_memory().unwrap();
    let owner = common::resolve(&store, STUDENT);

    for n in 1..=6 {
        let task = with_tasks(&store, |tasks| {
            tasks.create(&new_task(&owner, &format!("Task {n}"), Difficulty::Hard))
        })
        .unwrap();
        assert!(with_tasks(&store, |tasks| tasks.complete(task.id)).unwrap());

        let user = common::reload_user(&store, STUDENT);
        assert_eq!(user.xp, 40 * n);
        assert_eq!(user.level, user.xp / 100 + 1);
        assert_eq!(user.level, level_for(user.xp));
    }
    assert_eq!(common::reload_user(&store, STUDENT).level, 3);
}

#[test]
fn failed_credit_rolls_back_completion() {
    let store = Store::open_in_memory().unwrap();
    let (_, task) = seed(&store, Difficulty::Hard);
    store
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_xp BEFORE UPDATE OF xp ON users
                 BEGIN SELECT RAISE(ABORT, 'xp write rejected'); END;",
            )?;
            Ok::<_, diary_core::DbError>(())
        })
        .unwrap();

    let err = with_tasks(&store, |tasks| tasks.complete(task.id)).unwrap_err();
    assert!(matches!(err, ServiceError::StoreUnavailable(_)));

    let reloaded = with_tasks(&store, |tasks| tasks.get(task.id)).unwrap().unwrap();
    assert!(!reloaded.is_completed);
    assert_eq!(common::reload_user(&store, STUDENT).xp, 0);
}

#[test]
fn non_admin_cannot_delete_or_edit() {
    let store = Store::open_in_memory().unwrap();
    let (_, task) = seed(&store, Difficulty::Normal);

    let results = [
        with_tasks(&store, |tasks| tasks.delete(STUDENT, task.id)),
        with_tasks(&store, |tasks| tasks.update_subject(STUDENT, task.id, "Hacked")),
        with_tasks(&store, |tasks| tasks.update_description(STUDENT, task.id, "nothing")),
        with_tasks(&store, |tasks| {
            tasks.update_deadline(STUDENT, task.id, Utc::now() + Duration::days(30))
        }),
    ];
    for result in results {
        assert!(matches!(result, Err(ServiceError::PermissionDenied { .. })));
    }

    let unchanged = with_tasks(&store, |tasks| tasks.get(task.id)).unwrap().unwrap();
    assert_eq!(unchanged, task);
}

#[test]
fn admin_edits_and_deletes() {
    let store = Store::open_in_memory().unwrap();
    let (_, task) = seed(&store, Difficulty::Normal);
    let new_deadline = task.deadline + Duration::days(1);

    assert!(with_tasks(&store, |tasks| tasks.update_subject(ADMIN, task.id, " Algebra ")).unwrap());
    assert!(with_tasks(&store, |tasks| tasks.update_description(ADMIN, task.id, "ex. 7")).unwrap());
    assert!(with_tasks(&store, |tasks| tasks.update_deadline(ADMIN, task.id, new_deadline)).unwrap());

    let edited = with_tasks(&store, |tasks| tasks.get(task.id)).unwrap().unwrap();
    assert_eq!(edited.subject, "Algebra");
    assert_eq!(edited.description, "ex. 7");
    assert_eq!(edited.deadline.timestamp_millis(), new_deadline.timestamp_millis());

    let err = with_tasks(&store, |tasks| tasks.update_subject(ADMIN, task.id, "   ")).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert!(with_tasks(&store, |tasks| tasks.delete(ADMIN, task.id)).unwrap());
    assert!(!with_tasks(&store, |tasks| tasks.delete(ADMIN, task.id)).unwrap());
    assert!(!with_tasks(&store, |tasks| tasks.update_subject(ADMIN, task.id, "Gone")).unwrap());
}

#[test]
fn active_listing_is_ordered_and_excludes_completed() {
    let store = Store::open_in_memory().unwrap();
    let owner = common::resolve(&store, STUDENT);
    let other = common::resolve(&store, STUDENT + 1);
    let now = Utc::now();

    let make = |user: &User, subject: &str, hours: i64| {
        let mut task = new_task(user, subject, Difficulty::Easy);
        task.deadline = now + Duration::hours(hours);
        with_tasks(&store, |tasks| tasks.create(&task)).unwrap()
    };
    let late = make(&owner, "Late", 48);
    let soon = make(&owner, "Soon", 1);
    let done = make(&owner, "Done", 5);
    make(&other, "Someone else", 2);

    assert!(with_tasks(&store, |tasks| tasks.complete(done.id)).unwrap());

    let active = with_tasks(&store, |tasks| tasks.list_active(owner.id, true)).unwrap();
    let ids: Vec<_> = active.iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![soon.id, late.id]);

    let all = with_tasks(&store, |tasks| tasks.list_active(owner.id, false)).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn created_task_keeps_owner_class_and_steps_can_be_attached() {
    let store = Store::open_in_memory().unwrap();
    let mut owner = common::resolve(&store, STUDENT);
    owner.class_name = Some("8Б".to_string());

    let task = with_tasks(&store, |tasks| tasks.create(&new_task(&owner, "History", Difficulty::Easy)))
        .unwrap();
    assert_eq!(task.class_name.as_deref(), Some("8Б"));
    assert!(!task.is_completed);

    assert!(with_tasks(&store, |tasks| tasks.attach_steps(task.id, "1. Read\n2. Write")).unwrap());
    let reloaded = with_tasks(&store, |tasks| tasks.get(task.id)).unwrap().unwrap();
    assert_eq!(reloaded.steps.as_deref(), Some("1. Read\n2. Write"));
}
