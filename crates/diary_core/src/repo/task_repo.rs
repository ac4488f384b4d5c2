//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `tasks` storage.
//! - Run the completion transition and the experience credit as one unit.
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - `complete_task` flips `is_completed` and credits the owner's `xp`/`level`
//!   inside one IMMEDIATE transaction; either both land or neither does.
//! - A completed task is never credited twice.

use super::user_repo::load_user;
use super::{
    bool_from_db, ensure_connection_ready, from_epoch_ms, to_epoch_ms, RepoError, RepoResult,
};
use crate::model::progression::{experience_for_stored, level_for};
use crate::model::task::{validate_subject, Difficulty, NewTask, Task, TaskId};
use crate::model::user::{User, UserId};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    subject,
    description,
    deadline,
    is_completed,
    difficulty,
    steps,
    class_name
FROM tasks";

/// Query options for listing tasks of one owner.
#[derive(Debug, Clone)]
pub struct TaskListQuery {
    pub user_id: UserId,
    /// Excludes completed tasks when set.
    pub only_active: bool,
    pub limit: Option<u32>,
}

impl TaskListQuery {
    pub fn active_for(user_id: UserId) -> Self {
        Self {
            user_id,
            only_active: true,
            limit: None,
        }
    }
}

/// Result of one completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The task flipped to completed and the owner was credited.
    Completed {
        task_id: TaskId,
        awarded_xp: u32,
        owner: User,
    },
    AlreadyCompleted,
    NotFound,
}

/// Repository interface for task operations.
pub trait TaskRepository {
    fn create_task(&self, task: &NewTask) -> RepoResult<Task>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    fn complete_task(&self, id: TaskId) -> RepoResult<CompletionOutcome>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn update_subject(&self, id: TaskId, subject: &str) -> RepoResult<()>;
    fn update_description(&self, id: TaskId, description: &str) -> RepoResult<()>;
    fn update_deadline(&self, id: TaskId, deadline: DateTime<Utc>) -> RepoResult<()>;
    fn update_steps(&self, id: TaskId, steps: &str) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn update_column(&self, id: TaskId, sql: &str, value: &dyn rusqlite::ToSql) -> RepoResult<()> {
        let changed = self.conn.execute(sql, params![value, id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &NewTask) -> RepoResult<Task> {
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                user_id,
                subject,
                description,
                deadline,
                is_completed,
                difficulty,
                steps,
                class_name
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7);",
            params![
                task.user_id,
                task.subject.trim(),
                task.description.as_str(),
                to_epoch_ms(task.deadline),
                task.difficulty.as_str(),
                task.steps.as_deref(),
                task.class_name.as_deref(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_task(id)?
            .ok_or_else(|| RepoError::InvalidData("created task missing in read-back".into()))
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id], |row| Ok(parse_task_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE user_id = ?1");
        if query.only_active {
            sql.push_str(" AND is_completed = 0");
        }
        sql.push_str(" ORDER BY deadline ASC, id ASC LIMIT ?2;");
        let limit = query.limit.map_or(-1, i64::from);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![query.user_id, limit])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn complete_task(&self, id: TaskId) -> RepoResult<CompletionOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let row: Option<(UserId, i64, Option<String>)> = tx
            .query_row(
                "SELECT user_id, is_completed, difficulty FROM tasks WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((user_id, is_completed, difficulty)) = row else {
            return Ok(CompletionOutcome::NotFound);
        };
        if bool_from_db(is_completed, "tasks.is_completed")? {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        tx.execute(
            "UPDATE tasks
             SET is_completed = 1,
                 completed_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND is_completed = 0;",
            [id],
        )?;

        let owner = load_user(&tx, user_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("task {id} references missing user {user_id}"))
        })?;
        let awarded_xp = experience_for_stored(difficulty.as_deref());
        let xp = owner.xp.saturating_add(awarded_xp);
        tx.execute(
            "UPDATE users SET xp = ?1, level = ?2 WHERE id = ?3;",
            params![xp, level_for(xp), user_id],
        )?;
        tx.commit()?;

        Ok(CompletionOutcome::Completed {
            task_id: id,
            awarded_xp,
            owner: User {
                xp,
                level: level_for(xp),
                ..owner
            },
        })
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }

    fn update_subject(&self, id: TaskId, subject: &str) -> RepoResult<()> {
        validate_subject(subject)?;
        self.update_column(
            id,
            "UPDATE tasks SET subject = ?1 WHERE id = ?2;",
            &subject.trim(),
        )
    }

    fn update_description(&self, id: TaskId, description: &str) -> RepoResult<()> {
        self.update_column(
            id,
            "UPDATE tasks SET description = ?1 WHERE id = ?2;",
            &description,
        )
    }

    fn update_deadline(&self, id: TaskId, deadline: DateTime<Utc>) -> RepoResult<()> {
        self.update_column(
            id,
            "UPDATE tasks SET deadline = ?1 WHERE id = ?2;",
            &to_epoch_ms(deadline),
        )
    }

    fn update_steps(&self, id: TaskId, steps: &str) -> RepoResult<()> {
        self.update_column(id, "UPDATE tasks SET steps = ?1 WHERE id = ?2;", &steps)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;
    let difficulty = match row.get::<_, Option<String>>("difficulty")? {
        Some(value) => Difficulty::parse(&value).unwrap_or_else(|| {
            warn!("event=task_read module=repo status=coerced field=difficulty task_id={id}");
            Difficulty::default()
        }),
        None => Difficulty::default(),
    };

    Ok(Task {
        id,
        user_id: row.get("user_id")?,
        subject: row.get("subject")?,
        description: row.get("description")?,
        deadline: from_epoch_ms(row.get("deadline")?, "tasks.deadline")?,
        is_completed: bool_from_db(row.get("is_completed")?, "tasks.is_completed")?,
        difficulty,
        steps: row.get("steps")?,
        class_name: row.get("class_name")?,
    })
}
