//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read users by external identifier or row id.
//! - Insert first-contact users and surface uniqueness conflicts as errors.
//! - Apply profile mutations (class choice, reminder bookkeeping).
//!
//! # Invariants
//! - `users.external_id` is UNIQUE; a duplicate insert fails with a
//!   constraint violation instead of creating a second row.
//! - A failed insert leaves no partial state behind.

use super::{ensure_connection_ready, from_epoch_ms, to_epoch_ms, RepoError, RepoResult};
use crate::model::user::{ExternalId, NewUser, User, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    id,
    external_id,
    username,
    full_name,
    class_name,
    xp,
    level,
    last_reminded_at
FROM users";

/// Repository interface for user records.
pub trait UserRepository {
    fn find_by_external_id(&self, external_id: ExternalId) -> RepoResult<Option<User>>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Inserts a new user with `xp=0, level=1`.
    fn insert_user(&self, user: &NewUser) -> RepoResult<User>;
    fn set_class(&self, external_id: ExternalId, class_name: &str) -> RepoResult<User>;
    fn mark_reminded(&self, external_id: ExternalId, at: DateTime<Utc>) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn find_by_external_id(&self, external_id: ExternalId) -> RepoResult<Option<User>> {
        query_one(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE external_id = ?1;"),
            external_id,
        )
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        query_one(self.conn, &format!("{USER_SELECT_SQL} WHERE id = ?1;"), id)
    }

    fn insert_user(&self, user: &NewUser) -> RepoResult<User> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO users (external_id, username, full_name, xp, level)
             VALUES (?1, ?2, ?3, 0, 1);",
            params![
                user.external_id,
                user.username.as_deref(),
                user.full_name.as_deref(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        let created = query_one(&tx, &format!("{USER_SELECT_SQL} WHERE id = ?1;"), id)?
            .ok_or_else(|| RepoError::InvalidData("inserted user missing in read-back".into()))?;
        tx.commit()?;
        Ok(created)
    }

    fn set_class(&self, external_id: ExternalId, class_name: &str) -> RepoResult<User> {
        let changed = self.conn.execute(
            "UPDATE users SET class_name = ?1 WHERE external_id = ?2;",
            params![class_name, external_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: external_id,
            });
        }
        self.find_by_external_id(external_id)?
            .ok_or(RepoError::NotFound {
                entity: "user",
                id: external_id,
            })
    }

    fn mark_reminded(&self, external_id: ExternalId, at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET last_reminded_at = ?1 WHERE external_id = ?2;",
            params![to_epoch_ms(at), external_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: external_id,
            });
        }
        Ok(())
    }
}

/// Loads one user row inside an existing connection or transaction.
pub(crate) fn load_user(conn: &Connection, id: UserId) -> RepoResult<Option<User>> {
    query_one(conn, &format!("{USER_SELECT_SQL} WHERE id = ?1;"), id)
}

fn query_one(conn: &Connection, sql: &str, key: i64) -> RepoResult<Option<User>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row([key], |row| Ok(parse_user_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let xp: i64 = row.get("xp")?;
    let xp = u32::try_from(xp)
        .map_err(|_| RepoError::InvalidData(format!("invalid xp value `{xp}` in users.xp")))?;
    let level: i64 = row.get("level")?;
    let level = u32::try_from(level).map_err(|_| {
        RepoError::InvalidData(format!("invalid level value `{level}` in users.level"))
    })?;

    let last_reminded_at = match row.get::<_, Option<i64>>("last_reminded_at")? {
        Some(value) => Some(from_epoch_ms(value, "users.last_reminded_at")?),
        None => None,
    };

    Ok(User {
        id: row.get("id")?,
        external_id: row.get("external_id")?,
        username: row.get("username")?,
        full_name: row.get("full_name")?,
        class_name: row.get("class_name")?,
        xp,
        level,
        last_reminded_at,
    })
}
