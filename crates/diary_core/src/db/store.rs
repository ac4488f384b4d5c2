//! Shared connection handle for async callers.
//!
//! # Responsibility
//! - Own one migrated SQLite connection behind a mutex.
//! - Lend it to synchronous repository code in short critical sections.
//!
//! # Invariants
//! - The lock is never held across an `.await`; callers pass a closure that
//!   runs to completion on the current thread.
//! - Every handle cloned from one `Store` shares the same connection.

use super::{open_db, open_db_in_memory, DbError, DbResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Cloneable handle to one migrated SQLite connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (and migrates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens (and migrates) a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `op` with exclusive access to the connection.
    ///
    /// # Errors
    /// - Returns `DbError::LockPoisoned` (converted into `E`) when a previous
    ///   holder panicked.
    /// - Otherwise returns whatever `op` returns.
    pub fn with_conn<T, E>(&self, op: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let guard = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        op(&guard)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
