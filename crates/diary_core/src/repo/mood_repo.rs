//! Mood log repository: append and read-recent only.

use super::{ensure_connection_ready, from_epoch_ms, to_epoch_ms, RepoError, RepoResult};
use crate::model::mood::{Mood, MoodLog};
use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

/// Repository interface for the append-only mood trail.
pub trait MoodRepository {
    fn append_mood(
        &self,
        user_id: UserId,
        mood: Mood,
        load_level: u8,
        at: DateTime<Utc>,
    ) -> RepoResult<MoodLog>;
    /// Newest first.
    fn recent_moods(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<MoodLog>>;
}

pub struct SqliteMoodRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMoodRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl MoodRepository for SqliteMoodRepository<'_> {
    fn append_mood(
        &self,
        user_id: UserId,
        mood: Mood,
        load_level: u8,
        at: DateTime<Utc>,
    ) -> RepoResult<MoodLog> {
        self.conn.execute(
            "INSERT INTO mood_logs (user_id, mood, load_level, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![user_id, mood.as_str(), load_level, to_epoch_ms(at)],
        )?;
        Ok(MoodLog {
            id: self.conn.last_insert_rowid(),
            user_id,
            mood,
            load_level,
            // Round-trip through storage precision.
            created_at: from_epoch_ms(to_epoch_ms(at), "mood_logs.created_at")?,
        })
    }

    fn recent_moods(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<MoodLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, mood, load_level, created_at
             FROM mood_logs
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![user_id, limit])?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_mood_row(row)?);
        }
        Ok(logs)
    }
}

fn parse_mood_row(row: &Row<'_>) -> RepoResult<MoodLog> {
    let mood_text: String = row.get("mood")?;
    let mood = Mood::parse(&mood_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid mood `{mood_text}` in mood_logs.mood"))
    })?;
    Ok(MoodLog {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        mood,
        load_level: row.get("load_level")?,
        created_at: from_epoch_ms(row.get("created_at")?, "mood_logs.created_at")?,
    })
}
