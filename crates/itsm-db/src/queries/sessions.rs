use anyhow::Result;

use super::OptionalExt;
use crate::Database;
use crate::models::SessionRow;

impl Database {
    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        user_id: &str,
        role: &str,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, role, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, role, created_at, expires_at),
            )?;
            Ok(())
        })
    }

    /// Session joined with the owner's username. Expiry is the caller's call.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT s.id, s.user_id, u.username, s.role, s.created_at, s.expires_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.id = ?1",
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        role: row.get(3)?,
                        created_at: row.get(4)?,
                        expires_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Drop every session whose expiry is at or before `now`.
    pub fn purge_expired_sessions(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            Ok(removed)
        })
    }
}
