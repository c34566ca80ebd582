use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{DialogRow, DialogSummaryRow, MessageRow};
use crate::{Database, format_timestamp, parse_timestamp};

impl Database {
    // -- Dialogs --

    /// Find or create the dialog between two users. The pair is stored in
    /// canonical order, so `(a, b)` and `(b, a)` resolve to the same row.
    pub fn create_dialog(&self, id: &str, user_a: &str, user_b: &str, created_at: &str) -> Result<DialogRow> {
        let (user1, user2) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO dialogs (id, user1_id, user2_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, user1, user2, created_at),
            )?;
            conn.query_row(
                "SELECT id, user1_id, user2_id, created_at FROM dialogs WHERE user1_id = ?1 AND user2_id = ?2",
                (user1, user2),
                dialog_from_row,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_dialog(&self, id: &str) -> Result<Option<DialogRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user1_id, user2_id, created_at FROM dialogs WHERE id = ?1",
                [id],
                dialog_from_row,
            )
            .optional()
        })
    }

    /// Dialogs of `user_id`, each with the other participant's name.
    pub fn list_dialogs_for(&self, user_id: &str) -> Result<Vec<DialogSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, other.id, other.username, d.created_at
                 FROM dialogs d
                 JOIN users other
                   ON other.id = CASE WHEN d.user1_id = ?1 THEN d.user2_id ELSE d.user1_id END
                 WHERE d.user1_id = ?1 OR d.user2_id = ?1
                 ORDER BY d.created_at, d.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(DialogSummaryRow {
                        id: row.get(0)?,
                        counterpart_id: row.get(1)?,
                        counterpart_username: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Append a message. The stored timestamp is `now`, pushed forward by a
    /// microsecond when needed so it stays strictly after the dialog's last
    /// message. Returns the stored timestamp.
    pub fn insert_message(
        &self,
        id: &str,
        dialog_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let timestamp = next_timestamp(&tx, dialog_id, now)?;
            tx.execute(
                "INSERT INTO messages (id, dialog_id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, dialog_id, sender_id, receiver_id, content, &timestamp),
            )?;

            tx.commit()?;
            Ok(timestamp)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT m.id, m.dialog_id, m.sender_id, sender.username, m.receiver_id, m.content, m.created_at
                 FROM messages m
                 JOIN users sender ON sender.id = m.sender_id
                 WHERE m.id = ?1",
                [id],
                message_from_row,
            )
            .optional()
        })
    }

    /// Messages of a dialog in ascending time order, optionally only those
    /// strictly after `since`.
    pub fn list_messages(&self, dialog_id: &str, since: Option<&str>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.dialog_id, m.sender_id, sender.username, m.receiver_id, m.content, m.created_at
                 FROM messages m
                 JOIN users sender ON sender.id = m.sender_id
                 WHERE m.dialog_id = ?1 AND (?2 IS NULL OR m.created_at > ?2)
                 ORDER BY m.created_at ASC, m.rowid ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![dialog_id, since], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn next_timestamp(conn: &Connection, dialog_id: &str, now: DateTime<Utc>) -> Result<String> {
    let last: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM messages WHERE dialog_id = ?1",
        [dialog_id],
        |row| row.get(0),
    )?;

    let now = match last {
        Some(raw) => {
            let last = parse_timestamp(&raw)?;
            if now > last { now } else { last + Duration::microseconds(1) }
        }
        None => now,
    };
    Ok(format_timestamp(now))
}

fn dialog_from_row(row: &Row<'_>) -> rusqlite::Result<DialogRow> {
    Ok(DialogRow {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        dialog_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        receiver_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}
