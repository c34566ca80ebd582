use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str =
    "id, username, password, is_admin, is_tech_officer, is_default_officer, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Admin tooling only. Returns false when the user does not exist.
    pub fn set_user_roles(
        &self,
        id: &str,
        is_admin: bool,
        is_tech_officer: bool,
        is_default_officer: bool,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_admin = ?2, is_tech_officer = ?3, is_default_officer = ?4 WHERE id = ?1",
                rusqlite::params![id, is_admin, is_tech_officer, is_default_officer],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_tech_officers(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_tech_officer = 1 ORDER BY username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Staff users other than `user_id` that have no dialog with them yet.
    pub fn list_recipient_candidates(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.password, u.is_admin, u.is_tech_officer,
                        u.is_default_officer, u.created_at
                 FROM users u
                 LEFT JOIN dialogs d
                   ON (d.user1_id = u.id AND d.user2_id = ?1)
                   OR (d.user2_id = u.id AND d.user1_id = ?1)
                 WHERE u.id != ?1
                   AND (u.is_admin = 1 OR u.is_tech_officer = 1 OR u.is_default_officer = 1)
                   AND d.id IS NULL
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        is_admin: row.get(3)?,
        is_tech_officer: row.get(4)?,
        is_default_officer: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::is_constraint_violation;
    use crate::queries::test_support::{now, user};

    #[test]
    fn duplicate_username_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("a", "alice", "h1", &now()).unwrap();

        let err = db.create_user("b", "alice", "h2", &now()).unwrap_err();
        assert!(is_constraint_violation(&err));

        // Case-sensitive: a different spelling is a different user.
        db.create_user("c", "Alice", "h3", &now()).unwrap();
    }

    #[test]
    fn lookup_and_roles() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "tech", (false, true, false));

        let row = db.get_user_by_username("tech").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(row.is_tech_officer && !row.is_admin && !row.is_default_officer);

        assert!(db.get_user_by_id("missing").unwrap().is_none());
        assert!(!db.set_user_roles("missing", true, false, false).unwrap());
    }

    #[test]
    fn tech_officer_listing() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "zed", (false, true, false));
        user(&db, "amy", (true, true, false));
        user(&db, "bob", (true, false, false));

        let names: Vec<String> = db
            .list_tech_officers()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn candidates_exclude_clients_self_and_existing_dialogs() {
        let db = Database::open_in_memory().unwrap();
        let me = user(&db, "me", (false, false, false));
        let admin = user(&db, "admin", (true, false, false));
        user(&db, "officer", (false, false, true));
        user(&db, "other-client", (false, false, false));

        let names = |rows: Vec<crate::models::UserRow>| {
            rows.into_iter().map(|u| u.username).collect::<Vec<_>>()
        };

        let before = db.list_recipient_candidates(&me).unwrap();
        assert_eq!(names(before), vec!["admin", "officer"]);

        db.create_dialog("d1", &admin, &me, &now()).unwrap();
        let after = db.list_recipient_candidates(&me).unwrap();
        assert_eq!(names(after), vec!["officer"]);
    }
}
