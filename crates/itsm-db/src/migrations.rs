use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, sessions, catalog, incidents)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE,
                password            TEXT NOT NULL,
                is_admin            INTEGER NOT NULL DEFAULT 0,
                is_tech_officer     INTEGER NOT NULL DEFAULT 0,
                is_default_officer  INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_expiry ON sessions(expires_at);

            CREATE TABLE service_lines (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE services (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                is_business     INTEGER NOT NULL DEFAULT 0,
                is_technical    INTEGER NOT NULL DEFAULT 0,
                service_line_id TEXT REFERENCES service_lines(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE incidents (
                id                  TEXT PRIMARY KEY,
                owner_id            TEXT NOT NULL REFERENCES users(id),
                responsible_user_id TEXT REFERENCES users(id),
                title               TEXT NOT NULL,
                description         TEXT NOT NULL DEFAULT '',
                status              TEXT NOT NULL DEFAULT 'Open',
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_incidents_owner ON incidents(owner_id, created_at);

            CREATE TABLE incident_services (
                incident_id TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
                service_id  TEXT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                PRIMARY KEY (incident_id, service_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (dialogs, messages)");
        conn.execute_batch(
            "
            CREATE TABLE dialogs (
                id          TEXT PRIMARY KEY,
                user1_id    TEXT NOT NULL REFERENCES users(id),
                user2_id    TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                UNIQUE(user1_id, user2_id),
                CHECK(user1_id < user2_id)
            );

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                dialog_id   TEXT NOT NULL REFERENCES dialogs(id) ON DELETE CASCADE,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_dialog ON messages(dialog_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
