use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                username     TEXT NOT NULL UNIQUE,
                password     TEXT NOT NULL,
                role         TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                profile_pic  BLOB,
                subscription INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- username is free text, not a foreign key: deleting a user
            -- leaves their history in place.
            CREATE TABLE activity_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL,
                action      TEXT NOT NULL,
                timestamp   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_activity_username ON activity_logs(username, id);

            CREATE TRIGGER activity_logs_append_only
            BEFORE UPDATE ON activity_logs
            BEGIN
                SELECT RAISE(ABORT, 'activity_logs is append-only');
            END;

            CREATE TABLE feedback (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL,
                city        TEXT NOT NULL,
                issue_type  TEXT NOT NULL,
                description TEXT,
                status      TEXT NOT NULL DEFAULT 'Pending' CHECK (status IN ('Pending', 'Resolved')),
                timestamp   TEXT NOT NULL DEFAULT (datetime('now')),
                -- author's newest activity_logs.id when the report was filed
                activity_id INTEGER
            );

            CREATE INDEX idx_feedback_status ON feedback(status);

            CREATE TRIGGER feedback_no_reopen
            BEFORE UPDATE OF status ON feedback
            WHEN OLD.status = 'Resolved' AND NEW.status <> 'Resolved'
            BEGIN
                SELECT RAISE(ABORT, 'resolved feedback cannot be reopened');
            END;

            CREATE TRIGGER feedback_no_delete
            BEFORE DELETE ON feedback
            BEGIN
                SELECT RAISE(ABORT, 'feedback cannot be deleted');
            END;

            CREATE TABLE settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Revoked session tokens and consumed reset tokens.
            CREATE TABLE spent_tokens (
                jti        TEXT PRIMARY KEY,
                purpose    TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            -- Analytical dataset, loaded externally. Never written here.
            CREATE TABLE IF NOT EXISTS air_quality (
                City  TEXT,
                Date  TEXT,
                AQI   REAL,
                PM25  REAL,
                PM10  REAL,
                NO2   REAL,
                SO2   REAL,
                CO    REAL,
                O3    REAL
            );

            CREATE TABLE forecasts (
                city          TEXT NOT NULL,
                forecast_date TEXT NOT NULL,
                predicted_aqi REAL NOT NULL,
                generated_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (city, forecast_date)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
