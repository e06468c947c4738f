use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, capsules)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- seq orders capsules that share a created_at by insertion.
            -- Timestamps are unix milliseconds.
            CREATE TABLE capsules (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                user_id         TEXT NOT NULL,
                creator_name    TEXT,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                latitude        REAL NOT NULL,
                longitude       REAL NOT NULL,
                location_name   TEXT,
                unlock_method   TEXT NOT NULL
                    CHECK (unlock_method IN ('immediate', 'time', 'location')),
                unlock_time     INTEGER,
                media_urls      TEXT NOT NULL DEFAULT '[]',
                status          TEXT NOT NULL DEFAULT 'sealed'
                    CHECK (status IN ('sealed', 'opened')),
                created_at      INTEGER NOT NULL,
                opened_at       INTEGER,
                CHECK ((unlock_method = 'time') = (unlock_time IS NOT NULL)),
                CHECK ((status = 'opened') = (opened_at IS NOT NULL))
            );

            CREATE INDEX idx_capsules_user
                ON capsules(user_id, created_at DESC, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (media ownership)");
        conn.execute_batch(
            "
            -- One row per uploaded blob; capsules reference it by URL.
            CREATE TABLE media (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                size        INTEGER NOT NULL,
                sha256      TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_media_user ON media(user_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
