use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'member'
                                CHECK (role IN ('member', 'trainer')),
                display_name    TEXT NOT NULL,
                avatar_url      TEXT,
                bio             TEXT,
                fitness_level   TEXT,
                interests       TEXT NOT NULL DEFAULT '[]',
                location        TEXT,
                specialties     TEXT NOT NULL DEFAULT '[]',
                certifications  TEXT NOT NULL DEFAULT '[]',
                hourly_rate     REAL,
                average_rating  REAL NOT NULL DEFAULT 0,
                rating_count    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE events (
                id                  TEXT PRIMARY KEY,
                host_id             TEXT NOT NULL REFERENCES users(id),
                name                TEXT NOT NULL,
                description         TEXT,
                activity_type       TEXT,
                starts_at           TEXT NOT NULL,
                duration_minutes    INTEGER NOT NULL,
                location            TEXT NOT NULL,
                latitude            REAL,
                longitude           REAL,
                max_participants    INTEGER NOT NULL CHECK (max_participants >= 1),
                participant_count   INTEGER NOT NULL DEFAULT 0
                                    CHECK (participant_count BETWEEN 0 AND max_participants),
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_events_starts_at ON events(starts_at);

            CREATE TABLE event_participants (
                event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                joined_at   TEXT NOT NULL,
                PRIMARY KEY (event_id, user_id)
            );

            CREATE INDEX idx_participants_user ON event_participants(user_id);

            CREATE TABLE workout_plans (
                id          TEXT PRIMARY KEY,
                creator_id  TEXT NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                description TEXT,
                difficulty  TEXT,
                exercises   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_plans_creator ON workout_plans(creator_id);

            CREATE TABLE ratings (
                id          TEXT PRIMARY KEY,
                rater_id    TEXT NOT NULL REFERENCES users(id),
                rated_id    TEXT NOT NULL REFERENCES users(id),
                score       INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
                comment     TEXT,
                created_at  TEXT NOT NULL,
                UNIQUE(rater_id, rated_id)
            );

            CREATE INDEX idx_ratings_rated ON ratings(rated_id, created_at);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                recipient_id    TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                CHECK (sender_id <> recipient_id)
            );

            CREATE INDEX idx_messages_sender ON messages(sender_id, created_at);
            CREATE INDEX idx_messages_recipient ON messages(recipient_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
