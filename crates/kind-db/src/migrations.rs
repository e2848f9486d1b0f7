use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                role        TEXT NOT NULL,
                email       TEXT NOT NULL,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE job_posts (
                id           TEXT PRIMARY KEY,
                employer_id  TEXT NOT NULL REFERENCES users(id),
                title        TEXT NOT NULL,
                description  TEXT NOT NULL,
                location     TEXT,
                salary       TEXT,
                status       TEXT NOT NULL DEFAULT 'open',
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_job_posts_status
                ON job_posts(status, created_at);

            CREATE TABLE job_applications (
                id           TEXT PRIMARY KEY,
                job_post_id  TEXT NOT NULL REFERENCES job_posts(id),
                worker_id    TEXT NOT NULL REFERENCES users(id),
                status       TEXT NOT NULL DEFAULT 'pending',
                created_at   TEXT NOT NULL,
                UNIQUE(job_post_id, worker_id)
            );

            CREATE TABLE matches (
                id                     TEXT PRIMARY KEY,
                job_post_id            TEXT NOT NULL REFERENCES job_posts(id),
                employer_id            TEXT NOT NULL REFERENCES users(id),
                worker_id              TEXT NOT NULL REFERENCES users(id),
                is_opened_by_employer  INTEGER NOT NULL DEFAULT 0,
                is_opened_by_worker    INTEGER NOT NULL DEFAULT 0,
                created_at             TEXT NOT NULL,
                UNIQUE(job_post_id, worker_id)
            );

            CREATE INDEX idx_matches_employer ON matches(employer_id);
            CREATE INDEX idx_matches_worker ON matches(worker_id);

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                match_id         TEXT REFERENCES matches(id) ON DELETE SET NULL,
                participant_one  TEXT NOT NULL,
                participant_two  TEXT NOT NULL,
                pair_key         TEXT NOT NULL,
                last_message_id  TEXT,
                last_message_at  TEXT,
                created_at       TEXT NOT NULL
            );

            -- At most one conversation per match
            CREATE UNIQUE INDEX idx_conversations_match
                ON conversations(match_id) WHERE match_id IS NOT NULL;
            CREATE INDEX idx_conversations_pair ON conversations(pair_key);
            CREATE INDEX idx_conversations_one ON conversations(participant_one);
            CREATE INDEX idx_conversations_two ON conversations(participant_two);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id        TEXT NOT NULL,
                content          TEXT NOT NULL,
                status           TEXT NOT NULL DEFAULT 'sent',
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (detached match on conversations)");
        conn.execute_batch(
            "
            BEGIN;

            ALTER TABLE conversations ADD COLUMN detached_match_id TEXT;

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
