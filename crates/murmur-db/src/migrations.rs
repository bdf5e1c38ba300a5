use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (conversations, messages, receipts, typing, reactions)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE profiles (
                id              TEXT PRIMARY KEY,
                display_name    TEXT,
                handle          TEXT,
                avatar_ref      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- pair_key is set only for direct conversations: the two member
            -- ids sorted and joined with ':'.
            CREATE TABLE conversations (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL CHECK (kind IN ('direct', 'group')),
                name            TEXT,
                avatar_ref      TEXT,
                pair_key        TEXT,
                created_by      TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                last_message_at TEXT
            );

            CREATE UNIQUE INDEX idx_conversations_pair
                ON conversations(pair_key) WHERE pair_key IS NOT NULL;

            CREATE TABLE conversation_participants (
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES profiles(id),
                role            TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'member')),
                joined_at       TEXT NOT NULL,
                left_at         TEXT,
                muted_until     TEXT
            );

            CREATE UNIQUE INDEX idx_participants_active
                ON conversation_participants(conversation_id, user_id) WHERE left_at IS NULL;

            CREATE INDEX idx_participants_user
                ON conversation_participants(user_id, left_at);

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                conversation_id     TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id           TEXT NOT NULL REFERENCES profiles(id),
                content             TEXT,
                message_type        TEXT NOT NULL
                    CHECK (message_type IN ('text', 'image', 'video', 'file', 'voice')),
                media_ref           TEXT,
                media_thumbnail_ref TEXT,
                file_name           TEXT,
                file_size           INTEGER,
                duration_seconds    INTEGER,
                reply_to_id         TEXT REFERENCES messages(id) ON DELETE SET NULL,
                forwarded_from_id   TEXT,
                is_pinned           INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                deleted_at          TEXT
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE message_reads (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES profiles(id),
                read_at     TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            CREATE INDEX idx_message_reads_user
                ON message_reads(user_id);

            CREATE TABLE typing_indicators (
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES profiles(id),
                is_typing       INTEGER NOT NULL DEFAULT 0,
                updated_at      TEXT NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE TABLE message_reactions (
                id          TEXT PRIMARY KEY,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES profiles(id),
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(message_id, user_id, emoji)
            );

            CREATE INDEX idx_reactions_message
                ON message_reactions(message_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (profile presence)");
        conn.execute_batch(
            "
            BEGIN;

            ALTER TABLE profiles ADD COLUMN last_seen TEXT;
            ALTER TABLE profiles ADD COLUMN is_online INTEGER NOT NULL DEFAULT 0;

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }
}
