use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            surname     TEXT NOT NULL,
            login       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'student',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per unordered pair: user_low < user_high always.
        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            user_low    TEXT NOT NULL REFERENCES users(id),
            user_high   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(user_low, user_high),
            CHECK(user_low < user_high)
        );

        CREATE INDEX IF NOT EXISTS idx_chats_high
            ON chats(user_high);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id),
            sender_id   TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
            ON chat_messages(chat_id, created_at, id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
