use crate::models::{ChatRow, MessageRow, UserRow};
use crate::Database;
use anyhow::{Result, bail};
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        surname: &str,
        login: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, surname, login, password, role) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, name, surname, login, password_hash, role),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "login", login))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Every user except `user_id`, ordered by surname then name.
    pub fn list_users_except(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, surname, login, password, role FROM users
                 WHERE id != ?1
                 ORDER BY surname, name, login",
            )?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chats --

    /// Return the chat for the unordered pair `(a, b)`, creating it under `id`
    /// if none exists. The bool is true when a new row was inserted.
    ///
    /// Insert and lookup run in one transaction, so concurrent callers for the
    /// same pair always get the same id back.
    pub fn find_or_create_chat(
        &self,
        id: &str,
        a: &str,
        b: &str,
        created_at: &str,
    ) -> Result<(String, bool)> {
        if a == b {
            bail!("A chat needs two distinct participants");
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO chats (id, user_low, user_high, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, low, high, created_at),
            )?;
            let chat_id: String = tx.query_row(
                "SELECT id FROM chats WHERE user_low = ?1 AND user_high = ?2",
                (low, high),
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok((chat_id, inserted == 1))
        })
    }

    /// Participants of a chat, or `None` if the chat does not exist.
    pub fn get_chat_participants(&self, chat_id: &str) -> Result<Option<(String, String)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_low, user_high FROM chats WHERE id = ?1",
                [chat_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }

    /// All chats `user_id` takes part in, newest activity first, with the
    /// latest message and the other participant's name joined in.
    pub fn get_chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| query_chats_for_user(conn, user_id))
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        chat_id: &str,
        sender_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, chat_id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, chat_id, sender_id, content, created_at],
            )?;
            Ok(())
        })
    }

    /// The newest `limit` messages of a chat (all of them for `None`),
    /// returned oldest first.
    pub fn get_messages(&self, chat_id: &str, limit: Option<u32>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, chat_id, limit))
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        surname: row.get(2)?,
        login: row.get(3)?,
        password: row.get(4)?,
        role: row.get(5)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input.
    let sql = format!(
        "SELECT id, name, surname, login, password, role FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn query_chats_for_user(conn: &Connection, user_id: &str) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.user_low, c.user_high, c.created_at,
                lm.content, lm.created_at, u.name, u.surname
         FROM chats c
         LEFT JOIN users u
                ON u.id = CASE WHEN c.user_low = ?1 THEN c.user_high ELSE c.user_low END
         LEFT JOIN chat_messages lm
                ON lm.id = (SELECT m.id FROM chat_messages m
                            WHERE m.chat_id = c.id
                            ORDER BY m.created_at DESC, m.id DESC
                            LIMIT 1)
         WHERE c.user_low = ?1 OR c.user_high = ?1
         ORDER BY COALESCE(lm.created_at, '') DESC, c.created_at DESC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ChatRow {
                id: row.get(0)?,
                user_low: row.get(1)?,
                user_high: row.get(2)?,
                created_at: row.get(3)?,
                last_content: row.get(4)?,
                last_time: row.get(5)?,
                peer_name: row.get(6)?,
                peer_surname: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_messages(conn: &Connection, chat_id: &str, limit: Option<u32>) -> Result<Vec<MessageRow>> {
    // SQLite treats a negative LIMIT as no limit.
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT id, chat_id, sender_id, content, created_at FROM (
             SELECT id, chat_id, sender_id, content, created_at
             FROM chat_messages
             WHERE chat_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2
         )
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![chat_id, limit], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                sender_id: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
