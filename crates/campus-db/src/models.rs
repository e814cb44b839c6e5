//! Database row types. These map directly to SQLite rows and are kept
//! separate from the campus-types API models.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub login: String,
    pub password: String,
    pub role: String,
}

/// A chat as listed for one of its participants.
pub struct ChatRow {
    pub id: String,
    pub user_low: String,
    pub user_high: String,
    pub created_at: String,
    pub last_content: Option<String>,
    pub last_time: Option<String>,
    pub peer_name: Option<String>,
    pub peer_surname: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}
