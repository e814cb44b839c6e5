use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub login: String,
    pub role: Role,
}

impl User {
    /// "Name Surname", or the login when both are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name, self.surname);
        let full = full.trim();
        if full.is_empty() {
            self.login.clone()
        } else {
            full.to_string()
        }
    }
}

/// Snapshot of the newest message in a chat, as reported by the chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub time: DateTime<Utc>,
}

/// A two-party conversation, seen from one participant's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub participant_ids: [Uuid; 2],
    pub created_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
    /// Display name of the participant who is not the requesting user.
    #[serde(default)]
    pub peer_name: String,
}

impl Chat {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }

    /// True when the chat is between `a` and `b`, in either order.
    pub fn is_between(&self, a: Uuid, b: Uuid) -> bool {
        let [x, y] = self.participant_ids;
        (x == a && y == b) || (x == b && y == a)
    }

    /// The participant that is not `me`. Returns `None` if `me` is not in the chat.
    pub fn other_participant(&self, me: Uuid) -> Option<Uuid> {
        match self.participant_ids {
            [x, y] if x == me => Some(y),
            [x, y] if y == me => Some(x),
            _ => None,
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Shown optimistically, not yet acknowledged by the backend.
    Pending,
    #[default]
    Confirmed,
    /// Submission errored. Never retried automatically.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Client-side state only; anything read off the wire is confirmed.
    #[serde(skip, default)]
    pub delivery_state: DeliveryState,
}

impl Message {
    /// A local placeholder with a fresh temporary id.
    pub fn pending(chat_id: Uuid, sender_id: Uuid, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            sender_id,
            content,
            created_at: now,
            delivery_state: DeliveryState::Pending,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.delivery_state == DeliveryState::Confirmed
    }

    /// Display order within a chat: `created_at` ascending, then id ascending.
    pub fn display_order(a: &Message, b: &Message) -> Ordering {
        a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn chat_pair_is_unordered() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let chat = Chat {
            id: Uuid::new_v4(),
            participant_ids: [a, b],
            created_at: Utc::now(),
            last_message: None,
            peer_name: String::new(),
        };
        assert!(chat.is_between(a, b));
        assert!(chat.is_between(b, a));
        assert!(!chat.is_between(a, Uuid::new_v4()));
        assert_eq!(chat.other_participant(a), Some(b));
        assert_eq!(chat.other_participant(b), Some(a));
        assert_eq!(chat.other_participant(Uuid::new_v4()), None);
    }

    #[test]
    fn wire_messages_deserialize_as_confirmed() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "chat_id": Uuid::new_v4(),
            "sender_id": Uuid::new_v4(),
            "content": "hi",
            "created_at": "2026-10-17T10:00:00Z",
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.delivery_state, DeliveryState::Confirmed);

        let out = serde_json::to_value(&msg).unwrap();
        assert!(out.get("delivery_state").is_none());
    }

    #[test]
    fn display_order_breaks_ties_by_id() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 10, 0, 0).unwrap();
        let chat = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let mut a = Message::pending(chat, sender, "a".into(), at);
        let mut b = Message::pending(chat, sender, "b".into(), at);
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);
        assert_eq!(Message::display_order(&a, &b), Ordering::Less);
        b.created_at = at - chrono::Duration::seconds(1);
        assert_eq!(Message::display_order(&a, &b), Ordering::Greater);
    }

    #[test]
    fn role_parses_lowercase() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default().as_str(), "student");
    }

    #[test]
    fn display_name_falls_back_to_login() {
        let mut user = User {
            id: Uuid::new_v4(),
            name: "Anna".into(),
            surname: "Ivanova".into(),
            login: "anna".into(),
            role: Role::Student,
        };
        assert_eq!(user.display_name(), "Anna Ivanova");
        user.name.clear();
        user.surname.clear();
        assert_eq!(user.display_name(), "anna");
    }
}
