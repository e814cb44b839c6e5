use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use campus_types::api::CreateChatResponse;
use campus_types::models::{Chat, DeliveryState, LastMessage, Message, Role, User};

use crate::backend::ChatBackend;
use crate::error::{Error, Result};

pub(crate) fn chat_between(a: Uuid, b: Uuid, last: Option<(&str, DateTime<Utc>)>) -> Chat {
    Chat {
        id: Uuid::now_v7(),
        participant_ids: [a, b],
        created_at: Utc::now(),
        last_message: last.map(|(content, time)| LastMessage {
            content: content.to_string(),
            time,
        }),
        peer_name: String::new(),
    }
}

#[derive(Default)]
struct MockState {
    chats: Vec<Chat>,
    messages: HashMap<Uuid, Vec<Message>>,
    users: Vec<User>,
    offline: bool,
    fail_sends: bool,
    conflict_next_create: bool,
    held_messages: HashMap<Uuid, Arc<Notify>>,
    held_sends: Option<Arc<Notify>>,
    list_calls: HashMap<Uuid, usize>,
    create_calls: usize,
    send_calls: usize,
}

/// In-memory backend with switches for outages, conflicts and stalled calls.
#[derive(Default)]
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn add_chat(&self, chat: Chat) {
        self.state().chats.push(chat);
    }

    pub fn add_user(&self, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            surname: String::new(),
            login: name.to_lowercase(),
            role: Role::Student,
        };
        self.state().users.push(user.clone());
        user
    }

    pub fn set_last_message(&self, chat_id: Uuid, content: &str, time: DateTime<Utc>) {
        let mut state = self.state();
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.last_message = Some(LastMessage {
                content: content.into(),
                time,
            });
        }
    }

    /// Store a message as if another client had sent it.
    pub fn add_message(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> Message {
        let message = Message {
            id: Uuid::now_v7(),
            chat_id,
            sender_id,
            content: content.into(),
            created_at: Utc::now(),
            delivery_state: DeliveryState::Confirmed,
        };
        self.state()
            .messages
            .entry(chat_id)
            .or_default()
            .push(message.clone());
        message
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    pub fn conflict_next_create(&self) {
        self.state().conflict_next_create = true;
    }

    /// Make `list_messages(chat_id)` wait until the returned gate is notified.
    pub fn hold_messages(&self, chat_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().held_messages.insert(chat_id, gate.clone());
        gate
    }

    /// Make every `send_message` wait until the returned gate is notified.
    pub fn hold_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().held_sends = Some(gate.clone());
        gate
    }

    pub fn list_calls(&self, chat_id: Uuid) -> usize {
        self.state().list_calls.get(&chat_id).copied().unwrap_or(0)
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn send_calls(&self) -> usize {
        self.state().send_calls
    }

    fn check_online(&self) -> Result<()> {
        if self.state().offline {
            return Err(Error::Network("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn list_chats(&self, user_id: Uuid) -> Result<Vec<Chat>> {
        self.check_online()?;
        Ok(self
            .state()
            .chats
            .iter()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect())
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        let gate = {
            let mut state = self.state();
            *state.list_calls.entry(chat_id).or_default() += 1;
            state.held_messages.get(&chat_id).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_online()?;
        Ok(self
            .state()
            .messages
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_chat(&self, user_id1: Uuid, user_id2: Uuid) -> Result<CreateChatResponse> {
        tokio::task::yield_now().await;
        self.check_online()?;

        let mut state = self.state();
        state.create_calls += 1;
        if std::mem::take(&mut state.conflict_next_create) {
            return Err(Error::Conflict("duplicate chat".into()));
        }
        if let Some(chat) = state.chats.iter().find(|c| c.is_between(user_id1, user_id2)) {
            return Ok(CreateChatResponse {
                chat_id: chat.id,
                created: false,
            });
        }
        let chat = chat_between(user_id1, user_id2, None);
        let chat_id = chat.id;
        state.chats.push(chat);
        Ok(CreateChatResponse {
            chat_id,
            created: true,
        })
    }

    async fn send_message(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let gate = {
            let mut state = self.state();
            state.send_calls += 1;
            state.held_sends.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_online()?;
        if self.state().fail_sends {
            return Err(Error::UnknownBackend("500 Internal Server Error".into()));
        }

        let message = self.add_message(chat_id, sender_id, content);
        self.set_last_message(chat_id, content, message.created_at);
        Ok(message)
    }

    async fn available_users(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.check_online()?;
        Ok(self
            .state()
            .users
            .iter()
            .filter(|u| u.id != user_id)
            .cloned()
            .collect())
    }
}
