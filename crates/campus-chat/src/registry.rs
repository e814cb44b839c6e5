use std::cmp::Reverse;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use campus_types::models::Chat;

use crate::backend::ChatBackend;
use crate::creator::ChatCreator;
use crate::error::{Error, Result};

#[derive(Default)]
struct RegistryState {
    user_id: Option<Uuid>,
    chats: Vec<Chat>,
    /// Number of fetches issued / newest fetch whose result was kept. A
    /// response older than the kept one is dropped.
    issued: u64,
    applied: u64,
}

/// The signed-in user's chats, most recent activity first.
pub struct ChatRegistry {
    backend: Arc<dyn ChatBackend>,
    creator: ChatCreator,
    state: RwLock<RegistryState>,
}

impl ChatRegistry {
    pub fn new(backend: Arc<dyn ChatBackend>, creator: ChatCreator) -> Self {
        Self {
            backend,
            creator,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Fetch `user_id`'s chats and order them by recency. On failure the
    /// previous list, and the user it belongs to, are kept as they were.
    pub async fn load(&self, user_id: Uuid) -> Result<Vec<Chat>> {
        let ticket = {
            let mut state = self.state.write().await;
            state.issued += 1;
            state.issued
        };

        let mut chats = match self.backend.list_chats(user_id).await {
            Ok(chats) => chats,
            Err(e) => {
                warn!("Loading chats for {} failed, keeping previous list: {}", user_id, e);
                return Err(e);
            }
        };
        sort_by_recency(&mut chats);

        let mut state = self.state.write().await;
        if ticket < state.applied {
            debug!("Dropped out-of-date chat list for {}", user_id);
            return Ok(state.chats.clone());
        }
        state.user_id = Some(user_id);
        state.applied = ticket;
        state.chats = chats;
        Ok(state.chats.clone())
    }

    /// Re-fetch the list for the user of the last successful `load`.
    pub async fn refresh(&self) -> Result<Vec<Chat>> {
        let user_id = self
            .state
            .read()
            .await
            .user_id
            .ok_or_else(|| Error::Validation("chat list was never loaded".into()))?;
        self.load(user_id).await
    }

    /// The pair's chat id, creating the chat if there is none yet. Nothing is
    /// added locally until the backend has answered with a real id.
    pub async fn find_or_create(&self, user_id: Uuid, other_id: Uuid) -> Result<Uuid> {
        if let Some(chat_id) = self.find_pair(user_id, other_id).await {
            return Ok(chat_id);
        }

        match self.creator.create(user_id, other_id).await {
            Ok(chat_id) => {
                if let Err(e) = self.load(user_id).await {
                    warn!("Chat {} created but list refresh failed: {}", chat_id, e);
                }
                Ok(chat_id)
            }
            Err(Error::Conflict(detail)) => {
                warn!("Chat creation for {} / {} conflicted, re-reading list", user_id, other_id);
                self.load(user_id).await?;
                self.find_pair(user_id, other_id)
                    .await
                    .ok_or(Error::Conflict(detail))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn chats(&self) -> Vec<Chat> {
        self.state.read().await.chats.clone()
    }

    pub async fn get(&self, chat_id: Uuid) -> Option<Chat> {
        self.state
            .read()
            .await
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
    }

    /// The loaded user's chat with `other_id`, if there is one.
    pub async fn find_by_participant(&self, other_id: Uuid) -> Option<Chat> {
        let state = self.state.read().await;
        let user_id = state.user_id?;
        state
            .chats
            .iter()
            .find(|c| c.is_between(user_id, other_id))
            .cloned()
    }

    /// Chats whose other participant's name contains `query`, ignoring case.
    /// An empty query matches everything.
    pub async fn search(&self, query: &str) -> Vec<Chat> {
        let needle = query.trim().to_lowercase();
        self.state
            .read()
            .await
            .chats
            .iter()
            .filter(|c| c.peer_name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    async fn find_pair(&self, a: Uuid, b: Uuid) -> Option<Uuid> {
        self.state
            .read()
            .await
            .chats
            .iter()
            .find(|c| c.is_between(a, b))
            .map(|c| c.id)
    }
}

/// Newest `last_message` first; chats without messages go last. Stable, so
/// ties keep the backend's order.
fn sort_by_recency(chats: &mut [Chat]) {
    chats.sort_by_key(|c| Reverse(c.last_activity()));
}
