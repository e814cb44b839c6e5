use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::ChatBackend;
use crate::error::{Error, Result};

/// Resolves a pair of users to their one chat id.
#[derive(Clone)]
pub struct ChatCreator {
    backend: Arc<dyn ChatBackend>,
}

impl ChatCreator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Ask the backend for the pair's chat. An already existing chat is a
    /// success. `Error::Conflict` means the backend could not settle a
    /// duplicate itself; callers should re-read the chat list instead of
    /// calling this again.
    pub async fn create(&self, user_id1: Uuid, user_id2: Uuid) -> Result<Uuid> {
        if user_id1 == user_id2 {
            return Err(Error::Validation("cannot open a chat with yourself".into()));
        }

        let resp = self.backend.create_chat(user_id1, user_id2).await?;
        if resp.created {
            info!("Created chat {} for {} / {}", resp.chat_id, user_id1, user_id2);
        } else {
            debug!("Pair {} / {} already has chat {}", user_id1, user_id2, resp.chat_id);
        }
        Ok(resp.chat_id)
    }
}
