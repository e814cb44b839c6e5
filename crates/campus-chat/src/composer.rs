use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use campus_types::models::Message;

use crate::backend::ChatBackend;
use crate::error::{Error, Result};
use crate::view::ChatView;

/// Sends messages optimistically: the message is shown as pending before the
/// request goes out, then confirmed in place or marked failed. Failed sends
/// are never retried here.
pub struct Composer {
    backend: Arc<dyn ChatBackend>,
    view: Arc<ChatView>,
}

impl Composer {
    pub fn new(backend: Arc<dyn ChatBackend>, view: Arc<ChatView>) -> Self {
        Self { backend, view }
    }

    /// Returns the persisted message. Blank content is rejected without a
    /// request; surrounding whitespace is trimmed.
    pub async fn send(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("message is empty".into()));
        }

        let pending = Message::pending(chat_id, sender_id, content.to_string(), Utc::now());
        let temp_id = pending.id;
        self.view.with_store(|store| store.push_pending(pending)).await;
        debug!("Queued message {} in chat {}", temp_id, chat_id);

        match self.backend.send_message(chat_id, sender_id, content).await {
            Ok(persisted) => {
                let stored = persisted.clone();
                self.view
                    .with_store(|store| store.confirm(chat_id, temp_id, stored))
                    .await;
                debug!("Message {} stored as {}", temp_id, persisted.id);
                Ok(persisted)
            }
            Err(e) => {
                warn!("Sending message {} to chat {} failed: {}", temp_id, chat_id, e);
                self.view
                    .with_store(|store| store.mark_failed(chat_id, temp_id))
                    .await;
                Err(e)
            }
        }
    }
}
