use async_trait::async_trait;
use uuid::Uuid;

use campus_types::api::CreateChatResponse;
use campus_types::models::{Chat, Message, User};

use crate::error::Result;

/// The backend calls the chat core depends on. Plain request/response; there
/// is no push channel.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Chats `user_id` takes part in.
    async fn list_chats(&self, user_id: Uuid) -> Result<Vec<Chat>>;

    /// Persisted messages of a chat, oldest first.
    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>>;

    /// Find or create the chat for an unordered pair.
    async fn create_chat(&self, user_id1: Uuid, user_id2: Uuid) -> Result<CreateChatResponse>;

    /// Persist a message and return the stored record.
    async fn send_message(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message>;

    /// Users `user_id` could open a chat with.
    async fn available_users(&self, user_id: Uuid) -> Result<Vec<User>>;
}
