use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use campus_types::models::{Chat, Message, User};

use crate::backend::ChatBackend;
use crate::composer::Composer;
use crate::config::ChatConfig;
use crate::creator::ChatCreator;
use crate::error::{Error, Result};
use crate::http::HttpBackend;
use crate::poller::{MessagePoller, PollerState};
use crate::registry::ChatRegistry;
use crate::session::Session;
use crate::view::ChatView;

/// Everything chat-related for one signed-in user.
///
/// Owns the active chat id (through the poller and view) and is the only
/// thing that changes it.
pub struct ChatClient {
    session: Session,
    backend: Arc<dyn ChatBackend>,
    view: Arc<ChatView>,
    registry: ChatRegistry,
    composer: Composer,
    poller: MessagePoller,
}

impl ChatClient {
    pub fn new(session: Session, backend: Arc<dyn ChatBackend>, config: &ChatConfig) -> Self {
        let view = Arc::new(ChatView::new(config.match_window));
        let creator = ChatCreator::new(backend.clone());

        Self {
            registry: ChatRegistry::new(backend.clone(), creator),
            composer: Composer::new(backend.clone(), view.clone()),
            poller: MessagePoller::new(backend.clone(), view.clone(), config.poll_interval),
            session,
            backend,
            view,
        }
    }

    /// Sign in over HTTP and build a client for that session.
    pub async fn connect(config: &ChatConfig, login: &str, password: &str) -> Result<Self> {
        let http = HttpBackend::new(config)?;
        let session = Session::login(&http, login, password).await?;
        let backend: Arc<dyn ChatBackend> = Arc::new(http.authorized(&session));
        Ok(Self::new(session, backend, config))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -- Chat list --

    pub async fn load_chats(&self) -> Result<Vec<Chat>> {
        self.registry.load(self.session.user_id()).await
    }

    pub async fn refresh_chats(&self) -> Result<Vec<Chat>> {
        self.registry.refresh().await
    }

    pub async fn chats(&self) -> Vec<Chat> {
        self.registry.chats().await
    }

    pub async fn search_chats(&self, query: &str) -> Vec<Chat> {
        self.registry.search(query).await
    }

    /// People the user could start a chat with.
    pub async fn available_users(&self) -> Result<Vec<User>> {
        self.backend.available_users(self.session.user_id()).await
    }

    /// Open (creating if needed) the chat with `other_id` and select it.
    pub async fn start_chat(&mut self, other_id: Uuid) -> Result<Uuid> {
        let chat_id = self
            .registry
            .find_or_create(self.session.user_id(), other_id)
            .await?;
        self.select_chat(chat_id).await;
        Ok(chat_id)
    }

    // -- Active chat --

    /// Switch to `chat_id`. Polling of the previous chat stops before this
    /// returns.
    pub async fn select_chat(&mut self, chat_id: Uuid) {
        self.poller.start(chat_id).await;
    }

    /// Leave the chat view.
    pub async fn close_chat(&mut self) {
        self.poller.stop().await;
    }

    pub async fn active_chat(&self) -> Option<Uuid> {
        self.view.active().await
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// Visible log of the active chat; empty when none is selected.
    pub async fn messages(&self) -> Vec<Message> {
        match self.view.active().await {
            Some(chat_id) => self.view.messages(chat_id).await,
            None => Vec::new(),
        }
    }

    /// Send to the active chat. On success the chat list is refreshed so the
    /// chat moves up; a failed refresh does not fail the send.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let chat_id = self
            .view
            .active()
            .await
            .ok_or_else(|| Error::Validation("no chat selected".into()))?;

        let message = self
            .composer
            .send(chat_id, self.session.user_id(), content)
            .await?;

        if let Err(e) = self.registry.refresh().await {
            debug!("Chat list refresh after send failed: {}", e);
        }
        Ok(message)
    }

    /// Drop a failed message from the active chat's log.
    pub async fn discard_failed(&self, message_id: Uuid) -> bool {
        let Some(chat_id) = self.view.active().await else {
            return false;
        };
        self.view
            .with_store(|store| store.discard_failed(chat_id, message_id))
            .await
    }

    /// Stop polling and end the session.
    pub async fn logout(mut self) {
        self.poller.stop().await;
        info!("Chat client for {} shut down", self.session.user().login);
        self.session.logout();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, chat_between};
    use campus_types::models::{DeliveryState, Role};
    use std::time::Duration;

    fn client_for(mock: &Arc<MockBackend>, user_id: Uuid) -> ChatClient {
        let user = User {
            id: user_id,
            name: "Test".into(),
            surname: "User".into(),
            login: "test".into(),
            role: Role::Student,
        };
        ChatClient::new(
            Session::new(user, "token".into()),
            mock.clone(),
            &ChatConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn send_without_selected_chat_is_rejected() {
        let mock = Arc::new(MockBackend::new());
        let client = client_for(&mock, Uuid::new_v4());
        assert!(matches!(client.send("hi").await, Err(Error::Validation(_))));
        assert_eq!(mock.send_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_then_poll_shows_one_confirmed_message() {
        let mock = Arc::new(MockBackend::new());
        let (me, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let chat = chat_between(me, peer, None);
        mock.add_chat(chat.clone());

        let mut client = client_for(&mock, me);
        client.load_chats().await.unwrap();
        client.select_chat(chat.id).await;

        client.send("hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(3100)).await;

        let log = client.messages().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].delivery_state, DeliveryState::Confirmed);
        assert_eq!(
            client.chats().await[0].last_message.as_ref().map(|m| m.content.as_str()),
            Some("hello")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_after_refresh_moves_chat_to_the_top() {
        let mock = Arc::new(MockBackend::new());
        let me = Uuid::new_v4();
        let quiet = chat_between(me, Uuid::new_v4(), None);
        let busy = chat_between(me, Uuid::new_v4(), Some(("hey", chrono::Utc::now())));
        mock.add_chat(quiet.clone());
        mock.add_chat(busy.clone());

        let mut client = client_for(&mock, me);
        assert_eq!(client.load_chats().await.unwrap()[0].id, busy.id);

        client.select_chat(quiet.id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        client.send("wake up").await.unwrap();
        assert_eq!(client.chats().await[0].id, quiet.id);
    }

    #[tokio::test(start_paused = true)]
    async fn start_chat_creates_once_and_selects_it() {
        let mock = Arc::new(MockBackend::new());
        let me = Uuid::new_v4();
        let peer = mock.add_user("Peer");
        mock.add_user("Other");

        let mut client = client_for(&mock, me);
        client.load_chats().await.unwrap();
        assert_eq!(client.available_users().await.unwrap().len(), 2);

        let first = client.start_chat(peer.id).await.unwrap();
        let second = client.start_chat(peer.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.create_calls(), 1);
        assert_eq!(client.active_chat().await, Some(first));
        assert_eq!(client.chats().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_can_be_discarded() {
        let mock = Arc::new(MockBackend::new());
        let me = Uuid::new_v4();
        let chat = chat_between(me, Uuid::new_v4(), None);
        mock.add_chat(chat.clone());
        mock.fail_sends(true);

        let mut client = client_for(&mock, me);
        client.select_chat(chat.id).await;
        assert!(client.send("hello").await.is_err());

        let failed = client.messages().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].delivery_state, DeliveryState::Failed);

        assert!(client.discard_failed(failed[0].id).await);
        assert!(client.messages().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_and_logout_stop_polling() {
        let mock = Arc::new(MockBackend::new());
        let me = Uuid::new_v4();
        let chat = chat_between(me, Uuid::new_v4(), None);
        mock.add_chat(chat.clone());

        let mut client = client_for(&mock, me);
        client.select_chat(chat.id).await;
        assert_eq!(client.poller_state(), PollerState::Polling(chat.id));

        client.close_chat().await;
        assert_eq!(client.poller_state(), PollerState::Idle);
        assert_eq!(client.active_chat().await, None);
        assert!(client.messages().await.is_empty());

        client.select_chat(chat.id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let calls = mock.list_calls(chat.id);
        client.logout().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.list_calls(chat.id), calls);
    }
}
