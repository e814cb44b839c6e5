use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use campus_types::models::Message;

use crate::store::MessageStore;

struct ViewState {
    active: Option<Uuid>,
    store: MessageStore,
}

/// The selected chat and the message logs behind it.
///
/// Poll results go through `apply_poll`, which checks the response's chat tag
/// against the active chat and writes under a single lock acquisition, so a
/// late response for a chat the user has left can never land.
pub struct ChatView {
    state: RwLock<ViewState>,
}

impl ChatView {
    pub fn new(match_window: Duration) -> Self {
        Self {
            state: RwLock::new(ViewState {
                active: None,
                store: MessageStore::new(match_window),
            }),
        }
    }

    pub async fn active(&self) -> Option<Uuid> {
        self.state.read().await.active
    }

    pub(crate) async fn set_active(&self, chat_id: Option<Uuid>) {
        self.state.write().await.active = chat_id;
    }

    /// Apply a poll response tagged `chat_id`. Returns false, leaving the
    /// view untouched, if the loop was cancelled or another chat is active.
    pub(crate) async fn apply_poll(
        &self,
        chat_id: Uuid,
        token: &CancellationToken,
        messages: Vec<Message>,
    ) -> bool {
        let mut state = self.state.write().await;
        if token.is_cancelled() || state.active != Some(chat_id) {
            return false;
        }
        state.store.reconcile(chat_id, messages);
        true
    }

    /// Run `f` against the store. Used for local edits (optimistic sends),
    /// which are not subject to the active-chat check.
    pub(crate) async fn with_store<R>(&self, f: impl FnOnce(&mut MessageStore) -> R) -> R {
        f(&mut self.state.write().await.store)
    }

    /// Visible log of `chat_id`.
    pub async fn messages(&self, chat_id: Uuid) -> Vec<Message> {
        self.state.read().await.store.messages(chat_id).to_vec()
    }

    pub async fn pending(&self, chat_id: Uuid) -> Vec<Message> {
        self.state.read().await.store.pending(chat_id)
    }
}
