use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::ChatBackend;
use crate::view::ChatView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling(Uuid),
}

struct ActiveLoop {
    chat_id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps the active chat's message log fresh. At most one loop runs at a
/// time; starting a new one cancels the previous one first.
///
/// Fetch failures are logged and the loop carries on at the same interval.
/// There is no backoff and no failure count, so a long outage shows up only
/// as a log that stops changing.
pub struct MessagePoller {
    backend: Arc<dyn ChatBackend>,
    view: Arc<ChatView>,
    interval: Duration,
    current: Option<ActiveLoop>,
}

impl MessagePoller {
    pub fn new(backend: Arc<dyn ChatBackend>, view: Arc<ChatView>, interval: Duration) -> Self {
        Self {
            backend,
            view,
            interval,
            current: None,
        }
    }

    pub fn state(&self) -> PollerState {
        match &self.current {
            Some(active) if !active.handle.is_finished() => PollerState::Polling(active.chat_id),
            _ => PollerState::Idle,
        }
    }

    /// Make `chat_id` the active chat and poll it, fetching once right away
    /// and then every interval.
    pub async fn start(&mut self, chat_id: Uuid) {
        self.cancel_current();
        self.view.set_active(Some(chat_id)).await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.backend.clone(),
            self.view.clone(),
            chat_id,
            self.interval,
            token.clone(),
        ));

        info!("Polling chat {} every {:?}", chat_id, self.interval);
        self.current = Some(ActiveLoop {
            chat_id,
            token,
            handle,
        });
    }

    /// Stop polling and clear the active chat.
    pub async fn stop(&mut self) {
        self.cancel_current();
        self.view.set_active(None).await;
    }

    fn cancel_current(&mut self) {
        if let Some(active) = self.current.take() {
            active.token.cancel();
            debug!("Stopped polling chat {}", active.chat_id);
        }
    }
}

impl Drop for MessagePoller {
    fn drop(&mut self) {
        self.cancel_current();
    }
}

async fn run_loop(
    backend: Arc<dyn ChatBackend>,
    view: Arc<ChatView>,
    chat_id: Uuid,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // The request is allowed to finish after cancellation; its result
        // is dropped by `apply_poll`.
        match backend.list_messages(chat_id).await {
            Ok(messages) => {
                if !view.apply_poll(chat_id, &token, messages).await {
                    debug!("Discarded poll response for inactive chat {}", chat_id);
                }
            }
            Err(e) => warn!("Polling chat {} failed: {}", chat_id, e),
        }
    }
}
