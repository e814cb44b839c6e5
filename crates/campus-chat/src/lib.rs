//! Campus chat synchronization core.
//!
//! Keeps a signed-in user's conversation list and the message log of the
//! selected conversation current by polling the backend:
//! - `ChatRegistry`: conversation list ordered by recency
//! - `MessagePoller`: one cancellable poll loop for the active chat
//! - `MessageStore`: per-chat log merging server records with optimistic sends
//! - `ChatCreator`: idempotent pair → chat id resolution
//! - `Composer`: validated, optimistic message sending
//! - `ChatClient`: owns the above for one `Session`

pub mod backend;
pub mod client;
pub mod composer;
pub mod config;
pub mod creator;
pub mod error;
pub mod http;
pub mod poller;
pub mod registry;
pub mod session;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::ChatBackend;
pub use client::ChatClient;
pub use composer::Composer;
pub use config::ChatConfig;
pub use creator::ChatCreator;
pub use error::{Error, Result};
pub use http::HttpBackend;
pub use poller::{MessagePoller, PollerState};
pub use registry::ChatRegistry;
pub use session::Session;
pub use store::{MessageStore, reconcile};
pub use view::ChatView;

pub use campus_types::models::{Chat, DeliveryState, LastMessage, Message, Role, User};
