use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use campus_types::models::{DeliveryState, Message};

/// Merge a server snapshot with locally sent messages.
///
/// Returns every server record followed by the local entries that have no
/// server counterpart, sorted by `created_at` then id. A pending or failed
/// local entry is retired (removed from `pending`) when an unclaimed server
/// record has the same sender and content and a timestamp within `window` of
/// the local send time. A local entry already acknowledged by the backend is
/// retired once the snapshot contains its id. Each server record retires at
/// most one local entry.
///
/// This is a single stateless pass: it cannot tell whether a server record
/// existed before a pending entry was sent, so an older identical message
/// inside the window will retire a new send. `MessageStore` tracks when each
/// record first appeared and does not have that gap.
pub fn reconcile(server: &[Message], pending: &mut Vec<Message>, window: Duration) -> Vec<Message> {
    reconcile_with(server, pending, to_chrono(window), |_, _| true)
}

fn reconcile_with(
    server: &[Message],
    local: &mut Vec<Message>,
    window: chrono::Duration,
    eligible: impl Fn(&Message, &Message) -> bool,
) -> Vec<Message> {
    let server_ids: HashSet<Uuid> = server.iter().map(|m| m.id).collect();

    // Acknowledged sends claim their own server record up front, so an
    // identical pending message cannot match it as well.
    let mut claimed: HashSet<Uuid> = local
        .iter()
        .filter(|m| m.is_confirmed() && server_ids.contains(&m.id))
        .map(|m| m.id)
        .collect();

    local.retain(|entry| {
        if entry.is_confirmed() {
            return !server_ids.contains(&entry.id);
        }
        let echo = server.iter().find(|s| {
            !claimed.contains(&s.id) && is_echo(s, entry, window) && eligible(s, entry)
        });
        match echo {
            Some(s) => {
                debug!("Local message {} confirmed as {}", entry.id, s.id);
                claimed.insert(s.id);
                false
            }
            None => true,
        }
    });

    let mut merged: Vec<Message> = server
        .iter()
        .map(|m| Message {
            delivery_state: DeliveryState::Confirmed,
            ..m.clone()
        })
        .chain(local.iter().cloned())
        .collect();
    merged.sort_by(Message::display_order);
    merged
}

fn is_echo(server: &Message, local: &Message, window: chrono::Duration) -> bool {
    if server.sender_id != local.sender_id || server.content != local.content {
        return false;
    }
    let delta = server.created_at - local.created_at;
    delta <= window && delta >= -window
}

/// Windows beyond chrono's range are clamped to its maximum; `ChatConfig`
/// rejects them before they get here.
fn to_chrono(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| {
        warn!("Match window {:?} out of range, clamping", window);
        chrono::Duration::MAX
    })
}

/// True if `log` is sorted by `created_at`, ties by id.
pub fn is_display_ordered(log: &[Message]) -> bool {
    log.windows(2)
        .all(|w| Message::display_order(&w[0], &w[1]) != Ordering::Greater)
}

#[derive(Debug, Default)]
struct ChatLog {
    /// Every server record seen so far, newest snapshot winning.
    server: Vec<Message>,
    /// Pending, failed, and acknowledged-but-not-yet-polled messages.
    local: Vec<Message>,
    /// What the user sees: `server` merged with `local`.
    visible: Vec<Message>,
    /// Number of server snapshots applied so far.
    applied: u64,
    /// Server id -> snapshot number in which it first appeared.
    first_seen: HashMap<Uuid, u64>,
    /// Local id -> `applied` at the moment it was sent.
    baseline: HashMap<Uuid, u64>,
}

impl ChatLog {
    fn rebuild(&mut self, window: chrono::Duration) {
        let first_seen = &self.first_seen;
        let baseline = &self.baseline;

        // A record already on screen before the send cannot be its echo.
        self.visible = reconcile_with(&self.server, &mut self.local, window, |server, local| {
            let sent_after = baseline.get(&local.id).copied().unwrap_or(0);
            first_seen
                .get(&server.id)
                .is_some_and(|&seen| seen > sent_after)
        });

        let local = &self.local;
        self.baseline.retain(|id, _| local.iter().any(|m| m.id == *id));

        debug_assert!(is_display_ordered(&self.visible));
    }
}

/// Per-chat message logs with optimistic local entries.
///
/// Every mutation re-derives the visible log, so ordering and de-duplication
/// hold after each call, not just after a poll.
#[derive(Debug)]
pub struct MessageStore {
    logs: HashMap<Uuid, ChatLog>,
    match_window: chrono::Duration,
}

impl MessageStore {
    pub fn new(match_window: Duration) -> Self {
        Self {
            logs: HashMap::new(),
            match_window: to_chrono(match_window),
        }
    }

    /// Replace the server snapshot for `chat_id` and merge pending entries
    /// into it. Returns the new visible log.
    pub fn reconcile(&mut self, chat_id: Uuid, server_messages: Vec<Message>) -> &[Message] {
        let (server, foreign): (Vec<Message>, Vec<Message>) = server_messages
            .into_iter()
            .partition(|m| m.chat_id == chat_id);
        if !foreign.is_empty() {
            warn!("Dropped {} messages of other chats from snapshot of {}", foreign.len(), chat_id);
        }

        let log = self.logs.entry(chat_id).or_default();
        log.applied += 1;

        let applied = log.applied;
        for m in &server {
            log.first_seen.entry(m.id).or_insert(applied);
        }

        // Stored messages are never deleted, so a record missing from this
        // snapshot (a capped or stale response) stays in the log.
        let fresh: HashSet<Uuid> = server.iter().map(|m| m.id).collect();
        let mut merged: Vec<Message> = log
            .server
            .drain(..)
            .filter(|m| !fresh.contains(&m.id))
            .collect();
        merged.extend(server);
        log.server = merged;
        log.rebuild(self.match_window);
        &log.visible
    }

    /// Show a just-composed message before the backend has it.
    pub fn push_pending(&mut self, message: Message) {
        let log = self.logs.entry(message.chat_id).or_default();
        log.baseline.insert(message.id, log.applied);
        log.local.push(Message {
            delivery_state: DeliveryState::Pending,
            ..message
        });
        log.rebuild(self.match_window);
    }

    /// The backend accepted `temp_id` and stored it as `persisted`. The local
    /// entry takes over the server id and timestamp instead of a second entry
    /// being added.
    pub fn confirm(&mut self, chat_id: Uuid, temp_id: Uuid, persisted: Message) {
        let persisted = Message {
            delivery_state: DeliveryState::Confirmed,
            ..persisted
        };
        let log = self.logs.entry(chat_id).or_default();

        if let Some(entry) = log.local.iter_mut().find(|m| m.id == temp_id) {
            *entry = persisted;
        } else if log.visible.iter().all(|m| m.id != persisted.id) {
            // A poll already retired the placeholder against some other
            // record; keep the acknowledged one until a poll returns it.
            log.local.push(persisted);
        }

        log.rebuild(self.match_window);
    }

    /// Flag a pending entry as failed. Returns false if it is no longer pending.
    pub fn mark_failed(&mut self, chat_id: Uuid, temp_id: Uuid) -> bool {
        let Some(log) = self.logs.get_mut(&chat_id) else {
            return false;
        };
        let Some(entry) = log
            .local
            .iter_mut()
            .find(|m| m.id == temp_id && m.delivery_state == DeliveryState::Pending)
        else {
            return false;
        };

        entry.delivery_state = DeliveryState::Failed;
        log.rebuild(self.match_window);
        true
    }

    /// Remove a failed entry the user has dismissed.
    pub fn discard_failed(&mut self, chat_id: Uuid, temp_id: Uuid) -> bool {
        let Some(log) = self.logs.get_mut(&chat_id) else {
            return false;
        };
        let before = log.local.len();
        log.local
            .retain(|m| !(m.id == temp_id && m.delivery_state == DeliveryState::Failed));
        if log.local.len() == before {
            return false;
        }
        log.rebuild(self.match_window);
        true
    }

    pub fn messages(&self, chat_id: Uuid) -> &[Message] {
        self.logs
            .get(&chat_id)
            .map(|log| log.visible.as_slice())
            .unwrap_or_default()
    }

    /// Local entries not yet confirmed (pending or failed).
    pub fn pending(&self, chat_id: Uuid) -> Vec<Message> {
        self.logs
            .get(&chat_id)
            .map(|log| {
                log.local
                    .iter()
                    .filter(|m| !m.is_confirmed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
