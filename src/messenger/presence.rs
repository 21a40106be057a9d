// Typing and online presence of the other participant
// Typing flags decay on their own: a dropped stop-typing event must not leave a
// conversation showing "typing" forever.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::events::TypingPayload;
use super::Messenger;

struct TypingEntry {
    generation: u64,
    expiry: JoinHandle<()>,
}

#[derive(Default)]
struct PresenceState {
    typing: HashMap<String, TypingEntry>,
    next_generation: u64,
}

/// conversation id -> "the other participant is typing"
#[derive(Clone)]
pub struct PresenceTracker {
    state: Arc<Mutex<PresenceState>>,
    expiry: Duration,
}

impl PresenceTracker {
    pub fn new(expiry: Duration) -> Self {
        PresenceTracker {
            state: Arc::new(Mutex::new(PresenceState::default())),
            expiry,
        }
    }

    pub fn set(&self, conversation_id: &str, is_typing: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if !is_typing {
            if let Some(entry) = state.typing.remove(conversation_id) {
                entry.expiry.abort();
            }
            return;
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let shared = self.state.clone();
        let expiry = self.expiry;
        let key = conversation_id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            if let Ok(mut state) = shared.lock() {
                if state.typing.get(&key).map(|e| e.generation) == Some(generation) {
                    state.typing.remove(&key);
                    debug!("Typing flag for {} expired", key);
                }
            }
        });

        if let Some(previous) = state
            .typing
            .insert(conversation_id.to_string(), TypingEntry { generation, expiry: timer })
        {
            previous.expiry.abort();
        }
    }

    pub fn is_typing(&self, conversation_id: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.typing.contains_key(conversation_id))
            .unwrap_or(false)
    }

    pub fn clear_all(&self) {
        if let Ok(mut state) = self.state.lock() {
            for (_, entry) in state.typing.drain() {
                entry.expiry.abort();
            }
        }
    }
}

impl Messenger {
    pub(crate) async fn handle_typing(&self, payload: TypingPayload) {
        if payload.user_id == self.user_id {
            return;
        }

        let known = {
            let state = self.state.lock().await;
            state.contacts.by_conversation(&payload.conversation_id).is_some()
        };
        if !known {
            debug!("Typing event for unknown conversation {}", payload.conversation_id);
            return;
        }

        debug!(
            "{} {} typing in {}",
            payload.user_id,
            if payload.is_typing { "started" } else { "stopped" },
            payload.conversation_id
        );
        self.presence.set(&payload.conversation_id, payload.is_typing);
    }

    pub(crate) async fn handle_user_status(&self, user_id: &str, online: bool) {
        let mut state = self.state.lock().await;
        if state.contacts.set_online(user_id, online) {
            info!("{} is now {}", user_id, if online { "online" } else { "offline" });
        }
    }

    /// Whether the participant of this contact is currently typing
    pub async fn is_typing(&self, contact_id: &str) -> bool {
        let conversation_id = {
            let state = self.state.lock().await;
            state
                .contacts
                .get(contact_id)
                .and_then(|contact| contact.conversation_id.clone())
        };
        conversation_id
            .map(|id| self.presence.is_typing(&id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_flag_expires_without_stop_event() {
        let tracker = PresenceTracker::new(Duration::from_secs(5));
        tracker.set("c-1", true);
        assert!(tracker.is_typing("c-1"));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(tracker.is_typing("c-1"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!tracker.is_typing("c-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_typing_extends_expiry() {
        let tracker = PresenceTracker::new(Duration::from_secs(5));
        tracker.set("c-1", true);
        tokio::time::sleep(Duration::from_secs(4)).await;
        tracker.set("c-1", true);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(tracker.is_typing("c-1"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!tracker.is_typing("c-1"));
    }

    #[tokio::test]
    async fn test_stop_clears_immediately() {
        let tracker = PresenceTracker::new(Duration::from_secs(5));
        tracker.set("c-1", true);
        tracker.set("c-2", true);
        tracker.set("c-1", false);
        assert!(!tracker.is_typing("c-1"));
        assert!(tracker.is_typing("c-2"));

        tracker.clear_all();
        assert!(!tracker.is_typing("c-2"));
    }
}
