// Per-contact message lists and the optimistic -> confirmed reconciliation

use log::debug;
use std::collections::HashMap;

use crate::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local counterpart; the message was added at the end
    Appended,
    /// An optimistic entry was swapped for the confirmed one
    ReplacedTemp,
    /// A message with the same server id (or correlation token) was refreshed in place
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageStore {
    by_contact: HashMap<String, Vec<Message>>,
    match_window_ms: i64,
}

impl MessageStore {
    pub fn new(match_window_ms: i64) -> Self {
        MessageStore {
            by_contact: HashMap::new(),
            match_window_ms,
        }
    }

    pub fn messages(&self, contact_id: &str) -> &[Message] {
        self.by_contact
            .get(contact_id)
            .map(|messages| messages.as_slice())
            .unwrap_or(&[])
    }

    /// Install a freshly fetched history, oldest first, without repeated ids
    pub fn set_history(&mut self, contact_id: &str, mut history: Vec<Message>) {
        history.sort_by_key(|m| m.timestamp);
        let mut deduped: Vec<Message> = Vec::with_capacity(history.len());
        for message in history {
            match deduped.iter_mut().find(|m| m.id == message.id) {
                Some(existing) => *existing = message,
                None => deduped.push(message),
            }
        }
        self.by_contact.insert(contact_id.to_string(), deduped);
    }

    pub fn replace_all(&mut self, histories: HashMap<String, Vec<Message>>) {
        self.by_contact.clear();
        for (contact_id, history) in histories {
            self.set_history(&contact_id, history);
        }
    }

    pub fn push_optimistic(&mut self, contact_id: &str, message: Message) {
        debug_assert!(message.is_temp());
        self.by_contact
            .entry(contact_id.to_string())
            .or_default()
            .push(message);
    }

    /// Merge a server-confirmed message into a contact's list
    pub fn reconcile(&mut self, contact_id: &str, incoming: Message) -> MergeOutcome {
        let window_ms = self.match_window_ms;
        let messages = self.by_contact.entry(contact_id.to_string()).or_default();

        let by_client_id = incoming.client_id.as_ref().and_then(|client_id| {
            messages
                .iter()
                .position(|m| m.client_id.as_deref() == Some(client_id.as_str()))
        });

        let position = by_client_id
            .or_else(|| messages.iter().position(|m| m.id == incoming.id))
            .or_else(|| messages.iter().position(|m| is_temp_match(m, &incoming, window_ms)));

        match position {
            Some(index) => {
                let outcome = if messages[index].is_temp() {
                    MergeOutcome::ReplacedTemp
                } else {
                    MergeOutcome::Updated
                };
                debug!("Message {} -> {} ({:?})", messages[index].id, incoming.id, outcome);
                messages[index] = incoming;
                outcome
            }
            None => {
                messages.push(incoming);
                MergeOutcome::Appended
            }
        }
    }

    /// The other side read our messages
    pub fn mark_sent_read(&mut self, contact_id: &str, own_id: &str) -> usize {
        self.mark_read_where(contact_id, |m| m.sender_id == own_id)
    }

    /// We read the other side's messages
    pub fn mark_received_read(&mut self, contact_id: &str, own_id: &str) -> usize {
        self.mark_read_where(contact_id, |m| m.sender_id != own_id)
    }

    fn mark_read_where(&mut self, contact_id: &str, predicate: impl Fn(&Message) -> bool) -> usize {
        let Some(messages) = self.by_contact.get_mut(contact_id) else {
            return 0;
        };
        let mut flipped = 0;
        for message in messages.iter_mut().filter(|m| !m.read && predicate(m)) {
            message.read = true;
            flipped += 1;
        }
        flipped
    }

    pub fn clear(&mut self) {
        self.by_contact.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_contact.values().all(|messages| messages.is_empty())
    }
}

fn is_temp_match(candidate: &Message, incoming: &Message, window_ms: i64) -> bool {
    candidate.is_temp()
        && candidate.sender_id == incoming.sender_id
        && candidate.text == incoming.text
        && (candidate.timestamp - incoming.timestamp).num_milliseconds().abs() < window_ms
}
