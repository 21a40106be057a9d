// Conversation summaries, kept in load order with new conversations at the head

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashSet;

use crate::models::Contact;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactDirectory {
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Replace everything with a freshly loaded list, keeping the first entry per participant
    pub fn replace_all(&mut self, contacts: Vec<Contact>) {
        let mut seen = HashSet::new();
        self.contacts = contacts
            .into_iter()
            .filter(|contact| seen.insert(contact.id.clone()))
            .collect();
    }

    pub fn get(&self, contact_id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == contact_id)
    }

    fn get_mut(&mut self, contact_id: &str) -> Option<&mut Contact> {
        self.contacts.iter_mut().find(|c| c.id == contact_id)
    }

    pub fn by_conversation(&self, conversation_id: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.conversation_id.as_deref() == Some(conversation_id))
    }

    fn by_conversation_mut(&mut self, conversation_id: &str) -> Option<&mut Contact> {
        self.contacts
            .iter_mut()
            .find(|c| c.conversation_id.as_deref() == Some(conversation_id))
    }

    /// Insert at the head unless the participant is already known; an existing
    /// contact is left as it is. Returns true when a new contact was inserted.
    pub fn insert_front(&mut self, contact: Contact) -> bool {
        if self.get(&contact.id).is_some() {
            return false;
        }
        self.contacts.insert(0, contact);
        true
    }

    /// Patch the summary line; never moves it back to an older message
    pub fn record_message(&mut self, contact_id: &str, preview: &str, at: DateTime<Utc>) {
        if let Some(contact) = self.get_mut(contact_id) {
            if contact.last_message_at.is_some_and(|last| at < last) {
                return;
            }
            contact.last_message_text = preview.to_string();
            contact.last_message_at = Some(at);
        }
    }

    /// Patch summary fields from a conversation-updated event
    pub fn apply_update(
        &mut self,
        conversation_id: &str,
        last_message: Option<String>,
        last_message_at: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(contact) = self.by_conversation_mut(conversation_id) else {
            return false;
        };
        if let Some(text) = last_message {
            contact.last_message_text = text;
        }
        if last_message_at.is_some() {
            contact.last_message_at = last_message_at;
        }
        true
    }

    pub fn set_online(&mut self, user_id: &str, online: bool) -> bool {
        match self.get_mut(user_id) {
            Some(contact) => {
                contact.online = online;
                true
            }
            None => {
                debug!("Presence for unknown user {}", user_id);
                false
            }
        }
    }

    pub fn increment_unread(&mut self, contact_id: &str) {
        if let Some(contact) = self.get_mut(contact_id) {
            contact.unread_count += 1;
        }
    }

    /// Zero the unread count of a conversation; returns the owning contact id
    pub fn clear_unread(&mut self, conversation_id: &str) -> Option<String> {
        self.by_conversation_mut(conversation_id).map(|contact| {
            contact.unread_count = 0;
            contact.id.clone()
        })
    }

    pub fn unread_total(&self) -> u32 {
        self.contacts.iter().map(|c| c.unread_count).sum()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }
}
