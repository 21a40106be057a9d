// Outgoing messages and the reconciliation of incoming ones

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use super::events::{MessagePayload, OutboundEvent, OutgoingMessage};
use super::message_store::MergeOutcome;
use super::Messenger;
use crate::error::{Result, SyncError};
use crate::models::{FileUpload, Message, MessageKind, Notification};

impl Messenger {
    /// Send a text message to a contact.
    ///
    /// The message shows up at once with a `temp-` id; the server's echo later
    /// replaces it. A disconnected channel fails the call and leaves state untouched.
    pub async fn send_message(&self, contact_id: &str, content: &str) -> Result<Message> {
        let text = content.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyMessage);
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let conversation_id = state
            .contacts
            .get(contact_id)
            .and_then(|contact| contact.conversation_id.clone())
            .ok_or_else(|| SyncError::ConversationNotFound(contact_id.to_string()))?;

        if !self.transport.is_connected() {
            warn!("Cannot send to {}: event channel is down", contact_id);
            return Err(SyncError::NotConnected);
        }

        let client_id = Uuid::new_v4().to_string();
        let message = Message::optimistic(&conversation_id, &self.user_id, text, Utc::now(), client_id.clone());

        // Emit first: a failed emit must leave the store untouched.
        self.transport.emit(OutboundEvent::NewMessage(OutgoingMessage {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            kind: MessageKind::Text,
            file_url: None,
            file_name: None,
            client_id: Some(client_id),
        }))?;

        state.messages.push_optimistic(contact_id, message.clone());
        state
            .contacts
            .record_message(contact_id, &message.preview(), message.timestamp);
        debug!("Queued {} for conversation {}", message.id, conversation_id);

        Ok(message)
    }

    /// Upload a file into a contact's conversation.
    /// Nothing is shown until the upload succeeds.
    pub async fn send_file(
        &self,
        contact_id: &str,
        file: FileUpload,
        caption: Option<&str>,
    ) -> Result<Message> {
        let conversation_id = {
            let state = self.state.lock().await;
            state
                .contacts
                .get(contact_id)
                .and_then(|contact| contact.conversation_id.clone())
                .ok_or_else(|| SyncError::ConversationNotFound(contact_id.to_string()))?
        };

        let payload = self
            .api
            .upload_file(&conversation_id, file, caption.map(str::to_string))
            .await?;
        let message = payload.into_message();
        info!("Uploaded {} to conversation {}", message.id, conversation_id);

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.messages.reconcile(contact_id, message.clone());
        state
            .contacts
            .record_message(contact_id, &message.preview(), message.timestamp);
        Ok(message)
    }

    pub(crate) async fn handle_new_message(&self, payload: MessagePayload) {
        let sender_name = payload.sender_name.clone();
        let message = payload.into_message();
        let from_me = message.sender_id == self.user_id;

        let notification = {
            let mut guard = self.state.lock().await;
            let known = guard
                .contacts
                .by_conversation(&message.conversation_id)
                .map(|contact| (contact.id.clone(), contact.display_name.clone()));
            let Some((contact_id, display_name)) = known else {
                drop(guard);
                self.resync(&format!("message for unknown conversation {}", message.conversation_id))
                    .await;
                return;
            };
            let state = &mut *guard;

            let preview = message.preview();
            let outcome = state.messages.reconcile(&contact_id, message.clone());
            state
                .contacts
                .record_message(&contact_id, &preview, message.timestamp);

            if from_me || outcome != MergeOutcome::Appended {
                None
            } else {
                state.contacts.increment_unread(&contact_id);
                let is_open = state.active_contact.as_deref() == Some(contact_id.as_str());
                (!is_open).then(|| Notification {
                    contact_id,
                    conversation_id: message.conversation_id.clone(),
                    sender_name: sender_name.unwrap_or(display_name),
                    preview,
                })
            }
        };

        if !from_me {
            // A delivered message ends the sender's typing burst.
            self.presence.set(&message.conversation_id, false);
        }

        if let Some(notification) = notification {
            match self.notify_tx.try_send(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Notification channel full, dropping notification"),
                Err(TrySendError::Closed(_)) => debug!("No notification listener"),
            }
        }
    }
}
