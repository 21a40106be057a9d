// Read receipts in both directions

use log::{debug, info, warn};

use super::events::{OutboundEvent, ReadReceipt};
use super::Messenger;
use crate::error::{Result, SyncError};

impl Messenger {
    /// Mark a conversation as read.
    ///
    /// The unread count is zeroed locally before the receipt is emitted, so a
    /// query right after this call reports 0 whatever the channel does.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let contact_id = state
                .contacts
                .clear_unread(conversation_id)
                .ok_or_else(|| SyncError::ConversationNotFound(conversation_id.to_string()))?;
            let flipped = state.messages.mark_received_read(&contact_id, &self.user_id);
            debug!("Marked {} messages read in {}", flipped, conversation_id);
        }

        if let Err(e) = self.transport.emit(OutboundEvent::MarkRead {
            conversation_id: conversation_id.to_string(),
        }) {
            warn!("Read receipt for {} not sent: {}", conversation_id, e);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) async fn handle_messages_read(&self, receipt: ReadReceipt) {
        let mut state = self.state.lock().await;
        let Some(contact_id) = state
            .contacts
            .by_conversation(&receipt.conversation_id)
            .map(|contact| contact.id.clone())
        else {
            debug!("Read receipt for unknown conversation {}", receipt.conversation_id);
            return;
        };

        if receipt.user_id == self.user_id {
            // Read on another of our devices
            state.contacts.clear_unread(&receipt.conversation_id);
            state.messages.mark_received_read(&contact_id, &self.user_id);
            return;
        }

        let flipped = state.messages.mark_sent_read(&contact_id, &self.user_id);
        info!("{} read {} of our messages", receipt.user_id, flipped);
    }
}
