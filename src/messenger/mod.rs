// Conversation synchronization engine
// Keeps the local contact directory and message lists in step with the server's
// event stream, on top of optimistic local sends.

use futures::future::try_join_all;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as TokioMutex};

pub mod api;
pub mod contacts;
pub mod delivery;
pub mod events;
pub mod message_store;
pub mod presence;
pub mod receipts;
pub mod search;
pub mod session;
pub mod transport;
pub mod typing;

pub use api::{ConversationApi, ConversationDto, HttpConversationApi, ParticipantDto};
pub use contacts::ContactDirectory;
pub use events::{InboundEvent, MessagePayload, OutboundEvent};
pub use message_store::{MergeOutcome, MessageStore};
pub use presence::PresenceTracker;
pub use search::{ProfessionalSearch, SearchResults};
pub use session::MessengerSession;
pub use transport::{Transport, WsTransport};
pub use typing::TypingNotifier;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::{Contact, Message, Notification};

const NOTIFICATION_CHANNEL_SIZE: usize = 100;

/// Everything the engine mutates, behind one lock.
/// Handlers read, compute and write inside a single lock scope.
struct SyncState {
    contacts: ContactDirectory,
    messages: MessageStore,
    active_contact: Option<String>,
}

pub struct Messenger {
    user_id: String,
    config: SyncConfig,
    api: Arc<dyn ConversationApi>,
    transport: Arc<dyn Transport>,
    state: Arc<TokioMutex<SyncState>>,
    load_lock: TokioMutex<()>,
    presence: PresenceTracker,
    typing: TypingNotifier,
    notify_tx: mpsc::Sender<Notification>,
}

impl Messenger {
    pub fn new(
        user_id: &str,
        config: SyncConfig,
        api: Arc<dyn ConversationApi>,
        transport: Arc<dyn Transport>,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_CHANNEL_SIZE);
        let state = SyncState {
            contacts: ContactDirectory::new(),
            messages: MessageStore::new(config.match_window_ms),
            active_contact: None,
        };

        (
            Messenger {
                user_id: user_id.to_string(),
                presence: PresenceTracker::new(config.typing_expiry()),
                typing: TypingNotifier::new(transport.clone(), config.typing_auto_stop()),
                config,
                api,
                transport,
                state: Arc::new(TokioMutex::new(state)),
                load_lock: TokioMutex::new(()),
                notify_tx,
            },
            notify_rx,
        )
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn ConversationApi> {
        self.api.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    // Queries

    pub async fn contacts(&self) -> Vec<Contact> {
        self.state.lock().await.contacts.all().to_vec()
    }

    pub async fn contact(&self, contact_id: &str) -> Option<Contact> {
        self.state.lock().await.contacts.get(contact_id).cloned()
    }

    pub async fn messages(&self, contact_id: &str) -> Vec<Message> {
        self.state.lock().await.messages.messages(contact_id).to_vec()
    }

    pub async fn unread_total(&self) -> u32 {
        self.state.lock().await.contacts.unread_total()
    }

    /// The conversation the UI currently shows; no notifications are raised for it
    pub async fn set_active_contact(&self, contact_id: Option<&str>) {
        self.state.lock().await.active_contact = contact_id.map(str::to_string);
    }

    // Commands

    /// Fetch every conversation and its recent history, replacing local state.
    /// Loads run one at a time, so a later snapshot is never overwritten by an earlier one.
    pub async fn load_conversations(&self) -> Result<()> {
        let _loading = self.load_lock.lock().await;
        let conversations = self.api.list_conversations().await?;
        let limit = self.config.history_page_size;
        let histories = try_join_all(
            conversations
                .iter()
                .map(|conversation| self.api.list_messages(&conversation.id, limit)),
        )
        .await?;

        let mut contacts = Vec::with_capacity(conversations.len());
        let mut messages = HashMap::new();
        for (conversation, history) in conversations.into_iter().zip(histories) {
            let contact = conversation.into_contact();
            messages.insert(
                contact.id.clone(),
                history.into_iter().map(MessagePayload::into_message).collect(),
            );
            contacts.push(contact);
        }

        let mut state = self.state.lock().await;
        state.contacts.replace_all(contacts);
        state.messages.replace_all(messages);
        info!("Loaded {} conversations", state.contacts.len());
        Ok(())
    }

    /// Open (or reuse) the conversation with a participant and load its history
    pub async fn start_conversation(&self, participant_id: &str) -> Result<Contact> {
        let conversation = self.api.create_conversation(participant_id).await?;
        let conversation_id = conversation.id.clone();
        let history = self
            .api
            .list_messages(&conversation_id, self.config.history_page_size)
            .await?;

        let mut state = self.state.lock().await;
        let contact = conversation.into_contact();
        let contact_id = contact.id.clone();
        let inserted = state.contacts.insert_front(contact);
        if inserted {
            info!("Started conversation {} with {}", conversation_id, contact_id);
        } else {
            debug!("Conversation with {} already present", contact_id);
        }
        let same_conversation = state
            .contacts
            .get(&contact_id)
            .is_some_and(|contact| contact.conversation_id.as_deref() == Some(conversation_id.as_str()));
        if same_conversation && (inserted || state.messages.messages(&contact_id).is_empty()) {
            state.messages.set_history(
                &contact_id,
                history.into_iter().map(MessagePayload::into_message).collect(),
            );
        }

        state
            .contacts
            .get(&contact_id)
            .cloned()
            .ok_or(SyncError::ConversationNotFound(conversation_id))
    }

    /// Drop all session state; called on logout or identity change
    pub async fn logout(&self) {
        self.typing.cancel_all();
        self.presence.clear_all();
        let mut state = self.state.lock().await;
        state.contacts.clear();
        state.messages.clear();
        state.active_contact = None;
        info!("Cleared messenger state for {}", self.user_id);
    }

    // Inbound events

    /// Apply events in delivery order until the channel closes
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Event stream ended");
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::NewMessage(payload) => self.handle_new_message(payload).await,
            InboundEvent::Typing(payload) => self.handle_typing(payload).await,
            InboundEvent::ConversationUpdated(update) => {
                let mut state = self.state.lock().await;
                if !state
                    .contacts
                    .apply_update(&update.id, update.last_message, update.last_message_at)
                {
                    debug!("Update for unknown conversation {}", update.id);
                }
            }
            InboundEvent::UserOnline(user_id) => self.handle_user_status(&user_id, true).await,
            InboundEvent::UserOffline(user_id) => self.handle_user_status(&user_id, false).await,
            InboundEvent::MessagesRead(receipt) => self.handle_messages_read(receipt).await,
        }
    }

    /// Full reload after an event we could not place
    pub(crate) async fn resync(&self, reason: &str) {
        info!("Resynchronizing conversations: {}", reason);
        if let Err(e) = self.load_conversations().await {
            error!("Resynchronization failed: {}", e);
        }
    }
}
