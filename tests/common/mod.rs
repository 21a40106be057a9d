// Common test utilities for integration tests
// In-memory stand-ins for the event channel and the HTTP API, plus payload builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::LevelFilter;
use tokio::sync::mpsc;

use marketchat::config::SyncConfig;
use marketchat::messenger::{
    ConversationApi, ConversationDto, MessagePayload, Messenger, OutboundEvent, ParticipantDto,
    Transport,
};
use marketchat::models::{FileUpload, MessageKind, Notification, Professional};
use marketchat::{Result, SyncError};

pub const ME: &str = "buyer-1";

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// Records every emitted event instead of writing to a socket
pub struct RecordingTransport {
    connected: AtomicBool,
    emitted: Mutex<Vec<OutboundEvent>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport {
            connected: AtomicBool::new(true),
            emitted: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.emitted().iter().filter(|event| event.name() == name).count()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.emitted.lock().unwrap().push(event);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Canned HTTP API with call counters
#[derive(Default)]
pub struct ScriptedApi {
    conversations: Mutex<Vec<ConversationDto>>,
    messages: Mutex<HashMap<String, Vec<MessagePayload>>>,
    professionals: Mutex<Vec<Professional>>,
    upload_response: Mutex<Option<MessagePayload>>,
    slow_history: Mutex<Option<(StdDuration, Vec<MessagePayload>)>>,
    failing: AtomicBool,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub search_queries: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation, replacing any earlier one with the same participant
    pub fn add_conversation(&self, conversation: ConversationDto, history: Vec<MessagePayload>) {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), history);
        let mut conversations = self.conversations.lock().unwrap();
        conversations.retain(|existing| existing.participant.id != conversation.participant.id);
        conversations.push(conversation);
    }

    /// The next history fetch waits `delay`, then answers with `stale`
    pub fn delay_next_history(&self, delay: StdDuration, stale: Vec<MessagePayload>) {
        *self.slow_history.lock().unwrap() = Some((delay, stale));
    }

    pub fn set_professionals(&self, professionals: Vec<Professional>) {
        *self.professionals.lock().unwrap() = professionals;
    }

    pub fn set_upload_response(&self, payload: MessagePayload) {
        *self.upload_response.lock().unwrap() = Some(payload);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.search_queries.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationApi for ScriptedApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationDto>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn list_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<MessagePayload>> {
        self.check()?;
        let slow = self.slow_history.lock().unwrap().take();
        if let Some((delay, stale)) = slow {
            tokio::time::sleep(delay).await;
            return Ok(stale);
        }
        let history = self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let skip = history.len().saturating_sub(limit);
        Ok(history.into_iter().skip(skip).collect())
    }

    async fn create_conversation(&self, participant_id: &str) -> Result<ConversationDto> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let existing = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|conversation| conversation.participant.id == participant_id)
            .cloned();
        if let Some(conversation) = existing {
            return Ok(conversation);
        }
        let conversation = conversation_dto(&format!("conv-{}", participant_id), participant_id, "New Pro");
        self.add_conversation(conversation.clone(), Vec::new());
        Ok(conversation)
    }

    async fn upload_file(
        &self,
        conversation_id: &str,
        file: FileUpload,
        caption: Option<String>,
    ) -> Result<MessagePayload> {
        self.check()?;
        if let Some(payload) = self.upload_response.lock().unwrap().clone() {
            return Ok(payload);
        }
        let mut payload = message_payload("file-1", conversation_id, ME, &caption.unwrap_or_default(), at_ms(0));
        payload.kind = MessageKind::File;
        payload.file_url = Some(format!("https://cdn.example/{}", file.name));
        payload.file_name = Some(file.name);
        Ok(payload)
    }

    async fn search_professionals(&self, query: &str) -> Result<Vec<Professional>> {
        self.search_queries.lock().unwrap().push(query.to_string());
        self.check()?;
        let needle = query.to_lowercase();
        Ok(self
            .professionals
            .lock()
            .unwrap()
            .iter()
            .filter(|pro| pro.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

/// Fixed reference instant plus an offset in milliseconds
pub fn at_ms(offset_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_760_000_000_000).unwrap() + Duration::milliseconds(offset_ms)
}

pub fn conversation_dto(id: &str, participant_id: &str, name: &str) -> ConversationDto {
    ConversationDto {
        id: id.to_string(),
        participant: ParticipantDto {
            id: participant_id.to_string(),
            display_name: name.to_string(),
            avatar_url: None,
        },
        last_message: None,
        last_message_at: None,
        unread_count: 0,
        online: false,
    }
}

pub fn message_payload(
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    text: &str,
    timestamp: DateTime<Utc>,
) -> MessagePayload {
    MessagePayload {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: None,
        sender_avatar: None,
        text: text.to_string(),
        kind: MessageKind::Text,
        timestamp,
        read: false,
        file_url: None,
        file_name: None,
        order_id: None,
        order_details: None,
        client_id: None,
    }
}

/// An API with one conversation: buyer-1 <-> pro-1 in conv-1
pub fn api_with_one_conversation() -> Arc<ScriptedApi> {
    let api = Arc::new(ScriptedApi::new());
    api.add_conversation(
        conversation_dto("conv-1", "pro-1", "Paula Painter"),
        vec![message_payload("m-1", "conv-1", "pro-1", "Hello there", at_ms(-60_000))],
    );
    api
}

pub struct Harness {
    pub messenger: Messenger,
    pub notifications: mpsc::Receiver<Notification>,
    pub api: Arc<ScriptedApi>,
    pub transport: Arc<RecordingTransport>,
}

/// A messenger for buyer-1 with its conversations already loaded
pub async fn loaded_messenger(api: Arc<ScriptedApi>) -> Harness {
    setup_logging();
    let transport = Arc::new(RecordingTransport::new());
    let (messenger, notifications) =
        Messenger::new(ME, SyncConfig::default(), api.clone(), transport.clone());
    messenger.load_conversations().await.unwrap();
    Harness {
        messenger,
        notifications,
        api,
        transport,
    }
}
