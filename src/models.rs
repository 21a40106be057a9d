use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix used for ids of messages that have not been confirmed by the server yet
pub const TEMP_ID_PREFIX: &str = "temp-";

/// One conversation, keyed by the other participant's user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub conversation_id: Option<String>, // Absent until the server creates the conversation
    pub last_message_text: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub online: bool,
}

impl Contact {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Contact {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
            conversation_id: None,
            last_message_text: String::new(),
            last_message_at: None,
            unread_count: 0,
            online: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Order,
    CustomOffer,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub attachment: Option<Attachment>,
    pub order_id: Option<String>,
    pub order_details: Option<serde_json::Value>, // Opaque order/offer payload
    pub client_id: Option<String>,                // Correlation token for optimistic sends
}

impl Message {
    /// Build an optimistic message that is shown before the server confirms it
    pub fn optimistic(
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        timestamp: DateTime<Utc>,
        client_id: String,
    ) -> Self {
        Message {
            id: format!("{}{}", TEMP_ID_PREFIX, timestamp.timestamp_millis()),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            kind: MessageKind::Text,
            timestamp,
            read: false,
            attachment: None,
            order_id: None,
            order_details: None,
            client_id: Some(client_id),
        }
    }

    pub fn is_temp(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Text used for the conversation summary line
    pub fn preview(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        match (&self.attachment, self.kind) {
            (Some(attachment), _) => attachment.name.clone(),
            (None, MessageKind::Order) => "Order".to_string(),
            (None, MessageKind::CustomOffer) => "Custom offer".to_string(),
            _ => String::new(),
        }
    }
}

/// Surfaced when someone else writes in a conversation that is not open
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub contact_id: String,
    pub conversation_id: String,
    pub sender_name: String,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professional {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
}

/// A file picked by the user, validated by the caller before upload
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
