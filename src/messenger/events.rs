// Event channel payloads
// Inbound events are pushed by the server, outbound events are emitted by the engine.
// Every event travels as a JSON frame: {"event": <name>, "data": <payload>}

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Attachment, Message, MessageKind};

pub mod event_names {
    pub const NEW_MESSAGE: &str = "new-message";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stop-typing";
    pub const MARK_READ: &str = "mark-read";
    pub const CONVERSATION_UPDATED: &str = "conversation-updated";
    pub const USER_ONLINE: &str = "user:online";
    pub const USER_OFFLINE: &str = "user:offline";
    pub const MESSAGES_READ: &str = "messages-read";
}

/// A message as the server describes it, both on the socket and over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_avatar: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_details: Option<Value>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl MessagePayload {
    pub fn into_message(self) -> Message {
        let attachment = self.file_url.map(|url| {
            let name = self
                .file_name
                .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());
            Attachment { url, name }
        });

        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            text: self.text,
            kind: self.kind,
            timestamp: self.timestamp,
            read: self.read,
            attachment,
            order_id: self.order_id,
            order_details: self.order_details,
            client_id: self.client_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    pub id: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPayload {
    user_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage(MessagePayload),
    Typing(TypingPayload),
    ConversationUpdated(ConversationUpdate),
    UserOnline(String),
    UserOffline(String),
    MessagesRead(ReadReceipt),
}

impl InboundEvent {
    /// Decode a named event. Unknown names yield `Ok(None)`.
    pub fn decode(name: &str, data: Value) -> Result<Option<Self>> {
        let event = match name {
            event_names::NEW_MESSAGE => InboundEvent::NewMessage(serde_json::from_value(data)?),
            event_names::TYPING => InboundEvent::Typing(serde_json::from_value(data)?),
            event_names::CONVERSATION_UPDATED => {
                InboundEvent::ConversationUpdated(serde_json::from_value(data)?)
            }
            event_names::USER_ONLINE => {
                InboundEvent::UserOnline(serde_json::from_value::<UserPayload>(data)?.user_id)
            }
            event_names::USER_OFFLINE => {
                InboundEvent::UserOffline(serde_json::from_value::<UserPayload>(data)?.user_id)
            }
            event_names::MESSAGES_READ => InboundEvent::MessagesRead(serde_json::from_value(data)?),
            other => {
                debug!("Ignoring unknown event '{}'", other);
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub conversation_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    NewMessage(OutgoingMessage),
    Typing { conversation_id: String },
    StopTyping { conversation_id: String },
    MarkRead { conversation_id: String },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::NewMessage(_) => event_names::NEW_MESSAGE,
            OutboundEvent::Typing { .. } => event_names::TYPING,
            OutboundEvent::StopTyping { .. } => event_names::STOP_TYPING,
            OutboundEvent::MarkRead { .. } => event_names::MARK_READ,
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            OutboundEvent::NewMessage(message) => &message.conversation_id,
            OutboundEvent::Typing { conversation_id }
            | OutboundEvent::StopTyping { conversation_id }
            | OutboundEvent::MarkRead { conversation_id } => conversation_id,
        }
    }

    pub fn payload(&self) -> Result<Value> {
        let payload = match self {
            OutboundEvent::NewMessage(message) => serde_json::to_value(message)?,
            OutboundEvent::Typing { conversation_id } => {
                serde_json::json!({ "conversationId": conversation_id, "isTyping": true })
            }
            OutboundEvent::StopTyping { conversation_id }
            | OutboundEvent::MarkRead { conversation_id } => {
                serde_json::json!({ "conversationId": conversation_id })
            }
        };
        Ok(payload)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

pub fn encode_frame(event: &OutboundEvent) -> Result<String> {
    let frame = Frame {
        event: event.name().to_string(),
        data: event.payload()?,
    };
    Ok(serde_json::to_string(&frame)?)
}

pub fn decode_frame(text: &str) -> Result<Option<InboundEvent>> {
    let frame: Frame = serde_json::from_str(text)?;
    InboundEvent::decode(&frame.event, frame.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_new_message_with_attachment() {
        let text = r#"{"event":"new-message","data":{
            "id":"m-1","conversationId":"c-1","senderId":"u-2","senderName":"Dana",
            "text":"","type":"image","timestamp":"2026-03-01T10:00:00Z","read":false,
            "fileUrl":"https://cdn.example/uploads/plan.png"}}"#;

        let event = decode_frame(text).unwrap().expect("known event");
        let InboundEvent::NewMessage(payload) = event else {
            panic!("expected new-message");
        };
        assert_eq!(payload.sender_name.as_deref(), Some("Dana"));

        let message = payload.into_message();
        assert_eq!(message.kind, MessageKind::Image);
        let attachment = message.attachment.expect("attachment");
        assert_eq!(attachment.name, "plan.png");
    }

    #[test]
    fn test_decode_presence_and_receipts() {
        let online = decode_frame(r#"{"event":"user:online","data":{"userId":"u-9"}}"#).unwrap();
        assert_eq!(online, Some(InboundEvent::UserOnline("u-9".to_string())));

        let read = decode_frame(r#"{"event":"messages-read","data":{"conversationId":"c-1","userId":"u-2"}}"#)
            .unwrap();
        assert_eq!(
            read,
            Some(InboundEvent::MessagesRead(ReadReceipt {
                conversation_id: "c-1".to_string(),
                user_id: "u-2".to_string(),
            }))
        );
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        assert_eq!(decode_frame(r#"{"event":"order:paid","data":{}}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(decode_frame(r#"{"event":"typing","data":{"conversationId":"c-1"}}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn test_encode_outbound_frames() {
        let send = OutboundEvent::NewMessage(OutgoingMessage {
            conversation_id: "c-1".to_string(),
            text: "hello".to_string(),
            kind: MessageKind::Text,
            file_url: None,
            file_name: None,
            client_id: Some("abc".to_string()),
        });
        let frame: Value = serde_json::from_str(&encode_frame(&send).unwrap()).unwrap();
        assert_eq!(frame["event"], "new-message");
        assert_eq!(frame["data"]["conversationId"], "c-1");
        assert_eq!(frame["data"]["type"], "text");
        assert_eq!(frame["data"]["clientId"], "abc");
        assert!(frame["data"].get("fileUrl").is_none());

        let typing = OutboundEvent::Typing { conversation_id: "c-1".to_string() };
        let frame: Value = serde_json::from_str(&encode_frame(&typing).unwrap()).unwrap();
        assert_eq!(frame["data"]["isTyping"], true);

        let stop = OutboundEvent::StopTyping { conversation_id: "c-1".to_string() };
        assert_eq!(stop.name(), "stop-typing");
    }
}
