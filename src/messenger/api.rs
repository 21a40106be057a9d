// HTTP side of the messenger: history, conversation creation, uploads and search

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::events::MessagePayload;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::{Contact, FileUpload, Professional};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "avatar")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: String,
    pub participant: ParticipantDto,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub online: bool,
}

impl ConversationDto {
    pub fn into_contact(self) -> Contact {
        Contact {
            id: self.participant.id,
            display_name: self.participant.display_name,
            avatar_url: self.participant.avatar_url,
            conversation_id: Some(self.id),
            last_message_text: self.last_message.unwrap_or_default(),
            last_message_at: self.last_message_at,
            unread_count: self.unread_count,
            online: self.online,
        }
    }
}

#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<ConversationDto>>;

    /// Newest `limit` messages of a conversation
    async fn list_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<MessagePayload>>;

    async fn create_conversation(&self, participant_id: &str) -> Result<ConversationDto>;

    async fn upload_file(
        &self,
        conversation_id: &str,
        file: FileUpload,
        caption: Option<String>,
    ) -> Result<MessagePayload>;

    async fn search_professionals(&self, query: &str) -> Result<Vec<Professional>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest<'a> {
    participant_id: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extract the human-readable part of an error response body
pub fn server_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = server_error_message(&body);
        warn!("Request rejected with {}: {}", status.as_u16(), message);
        return Err(SyncError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

pub struct HttpConversationApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpConversationApi {
    pub fn new(config: &SyncConfig, token: &str) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(HttpConversationApi {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationDto>> {
        let response = self
            .client
            .get(self.url("/conversations"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let conversations: Vec<ConversationDto> = read_json(response).await?;
        info!("Fetched {} conversations", conversations.len());
        Ok(conversations)
    }

    async fn list_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<MessagePayload>> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .query(&[("limit", limit)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let messages: Vec<MessagePayload> = read_json(response).await?;
        debug!("Fetched {} messages for conversation {}", messages.len(), conversation_id);
        Ok(messages)
    }

    async fn create_conversation(&self, participant_id: &str) -> Result<ConversationDto> {
        let response = self
            .client
            .post(self.url("/conversations"))
            .bearer_auth(&self.token)
            .json(&CreateConversationRequest { participant_id })
            .send()
            .await?;
        read_json(response).await
    }

    async fn upload_file(
        &self,
        conversation_id: &str,
        file: FileUpload,
        caption: Option<String>,
    ) -> Result<MessagePayload> {
        info!("Uploading {} ({} bytes) to conversation {}", file.name, file.bytes.len(), conversation_id);
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.mime_type)?;

        let mut form = multipart::Form::new().part("file", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption);
        }

        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/upload", conversation_id)))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn search_professionals(&self, query: &str) -> Result<Vec<Professional>> {
        let response = self
            .client
            .get(self.url("/professionals/search"))
            .query(&[("q", query)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message() {
        assert_eq!(server_error_message(r#"{"message":"Conversation not allowed"}"#), "Conversation not allowed");
        assert_eq!(server_error_message(r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(server_error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_conversation_into_contact() {
        let dto: ConversationDto = serde_json::from_str(
            r#"{"id":"c-4","participant":{"id":"pro-1","name":"Ana Builder","avatar":"https://img/a.png"},
                "lastMessage":"See you Monday","lastMessageAt":"2026-02-10T08:30:00Z","unreadCount":2,"online":true}"#,
        )
        .unwrap();

        let contact = dto.into_contact();
        assert_eq!(contact.id, "pro-1");
        assert_eq!(contact.display_name, "Ana Builder");
        assert_eq!(contact.conversation_id.as_deref(), Some("c-4"));
        assert_eq!(contact.last_message_text, "See you Monday");
        assert_eq!(contact.unread_count, 2);
        assert!(contact.online);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = SyncConfig {
            api_base_url: "https://market.example/api/".to_string(),
            ..SyncConfig::default()
        };
        let api = HttpConversationApi::new(&config, "t").unwrap();
        assert_eq!(api.url("/conversations"), "https://market.example/api/conversations");
    }
}
