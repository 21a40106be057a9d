use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not connected to the messaging channel")]
    NotConnected,

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("server rejected request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
