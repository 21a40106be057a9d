// Re-export needed modules for testing
pub mod config;
pub mod credentials;
pub mod error;
pub mod messenger; // Conversation synchronization engine
pub mod models;

// Re-export main types for convenience
pub use error::{Result, SyncError};
pub use messenger::{Messenger, MessengerSession};
pub use models::*;
