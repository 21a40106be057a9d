// Session lifecycle: one live event channel per logged-in identity.
// Opening a session connects the channel, starts the event pump and loads the
// directory; closing it tears all of that down again.

use log::{error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::api::{ConversationApi, HttpConversationApi};
use super::events::InboundEvent;
use super::search::{ProfessionalSearch, SearchResults};
use super::transport::{Transport, WsTransport};
use super::Messenger;
use crate::config::SyncConfig;
use crate::credentials::Credentials;
use crate::error::{Result, SyncError};
use crate::models::Notification;

pub struct MessengerSession {
    messenger: Arc<Messenger>,
    transport: Arc<dyn Transport>,
    pump: JoinHandle<()>,
    notifications: Option<mpsc::Receiver<Notification>>,
}

impl MessengerSession {
    /// Log in: connect the event channel and load conversations
    pub async fn open(config: SyncConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;
        let token = credentials
            .token()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SyncError::Config(format!("no token stored for {}", credentials.user_id)))?;

        let api = Arc::new(HttpConversationApi::new(&config, &token)?);
        let (transport, events) = WsTransport::connect(&config.socket_url, &token).await?;

        Self::start(&credentials.user_id, config, api, Arc::new(transport), events).await
    }

    /// Assemble a session from already-connected parts
    pub async fn start(
        user_id: &str,
        config: SyncConfig,
        api: Arc<dyn ConversationApi>,
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<InboundEvent>,
    ) -> Result<Self> {
        let (messenger, notifications) = Messenger::new(user_id, config, api, transport.clone());
        let messenger = Arc::new(messenger);

        // Events queue in the channel until the directory is loaded.
        if let Err(e) = messenger.load_conversations().await {
            error!("Initial conversation load failed: {}", e);
            transport.close();
            messenger.logout().await;
            return Err(e);
        }

        let pump_messenger = messenger.clone();
        let pump = tokio::spawn(async move {
            pump_messenger.run(events).await;
        });

        info!("Session opened for {}", user_id);
        Ok(MessengerSession {
            messenger,
            transport,
            pump,
            notifications: Some(notifications),
        })
    }

    pub fn messenger(&self) -> Arc<Messenger> {
        self.messenger.clone()
    }

    /// Hand out the notification stream; only the first caller gets it
    pub fn take_notifications(&mut self) -> Option<mpsc::Receiver<Notification>> {
        self.notifications.take()
    }

    pub fn professional_search(&self) -> (ProfessionalSearch, watch::Receiver<SearchResults>) {
        let debounce = self.messenger.config().search_debounce();
        ProfessionalSearch::new(self.messenger.api(), debounce)
    }

    /// Log out: stop the pump, close the channel and forget all state
    pub async fn close(self) {
        self.pump.abort();
        self.transport.close();
        self.messenger.logout().await;
        info!("Session closed for {}", self.messenger.user_id());
    }
}
