// Debounced professional lookup for the "new conversation" picker
// Each keystroke cancels the pending lookup, so only the last query reaches the API.

use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::api::ConversationApi;
use crate::models::Professional;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub professionals: Vec<Professional>,
    pub error: Option<String>,
}

pub struct ProfessionalSearch {
    api: Arc<dyn ConversationApi>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    results_tx: Arc<watch::Sender<SearchResults>>,
}

impl ProfessionalSearch {
    pub fn new(api: Arc<dyn ConversationApi>, debounce: Duration) -> (Self, watch::Receiver<SearchResults>) {
        let (results_tx, results_rx) = watch::channel(SearchResults::default());
        (
            ProfessionalSearch {
                api,
                debounce,
                pending: Mutex::new(None),
                results_tx: Arc::new(results_tx),
            },
            results_rx,
        )
    }

    pub fn query(&self, text: &str) {
        self.cancel();

        let query = text.trim().to_string();
        if query.is_empty() {
            let _ = self.results_tx.send(SearchResults::default());
            return;
        }

        let api = self.api.clone();
        let results_tx = self.results_tx.clone();
        let debounce = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!("Searching professionals for '{}'", query);
            let results = match api.search_professionals(&query).await {
                Ok(professionals) => SearchResults {
                    query,
                    professionals,
                    error: None,
                },
                Err(e) => {
                    warn!("Professional search failed: {}", e);
                    SearchResults {
                        query,
                        professionals: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            let _ = results_tx.send(results);
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(task);
        }
    }

    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
    }
}

impl Drop for ProfessionalSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
