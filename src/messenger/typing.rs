// Outgoing typing notifications
// Every keystroke re-arms the auto-stop timer; if the user goes quiet the timer
// emits stop-typing on their behalf, once.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::events::OutboundEvent;
use super::transport::Transport;
use super::Messenger;
use crate::error::{Result, SyncError};

#[derive(Default)]
struct AutoStopTimers {
    pending: HashMap<String, (u64, JoinHandle<()>)>,
    next_generation: u64,
}

pub struct TypingNotifier {
    transport: Arc<dyn Transport>,
    timers: Arc<Mutex<AutoStopTimers>>,
    auto_stop: Duration,
}

impl TypingNotifier {
    pub fn new(transport: Arc<dyn Transport>, auto_stop: Duration) -> Self {
        TypingNotifier {
            transport,
            timers: Arc::new(Mutex::new(AutoStopTimers::default())),
            auto_stop,
        }
    }

    pub fn start(&self, conversation_id: &str) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.transport.emit(OutboundEvent::Typing {
            conversation_id: conversation_id.to_string(),
        })?;
        self.arm(conversation_id);
        Ok(())
    }

    pub fn stop(&self, conversation_id: &str) -> Result<()> {
        self.cancel(conversation_id);
        if !self.transport.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.transport.emit(OutboundEvent::StopTyping {
            conversation_id: conversation_id.to_string(),
        })
    }

    fn arm(&self, conversation_id: &str) {
        let Ok(mut timers) = self.timers.lock() else {
            return;
        };
        let generation = timers.next_generation;
        timers.next_generation += 1;

        let shared = self.timers.clone();
        let transport = self.transport.clone();
        let auto_stop = self.auto_stop;
        let key = conversation_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(auto_stop).await;
            let still_current = match shared.lock() {
                Ok(mut timers) => {
                    let current = timers.pending.get(&key).map(|(g, _)| *g) == Some(generation);
                    if current {
                        timers.pending.remove(&key);
                    }
                    current
                }
                Err(_) => false,
            };
            if still_current {
                debug!("Auto-stopping typing in {}", key);
                if let Err(e) = transport.emit(OutboundEvent::StopTyping { conversation_id: key }) {
                    debug!("Could not emit auto stop-typing: {}", e);
                }
            }
        });

        if let Some((_, previous)) = timers
            .pending
            .insert(conversation_id.to_string(), (generation, handle))
        {
            previous.abort();
        }
    }

    fn cancel(&self, conversation_id: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some((_, handle)) = timers.pending.remove(conversation_id) {
                handle.abort();
            }
        }
    }

    pub fn cancel_all(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (_, (_, handle)) in timers.pending.drain() {
                handle.abort();
            }
        }
    }
}

impl Messenger {
    /// Tell the other participant whether we are typing in a conversation
    pub fn set_typing(&self, conversation_id: &str, is_typing: bool) -> Result<()> {
        if is_typing {
            self.typing.start(conversation_id)
        } else {
            self.typing.stop(conversation_id)
        }
    }
}
