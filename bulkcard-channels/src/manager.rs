//! Channel manager

use crate::base::{ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
use crate::telegram::TelegramHandler;
use bulkcard_core::bus::{InboundMessage, OutboundMessage};
use bulkcard_core::config::schema::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Channel manager that coordinates all channel handlers
pub struct ChannelManager {
    /// Configuration
    config: Config,
    /// Channel handlers
    handlers: RwLock<HashMap<String, ChannelHandlerPtr>>,
    /// Inbound message sender
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
}

impl ChannelManager {
    /// Create a new channel manager
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            inbound_tx: None,
        }
    }

    /// Set the inbound message sender
    pub fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.inbound_tx = Some(tx);
    }

    /// Initialize channels based on configuration
    pub async fn initialize(&self) -> Result<()> {
        let mut handlers = self.handlers.write().await;

        if self.config.channels.telegram.enabled {
            if !self.config.channels.telegram.token.is_empty() {
                let mut handler = TelegramHandler::new(&self.config.channels.telegram);
                if let Some(ref tx) = self.inbound_tx {
                    handler.set_inbound_sender(tx.clone());
                }
                handlers.insert(
                    "telegram".to_string(),
                    Arc::new(RwLock::new(handler)) as Arc<RwLock<dyn ChannelHandler>>,
                );
                tracing::info!("Telegram channel initialized");
            } else {
                tracing::warn!("Telegram channel enabled but token not configured");
            }
        }

        Ok(())
    }

    /// Start all initialized channels
    pub async fn start_all(&self) -> Result<()> {
        let handlers = self.handlers.read().await;
        for (name, handler) in handlers.iter() {
            let mut handler = handler.write().await;
            if let Err(e) = handler.start().await {
                tracing::error!("Failed to start channel {}: {}", name, e);
            }
        }
        Ok(())
    }

    /// Stop all running channels
    pub async fn stop_all(&self) -> Result<()> {
        let handlers = self.handlers.read().await;
        for (name, handler) in handlers.iter() {
            let mut handler = handler.write().await;
            if let Err(e) = handler.stop().await {
                tracing::error!("Failed to stop channel {}: {}", name, e);
            }
        }
        Ok(())
    }

    /// Send an outbound message through its channel
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&message.channel).cloned()
        };

        match handler {
            Some(handler) => handler.read().await.send(message).await,
            None => Err(ChannelError::NotConfigured(message.channel)),
        }
    }

    /// Names of initialized channels
    pub async fn channel_names(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}
