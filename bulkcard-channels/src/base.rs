//! Base trait for channel handlers

use async_trait::async_trait;
use bulkcard_core::bus::{InboundMessage, OutboundMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Trait for channel handlers
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Check if the channel is running
    fn is_running(&self) -> bool;

    /// Start the channel handler
    async fn start(&mut self) -> Result<()>;

    /// Stop the channel handler
    async fn stop(&mut self) -> Result<()>;

    /// Send a message, delivering the attachment as a document if present
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Set the inbound message sender
    fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>);

    /// Check if a sender is allowed
    fn is_allowed(&self, sender_id: &str) -> bool;
}

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel error: {0}")]
    Error(String),

    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Channel not running: {0}")]
    NotRunning(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Access denied for sender: {0}")]
    AccessDenied(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Shared channel handler type
pub type ChannelHandlerPtr = Arc<RwLock<dyn ChannelHandler>>;

/// Check a sender id against an allow list.
///
/// An empty list allows everyone. Compound ids (`"12345|username"`) match if
/// any part is listed.
pub fn allow_list_permits(allow_from: &[String], sender_id: &str) -> bool {
    if allow_from.is_empty() {
        return true;
    }

    if allow_from.iter().any(|a| a == sender_id) {
        return true;
    }

    if sender_id.contains('|') {
        for part in sender_id.split('|') {
            if !part.is_empty() && allow_from.iter().any(|a| a == part) {
                return true;
            }
        }
    }

    false
}
