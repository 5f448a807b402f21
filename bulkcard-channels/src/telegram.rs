//! Telegram channel integration

use crate::base::{allow_list_permits, ChannelError, ChannelHandler, Result};
use async_trait::async_trait;
use bulkcard_core::bus::{InboundMessage, OutboundMessage};
use bulkcard_core::config::schema::TelegramConfig;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::prelude::*;
use teloxide::types::{BotCommand, InputFile};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Telegram channel handler
///
/// Forwards every text message, commands included, to the inbound queue;
/// the collector engine owns command classification.
pub struct TelegramHandler {
    /// Channel name
    name: String,
    /// Bot token
    token: String,
    /// Allowed senders
    allow_from: Vec<String>,
    /// Proxy URL (optional)
    #[allow(dead_code)]
    proxy: Option<String>,
    /// Bot instance
    bot: Option<Bot>,
    /// Running state
    running: bool,
    /// Inbound message sender
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
    /// Dispatcher handle
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl TelegramHandler {
    /// Create a new Telegram handler from config
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            name: "telegram".to_string(),
            token: config.token.clone(),
            allow_from: config.allow_from.clone(),
            proxy: config.proxy.clone(),
            bot: None,
            running: false,
            inbound_tx: None,
            dispatcher_handle: None,
        }
    }
}

#[async_trait]
impl ChannelHandler for TelegramHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&mut self) -> Result<()> {
        if self.token.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Telegram token not configured".to_string(),
            ));
        }

        if self.running {
            return Ok(());
        }

        tracing::info!("Starting Telegram bot (polling mode)...");

        let bot = Bot::new(&self.token);

        // Set up command menu
        let commands = vec![
            BotCommand::new("start", "Show the welcome message"),
            BotCommand::new("bulk", "Start collecting contacts"),
            BotCommand::new("saved", "Export collected contacts as a .vcf file"),
        ];

        if let Err(e) = bot.set_my_commands(commands).await {
            tracing::warn!("Failed to set bot commands: {}", e);
        }

        match bot.get_me().await {
            Ok(me) => {
                let username = me.username.clone().unwrap_or_else(|| "unknown".to_string());
                tracing::info!("Telegram bot @{} connected", username);
            }
            Err(e) => {
                return Err(ChannelError::ApiError(format!(
                    "Failed to get bot info: {}",
                    e
                )));
            }
        }

        self.bot = Some(bot.clone());
        self.running = true;

        let inbound_tx = self.inbound_tx.clone();
        let allow_from = self.allow_from.clone();
        let name = self.name.clone();

        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let inbound_tx = inbound_tx.clone();
            let allow_from = allow_from.clone();
            let name = name.clone();

            async move {
                let Some(user) = msg.from.clone() else {
                    return Ok(());
                };

                let chat_id = msg.chat.id;
                let user_id = user.id.0;
                let sender_id = if let Some(ref username) = user.username {
                    format!("{}|{}", user_id, username)
                } else {
                    user_id.to_string()
                };

                if !allow_list_permits(&allow_from, &sender_id) {
                    tracing::warn!(
                        "Access denied for sender {} on channel {}",
                        sender_id,
                        name
                    );
                    return Ok(());
                }

                let Some(text) = msg.text() else {
                    // Non-text updates carry nothing to classify.
                    return Ok(());
                };

                if let Some(tx) = inbound_tx {
                    let inbound_msg =
                        InboundMessage::new(name, sender_id, chat_id.0.to_string(), text)
                            .with_metadata("message_id", msg.id.0)
                            .with_metadata("first_name", user.first_name.clone());

                    if let Err(e) = tx.send(inbound_msg).await {
                        tracing::error!("Failed to send inbound message: {}", e);
                    }
                }

                Ok::<(), teloxide::RequestError>(())
            }
        });

        let dispatcher_handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler)
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await;
        });

        self.dispatcher_handle = Some(dispatcher_handle);

        tracing::info!("Telegram bot started successfully");

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        tracing::info!("Stopping Telegram bot...");

        if let Some(handle) = self.dispatcher_handle.take() {
            handle.abort();
        }

        self.bot = None;
        self.running = false;

        tracing::info!("Telegram bot stopped");

        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let bot = self
            .bot
            .as_ref()
            .ok_or_else(|| ChannelError::NotRunning("Telegram bot not running".to_string()))?;

        let chat_id: i64 = message
            .chat_id
            .parse()
            .map_err(|_| ChannelError::Error(format!("Invalid chat_id: {}", message.chat_id)))?;

        if let Some(attachment) = message.attachment {
            let document =
                InputFile::memory(attachment.bytes).file_name(attachment.filename.clone());

            if let Err(e) = bot.send_document(ChatId(chat_id), document).await {
                // The session is already finalized; tell the user instead of
                // failing silently.
                tracing::error!("Failed to deliver {}: {}", attachment.filename, e);
                let _ = bot
                    .send_message(ChatId(chat_id), format!("An error occurred: {}", e))
                    .await;
                return Err(ChannelError::SendFailed(e.to_string()));
            }
        }

        if !message.content.is_empty() {
            bot.send_message(ChatId(chat_id), &message.content)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        }

        Ok(())
    }

    fn set_inbound_sender(&mut self, tx: mpsc::Sender<InboundMessage>) {
        self.inbound_tx = Some(tx);
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        allow_list_permits(&self.allow_from, sender_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_handler_new() {
        let config = TelegramConfig {
            enabled: true,
            token: "test_token".to_string(),
            allow_from: vec!["user1".to_string()],
            proxy: None,
        };

        let handler = TelegramHandler::new(&config);
        assert_eq!(handler.name(), "telegram");
        assert!(!handler.is_running());
    }

    #[test]
    fn test_telegram_handler_is_allowed() {
        let config = TelegramConfig {
            enabled: true,
            token: "test_token".to_string(),
            allow_from: vec!["user1".to_string(), "12345".to_string()],
            proxy: None,
        };

        let handler = TelegramHandler::new(&config);
        assert!(handler.is_allowed("user1"));
        assert!(handler.is_allowed("12345|user1"));
        assert!(!handler.is_allowed("unknown"));
    }

    #[tokio::test]
    async fn test_start_without_token_fails() {
        let mut handler = TelegramHandler::new(&TelegramConfig::default());
        let err = handler.start().await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_send_without_running_bot_fails() {
        let handler = TelegramHandler::new(&TelegramConfig {
            enabled: true,
            token: "test_token".to_string(),
            allow_from: vec![],
            proxy: None,
        });

        let msg = OutboundMessage::new("telegram", "12345", "hello");
        let err = handler.send(msg).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotRunning(_)));
    }
}
