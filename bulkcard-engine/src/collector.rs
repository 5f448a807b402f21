//! Collector engine: the per-chat bulk-collection state machine

use bulkcard_core::bus::{FileAttachment, InboundMessage, MessageBus, OutboundMessage};
use bulkcard_core::contact::{parse_contact_line, NAME_TAG};
use bulkcard_core::vcard::{export_filename, render_vcards};
use bulkcard_core::{Error, SessionStore};
use std::sync::Arc;
use tracing::{debug, error, info};

const CMD_START: &str = "/start";
const CMD_BULK: &str = "/bulk";
const CMD_SAVED: &str = "/saved";

const REPLY_WELCOME: &str = "Hello! Use /bulk to start collecting contacts.";
const REPLY_BULK_STARTED: &str =
    "Bulk mode activated. Send contacts in the format: Name +Number. Use /saved to finish.";
const REPLY_FORMAT_HINT: &str = "Please send in the format: Name +Number";
const REPLY_NOTHING_TO_SAVE: &str =
    "No contacts to save. Use /bulk to start adding contacts.";
const REPLY_SAVED: &str = "All contacts have been saved in a single .vcf file and sent.";

/// Extract a command token from a message, if it is one.
///
/// Telegram clients may suffix commands with the bot mention
/// (`/saved@SomeBot`); the mention is stripped before matching.
fn command_of(content: &str) -> Option<&str> {
    let first = content.trim().split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    Some(first.split('@').next().unwrap_or(first))
}

/// The collector engine drives the Idle/Collecting state machine
///
/// A chat is Collecting exactly while its session entry exists in the store.
/// While Collecting, every non-command line is interpreted as a contact
/// entry; while Idle, non-command lines are ignored.
pub struct CollectorEngine {
    bus: MessageBus,
    store: Arc<SessionStore>,
}

impl CollectorEngine {
    /// Create a new engine over a bus and session store
    pub fn new(bus: MessageBus, store: Arc<SessionStore>) -> Self {
        Self { bus, store }
    }

    /// Run the engine until the bus closes
    pub async fn run(&self) -> bulkcard_core::Result<()> {
        info!("Collector engine started");

        let Some(mut inbound_rx) = self.bus.take_inbound_receiver().await else {
            error!("Failed to take inbound receiver");
            return Err(Error::Channel("Inbound receiver already taken".to_string()));
        };

        loop {
            match tokio::time::timeout(std::time::Duration::from_secs(1), inbound_rx.recv()).await
            {
                Ok(Some(msg)) => {
                    debug!("Received message from {}:{}", msg.channel, msg.chat_id);
                    match self.process_inbound_message(msg).await {
                        Ok(replies) => {
                            for reply in replies {
                                if let Err(e) = self.bus.publish_outbound(reply) {
                                    error!("Failed to publish reply: {}", e);
                                }
                            }
                        }
                        Err(e) => {
                            error!("Error processing message: {}", e);
                        }
                    }
                }
                Ok(None) => {
                    info!("Message bus closed, stopping collector engine");
                    break;
                }
                Err(_) => {
                    // Timeout, continue
                    continue;
                }
            }
        }

        info!("Collector engine stopped");
        Ok(())
    }

    /// Process a single inbound message.
    ///
    /// Returns the outbound messages to deliver for it: zero (ignored line),
    /// one (reply text) or two (vCard document plus confirmation).
    pub async fn process_inbound_message(
        &self,
        msg: InboundMessage,
    ) -> bulkcard_core::Result<Vec<OutboundMessage>> {
        let key = msg.session_key();

        match command_of(&msg.content) {
            Some(CMD_START) => Ok(vec![self.reply(&msg, REPLY_WELCOME)]),
            Some(CMD_BULK) => {
                self.store.begin(&key).await;
                info!("Bulk collection started for {}", key);
                Ok(vec![self.reply(&msg, REPLY_BULK_STARTED)])
            }
            Some(CMD_SAVED) => self.finalize(&msg, &key).await,
            // Unknown commands fall through to contact classification while
            // collecting; while idle they belong to other handlers.
            _ => self.collect(&msg, &key).await,
        }
    }

    /// Finalize a session: drain, render and deliver the vCard file.
    async fn finalize(
        &self,
        msg: &InboundMessage,
        key: &str,
    ) -> bulkcard_core::Result<Vec<OutboundMessage>> {
        let records = match self.store.drain(key).await {
            Ok(records) => records,
            Err(Error::SessionNotFound(_)) | Err(Error::EmptySession(_)) => {
                return Ok(vec![self.reply(msg, REPLY_NOTHING_TO_SAVE)]);
            }
            Err(e) => return Err(e),
        };

        info!("Exporting {} contacts for {}", records.len(), key);

        // The session is already finalized at this point; a failed delivery
        // downstream surfaces as an error notice, not a restored session.
        let rendered = render_vcards(&records);
        let attachment = FileAttachment::new(export_filename(&msg.chat_id), rendered.into_bytes());

        Ok(vec![
            self.reply(msg, "").with_attachment(attachment),
            self.reply(msg, REPLY_SAVED),
        ])
    }

    /// Handle a non-command line against the session state.
    async fn collect(
        &self,
        msg: &InboundMessage,
        key: &str,
    ) -> bulkcard_core::Result<Vec<OutboundMessage>> {
        if !self.store.is_active(key).await {
            // Idle: not ours to answer.
            return Ok(Vec::new());
        }

        let record = match parse_contact_line(&msg.content) {
            Ok(record) => record,
            Err(reason) => {
                debug!("Line rejected for {}: {}", key, reason);
                return Ok(vec![self.reply(msg, REPLY_FORMAT_HINT)]);
            }
        };

        let shown_name = record
            .display_name
            .strip_prefix(&format!("{} ", NAME_TAG))
            .unwrap_or(&record.display_name)
            .to_string();
        let number = record.number.clone();

        match self.store.append(key, record).await {
            Ok(()) => Ok(vec![
                self.reply(msg, format!("Added: {} {}", shown_name, number))
            ]),
            Err(Error::SessionNotFound(_)) => {
                // Classified as Collecting without a store entry. Should not
                // happen under correct sequencing; drop the line.
                error!("Session entry vanished mid-collect for {}", key);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn reply(&self, msg: &InboundMessage, content: impl Into<String>) -> OutboundMessage {
        OutboundMessage::new(&msg.channel, &msg.chat_id, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CollectorEngine {
        CollectorEngine::new(MessageBus::new(), Arc::new(SessionStore::new()))
    }

    fn inbound(content: &str) -> InboundMessage {
        InboundMessage::new("telegram", "42", "12345", content)
    }

    #[test]
    fn test_command_of_matches_plain_and_mentioned() {
        assert_eq!(command_of("/bulk"), Some("/bulk"));
        assert_eq!(command_of("/saved@BulkcardBot"), Some("/saved"));
        assert_eq!(command_of("  /start  "), Some("/start"));
        assert_eq!(command_of("Alice +15551234"), None);
        assert_eq!(command_of(""), None);
    }

    #[tokio::test]
    async fn test_start_replies_greeting_without_state_change() {
        let engine = engine();
        let replies = engine.process_inbound_message(inbound("/start")).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, REPLY_WELCOME);
        assert!(!engine.store.is_active("telegram:12345").await);
    }

    #[tokio::test]
    async fn test_bulk_activates_collecting() {
        let engine = engine();
        let replies = engine.process_inbound_message(inbound("/bulk")).await.unwrap();
        assert_eq!(replies[0].content, REPLY_BULK_STARTED);
        assert!(engine.store.is_active("telegram:12345").await);
    }

    #[tokio::test]
    async fn test_idle_text_is_ignored() {
        let engine = engine();
        let replies = engine
            .process_inbound_message(inbound("just chatting"))
            .await
            .unwrap();
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_collecting_appends_and_acks() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();

        let replies = engine
            .process_inbound_message(inbound("Alice +15551234"))
            .await
            .unwrap();
        assert_eq!(replies[0].content, "Added: ALICE +15551234");
        assert_eq!(engine.store.pending("telegram:12345").await, Some(1));
    }

    #[tokio::test]
    async fn test_collecting_rejects_bad_line_without_mutation() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();

        let replies = engine
            .process_inbound_message(inbound("no number here"))
            .await
            .unwrap();
        assert_eq!(replies[0].content, REPLY_FORMAT_HINT);
        assert_eq!(engine.store.pending("telegram:12345").await, Some(0));
    }

    #[tokio::test]
    async fn test_saved_without_session_replies_nothing_to_save() {
        let engine = engine();
        let replies = engine.process_inbound_message(inbound("/saved")).await.unwrap();
        assert_eq!(replies[0].content, REPLY_NOTHING_TO_SAVE);
    }

    #[tokio::test]
    async fn test_bulk_then_saved_empty_clears_session() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();

        let replies = engine.process_inbound_message(inbound("/saved")).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, REPLY_NOTHING_TO_SAVE);
        assert!(!engine.store.is_active("telegram:12345").await);
    }

    #[tokio::test]
    async fn test_rebulk_discards_pending_records() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();
        engine
            .process_inbound_message(inbound("Alice +15551234"))
            .await
            .unwrap();
        engine
            .process_inbound_message(inbound("bob 15559999"))
            .await
            .unwrap();
        assert_eq!(engine.store.pending("telegram:12345").await, Some(2));

        engine.process_inbound_message(inbound("/bulk")).await.unwrap();
        assert_eq!(engine.store.pending("telegram:12345").await, Some(0));
    }

    #[tokio::test]
    async fn test_saved_delivers_vcards_in_append_order() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();
        engine
            .process_inbound_message(inbound("Alice +15551234"))
            .await
            .unwrap();
        engine
            .process_inbound_message(inbound("bob 15559999"))
            .await
            .unwrap();

        let replies = engine.process_inbound_message(inbound("/saved")).await.unwrap();
        assert_eq!(replies.len(), 2);

        let attachment = replies[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.filename, "bulk_contacts_12345.vcf");
        let expected = "BEGIN:VCARD\n\
                        VERSION:3.0\n\
                        FN:RT ALICE\n\
                        TEL:+15551234\n\
                        END:VCARD\n\
                        BEGIN:VCARD\n\
                        VERSION:3.0\n\
                        FN:RT BOB\n\
                        TEL:15559999\n\
                        END:VCARD\n";
        assert_eq!(attachment.bytes, expected.as_bytes());

        assert_eq!(replies[1].content, REPLY_SAVED);
        assert!(replies[1].attachment.is_none());
        assert!(!engine.store.is_active("telegram:12345").await);
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak_across_chats() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();

        let other = InboundMessage::new("telegram", "7", "99999", "Alice +15551234");
        let replies = engine.process_inbound_message(other).await.unwrap();
        // The other chat is idle; the line is not a contact entry there.
        assert!(replies.is_empty());
        assert_eq!(engine.store.pending("telegram:12345").await, Some(0));
    }

    #[tokio::test]
    async fn test_mentioned_saved_command_finalizes() {
        let engine = engine();
        engine.process_inbound_message(inbound("/bulk")).await.unwrap();
        engine
            .process_inbound_message(inbound("Carol 5550001"))
            .await
            .unwrap();

        let replies = engine
            .process_inbound_message(inbound("/saved@BulkcardBot"))
            .await
            .unwrap();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].attachment.is_some());
    }
}
