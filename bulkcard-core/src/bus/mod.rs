//! Message bus for decoupled communication
//!
//! The message bus provides a dual-queue system for inbound and outbound
//! messages, decoupling chat channels from the collector engine.

pub mod events;
pub mod queue;

pub use events::{FileAttachment, InboundMessage, OutboundMessage};
pub use queue::MessageBus;
