//! Chat platform integration for bulkcard
//!
//! This crate connects the collector engine to Telegram.

pub mod base;
pub mod manager;
pub mod telegram;

pub use base::{ChannelError, ChannelHandler, ChannelHandlerPtr, Result};
pub use manager::ChannelManager;
pub use telegram::TelegramHandler;
