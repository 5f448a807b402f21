//! Bulk-collection engine for bulkcard
//!
//! Consumes inbound chat messages, drives the per-chat collecting state
//! machine and publishes replies and vCard file deliveries.

pub mod collector;

pub use collector::CollectorEngine;
