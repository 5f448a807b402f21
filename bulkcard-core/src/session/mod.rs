//! Session-scoped bulk-collection state
//!
//! A session exists in the store if and only if its chat is in collecting
//! mode; finalizing removes the entry entirely.

pub mod store;

pub use store::SessionStore;
