//! Core types and utilities for bulkcard
//!
//! This crate provides the session store, contact-line parsing, vCard
//! rendering and configuration used by all other bulkcard components.

pub mod bus;
pub mod config;
pub mod contact;
pub mod error;
pub mod logging;
pub mod session;
pub mod vcard;

pub use contact::{parse_contact_line, ContactRecord, ParseError};
pub use error::{Error, Result};
pub use session::SessionStore;
