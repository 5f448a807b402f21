//! In-memory store of bulk-collection sessions

use crate::contact::ContactRecord;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type Records = Arc<Mutex<Vec<ContactRecord>>>;

/// Process-wide mapping from session key to pending contact records.
///
/// Entry presence is the active flag: there is no "exists but inactive"
/// state. The outer map takes a write lock only to create or remove entries;
/// appends to different sessions proceed in parallel and appends to the same
/// session serialize on its per-key mutex.
///
/// Sessions never expire on their own. A `/bulk` that is never finalized
/// keeps its entry until the process exits.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Records>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or reset a collecting session.
    ///
    /// Idempotent: re-issuing on an already-collecting session discards any
    /// pending records.
    pub async fn begin(&self, key: impl Into<String>) {
        let key = key.into();
        let mut sessions = self.sessions.write().await;
        sessions.insert(key, Arc::new(Mutex::new(Vec::new())));
    }

    /// Whether the session is in collecting mode
    pub async fn is_active(&self, key: &str) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    /// Number of records pending for the session, if it exists
    pub async fn pending(&self, key: &str) -> Option<usize> {
        let records = {
            let sessions = self.sessions.read().await;
            sessions.get(key).cloned()
        };
        match records {
            Some(records) => Some(records.lock().await.len()),
            None => None,
        }
    }

    /// Append a record to an active session
    pub async fn append(&self, key: &str, record: ContactRecord) -> Result<()> {
        let records = {
            let sessions = self.sessions.read().await;
            sessions
                .get(key)
                .cloned()
                .ok_or_else(|| Error::SessionNotFound(key.to_string()))?
        };
        records.lock().await.push(record);
        Ok(())
    }

    /// Take all records and remove the session entry.
    ///
    /// Atomic with respect to delivery: the entry is gone before the caller
    /// attempts to send anything, so a failed delivery cannot leave a
    /// half-drained session behind. Finalizing always removes the entry; a
    /// session with zero records is reported as `EmptySession`.
    pub async fn drain(&self, key: &str) -> Result<Vec<ContactRecord>> {
        let records = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(key)
                .ok_or_else(|| Error::SessionNotFound(key.to_string()))?
        };

        let mut records = records.lock().await;
        if records.is_empty() {
            return Err(Error::EmptySession(key.to_string()));
        }
        Ok(std::mem::take(&mut *records))
    }
}
