//! Session store and per-session state.
//!
//! The store owns every session and is the only component holding
//! process-wide mutable state. Its lock guards only top-level map
//! mutation (create/delete/lookup); per-session work happens under each
//! session's own `tokio::sync::RwLock`, so cross-session operations
//! never contend.
//!
//! Lock discipline: bill records, chat history, and the vector index
//! mutate only inside one write-lock critical section per operation,
//! which gives atomic visibility — a reader either sees a fully
//! committed (record + index entries) pair or neither. Capability I/O
//! (extraction, embedding, generation) always happens outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock as AsyncRwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::{IndexEntry, VectorIndex};
use crate::models::{BillRecord, ChatTurn, SessionInfo};

/// Mutable per-session working set.
#[derive(Debug, Default)]
pub struct SessionState {
    pub bills: Vec<BillRecord>,
    pub chat_history: Vec<ChatTurn>,
    pub index: VectorIndex,
}

/// An isolated, user-scoped working set of uploaded bills, derived
/// index, and chat history. Active from creation until deleted.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Opaque credential, used only to authorize capability calls.
    pub api_key: String,
    state: AsyncRwLock<SessionState>,
}

impl Session {
    fn new(api_key: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            api_key,
            state: AsyncRwLock::new(SessionState::default()),
        }
    }

    /// Shared read access to bills, history, and index.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Exclusive access for atomic commits.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().await
    }

    /// Atomically append a bill record together with its embedded
    /// chunks. The record and its index entries become visible in one
    /// critical section: a concurrent reader sees both or neither.
    /// Returns the bill count after the append.
    pub async fn append_bill(
        &self,
        record: BillRecord,
        embedded_chunks: Vec<(String, Vec<f32>)>,
    ) -> usize {
        let mut state = self.state.write().await;
        let bill_seq = state.bills.len();
        let filename = record.filename.clone();
        let entries = embedded_chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (text, vector))| IndexEntry {
                vector,
                bill_seq,
                filename: filename.clone(),
                text,
                chunk_index,
            });
        state.bills.push(record);
        state.index.extend(entries);
        state.bills.len()
    }

    pub async fn info(&self) -> SessionInfo {
        let state = self.state.read().await;
        SessionInfo {
            session_id: self.id.clone(),
            created_at: self.created_at,
            bill_count: state.bills.len(),
            chat_turns: state.chat_history.len(),
            has_index: !state.index.is_empty(),
        }
    }
}

/// Process-wide map from session identifier to session state.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session keyed by a fresh 128-bit random token.
    pub fn create(&self, api_key: String) -> Arc<Session> {
        let session = Arc::new(Session::new(api_key));
        let mut sessions = self.sessions.write().expect("session map poisoned");
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        let sessions = self.sessions.read().expect("session map poisoned");
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Remove a session. Index memory is released once the last in-flight
    /// reference drops.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session map poisoned");
        sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().expect("session map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
