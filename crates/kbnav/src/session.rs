//! Per-conversation navigation cursors.

use crate::types::NodeId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Opaque key of one conversation (a chat id, a user handle, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<i64> for SessionKey {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where one conversation is, and what it may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    key: SessionKey,
    /// `None` until the first navigation; read as "the root".
    current: Option<NodeId>,
    privileged: bool,
    awaiting_upload: bool,
    last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            current: None,
            privileged: false,
            awaiting_upload: false,
            last_seen: Utc::now(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn set_current(&mut self, id: NodeId) {
        self.current = Some(id);
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn set_privilege(&mut self, privileged: bool) {
        self.privileged = privileged;
    }

    pub fn is_awaiting_upload(&self) -> bool {
        self.awaiting_upload
    }

    pub fn set_awaiting_upload(&mut self, awaiting: bool) {
        self.awaiting_upload = awaiting;
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }
}

type SessionCell = Arc<Mutex<Session>>;

/// Keyed, in-memory store of every [`Session`] seen by this process.
///
/// Each session sits behind its own mutex: events for different keys
/// never wait on each other, events for the same key run one at a time.
/// The outer map lock is only held to find or insert an entry.
///
/// Sessions are created lazily and never persisted. Growth is unbounded
/// unless the owner calls [`SessionStore::evict_idle`].
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionCell>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session for `key`, creating it with defaults if needed.
    ///
    /// The guard serializes all work on this key until it is dropped.
    pub fn lock(&self, key: &SessionKey) -> SessionGuard {
        let cell = self.cell(key);
        SessionGuard { cell }
    }

    /// A copy of the session for `key`, creating it if needed.
    pub fn get_or_create(&self, key: &SessionKey) -> Session {
        self.lock(key).get().clone()
    }

    pub fn set_current(&self, key: &SessionKey, id: NodeId) {
        self.lock(key).get().set_current(id);
    }

    pub fn set_privilege(&self, key: &SessionKey, privileged: bool) {
        self.lock(key).get().set_privilege(privileged);
    }

    pub fn set_awaiting_upload(&self, key: &SessionKey, awaiting: bool) {
        self.lock(key).get().set_awaiting_upload(awaiting);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions not seen for longer than `max_idle`. Returns how many.
    ///
    /// A session that is locked right now counts as active and is kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, cell| match cell.try_lock() {
            Ok(session) => session.last_seen >= cutoff,
            Err(std::sync::TryLockError::Poisoned(p)) => p.into_inner().last_seen >= cutoff,
            Err(std::sync::TryLockError::WouldBlock) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "evicted idle sessions");
        }
        removed
    }

    fn cell(&self, key: &SessionKey) -> SessionCell {
        if let Some(cell) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(cell);
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let cell = sessions.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(session = %key, "new session");
            Arc::new(Mutex::new(Session::new(key.clone())))
        });
        Arc::clone(cell)
    }
}

/// Exclusive access to one session, obtained from [`SessionStore::lock`].
pub struct SessionGuard {
    cell: SessionCell,
}

impl SessionGuard {
    /// Lock and mark the session as seen now.
    pub fn get(&self) -> MutexGuard<'_, Session> {
        let mut session = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        session.touch(Utc::now());
        session
    }
}
