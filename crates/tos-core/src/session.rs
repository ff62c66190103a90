use crate::error::{Result, TosError};
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A user waiting on the acceptance flow, and the auth backend that
/// authenticated them. The flow needs both to finish the login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAcceptance {
    pub user_id: UserId,
    pub backend: String,
}

/// Per-session values the gate reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Logged-in user, set by the host application's auth layer.
    pub auth_user_id: Option<UserId>,
    pub auth_backend: Option<String>,

    /// Set by the gate on redirect, consumed by the acceptance flow.
    pub tos_user: Option<UserId>,
    pub tos_backend: Option<String>,
}

impl SessionData {
    pub fn authenticated(user_id: UserId, backend: impl Into<String>) -> Self {
        Self {
            auth_user_id: Some(user_id),
            auth_backend: Some(backend.into()),
            ..Self::default()
        }
    }

    pub fn stash_pending(&mut self, pending: PendingAcceptance) {
        self.tos_user = Some(pending.user_id);
        self.tos_backend = Some(pending.backend);
    }

    pub fn pending(&self) -> Option<PendingAcceptance> {
        Some(PendingAcceptance {
            user_id: self.tos_user?,
            backend: self.tos_backend.clone()?,
        })
    }

    /// Log the pending user in and clear the pending pair.
    pub fn complete_pending(&mut self) -> Option<PendingAcceptance> {
        let pending = self.pending()?;
        self.auth_user_id = Some(pending.user_id);
        self.auth_backend = Some(pending.backend.clone());
        self.tos_user = None;
        self.tos_backend = None;
        Some(pending)
    }
}

/// Session storage keyed by an opaque session id.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<SessionData>>;

    fn save(&self, id: &str, data: &SessionData) -> Result<()>;

    fn remove(&self, id: &str) -> Result<()>;
}

struct StoredSession {
    data: SessionData,
    last_seen: Instant,
}

/// In-process session store.
///
/// With an idle timeout, a session not loaded or saved within the timeout is
/// gone: `load` treats it as missing and `purge_idle` drops it.
#[derive(Default)]
pub struct MemorySessionStore {
    idle_timeout: Option<Duration>,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    fn sessions_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredSession>>> {
        self.sessions
            .write()
            .map_err(|_| TosError::LockPoisoned("session store"))
    }

    fn is_idle(&self, session: &StoredSession, now: Instant) -> bool {
        self.idle_timeout
            .map_or(false, |timeout| now.duration_since(session.last_seen) >= timeout)
    }

    /// Drop idle sessions. Returns how many were removed.
    pub fn purge_idle(&self) -> Result<usize> {
        let now = Instant::now();
        let mut sessions = self.sessions_write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_idle(session, now));
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> Result<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| TosError::LockPoisoned("session store"))?;
        Ok(sessions.len())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str) -> Result<Option<SessionData>> {
        let now = Instant::now();
        let mut sessions = self.sessions_write()?;
        match sessions.get_mut(id) {
            Some(session) if self.is_idle(session, now) => {
                sessions.remove(id);
                Ok(None)
            }
            Some(session) => {
                session.last_seen = now;
                Ok(Some(session.data.clone()))
            }
            None => Ok(None),
        }
    }

    fn save(&self, id: &str, data: &SessionData) -> Result<()> {
        self.sessions_write()?.insert(
            id.to_string(),
            StoredSession {
                data: data.clone(),
                last_seen: Instant::now(),
            },
        );
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.sessions_write()?.remove(id);
        Ok(())
    }
}
