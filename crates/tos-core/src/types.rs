use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Type alias for document identifiers
pub type DocumentId = Uuid;

/// Type alias for agreement identifiers
pub type AgreementId = Uuid;

/// User identifiers come from the host application's auth layer.
/// They never change, unlike usernames or email addresses.
pub type UserId = u64;

/// One revision of the Terms of Service text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier. UUIDv7 for time-sortability.
    pub id: DocumentId,

    pub content: String,

    /// At most one document is active at any time.
    pub active: bool,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Document {
    pub fn new(content: impl Into<String>, active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            content: content.into(),
            active,
            created: now,
            modified: now,
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.active { "active" } else { "inactive" };
        write!(f, "{}: {}", self.created, state)
    }
}

/// Durable record that a user accepted a specific document revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agreement {
    pub id: AgreementId,
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Agreement {
    pub fn new(user_id: UserId, document_id: DocumentId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            document_id,
            user_id,
            created: now,
            modified: now,
        }
    }

    /// `"<username> agreed to TOS: <document>"`
    pub fn describe(&self, user: &User, document: &Document) -> String {
        format!("{} agreed to TOS: {}", user.username, document)
    }
}

/// The slice of the host application's user record the gate cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn with_staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }

    pub fn with_superuser(mut self, is_superuser: bool) -> Self {
        self.is_superuser = is_superuser;
        self
    }

    /// Staff and superusers skip the acceptance check.
    pub fn may_skip_check(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Where a write came from.
///
/// `Raw` covers fixture loads and data migrations. Those writes are not a
/// user-facing save, so they skip invariant hooks and cache maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteOrigin {
    #[default]
    Save,
    Raw,
}

impl WriteOrigin {
    pub fn is_raw(self) -> bool {
        matches!(self, WriteOrigin::Raw)
    }
}
