// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-profile session identifier used to correlate traces.
//!
//! The identifier is created lazily on first read and persisted to a
//! [`SessionStore`]. It is for correlation only: the entropy is plenty for
//! grouping telemetry but the value is not a secret.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SessionError;

/// Characters of each random fragment.
const FRAGMENT_LEN: usize = 13;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier grouping all telemetry from one client profile.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new identifier from two independent random fragments.
    pub fn generate() -> Self {
        let mut id = random_fragment();
        id.push_str(&random_fragment());
        Self(id)
    }

    /// Wrap an existing identifier.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get a short representation (first 8 characters).
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.short())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn random_fragment() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut out = Vec::with_capacity(FRAGMENT_LEN);
    for _ in 0..FRAGMENT_LEN {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    // BASE36 is ASCII
    String::from_utf8(out).unwrap_or_default()
}

/// Durable key-value slot holding the session identifier.
pub trait SessionStore: Send + Sync {
    /// Read the stored identifier, `None` if absent or expired.
    fn load(&self) -> Result<Option<SessionId>, SessionError>;

    /// Persist the identifier.
    fn save(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Remove the stored identifier.
    fn clear(&self) -> Result<(), SessionError>;
}

/// Return the stored session identifier, creating and persisting one if absent.
///
/// Storage failures degrade to a fresh, unpersisted identifier.
pub fn get_or_create_session_id(store: &dyn SessionStore) -> SessionId {
    match store.load() {
        Ok(Some(id)) => return id,
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Session store unreadable, generating a new session id"),
    }

    let id = SessionId::generate();
    match store.save(&id) {
        Ok(()) => debug!(session_id = %id.short(), "Created session id"),
        Err(e) => warn!(error = %e, "Failed to persist session id"),
    }
    id
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Session slot backed by a JSON file, with an optional expiry.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    ttl: Option<Duration>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: None,
        }
    }

    /// Expire stored identifiers after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionId>, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::LoadFailed(e.to_string())),
        };

        let stored: StoredSession =
            serde_json::from_str(&content).map_err(|e| SessionError::Corrupted(e.to_string()))?;

        if stored.id.as_str().is_empty() {
            return Ok(None);
        }
        if let Some(expires_at) = stored.expires_at {
            if expires_at <= Utc::now() {
                debug!(path = %self.path.display(), "Stored session id expired");
                return Ok(None);
            }
        }
        Ok(Some(stored.id))
    }

    fn save(&self, id: &SessionId) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::SaveFailed(format!("Failed to create directory: {}", e)))?;
        }

        let expires_at = match self.ttl {
            Some(ttl) => Some(
                Utc::now()
                    + chrono::Duration::from_std(ttl)
                        .map_err(|e| SessionError::SaveFailed(e.to_string()))?,
            ),
            None => None,
        };

        let stored = StoredSession {
            id: id.clone(),
            expires_at,
        };
        let content = serde_json::to_string_pretty(&stored)
            .map_err(|e| SessionError::SaveFailed(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| SessionError::SaveFailed(e.to_string()))
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process session slot.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionId>, SessionError> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| SessionError::LoadFailed(e.to_string()))?;
        Ok(slot.clone())
    }

    fn save(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| SessionError::SaveFailed(e.to_string()))?;
        *slot = Some(id.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| SessionError::SaveFailed(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
