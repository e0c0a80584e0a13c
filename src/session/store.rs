//! Durable session snapshot storage
//!
//! Snapshots are JSON files. Writes go to a temporary file in the same
//! directory which is then renamed over the target, so a crash never leaves a
//! half-written snapshot behind.

use crate::config::SessionSettings;
use crate::types::SessionSnapshot;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reasons a stored snapshot is not offered for restoration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRejection {
    /// Older than the configured maximum age
    Stale { age_days: i64 },
    /// No `sessionid` cookie, so it cannot be an authenticated session
    NoSessionCookie,
    /// Missing identity fields
    NoIdentity,
}

impl std::fmt::Display for SnapshotRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale { age_days } => write!(f, "snapshot is {} days old", age_days),
            Self::NoSessionCookie => f.write_str("snapshot has no session cookie"),
            Self::NoIdentity => f.write_str("snapshot has no identity"),
        }
    }
}

/// Reads and writes the session snapshot file
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, max_age_days: i64) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::days(max_age_days),
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(settings.path.clone(), settings.max_age_days)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `snapshot`, replacing any previous one
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::session_store(format!("cannot replace snapshot: {}", e)))?;

        tracing::debug!("Session snapshot saved to {}", self.path.display());
        Ok(())
    }

    /// Read the snapshot without validating it
    ///
    /// Returns `Ok(None)` when no snapshot exists. An unreadable or
    /// undecodable file is an error.
    pub fn read(&self) -> Result<Option<SessionSnapshot>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&content).map_err(|e| {
            Error::session_store(format!("corrupt snapshot {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    /// Load a snapshot that passes the freshness checks
    ///
    /// Stale, incomplete or corrupt snapshots are reported as absent, since
    /// the only recovery for any of them is a fresh login.
    pub fn load(&self) -> Option<SessionSnapshot> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let snapshot = match self.read() {
            Ok(Some(s)) => s,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable session snapshot: {}", e);
                return None;
            }
        };
        match self.check(&snapshot, now) {
            Ok(()) => Some(snapshot),
            Err(reason) => {
                tracing::info!("Session snapshot rejected: {}", reason);
                None
            }
        }
    }

    /// Freshness and completeness checks applied before any probe is sent
    pub fn check(
        &self,
        snapshot: &SessionSnapshot,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), SnapshotRejection> {
        let age = snapshot.age(now);
        if age > self.max_age {
            return Err(SnapshotRejection::Stale {
                age_days: age.num_days(),
            });
        }
        if !snapshot.has_session_cookie() {
            return Err(SnapshotRejection::NoSessionCookie);
        }
        if snapshot.user_id.is_empty() {
            return Err(SnapshotRejection::NoIdentity);
        }
        Ok(())
    }

    /// Remove the snapshot; a missing file is not an error
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Session snapshot {} discarded", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
