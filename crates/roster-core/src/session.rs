use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub employee_id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub token: String,
    pub user: SessionUser,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, user: SessionUser, now: DateTime<Utc>) -> anyhow::Result<Self> {
        if token.trim().is_empty() {
            return Err(anyhow!("session token cannot be empty"));
        }
        if user.employee_id.trim().is_empty() {
            return Err(anyhow!("employee id cannot be empty"));
        }

        Ok(Self {
            session_id: Uuid::new_v4(),
            token,
            user,
            issued_at: now,
        })
    }
}

/// The signed-in state handed to views. Built once by
/// [`SessionStore::rehydrate`] and passed along explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Bearer token for requests to the attendance and notification APIs.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.token.as_str())
    }

    pub fn joining_date(&self) -> Option<NaiveDate> {
        self.session.as_ref().and_then(|session| session.user.joining_date)
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn rehydrate(&self) -> anyhow::Result<SessionContext> {
        if !self.path.exists() {
            debug!("no session file; signed out");
            return Ok(SessionContext::signed_out());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            debug!("empty session file; signed out");
            return Ok(SessionContext::signed_out());
        }

        let session: Session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        info!(
            session_id = %session.session_id,
            employee_id = %session.user.employee_id,
            "rehydrated session"
        );
        Ok(SessionContext::signed_in(session))
    }

    #[tracing::instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn persist(&self, session: &Session) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(session)?;
        writeln!(temp, "{serialized}")?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        info!(file = %self.path.display(), "saved session");
        Ok(())
    }

    /// Removes the stored session. Returns whether one existed.
    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> anyhow::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed removing {}", self.path.display()))?;
        info!(file = %self.path.display(), "cleared session");
        Ok(true)
    }
}
