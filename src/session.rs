//! Authenticated session: bearer token, derived user id and role.
//!
//! A session is created from a login/register response, persisted to
//! `~/.config/agora/session.json` and handed explicitly to the
//! [`ApiClient`](crate::api::ApiClient). Nothing here is global.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::api::UserId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `Debug` never prints the token.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
    user_id: Option<String>,
    role: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish()
    }
}

impl Session {
    /// Build a session from a freshly issued token, decoding the user id
    /// from the token's `sub` claim.
    pub fn from_token(token: impl Into<String>, role: Option<String>) -> Self {
        let token = token.into();
        let user_id = decode_subject(&token);
        if user_id.is_none() {
            tracing::warn!("Failed to decode user id from token");
        }
        Self {
            token: SecretString::from(token),
            user_id,
            role,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Numeric form of the user id, as sent in `authorId` fields.
    pub fn author_id(&self) -> Option<UserId> {
        self.user_id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Extract the `sub` claim from a JWT-shaped token without verifying it.
///
/// The payload is the second dot-separated segment, base64url encoded.
/// Padding and the standard alphabet are tolerated. Numeric subjects are
/// returned in their decimal string form.
pub fn decode_subject(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    match claims.get("sub")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// File-backed session storage.
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

    /// Missing file → `Ok(None)`.
    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No session file, running anonymously");
                return Ok(None);
            }
            Err(e) => return Err(SessionError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let stored: StoredSession = serde_json::from_str(&content)?;
        // Re-derive the user id when an older file lacks it.
        let user_id = stored.user_id.or_else(|| decode_subject(&stored.token));
        Ok(Some(Session {
            token: SecretString::from(stored.token),
            user_id,
            role: stored.role,
        }))
    }

    /// Atomically replace the session file (write temp, sync, rename).
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let stored = StoredSession {
            token: session.token.expose_secret().to_string(),
            user_id: session.user_id.clone(),
            role: session.role.clone(),
        };
        let content = serde_json::to_vec_pretty(&stored)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        use std::time::{SystemTime, UNIX_EPOCH};
        let random_suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = self
            .path
            .with_extension(format!("tmp.{:016x}", random_suffix));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut temp_file = options.open(&temp_path)?;

        let written = temp_file
            .write_all(&content)
            .and_then(|_| temp_file.sync_all());
        drop(temp_file);
        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(SessionError::Io(e));
        }

        #[cfg(windows)]
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(SessionError::Io(e));
        }
        tracing::info!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}
