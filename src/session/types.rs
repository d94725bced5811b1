//! Session types

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Default session lifetime: 30 minutes
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Default interval between expiry sweeps: 60 seconds
pub const DEFAULT_CLEANUP_SECS: u64 = 60;

/// Name of the uploaded file inside a session directory
pub const INPUT_FILE_NAME: &str = "input.pdf";

// ============================================================================
// Session Types
// ============================================================================

/// An uploaded document and, for encrypted uploads, its authenticated handle
pub struct DocumentSession {
    pub id: Uuid,
    /// Client-supplied file name (sanitised)
    pub filename: String,
    /// Per-session working directory
    pub dir: PathBuf,
    pub encrypted: bool,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Decrypted document, handed out at most once
    pub handle: Option<lopdf::Document>,
}

impl DocumentSession {
    pub fn input_path(&self) -> PathBuf {
        self.dir.join(INPUT_FILE_NAME)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            filename: self.filename.clone(),
            encrypted: self.encrypted,
            page_count: self.page_count,
            created_at: self.created_at,
            expires_at: self.expires_at,
            has_handle: self.handle.is_some(),
        }
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("dir", &self.dir)
            .field("encrypted", &self.encrypted)
            .field("page_count", &self.page_count)
            .field("expires_at", &self.expires_at)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub filename: String,
    pub encrypted: bool,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub has_handle: bool,
}

/// Directory reserved for an upload that has not become a session yet
#[derive(Debug)]
pub struct PendingSession {
    pub id: Uuid,
    pub dir: PathBuf,
}

impl PendingSession {
    pub fn input_path(&self) -> PathBuf {
        self.dir.join(INPUT_FILE_NAME)
    }
}

/// What a request gets when it checks a session out
#[derive(Debug)]
pub struct SessionLease {
    pub id: Uuid,
    pub filename: String,
    pub dir: PathBuf,
    pub input_path: PathBuf,
    pub encrypted: bool,
    /// Present only the first time an encrypted session is checked out
    pub handle: Option<lopdf::Document>,
}

impl SessionLease {
    /// Output file name for a processed copy, e.g. `modified_form.pdf`
    pub fn output_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.filename)
    }

    pub fn output_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(self.output_name(prefix))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) => StatusCode::GONE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Keep the final path component and drop anything that could escape a directory
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}
