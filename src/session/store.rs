//! Document Session Store
//!
//! Manages document sessions with:
//! - In-memory session storage behind an async RwLock
//! - One working directory per session
//! - Automatic session expiry cleanup

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{
    sanitize_filename, DocumentSession, PendingSession, SessionError, SessionInfo, SessionLease,
};

// ============================================================================
// Session Store
// ============================================================================

/// Shared handle to the session table
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    sessions: RwLock<HashMap<Uuid, DocumentSession>>,
    /// Parent of every session directory
    root: PathBuf,
    ttl: Duration,
}

fn parse_id(id: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                root: root.into(),
                ttl,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Reserve an id and create its working directory
    pub async fn prepare(&self) -> Result<PendingSession, SessionError> {
        let id = Uuid::new_v4();
        let dir = self.inner.root.join(id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(PendingSession { id, dir })
    }

    /// Drop a reservation that did not become a session
    pub async fn discard(&self, pending: PendingSession) {
        remove_dir(&pending.dir).await;
    }

    /// Turn a reservation into a live session
    pub async fn insert(
        &self,
        pending: PendingSession,
        filename: &str,
        encrypted: bool,
        page_count: usize,
        handle: Option<lopdf::Document>,
    ) -> SessionInfo {
        let now = Utc::now();
        let session = DocumentSession {
            id: pending.id,
            filename: sanitize_filename(filename),
            dir: pending.dir,
            encrypted,
            page_count,
            created_at: now,
            expires_at: now + self.inner.ttl,
            handle,
        };
        let info = session.info();

        self.inner.sessions.write().await.insert(session.id, session);

        tracing::info!(
            session_id = %info.session_id,
            filename = %info.filename,
            encrypted,
            page_count,
            "Created document session"
        );
        info
    }

    /// Get a live session by string id
    pub async fn get(&self, id: &str) -> Result<SessionInfo, SessionError> {
        let uuid = parse_id(id)?;
        let sessions = self.inner.sessions.read().await;
        let session = sessions
            .get(&uuid)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if session.is_expired() {
            return Err(SessionError::Expired(id.to_string()));
        }
        Ok(session.info())
    }

    /// Lease a session for processing.
    ///
    /// The stored handle, if any, moves into the lease; later checkouts of
    /// the same session get none and must reopen the file.
    pub async fn checkout(&self, id: &str) -> Result<SessionLease, SessionError> {
        let uuid = parse_id(id)?;
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&uuid)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if session.is_expired() {
            return Err(SessionError::Expired(id.to_string()));
        }

        let handle = session.handle.take();
        tracing::debug!(
            session_id = %uuid,
            with_handle = handle.is_some(),
            "Checked out session"
        );
        Ok(SessionLease {
            id: uuid,
            filename: session.filename.clone(),
            dir: session.dir.clone(),
            input_path: session.input_path(),
            encrypted: session.encrypted,
            handle,
        })
    }

    /// Path of a processed file inside a live session's directory
    pub async fn file_path(&self, id: &str, filename: &str) -> Result<PathBuf, SessionError> {
        let uuid = parse_id(id)?;
        let sessions = self.inner.sessions.read().await;
        let session = sessions
            .get(&uuid)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if session.is_expired() {
            return Err(SessionError::Expired(id.to_string()));
        }

        let name = sanitize_filename(filename);
        if name != filename {
            return Err(SessionError::NotFound(format!("{}/{}", id, filename)));
        }
        Ok(session.dir.join(name))
    }

    /// Remove a session and its directory
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let uuid = parse_id(id)?;
        let session = self
            .inner
            .sessions
            .write()
            .await
            .remove(&uuid)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        remove_dir(&session.dir).await;

        tracing::info!(session_id = %uuid, filename = %session.filename, "Removed session");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Clean up expired sessions
    ///
    /// Returns the number of sessions cleaned up
    pub async fn cleanup_expired(&self) -> usize {
        let expired: Vec<DocumentSession> = {
            let mut sessions = self.inner.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, s)| s.is_expired())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        let count = expired.len();
        for session in expired {
            remove_dir(&session.dir).await;
            tracing::debug!(
                session_id = %session.id,
                filename = %session.filename,
                "Cleaned up expired session"
            );
        }

        if count > 0 {
            tracing::info!(count = count, "Cleaned up expired document sessions");
        }
        count
    }

    /// Drop every session, closing their documents and deleting their files
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<DocumentSession> = self
            .inner
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        let count = sessions.len();
        for session in sessions {
            remove_dir(&session.dir).await;
        }
        tracing::info!(count, "Closed all document sessions");
        count
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        })
    }
}

async fn remove_dir(dir: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(dir).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %err, "Failed to remove session directory");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_document;

    fn store(root: &Path) -> SessionStore {
        SessionStore::new(root, Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let pending = store.prepare().await.unwrap();
        assert!(pending.dir.is_dir());
        let info = store.insert(pending, "form.pdf", false, 2, None).await;

        let fetched = store.get(&info.session_id.to_string()).await.unwrap();
        assert_eq!(fetched.filename, "form.pdf");
        assert_eq!(fetched.page_count, 2);
        assert!(!fetched.has_handle);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        assert!(matches!(
            store.get("not-a-uuid").await,
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            store.checkout(&Uuid::new_v4().to_string()).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_checkout_takes_handle_once() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let pending = store.prepare().await.unwrap();
        let info = store
            .insert(pending, "secret.pdf", true, 1, Some(sample_document(&[])))
            .await;
        let id = info.session_id.to_string();

        let first = store.checkout(&id).await.unwrap();
        assert!(first.handle.is_some());
        assert!(first.encrypted);
        assert!(first.input_path.ends_with("input.pdf"));

        let second = store.checkout(&id).await.unwrap();
        assert!(second.handle.is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions() {
        let root = tempfile::tempdir().unwrap();
        let store = SessionStore::new(root.path(), Duration::seconds(-1));
        let pending = store.prepare().await.unwrap();
        let dir = pending.dir.clone();
        let info = store.insert(pending, "old.pdf", false, 1, None).await;
        let id = info.session_id.to_string();

        assert!(matches!(store.get(&id).await, Err(SessionError::Expired(_))));
        assert!(matches!(store.checkout(&id).await, Err(SessionError::Expired(_))));

        assert_eq!(store.cleanup_expired().await, 1);
        assert!(!dir.exists());
        assert!(matches!(store.get(&id).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_path_rejects_traversal() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let pending = store.prepare().await.unwrap();
        let info = store.insert(pending, "form.pdf", false, 1, None).await;
        let id = info.session_id.to_string();

        let path = store.file_path(&id, "modified_form.pdf").await.unwrap();
        assert!(path.ends_with("modified_form.pdf"));
        assert!(store.file_path(&id, "../other/input.pdf").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_and_close_all() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let a = store.prepare().await.unwrap();
        let a_dir = a.dir.clone();
        let a = store.insert(a, "a.pdf", false, 1, None).await;
        let b = store.prepare().await.unwrap();
        let b_dir = b.dir.clone();
        store.insert(b, "b.pdf", false, 1, None).await;

        store.remove(&a.session_id.to_string()).await.unwrap();
        assert!(!a_dir.exists());
        assert_eq!(store.len().await, 1);

        assert_eq!(store.close_all().await, 1);
        assert!(!b_dir.exists());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_discard_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let pending = store.prepare().await.unwrap();
        let dir = pending.dir.clone();

        store.discard(pending).await;
        assert!(!dir.exists());
        assert!(store.is_empty().await);
    }
}
