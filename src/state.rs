//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::patch::FontResolver;
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionStore,
    fonts: Arc<FontResolver>,
}

impl AppState {
    /// Create the state, creating the work directory if needed
    pub async fn new(config: Config) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&config.storage.work_dir).await?;

        let sessions = SessionStore::new(
            config.storage.work_dir.clone(),
            chrono::Duration::minutes(config.sessions.ttl_minutes),
        );
        let fonts = Arc::new(config.processing.font_resolver());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                fonts,
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session store
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Get the font candidates used for replacement text
    pub fn fonts(&self) -> Arc<FontResolver> {
        self.inner.fonts.clone()
    }

    /// Per-request processing timeout
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.inner.config.processing.timeout_secs)
    }

    /// Close every session before the process exits
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        self.inner.sessions.close_all().await;
    }
}
