use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::session::SessionManager;

/// Application state shared by every handler.
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: SessionManager,
}

impl AppState {
    /// Build the state with production collaborators.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let config = Arc::new(config);
        let sessions = SessionManager::from_config(config.clone());
        Arc::new(Self { config, sessions })
    }

    /// Build the state around an existing session manager.
    pub fn with_sessions(sessions: SessionManager) -> Arc<Self> {
        Arc::new(Self {
            config: sessions.config().clone(),
            sessions,
        })
    }

    /// True when a new media connection would exceed the configured cap.
    pub fn at_connection_capacity(&self) -> bool {
        self.config
            .max_websocket_connections
            .is_some_and(|max| self.sessions.active_count() >= max)
    }
}
