//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::room::RoomDirectory;
use crate::store::{SessionRegistry, StatsStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stats: StatsStore,
    pub sessions: SessionRegistry,
    pub rooms: Arc<RoomDirectory>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Stats client (disabled when no backend is configured)
        let stats = StatsStore::from_config(&config);

        // Session directory (connection identity -> display name + guest flag)
        let sessions = SessionRegistry::new();

        // Room registry; rooms spawn their own actor tasks on demand
        let rooms = RoomDirectory::new(stats.clone(), sessions.clone());

        Self {
            config,
            stats,
            sessions,
            rooms,
        }
    }
}
