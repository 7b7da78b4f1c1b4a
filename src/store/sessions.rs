//! Connection session directory
//!
//! Maps a connection identity to its display name and guest flag. The
//! simulation consults this only to decide whether stats are persisted;
//! guests are never written to the backend.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// One logged-in (or guest) session
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub is_guest: bool,
}

/// Process-wide session registry, shared across connections and room actors
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, conn_id: Uuid, username: String, is_guest: bool) {
        self.inner.insert(conn_id, Session { username, is_guest });
    }

    pub fn get(&self, conn_id: Uuid) -> Option<Session> {
        self.inner.get(&conn_id).map(|s| s.clone())
    }

    pub fn remove(&self, conn_id: Uuid) {
        self.inner.remove(&conn_id);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let registry = SessionRegistry::new();
        let conn = Uuid::new_v4();
        assert!(registry.get(conn).is_none());

        registry.set(conn, "andor".to_string(), false);
        let session = registry.get(conn).unwrap();
        assert_eq!(session.username, "andor");
        assert!(!session.is_guest);

        registry.remove(conn);
        assert!(registry.get(conn).is_none());
    }
}
