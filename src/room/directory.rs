//! Process-wide room registry
//!
//! The only externally visible entry point for room operations. The directory
//! maps room ids to actor handles; room bodies never touch each other, so a
//! concurrent map is all the cross-room synchronization needed.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::BotDifficulty;
use crate::store::{SessionRegistry, StatsStore};
use crate::ws::protocol::{RoomData, RoomSummary, ServerMsg};

use super::lifecycle::{JoinInfo, Room, RoomCommand, RoomError, RoomHandle};

/// Default match length when the creator does not specify one
pub const DEFAULT_DURATION_MINUTES: u32 = 3;

/// Registry of all live rooms
pub struct RoomDirectory {
    rooms: DashMap<String, RoomHandle>,
    /// Directory-scoped fan-out (room listing changes)
    list_tx: broadcast::Sender<ServerMsg>,
    stats: StatsStore,
    sessions: SessionRegistry,
}

impl RoomDirectory {
    pub fn new(stats: StatsStore, sessions: SessionRegistry) -> Arc<Self> {
        let (list_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            rooms: DashMap::new(),
            list_tx,
            stats,
            sessions,
        })
    }

    /// Create a room and spawn its actor. Fails if the id is taken.
    pub fn create_room(
        self: &Arc<Self>,
        room_id: &str,
        host: Uuid,
        password: Option<String>,
        duration_minutes: Option<u32>,
        difficulty: Option<BotDifficulty>,
    ) -> Result<(), RoomError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        let difficulty = difficulty.unwrap_or_default();

        let (room, handle, cmd_rx) = Room::new(
            room_id,
            host,
            password,
            duration,
            difficulty,
            self.stats.clone(),
            self.sessions.clone(),
        );

        // Insert atomically; the entry guard must drop before any map
        // iteration below.
        match self.rooms.entry(room_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(RoomError::RoomExists),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(handle);
            }
        }

        let directory = self.clone();
        tokio::spawn(room.run(cmd_rx, directory));

        info!(room_id, host = %host, duration, ?difficulty, "room created");
        self.broadcast_room_list();
        Ok(())
    }

    /// Join a room; the reply comes from the room actor
    pub async fn join_room(
        &self,
        room_id: &str,
        conn_id: Uuid,
        username: &str,
        password: Option<String>,
    ) -> Result<JoinInfo, RoomError> {
        let handle = self.handle_for(room_id).ok_or(RoomError::RoomNotFound)?;

        let (reply, rx) = oneshot::channel();
        handle
            .cmd_tx
            .send(RoomCommand::Join {
                conn_id,
                username: username.to_string(),
                password,
                reply,
            })
            .await
            .map_err(|_| RoomError::RoomNotFound)?;

        rx.await.map_err(|_| RoomError::RoomNotFound)?
    }

    /// Leave a room (also used on disconnect). Unknown rooms are ignored.
    pub async fn leave_room(&self, room_id: &str, conn_id: Uuid) {
        if let Some(handle) = self.handle_for(room_id) {
            let _ = handle.cmd_tx.send(RoomCommand::Leave { conn_id }).await;
        }
    }

    /// Start a room's match (host only, checked by the actor)
    pub async fn start_game(&self, room_id: &str, conn_id: Uuid) -> Result<(), RoomError> {
        let handle = self.handle_for(room_id).ok_or(RoomError::RoomNotFound)?;

        let (reply, rx) = oneshot::channel();
        handle
            .cmd_tx
            .send(RoomCommand::Start { conn_id, reply })
            .await
            .map_err(|_| RoomError::RoomNotFound)?;

        rx.await.map_err(|_| RoomError::RoomNotFound)?
    }

    /// Forward a paddle intent. Stray input (unknown room, full queue) is
    /// dropped on the floor by design.
    pub fn submit_input(&self, room_id: &str, conn_id: Uuid, position: f32) {
        if let Some(handle) = self.handle_for(room_id) {
            if handle
                .cmd_tx
                .try_send(RoomCommand::Input { conn_id, position })
                .is_err()
            {
                warn!(room_id, "room command queue full, dropping input");
            }
        }
    }

    /// Compact listing of all rooms
    pub fn get_rooms(&self) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|entry| {
                let handle = entry.value();
                RoomSummary {
                    id: handle.id.clone(),
                    has_password: handle.info.has_password,
                    player_count: handle.info.player_count.load(Ordering::Relaxed),
                    bot_count: handle.info.bot_count.load(Ordering::Relaxed),
                    game_state: *handle.info.state.lock(),
                }
            })
            .collect()
    }

    /// Full room data, straight from the actor
    pub async fn get_room_snapshot(&self, room_id: &str) -> Option<RoomData> {
        let handle = self.handle_for(room_id)?;
        let (reply, rx) = oneshot::channel();
        handle
            .cmd_tx
            .send(RoomCommand::Snapshot { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Subscribe to a room's event broadcast
    pub fn subscribe_room(&self, room_id: &str) -> Option<broadcast::Receiver<ServerMsg>> {
        self.handle_for(room_id).map(|h| h.events.subscribe())
    }

    /// Subscribe to directory-wide listing updates
    pub fn subscribe_list(&self) -> broadcast::Receiver<ServerMsg> {
        self.list_tx.subscribe()
    }

    /// Number of live rooms
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Humans across all rooms
    pub fn total_players(&self) -> usize {
        self.rooms
            .iter()
            .map(|entry| entry.value().info.player_count.load(Ordering::Relaxed))
            .sum()
    }

    pub(crate) fn broadcast_room_list(&self) {
        let _ = self.list_tx.send(ServerMsg::RoomListUpdate {
            rooms: self.get_rooms(),
        });
    }

    /// Called by a room actor as it shuts down
    pub(crate) fn remove_room(&self, room_id: &str) {
        if self.rooms.remove(room_id).is_some() {
            info!(room_id, "room removed from directory");
            self.broadcast_room_list();
        }
    }

    fn handle_for(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|h| h.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Wall;
    use crate::ws::protocol::RoomState;
    use std::time::Duration;

    fn test_directory() -> Arc<RoomDirectory> {
        RoomDirectory::new(StatsStore::disabled(), SessionRegistry::new())
    }

    #[tokio::test]
    async fn duplicate_room_id_is_rejected() {
        let dir = test_directory();
        let host = Uuid::new_v4();
        dir.create_room("R1", host, None, Some(3), None).unwrap();
        let err = dir
            .create_room("R1", host, None, Some(3), None)
            .unwrap_err();
        assert_eq!(err, RoomError::RoomExists);
    }

    #[tokio::test]
    async fn join_and_listing_reflect_roster() {
        let dir = test_directory();
        let host = Uuid::new_v4();
        dir.create_room("R1", host, None, Some(3), Some(BotDifficulty::Hard))
            .unwrap();

        let info = dir.join_room("R1", host, "andor", None).await.unwrap();
        assert_eq!(info.wall, Wall::Bottom);
        assert_eq!(info.countdown, 0);
        assert_eq!(info.room.players.len(), 4, "host plus three bots");

        let rooms = dir.get_rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].player_count, 1);
        assert_eq!(rooms[0].bot_count, 3);
        assert_eq!(rooms[0].game_state, RoomState::Waiting);
    }

    #[tokio::test]
    async fn unknown_room_operations_fail_or_noop() {
        let dir = test_directory();
        let conn = Uuid::new_v4();

        let err = dir.join_room("nope", conn, "x", None).await.unwrap_err();
        assert_eq!(err, RoomError::RoomNotFound);

        let err = dir.start_game("nope", conn).await.unwrap_err();
        assert_eq!(err, RoomError::RoomNotFound);

        // Stray input and leave for unknown rooms are silent no-ops
        dir.submit_input("nope", conn, 400.0);
        dir.leave_room("nope", conn).await;
        assert!(dir.get_room_snapshot("nope").await.is_none());
    }

    #[tokio::test]
    async fn start_flips_listing_to_playing() {
        let dir = test_directory();
        let host = Uuid::new_v4();
        dir.create_room("R1", host, None, Some(3), None).unwrap();
        dir.join_room("R1", host, "andor", None).await.unwrap();

        let stranger = Uuid::new_v4();
        let err = dir.start_game("R1", stranger).await.unwrap_err();
        assert_eq!(err, RoomError::NotHost);

        dir.start_game("R1", host).await.unwrap();
        let snapshot = dir.get_room_snapshot("R1").await.unwrap();
        assert_eq!(snapshot.game_state, RoomState::Playing);
        assert_eq!(dir.get_rooms()[0].game_state, RoomState::Playing);

        // Input for the running room is accepted without error
        dir.submit_input("R1", host, 420.0);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let dir = test_directory();
        let host = Uuid::new_v4();
        dir.create_room("R1", host, Some("pw".to_string()), None, None)
            .unwrap();

        let err = dir.join_room("R1", host, "andor", None).await.unwrap_err();
        assert_eq!(err, RoomError::InvalidPassword);

        dir.join_room("R1", host, "andor", Some("pw".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn last_human_leaving_destroys_the_room() {
        let dir = test_directory();
        let host = Uuid::new_v4();
        dir.create_room("R1", host, None, None, None).unwrap();
        dir.join_room("R1", host, "andor", None).await.unwrap();
        assert_eq!(dir.active_rooms(), 1);

        dir.leave_room("R1", host).await;

        // The actor tears down asynchronously
        for _ in 0..50 {
            if dir.active_rooms() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dir.active_rooms(), 0);
        assert_eq!(dir.total_players(), 0);
    }
}
