//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{BotDifficulty, PowerUpKind, Wall};

/// Room lifecycle state as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    Playing,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Bind a display name to this connection. Guests are never persisted.
    Login {
        username: String,
        #[serde(default)]
        guest: bool,
    },

    /// Create a new room (the creator still joins explicitly)
    CreateRoom {
        room_id: String,
        password: Option<String>,
        duration_minutes: Option<u32>,
        bot_difficulty: Option<BotDifficulty>,
    },

    /// Join an existing room
    JoinRoom {
        room_id: String,
        password: Option<String>,
    },

    /// Leave a room
    LeaveRoom { room_id: String },

    /// Start the match (host only)
    StartGame { room_id: String },

    /// Paddle position intent for the current tick
    Input { room_id: String, position: f32 },

    /// List open rooms
    GetRooms,

    /// Fetch the leaderboard
    GetLeaderboard,

    /// Ping for latency measurement
    Ping { t: u64 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { conn_id: Uuid, server_time: u64 },

    /// Session identity accepted
    LoginAccepted { username: String, guest: bool },

    /// Room created successfully
    RoomCreated { room_id: String },

    /// Confirmation of room join (countdown > 0 means mid-game protection)
    RoomJoined {
        room: RoomData,
        wall: Wall,
        countdown: u8,
    },

    /// Reply to a room listing request
    RoomList { rooms: Vec<RoomSummary> },

    /// Broadcast whenever the set of rooms or their occupancy changes
    RoomListUpdate { rooms: Vec<RoomSummary> },

    /// Full room data pushed to room members on membership changes
    RoomUpdate { room: RoomData },

    /// Current roster of a room (humans and bots)
    PlayerListUpdate { players: Vec<RosterEntry> },

    /// A player is in their mid-game join countdown
    PlayerJoining {
        player_id: Uuid,
        username: String,
        wall: Wall,
        countdown: u8,
    },

    /// A player finished joining (countdown elapsed, or waiting-state join)
    PlayerJoined { player: RosterEntry },

    /// A player left the room
    PlayerLeft { player_id: Uuid },

    /// The match has started
    GameStarted,

    /// Full-state snapshot, broadcast every tick while playing
    GameState {
        balls: Vec<BallSnapshot>,
        paddles: WallSnapshots,
        powerups: Vec<PowerUpSnapshot>,
        time_left: u32,
    },

    /// Discrete in-match event
    GameEvent { event: GameEvent },

    /// Match finished; final scores for all active paddles
    GameOver { scores: Vec<FinalScore> },

    /// Leaderboard rows, best first
    Leaderboard { entries: Vec<LeaderboardEntry> },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong { t: u64 },
}

/// One roster slot (human or bot)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub username: String,
    pub wall: Wall,
    pub is_bot: bool,
    /// Seconds left of mid-game join protection (0 = fully active)
    pub countdown: u8,
}

/// Full room data for members and join replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomData {
    pub id: String,
    pub host_id: Uuid,
    pub game_state: RoomState,
    pub players: Vec<RosterEntry>,
    pub has_password: bool,
}

/// Compact room listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub has_password: bool,
    /// Humans only
    pub player_count: usize,
    pub bot_count: usize,
    pub game_state: RoomState,
}

/// Ball state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub color: String,
}

/// Active transient effects on a paddle
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EffectFlags {
    pub blind: bool,
    pub reverse: bool,
    pub shield: bool,
}

/// Paddle state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaddleSnapshot {
    pub pos: f32,
    pub len: f32,
    pub name: String,
    pub score: i32,
    pub active: bool,
    pub effects: EffectFlags,
    pub is_bot: bool,
    pub protected: bool,
}

/// All four paddles keyed by wall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSnapshots {
    pub top: PaddleSnapshot,
    pub bottom: PaddleSnapshot,
    pub left: PaddleSnapshot,
    pub right: PaddleSnapshot,
}

/// Power-up state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUpSnapshot {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
    /// Milliseconds until unconsumed expiry
    pub time_left: u64,
}

/// Discrete in-match events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A shield absorbed what would have been a goal
    ShieldSave { wall: Wall },

    /// A goal was scored against `wall`
    Score {
        wall: Wall,
        /// Conceder's new score
        score: i32,
        /// Scoring wall, if the ball had been touched
        hitter: Option<Wall>,
        /// Scorer's new score
        hitter_score: Option<i32>,
    },
}

/// Final score line for one active paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalScore {
    pub username: String,
    pub score: i32,
    pub is_bot: bool,
}

/// Leaderboard row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub high_score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_round_trips_snake_case_tags() {
        let json = r#"{"type":"join_room","room_id":"R1","password":null}"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMsg::JoinRoom { ref room_id, .. } if room_id == "R1"));

        let json = r#"{"type":"input","room_id":"R1","position":420.5}"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMsg::Input { position, .. } if (position - 420.5).abs() < f32::EPSILON));
    }

    #[test]
    fn login_defaults_to_registered_user() {
        let json = r#"{"type":"login","username":"andor"}"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMsg::Login { guest: false, .. }));
    }

    #[test]
    fn game_event_serializes_wall_names() {
        let event = GameEvent::Score {
            wall: Wall::Right,
            score: -1,
            hitter: Some(Wall::Left),
            hitter_score: Some(3),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event_type":"score""#));
        assert!(json.contains(r#""wall":"right""#));
        assert!(json.contains(r#""hitter":"left""#));
    }
}
