//! Per-room membership state machine and actor task
//!
//! Each room runs as one task owning all of its state, including the live
//! simulation engine while a match runs. Membership changes, client input,
//! and the 60 Hz tick are serialized through that task, so no two ticks of
//! the same room ever overlap and no lock is shared between rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::{snapshot, BotController, BotDifficulty, Occupant, SimulationEngine, Wall};
use crate::store::{SessionRegistry, StatsStore};
use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{RoomData, RoomState, RosterEntry, ServerMsg};

use super::directory::RoomDirectory;

/// Humans per room (bots fill the rest of the four walls)
pub const MAX_HUMANS: usize = 4;

/// Bots added when the first human joins
const INITIAL_BOT_FILL: usize = 3;

/// Mid-game join protection countdown
pub const JOIN_COUNTDOWN_SECS: u8 = 3;

/// Room operation failures, surfaced to the caller with no state mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room already exists")]
    RoomExists,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Room is full")]
    RoomFull,

    #[error("No available walls")]
    NoFreeWall,

    #[error("Already in this room")]
    AlreadyJoined,

    #[error("Only the host can start the game")]
    NotHost,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game already in progress")]
    AlreadyPlaying,
}

impl RoomError {
    /// Stable machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomExists => "room_exists",
            RoomError::RoomNotFound => "room_not_found",
            RoomError::InvalidPassword => "invalid_password",
            RoomError::RoomFull => "room_full",
            RoomError::NoFreeWall => "no_free_wall",
            RoomError::AlreadyJoined => "already_joined",
            RoomError::NotHost => "not_host",
            RoomError::NotEnoughPlayers => "not_enough_players",
            RoomError::AlreadyPlaying => "already_playing",
        }
    }
}

/// Successful join result
#[derive(Debug, Clone)]
pub struct JoinInfo {
    pub room: RoomData,
    pub wall: Wall,
    /// Non-zero when the joiner entered a running match
    pub countdown: u8,
}

/// Commands processed by the room actor
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: Uuid,
        username: String,
        password: Option<String>,
        reply: oneshot::Sender<Result<JoinInfo, RoomError>>,
    },
    Leave {
        conn_id: Uuid,
    },
    Start {
        conn_id: Uuid,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Input {
        conn_id: Uuid,
        position: f32,
    },
    Snapshot {
        reply: oneshot::Sender<RoomData>,
    },
}

/// Listing data readable without going through the actor
pub struct SharedRoomInfo {
    pub has_password: bool,
    pub player_count: AtomicUsize,
    pub bot_count: AtomicUsize,
    pub state: parking_lot::Mutex<RoomState>,
}

/// Handle to a running room actor
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    pub cmd_tx: mpsc::Sender<RoomCommand>,
    pub events: broadcast::Sender<ServerMsg>,
    pub info: Arc<SharedRoomInfo>,
}

#[derive(Debug, Clone)]
struct HumanSeat {
    username: String,
    wall: Wall,
}

#[derive(Debug, Clone)]
struct JoiningState {
    countdown: u8,
    next_tick_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Destroy,
}

/// All state of one room, owned exclusively by its actor task
pub struct Room {
    id: String,
    host: Uuid,
    password: Option<String>,
    duration_minutes: u32,
    difficulty: BotDifficulty,
    state: RoomState,
    humans: HashMap<Uuid, HumanSeat>,
    bots: HashMap<Uuid, BotController>,
    /// Players in their mid-game join countdown
    joining: HashMap<Uuid, JoiningState>,
    engine: Option<SimulationEngine>,
    events: broadcast::Sender<ServerMsg>,
    info: Arc<SharedRoomInfo>,
    stats: StatsStore,
    sessions: SessionRegistry,
    /// Room listing changed; the run loop pushes a directory-wide update
    list_dirty: bool,
}

impl Room {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        host: Uuid,
        password: Option<String>,
        duration_minutes: u32,
        difficulty: BotDifficulty,
        stats: StatsStore,
        sessions: SessionRegistry,
    ) -> (Self, RoomHandle, mpsc::Receiver<RoomCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (events, _) = broadcast::channel(256);

        let info = Arc::new(SharedRoomInfo {
            has_password: password.is_some(),
            player_count: AtomicUsize::new(0),
            bot_count: AtomicUsize::new(0),
            state: parking_lot::Mutex::new(RoomState::Waiting),
        });

        let room = Self {
            id: id.to_string(),
            host,
            password,
            duration_minutes,
            difficulty,
            state: RoomState::Waiting,
            humans: HashMap::new(),
            bots: HashMap::new(),
            joining: HashMap::new(),
            engine: None,
            events: events.clone(),
            info: info.clone(),
            stats,
            sessions,
            list_dirty: false,
        };

        let handle = RoomHandle {
            id: id.to_string(),
            cmd_tx,
            events,
            info,
        };

        (room, handle, cmd_rx)
    }

    /// Actor loop: commands and the fixed-rate tick, fully serialized
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<RoomCommand>, directory: Arc<RoomDirectory>) {
        let mut ticker = tokio::time::interval(tick_duration());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(room_id = %self.id, "room actor started");

        loop {
            let flow = tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, unix_millis()),
                    None => Flow::Destroy,
                },
                _ = ticker.tick() => self.tick(unix_millis()),
            };

            if self.list_dirty {
                self.list_dirty = false;
                directory.broadcast_room_list();
            }

            if flow == Flow::Destroy {
                break;
            }
        }

        info!(room_id = %self.id, "room destroyed");
        directory.remove_room(&self.id);
    }

    fn handle_command(&mut self, cmd: RoomCommand, now: u64) -> Flow {
        match cmd {
            RoomCommand::Join {
                conn_id,
                username,
                password,
                reply,
            } => {
                let result = self.handle_join(conn_id, &username, password.as_deref(), now);
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::Leave { conn_id } => self.handle_leave(conn_id),
            RoomCommand::Start { conn_id, reply } => {
                let result = self.handle_start(conn_id, now);
                let _ = reply.send(result);
                Flow::Continue
            }
            RoomCommand::Input { conn_id, position } => {
                self.handle_input(conn_id, position);
                Flow::Continue
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room_data());
                Flow::Continue
            }
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    fn handle_join(
        &mut self,
        conn_id: Uuid,
        username: &str,
        password: Option<&str>,
        now: u64,
    ) -> Result<JoinInfo, RoomError> {
        if let Some(expected) = self.password.as_deref() {
            if password != Some(expected) {
                return Err(RoomError::InvalidPassword);
            }
        }
        if self.humans.contains_key(&conn_id) {
            return Err(RoomError::AlreadyJoined);
        }
        if self.humans.len() >= MAX_HUMANS {
            return Err(RoomError::RoomFull);
        }

        let playing = self.state == RoomState::Playing;

        // Prefer taking over a bot's wall; otherwise the fixed priority order
        let wall = self
            .evict_random_bot()
            .or_else(|| self.free_wall())
            .ok_or(RoomError::NoFreeWall)?;

        self.humans.insert(
            conn_id,
            HumanSeat {
                username: username.to_string(),
                wall,
            },
        );

        let countdown = if playing { JOIN_COUNTDOWN_SECS } else { 0 };

        info!(
            room_id = %self.id,
            username,
            wall = ?wall,
            mid_game = playing,
            "player joined room"
        );

        if playing {
            self.joining.insert(
                conn_id,
                JoiningState {
                    countdown,
                    next_tick_at: now + 1_000,
                },
            );
            if let Some(engine) = self.engine.as_mut() {
                engine.seat_joining_human(wall, conn_id, username);
            }
            self.broadcast(ServerMsg::PlayerJoining {
                player_id: conn_id,
                username: username.to_string(),
                wall,
                countdown,
            });
        } else {
            // A lone player always gets opponents
            if self.humans.len() == 1 {
                self.backfill_initial_bots();
            }
            if let Some(entry) = self.roster_entry(conn_id) {
                self.broadcast(ServerMsg::PlayerJoined { player: entry });
            }
        }

        self.broadcast_roster();
        self.update_info();
        self.list_dirty = true;

        Ok(JoinInfo {
            room: self.room_data(),
            wall,
            countdown,
        })
    }

    fn handle_leave(&mut self, conn_id: Uuid) -> Flow {
        let Some(seat) = self.humans.remove(&conn_id) else {
            return Flow::Continue;
        };

        // A pending join countdown is abandoned without error
        self.joining.remove(&conn_id);

        if let Some(engine) = self.engine.as_mut() {
            engine.deactivate_wall(seat.wall);
        }

        info!(room_id = %self.id, username = %seat.username, wall = ?seat.wall, "player left room");
        self.broadcast(ServerMsg::PlayerLeft { player_id: conn_id });

        // Bots never keep a room alive on their own
        if self.humans.is_empty() {
            return Flow::Destroy;
        }

        self.add_bot_to_empty_wall();
        self.broadcast_roster();
        self.update_info();
        self.list_dirty = true;

        Flow::Continue
    }

    fn handle_start(&mut self, conn_id: Uuid, now: u64) -> Result<(), RoomError> {
        if self.state == RoomState::Playing {
            return Err(RoomError::AlreadyPlaying);
        }
        if conn_id != self.host {
            return Err(RoomError::NotHost);
        }
        if self.humans.len() + self.bots.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }

        let seed = rand::random::<u64>();
        let mut engine = SimulationEngine::new(
            self.id.clone(),
            self.duration_minutes,
            seed,
            now,
            self.stats.clone(),
            self.sessions.clone(),
        );

        for (conn, seat) in &self.humans {
            engine.seat_human(seat.wall, *conn, &seat.username);
        }
        for bot in self.bots.values() {
            engine.seat_bot(bot.clone());
        }

        self.engine = Some(engine);
        self.state = RoomState::Playing;
        self.update_info();
        self.list_dirty = true;

        info!(room_id = %self.id, duration_minutes = self.duration_minutes, "game started");
        self.broadcast(ServerMsg::GameStarted);

        Ok(())
    }

    /// Paddle input. Unknown connections, non-playing rooms, and joiners
    /// still in countdown are silently dropped.
    fn handle_input(&mut self, conn_id: Uuid, position: f32) {
        if self.state != RoomState::Playing || self.joining.contains_key(&conn_id) {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.update_paddle(conn_id, position);
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// One pass of the room's fixed-rate loop: join countdowns first, then
    /// the simulation tick while a match runs.
    fn tick(&mut self, now: u64) -> Flow {
        let mut activated: Vec<Uuid> = Vec::new();
        {
            let Self {
                joining,
                humans,
                events,
                ..
            } = self;
            for (conn, j) in joining.iter_mut() {
                if now >= j.next_tick_at {
                    j.countdown = j.countdown.saturating_sub(1);
                    j.next_tick_at += 1_000;
                    if let Some(seat) = humans.get(conn) {
                        let _ = events.send(ServerMsg::PlayerJoining {
                            player_id: *conn,
                            username: seat.username.clone(),
                            wall: seat.wall,
                            countdown: j.countdown,
                        });
                    }
                    if j.countdown == 0 {
                        activated.push(*conn);
                    }
                }
            }
        }

        for conn in activated {
            self.joining.remove(&conn);
            let Some(wall) = self.humans.get(&conn).map(|s| s.wall) else {
                continue;
            };
            if let Some(engine) = self.engine.as_mut() {
                engine.activate_wall(wall);
            }
            debug!(room_id = %self.id, wall = ?wall, "join protection lifted");
            self.broadcast_roster();
            if let Some(entry) = self.roster_entry(conn) {
                self.broadcast(ServerMsg::PlayerJoined { player: entry });
            }
        }

        if self.state == RoomState::Playing {
            if let Some(engine) = self.engine.as_mut() {
                let report = engine.tick(now);

                for event in report.events {
                    let _ = self.events.send(ServerMsg::GameEvent { event });
                }

                if report.finished {
                    let scores = engine.final_scores();
                    let _ = self.events.send(ServerMsg::GameOver { scores });

                    self.engine = None;
                    self.state = RoomState::Waiting;
                    self.update_info();
                    self.list_dirty = true;

                    info!(room_id = %self.id, "match ended, room back to waiting");
                    let room = self.room_data();
                    self.broadcast(ServerMsg::RoomUpdate { room });
                } else {
                    let snap = snapshot::build(engine, now);
                    let _ = self.events.send(snap);
                }
            }
        }

        Flow::Continue
    }

    // ------------------------------------------------------------------
    // Wall assignment and bot backfill
    // ------------------------------------------------------------------

    fn wall_occupant(&self, wall: Wall) -> Option<Occupant> {
        if let Some((conn, _)) = self.humans.iter().find(|(_, s)| s.wall == wall) {
            return Some(Occupant::Human(*conn));
        }
        if let Some(bot) = self.bots.values().find(|b| b.wall == wall) {
            return Some(Occupant::Bot(bot.id));
        }
        None
    }

    /// First free wall in the fixed priority order
    fn free_wall(&self) -> Option<Wall> {
        Wall::JOIN_ORDER
            .iter()
            .copied()
            .find(|w| self.wall_occupant(*w).is_none())
    }

    /// Remove a random bot and hand back the wall it occupied
    fn evict_random_bot(&mut self) -> Option<Wall> {
        let ids: Vec<Uuid> = self.bots.keys().copied().collect();
        if ids.is_empty() {
            return None;
        }
        let id = ids[rand::thread_rng().gen_range(0..ids.len())];
        let bot = self.bots.remove(&id)?;

        if let Some(engine) = self.engine.as_mut() {
            engine.remove_bot(bot.wall);
        }

        debug!(room_id = %self.id, name = %bot.name, wall = ?bot.wall, "bot evicted for joining player");
        Some(bot.wall)
    }

    /// Smallest bot number not currently in use ("Bot 1", "Bot 2", ...)
    fn next_bot_name(&self) -> String {
        let used: Vec<u32> = self
            .bots
            .values()
            .filter_map(|b| b.name.strip_prefix("Bot ").and_then(|n| n.parse().ok()))
            .collect();
        let mut n = 1;
        while used.contains(&n) {
            n += 1;
        }
        format!("Bot {}", n)
    }

    /// Fill all empty walls with bots after the first human joins
    fn backfill_initial_bots(&mut self) {
        for wall in Wall::BACKFILL_ORDER {
            if self.bots.len() >= INITIAL_BOT_FILL {
                break;
            }
            if self.wall_occupant(wall).is_none() {
                let name = self.next_bot_name();
                let bot =
                    BotController::new(wall, name, self.difficulty, &mut rand::thread_rng());
                self.bots.insert(bot.id, bot);
            }
        }
        debug!(room_id = %self.id, bots = self.bots.len(), "bots backfilled");
    }

    /// Backfill one vacated wall, live-adding to the engine if playing
    fn add_bot_to_empty_wall(&mut self) -> Option<Wall> {
        let wall = Wall::BACKFILL_ORDER
            .iter()
            .copied()
            .find(|w| self.wall_occupant(*w).is_none())?;

        let name = self.next_bot_name();
        let bot = BotController::new(wall, name, self.difficulty, &mut rand::thread_rng());

        if let Some(engine) = self.engine.as_mut() {
            engine.seat_bot(bot.clone());
        }
        self.bots.insert(bot.id, bot);

        Some(wall)
    }

    // ------------------------------------------------------------------
    // Views and notifications
    // ------------------------------------------------------------------

    fn roster(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self
            .humans
            .iter()
            .map(|(conn, seat)| RosterEntry {
                id: *conn,
                username: seat.username.clone(),
                wall: seat.wall,
                is_bot: false,
                countdown: self.joining.get(conn).map(|j| j.countdown).unwrap_or(0),
            })
            .collect();

        entries.extend(self.bots.values().map(|bot| RosterEntry {
            id: bot.id,
            username: bot.name.clone(),
            wall: bot.wall,
            is_bot: true,
            countdown: 0,
        }));

        entries
    }

    fn roster_entry(&self, conn_id: Uuid) -> Option<RosterEntry> {
        self.humans.get(&conn_id).map(|seat| RosterEntry {
            id: conn_id,
            username: seat.username.clone(),
            wall: seat.wall,
            is_bot: false,
            countdown: self.joining.get(&conn_id).map(|j| j.countdown).unwrap_or(0),
        })
    }

    fn room_data(&self) -> RoomData {
        RoomData {
            id: self.id.clone(),
            host_id: self.host,
            game_state: self.state,
            players: self.roster(),
            has_password: self.password.is_some(),
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        let _ = self.events.send(msg);
    }

    fn broadcast_roster(&self) {
        self.broadcast(ServerMsg::PlayerListUpdate {
            players: self.roster(),
        });
        self.broadcast(ServerMsg::RoomUpdate {
            room: self.room_data(),
        });
    }

    fn update_info(&self) {
        self.info.player_count.store(self.humans.len(), Ordering::Relaxed);
        self.info.bot_count.store(self.bots.len(), Ordering::Relaxed);
        *self.info.state.lock() = self.state;
    }
}
