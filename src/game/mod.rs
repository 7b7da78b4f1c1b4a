//! Game simulation modules

pub mod bot;
pub mod effects;
pub mod engine;
pub mod physics;
pub mod snapshot;

pub use bot::{BotController, BotDifficulty};
pub use engine::SimulationEngine;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Arena geometry and simulation constants
pub const ARENA_SIZE: f32 = 800.0;
pub const PADDLE_LENGTH: f32 = 100.0;
pub const BALL_SIZE: f32 = 10.0;
pub const BALL_SPEED: f32 = 600.0;
pub const POWERUP_SIZE: f32 = 50.0;

/// Power-up lifetime and spawn cadence (milliseconds)
pub const POWERUP_LIFETIME_MS: u64 = 8_000;
pub const POWERUP_SPAWN_INTERVAL_MS: u64 = 8_000;

/// Stationary pause before a reset ball launches
pub const LAUNCH_DELAY_MS: u64 = 500;

/// Progressive speed ramp: every 15 s the global multiplier grows 8%, capped at 2x
pub const SPEED_RAMP_INTERVAL_MS: u64 = 15_000;
pub const SPEED_RAMP_FACTOR: f32 = 1.08;
pub const SPEED_RAMP_CAP: f32 = 2.0;

/// Per-successful-return ball speed boost
pub const RETURN_BOOST: f32 = 1.05;

/// One of the four paddle-owning walls bounding the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wall {
    Top,
    Bottom,
    Left,
    Right,
}

impl Wall {
    /// All walls in the fixed join-priority order
    pub const JOIN_ORDER: [Wall; 4] = [Wall::Bottom, Wall::Top, Wall::Left, Wall::Right];

    /// All walls in backfill order (matches the lobby's bot numbering)
    pub const BACKFILL_ORDER: [Wall; 4] = [Wall::Top, Wall::Bottom, Wall::Left, Wall::Right];

    /// Paddles on top/bottom slide along the x axis
    pub fn is_horizontal(self) -> bool {
        matches!(self, Wall::Top | Wall::Bottom)
    }

    /// Center point of this wall in arena coordinates
    pub fn center(self) -> (f32, f32) {
        match self {
            Wall::Top => (ARENA_SIZE / 2.0, 0.0),
            Wall::Bottom => (ARENA_SIZE / 2.0, ARENA_SIZE),
            Wall::Left => (0.0, ARENA_SIZE / 2.0),
            Wall::Right => (ARENA_SIZE, ARENA_SIZE / 2.0),
        }
    }

    /// Fixed array index for wall-keyed storage
    pub fn index(self) -> usize {
        match self {
            Wall::Bottom => 0,
            Wall::Top => 1,
            Wall::Left => 2,
            Wall::Right => 3,
        }
    }
}

/// Who owns a paddle slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Human(Uuid),
    Bot(Uuid),
}

impl Occupant {
    pub fn is_bot(self) -> bool {
        matches!(self, Occupant::Bot(_))
    }
}

/// The six power-up kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Speed,
    Size,
    Fake,
    Blind,
    Reverse,
    Shield,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::Speed,
        PowerUpKind::Size,
        PowerUpKind::Fake,
        PowerUpKind::Blind,
        PowerUpKind::Reverse,
        PowerUpKind::Shield,
    ];
}
