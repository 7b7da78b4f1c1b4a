//! Authoritative match simulation
//!
//! One engine instance lives inside its room's actor task and is stepped at
//! the fixed tick rate. All timestamps are passed in by the caller so the
//! whole simulation can be driven with a synthetic clock in tests.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{SessionRegistry, StatsStore};
use crate::util::time::tick_delta;
use crate::ws::protocol::{FinalScore, GameEvent};

use super::bot::BotController;
use super::effects::{EffectRegistry, Revert};
use super::physics::{Ball, PhysicsSystem};
use super::{
    Occupant, PowerUpKind, Wall, ARENA_SIZE, BALL_SIZE, BALL_SPEED, LAUNCH_DELAY_MS,
    PADDLE_LENGTH, POWERUP_LIFETIME_MS, POWERUP_SIZE, POWERUP_SPAWN_INTERVAL_MS, RETURN_BOOST,
    SPEED_RAMP_CAP, SPEED_RAMP_FACTOR, SPEED_RAMP_INTERVAL_MS,
};

/// Effect durations and factors
const SPEED_EFFECT_FACTOR: f32 = 1.8;
const SPEED_EFFECT_MS: u64 = 5_000;
const SIZE_EFFECT_FACTOR: f32 = 1.8;
const SIZE_EFFECT_MS: u64 = 6_000;
const DECOY_SPEED_FACTOR: f32 = 1.3;
const DECOY_LIFETIME_MS: u64 = 6_000;
const BLIND_EFFECT_MS: u64 = 4_000;
const REVERSE_EFFECT_MS: u64 = 5_000;

/// Paddle slot state (one per wall, created inert with the engine)
#[derive(Debug, Clone)]
pub struct Paddle {
    pub pos: f32,
    pub len: f32,
    pub score: i32,
    pub active: bool,
    pub occupant: Option<Occupant>,
    pub name: String,
    /// Mid-game join countdown shield: acts as a solid wall, exempt from scoring
    pub protected: bool,
    pub blind: bool,
    pub reverse: bool,
    pub shield: bool,
}

impl Paddle {
    fn inert(name: &str) -> Self {
        Self {
            pos: ARENA_SIZE / 2.0,
            len: PADDLE_LENGTH,
            score: 0,
            active: false,
            occupant: None,
            name: name.to_string(),
            protected: false,
            blind: false,
            reverse: false,
            shield: false,
        }
    }
}

/// The four paddle slots, indexable by wall
#[derive(Debug, Clone)]
pub struct Paddles([Paddle; 4]);

impl Paddles {
    fn new() -> Self {
        // Index order matches Wall::index: bottom, top, left, right
        Self([
            Paddle::inert("P1"),
            Paddle::inert("P2"),
            Paddle::inert("P3"),
            Paddle::inert("P4"),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Paddle> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Paddle> {
        self.0.iter_mut()
    }
}

impl Index<Wall> for Paddles {
    type Output = Paddle;

    fn index(&self, wall: Wall) -> &Paddle {
        &self.0[wall.index()]
    }
}

impl IndexMut<Wall> for Paddles {
    fn index_mut(&mut self, wall: Wall) -> &mut Paddle {
        &mut self.0[wall.index()]
    }
}

/// A spawned, unconsumed power-up
#[derive(Debug, Clone)]
pub struct PowerUp {
    pub x: f32,
    pub y: f32,
    pub kind: PowerUpKind,
    pub expires_at: u64,
}

/// Result of one simulation tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<GameEvent>,
    /// True exactly once, when the match clock reaches zero
    pub finished: bool,
}

/// The authoritative per-room match simulation
pub struct SimulationEngine {
    room_id: String,
    pub paddles: Paddles,
    pub balls: Vec<Ball>,
    pub powerups: Vec<PowerUp>,
    pub speed_multiplier: f32,
    /// Remaining match time in whole seconds
    pub time_left: u32,
    effects: EffectRegistry,
    bots: HashMap<Uuid, BotController>,
    last_clock_tick: u64,
    last_speed_increase: u64,
    last_powerup_spawn: u64,
    next_ball_id: u32,
    rng: ChaCha8Rng,
    stats: StatsStore,
    sessions: SessionRegistry,
}

impl SimulationEngine {
    pub fn new(
        room_id: String,
        duration_minutes: u32,
        seed: u64,
        now: u64,
        stats: StatsStore,
        sessions: SessionRegistry,
    ) -> Self {
        let mut ball = Ball::primary(0);
        ball.launch_at = Some(now + LAUNCH_DELAY_MS);

        info!(room_id = %room_id, duration_minutes, "simulation engine created");

        Self {
            room_id,
            paddles: Paddles::new(),
            balls: vec![ball],
            powerups: Vec::new(),
            speed_multiplier: 1.0,
            time_left: duration_minutes * 60,
            effects: EffectRegistry::new(),
            bots: HashMap::new(),
            last_clock_tick: now,
            last_speed_increase: now,
            last_powerup_spawn: now,
            next_ball_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats,
            sessions,
        }
    }

    // ------------------------------------------------------------------
    // Roster management (driven by the room lifecycle)
    // ------------------------------------------------------------------

    /// Seat a human on a wall (match start, or takeover of a bot's wall)
    pub fn seat_human(&mut self, wall: Wall, conn_id: Uuid, username: &str) {
        let paddle = &mut self.paddles[wall];
        paddle.active = true;
        paddle.occupant = Some(Occupant::Human(conn_id));
        paddle.name = username.to_string();
        paddle.protected = false;
    }

    /// Seat a human joining mid-game; the paddle stays a solid wall until the
    /// countdown ends
    pub fn seat_joining_human(&mut self, wall: Wall, conn_id: Uuid, username: &str) {
        self.seat_human(wall, conn_id, username);
        let paddle = &mut self.paddles[wall];
        paddle.protected = true;
        paddle.score = 0;
    }

    /// Lift join protection after the countdown
    pub fn activate_wall(&mut self, wall: Wall) {
        self.paddles[wall].protected = false;
    }

    /// Seat a bot and register its controller
    pub fn seat_bot(&mut self, controller: BotController) {
        let paddle = &mut self.paddles[controller.wall];
        paddle.active = true;
        paddle.occupant = Some(Occupant::Bot(controller.id));
        paddle.name = controller.name.clone();
        paddle.protected = false;
        paddle.score = 0;
        paddle.pos = ARENA_SIZE / 2.0;
        debug!(room_id = %self.room_id, wall = ?controller.wall, name = %controller.name, "bot seated");
        self.bots.insert(controller.id, controller);
    }

    /// Remove the bot occupying a wall (a human is taking it over)
    pub fn remove_bot(&mut self, wall: Wall) {
        let paddle = &mut self.paddles[wall];
        if let Some(Occupant::Bot(id)) = paddle.occupant {
            self.bots.remove(&id);
            paddle.active = false;
            paddle.occupant = None;
        }
    }

    /// Deactivate a wall after its human leaves. The paddle is kept (it may
    /// be backfilled) but no longer participates in scoring.
    pub fn deactivate_wall(&mut self, wall: Wall) {
        self.paddles[wall].active = false;
    }

    /// Apply a client paddle intent. Clamping here is the only validation
    /// performed on client-supplied positions.
    pub fn update_paddle(&mut self, conn_id: Uuid, position: f32) {
        for paddle in self.paddles.iter_mut() {
            if paddle.occupant == Some(Occupant::Human(conn_id)) {
                paddle.pos = PhysicsSystem::clamp_paddle(position, paddle.len);
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Tick loop
    // ------------------------------------------------------------------

    /// Advance the simulation one tick. `now` is milliseconds since epoch
    /// (or any monotonic test clock).
    pub fn tick(&mut self, now: u64) -> TickReport {
        let mut report = TickReport::default();

        // Match clock: integer countdown, once per elapsed second. Expiry is
        // checked before anything else runs this tick.
        if now.saturating_sub(self.last_clock_tick) >= 1_000 {
            self.time_left = self.time_left.saturating_sub(1);
            self.last_clock_tick = now;
            if self.time_left == 0 {
                info!(room_id = %self.room_id, "match clock expired");
                self.persist_final_scores();
                report.finished = true;
                return report;
            }
        }

        self.step_bots(now);

        if now.saturating_sub(self.last_powerup_spawn) > POWERUP_SPAWN_INTERVAL_MS {
            self.spawn_powerup(now);
            self.last_powerup_spawn = now;
        }

        // Unconsumed power-ups expire silently
        self.powerups.retain(|pu| now < pu.expires_at);

        // Progressive speed ramp
        if now.saturating_sub(self.last_speed_increase) > SPEED_RAMP_INTERVAL_MS {
            self.speed_multiplier = (self.speed_multiplier * SPEED_RAMP_FACTOR).min(SPEED_RAMP_CAP);
            self.last_speed_increase = now;
            for ball in self.balls.iter_mut().filter(|b| !b.is_decoy) {
                ball.scale_speed(SPEED_RAMP_FACTOR);
            }
            debug!(room_id = %self.room_id, multiplier = self.speed_multiplier, "ball speed ramped");
        }

        // Timed effect reversions (target existence is checked on apply)
        for revert in self.effects.due(now) {
            self.apply_revert(revert);
        }

        // Pending launches
        for ball in self.balls.iter_mut() {
            if ball.launch_at.is_some_and(|at| now >= at) {
                ball.launch_at = None;
                let speed = BALL_SPEED * self.speed_multiplier;
                let (vx, vy) = PhysicsSystem::launch_velocity(speed, &mut self.rng);
                ball.vx = vx;
                ball.vy = vy;
            }
        }

        // Integrate balls, resolve wall crossings, consume power-ups
        let dt = tick_delta();
        let mut i = 0;
        while i < self.balls.len() {
            self.balls[i].advance(dt);

            let (x_wall, _) = PhysicsSystem::crossings(&self.balls[i]);
            let mut removed = false;
            if let Some(wall) = x_wall {
                removed = self.resolve_wall_hit(i, wall, now, &mut report.events);
            }
            if !removed {
                // Re-read: the x-axis resolution may have moved the ball
                let (_, y_wall) = PhysicsSystem::crossings(&self.balls[i]);
                if let Some(wall) = y_wall {
                    removed = self.resolve_wall_hit(i, wall, now, &mut report.events);
                }
            }
            if removed {
                continue;
            }

            let mut j = 0;
            while j < self.powerups.len() {
                let ball = &self.balls[i];
                let pu = &self.powerups[j];
                let dx = ball.x - pu.x;
                let dy = ball.y - pu.y;
                if (dx * dx + dy * dy).sqrt() < BALL_SIZE + POWERUP_SIZE / 2.0 {
                    let pu = self.powerups.remove(j);
                    self.apply_powerup(pu, i, now);
                } else {
                    j += 1;
                }
            }

            i += 1;
        }

        report
    }

    /// Resolve a ball crossing a wall boundary. Returns true if the ball was
    /// removed (decoy miss).
    fn resolve_wall_hit(
        &mut self,
        ball_idx: usize,
        wall: Wall,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let (active, protected) = {
            let p = &self.paddles[wall];
            (p.active, p.protected)
        };

        // Empty and protected walls are solid reflectors: no scoring, no
        // hitter change.
        if !active || protected {
            PhysicsSystem::bounce(&mut self.balls[ball_idx], wall);
            return false;
        }

        let (paddle_pos, paddle_len, has_shield) = {
            let p = &self.paddles[wall];
            (p.pos, p.len, p.shield)
        };
        let coord = PhysicsSystem::along_wall_coord(&self.balls[ball_idx], wall);

        if PhysicsSystem::paddle_blocks(paddle_pos, paddle_len, coord) {
            // Successful return
            let ball = &mut self.balls[ball_idx];
            PhysicsSystem::bounce(ball, wall);
            ball.last_hitter = Some(wall);
            if !ball.is_decoy {
                ball.scale_speed(RETURN_BOOST);
            }
            self.credit_return(wall);
            return false;
        }

        // Miss. Decoys just vanish.
        if self.balls[ball_idx].is_decoy {
            let removed = self.balls.remove(ball_idx);
            self.effects.cancel_ball(removed.id);
            return true;
        }

        if has_shield {
            self.paddles[wall].shield = false;
            PhysicsSystem::bounce(&mut self.balls[ball_idx], wall);
            events.push(GameEvent::ShieldSave { wall });
            return false;
        }

        // Goal
        let hitter = self.balls[ball_idx].last_hitter;
        let hitter_score = hitter.map(|hw| {
            self.paddles[hw].score += 1;
            self.paddles[hw].score
        });

        let conceder = &mut self.paddles[wall];
        conceder.score -= 1;
        conceder.blind = false;
        let score = conceder.score;

        self.reset_ball(ball_idx, now);
        events.push(GameEvent::Score {
            wall,
            score,
            hitter,
            hitter_score,
        });
        false
    }

    /// Park the ball at center and schedule a fresh launch
    fn reset_ball(&mut self, ball_idx: usize, now: u64) {
        let ball = &mut self.balls[ball_idx];
        ball.x = ARENA_SIZE / 2.0;
        ball.y = ARENA_SIZE / 2.0;
        ball.vx = 0.0;
        ball.vy = 0.0;
        ball.last_hitter = None;
        ball.launch_at = Some(now + LAUNCH_DELAY_MS);
    }

    /// Lifetime return counter for registered users (guests are skipped)
    fn credit_return(&mut self, wall: Wall) {
        if let Some(Occupant::Human(conn)) = self.paddles[wall].occupant {
            if let Some(session) = self.sessions.get(conn) {
                if !session.is_guest {
                    self.stats.record(&session.username, 0, 1);
                }
            }
        }
    }

    fn step_bots(&mut self, now: u64) {
        let Self {
            paddles,
            balls,
            bots,
            rng,
            ..
        } = self;

        for paddle in paddles.iter_mut() {
            if !paddle.active {
                continue;
            }
            if let Some(Occupant::Bot(id)) = paddle.occupant {
                if let Some(bot) = bots.get_mut(&id) {
                    let pos = bot.step(balls, now, rng);
                    paddle.pos = PhysicsSystem::clamp_paddle(pos, paddle.len);
                }
            }
        }
    }

    fn spawn_powerup(&mut self, now: u64) {
        let kind = PowerUpKind::ALL[self.rng.gen_range(0..PowerUpKind::ALL.len())];
        let x = self.rng.gen_range(100.0..ARENA_SIZE - 100.0);
        let y = self.rng.gen_range(100.0..ARENA_SIZE - 100.0);
        self.powerups.push(PowerUp {
            x,
            y,
            kind,
            expires_at: now + POWERUP_LIFETIME_MS,
        });
    }

    /// Dispatch a consumed power-up. Self-targeted kinds go to the last
    /// hitter; the rest hit every other active paddle. Inactive targets are
    /// silently skipped.
    fn apply_powerup(&mut self, pu: PowerUp, ball_idx: usize, now: u64) {
        let last_hitter = self.balls[ball_idx].last_hitter;

        match pu.kind {
            PowerUpKind::Speed => {
                if let Some(wall) = last_hitter {
                    if self.paddles[wall].active {
                        let ball = &mut self.balls[ball_idx];
                        ball.scale_speed(SPEED_EFFECT_FACTOR);
                        self.effects.schedule(
                            now + SPEED_EFFECT_MS,
                            Revert::BallSpeed {
                                ball: ball.id,
                                factor: SPEED_EFFECT_FACTOR,
                            },
                        );
                    }
                }
            }
            PowerUpKind::Size => {
                if let Some(wall) = last_hitter {
                    if self.paddles[wall].active {
                        let paddle = &mut self.paddles[wall];
                        paddle.len = PADDLE_LENGTH * SIZE_EFFECT_FACTOR;
                        paddle.pos = PhysicsSystem::clamp_paddle(paddle.pos, paddle.len);
                        self.effects
                            .schedule(now + SIZE_EFFECT_MS, Revert::PaddleSize { wall });
                    }
                }
            }
            PowerUpKind::Shield => {
                if let Some(wall) = last_hitter {
                    if self.paddles[wall].active {
                        self.paddles[wall].shield = true;
                    }
                }
            }
            PowerUpKind::Fake => self.spawn_decoy(last_hitter, now),
            PowerUpKind::Blind => {
                for wall in self.disrupted_walls(last_hitter) {
                    self.paddles[wall].blind = true;
                    self.effects
                        .schedule(now + BLIND_EFFECT_MS, Revert::Blind { wall });
                }
            }
            PowerUpKind::Reverse => {
                for wall in self.disrupted_walls(last_hitter) {
                    self.paddles[wall].reverse = true;
                    self.effects
                        .schedule(now + REVERSE_EFFECT_MS, Revert::Reverse { wall });
                }
            }
        }
    }

    /// Every active wall except the last hitter
    fn disrupted_walls(&self, last_hitter: Option<Wall>) -> Vec<Wall> {
        Wall::JOIN_ORDER
            .iter()
            .copied()
            .filter(|w| Some(*w) != last_hitter && self.paddles[*w].active)
            .collect()
    }

    /// Spawn one decoy aimed at a random non-hitter opponent's wall center
    fn spawn_decoy(&mut self, last_hitter: Option<Wall>, now: u64) {
        let opponents = self.disrupted_walls(last_hitter);
        if opponents.is_empty() {
            return;
        }

        let target = opponents[self.rng.gen_range(0..opponents.len())];
        let jitter = (self.rng.gen::<f32>() - 0.5) * 0.5; // +/- ~15 degrees
        let (vx, vy) =
            PhysicsSystem::aim_from_center(target.center(), BALL_SPEED * DECOY_SPEED_FACTOR, jitter);

        let id = self.next_ball_id;
        self.next_ball_id += 1;
        self.balls.push(Ball::decoy(id, vx, vy));
        self.effects
            .schedule(now + DECOY_LIFETIME_MS, Revert::DecoyExpiry { ball: id });
    }

    /// Apply a fired reversion; targets that disappeared in the meantime are
    /// no-ops.
    fn apply_revert(&mut self, revert: Revert) {
        match revert {
            Revert::BallSpeed { ball, factor } => {
                if let Some(b) = self.balls.iter_mut().find(|b| b.id == ball) {
                    b.vx /= factor;
                    b.vy /= factor;
                }
            }
            Revert::PaddleSize { wall } => {
                self.paddles[wall].len = PADDLE_LENGTH;
            }
            Revert::Blind { wall } => {
                self.paddles[wall].blind = false;
            }
            Revert::Reverse { wall } => {
                self.paddles[wall].reverse = false;
            }
            Revert::DecoyExpiry { ball } => {
                if let Some(idx) = self.balls.iter().position(|b| b.id == ball) {
                    let removed = self.balls.remove(idx);
                    self.effects.cancel_ball(removed.id);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Match end
    // ------------------------------------------------------------------

    /// Final scores for all active paddles, reported as-is
    pub fn final_scores(&self) -> Vec<FinalScore> {
        self.paddles
            .iter()
            .filter(|p| p.active)
            .map(|p| FinalScore {
                username: p.name.clone(),
                score: p.score,
                is_bot: p.occupant.is_some_and(|o| o.is_bot()),
            })
            .collect()
    }

    /// Best-effort high-score submission for registered humans
    fn persist_final_scores(&self) {
        for paddle in self.paddles.iter() {
            if !paddle.active {
                continue;
            }
            if let Some(Occupant::Human(conn)) = paddle.occupant {
                if let Some(session) = self.sessions.get(conn) {
                    if !session.is_guest {
                        self.stats.record(&session.username, paddle.score as i64, 0);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 100_000;

    fn test_engine() -> SimulationEngine {
        SimulationEngine::new(
            "test-room".to_string(),
            3,
            42,
            T0,
            StatsStore::disabled(),
            SessionRegistry::new(),
        )
    }

    fn seat_human(engine: &mut SimulationEngine, wall: Wall, name: &str) -> Uuid {
        let conn = Uuid::new_v4();
        engine.seat_human(wall, conn, name);
        conn
    }

    /// Park the primary ball mid-air with an explicit trajectory
    fn set_ball(engine: &mut SimulationEngine, x: f32, y: f32, vx: f32, vy: f32) {
        let ball = &mut engine.balls[0];
        ball.x = x;
        ball.y = y;
        ball.vx = vx;
        ball.vy = vy;
        ball.launch_at = None;
    }

    #[test]
    fn ball_parks_then_launches_at_base_speed() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");

        engine.tick(T0 + 16);
        assert_eq!(engine.balls[0].speed(), 0.0);
        assert!(engine.balls[0].launch_at.is_some());

        engine.tick(T0 + 600);
        let speed = engine.balls[0].speed();
        assert!((speed - BALL_SPEED).abs() < 1.0, "launch speed {speed}");
    }

    #[test]
    fn miss_outside_paddle_reach_scores_against_wall() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Right, "bob");
        // Paddle at 400, len 100, reach 400 +/- 60; ball arrives at y=470
        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);

        let report = engine.tick(T0 + 16);
        assert_eq!(report.events.len(), 1);
        match &report.events[0] {
            GameEvent::Score {
                wall,
                score,
                hitter,
                hitter_score,
            } => {
                assert_eq!(*wall, Wall::Right);
                assert_eq!(*score, -1);
                assert!(hitter.is_none());
                assert!(hitter_score.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(engine.paddles[Wall::Right].score, -1);
        // Ball reset to center with a pending launch
        assert_eq!(engine.balls[0].x, ARENA_SIZE / 2.0);
        assert!(engine.balls[0].launch_at.is_some());
    }

    #[test]
    fn return_within_reach_reflects_boosts_and_credits_hitter() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Right, "bob");
        set_ball(&mut engine, 795.0, 405.0, 600.0, 0.0);

        let report = engine.tick(T0 + 16);
        assert!(report.events.is_empty());

        let ball = &engine.balls[0];
        assert!(ball.vx < 0.0, "ball should reflect off the right paddle");
        assert_eq!(ball.last_hitter, Some(Wall::Right));
        assert!((ball.speed() - BALL_SPEED * RETURN_BOOST).abs() < 1.0);
        assert_eq!(engine.paddles[Wall::Right].score, 0);
    }

    #[test]
    fn goal_transfers_exactly_one_point() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        seat_human(&mut engine, Wall::Right, "bob");
        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);
        engine.balls[0].last_hitter = Some(Wall::Bottom);

        let report = engine.tick(T0 + 16);
        assert_eq!(engine.paddles[Wall::Bottom].score, 1);
        assert_eq!(engine.paddles[Wall::Right].score, -1);
        match &report.events[0] {
            GameEvent::Score {
                hitter,
                hitter_score,
                ..
            } => {
                assert_eq!(*hitter, Some(Wall::Bottom));
                assert_eq!(*hitter_score, Some(1));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn shield_absorbs_goal_and_is_consumed() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Right, "bob");
        engine.paddles[Wall::Right].shield = true;
        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);

        let report = engine.tick(T0 + 16);
        assert!(matches!(report.events[0], GameEvent::ShieldSave { wall: Wall::Right }));
        assert!(!engine.paddles[Wall::Right].shield);
        assert_eq!(engine.paddles[Wall::Right].score, 0);
        assert!(engine.balls[0].vx < 0.0, "shield save still reflects");
    }

    #[test]
    fn protected_paddle_is_a_solid_wall_and_never_scores() {
        let mut engine = test_engine();
        let conn = Uuid::new_v4();
        engine.seat_joining_human(Wall::Right, conn, "newbie");
        assert!(engine.paddles[Wall::Right].protected);

        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);
        let report = engine.tick(T0 + 16);

        assert!(report.events.is_empty());
        assert_eq!(engine.paddles[Wall::Right].score, 0);
        assert!(engine.balls[0].vx < 0.0, "protected wall reflects");
        assert!(engine.balls[0].last_hitter.is_none());

        engine.activate_wall(Wall::Right);
        assert!(!engine.paddles[Wall::Right].protected);
    }

    #[test]
    fn inactive_wall_reflects_without_scoring() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);

        let report = engine.tick(T0 + 16);
        assert!(report.events.is_empty());
        assert!(engine.balls[0].vx < 0.0);
    }

    #[test]
    fn corner_crossing_resolves_both_axes_in_one_tick() {
        let mut engine = test_engine();
        set_ball(&mut engine, 794.0, 794.0, 600.0, 600.0);

        engine.tick(T0 + 16);
        let ball = &engine.balls[0];
        assert!(ball.vx < 0.0 && ball.vy < 0.0, "both axes reflected");
        assert!(ball.x + BALL_SIZE < ARENA_SIZE && ball.y + BALL_SIZE < ARENA_SIZE);
    }

    #[test]
    fn decoy_miss_is_removed_silently() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Right, "bob");
        engine.balls.push(Ball::decoy(99, 600.0, 0.0));
        engine.balls[1].x = 795.0;
        engine.balls[1].y = 470.0;

        let report = engine.tick(T0 + 16);
        assert!(report.events.is_empty());
        assert_eq!(engine.balls.len(), 1);
        assert_eq!(engine.paddles[Wall::Right].score, 0);
    }

    #[test]
    fn match_clock_finishes_after_duration() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        engine.balls.clear(); // isolate the clock from collisions

        let mut finished_at = None;
        for s in 1..=181u64 {
            let report = engine.tick(T0 + s * 1_000);
            if report.finished {
                finished_at = Some(s);
                break;
            }
        }

        assert_eq!(finished_at, Some(180), "3 minute match runs 180 seconds");
        assert_eq!(engine.time_left, 0);

        let scores = engine.final_scores();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].username, "alice");
    }

    #[test]
    fn speed_ramp_is_monotone_and_capped() {
        let mut engine = test_engine();
        engine.balls.clear();

        let mut last = engine.speed_multiplier;
        for s in 1..=179u64 {
            engine.tick(T0 + s * 1_000);
            assert!(engine.speed_multiplier >= last);
            assert!(engine.speed_multiplier <= SPEED_RAMP_CAP);
            last = engine.speed_multiplier;
        }
        // 11 ramps of 8% pass 2.0, so the cap must have engaged
        assert_eq!(last, SPEED_RAMP_CAP);
    }

    #[test]
    fn powerups_spawn_and_expire_on_schedule() {
        let mut engine = test_engine();
        engine.balls.clear();

        engine.tick(T0 + POWERUP_SPAWN_INTERVAL_MS + 100);
        assert_eq!(engine.powerups.len(), 1);
        let expires = engine.powerups[0].expires_at;
        assert_eq!(expires, T0 + POWERUP_SPAWN_INTERVAL_MS + 100 + POWERUP_LIFETIME_MS);

        // Just before the next spawn window: the unconsumed power-up is gone
        engine.tick(expires + 100);
        assert!(engine.powerups.iter().all(|pu| pu.expires_at != expires));
    }

    #[test]
    fn size_powerup_grows_last_hitter_and_reverts() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        set_ball(&mut engine, 400.0, 400.0, 0.0, 0.0);
        engine.balls[0].last_hitter = Some(Wall::Bottom);
        engine.powerups.push(PowerUp {
            x: 400.0,
            y: 400.0,
            kind: PowerUpKind::Size,
            expires_at: T0 + 60_000,
        });

        engine.tick(T0 + 16);
        assert!(engine.powerups.is_empty(), "contact consumes the power-up");
        assert_eq!(engine.paddles[Wall::Bottom].len, PADDLE_LENGTH * 1.8);

        engine.tick(T0 + 16 + SIZE_EFFECT_MS + 1);
        assert_eq!(engine.paddles[Wall::Bottom].len, PADDLE_LENGTH);
    }

    #[test]
    fn speed_powerup_boosts_ball_and_reverts() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        set_ball(&mut engine, 400.0, 400.0, 60.0, 0.0);
        engine.balls[0].last_hitter = Some(Wall::Bottom);
        engine.powerups.push(PowerUp {
            x: 401.0,
            y: 400.0,
            kind: PowerUpKind::Speed,
            expires_at: T0 + 60_000,
        });

        engine.tick(T0 + 16);
        assert!((engine.balls[0].speed() - 60.0 * SPEED_EFFECT_FACTOR).abs() < 0.5);

        engine.tick(T0 + 16 + SPEED_EFFECT_MS + 1);
        assert!((engine.balls[0].speed() - 60.0).abs() < 0.5);
    }

    #[test]
    fn fake_powerup_spawns_one_decoy_that_expires() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        seat_human(&mut engine, Wall::Top, "bob");
        seat_human(&mut engine, Wall::Left, "carol");
        set_ball(&mut engine, 400.0, 400.0, 0.0, 0.0);
        engine.balls[0].last_hitter = Some(Wall::Bottom);
        engine.powerups.push(PowerUp {
            x: 400.0,
            y: 400.0,
            kind: PowerUpKind::Fake,
            expires_at: T0 + 60_000,
        });

        engine.tick(T0 + 16);
        assert_eq!(engine.balls.len(), 2, "exactly one decoy spawned");
        let decoy = &engine.balls[1];
        assert!(decoy.is_decoy);
        assert!((decoy.speed() - BALL_SPEED * DECOY_SPEED_FACTOR).abs() < 1.0);

        engine.tick(T0 + 16 + DECOY_LIFETIME_MS + 1);
        assert_eq!(engine.balls.len(), 1, "decoy removed after its lifetime");
    }

    #[test]
    fn disruptive_powerup_skips_last_hitter_and_inactive_walls() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Bottom, "alice");
        seat_human(&mut engine, Wall::Top, "bob");
        set_ball(&mut engine, 400.0, 400.0, 0.0, 0.0);
        engine.balls[0].last_hitter = Some(Wall::Bottom);
        engine.powerups.push(PowerUp {
            x: 400.0,
            y: 400.0,
            kind: PowerUpKind::Blind,
            expires_at: T0 + 60_000,
        });

        engine.tick(T0 + 16);
        assert!(!engine.paddles[Wall::Bottom].blind, "hitter is spared");
        assert!(engine.paddles[Wall::Top].blind);
        assert!(!engine.paddles[Wall::Left].blind, "inactive wall untouched");

        engine.tick(T0 + 16 + BLIND_EFFECT_MS + 1);
        assert!(!engine.paddles[Wall::Top].blind);
    }

    #[test]
    fn conceding_a_goal_clears_blind() {
        let mut engine = test_engine();
        seat_human(&mut engine, Wall::Right, "bob");
        engine.paddles[Wall::Right].blind = true;
        set_ball(&mut engine, 795.0, 470.0, 600.0, 0.0);

        engine.tick(T0 + 16);
        assert!(!engine.paddles[Wall::Right].blind);
    }

    #[test]
    fn paddle_input_is_clamped_to_legal_range() {
        let mut engine = test_engine();
        let conn = seat_human(&mut engine, Wall::Bottom, "alice");

        engine.update_paddle(conn, 10_000.0);
        assert_eq!(engine.paddles[Wall::Bottom].pos, ARENA_SIZE - PADDLE_LENGTH / 2.0);

        engine.update_paddle(conn, -10_000.0);
        assert_eq!(engine.paddles[Wall::Bottom].pos, PADDLE_LENGTH / 2.0);
    }

    #[test]
    fn bot_takeover_and_backfill_keep_one_occupant_per_wall() {
        let mut engine = test_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let bot = BotController::new(
            Wall::Left,
            "Bot 1".to_string(),
            super::super::BotDifficulty::Hard,
            &mut rng,
        );
        engine.seat_bot(bot);
        assert!(engine.paddles[Wall::Left].active);

        engine.remove_bot(Wall::Left);
        assert!(!engine.paddles[Wall::Left].active);
        assert!(engine.paddles[Wall::Left].occupant.is_none());

        let conn = Uuid::new_v4();
        engine.seat_human(Wall::Left, conn, "dave");
        assert_eq!(
            engine.paddles[Wall::Left].occupant,
            Some(Occupant::Human(conn))
        );
    }

    #[test]
    fn bots_track_the_ball_within_paddle_bounds() {
        let mut engine = test_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let bot = BotController::new(
            Wall::Bottom,
            "Bot 1".to_string(),
            super::super::BotDifficulty::Hard,
            &mut rng,
        );
        engine.seat_bot(bot);
        set_ball(&mut engine, 200.0, 200.0, 0.0, 600.0);

        for s in 0..120u64 {
            engine.tick(T0 + 16 * (s + 1));
            let p = &engine.paddles[Wall::Bottom];
            assert!(p.pos >= p.len / 2.0 && p.pos <= ARENA_SIZE - p.len / 2.0);
        }
    }
}
