//! AI paddle controller
//!
//! Each bot tracks the primary ball and steers its paddle with profile-tuned
//! sloppiness: delayed reactions, imperfect aim, and the occasional
//! intentional whiff so lower difficulties feel human.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::physics::Ball;
use super::{Wall, ARENA_SIZE};

/// How often a bot re-decides whether to throw the current approach
const MISS_DECISION_INTERVAL_MS: u64 = 500;

/// Offset from arena center used when intentionally missing
const MISS_OFFSET: f32 = 150.0;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotDifficulty {
    Low,
    Medium,
    Hard,
}

impl Default for BotDifficulty {
    fn default() -> Self {
        Self::Hard
    }
}

/// Tuning constants per difficulty level
#[derive(Debug, Clone, Copy)]
pub struct DifficultyProfile {
    /// Delay before reacting to a fresh approach (rolled per bot, ms)
    pub reaction_delay_ms: (u64, u64),
    /// Aim quality (rolled per bot, scales the prediction error spread)
    pub accuracy: (f32, f32),
    /// Per-tick smoothing gain toward the target position
    pub move_speed: f32,
    /// Base magnitude of aim error in arena units
    pub prediction_error: f32,
    /// Probability of intentionally missing an approach
    pub miss_chance: f64,
    /// Exponential drift rate toward center while the ball recedes
    pub center_drift: f32,
    /// Amplitude of per-tick positional jitter
    pub jitter: f32,
    /// Forward-simulation steps for arrival prediction (0 = raw ball position)
    pub predict_iterations: u32,
}

impl DifficultyProfile {
    pub fn for_level(level: BotDifficulty) -> Self {
        match level {
            BotDifficulty::Low => Self {
                reaction_delay_ms: (300, 500),
                accuracy: (0.2, 0.4),
                move_speed: 0.03,
                prediction_error: 150.0,
                miss_chance: 0.25,
                center_drift: 0.003,
                jitter: 5.0,
                predict_iterations: 0,
            },
            BotDifficulty::Medium => Self {
                reaction_delay_ms: (150, 250),
                accuracy: (0.5, 0.7),
                move_speed: 0.07,
                prediction_error: 70.0,
                miss_chance: 0.10,
                center_drift: 0.008,
                jitter: 2.0,
                predict_iterations: 300,
            },
            BotDifficulty::Hard => Self {
                reaction_delay_ms: (30, 80),
                accuracy: (0.85, 0.95),
                move_speed: 0.18,
                prediction_error: 15.0,
                miss_chance: 0.02,
                center_drift: 0.02,
                jitter: 0.0,
                predict_iterations: 1000,
            },
        }
    }
}

/// AI state for one bot-owned paddle
#[derive(Debug, Clone)]
pub struct BotController {
    pub id: Uuid,
    pub name: String,
    pub wall: Wall,
    pub difficulty: BotDifficulty,
    profile: DifficultyProfile,
    /// Rolled once per bot from the profile range
    reaction_delay_ms: u64,
    /// Rolled once per bot from the profile range
    accuracy: f32,
    target_position: f32,
    current_position: f32,
    last_decision_at: u64,
    should_miss: bool,
    approach_started_at: Option<u64>,
}

impl BotController {
    pub fn new<R: Rng>(wall: Wall, name: String, difficulty: BotDifficulty, rng: &mut R) -> Self {
        let profile = DifficultyProfile::for_level(difficulty);
        let reaction_delay_ms =
            rng.gen_range(profile.reaction_delay_ms.0..=profile.reaction_delay_ms.1);
        let accuracy = rng.gen_range(profile.accuracy.0..profile.accuracy.1);

        Self {
            id: Uuid::new_v4(),
            name,
            wall,
            difficulty,
            profile,
            reaction_delay_ms,
            accuracy,
            target_position: ARENA_SIZE / 2.0,
            current_position: ARENA_SIZE / 2.0,
            last_decision_at: 0,
            should_miss: false,
            approach_started_at: None,
        }
    }

    /// Produce the next paddle position. Called once per tick by the engine,
    /// which clamps the result to the paddle's legal range.
    pub fn step<R: Rng>(&mut self, balls: &[Ball], now: u64, rng: &mut R) -> f32 {
        let Some(main_ball) = balls.iter().find(|b| !b.is_decoy).or_else(|| balls.first())
        else {
            return self.current_position;
        };

        let approaching = match self.wall {
            Wall::Top => main_ball.vy < 0.0,
            Wall::Bottom => main_ball.vy > 0.0,
            Wall::Left => main_ball.vx < 0.0,
            Wall::Right => main_ball.vx > 0.0,
        };

        if approaching {
            let started = *self.approach_started_at.get_or_insert(now);

            // Decide once per approach window whether to throw this one
            if now.saturating_sub(self.last_decision_at) > MISS_DECISION_INTERVAL_MS {
                self.should_miss = rng.gen_bool(self.profile.miss_chance);
                self.last_decision_at = now;
            }

            // Hold the previous target until the rolled reaction delay elapses
            if now.saturating_sub(started) >= self.reaction_delay_ms {
                if self.should_miss {
                    let wrong_side = if rng.gen_bool(0.5) { MISS_OFFSET } else { -MISS_OFFSET };
                    self.target_position = ARENA_SIZE / 2.0 + wrong_side;
                } else {
                    let predicted = self.predict_wall_intersection(main_ball, rng);
                    let spread = self.profile.prediction_error * (1.5 - self.accuracy);
                    let inaccuracy = (rng.gen::<f32>() - 0.5) * 2.0 * spread;
                    self.target_position =
                        (predicted + inaccuracy).clamp(50.0, ARENA_SIZE - 50.0);
                }
            }
        } else {
            // Ball going away: ease back toward center, forget the miss plan
            let drift = self.profile.center_drift;
            self.target_position =
                self.target_position * (1.0 - drift) + (ARENA_SIZE / 2.0) * drift;
            self.should_miss = false;
            self.approach_started_at = None;
        }

        let jitter = (rng.gen::<f32>() - 0.5) * self.profile.jitter;
        self.current_position +=
            (self.target_position - self.current_position) * self.profile.move_speed + jitter;

        self.current_position
    }

    /// Forward-simulate the ball (with side-wall bounces, ignoring paddles and
    /// power-ups) until it reaches this bot's wall, and return the arrival
    /// coordinate. Low difficulty skips the simulation entirely.
    fn predict_wall_intersection<R: Rng>(&self, ball: &Ball, rng: &mut R) -> f32 {
        let raw = if self.wall.is_horizontal() { ball.x } else { ball.y };

        if self.profile.predict_iterations == 0 {
            return raw + (rng.gen::<f32>() - 0.5) * 200.0;
        }

        let mut x = ball.x;
        let mut y = ball.y;
        let mut vx = ball.vx;
        let mut vy = ball.vy;
        let dt = 1.0 / 60.0;

        for _ in 0..self.profile.predict_iterations {
            x += vx * dt;
            y += vy * dt;

            if x <= 10.0 || x >= ARENA_SIZE - 10.0 {
                vx = -vx;
                x = x.clamp(10.0, ARENA_SIZE - 10.0);
            }
            if y <= 10.0 || y >= ARENA_SIZE - 10.0 {
                vy = -vy;
                y = y.clamp(10.0, ARENA_SIZE - 10.0);
            }

            match self.wall {
                Wall::Top if y <= 20.0 => return x,
                Wall::Bottom if y >= ARENA_SIZE - 20.0 => return x,
                Wall::Left if x <= 20.0 => return y,
                Wall::Right if x >= ARENA_SIZE - 20.0 => return y,
                _ => {}
            }
        }

        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hard_bot(wall: Wall, rng: &mut ChaCha8Rng) -> BotController {
        BotController::new(wall, "Bot 1".to_string(), BotDifficulty::Hard, rng)
    }

    #[test]
    fn straight_ball_prediction_hits_arrival_column() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bot = hard_bot(Wall::Bottom, &mut rng);

        let mut ball = Ball::primary(0);
        ball.x = 300.0;
        ball.y = 600.0;
        ball.vx = 0.0;
        ball.vy = 600.0;

        let predicted = bot.predict_wall_intersection(&ball, &mut rng);
        assert!((predicted - 300.0).abs() < 1.0);
    }

    #[test]
    fn converges_toward_approaching_ball() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut bot = hard_bot(Wall::Bottom, &mut rng);

        let mut ball = Ball::primary(0);
        ball.x = 650.0;
        ball.y = 100.0;
        ball.vx = 0.0;
        ball.vy = 600.0;

        let mut now = 10_000;
        let mut pos = bot.current_position;
        for _ in 0..240 {
            now += 16;
            pos = bot.step(std::slice::from_ref(&ball), now, &mut rng);
        }

        // Hard bots land within their small error spread of the arrival point,
        // unless the 2% miss roll fired; tolerate the spread plus jitter.
        if !bot.should_miss {
            assert!((pos - 650.0).abs() < 40.0, "bot at {pos}, expected near 650");
        }
    }

    #[test]
    fn receding_ball_drifts_target_to_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bot = hard_bot(Wall::Bottom, &mut rng);
        bot.target_position = 700.0;
        bot.current_position = 700.0;

        let mut ball = Ball::primary(0);
        ball.vy = -600.0; // away from bottom

        let mut now = 10_000;
        for _ in 0..600 {
            now += 16;
            bot.step(std::slice::from_ref(&ball), now, &mut rng);
        }

        assert!(
            (bot.target_position - ARENA_SIZE / 2.0).abs() < 10.0,
            "target {} should have drifted to center",
            bot.target_position
        );
        assert!(!bot.should_miss);
    }

    #[test]
    fn no_balls_keeps_position() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut bot = hard_bot(Wall::Left, &mut rng);
        let pos = bot.step(&[], 5_000, &mut rng);
        assert_eq!(pos, ARENA_SIZE / 2.0);
    }
}
