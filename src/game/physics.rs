//! Ball physics and arena geometry

use rand::Rng;

use super::{Wall, ARENA_SIZE, BALL_SIZE};

/// A ball in flight. Decoys are transient fakes spawned by the `fake`
/// power-up; they never score and vanish on any wall miss.
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: &'static str,
    pub is_decoy: bool,
    pub last_hitter: Option<Wall>,
    /// When set, the ball is parked at center until this timestamp (ms)
    pub launch_at: Option<u64>,
}

impl Ball {
    pub fn primary(id: u32) -> Self {
        Self {
            id,
            x: ARENA_SIZE / 2.0,
            y: ARENA_SIZE / 2.0,
            vx: 0.0,
            vy: 0.0,
            color: "#fff",
            is_decoy: false,
            last_hitter: None,
            launch_at: None,
        }
    }

    pub fn decoy(id: u32, vx: f32, vy: f32) -> Self {
        Self {
            id,
            x: ARENA_SIZE / 2.0,
            y: ARENA_SIZE / 2.0,
            vx,
            vy,
            color: "#ff4444",
            is_decoy: true,
            last_hitter: None,
            launch_at: None,
        }
    }

    /// Advance position by one tick
    pub fn advance(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Rescale velocity magnitude, preserving direction
    pub fn scale_speed(&mut self, factor: f32) {
        self.vx *= factor;
        self.vy *= factor;
    }
}

/// Physics helpers for the square arena
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Boundary crossings after integration, per axis. Both axes are checked
    /// independently; a corner crossing yields two walls in one tick.
    pub fn crossings(ball: &Ball) -> (Option<Wall>, Option<Wall>) {
        let x_wall = if ball.x - BALL_SIZE <= 0.0 {
            Some(Wall::Left)
        } else if ball.x + BALL_SIZE >= ARENA_SIZE {
            Some(Wall::Right)
        } else {
            None
        };

        let y_wall = if ball.y - BALL_SIZE <= 0.0 {
            Some(Wall::Top)
        } else if ball.y + BALL_SIZE >= ARENA_SIZE {
            Some(Wall::Bottom)
        } else {
            None
        };

        (x_wall, y_wall)
    }

    /// Reflect off a wall and clamp the ball just inside the boundary
    pub fn bounce(ball: &mut Ball, wall: Wall) {
        match wall {
            Wall::Left => {
                ball.vx = -ball.vx;
                ball.x = BALL_SIZE + 1.0;
            }
            Wall::Right => {
                ball.vx = -ball.vx;
                ball.x = ARENA_SIZE - BALL_SIZE - 1.0;
            }
            Wall::Top => {
                ball.vy = -ball.vy;
                ball.y = BALL_SIZE + 1.0;
            }
            Wall::Bottom => {
                ball.vy = -ball.vy;
                ball.y = ARENA_SIZE - BALL_SIZE - 1.0;
            }
        }
    }

    /// The ball's coordinate along the given wall's axis
    pub fn along_wall_coord(ball: &Ball, wall: Wall) -> f32 {
        if wall.is_horizontal() {
            ball.x
        } else {
            ball.y
        }
    }

    /// Whether a paddle covers the given along-wall coordinate
    pub fn paddle_blocks(paddle_pos: f32, paddle_len: f32, ball_coord: f32) -> bool {
        (ball_coord - paddle_pos).abs() <= paddle_len / 2.0 + BALL_SIZE
    }

    /// Clamp a paddle position to its legal range for the given length
    pub fn clamp_paddle(pos: f32, len: f32) -> f32 {
        let half = len / 2.0;
        pos.clamp(half, ARENA_SIZE - half)
    }

    /// Launch velocity into one of four 60-degree diagonal sectors, each
    /// offset 15 degrees from the axes so the ball always visibly approaches
    /// a diagonal instead of skimming parallel to a wall pair.
    pub fn launch_velocity<R: Rng>(speed: f32, rng: &mut R) -> (f32, f32) {
        let sector = rng.gen_range(0..4u32);
        let base = rng.gen_range(0.0..std::f32::consts::FRAC_PI_3) + std::f32::consts::PI / 12.0;
        let angle = base + sector as f32 * std::f32::consts::FRAC_PI_2;
        (angle.cos() * speed, angle.sin() * speed)
    }

    /// Velocity from arena center toward a target point, with angular jitter
    pub fn aim_from_center(target: (f32, f32), speed: f32, angle_jitter: f32) -> (f32, f32) {
        let angle =
            (target.1 - ARENA_SIZE / 2.0).atan2(target.0 - ARENA_SIZE / 2.0) + angle_jitter;
        (angle.cos() * speed, angle.sin() * speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn bounce_reflects_and_clamps() {
        let mut ball = Ball::primary(0);
        ball.x = ARENA_SIZE - 2.0;
        ball.vx = 300.0;
        PhysicsSystem::bounce(&mut ball, Wall::Right);
        assert_eq!(ball.vx, -300.0);
        assert!(ball.x + BALL_SIZE < ARENA_SIZE);

        ball.y = 1.0;
        ball.vy = -200.0;
        PhysicsSystem::bounce(&mut ball, Wall::Top);
        assert_eq!(ball.vy, 200.0);
        assert!(ball.y - BALL_SIZE > 0.0);
    }

    #[test]
    fn corner_crossing_reports_both_axes() {
        let mut ball = Ball::primary(0);
        ball.x = 2.0;
        ball.y = ARENA_SIZE - 2.0;
        let (x_wall, y_wall) = PhysicsSystem::crossings(&ball);
        assert_eq!(x_wall, Some(Wall::Left));
        assert_eq!(y_wall, Some(Wall::Bottom));
    }

    #[test]
    fn paddle_block_threshold() {
        // Reach is len/2 + ball radius on either side of the paddle center
        assert!(PhysicsSystem::paddle_blocks(400.0, 100.0, 460.0));
        assert!(!PhysicsSystem::paddle_blocks(400.0, 100.0, 460.1));
        assert!(PhysicsSystem::paddle_blocks(400.0, 100.0, 340.0));
        assert!(!PhysicsSystem::paddle_blocks(400.0, 100.0, 339.9));
    }

    #[test]
    fn paddle_clamp_stays_in_arena() {
        assert_eq!(PhysicsSystem::clamp_paddle(-50.0, 100.0), 50.0);
        assert_eq!(PhysicsSystem::clamp_paddle(10_000.0, 100.0), ARENA_SIZE - 50.0);
        assert_eq!(PhysicsSystem::clamp_paddle(400.0, 180.0), 400.0);
    }

    #[test]
    fn launch_angle_avoids_near_axis_trajectories() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let (vx, vy) = PhysicsSystem::launch_velocity(600.0, &mut rng);
            let angle = vy.atan2(vx).rem_euclid(std::f32::consts::FRAC_PI_2);
            let deg = angle.to_degrees();
            assert!(
                (15.0 - 1e-3..=75.0 + 1e-3).contains(&deg),
                "angle {} outside diagonal sector",
                deg
            );
            let speed = (vx * vx + vy * vy).sqrt();
            assert!((speed - 600.0).abs() < 1e-2);
        }
    }
}
