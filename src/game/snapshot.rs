//! Snapshot building for network transmission

use crate::ws::protocol::{
    BallSnapshot, EffectFlags, PaddleSnapshot, PowerUpSnapshot, ServerMsg, WallSnapshots,
};

use super::engine::{Paddle, SimulationEngine};
use super::Wall;

fn paddle_snapshot(paddle: &Paddle) -> PaddleSnapshot {
    PaddleSnapshot {
        pos: paddle.pos,
        len: paddle.len,
        name: paddle.name.clone(),
        score: paddle.score,
        active: paddle.active,
        effects: EffectFlags {
            blind: paddle.blind,
            reverse: paddle.reverse,
            shield: paddle.shield,
        },
        is_bot: paddle.occupant.is_some_and(|o| o.is_bot()),
        protected: paddle.protected,
    }
}

/// Build the full-state snapshot broadcast to every room member each tick.
/// Intentionally uncompressed: four players per room makes delta encoding
/// pointless.
pub fn build(engine: &SimulationEngine, now: u64) -> ServerMsg {
    ServerMsg::GameState {
        balls: engine
            .balls
            .iter()
            .map(|b| BallSnapshot {
                x: b.x,
                y: b.y,
                color: b.color.to_string(),
            })
            .collect(),
        paddles: WallSnapshots {
            top: paddle_snapshot(&engine.paddles[Wall::Top]),
            bottom: paddle_snapshot(&engine.paddles[Wall::Bottom]),
            left: paddle_snapshot(&engine.paddles[Wall::Left]),
            right: paddle_snapshot(&engine.paddles[Wall::Right]),
        },
        powerups: engine
            .powerups
            .iter()
            .map(|pu| PowerUpSnapshot {
                x: pu.x,
                y: pu.y,
                kind: pu.kind,
                time_left: pu.expires_at.saturating_sub(now),
            })
            .collect(),
        time_left: engine.time_left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SessionRegistry, StatsStore};

    #[test]
    fn snapshot_carries_full_state() {
        let engine = SimulationEngine::new(
            "snap".to_string(),
            3,
            1,
            50_000,
            StatsStore::disabled(),
            SessionRegistry::new(),
        );

        let msg = build(&engine, 50_000);
        match msg {
            ServerMsg::GameState {
                balls,
                paddles,
                powerups,
                time_left,
            } => {
                assert_eq!(balls.len(), 1);
                assert_eq!(time_left, 180);
                assert!(powerups.is_empty());
                assert!(!paddles.bottom.active);
                assert!(!paddles.top.is_bot);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
