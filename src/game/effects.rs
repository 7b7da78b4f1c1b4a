//! Timed power-up effect bookkeeping
//!
//! Every transient modifier (ball speed boost, paddle growth, blind, reverse,
//! decoy lifetime) is recorded here as an explicit deadline entry and swept by
//! the owning engine's tick. The engine checks the target still exists before
//! reverting, and the whole registry dies with the engine, so nothing can
//! mutate state after teardown.

use super::Wall;

/// A reversal to apply once its deadline passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Revert {
    /// Undo a ball speed effect by dividing velocity by `factor`
    BallSpeed { ball: u32, factor: f32 },
    /// Shrink a paddle back to base length
    PaddleSize { wall: Wall },
    /// Clear the blind flag
    Blind { wall: Wall },
    /// Clear the reverse flag
    Reverse { wall: Wall },
    /// Remove an expired decoy ball
    DecoyExpiry { ball: u32 },
}

#[derive(Debug, Clone, Copy)]
struct ScheduledRevert {
    fires_at: u64,
    revert: Revert,
}

/// Pending timed reversions for one engine instance
#[derive(Debug, Default)]
pub struct EffectRegistry {
    pending: Vec<ScheduledRevert>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fires_at: u64, revert: Revert) {
        self.pending.push(ScheduledRevert { fires_at, revert });
    }

    /// Drain every reversion whose deadline has passed
    pub fn due(&mut self, now: u64) -> Vec<Revert> {
        let mut fired = Vec::new();
        self.pending.retain(|entry| {
            if entry.fires_at <= now {
                fired.push(entry.revert);
                false
            } else {
                true
            }
        });
        fired
    }

    /// Drop every entry referencing a ball that no longer exists
    pub fn cancel_ball(&mut self, ball_id: u32) {
        self.pending.retain(|entry| {
            !matches!(
                entry.revert,
                Revert::BallSpeed { ball, .. } | Revert::DecoyExpiry { ball } if ball == ball_id
            )
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
