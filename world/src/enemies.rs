//! Enemy agent state: health, armor mitigation, and slow effects.

use std::time::Duration;

use bulwark_core::{EnemyClass, EnemyId, EnemySnapshot};
use glam::Vec2;

/// Armor constant of the diminishing-returns mitigation curve.
///
/// Reduction is `armor / (armor + ARMOR_SOFTCAP)`: 100 armor halves damage,
/// and mitigation approaches but never reaches 100%.
const ARMOR_SOFTCAP: f32 = 100.0;

/// Result of applying a damage hit to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DamageOutcome {
    /// The agent was already dead; the hit was a no-op.
    AlreadyDead,
    /// The agent absorbed the hit and survives.
    Survived,
    /// This hit reduced health to zero. Reported exactly once.
    Killed,
}

/// A single live enemy agent.
#[derive(Clone, Debug)]
pub(crate) struct Enemy {
    pub(crate) id: EnemyId,
    pub(crate) class: EnemyClass,
    pub(crate) level: u32,
    pub(crate) position: Vec2,
    pub(crate) heading: Vec2,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) base_speed: f32,
    pub(crate) slow_multiplier: f32,
    pub(crate) slow_expires_at: Option<Duration>,
    pub(crate) armor: f32,
    pub(crate) bounty: u32,
    pub(crate) alive: bool,
}

impl Enemy {
    pub(crate) fn spawn(
        id: EnemyId,
        class: EnemyClass,
        level: u32,
        position: Vec2,
        heading: Vec2,
        health_override: Option<f32>,
    ) -> Self {
        let health = health_override
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or_else(|| class.health_at(level));
        Self {
            id,
            class,
            level,
            position,
            heading,
            health,
            max_health: health,
            base_speed: class.base_speed(),
            slow_multiplier: 1.0,
            slow_expires_at: None,
            armor: class.armor_at(level),
            bounty: class.bounty_at(level),
            alive: true,
        }
    }

    /// Applies a damage hit through the armor mitigation curve.
    ///
    /// Effective armor is the agent's armor minus the hit's penetration,
    /// floored at zero. The death transition fires exactly once; re-entrant
    /// calls after death are no-ops.
    pub(crate) fn take_damage(&mut self, amount: f32, armor_penetration: f32) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::AlreadyDead;
        }

        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        let effective_armor = (self.armor - armor_penetration.max(0.0)).max(0.0);
        let reduction = effective_armor / (effective_armor + ARMOR_SOFTCAP);
        let applied = amount * (1.0 - reduction);

        self.health = (self.health - applied).max(0.0);
        if self.health <= 0.0 {
            self.alive = false;
            DamageOutcome::Killed
        } else {
            DamageOutcome::Survived
        }
    }

    /// Applies a slow effect: strongest multiplier wins, longest expiry wins,
    /// independently. A weak reapplication while a strong slow is active
    /// therefore extends the strong slow's duration.
    pub(crate) fn apply_slow(&mut self, multiplier: f32, until: Duration) {
        let multiplier = if multiplier.is_finite() {
            multiplier.clamp(0.05, 1.0)
        } else {
            1.0
        };

        self.slow_multiplier = self.slow_multiplier.min(multiplier);
        self.slow_expires_at = Some(match self.slow_expires_at {
            Some(current) => current.max(until),
            None => until,
        });
    }

    /// Clears the slow effect once its expiry instant has passed.
    pub(crate) fn expire_slow(&mut self, now: Duration) {
        if let Some(expires_at) = self.slow_expires_at {
            if now >= expires_at {
                self.slow_multiplier = 1.0;
                self.slow_expires_at = None;
            }
        }
    }

    pub(crate) fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id,
            class: self.class,
            level: self.level,
            position: self.position,
            heading: self.heading,
            health: self.health,
            max_health: self.max_health,
            base_speed: self.base_speed,
            slow_multiplier: self.slow_multiplier,
            slow_expires_at: self.slow_expires_at,
            armor: self.armor,
            bounty: self.bounty,
        }
    }
}
