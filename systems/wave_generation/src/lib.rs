#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic generative wave planner.
//!
//! Given a campaign seed and a wave number the planner produces a complete
//! spawn schedule: no hand-authored per-wave tables exist anywhere. Enemy
//! counts grow geometrically through three regimes stitched at fixed
//! breakpoints, unit level climbs on a fixed cadence, the composition mix
//! widens at fixed wave thresholds, and every tenth wave is a boss encounter
//! whose hit points equal the preceding normal wave's total level-scaled
//! health budget.
//!
//! All randomness flows from SHA-256-derived SplitMix64 streams labeled per
//! concern, so `(seed, wave)` fully determines the plan.

use std::time::Duration;

use bulwark_core::{EnemyClass, SpawnGroup, WaveId, WavePlan};
use sha2::{Digest, Sha256};

/// Every tenth wave is a boss encounter.
pub const BOSS_WAVE_PERIOD: u32 = 10;
/// Unit level rises by one every this many waves.
const WAVES_PER_TIER: u32 = 4;
/// Enemy count at wave one.
const BASE_COUNT: f64 = 6.0;
/// Per-wave geometric growth in the early regime.
const EARLY_GROWTH: f64 = 1.25;
/// Per-wave geometric growth in the middle regime.
const MID_GROWTH: f64 = 1.10;
/// Per-wave geometric growth in the late regime.
const LATE_GROWTH: f64 = 1.04;
/// Last wave of the early growth regime.
const EARLY_REGIME_END: u32 = 8;
/// Last wave of the middle growth regime.
const MID_REGIME_END: u32 = 20;
/// Hard per-wave enemy cap; a performance guard, not a balance knob.
const MAX_WAVE_ENEMIES: u32 = 120;
/// Armored units join the mix from this wave.
const ARMORED_FROM_WAVE: u32 = 4;
/// Flying units join the mix from this wave.
const FLYING_FROM_WAVE: u32 = 7;
/// Shielded units join the mix from this wave.
const SHIELDED_FROM_WAVE: u32 = 12;
/// Support units join the mix from this wave.
const SUPPORT_FROM_WAVE: u32 = 16;
/// Escort groups on a boss wave carry this fraction of the prior wave's counts.
const ESCORT_SCALE: f64 = 0.5;

const RNG_STREAM_CADENCE: &str = "cadence";
const RNG_STREAM_GAPS: &str = "gaps";

/// Pure `(seed, wave) -> plan` generator.
#[derive(Clone, Copy, Debug)]
pub struct WavePlanner {
    seed: u64,
}

impl WavePlanner {
    /// Creates a planner for the provided campaign seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Unit level for the provided wave.
    #[must_use]
    pub fn tier(&self, wave: WaveId) -> u32 {
        1 + wave.get().saturating_sub(1) / WAVES_PER_TIER
    }

    /// Reports whether the wave is a periodic boss encounter.
    #[must_use]
    pub fn is_boss_wave(&self, wave: WaveId) -> bool {
        let number = wave.get();
        number > 0 && number % BOSS_WAVE_PERIOD == 0
    }

    /// Produces the complete spawn schedule for the wave.
    #[must_use]
    pub fn plan(&self, wave: WaveId) -> WavePlan {
        if wave.get() == 0 {
            return WavePlan::default();
        }

        if self.is_boss_wave(wave) {
            self.boss_plan(wave)
        } else {
            self.normal_plan(wave)
        }
    }

    /// Total effective hit points of the wave: every unit's health summed,
    /// including overrides. This is the budget boss waves are derived from.
    #[must_use]
    pub fn health_budget(&self, plan: &WavePlan) -> f64 {
        plan.groups
            .iter()
            .map(|group| {
                let per_unit = group
                    .health_override
                    .map(f64::from)
                    .unwrap_or_else(|| f64::from(group.class.health_at(group.level)));
                f64::from(group.count) * per_unit
            })
            .sum()
    }

    fn normal_plan(&self, wave: WaveId) -> WavePlan {
        let level = self.tier(wave);
        let total = baseline_count(wave.get());
        let mix = composition(wave.get());

        let mut cadence_rng = self.stream(wave, RNG_STREAM_CADENCE);
        let mut gap_rng = self.stream(wave, RNG_STREAM_GAPS);

        let mut groups = Vec::new();
        let mut assigned = 0_u32;
        for (index, (class, fraction)) in mix.iter().enumerate() {
            let count = if index + 1 == mix.len() {
                // The last (baseline) class absorbs the rounding remainder.
                total.saturating_sub(assigned)
            } else {
                ((f64::from(total) * fraction).floor() as u32).min(total - assigned)
            };
            assigned += count;
            if count == 0 {
                continue;
            }

            groups.push(SpawnGroup {
                class: *class,
                level,
                count,
                spawn_interval: sample_interval(&mut cadence_rng, 500, 900),
                delay_after_previous: if groups.is_empty() {
                    Duration::ZERO
                } else {
                    sample_interval(&mut gap_rng, 1_500, 3_000)
                },
                health_override: None,
            });
        }

        WavePlan {
            wave,
            groups,
        }
    }

    /// Boss encounter: a single boss carrying the previous wave's entire
    /// health budget, followed by proportionally scaled escort groups.
    fn boss_plan(&self, wave: WaveId) -> WavePlan {
        let preceding = self.normal_plan(WaveId::new(wave.get() - 1));
        let budget = self.health_budget(&preceding);
        let level = self.tier(wave);

        let mut gap_rng = self.stream(wave, RNG_STREAM_GAPS);
        let mut groups = vec![SpawnGroup {
            class: EnemyClass::Boss,
            level,
            count: 1,
            spawn_interval: Duration::ZERO,
            delay_after_previous: Duration::ZERO,
            health_override: Some(budget as f32),
        }];

        for escort in &preceding.groups {
            let count = (f64::from(escort.count) * ESCORT_SCALE).floor() as u32;
            if count == 0 {
                continue;
            }

            groups.push(SpawnGroup {
                class: escort.class,
                level: escort.level,
                count,
                spawn_interval: escort.spawn_interval,
                delay_after_previous: sample_interval(&mut gap_rng, 2_000, 4_000),
                health_override: None,
            });
        }

        WavePlan { wave, groups }
    }

    fn stream(&self, wave: WaveId, label: &str) -> SplitMix64 {
        SplitMix64::new(derive_labeled_seed(self.seed, wave, label))
    }
}

/// Three stitched geometric growth regimes with a hard cap.
fn baseline_count(wave: u32) -> u32 {
    let wave = wave.max(1);
    let early_steps = wave.min(EARLY_REGIME_END).saturating_sub(1);
    let mid_steps = wave.min(MID_REGIME_END).saturating_sub(EARLY_REGIME_END);
    let late_steps = wave.saturating_sub(MID_REGIME_END);

    let count = BASE_COUNT
        * EARLY_GROWTH.powi(early_steps as i32)
        * MID_GROWTH.powi(mid_steps as i32)
        * LATE_GROWTH.powi(late_steps as i32);

    (count.floor() as u32).clamp(1, MAX_WAVE_ENEMIES)
}

/// Composition mix for the wave; widens at fixed thresholds. The baseline
/// class is listed last so it can absorb rounding remainders.
fn composition(wave: u32) -> Vec<(EnemyClass, f64)> {
    let mut mix = Vec::new();
    if wave >= ARMORED_FROM_WAVE {
        mix.push((EnemyClass::Armored, 0.25));
    }
    if wave >= FLYING_FROM_WAVE {
        mix.push((EnemyClass::Flying, 0.20));
    }
    if wave >= SHIELDED_FROM_WAVE {
        mix.push((EnemyClass::Shielded, 0.15));
    }
    if wave >= SUPPORT_FROM_WAVE {
        mix.push((EnemyClass::Support, 0.10));
    }

    let reserved: f64 = mix.iter().map(|(_, fraction)| fraction).sum();
    mix.push((EnemyClass::Infantry, 1.0 - reserved));
    mix
}

fn sample_interval(rng: &mut SplitMix64, min_ms: u64, max_ms: u64) -> Duration {
    let span = max_ms.saturating_sub(min_ms) + 1;
    Duration::from_millis(min_ms + rng.next_u64() % span)
}

fn derive_labeled_seed(seed: u64, wave: WaveId, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(wave.get().to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

#[derive(Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed };
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}
