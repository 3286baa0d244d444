#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that computes deterministic tower targets from world snapshots.
//!
//! Candidate filtering happens entirely here: liveness, buffed range, and
//! category eligibility are all resolved before a target is picked, so a
//! tower never spends its fire-rate budget aiming at an ineligible enemy.
//! Support-tower buffs are recomputed from scratch every call and emitted as
//! [`Command::SetTowerBuff`]; the world resets multipliers each tick, which
//! makes reapplication idempotent.

use bulwark_core::{
    Command, EnemySnapshot, EnemyView, FieldConfig, FlowFieldView, GamePhase, GridPos, Selection,
    TargetAssignment, TargetPriority, TowerKind, TowerSnapshot, TowerView,
};
use glam::Vec2;

/// Tower targeting system that reuses scratch buffers across frames.
#[derive(Debug, Default)]
pub struct Targeting {
    candidates: Vec<Candidate>,
    buff_bonuses: Vec<(bulwark_core::TowerId, f32)>,
}

impl Targeting {
    /// Creates a new targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes target assignments and buff commands for the current frame.
    ///
    /// `out_assignments` is cleared before being repopulated; buff commands
    /// are appended to `out_commands`.
    pub fn handle(
        &mut self,
        phase: GamePhase,
        towers: &TowerView,
        enemies: &EnemyView,
        flow: &FlowFieldView<'_>,
        config: &FieldConfig,
        out_assignments: &mut Vec<TargetAssignment>,
        out_commands: &mut Vec<Command>,
    ) {
        out_assignments.clear();

        if phase != GamePhase::Playing {
            return;
        }

        self.collect_buffs(towers, config);
        for (tower, bonus) in &self.buff_bonuses {
            out_commands.push(Command::SetTowerBuff {
                tower: *tower,
                multiplier: 1.0 + bonus,
            });
        }

        if enemies.is_empty() {
            return;
        }

        for tower in towers.iter() {
            if tower.kind == TowerKind::Beacon {
                continue;
            }

            let center = config.cell_center(tower.cell);
            let range_world =
                tower.range_cells * self.buff_multiplier_for(tower.id) * config.cell_size;
            self.collect_candidates(tower, center, range_world, enemies, flow, config);

            if self.candidates.is_empty() {
                continue;
            }

            let selection = match tower.kind {
                TowerKind::Mortar => self.select_splash_impact(tower, config),
                TowerKind::Frost => Some(Selection::Pulse {
                    enemies: self.candidates.iter().map(|candidate| candidate.id).collect(),
                }),
                TowerKind::Lance => self.select_by_priority(tower.priority).map(|candidate| {
                    Selection::Sweep {
                        enemy: candidate.id,
                        through: candidate.position,
                    }
                }),
                TowerKind::Bolt | TowerKind::Flak => {
                    self.select_by_priority(tower.priority).map(|candidate| {
                        Selection::Single {
                            enemy: candidate.id,
                            point: candidate.position,
                        }
                    })
                }
                TowerKind::Beacon => None,
            };

            if let Some(selection) = selection {
                out_assignments.push(TargetAssignment {
                    tower: tower.id,
                    kind: tower.kind,
                    selection,
                });
            }
        }
    }

    /// Accumulates beacon coverage into per-tower additive bonuses.
    fn collect_buffs(&mut self, towers: &TowerView, config: &FieldConfig) {
        self.buff_bonuses.clear();

        for tower in towers.iter() {
            if tower.kind == TowerKind::Beacon {
                continue;
            }

            let center = config.cell_center(tower.cell);
            let mut bonus = 0.0;
            for beacon in towers.iter() {
                if beacon.kind != TowerKind::Beacon {
                    continue;
                }

                let reach = beacon.range_cells * config.cell_size;
                let distance = (config.cell_center(beacon.cell) - center).length();
                if distance <= reach {
                    bonus += beacon.kind.buff_bonus();
                }
            }

            if bonus > 0.0 {
                self.buff_bonuses.push((tower.id, bonus));
            }
        }
    }

    fn buff_multiplier_for(&self, tower: bulwark_core::TowerId) -> f32 {
        self.buff_bonuses
            .iter()
            .find(|(id, _)| *id == tower)
            .map_or(1.0, |(_, bonus)| 1.0 + bonus)
    }

    /// Rebuilds the candidate scratch: live, eligible, in-range enemies in
    /// deterministic id order.
    fn collect_candidates(
        &mut self,
        tower: &TowerSnapshot,
        center: Vec2,
        range_world: f32,
        enemies: &EnemyView,
        flow: &FlowFieldView<'_>,
        config: &FieldConfig,
    ) {
        self.candidates.clear();
        let range_squared = range_world * range_world;

        for enemy in enemies.iter() {
            if !tower.kind.can_target(enemy.class) {
                continue;
            }

            let offset = enemy.position - center;
            if offset.length_squared() > range_squared {
                continue;
            }

            self.candidates.push(Candidate {
                id: enemy.id,
                position: enemy.position,
                health: enemy.health,
                speed: enemy.effective_speed(),
                remaining: remaining_distance(enemy, flow, config),
            });
        }
    }

    /// Picks one candidate per the policy; ties fall to the lowest id by
    /// iterating in id order and replacing only on strict improvement.
    fn select_by_priority(&self, priority: TargetPriority) -> Option<&Candidate> {
        let mut best: Option<&Candidate> = None;
        for candidate in &self.candidates {
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if candidate_beats(candidate, current, priority) {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }
        best
    }

    /// Mortar override: aim at the candidate position covering the most
    /// candidates within the splash radius. Coverage ties fall back to the
    /// tower's priority policy, then to the lowest id.
    fn select_splash_impact(
        &self,
        tower: &TowerSnapshot,
        config: &FieldConfig,
    ) -> Option<Selection> {
        let radius = tower.kind.splash_radius_cells() * config.cell_size;
        let radius_squared = radius * radius;

        let mut best: Option<(&Candidate, usize)> = None;
        for candidate in &self.candidates {
            let coverage = self
                .candidates
                .iter()
                .filter(|other| {
                    (other.position - candidate.position).length_squared() <= radius_squared
                })
                .count();

            best = Some(match best {
                None => (candidate, coverage),
                Some((current, current_coverage)) => {
                    if coverage > current_coverage
                        || (coverage == current_coverage
                            && candidate_beats(candidate, current, tower.priority))
                    {
                        (candidate, coverage)
                    } else {
                        (current, current_coverage)
                    }
                }
            });
        }

        best.map(|(candidate, _)| Selection::Volley {
            impact: candidate.position,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    id: bulwark_core::EnemyId,
    position: Vec2,
    health: f32,
    speed: f32,
    remaining: f32,
}

/// Remaining travel estimate used by the First/Last policies.
///
/// Ground units read the flow field's distance at their cell; airborne units
/// fly a straight line, so their estimate is plain euclidean distance to the
/// exit anchor in cell units.
fn remaining_distance(enemy: &EnemySnapshot, flow: &FlowFieldView<'_>, config: &FieldConfig) -> f32 {
    if enemy.class.is_airborne() {
        return (config.exit_anchor() - enemy.position).length() / config.cell_size;
    }

    let cell = config
        .cell_at_world(enemy.position)
        .unwrap_or(GridPos::new(0, 0));
    match flow.distance(cell) {
        Some(distance) if distance != bulwark_core::NO_PATH => f32::from(distance),
        _ => f32::MAX,
    }
}

fn candidate_beats(challenger: &Candidate, incumbent: &Candidate, priority: TargetPriority) -> bool {
    match priority {
        TargetPriority::First => challenger.remaining < incumbent.remaining,
        TargetPriority::Last => challenger.remaining > incumbent.remaining,
        TargetPriority::Strongest => challenger.health > incumbent.health,
        TargetPriority::Weakest => challenger.health < incumbent.health,
        TargetPriority::Fastest => challenger.speed > incumbent.speed,
    }
}
