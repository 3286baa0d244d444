#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that resolves tower attacks from targeting assignments.
//!
//! The system owns one piece of transient state: projectiles in flight.
//! Everything else is resolved against the frame's snapshot views, with
//! liveness re-checked at the point of use so a target that died or was
//! re-rostered between frames simply causes a skipped shot, never a crash.
//!
//! Cooldown stamping ([`Command::RecordShot`]) is deliberately separate from
//! damage delivery ([`Command::DamageEnemies`]): a mortar stamps its cooldown
//! at launch, while its damage lands frames later at impact.

use std::time::Duration;

use bulwark_core::{
    Command, EnemyHit, EnemySnapshot, EnemyView, Event, FieldConfig, Selection, TargetAssignment,
    TowerId, TowerKind, TowerView,
};
use glam::Vec2;
use log::trace;

/// Tower combat system tracking projectiles in flight.
#[derive(Debug, Default)]
pub struct Combat {
    projectiles: Vec<Projectile>,
}

#[derive(Clone, Copy, Debug)]
struct Projectile {
    tower: TowerId,
    kind: TowerKind,
    damage: f32,
    armor_penetration: f32,
    impact: Vec2,
    arrives_at: Duration,
}

impl Combat {
    /// Creates a new combat system with no projectiles in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of projectiles currently in flight.
    #[must_use]
    pub fn projectiles_in_flight(&self) -> usize {
        self.projectiles.len()
    }

    /// Resolves arrived projectiles and fires every ready tower.
    pub fn handle(
        &mut self,
        events: &[Event],
        assignments: &[TargetAssignment],
        towers: &TowerView,
        enemies: &EnemyView,
        config: &FieldConfig,
        out: &mut Vec<Command>,
    ) {
        let mut now = None;
        for event in events {
            if let Event::TimeAdvanced { now: at, .. } = event {
                now = Some(*at);
            }
        }
        let Some(now) = now else {
            return;
        };

        self.resolve_arrivals(now, enemies, config, out);

        for assignment in assignments {
            let Some(tower) = towers.get(assignment.tower) else {
                // Sold between targeting and firing; nothing to do.
                continue;
            };

            if !tower.is_ready(now) {
                continue;
            }

            match (&assignment.selection, tower.kind) {
                (Selection::Single { enemy, .. }, TowerKind::Bolt | TowerKind::Flak) => {
                    let Some(target) = enemies.get(*enemy) else {
                        trace!("tower {} target vanished; re-acquiring next frame", tower.id.get());
                        continue;
                    };

                    out.push(Command::RecordShot { tower: tower.id });
                    out.push(Command::DamageEnemies {
                        source: tower.id,
                        hits: vec![EnemyHit {
                            enemy: target.id,
                            amount: tower.effective_damage(),
                            armor_penetration: tower.kind.armor_penetration(),
                        }],
                    });
                }
                (Selection::Volley { impact }, TowerKind::Mortar) => {
                    let origin = config.cell_center(tower.cell);
                    let speed = tower.kind.projectile_speed_cells() * config.cell_size;
                    let travel = if speed > 0.0 {
                        Duration::from_secs_f32(((*impact - origin).length() / speed).max(0.0))
                    } else {
                        Duration::ZERO
                    };

                    self.projectiles.push(Projectile {
                        tower: tower.id,
                        kind: tower.kind,
                        damage: tower.effective_damage(),
                        armor_penetration: tower.kind.armor_penetration(),
                        impact: *impact,
                        arrives_at: now.saturating_add(travel),
                    });
                    out.push(Command::RecordShot { tower: tower.id });
                }
                (Selection::Sweep { enemy, .. }, TowerKind::Lance) => {
                    let Some(target) = enemies.get(*enemy) else {
                        continue;
                    };

                    let origin = config.cell_center(tower.cell);
                    let reach = tower.effective_range_cells() * config.cell_size;
                    let width = tower.kind.beam_width_cells() * config.cell_size;
                    let hits = beam_hits(
                        origin,
                        target.position,
                        reach,
                        width,
                        tower.kind,
                        tower.effective_damage(),
                        enemies,
                    );
                    if hits.is_empty() {
                        continue;
                    }

                    out.push(Command::RecordShot { tower: tower.id });
                    out.push(Command::DamageEnemies {
                        source: tower.id,
                        hits,
                    });
                }
                (Selection::Pulse { enemies: targets }, TowerKind::Frost) => {
                    let alive: Vec<_> = targets
                        .iter()
                        .copied()
                        .filter(|id| enemies.get(*id).is_some())
                        .collect();
                    if alive.is_empty() {
                        continue;
                    }

                    out.push(Command::RecordShot { tower: tower.id });
                    out.push(Command::SlowEnemies {
                        source: tower.id,
                        targets: alive,
                        multiplier: tower.kind.slow_multiplier(),
                        duration: tower.kind.slow_duration(),
                    });
                }
                // Assignment shape and archetype disagree; drop it.
                _ => {}
            }
        }
    }

    /// Detonates every projectile whose arrival instant has passed,
    /// evaluating splash against the enemies alive *now*, not at launch.
    fn resolve_arrivals(
        &mut self,
        now: Duration,
        enemies: &EnemyView,
        config: &FieldConfig,
        out: &mut Vec<Command>,
    ) {
        let mut index = 0;
        while index < self.projectiles.len() {
            if self.projectiles[index].arrives_at > now {
                index += 1;
                continue;
            }

            let projectile = self.projectiles.swap_remove(index);
            let hits = splash_hits(&projectile, enemies, config);
            if !hits.is_empty() {
                out.push(Command::DamageEnemies {
                    source: projectile.tower,
                    hits,
                });
            }
        }
    }
}

/// Splash resolution with linear falloff by distance from the impact point.
fn splash_hits(
    projectile: &Projectile,
    enemies: &EnemyView,
    config: &FieldConfig,
) -> Vec<EnemyHit> {
    let radius = projectile.kind.splash_radius_cells() * config.cell_size;
    let falloff = projectile.kind.splash_falloff();
    let mut hits = Vec::new();

    for enemy in enemies.iter() {
        if !projectile.kind.can_target(enemy.class) {
            continue;
        }

        let distance = (enemy.position - projectile.impact).length();
        if distance > radius {
            continue;
        }

        let fraction = if radius > 0.0 { distance / radius } else { 0.0 };
        let amount = projectile.damage * (1.0 - fraction * falloff);
        hits.push(EnemyHit {
            enemy: enemy.id,
            amount,
            armor_penetration: projectile.armor_penetration,
        });
    }

    hits
}

/// Pierce resolution: every eligible enemy whose perpendicular distance to
/// the ray is inside the beam width takes the full damage.
fn beam_hits(
    origin: Vec2,
    through: Vec2,
    reach: f32,
    width: f32,
    kind: TowerKind,
    damage: f32,
    enemies: &EnemyView,
) -> Vec<EnemyHit> {
    let ray = through - origin;
    if ray.length_squared() <= f32::EPSILON {
        return Vec::new();
    }
    let direction = ray.normalize();

    let mut hits = Vec::new();
    for enemy in enemies.iter() {
        if !kind.can_target(enemy.class) {
            continue;
        }

        if let Some(hit) = beam_test(origin, direction, reach, width, enemy) {
            hits.push(EnemyHit {
                enemy: hit,
                amount: damage,
                armor_penetration: kind.armor_penetration(),
            });
        }
    }

    hits
}

fn beam_test(
    origin: Vec2,
    direction: Vec2,
    reach: f32,
    width: f32,
    enemy: &EnemySnapshot,
) -> Option<bulwark_core::EnemyId> {
    let offset = enemy.position - origin;
    let along = offset.dot(direction);
    if along < 0.0 || along > reach {
        return None;
    }

    let perpendicular = (offset - direction * along).length();
    if perpendicular <= width {
        Some(enemy.id)
    } else {
        None
    }
}
