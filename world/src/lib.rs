#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Bulwark.
//!
//! The world owns every piece of shared mutable state: the occupancy field,
//! the derived flow field, the enemy roster, the tower registry, the money
//! ledger, the lives counter, the simulation clock, and the game-phase
//! machine. It is mutated exclusively through [`apply`] and read exclusively
//! through [`query`]. Systems never hold references into the world across
//! frames; they receive fresh snapshot views every tick.

use std::time::Duration;

use bulwark_core::{
    Command, ConfigError, EnemyId, Event, FieldConfig, GamePhase, GameRules, GridPos,
    PlacementError, SaveGame, SellError, TowerKind, UpgradeError, WaveId,
};
use glam::Vec2;
use log::{debug, warn};

mod economy;
mod enemies;
mod field;
mod flow;
mod towers;

use economy::Ledger;
use enemies::{DamageOutcome, Enemy};
use field::Field;
use flow::FlowField;
use towers::{Tower, TowerRegistry};

/// Represents the authoritative Bulwark world state.
#[derive(Debug)]
pub struct World {
    field: Field,
    flow: FlowField,
    rules: GameRules,
    phase: GamePhase,
    clock: Duration,
    lives: u32,
    wave: WaveId,
    enemies: Vec<Enemy>,
    towers: TowerRegistry,
    ledger: Ledger,
    next_enemy_id: u32,
    spawn_cursor: usize,
}

impl World {
    /// Creates a new world ready for simulation.
    ///
    /// Fails fast on malformed configuration; this is the only fatal path in
    /// the simulation core.
    pub fn new(config: FieldConfig, rules: GameRules) -> Result<Self, ConfigError> {
        let field = Field::new(config)?;
        let flow = FlowField::new(&field);
        Ok(Self {
            field,
            flow,
            rules,
            phase: GamePhase::Preparing,
            clock: Duration::ZERO,
            lives: rules.starting_lives,
            wave: WaveId::new(0),
            enemies: Vec::new(),
            towers: TowerRegistry::new(),
            ledger: Ledger::new(rules.starting_money),
            next_enemy_id: 0,
            spawn_cursor: 0,
        })
    }

    /// Reconstructs a world from a save payload.
    ///
    /// Occupancy and the flow field are re-derived from the tower list; the
    /// payload never carries them directly.
    pub fn from_save(save: &SaveGame) -> Result<Self, ConfigError> {
        let mut field = Field::new(save.field)?;
        let mut registry = TowerRegistry::new();

        for (index, saved) in save.towers.iter().enumerate() {
            if !field.is_walkable(saved.cell) {
                warn!(
                    "save references cell ({}, {}) twice or out of bounds; skipping tower",
                    saved.cell.column(),
                    saved.cell.row()
                );
                continue;
            }

            field.block(saved.cell);
            registry.insert_restored(Tower::from_save(
                bulwark_core::TowerId::new(index as u32),
                saved.kind,
                saved.cell,
                saved.level,
                saved.invested,
                saved.priority,
            ));
        }

        let flow = FlowField::new(&field);
        Ok(Self {
            field,
            flow,
            rules: save.rules,
            phase: GamePhase::Preparing,
            clock: save.clock,
            lives: save.lives,
            wave: save.wave,
            enemies: Vec::new(),
            towers: registry,
            ledger: Ledger::new(save.balance),
            next_enemy_id: 0,
            spawn_cursor: 0,
        })
    }

    fn enemy_mut(&mut self, enemy: EnemyId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|agent| agent.id == enemy)
    }

    fn set_phase(&mut self, phase: GamePhase, out_events: &mut Vec<Event>) {
        if self.phase != phase {
            self.phase = phase;
            out_events.push(Event::PhaseChanged { phase });
        }
    }

    fn next_spawn_cell(&mut self) -> GridPos {
        let cells = self.field.spawn_cells();
        if cells.is_empty() {
            return GridPos::new(0, 0);
        }
        let cell = cells[self.spawn_cursor % cells.len()];
        self.spawn_cursor = (self.spawn_cursor + 1) % cells.len();
        cell
    }

    fn validate_placement_internal(&self, cell: GridPos) -> Result<(), PlacementError> {
        let config = self.field.config();
        if !config.contains_cell(cell) {
            return Err(PlacementError::OutOfBounds);
        }
        if config.in_spawn_zone(cell) {
            return Err(PlacementError::InSpawnZone);
        }
        if config.in_exit_zone(cell) {
            return Err(PlacementError::InExitZone);
        }
        if self.field.is_blocked(cell) {
            return Err(PlacementError::Occupied);
        }
        if !self.field.is_walkable(cell) {
            return Err(PlacementError::NotWalkable);
        }
        if !self.field.test_block_cell(cell) {
            return Err(PlacementError::BlocksAllPaths);
        }
        Ok(())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureField { config } => configure_field(world, config, out_events),
        Command::Tick { dt } => tick(world, dt, out_events),
        Command::StartWave { wave } => start_wave(world, wave, out_events),
        Command::PauseGame => {
            if world.phase == GamePhase::Playing {
                world.set_phase(GamePhase::Paused, out_events);
            }
        }
        Command::ResumeGame => {
            if world.phase == GamePhase::Paused {
                world.set_phase(GamePhase::Playing, out_events);
            }
        }
        Command::SpawnEnemy {
            class,
            level,
            health_override,
        } => spawn_enemy(world, class, level, health_override, out_events),
        Command::AdvanceEnemy { enemy, to, heading } => {
            advance_enemy(world, enemy, to, heading, out_events);
        }
        Command::RecordShot { tower } => {
            let now = world.clock;
            if let Some(tower) = world.towers.get_mut(tower) {
                tower.last_fired_at = Some(now);
                out_events.push(Event::TowerFired {
                    tower: tower.id,
                    kind: tower.kind,
                });
            }
        }
        Command::DamageEnemies { source: _, hits } => {
            for hit in hits {
                let Some(enemy) = world.enemy_mut(hit.enemy) else {
                    // Stale reference from an earlier frame; re-acquired next
                    // frame by the targeting system.
                    continue;
                };

                if enemy.take_damage(hit.amount, hit.armor_penetration) == DamageOutcome::Killed {
                    let bounty = enemy.bounty;
                    let class = enemy.class;
                    let id = enemy.id;
                    world.ledger.earn(bounty);
                    out_events.push(Event::EnemyDied {
                        enemy: id,
                        class,
                        bounty,
                    });
                }
            }
            world.enemies.retain(|enemy| enemy.alive);
        }
        Command::SlowEnemies {
            source: _,
            targets,
            multiplier,
            duration,
        } => {
            let until = world.clock.saturating_add(duration);
            for target in targets {
                if let Some(enemy) = world.enemy_mut(target) {
                    enemy.apply_slow(multiplier, until);
                }
            }
        }
        Command::SetTowerBuff { tower, multiplier } => {
            if let Some(tower) = world.towers.get_mut(tower) {
                tower.buff_multiplier = if multiplier.is_finite() {
                    multiplier.max(1.0)
                } else {
                    1.0
                };
            }
        }
        Command::PlaceTower { kind, cell } => place_tower(world, kind, cell, out_events),
        Command::SellTower { tower } => sell_tower(world, tower, out_events),
        Command::UpgradeTower { tower } => upgrade_tower(world, tower, out_events),
        Command::SetTargetPriority { tower, priority } => {
            if let Some(tower) = world.towers.get_mut(tower) {
                tower.priority = priority;
            }
        }
        Command::CompleteWave { wave } => complete_wave(world, wave, out_events),
        Command::RestoreGame { save } => match World::from_save(&save) {
            Ok(restored) => {
                *world = restored;
                out_events.push(Event::PhaseChanged {
                    phase: GamePhase::Preparing,
                });
            }
            Err(error) => warn!("ignoring save restore with invalid configuration: {error}"),
        },
    }
}

fn configure_field(world: &mut World, config: FieldConfig, out_events: &mut Vec<Event>) {
    match Field::new(config) {
        Ok(field) => {
            world.flow = FlowField::new(&field);
            world.field = field;
            world.enemies.clear();
            world.towers.clear();
            world.ledger = Ledger::new(world.rules.starting_money);
            world.lives = world.rules.starting_lives;
            world.clock = Duration::ZERO;
            world.wave = WaveId::new(0);
            world.next_enemy_id = 0;
            world.spawn_cursor = 0;
            world.set_phase(GamePhase::Preparing, out_events);
        }
        Err(error) => warn!("ignoring field reconfiguration: {error}"),
    }
}

fn tick(world: &mut World, dt: Duration, out_events: &mut Vec<Event>) {
    // Pausing must freeze the clock exactly; terminal phases stay frozen too.
    if matches!(
        world.phase,
        GamePhase::Paused | GamePhase::GameOver | GamePhase::Victory
    ) {
        return;
    }

    if dt.is_zero() {
        return;
    }

    world.clock = world.clock.saturating_add(dt);
    let now = world.clock;

    // Buffs are recomputed from scratch every frame by the targeting system;
    // resetting here makes reapplication idempotent.
    for tower in world.towers.iter_mut() {
        tower.buff_multiplier = 1.0;
    }

    for enemy in &mut world.enemies {
        enemy.expire_slow(now);
    }

    world.flow.ensure_fresh(&world.field);

    out_events.push(Event::TimeAdvanced { dt, now });
}

fn start_wave(world: &mut World, wave: WaveId, out_events: &mut Vec<Event>) {
    if world.phase != GamePhase::Preparing {
        return;
    }

    world.wave = wave;
    world.set_phase(GamePhase::Playing, out_events);
    out_events.push(Event::WaveStarted { wave });
}

fn spawn_enemy(
    world: &mut World,
    class: bulwark_core::EnemyClass,
    level: u32,
    health_override: Option<f32>,
    out_events: &mut Vec<Event>,
) {
    if world.enemies.len() >= world.rules.enemy_cap as usize {
        debug!("enemy cap of {} reached; dropping spawn", world.rules.enemy_cap);
        out_events.push(Event::SpawnDropped { class, level });
        return;
    }

    let cell = world.next_spawn_cell();
    let position = world.field.config().cell_center(cell);
    let toward_exit = world.field.config().exit_anchor() - position;
    let heading = if toward_exit.length_squared() > f32::EPSILON {
        toward_exit.normalize()
    } else {
        Vec2::X
    };

    let id = EnemyId::new(world.next_enemy_id);
    world.next_enemy_id = world.next_enemy_id.wrapping_add(1);
    world
        .enemies
        .push(Enemy::spawn(id, class, level, position, heading, health_override));

    out_events.push(Event::EnemySpawned {
        enemy: id,
        class,
        level,
        cell,
    });
}

fn advance_enemy(
    world: &mut World,
    enemy: EnemyId,
    to: Vec2,
    heading: Vec2,
    out_events: &mut Vec<Event>,
) {
    let config = *world.field.config();
    let (exit_min, exit_max) = config.exit_rect_world();

    let Some(index) = world.enemies.iter().position(|agent| agent.id == enemy) else {
        return;
    };

    let destination = clamp_to_field(to, &config);
    let airborne = world.enemies[index].class.is_airborne();

    let accepted = if airborne {
        true
    } else {
        match config.cell_at_world(destination) {
            Some(cell) => !world.field.is_blocked(cell),
            None => false,
        }
    };

    {
        let agent = &mut world.enemies[index];
        if accepted {
            agent.position = destination;
        }
        if heading.is_finite() && heading.length_squared() > f32::EPSILON {
            agent.heading = heading.normalize();
        }
    }

    let position = world.enemies[index].position;
    let exited = position.x >= exit_min.x
        && position.x < exit_max.x
        && position.y >= exit_min.y
        && position.y < exit_max.y;

    if exited {
        let _ = world.enemies.remove(index);
        world.lives = world.lives.saturating_sub(1);
        out_events.push(Event::EnemyExited {
            enemy,
            lives_remaining: world.lives,
        });

        if world.lives == 0 {
            world.set_phase(GamePhase::GameOver, out_events);
        }
    }
}

fn place_tower(
    world: &mut World,
    kind: TowerKind,
    cell: GridPos,
    out_events: &mut Vec<Event>,
) {
    if let Err(reason) = world.validate_placement_internal(cell) {
        out_events.push(Event::PlacementRejected { kind, cell, reason });
        return;
    }

    if !world.ledger.spend(kind.base_cost()) {
        out_events.push(Event::PlacementRejected {
            kind,
            cell,
            reason: PlacementError::InsufficientFunds,
        });
        return;
    }

    world.field.block(cell);
    world.flow.mark_dirty();
    let tower = world.towers.insert(kind, cell);
    out_events.push(Event::TowerPlaced { tower, kind, cell });
}

fn sell_tower(world: &mut World, tower: bulwark_core::TowerId, out_events: &mut Vec<Event>) {
    let Some(removed) = world.towers.remove(tower) else {
        out_events.push(Event::SellRejected {
            tower,
            reason: SellError::UnknownTower,
        });
        return;
    };

    world.field.unblock(removed.cell);
    world.flow.mark_dirty();
    let refund = economy::sell_value(removed.invested, world.rules.sell_fraction);
    world.ledger.earn(refund);
    out_events.push(Event::TowerSold { tower, refund });
}

fn upgrade_tower(world: &mut World, tower: bulwark_core::TowerId, out_events: &mut Vec<Event>) {
    // The cost check and the stat change are atomic: either the ledger is
    // debited and the tower changes, or neither happens.
    let cost = {
        let Some(entry) = world.towers.get_mut(tower) else {
            out_events.push(Event::UpgradeRejected {
                tower,
                reason: UpgradeError::UnknownTower,
            });
            return;
        };

        match entry.next_upgrade_cost() {
            Ok(cost) => cost,
            Err(reason) => {
                out_events.push(Event::UpgradeRejected { tower, reason });
                return;
            }
        }
    };

    if !world.ledger.spend(cost) {
        out_events.push(Event::UpgradeRejected {
            tower,
            reason: UpgradeError::InsufficientFunds,
        });
        return;
    }

    let level = world
        .towers
        .get_mut(tower)
        .map(|entry| entry.apply_upgrade(cost))
        .unwrap_or(0);
    out_events.push(Event::TowerUpgraded { tower, level });
}

fn complete_wave(world: &mut World, wave: WaveId, out_events: &mut Vec<Event>) {
    if world.phase != GamePhase::Playing {
        return;
    }

    let bonus = economy::wave_bonus(wave);
    world.ledger.earn(bonus);
    out_events.push(Event::WaveCompleted { wave, bonus });

    if wave.get() >= world.rules.total_waves {
        out_events.push(Event::AllWavesCompleted);
        world.set_phase(GamePhase::Victory, out_events);
    } else {
        world.set_phase(GamePhase::Preparing, out_events);
    }
}

fn clamp_to_field(point: Vec2, config: &FieldConfig) -> Vec2 {
    let margin = config.cell_size * 0.01;
    Vec2::new(
        point.x.clamp(0.0, (config.width() - margin).max(0.0)),
        point.y.clamp(0.0, (config.height() - margin).max(0.0)),
    )
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use bulwark_core::{
        EconomySnapshot, EnemyView, FieldConfig, FlowFieldView, GamePhase, GridPos,
        PlacementError, SaveGame, SavedTower, TowerId, TowerKind, TowerView, WaveId,
    };
    use glam::Vec2;

    use super::World;

    /// Current phase of the game-state machine.
    #[must_use]
    pub fn phase(world: &World) -> GamePhase {
        world.phase
    }

    /// Accumulated simulation clock.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Lives remaining.
    #[must_use]
    pub fn lives(world: &World) -> u32 {
        world.lives
    }

    /// Index of the most recently started wave.
    #[must_use]
    pub fn wave(world: &World) -> WaveId {
        world.wave
    }

    /// Session rules the world was constructed with.
    #[must_use]
    pub fn rules(world: &World) -> &bulwark_core::GameRules {
        &world.rules
    }

    /// Immutable field geometry.
    #[must_use]
    pub fn field_config(world: &World) -> &FieldConfig {
        world.field.config()
    }

    /// Snapshot of the money ledger.
    #[must_use]
    pub fn economy(world: &World) -> EconomySnapshot {
        world.ledger.snapshot()
    }

    /// Captures a read-only view of every live enemy, sorted by id.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        EnemyView::from_snapshots(world.enemies.iter().map(super::Enemy::snapshot).collect())
    }

    /// Captures a read-only view of every placed tower, sorted by id.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        TowerView::from_snapshots(world.towers.iter().map(super::Tower::snapshot).collect())
    }

    /// Borrowed view over the flow field.
    ///
    /// Fresh after any `Tick`; placements between ticks only mark it dirty,
    /// so all changes within one frame batch into a single rebuild.
    #[must_use]
    pub fn flow_view(world: &World) -> FlowFieldView<'_> {
        world.flow.view()
    }

    /// Reports whether a tower blocks the provided cell.
    #[must_use]
    pub fn is_cell_blocked(world: &World, cell: GridPos) -> bool {
        world.field.is_blocked(cell)
    }

    /// Identifier of the tower occupying the cell, if any.
    #[must_use]
    pub fn tower_at(world: &World, cell: GridPos) -> Option<TowerId> {
        world.towers.at_cell(cell)
    }

    /// Validates a placement without mutating anything.
    ///
    /// Checks run in a fixed order with the first failure winning:
    /// out-of-bounds, spawn zone, exit zone, occupied, not walkable, and
    /// finally the reachability invariant (no placement may disconnect every
    /// spawn cell from the exit). Affordability is the world's concern at
    /// apply time, not the validator's.
    pub fn validate_placement(
        world: &World,
        _kind: TowerKind,
        cell: GridPos,
    ) -> Result<(), PlacementError> {
        world.validate_placement_internal(cell)
    }

    /// Reports whether the provided cell currently reaches the exit zone.
    #[must_use]
    pub fn can_reach_exit(world: &World, from: GridPos) -> bool {
        world.field.can_reach_exit(from)
    }

    /// Non-mutating what-if: would every spawn cell still reach the exit
    /// with `cell` blocked?
    #[must_use]
    pub fn test_block_cell(world: &World, cell: GridPos) -> bool {
        world.field.test_block_cell(cell)
    }

    /// Every spawn-zone cell in deterministic order.
    #[must_use]
    pub fn spawn_cells(world: &World) -> Vec<GridPos> {
        world.field.spawn_cells()
    }

    /// Snaps a world-space point to its containing cell, for the input layer.
    #[must_use]
    pub fn cell_at_world(world: &World, point: Vec2) -> Option<GridPos> {
        world.field.config().cell_at_world(point)
    }

    /// Reports whether a world-space point lies inside the playable field.
    #[must_use]
    pub fn contains_world_point(world: &World, point: Vec2) -> bool {
        world.field.config().contains_world_point(point)
    }

    /// Captures the persistence payload for the current session.
    #[must_use]
    pub fn save_game(world: &World) -> SaveGame {
        SaveGame {
            wave: world.wave,
            balance: world.ledger.balance(),
            lives: world.lives,
            clock: world.clock,
            field: *world.field.config(),
            rules: world.rules,
            towers: world
                .towers
                .iter()
                .map(|tower| SavedTower {
                    kind: tower.kind,
                    cell: tower.cell,
                    level: tower.level,
                    invested: tower.invested,
                    priority: tower.priority,
                })
                .collect(),
        }
    }
}
