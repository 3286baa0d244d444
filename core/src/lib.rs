#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Bulwark engine.
//!
//! This crate defines the message surface that connects the headless
//! orchestrator, the authoritative world, and the pure simulation systems.
//! Adapters and systems submit [`Command`] values describing desired
//! mutations, the world executes those commands via its `apply` entry point,
//! and then broadcasts [`Event`] values for systems and presentation hooks to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshot views, and respond exclusively with new command batches.

use std::borrow::Cow;
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel distance marking a cell with no route to the exit.
pub const NO_PATH: u16 = u16::MAX;

/// Unique identifier assigned to an enemy agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// One-based wave index within a campaign. The default value of zero means
/// no wave has started yet.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WaveId(u32);

impl WaveId {
    /// Creates a new wave identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Identifier of the wave following this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    column: u32,
    row: u32,
}

impl GridPos {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: GridPos) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// World-space center of the cell given a square cell edge length.
    #[must_use]
    pub fn center(self, cell_size: f32) -> Vec2 {
        Vec2::new(
            (self.column as f32 + 0.5) * cell_size,
            (self.row as f32 + 0.5) * cell_size,
        )
    }
}

/// Axis-aligned rectangle expressed in whole grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    origin: GridPos,
    width: u32,
    height: u32,
}

impl GridRect {
    /// Constructs a rectangle from an origin cell and dimensions.
    #[must_use]
    pub const fn new(origin: GridPos, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> GridPos {
        self.origin
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Exclusive column bound of the rectangle.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.origin.column().saturating_add(self.width)
    }

    /// Exclusive row bound of the rectangle.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.origin.row().saturating_add(self.height)
    }

    /// Reports whether the provided cell lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, cell: GridPos) -> bool {
        cell.column() >= self.origin.column()
            && cell.column() < self.right()
            && cell.row() >= self.origin.row()
            && cell.row() < self.bottom()
    }

    /// Iterates the cells covered by the rectangle in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        let origin = self.origin;
        let width = self.width;
        (0..self.height).flat_map(move |dy| {
            (0..width).map(move |dx| GridPos::new(origin.column() + dx, origin.row() + dy))
        })
    }
}

/// Static geometry of the play field: grid dimensions, zones, and scale.
///
/// The spawn zone occupies the `spawn_columns` westmost columns across every
/// row; the exit zone is an explicit rectangle on the east side. Both zones
/// are off-limits to tower placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Edge length of one square cell in world units.
    pub cell_size: f32,
    /// Number of westmost columns reserved as the spawn zone.
    pub spawn_columns: u32,
    /// Rectangle of cells forming the exit zone.
    pub exit_zone: GridRect,
}

impl FieldConfig {
    /// The standard 10×10 field: two spawn columns and a 2×4 exit block
    /// centered on the east edge.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            columns: 10,
            rows: 10,
            cell_size: 32.0,
            spawn_columns: 2,
            exit_zone: GridRect::new(GridPos::new(8, 3), 2, 4),
        }
    }

    /// Reports whether the cell lies within the grid bounds.
    #[must_use]
    pub fn contains_cell(&self, cell: GridPos) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Reports whether the cell belongs to the spawn zone.
    #[must_use]
    pub fn in_spawn_zone(&self, cell: GridPos) -> bool {
        self.contains_cell(cell) && cell.column() < self.spawn_columns
    }

    /// Reports whether the cell belongs to the exit zone.
    #[must_use]
    pub fn in_exit_zone(&self, cell: GridPos) -> bool {
        self.exit_zone.contains(cell)
    }

    /// Total field width in world units.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.columns as f32 * self.cell_size
    }

    /// Total field height in world units.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    /// Reports whether a world-space point lies inside the playable rectangle.
    #[must_use]
    pub fn contains_world_point(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x < self.width() && point.y < self.height()
    }

    /// Snaps a world-space point to the grid cell containing it.
    #[must_use]
    pub fn cell_at_world(&self, point: Vec2) -> Option<GridPos> {
        if !self.contains_world_point(point) {
            return None;
        }

        let column = (point.x / self.cell_size) as u32;
        let row = (point.y / self.cell_size) as u32;
        Some(GridPos::new(
            column.min(self.columns - 1),
            row.min(self.rows - 1),
        ))
    }

    /// World-space center of the provided cell.
    #[must_use]
    pub fn cell_center(&self, cell: GridPos) -> Vec2 {
        cell.center(self.cell_size)
    }

    /// World-space center of the exit zone, used as the flying-unit anchor
    /// and as the degenerate-heading fallback direction.
    #[must_use]
    pub fn exit_anchor(&self) -> Vec2 {
        let zone = self.exit_zone;
        Vec2::new(
            (zone.origin().column() as f32 + zone.width() as f32 / 2.0) * self.cell_size,
            (zone.origin().row() as f32 + zone.height() as f32 / 2.0) * self.cell_size,
        )
    }

    /// World-space bounds of the exit rectangle as `(min, max)` corners.
    ///
    /// An agent is considered exited only once its position falls inside this
    /// rectangle, covering both the zone's column span and its row band.
    #[must_use]
    pub fn exit_rect_world(&self) -> (Vec2, Vec2) {
        let zone = self.exit_zone;
        let min = Vec2::new(
            zone.origin().column() as f32 * self.cell_size,
            zone.origin().row() as f32 * self.cell_size,
        );
        let max = Vec2::new(
            zone.right() as f32 * self.cell_size,
            zone.bottom() as f32 * self.cell_size,
        );
        (min, max)
    }
}

/// Session-level tunables supplied at world construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    /// Money available before the first wave.
    pub starting_money: u32,
    /// Lives lost one-by-one as enemies exit.
    pub starting_lives: u32,
    /// Number of waves in the campaign.
    pub total_waves: u32,
    /// Hard cap on simultaneously live enemies; further spawns are dropped.
    pub enemy_cap: u32,
    /// Fraction of total investment refunded on sale; must stay below 1.
    pub sell_fraction: f32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_money: 200,
            starting_lives: 20,
            total_waves: 30,
            enemy_cap: 200,
            sell_fraction: 0.7,
        }
    }
}

/// Top-level state of the game session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// Between waves: building is allowed, waiting for a start request.
    Preparing,
    /// A wave is in flight.
    Playing,
    /// Simulation frozen; ticks are ignored so the clock does not move.
    Paused,
    /// All lives lost. Terminal except for a full restart.
    GameOver,
    /// Final wave cleared. Terminal except for a full restart.
    Victory,
}

/// Enemy archetype tags with their balance tables.
///
/// Stat constants are content, not structure: they are the replaceable
/// tuning surface, while the per-class mechanisms (airborne field bypass,
/// support aura, boss budget override) are structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyClass {
    /// Baseline ground unit.
    Infantry,
    /// Slow, heavily armored ground unit.
    Armored,
    /// Airborne unit that ignores the maze entirely.
    Flying,
    /// Durable ground unit with moderate armor.
    Shielded,
    /// Ground unit that projects a speed aura over nearby ground allies.
    Support,
    /// Single large unit spawned on boss waves with budget-derived health.
    Boss,
}

impl EnemyClass {
    /// Base hit points at level 1.
    #[must_use]
    pub const fn base_health(self) -> f32 {
        match self {
            Self::Infantry => 100.0,
            Self::Armored => 180.0,
            Self::Flying => 55.0,
            Self::Shielded => 140.0,
            Self::Support => 120.0,
            Self::Boss => 1_000.0,
        }
    }

    /// Hit points at the provided level; grows linearly with level.
    #[must_use]
    pub fn health_at(self, level: u32) -> f32 {
        let level = level.max(1);
        self.base_health() * (1.0 + 0.5 * (level - 1) as f32)
    }

    /// Base movement speed in world units per second.
    #[must_use]
    pub const fn base_speed(self) -> f32 {
        match self {
            Self::Infantry => 48.0,
            Self::Armored => 32.0,
            Self::Flying => 56.0,
            Self::Shielded => 36.0,
            Self::Support => 40.0,
            Self::Boss => 24.0,
        }
    }

    /// Flat armor value at the provided level.
    #[must_use]
    pub fn armor_at(self, level: u32) -> f32 {
        let level = level.max(1);
        let base = match self {
            Self::Armored => 60.0,
            Self::Shielded => 30.0,
            Self::Boss => 80.0,
            Self::Infantry | Self::Flying | Self::Support => 0.0,
        };
        if base == 0.0 {
            0.0
        } else {
            base + 15.0 * (level - 1) as f32
        }
    }

    /// Money credited when a unit of this class dies at the provided level.
    #[must_use]
    pub fn bounty_at(self, level: u32) -> u32 {
        let base = match self {
            Self::Infantry => 5,
            Self::Armored => 9,
            Self::Flying => 3,
            Self::Shielded => 8,
            Self::Support => 7,
            Self::Boss => 100,
        };
        base * level.max(1)
    }

    /// Airborne units never consult the occupancy field or the flow field.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        matches!(self, Self::Flying)
    }

    /// Speed bonus a support unit grants to nearby ground allies.
    #[must_use]
    pub const fn aura_bonus(self) -> f32 {
        match self {
            Self::Support => 0.15,
            _ => 0.0,
        }
    }

    /// Radius of the support aura in cells.
    #[must_use]
    pub const fn aura_radius_cells(self) -> f32 {
        match self {
            Self::Support => 2.0,
            _ => 0.0,
        }
    }
}

/// Per-level damage growth applied against base stats.
pub const UPGRADE_DAMAGE_GROWTH: f32 = 0.35;
/// Per-level range growth applied against base stats.
pub const UPGRADE_RANGE_GROWTH: f32 = 0.15;
/// Per-level fire-rate growth applied against base stats.
pub const UPGRADE_RATE_GROWTH: f32 = 0.25;

/// Tower archetype tags with their balance tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TowerKind {
    /// Hitscan single-target tower.
    Bolt,
    /// Lobbed projectile with splash damage; cannot target airborne units.
    Mortar,
    /// Piercing beam that damages every enemy along its ray.
    Lance,
    /// Non-damaging pulse that slows every enemy in range.
    Frost,
    /// Hitscan tower that only engages airborne units.
    Flak,
    /// Never attacks; buffs the towers within its range instead.
    Beacon,
}

impl TowerKind {
    /// Every constructible tower kind in deterministic order.
    pub const ALL: [TowerKind; 6] = [
        Self::Bolt,
        Self::Mortar,
        Self::Lance,
        Self::Frost,
        Self::Flak,
        Self::Beacon,
    ];

    /// Base damage per attack before upgrades and buffs.
    #[must_use]
    pub const fn base_damage(self) -> f32 {
        match self {
            Self::Bolt => 10.0,
            Self::Mortar => 24.0,
            Self::Lance => 14.0,
            Self::Flak => 12.0,
            Self::Frost | Self::Beacon => 0.0,
        }
    }

    /// Base targeting radius measured in cells.
    #[must_use]
    pub const fn base_range_cells(self) -> f32 {
        match self {
            Self::Bolt => 3.5,
            Self::Mortar => 4.5,
            Self::Lance => 4.0,
            Self::Frost => 2.5,
            Self::Flak => 4.0,
            Self::Beacon => 2.5,
        }
    }

    /// Base attacks per second. A zero rate means the tower never fires.
    #[must_use]
    pub const fn base_fire_rate(self) -> f32 {
        match self {
            Self::Bolt => 1.6,
            Self::Mortar => 0.5,
            Self::Lance => 0.8,
            Self::Frost => 0.65,
            Self::Flak => 1.4,
            Self::Beacon => 0.0,
        }
    }

    /// Purchase price.
    #[must_use]
    pub const fn base_cost(self) -> u32 {
        match self {
            Self::Bolt => 50,
            Self::Mortar => 90,
            Self::Lance => 110,
            Self::Frost => 70,
            Self::Flak => 60,
            Self::Beacon => 80,
        }
    }

    /// Flat armor reduction applied before the mitigation curve.
    #[must_use]
    pub const fn armor_penetration(self) -> f32 {
        match self {
            Self::Mortar => 10.0,
            Self::Lance => 25.0,
            Self::Flak => 5.0,
            Self::Bolt | Self::Frost | Self::Beacon => 0.0,
        }
    }

    /// Splash radius in cells; zero for non-splash archetypes.
    #[must_use]
    pub const fn splash_radius_cells(self) -> f32 {
        match self {
            Self::Mortar => 1.4,
            _ => 0.0,
        }
    }

    /// Linear falloff constant: splash damage scales by
    /// `1 - distance_fraction * falloff` across the splash radius.
    #[must_use]
    pub const fn splash_falloff(self) -> f32 {
        match self {
            Self::Mortar => 0.6,
            _ => 0.0,
        }
    }

    /// Half-width of the piercing beam in cells.
    #[must_use]
    pub const fn beam_width_cells(self) -> f32 {
        match self {
            Self::Lance => 0.45,
            _ => 0.0,
        }
    }

    /// Projectile travel speed in cells per second; zero means hitscan.
    #[must_use]
    pub const fn projectile_speed_cells(self) -> f32 {
        match self {
            Self::Mortar => 10.0,
            _ => 0.0,
        }
    }

    /// Slow multiplier applied by the pulse archetype.
    #[must_use]
    pub const fn slow_multiplier(self) -> f32 {
        match self {
            Self::Frost => 0.6,
            _ => 1.0,
        }
    }

    /// Duration of the applied slow effect.
    #[must_use]
    pub const fn slow_duration(self) -> Duration {
        match self {
            Self::Frost => Duration::from_millis(2_000),
            _ => Duration::ZERO,
        }
    }

    /// Additive contribution to the buff multiplier of towers in range.
    #[must_use]
    pub const fn buff_bonus(self) -> f32 {
        match self {
            Self::Beacon => 0.25,
            _ => 0.0,
        }
    }

    /// Highest reachable upgrade level.
    #[must_use]
    pub const fn max_level(self) -> u32 {
        3
    }

    /// Reports whether this archetype may engage the provided enemy class.
    ///
    /// Category filtering happens at the candidate stage so an ineligible
    /// enemy never consumes a tower's fire-rate budget.
    #[must_use]
    pub const fn can_target(self, class: EnemyClass) -> bool {
        match self {
            Self::Mortar => !class.is_airborne(),
            Self::Flak => class.is_airborne(),
            Self::Beacon => false,
            Self::Bolt | Self::Lance | Self::Frost => true,
        }
    }

    /// Damage at the provided upgrade level, recomputed from base stats.
    #[must_use]
    pub fn damage_at(self, level: u32) -> f32 {
        self.base_damage() * (1.0 + UPGRADE_DAMAGE_GROWTH * level as f32)
    }

    /// Range in cells at the provided upgrade level.
    #[must_use]
    pub fn range_cells_at(self, level: u32) -> f32 {
        self.base_range_cells() * (1.0 + UPGRADE_RANGE_GROWTH * level as f32)
    }

    /// Fire rate at the provided upgrade level.
    #[must_use]
    pub fn fire_rate_at(self, level: u32) -> f32 {
        self.base_fire_rate() * (1.0 + UPGRADE_RATE_GROWTH * level as f32)
    }

    /// Cost of the upgrade that raises a tower from `current_level`.
    ///
    /// Upgrades cost 40%, 50%, then 60% of the purchase price.
    #[must_use]
    pub fn upgrade_cost(self, current_level: u32) -> u32 {
        let percent = 30 + 10 * (current_level + 1);
        (self.base_cost() * percent).div_euclid(100)
    }
}

/// Player-selectable target-priority policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPriority {
    /// Enemy furthest along the field (smallest remaining distance).
    #[default]
    First,
    /// Enemy least progressed toward the exit.
    Last,
    /// Highest current health.
    Strongest,
    /// Lowest current health.
    Weakest,
    /// Highest effective speed.
    Fastest,
}

/// A single resolved hit against one enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemyHit {
    /// Enemy receiving the hit.
    pub enemy: EnemyId,
    /// Raw damage before armor mitigation.
    pub amount: f32,
    /// Flat armor reduction applied before the mitigation curve.
    pub armor_penetration: f32,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the field geometry and resets all derived navigation state.
    ConfigureField {
        /// New field geometry.
        config: FieldConfig,
    },
    /// Advances the simulation clock by an already speed-scaled delta.
    Tick {
        /// Elapsed simulated time since the previous tick.
        dt: Duration,
    },
    /// Begins the provided wave; valid only while preparing.
    StartWave {
        /// Wave the scheduler is about to run.
        wave: WaveId,
    },
    /// Freezes the simulation clock.
    PauseGame,
    /// Resumes a paused simulation.
    ResumeGame,
    /// Creates an enemy agent inside the spawn zone.
    SpawnEnemy {
        /// Archetype of the new agent.
        class: EnemyClass,
        /// Level controlling health, armor, and bounty scaling.
        level: u32,
        /// Explicit hit-point override used by budget-derived bosses.
        health_override: Option<f32>,
    },
    /// Moves an enemy to a new continuous position with a new heading.
    AdvanceEnemy {
        /// Agent being moved.
        enemy: EnemyId,
        /// Proposed position in world units.
        to: Vec2,
        /// Unit heading the agent is facing after the move.
        heading: Vec2,
    },
    /// Stamps a tower's cooldown and announces the shot.
    RecordShot {
        /// Tower that fired.
        tower: TowerId,
    },
    /// Applies damage hits attributed to a tower.
    DamageEnemies {
        /// Tower the hits are attributed to.
        source: TowerId,
        /// Resolved hits; dead or missing enemies are skipped silently.
        hits: Vec<EnemyHit>,
    },
    /// Applies a slow effect to the listed enemies.
    SlowEnemies {
        /// Tower the effect is attributed to.
        source: TowerId,
        /// Enemies receiving the slow.
        targets: Vec<EnemyId>,
        /// Speed multiplier; lower is stronger.
        multiplier: f32,
        /// Effect duration from the moment of application.
        duration: Duration,
    },
    /// Sets a tower's externally-derived buff multiplier for this frame.
    SetTowerBuff {
        /// Tower receiving the buff.
        tower: TowerId,
        /// Total multiplier including every buff source in range.
        multiplier: f32,
    },
    /// Requests construction of a tower on the provided cell.
    PlaceTower {
        /// Archetype to construct.
        kind: TowerKind,
        /// Cell the tower will occupy.
        cell: GridPos,
    },
    /// Sells an existing tower, refunding part of its investment.
    SellTower {
        /// Tower to sell.
        tower: TowerId,
    },
    /// Upgrades a tower one level, paying the level's cost atomically.
    UpgradeTower {
        /// Tower to upgrade.
        tower: TowerId,
    },
    /// Changes the target-priority policy of a tower.
    SetTargetPriority {
        /// Tower being reconfigured.
        tower: TowerId,
        /// Newly selected policy.
        priority: TargetPriority,
    },
    /// Marks the active wave as finished and credits the completion bonus.
    CompleteWave {
        /// Wave that just completed.
        wave: WaveId,
    },
    /// Replaces the entire session state from a save payload between ticks.
    RestoreGame {
        /// Save payload to restore from.
        save: SaveGame,
    },
}

/// Events broadcast by the world after processing commands.
///
/// These double as the fire-and-forget audio/VFX hooks: the world never
/// blocks on or depends on their handling.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The simulation clock advanced.
    TimeAdvanced {
        /// Elapsed simulated time for this tick.
        dt: Duration,
        /// Accumulated simulation clock after the tick.
        now: Duration,
    },
    /// The session moved to a new phase.
    PhaseChanged {
        /// Phase that became active.
        phase: GamePhase,
    },
    /// A wave began.
    WaveStarted {
        /// Wave that started.
        wave: WaveId,
    },
    /// An enemy agent entered the simulation.
    EnemySpawned {
        /// Identifier assigned to the agent.
        enemy: EnemyId,
        /// Archetype of the agent.
        class: EnemyClass,
        /// Level of the agent.
        level: u32,
        /// Cell the agent spawned in.
        cell: GridPos,
    },
    /// A spawn request was dropped because the live-agent cap was reached.
    SpawnDropped {
        /// Archetype of the dropped spawn.
        class: EnemyClass,
        /// Level of the dropped spawn.
        level: u32,
    },
    /// An enemy died to tower damage.
    EnemyDied {
        /// Agent that died.
        enemy: EnemyId,
        /// Archetype of the agent.
        class: EnemyClass,
        /// Money credited for the kill.
        bounty: u32,
    },
    /// An enemy reached the exit rectangle.
    EnemyExited {
        /// Agent that exited.
        enemy: EnemyId,
        /// Lives remaining after the loss.
        lives_remaining: u32,
    },
    /// A tower resolved an attack.
    TowerFired {
        /// Tower that fired.
        tower: TowerId,
        /// Archetype of the tower.
        kind: TowerKind,
    },
    /// A tower was constructed.
    TowerPlaced {
        /// Identifier assigned by the world.
        tower: TowerId,
        /// Archetype constructed.
        kind: TowerKind,
        /// Cell the tower occupies.
        cell: GridPos,
    },
    /// A placement request was rejected without mutating state.
    PlacementRejected {
        /// Requested archetype.
        kind: TowerKind,
        /// Requested cell.
        cell: GridPos,
        /// Reason the placement failed.
        reason: PlacementError,
    },
    /// A tower was sold.
    TowerSold {
        /// Tower that was removed.
        tower: TowerId,
        /// Money refunded.
        refund: u32,
    },
    /// A sale request was rejected without mutating state.
    SellRejected {
        /// Tower the request addressed.
        tower: TowerId,
        /// Reason the sale failed.
        reason: SellError,
    },
    /// A tower finished an upgrade.
    TowerUpgraded {
        /// Tower that was upgraded.
        tower: TowerId,
        /// Level reached.
        level: u32,
    },
    /// An upgrade request was rejected without mutating state.
    UpgradeRejected {
        /// Tower the request addressed.
        tower: TowerId,
        /// Reason the upgrade failed.
        reason: UpgradeError,
    },
    /// The active wave completed (queue drained and zero live enemies).
    WaveCompleted {
        /// Wave that completed.
        wave: WaveId,
        /// Completion bonus credited.
        bonus: u32,
    },
    /// Every wave in the campaign has completed.
    AllWavesCompleted,
}

/// Reasons a tower placement request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum PlacementError {
    /// The cell lies outside the grid.
    #[error("cell is outside the field")]
    OutOfBounds,
    /// The cell belongs to the spawn zone.
    #[error("cannot build in the spawn zone")]
    InSpawnZone,
    /// The cell belongs to the exit zone.
    #[error("cannot build in the exit zone")]
    InExitZone,
    /// Another tower already occupies the cell.
    #[error("cell is already occupied")]
    Occupied,
    /// The cell is not walkable terrain.
    #[error("cell is not walkable")]
    NotWalkable,
    /// The placement would disconnect every spawn cell from the exit.
    #[error("would block all paths")]
    BlocksAllPaths,
    /// The player cannot afford the tower.
    #[error("insufficient funds")]
    InsufficientFunds,
}

/// Reasons a tower upgrade request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum UpgradeError {
    /// The tower already reached its maximum level.
    #[error("tower is at maximum level")]
    MaxLevel,
    /// The player cannot afford the upgrade.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// No tower with the provided identifier exists.
    #[error("no such tower")]
    UnknownTower,
}

/// Reasons a tower sale request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum SellError {
    /// No tower with the provided identifier exists.
    #[error("no such tower")]
    UnknownTower,
}

/// Reasons world construction may fail.
///
/// Malformed startup configuration is the only unrecoverable condition in
/// the simulation; it fails fast before any state exists.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The grid has a zero dimension.
    #[error("degenerate grid dimensions {columns}x{rows}")]
    DegenerateGrid {
        /// Configured column count.
        columns: u32,
        /// Configured row count.
        rows: u32,
    },
    /// The spawn zone consumes the whole field.
    #[error("spawn zone of {spawn_columns} columns leaves no buildable space")]
    SpawnZoneTooWide {
        /// Configured spawn-column count.
        spawn_columns: u32,
    },
    /// The exit zone extends beyond the grid.
    #[error("exit zone extends beyond the field")]
    ExitZoneOutOfBounds,
    /// The cell size is zero, negative, or non-finite.
    #[error("cell size must be positive and finite")]
    InvalidCellSize,
}

/// Immutable representation of a single enemy's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Unique identifier assigned to the agent.
    pub id: EnemyId,
    /// Archetype of the agent.
    pub class: EnemyClass,
    /// Level of the agent.
    pub level: u32,
    /// Continuous position in world units.
    pub position: Vec2,
    /// Last committed unit heading.
    pub heading: Vec2,
    /// Current hit points.
    pub health: f32,
    /// Maximum hit points.
    pub max_health: f32,
    /// Base movement speed in world units per second.
    pub base_speed: f32,
    /// Active slow multiplier; `1.0` when no slow is in effect.
    pub slow_multiplier: f32,
    /// Simulation-clock instant at which the active slow expires.
    pub slow_expires_at: Option<Duration>,
    /// Flat armor value.
    pub armor: f32,
    /// Money credited when the agent dies.
    pub bounty: u32,
}

impl EnemySnapshot {
    /// Movement speed after applying the active slow multiplier.
    #[must_use]
    pub fn effective_speed(&self) -> f32 {
        self.base_speed * self.slow_multiplier
    }
}

/// Read-only snapshot describing all live enemies.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic id order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by identifier.
    #[must_use]
    pub fn get(&self, enemy: EnemyId) -> Option<&EnemySnapshot> {
        self.snapshots
            .binary_search_by_key(&enemy, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single tower's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower by the world.
    pub id: TowerId,
    /// Archetype of the tower.
    pub kind: TowerKind,
    /// Cell the tower occupies.
    pub cell: GridPos,
    /// Current upgrade level, `0..=max_level`.
    pub level: u32,
    /// Player-selected target-priority policy.
    pub priority: TargetPriority,
    /// Damage per attack after upgrades, before external buffs.
    pub damage: f32,
    /// Range in cells after upgrades, before external buffs.
    pub range_cells: f32,
    /// Attacks per second after upgrades, before external buffs.
    pub fire_rate: f32,
    /// External buff multiplier recomputed every frame; `1.0` when unbuffed.
    pub buff_multiplier: f32,
    /// Total money ever spent on this tower.
    pub invested: u32,
    /// Simulation-clock instant of the last shot.
    pub last_fired_at: Option<Duration>,
}

impl TowerSnapshot {
    /// Damage including the external buff multiplier.
    #[must_use]
    pub fn effective_damage(&self) -> f32 {
        self.damage * self.buff_multiplier
    }

    /// Range in cells including the external buff multiplier.
    #[must_use]
    pub fn effective_range_cells(&self) -> f32 {
        self.range_cells * self.buff_multiplier
    }

    /// Fire rate including the external buff multiplier.
    #[must_use]
    pub fn effective_fire_rate(&self) -> f32 {
        self.fire_rate * self.buff_multiplier
    }

    /// Reports whether the fire-rate gate permits an attack at `now`.
    #[must_use]
    pub fn is_ready(&self, now: Duration) -> bool {
        let rate = self.effective_fire_rate();
        if rate <= 0.0 {
            return false;
        }

        match self.last_fired_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= Duration::from_secs_f32(1.0 / rate),
        }
    }
}

/// Read-only snapshot describing all placed towers.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic id order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by identifier.
    #[must_use]
    pub fn get(&self, tower: TowerId) -> Option<&TowerSnapshot> {
        self.snapshots
            .binary_search_by_key(&tower, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Read-only view over the flow field's distances and directions.
///
/// Borrowed from the world in production; `from_owned` exists so systems can
/// be tested against hand-built fields.
#[derive(Clone, Debug)]
pub struct FlowFieldView<'a> {
    distances: Cow<'a, [u16]>,
    directions: Cow<'a, [Option<Vec2>]>,
    width: u32,
    height: u32,
    cell_size: f32,
}

impl<'a> FlowFieldView<'a> {
    /// Captures a view backed by borrowed field storage.
    #[must_use]
    pub fn from_parts(
        distances: &'a [u16],
        directions: &'a [Option<Vec2>],
        width: u32,
        height: u32,
        cell_size: f32,
    ) -> Self {
        Self {
            distances: Cow::Borrowed(distances),
            directions: Cow::Borrowed(directions),
            width,
            height,
            cell_size,
        }
    }

    /// Builds an owned view, primarily for tests.
    #[must_use]
    pub fn from_owned(
        distances: Vec<u16>,
        directions: Vec<Option<Vec2>>,
        width: u32,
        height: u32,
        cell_size: f32,
    ) -> FlowFieldView<'static> {
        FlowFieldView {
            distances: Cow::Owned(distances),
            directions: Cow::Owned(directions),
            width,
            height,
            cell_size,
        }
    }

    /// Grid dimensions of the field.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Edge length of one cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Dense distances in row-major order; [`NO_PATH`] marks unreachable
    /// cells.
    #[must_use]
    pub fn distances(&self) -> &[u16] {
        &self.distances
    }

    /// Distance-to-exit for the provided cell, if it lies within the field.
    #[must_use]
    pub fn distance(&self, cell: GridPos) -> Option<u16> {
        self.index(cell)
            .and_then(|index| self.distances.get(index).copied())
    }

    /// Unit direction toward the exit for the provided cell.
    ///
    /// `None` covers both out-of-field cells and genuinely unreachable ones;
    /// callers fall back to their default heading.
    #[must_use]
    pub fn direction(&self, cell: GridPos) -> Option<Vec2> {
        self.index(cell)
            .and_then(|index| self.directions.get(index).copied().flatten())
    }

    /// Bilinearly blended direction at a continuous world-space position.
    ///
    /// The four surrounding cell centers are weighted by proximity; cells
    /// without a defined direction are weighted out rather than poisoning
    /// the blend. Returns `None` when no surrounding cell contributes.
    #[must_use]
    pub fn interpolated_direction(&self, position: Vec2) -> Option<Vec2> {
        if self.cell_size <= 0.0 {
            return None;
        }

        let gx = position.x / self.cell_size - 0.5;
        let gy = position.y / self.cell_size - 0.5;
        let base_x = gx.floor();
        let base_y = gy.floor();
        let fx = gx - base_x;
        let fy = gy - base_y;

        let mut blended = Vec2::ZERO;
        let mut total_weight = 0.0;

        for (dx, dy, weight) in [
            (0_i64, 0_i64, (1.0 - fx) * (1.0 - fy)),
            (1, 0, fx * (1.0 - fy)),
            (0, 1, (1.0 - fx) * fy),
            (1, 1, fx * fy),
        ] {
            if weight <= f32::EPSILON {
                continue;
            }

            let column = base_x as i64 + dx;
            let row = base_y as i64 + dy;
            if column < 0 || row < 0 {
                continue;
            }

            let Ok(column) = u32::try_from(column) else {
                continue;
            };
            let Ok(row) = u32::try_from(row) else {
                continue;
            };

            if let Some(direction) = self.direction(GridPos::new(column, row)) {
                blended += direction * weight;
                total_weight += weight;
            }
        }

        if total_weight <= f32::EPSILON {
            return None;
        }

        let combined = blended / total_weight;
        if combined.length_squared() <= f32::EPSILON {
            None
        } else {
            Some(combined.normalize())
        }
    }

    fn index(&self, cell: GridPos) -> Option<usize> {
        if cell.column() < self.width && cell.row() < self.height {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.width).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Read-only snapshot of the money ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EconomySnapshot {
    /// Current balance.
    pub balance: u32,
    /// Cumulative money ever earned.
    pub total_earned: u32,
    /// Cumulative money ever spent.
    pub total_spent: u32,
}

/// Tower tuple captured inside a save payload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedTower {
    /// Archetype of the tower.
    pub kind: TowerKind,
    /// Cell the tower occupies.
    pub cell: GridPos,
    /// Upgrade level at save time.
    pub level: u32,
    /// Total money invested at save time.
    pub invested: u32,
    /// Selected target-priority policy.
    pub priority: TargetPriority,
}

/// Complete persistence payload.
///
/// Occupancy and the flow field are deliberately absent: loading re-derives
/// both from the tower list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Index of the most recently started wave.
    pub wave: WaveId,
    /// Money balance.
    pub balance: u32,
    /// Lives remaining.
    pub lives: u32,
    /// Accumulated simulation clock.
    pub clock: Duration,
    /// Field geometry.
    pub field: FieldConfig,
    /// Session rules.
    pub rules: GameRules,
    /// Every placed tower.
    pub towers: Vec<SavedTower>,
}

/// One homogeneous group of spawns within a wave plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnGroup {
    /// Enemy archetype spawned by the group.
    pub class: EnemyClass,
    /// Level of every unit in the group.
    pub level: u32,
    /// Number of units to spawn.
    pub count: u32,
    /// Interval between consecutive spawns inside the group.
    pub spawn_interval: Duration,
    /// Delay between the previous group's start and this group's start.
    pub delay_after_previous: Duration,
    /// Explicit hit-point override; set only for budget-derived bosses.
    pub health_override: Option<f32>,
}

/// Ordered spawn schedule produced by the wave generator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WavePlan {
    /// Wave this plan belongs to.
    pub wave: WaveId,
    /// Spawn groups in scheduling order.
    pub groups: Vec<SpawnGroup>,
}

impl WavePlan {
    /// Total number of units across every group.
    #[must_use]
    pub fn total_enemies(&self) -> u32 {
        self.groups.iter().map(|group| group.count).sum()
    }

    /// Reports whether the plan spawns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Target selection resolved by the targeting system for one tower.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetAssignment {
    /// Tower the assignment belongs to.
    pub tower: TowerId,
    /// Archetype of the tower, repeated for convenience.
    pub kind: TowerKind,
    /// Concrete selection to resolve.
    pub selection: Selection,
}

/// Per-archetype shape of a target selection.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// A single enemy aimed at directly.
    Single {
        /// Selected enemy.
        enemy: EnemyId,
        /// Enemy position at selection time.
        point: Vec2,
    },
    /// An impact point chosen to maximize splash coverage.
    Volley {
        /// Aim point of the lobbed projectile.
        impact: Vec2,
    },
    /// A ray fired through a primary enemy, piercing everything near it.
    Sweep {
        /// Primary enemy defining the ray.
        enemy: EnemyId,
        /// Enemy position at selection time.
        through: Vec2,
    },
    /// Every listed enemy is affected simultaneously.
    Pulse {
        /// Enemies inside the pulse radius.
        enemies: Vec<EnemyId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = GridPos::new(1, 1);
        let destination = GridPos::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn grid_rect_contains_its_cells_only() {
        let rect = GridRect::new(GridPos::new(8, 3), 2, 4);
        assert!(rect.contains(GridPos::new(8, 3)));
        assert!(rect.contains(GridPos::new(9, 6)));
        assert!(!rect.contains(GridPos::new(7, 3)));
        assert!(!rect.contains(GridPos::new(8, 7)));
        assert_eq!(rect.cells().count(), 8);
    }

    #[test]
    fn standard_field_zones_do_not_overlap() {
        let field = FieldConfig::standard();
        for cell in field.exit_zone.cells() {
            assert!(!field.in_spawn_zone(cell));
            assert!(field.contains_cell(cell));
        }
    }

    #[test]
    fn cell_at_world_snaps_to_containing_cell() {
        let field = FieldConfig::standard();
        assert_eq!(
            field.cell_at_world(Vec2::new(0.0, 0.0)),
            Some(GridPos::new(0, 0))
        );
        assert_eq!(
            field.cell_at_world(Vec2::new(47.9, 64.0)),
            Some(GridPos::new(1, 2))
        );
        assert_eq!(field.cell_at_world(Vec2::new(-1.0, 5.0)), None);
        assert_eq!(field.cell_at_world(Vec2::new(320.0, 5.0)), None);
    }

    #[test]
    fn upgraded_damage_recomputes_from_base() {
        // Level 2: 10 * (1 + 2 * 0.35) = 17, independent of the level-1 value.
        assert!((TowerKind::Bolt.damage_at(2) - 17.0).abs() < f32::EPSILON);
        assert!((TowerKind::Bolt.damage_at(1) - 13.5).abs() < f32::EPSILON);
    }

    #[test]
    fn upgrade_costs_follow_the_schedule() {
        assert_eq!(TowerKind::Bolt.upgrade_cost(0), 20);
        assert_eq!(TowerKind::Bolt.upgrade_cost(1), 25);
        assert_eq!(TowerKind::Bolt.upgrade_cost(2), 30);
    }

    #[test]
    fn category_filters_cover_airborne_units() {
        assert!(!TowerKind::Mortar.can_target(EnemyClass::Flying));
        assert!(TowerKind::Mortar.can_target(EnemyClass::Infantry));
        assert!(TowerKind::Flak.can_target(EnemyClass::Flying));
        assert!(!TowerKind::Flak.can_target(EnemyClass::Armored));
        assert!(!TowerKind::Beacon.can_target(EnemyClass::Infantry));
    }

    #[test]
    fn flying_units_are_cheaper_to_kill_than_infantry() {
        assert!(EnemyClass::Flying.health_at(3) < EnemyClass::Infantry.health_at(3));
        assert!(EnemyClass::Flying.bounty_at(3) < EnemyClass::Infantry.bounty_at(3));
        assert!(EnemyClass::Flying.is_airborne());
        assert!(!EnemyClass::Shielded.is_airborne());
    }

    #[test]
    fn tower_readiness_respects_fire_rate() {
        let mut snapshot = TowerSnapshot {
            id: TowerId::new(1),
            kind: TowerKind::Bolt,
            cell: GridPos::new(4, 4),
            level: 0,
            priority: TargetPriority::default(),
            damage: 10.0,
            range_cells: 3.5,
            fire_rate: 2.0,
            buff_multiplier: 1.0,
            invested: 50,
            last_fired_at: None,
        };
        assert!(snapshot.is_ready(Duration::ZERO));

        snapshot.last_fired_at = Some(Duration::from_millis(1_000));
        assert!(!snapshot.is_ready(Duration::from_millis(1_200)));
        assert!(snapshot.is_ready(Duration::from_millis(1_500)));

        snapshot.fire_rate = 0.0;
        assert!(!snapshot.is_ready(Duration::from_secs(100)));
    }

    #[test]
    fn interpolated_direction_weights_out_undefined_cells() {
        let east = Some(Vec2::new(1.0, 0.0));
        let view =
            FlowFieldView::from_owned(vec![2, 1, 2, 1], vec![east, east, None, None], 2, 2, 1.0);

        // Centered between all four cells; only the top row contributes.
        let direction = view
            .interpolated_direction(Vec2::new(1.0, 1.0))
            .expect("defined neighbors must contribute");
        assert!((direction.x - 1.0).abs() < 1e-5);
        assert!(direction.y.abs() < 1e-5);

        // A region with no defined neighbor yields no direction.
        let empty = FlowFieldView::from_owned(vec![NO_PATH], vec![None], 1, 1, 1.0);
        assert!(empty.interpolated_direction(Vec2::new(0.5, 0.5)).is_none());
    }

    #[test]
    fn views_sort_and_resolve_by_id() {
        let enemies = EnemyView::from_snapshots(vec![
            enemy_snapshot(7, Vec2::new(1.0, 1.0)),
            enemy_snapshot(3, Vec2::new(2.0, 2.0)),
        ]);
        let ids: Vec<u32> = enemies.iter().map(|snapshot| snapshot.id.get()).collect();
        assert_eq!(ids, vec![3, 7]);
        assert!(enemies.get(EnemyId::new(7)).is_some());
        assert!(enemies.get(EnemyId::new(8)).is_none());
    }

    fn enemy_snapshot(id: u32, position: Vec2) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            class: EnemyClass::Infantry,
            level: 1,
            position,
            heading: Vec2::new(1.0, 0.0),
            health: 100.0,
            max_health: 100.0,
            base_speed: 48.0,
            slow_multiplier: 1.0,
            slow_expires_at: None,
            armor: 0.0,
            bounty: 5,
        }
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn save_game_round_trips_through_bincode() {
        let save = SaveGame {
            wave: WaveId::new(12),
            balance: 340,
            lives: 17,
            clock: Duration::from_millis(482_125),
            field: FieldConfig::standard(),
            rules: GameRules::default(),
            towers: vec![SavedTower {
                kind: TowerKind::Mortar,
                cell: GridPos::new(5, 4),
                level: 2,
                invested: 171,
                priority: TargetPriority::Strongest,
            }],
        };
        assert_round_trip(&save);
    }

    #[test]
    fn identifiers_round_trip_through_bincode() {
        assert_round_trip(&EnemyId::new(42));
        assert_round_trip(&TowerId::new(7));
        assert_round_trip(&WaveId::new(9));
    }

    #[test]
    fn rejection_reasons_round_trip_through_bincode() {
        assert_round_trip(&PlacementError::BlocksAllPaths);
        assert_round_trip(&UpgradeError::MaxLevel);
    }

    #[test]
    fn placement_rejection_reason_is_human_readable() {
        assert_eq!(
            PlacementError::BlocksAllPaths.to_string(),
            "would block all paths"
        );
        assert_eq!(
            PlacementError::InsufficientFunds.to_string(),
            "insufficient funds"
        );
    }
}
