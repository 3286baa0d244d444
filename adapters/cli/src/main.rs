#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter that runs a full Bulwark campaign.
//!
//! The binary owns the frame loop and nothing else: each frame it scales the
//! delta by the speed multiplier, ticks the world, and pumps the systems in
//! fixed order (spawning, steering, targeting, combat), applying every
//! command batch before the next system runs. Events produced while applying
//! a frame's commands are carried into the next frame's event stream.

mod save_transfer;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use bulwark_core::{
    Command, Event, FieldConfig, GamePhase, GameRules, GridPos, GridRect, TowerKind,
};
use bulwark_system_combat::Combat;
use bulwark_system_spawning::{Config as SpawnConfig, Spawning, StartOutcome};
use bulwark_system_steering::Steering;
use bulwark_system_targeting::Targeting;
use bulwark_world::{apply, query, World};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;

/// Tower kinds the automatic builder cycles through between waves.
const BUILD_ROTATION: [TowerKind; 6] = [
    TowerKind::Bolt,
    TowerKind::Mortar,
    TowerKind::Flak,
    TowerKind::Frost,
    TowerKind::Beacon,
    TowerKind::Lance,
];
/// Towers the automatic builder may place per intermission.
const BUILDS_PER_INTERMISSION: usize = 3;
/// Balance above which the automatic builder spends on upgrades instead.
const UPGRADE_RESERVE: u32 = 300;
/// Hard frame guard against a wedged campaign.
const MAX_FRAMES: u64 = 2_000_000;

/// Runs a Bulwark tower-defense campaign without a renderer attached.
#[derive(Debug, Parser)]
#[command(name = "bulwark", about = "Headless Bulwark campaign runner")]
struct Args {
    /// Grid columns (overrides the tuning file).
    #[arg(long)]
    columns: Option<u32>,
    /// Grid rows (overrides the tuning file).
    #[arg(long)]
    rows: Option<u32>,
    /// Number of waves in the campaign.
    #[arg(long)]
    waves: Option<u32>,
    /// Campaign seed driving wave generation.
    #[arg(long)]
    seed: Option<u64>,
    /// Simulation speed multiplier (1, 2, or 4 in the UI; any positive here).
    #[arg(long)]
    speed: Option<f32>,
    /// Starting lives.
    #[arg(long)]
    lives: Option<u32>,
    /// Starting money.
    #[arg(long)]
    money: Option<u32>,
    /// Real milliseconds of simulated time per frame, before speed scaling.
    #[arg(long, default_value_t = 50)]
    frame_ms: u64,
    /// Optional TOML tuning file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Resume from a save-transfer string instead of starting fresh.
    #[arg(long)]
    load: Option<String>,
    /// Print a save-transfer string for the final state.
    #[arg(long)]
    emit_save: bool,
    /// Disable the automatic builder and run an undefended campaign.
    #[arg(long)]
    idle: bool,
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Optional TOML tuning overlay; any omitted value keeps its default.
#[derive(Debug, Default, Deserialize)]
struct TuningFile {
    field: Option<FieldTuning>,
    rules: Option<RulesTuning>,
    seed: Option<u64>,
    speed: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldTuning {
    columns: Option<u32>,
    rows: Option<u32>,
    cell_size: Option<f32>,
    spawn_columns: Option<u32>,
    exit: Option<ExitTuning>,
}

#[derive(Debug, Deserialize)]
struct ExitTuning {
    column: u32,
    row: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RulesTuning {
    starting_money: Option<u32>,
    starting_lives: Option<u32>,
    total_waves: Option<u32>,
    enemy_cap: Option<u32>,
    sell_fraction: Option<f32>,
}

#[derive(Debug, Default)]
struct Stats {
    kills: u64,
    leaks: u64,
    shots: u64,
    towers_built: u64,
    waves_completed: u32,
}

impl Stats {
    fn digest(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::EnemyDied { .. } => self.kills += 1,
                Event::EnemyExited { .. } => self.leaks += 1,
                Event::TowerFired { .. } => self.shots += 1,
                Event::TowerPlaced { .. } => self.towers_built += 1,
                Event::WaveStarted { wave } => info!("wave {} started", wave.get()),
                Event::WaveCompleted { wave, bonus } => {
                    self.waves_completed = wave.get();
                    info!("wave {} completed, bonus {}", wave.get(), bonus);
                }
                _ => {}
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let tuning = load_tuning(args.config.as_deref())?;
    let (field, rules, seed, speed) = resolve_settings(&args, &tuning);

    let mut world = match &args.load {
        Some(transfer) => {
            let save = save_transfer::decode(transfer).context("decoding save string")?;
            info!("resuming after wave {}", save.wave.get());
            World::from_save(&save).context("restoring save")?
        }
        None => World::new(field, rules).context("constructing world")?,
    };

    let mut spawning = Spawning::new(SpawnConfig {
        total_waves: query::rules(&world).total_waves,
        seed,
    });
    spawning.resume_after(query::wave(&world));
    let mut steering = Steering::new();
    let mut targeting = Targeting::new();
    let mut combat = Combat::new();

    let frame_dt = Duration::from_millis(args.frame_ms);
    let mut carried: Vec<Event> = Vec::new();
    let mut stats = Stats::default();

    for _ in 0..MAX_FRAMES {
        match query::phase(&world) {
            GamePhase::Preparing => {
                if !args.idle {
                    run_auto_builder(&mut world, &mut stats);
                }

                let mut commands = Vec::new();
                match spawning.start_next_wave(query::clock(&world), &mut commands) {
                    StartOutcome::Started(_) | StartOutcome::AlreadyActive => {}
                    StartOutcome::Exhausted => break,
                }
                let mut events = Vec::new();
                for command in commands {
                    apply(&mut world, command, &mut events);
                }
                stats.digest(&events);
                carried.extend(events);
            }
            GamePhase::Playing => {
                run_frame(
                    &mut world,
                    &mut spawning,
                    &mut steering,
                    &mut targeting,
                    &mut combat,
                    &mut carried,
                    frame_dt,
                    speed,
                    &mut stats,
                );
            }
            GamePhase::Paused => {
                warn!("headless run found the world paused; resuming");
                let mut events = Vec::new();
                apply(&mut world, Command::ResumeGame, &mut events);
            }
            GamePhase::GameOver | GamePhase::Victory => break,
        }
    }

    report(&world, &stats);
    if args.emit_save {
        println!("{}", save_transfer::encode(&query::save_game(&world)));
    }

    Ok(())
}

/// One simulated frame in the fixed order: tick, spawning, steering,
/// targeting, combat. Each system's commands are applied before the next
/// system runs so later systems observe fresh state.
#[allow(clippy::too_many_arguments)]
fn run_frame(
    world: &mut World,
    spawning: &mut Spawning,
    steering: &mut Steering,
    targeting: &mut Targeting,
    combat: &mut Combat,
    carried: &mut Vec<Event>,
    frame_dt: Duration,
    speed: f32,
    stats: &mut Stats,
) {
    // Speed multipliers scale the delta before accumulation, never the
    // already-elapsed clock.
    let scaled = Duration::from_secs_f64(frame_dt.as_secs_f64() * f64::from(speed));
    let mut events = std::mem::take(carried);
    apply(world, Command::Tick { dt: scaled }, &mut events);

    let config = *query::field_config(world);
    let mut produced = Vec::new();

    let mut commands = Vec::new();
    spawning.handle(&events, &mut commands);
    for command in commands {
        apply(world, command, &mut produced);
    }

    let mut commands = Vec::new();
    {
        let enemies = query::enemy_view(world);
        let flow = query::flow_view(world);
        steering.handle(
            &events,
            &enemies,
            &flow,
            &config,
            |cell| query::is_cell_blocked(world, cell),
            &mut commands,
        );
    }
    for command in commands {
        apply(world, command, &mut produced);
    }

    let mut assignments = Vec::new();
    let mut commands = Vec::new();
    {
        let towers = query::tower_view(world);
        let enemies = query::enemy_view(world);
        let flow = query::flow_view(world);
        targeting.handle(
            query::phase(world),
            &towers,
            &enemies,
            &flow,
            &config,
            &mut assignments,
            &mut commands,
        );
    }
    for command in commands {
        apply(world, command, &mut produced);
    }

    let mut commands = Vec::new();
    {
        let towers = query::tower_view(world);
        let enemies = query::enemy_view(world);
        combat.handle(&events, &assignments, &towers, &enemies, &config, &mut commands);
    }
    for command in commands {
        apply(world, command, &mut produced);
    }

    stats.digest(&events);
    stats.digest(&produced);
    *carried = produced;
}

/// Deterministic intermission builder: places a few towers on the first
/// cells the validator accepts, then sinks surplus money into upgrades.
fn run_auto_builder(world: &mut World, stats: &mut Stats) {
    let config = *query::field_config(world);
    let mut built = 0;
    let mut events = Vec::new();

    'placement: for row in 0..config.rows {
        for column in 0..config.columns {
            if built >= BUILDS_PER_INTERMISSION {
                break 'placement;
            }

            let cell = GridPos::new(column, row);
            let kind = BUILD_ROTATION
                [(query::tower_view(world).len() + built) % BUILD_ROTATION.len()];
            if query::validate_placement(world, kind, cell).is_err() {
                continue;
            }
            if query::economy(world).balance < kind.base_cost() {
                continue;
            }

            apply(world, Command::PlaceTower { kind, cell }, &mut events);
            built += 1;
        }
    }

    loop {
        if query::economy(world).balance <= UPGRADE_RESERVE {
            break;
        }

        let candidate = query::tower_view(world).into_vec().into_iter().find(|tower| {
            tower.level < tower.kind.max_level()
                && tower.kind.upgrade_cost(tower.level) <= query::economy(world).balance
        });
        let Some(tower) = candidate else {
            break;
        };

        apply(world, Command::UpgradeTower { tower: tower.id }, &mut events);
    }

    stats.digest(&events);
}

fn resolve_settings(args: &Args, tuning: &TuningFile) -> (FieldConfig, GameRules, u64, f32) {
    let mut field = FieldConfig::standard();
    let mut rules = GameRules::default();

    if let Some(field_tuning) = &tuning.field {
        if let Some(columns) = field_tuning.columns {
            field.columns = columns;
        }
        if let Some(rows) = field_tuning.rows {
            field.rows = rows;
        }
        if let Some(cell_size) = field_tuning.cell_size {
            field.cell_size = cell_size;
        }
        if let Some(spawn_columns) = field_tuning.spawn_columns {
            field.spawn_columns = spawn_columns;
        }
        if let Some(exit) = &field_tuning.exit {
            field.exit_zone =
                GridRect::new(GridPos::new(exit.column, exit.row), exit.width, exit.height);
        }
    }

    if let Some(rules_tuning) = &tuning.rules {
        if let Some(money) = rules_tuning.starting_money {
            rules.starting_money = money;
        }
        if let Some(lives) = rules_tuning.starting_lives {
            rules.starting_lives = lives;
        }
        if let Some(waves) = rules_tuning.total_waves {
            rules.total_waves = waves;
        }
        if let Some(cap) = rules_tuning.enemy_cap {
            rules.enemy_cap = cap;
        }
        if let Some(fraction) = rules_tuning.sell_fraction {
            rules.sell_fraction = fraction;
        }
    }

    if let Some(columns) = args.columns {
        field.columns = columns;
    }
    if let Some(rows) = args.rows {
        field.rows = rows;
    }
    if let Some(waves) = args.waves {
        rules.total_waves = waves;
    }
    if let Some(lives) = args.lives {
        rules.starting_lives = lives;
    }
    if let Some(money) = args.money {
        rules.starting_money = money;
    }

    let seed = args.seed.or(tuning.seed).unwrap_or(0xb01_d0ff);
    let speed = args.speed.or(tuning.speed).unwrap_or(1.0).max(0.01);
    (field, rules, seed, speed)
}

fn load_tuning(path: Option<&std::path::Path>) -> anyhow::Result<TuningFile> {
    let Some(path) = path else {
        return Ok(TuningFile::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading tuning file {}", path.display()))?;
    let tuning = toml::from_str(&text)
        .with_context(|| format!("parsing tuning file {}", path.display()))?;
    Ok(tuning)
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|error| anyhow::anyhow!("logger already installed: {error}"))
}

fn report(world: &World, stats: &Stats) {
    let outcome = match query::phase(world) {
        GamePhase::Victory => "victory",
        GamePhase::GameOver => "defeat",
        _ => "stopped",
    };

    println!("outcome: {outcome}");
    println!("waves completed: {}", stats.waves_completed);
    println!("lives remaining: {}", query::lives(world));
    println!("kills: {} / leaks: {}", stats.kills, stats.leaks);
    println!("shots fired: {}", stats.shots);
    println!("towers built: {}", stats.towers_built);
    println!(
        "balance: {} (earned {}, spent {})",
        query::economy(world).balance,
        query::economy(world).total_earned,
        query::economy(world).total_spent
    );
    println!(
        "simulated time: {:.1}s",
        query::clock(world).as_secs_f64()
    );

    if outcome == "stopped" {
        bail_note();
    }
}

fn bail_note() {
    warn!("campaign ended without a terminal phase; see logs for details");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_parse_with_defaults() {
        let args = Args::try_parse_from(["bulwark"]).expect("defaults parse");
        assert_eq!(args.frame_ms, 50);
        assert!(args.columns.is_none());
        assert!(!args.idle);
    }

    #[test]
    fn tuning_overlay_resolves_in_precedence_order() {
        let args = Args::try_parse_from(["bulwark", "--waves", "12", "--seed", "7"])
            .expect("flags parse");
        let tuning: TuningFile = toml::from_str(
            r#"
            seed = 99
            speed = 2.0

            [rules]
            total_waves = 40
            starting_money = 500
            "#,
        )
        .expect("tuning parses");

        let (field, rules, seed, speed) = resolve_settings(&args, &tuning);
        assert_eq!(field.columns, FieldConfig::standard().columns);
        assert_eq!(rules.total_waves, 12, "CLI flag beats the tuning file");
        assert_eq!(rules.starting_money, 500, "tuning file beats the default");
        assert_eq!(seed, 7, "CLI seed wins");
        assert!((speed - 2.0).abs() < f32::EPSILON, "tuning speed applies");
    }

    #[test]
    fn exit_tuning_maps_to_a_grid_rect() {
        let args = Args::try_parse_from(["bulwark"]).expect("defaults parse");
        let tuning: TuningFile = toml::from_str(
            r#"
            [field]
            columns = 14
            [field.exit]
            column = 12
            row = 4
            width = 2
            height = 3
            "#,
        )
        .expect("tuning parses");

        let (field, _, _, _) = resolve_settings(&args, &tuning);
        assert_eq!(field.columns, 14);
        assert_eq!(field.exit_zone, GridRect::new(GridPos::new(12, 4), 2, 3));
    }
}
