#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave scheduler: timed spawn emission and the completion state machine.
//!
//! The scheduler owns the flattened, time-sorted spawn queue for the active
//! wave and a live counter driven by spawn/death/exit events. A wave is
//! complete exactly when the queue is empty, every emitted spawn has been
//! acknowledged by the world, and the live counter is zero; the conjunction
//! is exact, never approximate.

use std::collections::VecDeque;
use std::time::Duration;

use bulwark_core::{Command, EnemyClass, Event, WaveId};
use bulwark_system_wave_generation::WavePlanner;
use log::info;

/// Spawns emitted per frame are capped to avoid a frame spike when many
/// queue entries share a timestamp; the remainder carries over.
const MAX_SPAWNS_PER_FRAME: usize = 8;

/// Configuration for the spawning scheduler.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of waves in the campaign.
    pub total_waves: u32,
    /// Campaign seed forwarded to the wave planner.
    pub seed: u64,
}

/// Outcome of a wave-start request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// The wave was started and its spawn queue built.
    Started(WaveId),
    /// A wave is already running; the request was a no-op.
    AlreadyActive,
    /// Every wave has already been dispatched.
    Exhausted,
}

#[derive(Clone, Copy, Debug)]
struct ScheduledSpawn {
    due: Duration,
    class: EnemyClass,
    level: u32,
    health_override: Option<f32>,
}

/// Deterministic wave scheduler.
#[derive(Debug)]
pub struct Spawning {
    planner: WavePlanner,
    total_waves: u32,
    wave: WaveId,
    active: bool,
    queue: VecDeque<ScheduledSpawn>,
    live: u32,
    unacknowledged: u32,
}

impl Spawning {
    /// Creates a new scheduler with no wave active.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            planner: WavePlanner::new(config.seed),
            total_waves: config.total_waves,
            wave: WaveId::new(0),
            active: false,
            queue: VecDeque::new(),
            live: 0,
            unacknowledged: 0,
        }
    }

    /// Most recently started wave.
    #[must_use]
    pub fn wave(&self) -> WaveId {
        self.wave
    }

    /// Reports whether a wave is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enemies spawned for the current wave that are still alive.
    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.live
    }

    /// Fast-forwards wave progress, e.g. after restoring a save; the next
    /// started wave follows `wave`. A no-op while a wave is active.
    pub fn resume_after(&mut self, wave: WaveId) {
        if !self.active {
            self.wave = wave;
        }
    }

    /// Starts the next wave: builds the flattened spawn queue and emits the
    /// world's `StartWave` command. A no-op while a wave is active; signals
    /// exhaustion once the campaign is spent.
    pub fn start_next_wave(&mut self, now: Duration, out: &mut Vec<Command>) -> StartOutcome {
        if self.active {
            return StartOutcome::AlreadyActive;
        }

        let next = self.wave.next();
        if next.get() > self.total_waves {
            return StartOutcome::Exhausted;
        }

        let plan = self.planner.plan(next);
        self.queue.clear();

        let mut group_start = Duration::ZERO;
        for group in &plan.groups {
            group_start = group_start.saturating_add(group.delay_after_previous);
            for unit in 0..group.count {
                let offset = Duration::from_nanos(
                    group.spawn_interval.as_nanos().saturating_mul(u128::from(unit)) as u64,
                );
                self.queue.push_back(ScheduledSpawn {
                    due: now.saturating_add(group_start).saturating_add(offset),
                    class: group.class,
                    level: group.level,
                    health_override: group.health_override,
                });
            }
        }

        let mut entries: Vec<ScheduledSpawn> = self.queue.drain(..).collect();
        entries.sort_by_key(|entry| entry.due);
        self.queue.extend(entries);

        self.wave = next;
        self.active = true;
        self.live = 0;
        self.unacknowledged = 0;
        info!(
            "wave {} started with {} scheduled spawns",
            next.get(),
            self.queue.len()
        );
        out.push(Command::StartWave { wave: next });
        StartOutcome::Started(next)
    }

    /// Consumes world events, emits due spawns, and detects completion.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        let mut now = None;
        for event in events {
            match event {
                Event::EnemySpawned { .. } => {
                    self.live = self.live.saturating_add(1);
                    self.unacknowledged = self.unacknowledged.saturating_sub(1);
                }
                Event::SpawnDropped { .. } => {
                    self.unacknowledged = self.unacknowledged.saturating_sub(1);
                }
                Event::EnemyDied { .. } | Event::EnemyExited { .. } => {
                    self.live = self.live.saturating_sub(1);
                }
                Event::TimeAdvanced { now: at, .. } => now = Some(*at),
                _ => {}
            }
        }

        if !self.active {
            return;
        }

        if let Some(now) = now {
            let mut emitted = 0;
            while emitted < MAX_SPAWNS_PER_FRAME {
                let Some(entry) = self.queue.front() else {
                    break;
                };
                if entry.due > now {
                    break;
                }

                let entry = self.queue.pop_front().expect("front exists");
                out.push(Command::SpawnEnemy {
                    class: entry.class,
                    level: entry.level,
                    health_override: entry.health_override,
                });
                self.unacknowledged += 1;
                emitted += 1;
            }
        }

        // Exact completion predicate: nothing queued, nothing in flight to
        // the world, nothing alive.
        if self.queue.is_empty() && self.unacknowledged == 0 && self.live == 0 {
            self.active = false;
            info!("wave {} complete", self.wave.get());
            out.push(Command::CompleteWave { wave: self.wave });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::{EnemyId, GridPos};

    fn scheduler(total_waves: u32) -> Spawning {
        Spawning::new(Config {
            total_waves,
            seed: 0x5eed,
        })
    }

    fn tick(now_ms: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(16),
            now: Duration::from_millis(now_ms),
        }
    }

    fn spawned(id: u32) -> Event {
        Event::EnemySpawned {
            enemy: EnemyId::new(id),
            class: EnemyClass::Infantry,
            level: 1,
            cell: GridPos::new(0, 0),
        }
    }

    fn died(id: u32) -> Event {
        Event::EnemyDied {
            enemy: EnemyId::new(id),
            class: EnemyClass::Infantry,
            bounty: 5,
        }
    }

    /// Drives the scheduler until the queue drains, acknowledging each
    /// emitted spawn, and returns how many enemies were spawned.
    fn drain_all_spawns(spawning: &mut Spawning) -> u32 {
        let mut next_id = 0;
        let mut clock_ms = 0;
        for _ in 0..10_000 {
            clock_ms += 100;
            let mut acks: Vec<Event> = Vec::new();
            let mut commands = Vec::new();
            spawning.handle(&[tick(clock_ms)], &mut commands);
            for command in &commands {
                if matches!(command, Command::SpawnEnemy { .. }) {
                    acks.push(spawned(next_id));
                    next_id += 1;
                }
            }
            if acks.is_empty() && spawning.queue.is_empty() {
                break;
            }
            let mut ignored = Vec::new();
            spawning.handle(&acks, &mut ignored);
        }
        next_id
    }

    #[test]
    fn starting_is_a_no_op_while_active() {
        let mut spawning = scheduler(10);
        let mut out = Vec::new();

        assert_eq!(
            spawning.start_next_wave(Duration::ZERO, &mut out),
            StartOutcome::Started(WaveId::new(1))
        );
        assert_eq!(out.len(), 1);

        assert_eq!(
            spawning.start_next_wave(Duration::ZERO, &mut out),
            StartOutcome::AlreadyActive
        );
        assert_eq!(out.len(), 1, "no duplicate start command");
    }

    #[test]
    fn campaign_exhaustion_is_signaled() {
        let mut spawning = scheduler(1);
        let mut out = Vec::new();
        assert_eq!(
            spawning.start_next_wave(Duration::ZERO, &mut out),
            StartOutcome::Started(WaveId::new(1))
        );

        // Complete the wave without any spawns reaching the field.
        let total = drain_all_spawns(&mut spawning);
        assert!(total > 0);
        let mut commands = Vec::new();
        let kills: Vec<Event> = (0..total).map(died).collect();
        spawning.handle(&kills, &mut commands);
        let mut commands = Vec::new();
        spawning.handle(&[tick(1_000_000)], &mut commands);
        assert!(!spawning.is_active());

        assert_eq!(
            spawning.start_next_wave(Duration::from_secs(2_000), &mut out),
            StartOutcome::Exhausted
        );
    }

    #[test]
    fn spawns_per_frame_are_capped_with_carry_over() {
        let mut spawning = scheduler(30);
        // Deep waves carry far more spawns than the per-frame cap.
        spawning.wave = WaveId::new(14);
        let mut out = Vec::new();
        let _ = spawning.start_next_wave(Duration::ZERO, &mut out);
        let queued = spawning.queue.len();
        assert!(queued > MAX_SPAWNS_PER_FRAME, "need a wave bigger than the cap");

        // Jump far past every due time: only the cap may fire this frame.
        let mut commands = Vec::new();
        spawning.handle(&[tick(10_000_000)], &mut commands);
        let first_batch = commands
            .iter()
            .filter(|command| matches!(command, Command::SpawnEnemy { .. }))
            .count();
        assert_eq!(first_batch, MAX_SPAWNS_PER_FRAME);

        // The remainder carries over to the next frame.
        let mut commands = Vec::new();
        spawning.handle(&[tick(10_000_100)], &mut commands);
        let second_batch = commands
            .iter()
            .filter(|command| matches!(command, Command::SpawnEnemy { .. }))
            .count();
        assert_eq!(second_batch, (queued - MAX_SPAWNS_PER_FRAME).min(MAX_SPAWNS_PER_FRAME));
    }

    #[test]
    fn unspawned_enemies_block_completion() {
        // Wave 30 of this seed is deep enough to have many spawns.
        let mut spawning = scheduler(30);
        let mut out = Vec::new();
        let _ = spawning.start_next_wave(Duration::ZERO, &mut out);

        // Spawn one enemy, leave the rest of the queue unspawned.
        let mut commands = Vec::new();
        spawning.handle(&[tick(1)], &mut commands);
        let emitted = commands
            .iter()
            .filter(|command| matches!(command, Command::SpawnEnemy { .. }))
            .count();
        assert!(emitted >= 1);
        assert!(!spawning.queue.is_empty(), "later spawns remain scheduled");

        // Acknowledge and immediately kill everything spawned so far: the
        // wave must NOT complete while the queue holds unspawned enemies.
        let acks: Vec<Event> = (0..emitted as u32).map(spawned).collect();
        let mut ignored = Vec::new();
        spawning.handle(&acks, &mut ignored);
        let kills: Vec<Event> = (0..emitted as u32).map(died).collect();
        let mut commands = Vec::new();
        spawning.handle(&kills, &mut commands);

        assert!(spawning.is_active());
        assert!(
            !commands.iter().any(|command| matches!(command, Command::CompleteWave { .. })),
            "an unspawned enemy must block completion"
        );
    }

    #[test]
    fn completion_requires_the_exact_conjunction() {
        let mut spawning = scheduler(10);
        let mut out = Vec::new();
        let _ = spawning.start_next_wave(Duration::ZERO, &mut out);
        let total = drain_all_spawns(&mut spawning);
        assert!(total >= 2);

        // All spawned and alive: not complete.
        assert!(spawning.is_active());
        assert_eq!(spawning.live_count(), total);

        // Kill all but one: still not complete.
        let kills: Vec<Event> = (0..total - 1).map(died).collect();
        let mut commands = Vec::new();
        spawning.handle(&kills, &mut commands);
        assert!(spawning.is_active());
        assert!(!commands.iter().any(|command| matches!(command, Command::CompleteWave { .. })));

        // The last death completes the wave exactly once.
        let mut commands = Vec::new();
        spawning.handle(&[died(total - 1)], &mut commands);
        assert!(!spawning.is_active());
        assert_eq!(
            commands
                .iter()
                .filter(|command| matches!(command, Command::CompleteWave { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn dropped_spawns_do_not_wedge_the_wave() {
        let mut spawning = scheduler(10);
        let mut out = Vec::new();
        let _ = spawning.start_next_wave(Duration::ZERO, &mut out);

        // Emit everything, but the world drops every spawn at its cap.
        let mut dropped = 0;
        let mut clock_ms = 0;
        while spawning.queue.front().is_some() {
            clock_ms += 1_000;
            let mut commands = Vec::new();
            spawning.handle(&[tick(clock_ms)], &mut commands);
            let drops: Vec<Event> = commands
                .iter()
                .filter(|command| matches!(command, Command::SpawnEnemy { .. }))
                .map(|_| {
                    dropped += 1;
                    Event::SpawnDropped {
                        class: EnemyClass::Infantry,
                        level: 1,
                    }
                })
                .collect();
            let mut ignored = Vec::new();
            spawning.handle(&drops, &mut ignored);
        }
        assert!(dropped > 0);

        if spawning.is_active() {
            let mut commands = Vec::new();
            spawning.handle(&[tick(clock_ms + 1_000)], &mut commands);
        }
        assert!(!spawning.is_active(), "a fully dropped wave still completes");
    }

    #[test]
    fn exited_enemies_count_as_resolved() {
        let mut spawning = scheduler(10);
        let mut out = Vec::new();
        let _ = spawning.start_next_wave(Duration::ZERO, &mut out);
        let total = drain_all_spawns(&mut spawning);

        let exits: Vec<Event> = (0..total)
            .map(|id| Event::EnemyExited {
                enemy: EnemyId::new(id),
                lives_remaining: 10,
            })
            .collect();
        let mut commands = Vec::new();
        spawning.handle(&exits, &mut commands);
        assert!(!spawning.is_active(), "exits resolve the wave like kills");
    }
}
