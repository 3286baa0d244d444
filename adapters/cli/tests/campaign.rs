//! End-to-end campaign runs through the full system pipeline.

use std::time::Duration;

use bulwark_core::{
    Command, Event, FieldConfig, GamePhase, GameRules, GridPos, TargetAssignment, TowerKind,
};
use bulwark_system_combat::Combat;
use bulwark_system_spawning::{Config as SpawnConfig, Spawning, StartOutcome};
use bulwark_system_steering::Steering;
use bulwark_system_targeting::Targeting;
use bulwark_world::{apply, query, World};

struct Harness {
    world: World,
    spawning: Spawning,
    steering: Steering,
    targeting: Targeting,
    combat: Combat,
    carried: Vec<Event>,
    log: Vec<Event>,
}

impl Harness {
    fn new(rules: GameRules, seed: u64) -> Self {
        let world = World::new(FieldConfig::standard(), rules).expect("valid config");
        let spawning = Spawning::new(SpawnConfig {
            total_waves: rules.total_waves,
            seed,
        });
        Self {
            world,
            spawning,
            steering: Steering::new(),
            targeting: Targeting::new(),
            combat: Combat::new(),
            carried: Vec::new(),
            log: Vec::new(),
        }
    }

    fn place(&mut self, kind: TowerKind, cell: GridPos) {
        let mut events = Vec::new();
        apply(&mut self.world, Command::PlaceTower { kind, cell }, &mut events);
        assert!(
            events
                .iter()
                .any(|event| matches!(event, Event::TowerPlaced { .. })),
            "fixture placement at {cell:?} must succeed: {events:?}"
        );
        self.log.extend(events);
    }

    fn start_wave(&mut self) -> StartOutcome {
        let mut commands = Vec::new();
        let outcome = self
            .spawning
            .start_next_wave(query::clock(&self.world), &mut commands);
        let mut events = Vec::new();
        for command in commands {
            apply(&mut self.world, command, &mut events);
        }
        self.carried.extend(events.iter().cloned());
        self.log.extend(events);
        outcome
    }

    fn frame(&mut self, dt: Duration) {
        let mut events = std::mem::take(&mut self.carried);
        apply(&mut self.world, Command::Tick { dt }, &mut events);

        let config = *query::field_config(&self.world);
        let mut produced = Vec::new();

        let mut commands = Vec::new();
        self.spawning.handle(&events, &mut commands);
        for command in commands {
            apply(&mut self.world, command, &mut produced);
        }

        let mut commands = Vec::new();
        {
            let enemies = query::enemy_view(&self.world);
            let flow = query::flow_view(&self.world);
            let world = &self.world;
            self.steering.handle(
                &events,
                &enemies,
                &flow,
                &config,
                |cell| query::is_cell_blocked(world, cell),
                &mut commands,
            );
        }
        for command in commands {
            apply(&mut self.world, command, &mut produced);
        }

        let mut assignments: Vec<TargetAssignment> = Vec::new();
        let mut commands = Vec::new();
        {
            let towers = query::tower_view(&self.world);
            let enemies = query::enemy_view(&self.world);
            let flow = query::flow_view(&self.world);
            self.targeting.handle(
                query::phase(&self.world),
                &towers,
                &enemies,
                &flow,
                &config,
                &mut assignments,
                &mut commands,
            );
        }
        for command in commands {
            apply(&mut self.world, command, &mut produced);
        }

        let mut commands = Vec::new();
        {
            let towers = query::tower_view(&self.world);
            let enemies = query::enemy_view(&self.world);
            self.combat.handle(
                &events,
                &assignments,
                &towers,
                &enemies,
                &config,
                &mut commands,
            );
        }
        for command in commands {
            apply(&mut self.world, command, &mut produced);
        }

        self.log.extend(events);
        self.log.extend(produced.iter().cloned());
        self.carried = produced;
    }

    fn run_until<P>(&mut self, max_frames: u32, predicate: P) -> bool
    where
        P: Fn(&Harness) -> bool,
    {
        for _ in 0..max_frames {
            if predicate(self) {
                return true;
            }
            self.frame(Duration::from_millis(100));
        }
        predicate(self)
    }

    fn saw<P>(&self, predicate: P) -> bool
    where
        P: Fn(&Event) -> bool,
    {
        self.log.iter().any(predicate)
    }
}

#[test]
fn a_defended_wave_is_cleared_by_the_tower_line() {
    let rules = GameRules {
        starting_money: 2_000,
        total_waves: 3,
        ..GameRules::default()
    };
    let mut harness = Harness::new(rules, 0xdef_e45e);

    // A kill box in front of the exit: damage, slows, anti-air, and a buff.
    harness.place(TowerKind::Bolt, GridPos::new(6, 3));
    harness.place(TowerKind::Bolt, GridPos::new(6, 6));
    harness.place(TowerKind::Lance, GridPos::new(5, 4));
    harness.place(TowerKind::Frost, GridPos::new(5, 5));
    harness.place(TowerKind::Flak, GridPos::new(6, 4));
    harness.place(TowerKind::Beacon, GridPos::new(5, 3));
    harness.place(TowerKind::Mortar, GridPos::new(4, 4));

    assert_eq!(
        harness.start_wave(),
        StartOutcome::Started(bulwark_core::WaveId::new(1))
    );
    assert_eq!(query::phase(&harness.world), GamePhase::Playing);

    let completed = harness.run_until(3_000, |harness| {
        harness.saw(|event| matches!(event, Event::WaveCompleted { .. }))
    });

    assert!(completed, "wave 1 must resolve within the frame budget");
    assert!(harness.saw(|event| matches!(event, Event::TowerFired { .. })));
    assert!(
        harness.saw(|event| matches!(event, Event::EnemyDied { .. })),
        "the kill box must score at least one kill"
    );
    assert_eq!(query::phase(&harness.world), GamePhase::Preparing);
    assert!(
        query::economy(&harness.world).balance > 2_000 - 7 * 110,
        "bounties and the wave bonus offset the tower spend"
    );
}

#[test]
fn an_undefended_campaign_bleeds_lives_to_game_over() {
    let rules = GameRules {
        starting_lives: 3,
        total_waves: 10,
        ..GameRules::default()
    };
    let mut harness = Harness::new(rules, 1);

    assert_eq!(
        harness.start_wave(),
        StartOutcome::Started(bulwark_core::WaveId::new(1))
    );

    let over = harness.run_until(6_000, |harness| {
        query::phase(&harness.world) == GamePhase::GameOver
    });

    assert!(over, "three leaked enemies end an undefended game");
    assert!(harness.saw(|event| matches!(
        event,
        Event::EnemyExited {
            lives_remaining: 0,
            ..
        }
    )));
    assert_eq!(query::lives(&harness.world), 0);
}

#[test]
fn frost_towers_slow_the_advance() {
    let rules = GameRules {
        starting_money: 500,
        total_waves: 3,
        ..GameRules::default()
    };
    let mut harness = Harness::new(rules, 3);
    // The first spawns fill the northern spawn rows, so the pulse towers sit
    // directly on their eastward lanes.
    harness.place(TowerKind::Frost, GridPos::new(4, 1));
    harness.place(TowerKind::Frost, GridPos::new(4, 5));

    let _ = harness.start_wave();
    let slowed = harness.run_until(600, |harness| {
        query::enemy_view(&harness.world)
            .iter()
            .any(|snapshot| snapshot.slow_multiplier < 1.0)
    });

    assert!(slowed, "a pulse tower pair must slow at least one enemy");
}
