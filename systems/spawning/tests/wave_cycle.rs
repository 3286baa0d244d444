use std::time::Duration;

use bulwark_core::{Command, EnemyHit, Event, FieldConfig, GamePhase, GameRules, TowerId};
use bulwark_system_spawning::{Config, Spawning, StartOutcome};
use bulwark_world::{apply, query, World};

struct Rig {
    world: World,
    spawning: Spawning,
    carried: Vec<Event>,
}

impl Rig {
    /// One frame: tick the world, let the scheduler digest last frame's
    /// events plus the tick, and apply its commands. Events produced while
    /// applying are carried into the next frame so spawn acknowledgments
    /// and kills reach the scheduler.
    fn frame(&mut self, dt: Duration) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.carried);
        apply(&mut self.world, Command::Tick { dt }, &mut events);

        let mut commands = Vec::new();
        self.spawning.handle(&events, &mut commands);
        let mut produced = Vec::new();
        for command in commands {
            apply(&mut self.world, command, &mut produced);
        }

        self.carried = produced.clone();
        events.extend(produced);
        events
    }

    fn kill_everything(&mut self) {
        let doomed: Vec<_> = query::enemy_view(&self.world)
            .iter()
            .map(|snapshot| snapshot.id)
            .collect();
        if doomed.is_empty() {
            return;
        }

        let mut events = Vec::new();
        apply(
            &mut self.world,
            Command::DamageEnemies {
                source: TowerId::new(0),
                hits: doomed
                    .into_iter()
                    .map(|enemy| EnemyHit {
                        enemy,
                        amount: 1_000_000.0,
                        armor_penetration: 1_000.0,
                    })
                    .collect(),
            },
            &mut events,
        );
        self.carried.extend(events);
    }
}

#[test]
fn a_full_wave_cycle_returns_the_world_to_preparing() {
    let mut rig = Rig {
        world: World::new(FieldConfig::standard(), GameRules::default())
            .expect("valid config"),
        spawning: Spawning::new(Config {
            total_waves: 5,
            seed: 42,
        }),
        carried: Vec::new(),
    };

    let mut commands = Vec::new();
    assert_eq!(
        rig.spawning
            .start_next_wave(query::clock(&rig.world), &mut commands),
        StartOutcome::Started(bulwark_core::WaveId::new(1))
    );
    for command in commands {
        let mut events = Vec::new();
        apply(&mut rig.world, command, &mut events);
        rig.carried.extend(events);
    }
    assert_eq!(query::phase(&rig.world), GamePhase::Playing);

    let mut completed = false;
    for _ in 0..2_000 {
        let events = rig.frame(Duration::from_millis(100));
        rig.kill_everything();

        if events
            .iter()
            .any(|event| matches!(event, Event::WaveCompleted { .. }))
        {
            completed = true;
            break;
        }
    }

    assert!(completed, "the wave must complete once everything is dead");
    assert_eq!(query::phase(&rig.world), GamePhase::Preparing);
    assert!(!rig.spawning.is_active());
    assert!(
        query::economy(&rig.world).balance > GameRules::default().starting_money,
        "bounties and the completion bonus accrue"
    );
}
