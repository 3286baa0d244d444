#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic per-frame enemy steering.
//!
//! The system consumes snapshot views and an occupancy closure, plans one
//! motion step per live agent, and emits [`Command::AdvanceEnemy`] batches.
//! All transient per-agent state (committed heading, stuck accounting,
//! recovery waypoints) lives here, keyed by id and pruned against the live
//! roster every frame; the world remains the sole owner of positions.

use std::collections::BTreeMap;
use std::time::Duration;

use bulwark_core::{
    Command, EnemyId, EnemySnapshot, EnemyView, Event, FieldConfig, FlowFieldView, GridPos,
};
use glam::Vec2;
use log::debug;

/// Radius of the local separation impulse, in cells.
const SEPARATION_RADIUS_CELLS: f32 = 0.8;
/// At most this many neighbors feed the separation impulse per agent;
/// approximate separation is acceptable, a frame spike is not.
const MAX_SEPARATION_NEIGHBORS: usize = 6;
/// Weight of the separation impulse in the steering blend.
const SEPARATION_WEIGHT: f32 = 0.6;
/// Weight of the corridor-centering impulse in the steering blend.
const CENTERING_WEIGHT: f32 = 0.8;
/// Weight of the push away from a directly adjacent blocked cell.
const WALL_PUSH_WEIGHT: f32 = 1.4;
/// How many cells the corridor estimator scans in each cardinal direction.
const CORRIDOR_SCAN_CELLS: u32 = 3;
/// Fraction of the corridor half-width treated as the no-correction band.
const CORRIDOR_DEADZONE: f32 = 0.25;
/// New-heading share of the per-frame low-pass filter (70/30 blend).
const HEADING_SMOOTHING: f32 = 0.7;
/// Displacement below this fraction of the expected step counts as a stall.
const STUCK_SPEED_FRACTION: f32 = 0.15;
/// Sustained stall time that triggers recovery mode.
const STUCK_THRESHOLD: Duration = Duration::from_secs(3);
/// Number of cell-to-cell hops a recovery excursion may take.
const RECOVERY_CELLS: u8 = 4;
/// Waypoint arrival tolerance as a fraction of the cell size.
const WAYPOINT_TOLERANCE: f32 = 0.2;
/// Angular frequency of the flying-unit wobble, in radians per second.
const WOBBLE_FREQUENCY: f32 = 1.7;
/// Amplitude of the flying-unit wobble relative to the forward direction.
const WOBBLE_AMPLITUDE: f32 = 0.35;
/// Support-aura stacking cap: more nearby supports grant no further bonus.
const MAX_AURA_STACKS: u32 = 2;

/// Pure system that plans enemy motion and emits advance commands.
#[derive(Debug, Default)]
pub struct Steering {
    agents: BTreeMap<EnemyId, AgentState>,
}

#[derive(Clone, Copy, Debug)]
struct AgentState {
    heading: Vec2,
    last_position: Vec2,
    stuck_for: Duration,
    recovery: Option<Recovery>,
}

#[derive(Clone, Copy, Debug)]
struct Recovery {
    waypoint: Vec2,
    cells_remaining: u8,
}

impl Steering {
    /// Creates a new steering system with no tracked agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans one motion step per live agent and emits advance commands.
    ///
    /// The `is_blocked` closure reflects current tower occupancy; airborne
    /// agents never consult it or the flow field.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        enemies: &EnemyView,
        flow: &FlowFieldView<'_>,
        config: &FieldConfig,
        is_blocked: F,
        out: &mut Vec<Command>,
    ) where
        F: Fn(GridPos) -> bool,
    {
        let mut dt = Duration::ZERO;
        let mut now = None;
        for event in events {
            if let Event::TimeAdvanced { dt: delta, now: at } = event {
                dt = dt.saturating_add(*delta);
                now = Some(*at);
            }
        }

        let Some(now) = now else {
            return;
        };
        let dt_secs = dt.as_secs_f32();
        if dt_secs <= 0.0 {
            return;
        }

        self.prune_departed(enemies);

        let cell_size = config.cell_size;
        let exit_anchor = config.exit_anchor();

        for snapshot in enemies.iter() {
            let default_heading = default_heading(snapshot.position, exit_anchor);
            let state = self
                .agents
                .entry(snapshot.id)
                .or_insert_with(|| AgentState {
                    heading: snapshot.heading,
                    last_position: snapshot.position,
                    stuck_for: Duration::ZERO,
                    recovery: None,
                });

            // Stall accounting measures what the world actually committed,
            // so rejected moves count toward recovery.
            let committed = (snapshot.position - state.last_position).length();
            let expected = snapshot.effective_speed() * dt_secs;
            if expected > 0.0 && committed < expected * STUCK_SPEED_FRACTION {
                state.stuck_for = state.stuck_for.saturating_add(dt);
            } else {
                state.stuck_for = Duration::ZERO;
            }
            state.last_position = snapshot.position;

            if snapshot.class.is_airborne() {
                let heading = flying_heading(snapshot, exit_anchor, now, state.heading);
                let speed = snapshot.effective_speed();
                let to = snapshot.position + heading * speed * dt_secs;
                state.heading = heading;
                state.stuck_for = Duration::ZERO;
                out.push(Command::AdvanceEnemy {
                    enemy: snapshot.id,
                    to,
                    heading,
                });
                continue;
            }

            if state.stuck_for >= STUCK_THRESHOLD && state.recovery.is_none() {
                let waypoint = match config.cell_at_world(snapshot.position) {
                    Some(cell) => config.cell_center(cell),
                    None => snapshot.position,
                };
                debug!(
                    "agent {} stalled for {:?}; entering recovery",
                    snapshot.id.get(),
                    state.stuck_for
                );
                state.recovery = Some(Recovery {
                    waypoint,
                    cells_remaining: RECOVERY_CELLS,
                });
                state.stuck_for = Duration::ZERO;
            }

            if let Some(recovery) = state.recovery {
                let (to, heading, next) = plan_recovery_step(
                    snapshot,
                    recovery,
                    flow,
                    config,
                    dt_secs,
                    default_heading,
                );
                state.recovery = next;
                state.heading = heading;
                out.push(Command::AdvanceEnemy {
                    enemy: snapshot.id,
                    to,
                    heading,
                });
                continue;
            }

            let desired = flow
                .interpolated_direction(snapshot.position)
                .unwrap_or(default_heading);
            let separation = separation_impulse(snapshot, enemies, cell_size);
            let centering = centering_impulse(snapshot.position, config, &is_blocked);

            let blended = desired + separation * SEPARATION_WEIGHT + centering;
            let blended = normalize_or(blended, default_heading);
            let heading = normalize_or(
                state.heading * (1.0 - HEADING_SMOOTHING) + blended * HEADING_SMOOTHING,
                default_heading,
            );

            let aura = support_aura_multiplier(snapshot, enemies, cell_size);
            let speed = snapshot.effective_speed() * aura;
            let step = heading * speed * dt_secs;
            let to = correct_collision(
                snapshot.position,
                step,
                exit_anchor,
                config,
                &is_blocked,
                default_heading,
            );

            state.heading = heading;
            out.push(Command::AdvanceEnemy {
                enemy: snapshot.id,
                to,
                heading,
            });
        }
    }

    fn prune_departed(&mut self, enemies: &EnemyView) {
        self.agents
            .retain(|id, _| enemies.get(*id).is_some());
    }
}

/// Direct-line flight with a small time-varying perpendicular wobble.
///
/// The direction to the exit anchor is recomputed continuously, never
/// cached; flying agents ignore towers entirely, which is why the archetype
/// table balances them with materially lower health and bounty.
fn flying_heading(
    snapshot: &EnemySnapshot,
    exit_anchor: Vec2,
    now: Duration,
    previous: Vec2,
) -> Vec2 {
    let forward = normalize_or(exit_anchor - snapshot.position, previous);
    let perpendicular = Vec2::new(-forward.y, forward.x);
    let phase = now.as_secs_f32() * WOBBLE_FREQUENCY + snapshot.id.get() as f32 * 0.7;
    normalize_or(
        forward + perpendicular * phase.sin() * WOBBLE_AMPLITUDE,
        forward,
    )
}

/// Cell-center to cell-center recovery walk.
///
/// Local avoidance is abandoned; the agent follows the flow field at whole
/// cell granularity for a bounded number of hops. The excursion always
/// terminates: running out of hops, arriving somewhere the flow offers no
/// direction, or leaving the field all abort back to normal following.
fn plan_recovery_step(
    snapshot: &EnemySnapshot,
    recovery: Recovery,
    flow: &FlowFieldView<'_>,
    config: &FieldConfig,
    dt_secs: f32,
    default_heading: Vec2,
) -> (Vec2, Vec2, Option<Recovery>) {
    let tolerance = config.cell_size * WAYPOINT_TOLERANCE;
    let to_waypoint = recovery.waypoint - snapshot.position;

    if to_waypoint.length() > tolerance {
        let heading = normalize_or(to_waypoint, default_heading);
        let step_length = (snapshot.effective_speed() * dt_secs).min(to_waypoint.length());
        let to = snapshot.position + heading * step_length;
        return (to, heading, Some(recovery));
    }

    if recovery.cells_remaining == 0 {
        return (snapshot.position, default_heading, None);
    }

    let Some(cell) = config.cell_at_world(recovery.waypoint) else {
        return (snapshot.position, default_heading, None);
    };

    let Some(direction) = flow.direction(cell) else {
        // Fallback safety valve, not a navigation mode: abort rather than
        // loop forever on a field with no answer.
        return (snapshot.position, default_heading, None);
    };

    let next_cell = GridPos::new(
        (cell.column() as i64 + direction.x.round() as i64).max(0) as u32,
        (cell.row() as i64 + direction.y.round() as i64).max(0) as u32,
    );
    if !config.contains_cell(next_cell) {
        return (snapshot.position, default_heading, None);
    }

    let next = Recovery {
        waypoint: config.cell_center(next_cell),
        cells_remaining: recovery.cells_remaining - 1,
    };
    let heading = normalize_or(next.waypoint - snapshot.position, default_heading);
    let step_length = snapshot.effective_speed() * dt_secs;
    let to = snapshot.position + heading * step_length;
    (to, heading, Some(next))
}

/// Short-range separation from nearby agents, capped to a constant number
/// of neighbors per frame.
fn separation_impulse(snapshot: &EnemySnapshot, enemies: &EnemyView, cell_size: f32) -> Vec2 {
    let radius = SEPARATION_RADIUS_CELLS * cell_size;
    let mut impulse = Vec2::ZERO;
    let mut examined = 0;

    for other in enemies.iter() {
        if other.id == snapshot.id {
            continue;
        }

        let away = snapshot.position - other.position;
        let distance = away.length();
        if distance >= radius {
            continue;
        }

        let strength = 1.0 - distance / radius;
        impulse += if distance > f32::EPSILON {
            (away / distance) * strength
        } else {
            // Coincident agents separate along a deterministic axis.
            Vec2::X * strength
        };

        examined += 1;
        if examined >= MAX_SEPARATION_NEIGHBORS {
            break;
        }
    }

    impulse
}

/// Speed multiplier from nearby support-class allies, recomputed every
/// frame and never accumulated.
fn support_aura_multiplier(
    snapshot: &EnemySnapshot,
    enemies: &EnemyView,
    cell_size: f32,
) -> f32 {
    if snapshot.class.is_airborne() {
        return 1.0;
    }

    let mut stacks = 0;
    for other in enemies.iter() {
        if other.id == snapshot.id || other.class.aura_bonus() <= 0.0 {
            continue;
        }

        let radius = other.class.aura_radius_cells() * cell_size;
        if (snapshot.position - other.position).length() < radius {
            stacks += 1;
            if stacks >= MAX_AURA_STACKS {
                break;
            }
        }
    }

    1.0 + bulwark_core::EnemyClass::Support.aura_bonus() * stacks as f32
}

/// Corridor-centering impulse plus a strong push off adjacent walls.
///
/// Scans a few cells in each cardinal direction to estimate the local
/// corridor, then steers toward the midline once the agent drifts past the
/// inner deadzone of the corridor half-width.
fn centering_impulse<F>(position: Vec2, config: &FieldConfig, is_blocked: &F) -> Vec2
where
    F: Fn(GridPos) -> bool,
{
    let Some(cell) = config.cell_at_world(position) else {
        return Vec2::ZERO;
    };
    let cell_size = config.cell_size;

    let open = |column: i64, row: i64| -> bool {
        if column < 0 || row < 0 {
            return false;
        }
        let candidate = GridPos::new(column as u32, row as u32);
        config.contains_cell(candidate) && !is_blocked(candidate)
    };

    let scan = |dx: i64, dy: i64| -> u32 {
        let mut distance = 0;
        for step in 1..=CORRIDOR_SCAN_CELLS as i64 {
            if open(
                cell.column() as i64 + dx * step,
                cell.row() as i64 + dy * step,
            ) {
                distance += 1;
            } else {
                break;
            }
        }
        distance
    };

    let west = scan(-1, 0);
    let east = scan(1, 0);
    let north = scan(0, -1);
    let south = scan(0, 1);

    let mut impulse = Vec2::ZERO;

    impulse.x += axis_correction(
        position.x,
        cell.column() as f32,
        west,
        east,
        cell_size,
    );
    impulse.y += axis_correction(position.y, cell.row() as f32, north, south, cell_size);

    // Immediate push off any directly adjacent blocked cell.
    if west == 0 {
        let edge = cell.column() as f32 * cell_size;
        let closeness = 1.0 - ((position.x - edge) / cell_size).clamp(0.0, 1.0);
        impulse.x += WALL_PUSH_WEIGHT * closeness;
    }
    if east == 0 {
        let edge = (cell.column() + 1) as f32 * cell_size;
        let closeness = 1.0 - ((edge - position.x) / cell_size).clamp(0.0, 1.0);
        impulse.x -= WALL_PUSH_WEIGHT * closeness;
    }
    if north == 0 {
        let edge = cell.row() as f32 * cell_size;
        let closeness = 1.0 - ((position.y - edge) / cell_size).clamp(0.0, 1.0);
        impulse.y += WALL_PUSH_WEIGHT * closeness;
    }
    if south == 0 {
        let edge = (cell.row() + 1) as f32 * cell_size;
        let closeness = 1.0 - ((edge - position.y) / cell_size).clamp(0.0, 1.0);
        impulse.y -= WALL_PUSH_WEIGHT * closeness;
    }

    impulse * CENTERING_WEIGHT
}

/// Midline correction along one axis of the estimated corridor.
fn axis_correction(
    position: f32,
    cell_index: f32,
    open_negative: u32,
    open_positive: u32,
    cell_size: f32,
) -> f32 {
    let corridor_min = (cell_index - open_negative as f32) * cell_size;
    let corridor_max = (cell_index + 1.0 + open_positive as f32) * cell_size;
    let midline = (corridor_min + corridor_max) / 2.0;
    let half_width = (corridor_max - corridor_min) / 2.0;
    if half_width <= f32::EPSILON {
        return 0.0;
    }

    let offset = position - midline;
    let drift = offset.abs() / half_width;
    if drift <= CORRIDOR_DEADZONE {
        return 0.0;
    }

    -offset.signum() * (drift - CORRIDOR_DEADZONE)
}

/// Validates the proposed step against occupancy, trying sidesteps before
/// sliding along the obstacle surface.
fn correct_collision<F>(
    position: Vec2,
    step: Vec2,
    exit_anchor: Vec2,
    config: &FieldConfig,
    is_blocked: &F,
    default_heading: Vec2,
) -> Vec2
where
    F: Fn(GridPos) -> bool,
{
    let walkable = |point: Vec2| -> bool {
        match config.cell_at_world(point) {
            Some(cell) => !is_blocked(cell),
            None => false,
        }
    };

    let candidate = position + step;
    if walkable(candidate) {
        return candidate;
    }

    // Sidesteps biased toward the exit side of the obstacle.
    let toward_exit = exit_anchor - position;
    let side = if step.perp_dot(toward_exit) >= 0.0 { 1.0 } else { -1.0 };
    let angles = [
        side * std::f32::consts::FRAC_PI_4,
        -side * std::f32::consts::FRAC_PI_4,
        side * std::f32::consts::FRAC_PI_2,
        -side * std::f32::consts::FRAC_PI_2,
    ];

    for angle in angles {
        let alternative = position + rotate(step, angle);
        if walkable(alternative) {
            return alternative;
        }
    }

    // Slide along the obstacle: push out from the blocked cell's center.
    if let Some(blocked_cell) = config.cell_at_world(candidate) {
        let away = normalize_or(position - config.cell_center(blocked_cell), default_heading);
        let slide = position + away * step.length() * 0.5;
        if walkable(slide) {
            return slide;
        }
    }

    position
}

fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Normalizes a vector, self-healing degenerate input to the fallback.
///
/// A zero-length or non-finite vector yields the fallback instead of NaN.
fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    if v.is_finite() && v.length_squared() > f32::EPSILON {
        v.normalize()
    } else {
        fallback
    }
}

fn default_heading(position: Vec2, exit_anchor: Vec2) -> Vec2 {
    let toward_exit = exit_anchor - position;
    if toward_exit.length_squared() > f32::EPSILON {
        toward_exit.normalize()
    } else {
        Vec2::X
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::EnemyClass;

    fn snapshot_at(id: u32, class: EnemyClass, position: Vec2) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            class,
            level: 1,
            position,
            heading: Vec2::X,
            health: 100.0,
            max_health: 100.0,
            base_speed: 48.0,
            slow_multiplier: 1.0,
            slow_expires_at: None,
            armor: 0.0,
            bounty: 5,
        }
    }

    #[test]
    fn normalize_or_self_heals_degenerate_vectors() {
        let fallback = Vec2::new(0.0, 1.0);
        assert_eq!(normalize_or(Vec2::ZERO, fallback), fallback);
        assert_eq!(normalize_or(Vec2::new(f32::NAN, 0.0), fallback), fallback);
        let normalized = normalize_or(Vec2::new(3.0, 4.0), fallback);
        assert!((normalized.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rotate_quarter_turn_is_perpendicular() {
        let rotated = rotate(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!(rotated.x.abs() < 1e-5);
        assert!((rotated.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn separation_caps_examined_neighbors() {
        let center = snapshot_at(0, EnemyClass::Infantry, Vec2::new(100.0, 100.0));
        let mut snapshots = vec![center];
        for index in 1..20 {
            snapshots.push(snapshot_at(
                index,
                EnemyClass::Infantry,
                Vec2::new(100.0 + index as f32 * 0.5, 100.0),
            ));
        }
        let view = EnemyView::from_snapshots(snapshots);

        let impulse = separation_impulse(&center, &view, 32.0);
        // All crowding neighbors sit east of the agent, so the impulse must
        // push west regardless of how many were examined.
        assert!(impulse.x < 0.0);
        assert!(impulse.y.abs() < 1e-4);
    }

    #[test]
    fn coincident_agents_still_separate() {
        let a = snapshot_at(0, EnemyClass::Infantry, Vec2::new(50.0, 50.0));
        let b = snapshot_at(1, EnemyClass::Infantry, Vec2::new(50.0, 50.0));
        let view = EnemyView::from_snapshots(vec![a, b]);

        let impulse = separation_impulse(&a, &view, 32.0);
        assert!(impulse.length() > 0.0, "coincident agents must not normalize NaN");
    }

    #[test]
    fn support_aura_is_bounded() {
        let subject = snapshot_at(0, EnemyClass::Infantry, Vec2::new(100.0, 100.0));
        let mut snapshots = vec![subject];
        for index in 1..6 {
            snapshots.push(snapshot_at(
                index,
                EnemyClass::Support,
                Vec2::new(100.0 + index as f32, 100.0),
            ));
        }
        let view = EnemyView::from_snapshots(snapshots);

        let multiplier = support_aura_multiplier(&subject, &view, 32.0);
        let cap = 1.0 + EnemyClass::Support.aura_bonus() * MAX_AURA_STACKS as f32;
        assert!((multiplier - cap).abs() < 1e-5, "aura stacks are capped");
    }

    #[test]
    fn axis_correction_respects_the_deadzone() {
        // Cell 5, one open cell each side: corridor spans cells 4..=6.
        let centered = axis_correction(5.5 * 32.0, 5.0, 1, 1, 32.0);
        assert_eq!(centered, 0.0, "midline position needs no correction");

        let drifted = axis_correction(6.8 * 32.0, 5.0, 1, 1, 32.0);
        assert!(drifted < 0.0, "drift past the deadzone pulls back to midline");
    }
}
