//! Authoritative tower state and the upgrade math.

use std::collections::BTreeMap;
use std::time::Duration;

use bulwark_core::{GridPos, TargetPriority, TowerId, TowerKind, TowerSnapshot, UpgradeError};

/// A single placed tower.
///
/// Combat stats are always recomputed from the archetype's base values and
/// the current level, never compounded against the previous level, so level
/// math is reproducible from the level alone.
#[derive(Clone, Debug)]
pub(crate) struct Tower {
    pub(crate) id: TowerId,
    pub(crate) kind: TowerKind,
    pub(crate) cell: GridPos,
    pub(crate) level: u32,
    pub(crate) priority: TargetPriority,
    pub(crate) damage: f32,
    pub(crate) range_cells: f32,
    pub(crate) fire_rate: f32,
    pub(crate) buff_multiplier: f32,
    pub(crate) invested: u32,
    pub(crate) last_fired_at: Option<Duration>,
}

impl Tower {
    pub(crate) fn new(id: TowerId, kind: TowerKind, cell: GridPos) -> Self {
        Self {
            id,
            kind,
            cell,
            level: 0,
            priority: TargetPriority::default(),
            damage: kind.damage_at(0),
            range_cells: kind.range_cells_at(0),
            fire_rate: kind.fire_rate_at(0),
            buff_multiplier: 1.0,
            invested: kind.base_cost(),
            last_fired_at: None,
        }
    }

    /// Rebuilds a tower from a save tuple, recomputing stats from the level.
    pub(crate) fn from_save(
        id: TowerId,
        kind: TowerKind,
        cell: GridPos,
        level: u32,
        invested: u32,
        priority: TargetPriority,
    ) -> Self {
        let level = level.min(kind.max_level());
        Self {
            id,
            kind,
            cell,
            level,
            priority,
            damage: kind.damage_at(level),
            range_cells: kind.range_cells_at(level),
            fire_rate: kind.fire_rate_at(level),
            buff_multiplier: 1.0,
            invested,
            last_fired_at: None,
        }
    }

    /// Cost of the next upgrade, or the reason none is available.
    pub(crate) fn next_upgrade_cost(&self) -> Result<u32, UpgradeError> {
        if self.level >= self.kind.max_level() {
            return Err(UpgradeError::MaxLevel);
        }
        Ok(self.kind.upgrade_cost(self.level))
    }

    /// Commits a paid upgrade: bumps the level and recomputes every combat
    /// stat from base. The caller has already debited `cost`.
    pub(crate) fn apply_upgrade(&mut self, cost: u32) -> u32 {
        self.level += 1;
        self.damage = self.kind.damage_at(self.level);
        self.range_cells = self.kind.range_cells_at(self.level);
        self.fire_rate = self.kind.fire_rate_at(self.level);
        self.invested = self.invested.saturating_add(cost);
        self.level
    }

    pub(crate) fn snapshot(&self) -> TowerSnapshot {
        TowerSnapshot {
            id: self.id,
            kind: self.kind,
            cell: self.cell,
            level: self.level,
            priority: self.priority,
            damage: self.damage,
            range_cells: self.range_cells,
            fire_rate: self.fire_rate,
            buff_multiplier: self.buff_multiplier,
            invested: self.invested,
            last_fired_at: self.last_fired_at,
        }
    }
}

/// Registry that stores towers and allocates identifiers.
#[derive(Clone, Debug)]
pub(crate) struct TowerRegistry {
    entries: BTreeMap<TowerId, Tower>,
    next_id: u32,
}

impl TowerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn insert(&mut self, kind: TowerKind, cell: GridPos) -> TowerId {
        let id = TowerId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let _ = self.entries.insert(id, Tower::new(id, kind, cell));
        id
    }

    pub(crate) fn insert_restored(&mut self, tower: Tower) {
        self.next_id = self.next_id.max(tower.id.get().wrapping_add(1));
        let _ = self.entries.insert(tower.id, tower);
    }

    pub(crate) fn remove(&mut self, id: TowerId) -> Option<Tower> {
        self.entries.remove(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TowerId) -> Option<&mut Tower> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Tower> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tower> {
        self.entries.values_mut()
    }

    pub(crate) fn at_cell(&self, cell: GridPos) -> Option<TowerId> {
        self.entries
            .values()
            .find(|tower| tower.cell == cell)
            .map(|tower| tower.id)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_recomputes_stats_from_base() {
        let mut tower = Tower::new(TowerId::new(1), TowerKind::Bolt, GridPos::new(4, 4));
        let cost_one = tower.next_upgrade_cost().expect("level 0 upgrades");
        assert_eq!(tower.apply_upgrade(cost_one), 1);
        let cost_two = tower.next_upgrade_cost().expect("level 1 upgrades");
        assert_eq!(tower.apply_upgrade(cost_two), 2);

        // 10 * (1 + 2 * 0.35) = 17 exactly, independent of the level-1 state.
        assert!((tower.damage - 17.0).abs() < 1e-5);
        assert!((tower.fire_rate - TowerKind::Bolt.base_fire_rate() * 1.5).abs() < 1e-5);
        assert_eq!(
            tower.invested,
            TowerKind::Bolt.base_cost() + cost_one + cost_two
        );
    }

    #[test]
    fn upgrades_stop_at_max_level() {
        let mut tower = Tower::new(TowerId::new(1), TowerKind::Frost, GridPos::new(2, 2));
        for _ in 0..TowerKind::Frost.max_level() {
            let cost = tower.next_upgrade_cost().expect("below max");
            let _ = tower.apply_upgrade(cost);
        }
        assert_eq!(tower.next_upgrade_cost(), Err(UpgradeError::MaxLevel));
    }

    #[test]
    fn registry_allocates_monotonic_identifiers() {
        let mut registry = TowerRegistry::new();
        let first = registry.insert(TowerKind::Bolt, GridPos::new(2, 2));
        let second = registry.insert(TowerKind::Flak, GridPos::new(3, 2));
        assert!(first < second);
        assert_eq!(registry.at_cell(GridPos::new(3, 2)), Some(second));

        let _ = registry.remove(first);
        let third = registry.insert(TowerKind::Bolt, GridPos::new(4, 2));
        assert!(third > second, "identifiers are never reused");
    }

    #[test]
    fn restored_towers_reserve_their_identifier_range() {
        let mut registry = TowerRegistry::new();
        registry.insert_restored(Tower::from_save(
            TowerId::new(7),
            TowerKind::Mortar,
            GridPos::new(5, 5),
            2,
            171,
            TargetPriority::Strongest,
        ));
        let next = registry.insert(TowerKind::Bolt, GridPos::new(6, 5));
        assert!(next > TowerId::new(7));

        let restored = registry
            .iter()
            .find(|tower| tower.id == TowerId::new(7))
            .expect("restored tower present");
        assert!((restored.damage - TowerKind::Mortar.damage_at(2)).abs() < 1e-5);
        assert_eq!(restored.priority, TargetPriority::Strongest);
    }
}
