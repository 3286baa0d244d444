//! Occupancy field and exit-distance queries.

use std::collections::VecDeque;

use bulwark_core::{ConfigError, FieldConfig, GridPos, NO_PATH};

/// Authoritative cell occupancy for one game session.
///
/// The field is the single source of truth for which cells towers block; the
/// flow field is derived from it and never mutated directly. Zone membership
/// (spawn columns, exit rectangle) comes from the immutable [`FieldConfig`].
#[derive(Clone, Debug)]
pub(crate) struct Field {
    config: FieldConfig,
    blocked: Vec<bool>,
}

impl Field {
    /// Validates the configuration and builds an empty field.
    pub(crate) fn new(config: FieldConfig) -> Result<Self, ConfigError> {
        if config.columns == 0 || config.rows == 0 {
            return Err(ConfigError::DegenerateGrid {
                columns: config.columns,
                rows: config.rows,
            });
        }

        if config.spawn_columns >= config.columns {
            return Err(ConfigError::SpawnZoneTooWide {
                spawn_columns: config.spawn_columns,
            });
        }

        if config.exit_zone.right() > config.columns || config.exit_zone.bottom() > config.rows {
            return Err(ConfigError::ExitZoneOutOfBounds);
        }

        if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize);
        }

        let capacity = cell_count(config.columns, config.rows);
        Ok(Self {
            config,
            blocked: vec![false; capacity],
        })
    }

    pub(crate) fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Marks a cell as blocked by a tower.
    pub(crate) fn block(&mut self, cell: GridPos) {
        if let Some(index) = self.index(cell) {
            self.blocked[index] = true;
        }
    }

    /// Clears a tower block from a cell.
    pub(crate) fn unblock(&mut self, cell: GridPos) {
        if let Some(index) = self.index(cell) {
            self.blocked[index] = false;
        }
    }

    /// Reports whether a tower occupies the cell.
    pub(crate) fn is_blocked(&self, cell: GridPos) -> bool {
        self.index(cell)
            .map_or(false, |index| self.blocked[index])
    }

    /// Reports whether the cell is traversable ground.
    ///
    /// Out-of-bounds cells are never walkable; blocked cells are not.
    pub(crate) fn is_walkable(&self, cell: GridPos) -> bool {
        self.config.contains_cell(cell) && !self.is_blocked(cell)
    }

    /// Every cell of the spawn zone in deterministic row-major order.
    pub(crate) fn spawn_cells(&self) -> Vec<GridPos> {
        let mut cells = Vec::new();
        for row in 0..self.config.rows {
            for column in 0..self.config.spawn_columns {
                cells.push(GridPos::new(column, row));
            }
        }
        cells
    }

    /// Every cell of the exit zone in deterministic row-major order.
    pub(crate) fn exit_cells(&self) -> Vec<GridPos> {
        self.config.exit_zone.cells().collect()
    }

    /// Rebuilds `out` with the exit distance of every cell using a reverse
    /// breadth-first search over the 4-connected walkable graph.
    ///
    /// The `is_blocked` closure overrides occupancy, which lets callers ask
    /// "what if this cell were blocked" without any observable mutation.
    /// Unreachable cells receive [`NO_PATH`].
    pub(crate) fn compute_distances_with<F>(&self, mut is_blocked: F, out: &mut Vec<u16>)
    where
        F: FnMut(GridPos) -> bool,
    {
        let columns = self.config.columns;
        let rows = self.config.rows;
        let capacity = cell_count(columns, rows);

        if out.len() != capacity {
            out.resize(capacity, NO_PATH);
        }
        out.fill(NO_PATH);

        let mut frontier = VecDeque::new();
        for exit in self.exit_cells() {
            if is_blocked(exit) {
                continue;
            }

            if let Some(index) = self.index(exit) {
                if out[index] == 0 {
                    continue;
                }
                out[index] = 0;
                frontier.push_back(exit);
            }
        }

        while let Some(cell) = frontier.pop_front() {
            let Some(current_index) = self.index(cell) else {
                continue;
            };
            let current = out[current_index];
            if current >= NO_PATH.saturating_sub(1) {
                continue;
            }
            let next = current + 1;

            for neighbor in cardinal_neighbors(cell, columns, rows) {
                if is_blocked(neighbor) {
                    continue;
                }

                let Some(neighbor_index) = self.index(neighbor) else {
                    continue;
                };
                if out[neighbor_index] <= next {
                    continue;
                }

                out[neighbor_index] = next;
                frontier.push_back(neighbor);
            }
        }
    }

    /// Reports whether `from` can currently reach the exit zone.
    pub(crate) fn can_reach_exit(&self, from: GridPos) -> bool {
        if !self.is_walkable(from) {
            return false;
        }

        let mut distances = Vec::new();
        self.compute_distances_with(|cell| self.is_blocked(cell), &mut distances);
        self.index(from)
            .map_or(false, |index| distances[index] != NO_PATH)
    }

    /// Non-mutating "what if" check: would blocking `candidate` still leave
    /// every spawn-zone cell connected to the exit?
    ///
    /// The maze may never fully seal the map; this is the invariant the
    /// placement validator enforces before any state changes.
    pub(crate) fn test_block_cell(&self, candidate: GridPos) -> bool {
        let mut distances = Vec::new();
        self.compute_distances_with(
            |cell| cell == candidate || self.is_blocked(cell),
            &mut distances,
        );

        self.spawn_cells().into_iter().all(|spawn| {
            self.index(spawn)
                .map_or(false, |index| distances[index] != NO_PATH)
        })
    }

    pub(crate) fn index(&self, cell: GridPos) -> Option<usize> {
        if cell.column() < self.config.columns && cell.row() < self.config.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.config.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

fn cell_count(columns: u32, rows: u32) -> usize {
    let total = u64::from(columns) * u64::from(rows);
    usize::try_from(total).unwrap_or(0)
}

/// In-bounds 4-connected neighbors in fixed north, east, south, west order.
///
/// The scan order is load-bearing: the flow field breaks distance ties by
/// first-seen neighbor, which keeps agent movement reproducible.
pub(crate) fn cardinal_neighbors(
    cell: GridPos,
    columns: u32,
    rows: u32,
) -> impl Iterator<Item = GridPos> {
    let mut candidates = [None; 4];
    let mut count = 0;

    if cell.row() > 0 {
        candidates[count] = Some(GridPos::new(cell.column(), cell.row() - 1));
        count += 1;
    }
    if cell.column() + 1 < columns {
        candidates[count] = Some(GridPos::new(cell.column() + 1, cell.row()));
        count += 1;
    }
    if cell.row() + 1 < rows {
        candidates[count] = Some(GridPos::new(cell.column(), cell.row() + 1));
        count += 1;
    }
    if cell.column() > 0 {
        candidates[count] = Some(GridPos::new(cell.column() - 1, cell.row()));
        count += 1;
    }

    candidates.into_iter().take(count).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> Field {
        let config = FieldConfig {
            columns: 5,
            rows: 4,
            cell_size: 16.0,
            spawn_columns: 1,
            exit_zone: bulwark_core::GridRect::new(GridPos::new(4, 1), 1, 2),
        };
        Field::new(config).expect("valid config")
    }

    #[test]
    fn construction_rejects_degenerate_configs() {
        let mut config = FieldConfig::standard();
        config.columns = 0;
        assert!(matches!(
            Field::new(config),
            Err(ConfigError::DegenerateGrid { .. })
        ));

        let mut config = FieldConfig::standard();
        config.spawn_columns = config.columns;
        assert!(matches!(
            Field::new(config),
            Err(ConfigError::SpawnZoneTooWide { .. })
        ));

        let mut config = FieldConfig::standard();
        config.cell_size = f32::NAN;
        assert!(matches!(Field::new(config), Err(ConfigError::InvalidCellSize)));
    }

    #[test]
    fn distances_radiate_from_the_exit() {
        let field = small_field();
        let mut distances = Vec::new();
        field.compute_distances_with(|cell| field.is_blocked(cell), &mut distances);

        let distance =
            |cell: GridPos| distances[field.index(cell).expect("in bounds")];
        assert_eq!(distance(GridPos::new(4, 1)), 0);
        assert_eq!(distance(GridPos::new(4, 2)), 0);
        assert_eq!(distance(GridPos::new(3, 1)), 1);
        assert_eq!(distance(GridPos::new(0, 1)), 4);
    }

    #[test]
    fn blocked_cells_divert_the_search() {
        let field = small_field();
        let wall = GridPos::new(3, 1);
        let mut distances = Vec::new();
        field.compute_distances_with(|cell| cell == wall || field.is_blocked(cell), &mut distances);

        let distance =
            |cell: GridPos| distances[field.index(cell).expect("in bounds")];
        assert_eq!(distance(wall), NO_PATH);
        assert_eq!(distance(GridPos::new(3, 2)), 1);
        assert_eq!(distance(GridPos::new(4, 0)), 1);
        assert_eq!(distance(GridPos::new(3, 0)), 2);
    }

    #[test]
    fn test_block_cell_leaves_no_trace() {
        let mut field = small_field();
        field.block(GridPos::new(3, 1));

        let before: Vec<bool> = field.blocked.clone();
        assert!(field.test_block_cell(GridPos::new(3, 2)));
        assert_eq!(field.blocked, before);
    }

    #[test]
    fn test_block_cell_detects_a_full_seal() {
        let mut field = small_field();
        // Wall off column 3 except one gap at row 3.
        field.block(GridPos::new(3, 0));
        field.block(GridPos::new(3, 1));
        field.block(GridPos::new(3, 2));

        assert!(field.test_block_cell(GridPos::new(2, 2)));
        assert!(!field.test_block_cell(GridPos::new(3, 3)));
    }

    #[test]
    fn reachability_follows_current_occupancy() {
        let mut field = small_field();
        assert!(field.can_reach_exit(GridPos::new(0, 0)));

        field.block(GridPos::new(3, 0));
        field.block(GridPos::new(3, 1));
        field.block(GridPos::new(3, 2));
        field.block(GridPos::new(3, 3));
        assert!(!field.can_reach_exit(GridPos::new(0, 0)));

        field.unblock(GridPos::new(3, 3));
        assert!(field.can_reach_exit(GridPos::new(0, 0)));
    }
}
