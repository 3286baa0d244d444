//! Derived flow field: per-cell step directions toward the exit.

use bulwark_core::{FlowFieldView, GridPos, NO_PATH};
use glam::Vec2;

use crate::field::{cardinal_neighbors, Field};

/// Cached direction field derived from the occupancy field's distances.
///
/// Purely derived data: never mutated directly, only recomputed wholesale
/// from the [`Field`]. A dirty flag set on any block/unblock batches all
/// occupancy changes between ticks into a single rebuild.
#[derive(Clone, Debug)]
pub(crate) struct FlowField {
    width: u32,
    height: u32,
    cell_size: f32,
    distances: Vec<u16>,
    directions: Vec<Option<Vec2>>,
    dirty: bool,
}

impl FlowField {
    pub(crate) fn new(field: &Field) -> Self {
        let config = field.config();
        let mut flow = Self {
            width: config.columns,
            height: config.rows,
            cell_size: config.cell_size,
            distances: Vec::new(),
            directions: Vec::new(),
            dirty: true,
        };
        flow.ensure_fresh(field);
        flow
    }

    /// Marks the cached field stale; the next [`Self::ensure_fresh`] rebuilds.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuilds distances and directions if any occupancy change was recorded
    /// since the last rebuild.
    pub(crate) fn ensure_fresh(&mut self, field: &Field) {
        if !self.dirty {
            return;
        }

        let config = field.config();
        self.width = config.columns;
        self.height = config.rows;
        self.cell_size = config.cell_size;

        field.compute_distances_with(|cell| field.is_blocked(cell), &mut self.distances);
        self.rebuild_directions(config.exit_anchor());
        self.dirty = false;
    }

    /// Derives the per-cell step direction from the distance map.
    ///
    /// Each reachable cell points at its first strictly-lower neighbor in the
    /// fixed north/east/south/west scan order, which guarantees monotonically
    /// decreasing distances along every followed direction. Exit cells point
    /// at the exit anchor so interpolation stays smooth on final approach.
    fn rebuild_directions(&mut self, exit_anchor: Vec2) {
        let capacity = self.distances.len();
        if self.directions.len() != capacity {
            self.directions.resize(capacity, None);
        }
        self.directions.fill(None);

        for row in 0..self.height {
            for column in 0..self.width {
                let cell = GridPos::new(column, row);
                let Some(index) = self.index(cell) else {
                    continue;
                };
                let distance = self.distances[index];
                if distance == NO_PATH {
                    continue;
                }

                if distance == 0 {
                    let center = cell.center(self.cell_size);
                    let toward_anchor = exit_anchor - center;
                    self.directions[index] = if toward_anchor.length_squared() > f32::EPSILON {
                        Some(toward_anchor.normalize())
                    } else {
                        Some(Vec2::X)
                    };
                    continue;
                }

                let mut chosen = None;
                for neighbor in cardinal_neighbors(cell, self.width, self.height) {
                    let Some(neighbor_index) = self.index(neighbor) else {
                        continue;
                    };
                    if self.distances[neighbor_index] < distance {
                        chosen = Some(neighbor);
                        break;
                    }
                }

                if let Some(neighbor) = chosen {
                    let step = neighbor.center(self.cell_size) - cell.center(self.cell_size);
                    self.directions[index] = Some(step.normalize());
                }
            }
        }
    }

    /// Captures a borrowed read-only view over the cached field.
    pub(crate) fn view(&self) -> FlowFieldView<'_> {
        FlowFieldView::from_parts(
            &self.distances,
            &self.directions,
            self.width,
            self.height,
            self.cell_size,
        )
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
