//! Read-only views published for agents and adapters.
//!
//! Snapshots are immutable copies taken while the mutating locks were held, so
//! each one is internally consistent at the instant it was published. Readers
//! never touch the core locks; they only clone an `Arc` from the board.

use robot_arena_core::{
    BatteryId, BatteryState, Cell, CellCoord, Direction, Outcome, RobotAttributes, RobotId,
    RobotStatus,
};

/// Immutable copy of the arena at some past instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaSnapshot {
    /// Monotonic publication counter.
    pub version: u64,
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Cell contents in row-major order.
    pub cells: Vec<Cell>,
    /// Every robot, in identifier order.
    pub robots: Vec<RobotSnapshot>,
    /// Every battery, in identifier order.
    pub batteries: Vec<BatterySnapshot>,
    /// Terminal result, once decided.
    pub outcome: Option<Outcome>,
    /// Whether the one-time setup has completed.
    pub initialized: bool,
}

impl ArenaSnapshot {
    pub(crate) fn empty(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            version: 0,
            columns,
            rows,
            cells: vec![Cell::Empty; capacity],
            robots: Vec::new(),
            batteries: Vec::new(),
            outcome: None,
            initialized: false,
        }
    }

    /// Contents of the provided cell, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<Cell> {
        if cell.column() >= self.columns || cell.row() >= self.rows {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        self.cells.get(row * width + column).copied()
    }

    /// Orthogonal neighbours of `cell` that lie inside the grid.
    pub fn neighbours(&self, cell: CellCoord) -> impl Iterator<Item = (Direction, CellCoord)> + '_ {
        Direction::ALL.into_iter().filter_map(move |direction| {
            cell.step(direction)
                .filter(|next| self.cell(*next).is_some())
                .map(|next| (direction, next))
        })
    }

    /// Snapshot of a single robot.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&RobotSnapshot> {
        self.robots.get(id.index())
    }

    /// Snapshot of a single battery.
    #[must_use]
    pub fn battery(&self, id: BatteryId) -> Option<&BatterySnapshot> {
        self.batteries.get(id.index())
    }

    /// Number of robots still alive.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.robots.iter().filter(|robot| robot.is_alive()).count()
    }

    /// Reports whether the game already reached its terminal state.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Immutable representation of a single robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RobotSnapshot {
    /// Identifier of the robot.
    pub id: RobotId,
    /// Cell the robot occupies, or last occupied if dead.
    pub cell: CellCoord,
    /// Force, energy and velocity.
    pub attributes: RobotAttributes,
    /// Lifecycle status.
    pub status: RobotStatus,
    /// Whether an external handler steers the robot.
    pub player: bool,
}

impl RobotSnapshot {
    /// Reports whether the robot was alive when the snapshot was taken.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status == RobotStatus::Alive
    }
}

/// Immutable representation of a single battery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatterySnapshot {
    /// Identifier of the battery.
    pub id: BatteryId,
    /// Cell the battery was placed on.
    pub cell: CellCoord,
    /// Availability of the battery.
    pub state: BatteryState,
}

/// Battery changes carried by a single publication.
#[derive(Debug)]
pub(crate) enum BatteryPatch {
    Unchanged,
    Collected(BatterySnapshot),
    Installed(Vec<BatterySnapshot>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_lookup_respects_bounds() {
        let mut snapshot = ArenaSnapshot::empty(4, 3);
        snapshot.cells[4 + 2] = Cell::Barrier;

        assert_eq!(snapshot.cell(CellCoord::new(2, 1)), Some(Cell::Barrier));
        assert_eq!(snapshot.cell(CellCoord::new(4, 1)), None);
        assert_eq!(snapshot.cell(CellCoord::new(0, 3)), None);
    }

    #[test]
    fn neighbours_skip_cells_outside_the_grid() {
        let snapshot = ArenaSnapshot::empty(3, 3);

        let corner: Vec<_> = snapshot.neighbours(CellCoord::new(0, 0)).collect();
        assert_eq!(
            corner,
            vec![
                (Direction::East, CellCoord::new(1, 0)),
                (Direction::South, CellCoord::new(0, 1)),
            ],
        );
        assert_eq!(snapshot.neighbours(CellCoord::new(1, 1)).count(), 4);
    }
}
