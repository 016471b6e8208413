//! Data guarded by the lock manager.
//!
//! None of these types synchronize on their own. Every value lives inside
//! exactly one mutex owned by [`crate::locks::LockManager`]; the lock named in
//! each type's documentation must be held to read or mutate it.

use robot_arena_core::{
    BatteryId, BatteryState, Cell, CellCoord, InvariantViolation, RobotAttributes, RobotId,
    RobotStatus, BATTERY_BOOST, MAX_ENERGY, PLAYER_ROBOT,
};

/// Dense cell occupancy matrix. Guarded by `grid_lock`.
#[derive(Clone, Debug)]
pub(crate) struct Grid {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
}

impl Grid {
    pub(crate) fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![Cell::Empty; capacity],
        }
    }

    pub(crate) fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    pub(crate) fn is_perimeter(&self, cell: CellCoord) -> bool {
        cell.column() == 0
            || cell.row() == 0
            || cell.column() + 1 == self.columns
            || cell.row() + 1 == self.rows
    }

    pub(crate) fn get(&self, cell: CellCoord) -> Option<Cell> {
        self.index(cell).and_then(|index| self.cells.get(index).copied())
    }

    pub(crate) fn set(&mut self, cell: CellCoord, value: Cell) -> Result<(), InvariantViolation> {
        let slot = self
            .index(cell)
            .and_then(|index| self.cells.get_mut(index))
            .ok_or_else(|| InvariantViolation::new(format!("cell {cell} lies outside the grid")))?;
        *slot = value;
        Ok(())
    }

    /// Replaces the contents of `cell`, failing unless it currently holds `expected`.
    pub(crate) fn swap(
        &mut self,
        cell: CellCoord,
        expected: Cell,
        value: Cell,
    ) -> Result<(), InvariantViolation> {
        match self.get(cell) {
            Some(current) if current == expected => self.set(cell, value),
            current => Err(InvariantViolation::new(format!(
                "cell {cell} holds {current:?} but {expected:?} was recorded"
            ))),
        }
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn coord_of(&self, index: usize) -> Option<CellCoord> {
        let width = usize::try_from(self.columns).ok()?;
        if width == 0 || index >= self.cells.len() {
            return None;
        }
        let column = u32::try_from(index % width).ok()?;
        let row = u32::try_from(index / width).ok()?;
        Some(CellCoord::new(column, row))
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        Some(row * width + column)
    }
}

/// A single robot record. Guarded by `robots_lock` as part of [`RobotTable`].
#[derive(Clone, Debug)]
pub(crate) struct Robot {
    pub(crate) id: RobotId,
    pub(crate) attributes: RobotAttributes,
    pub(crate) cell: CellCoord,
    pub(crate) status: RobotStatus,
}

impl Robot {
    pub(crate) fn is_alive(&self) -> bool {
        self.status == RobotStatus::Alive
    }

    pub(crate) fn is_player(&self) -> bool {
        self.id == PLAYER_ROBOT
    }

    /// Applies the capped battery boost and returns the new energy.
    pub(crate) fn recharge(&mut self) -> u32 {
        self.attributes.energy = self
            .attributes
            .energy
            .saturating_add(BATTERY_BOOST)
            .min(MAX_ENERGY);
        self.attributes.energy
    }

    pub(crate) fn spend(&mut self, amount: u32) -> Result<u32, InvariantViolation> {
        self.attributes.energy = self.attributes.energy.checked_sub(amount).ok_or_else(|| {
            InvariantViolation::new(format!(
                "{} cannot spend {amount} energy with only {} left",
                self.id, self.attributes.energy
            ))
        })?;
        Ok(self.attributes.energy)
    }

    /// Drains up to `amount` energy without going below zero.
    pub(crate) fn drain(&mut self, amount: u32) -> u32 {
        self.attributes.energy = self.attributes.energy.saturating_sub(amount);
        self.attributes.energy
    }

    fn kill(&mut self) {
        self.status = RobotStatus::Dead;
        self.attributes.energy = 0;
    }
}

/// Attribute table for every robot, dead or alive. Guarded by `robots_lock`.
#[derive(Clone, Debug, Default)]
pub(crate) struct RobotTable {
    robots: Vec<Robot>,
}

impl RobotTable {
    pub(crate) fn push(&mut self, robot: Robot) {
        self.robots.push(robot);
    }

    pub(crate) fn get(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: RobotId) -> Option<&mut Robot> {
        self.robots.get_mut(id.index())
    }

    /// Looks up a robot that must exist for the transaction to make sense.
    pub(crate) fn expect_mut(&mut self, id: RobotId) -> Result<&mut Robot, InvariantViolation> {
        self.get_mut(id)
            .ok_or_else(|| InvariantViolation::new(format!("{id} is missing from the robot table")))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter()
    }

    pub(crate) fn alive(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter().filter(|robot| robot.is_alive())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

/// Kills a live robot and releases its cell. Requires `grid_lock` and `robots_lock`.
pub(crate) fn retire(
    grid: &mut Grid,
    robots: &mut RobotTable,
    id: RobotId,
) -> Result<CellCoord, InvariantViolation> {
    let robot = robots.expect_mut(id)?;
    if !robot.is_alive() {
        return Err(InvariantViolation::new(format!("{id} died twice")));
    }
    let cell = robot.cell;
    grid.swap(cell, Cell::Robot(id), Cell::Empty)?;
    robot.kill();
    Ok(cell)
}

/// A single battery record. Guarded by its own `battery_lock[k]`.
#[derive(Clone, Debug)]
pub(crate) struct Battery {
    pub(crate) id: BatteryId,
    pub(crate) cell: CellCoord,
    pub(crate) state: BatteryState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perimeter_detection_covers_all_edges() {
        let grid = Grid::new(5, 4);

        assert!(grid.is_perimeter(CellCoord::new(0, 2)));
        assert!(grid.is_perimeter(CellCoord::new(4, 2)));
        assert!(grid.is_perimeter(CellCoord::new(2, 0)));
        assert!(grid.is_perimeter(CellCoord::new(2, 3)));
        assert!(!grid.is_perimeter(CellCoord::new(2, 2)));
    }

    #[test]
    fn swap_rejects_unexpected_contents() {
        let mut grid = Grid::new(3, 3);
        let cell = CellCoord::new(1, 1);
        grid.set(cell, Cell::Robot(RobotId::new(2)))
            .expect("cell is inside the grid");

        let error = grid
            .swap(cell, Cell::Robot(RobotId::new(3)), Cell::Empty)
            .expect_err("mismatched occupant must be reported");

        assert!(error.detail().contains("(1, 1)"));
        assert_eq!(grid.get(cell), Some(Cell::Robot(RobotId::new(2))));
    }

    #[test]
    fn coord_of_inverts_index() {
        let grid = Grid::new(7, 3);
        let cell = CellCoord::new(5, 2);
        let index = grid.index(cell).expect("cell is inside the grid");

        assert_eq!(grid.coord_of(index), Some(cell));
        assert_eq!(grid.coord_of(grid.cells().len()), None);
    }

    #[test]
    fn recharge_is_capped() {
        let mut robot = Robot {
            id: RobotId::new(1),
            attributes: RobotAttributes {
                force: 3,
                energy: 90,
                velocity: 2,
            },
            cell: CellCoord::new(1, 1),
            status: RobotStatus::Alive,
        };

        assert_eq!(robot.recharge(), 100);
        assert_eq!(robot.drain(150), 0);
        assert!(robot.spend(1).is_err());
    }
}
