//! Cross-entity invariant checks.

use robot_arena_core::{Cell, InvariantViolation, MAX_ENERGY};

use crate::Arena;

impl Arena {
    /// Verifies every cross-entity invariant at a quiescent point.
    ///
    /// Acquires `grid_lock -> robots_lock -> battery_lock[0..n]` so no
    /// transaction is in flight while the check runs.
    pub fn audit(&self) -> Result<(), InvariantViolation> {
        let txn = self.locks.grid().robots().all_batteries();
        let (grid, robots) = (&*txn.grid, &*txn.robots);

        for robot in robots.iter() {
            let energy = robot.attributes.energy;
            if energy > MAX_ENERGY {
                return Err(InvariantViolation::new(format!(
                    "{} holds {energy} energy",
                    robot.id
                )));
            }
            if robot.is_alive() {
                if grid.get(robot.cell) != Some(Cell::Robot(robot.id)) {
                    return Err(InvariantViolation::new(format!(
                        "{} is recorded on {} but the grid disagrees",
                        robot.id, robot.cell
                    )));
                }
            } else if energy != 0 {
                return Err(InvariantViolation::new(format!(
                    "dead {} still holds {energy} energy",
                    robot.id
                )));
            }
        }

        for (index, cell) in grid.cells().iter().enumerate() {
            let coord = grid.coord_of(index).ok_or_else(|| {
                InvariantViolation::new(format!("grid index {index} has no coordinate"))
            })?;
            match *cell {
                Cell::Robot(id) => {
                    let consistent = robots
                        .get(id)
                        .is_some_and(|robot| robot.is_alive() && robot.cell == coord);
                    if !consistent {
                        return Err(InvariantViolation::new(format!(
                            "cell {coord} shows {id}, which is dead or recorded elsewhere"
                        )));
                    }
                }
                Cell::Battery(id) => {
                    let consistent = txn
                        .batteries
                        .get(id.index())
                        .is_some_and(|battery| battery.state.is_available() && battery.cell == coord);
                    if !consistent {
                        return Err(InvariantViolation::new(format!(
                            "cell {coord} shows {id}, which is collected or placed elsewhere"
                        )));
                    }
                }
                Cell::Barrier | Cell::Empty => {
                    if self.is_initialized() && grid.is_perimeter(coord) && *cell != Cell::Barrier
                    {
                        return Err(InvariantViolation::new(format!(
                            "perimeter cell {coord} lost its barrier"
                        )));
                    }
                }
            }
        }

        if self.is_initialized() {
            for battery in &txn.batteries {
                let shown = grid.get(battery.cell) == Some(Cell::Battery(battery.id));
                if battery.state.is_available() != shown {
                    return Err(InvariantViolation::new(format!(
                        "{} is {:?} but the grid {} it",
                        battery.id,
                        battery.state,
                        if shown { "shows" } else { "does not show" }
                    )));
                }
            }
        }

        Ok(())
    }
}
