//! Act transactions: moves, duels and battery collection.
//!
//! Every transaction revalidates the decided intent against the live state
//! under `grid_lock -> robots_lock` before mutating anything. A stale intent
//! aborts without side effects and is reported as [`ActOutcome::Stale`].

use robot_arena_core::{
    BatteryState, Cell, CellCoord, Direction, DuelOutcome, Event, Intent, InvariantViolation,
    RobotId, StaleReason, MOVE_COST,
};
use robot_arena_system_duel::{resolve, Contestant};

use crate::{
    query::{BatteryPatch, BatterySnapshot},
    state::{retire, Battery, Grid, Robot, RobotTable},
    Arena,
};

/// Result of a revalidated intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActOutcome {
    /// The intent still held and its effects were committed.
    Committed,
    /// The intent no longer matched the live state; nothing changed.
    Stale(StaleReason),
}

impl ActOutcome {
    /// Reports whether the transaction committed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, ActOutcome::Committed)
    }
}

impl Arena {
    /// Revalidates and commits an intent on behalf of `robot`.
    ///
    /// Moves and duels run under `grid_lock -> robots_lock`; collection adds
    /// `battery_lock[k]`. Acquisition waits without bound.
    pub fn act(
        &self,
        robot: RobotId,
        intent: Intent,
        out_events: &mut Vec<Event>,
    ) -> Result<ActOutcome, InvariantViolation> {
        self.ensure_running()?;

        let outcome = match intent {
            Intent::Move { direction } => {
                let mut txn = self.locks.grid().robots();
                let (grid, robots) = (&mut *txn.grid, &mut *txn.robots);
                self.commit_move(grid, robots, robot, direction, out_events)?
            }
            Intent::Duel { opponent, cell } => {
                let mut txn = self.locks.grid().robots();
                let (grid, robots) = (&mut *txn.grid, &mut *txn.robots);
                self.commit_duel(grid, robots, robot, opponent, cell, out_events)?
            }
            Intent::Collect { battery, cell } => {
                let txn = self.locks.grid().robots();
                let stale = self.precheck_collect(&txn.grid, &txn.robots, robot, cell)?;
                match stale {
                    Some(reason) => ActOutcome::Stale(reason),
                    None => match txn.battery(battery) {
                        Some(mut txn) => {
                            let (grid, robots, battery) =
                                (&mut *txn.grid, &mut *txn.robots, &mut *txn.battery);
                            self.commit_collect(grid, robots, battery, robot, cell, out_events)?
                        }
                        None => ActOutcome::Stale(StaleReason::TargetChanged),
                    },
                }
            }
        };

        if let ActOutcome::Stale(reason) = outcome {
            tracing::trace!(%robot, ?intent, ?reason, "stale intent aborted");
        }
        Ok(outcome)
    }

    /// Checks the acting robot. Requires `robots_lock`.
    fn stale_actor(
        &self,
        robots: &RobotTable,
        robot: RobotId,
    ) -> Result<Option<StaleReason>, InvariantViolation> {
        let record = robots
            .get(robot)
            .ok_or_else(|| InvariantViolation::new(format!("{robot} is not in the arena")))?;
        if self.is_game_over() {
            return Ok(Some(StaleReason::GameOver));
        }
        if !record.is_alive() {
            return Ok(Some(StaleReason::ActorDead));
        }
        Ok(None)
    }

    fn commit_move(
        &self,
        grid: &mut Grid,
        robots: &mut RobotTable,
        robot: RobotId,
        direction: Direction,
        out_events: &mut Vec<Event>,
    ) -> Result<ActOutcome, InvariantViolation> {
        if let Some(reason) = self.stale_actor(robots, robot)? {
            return Ok(ActOutcome::Stale(reason));
        }

        let record = robots.expect_mut(robot)?;
        if record.attributes.energy < MOVE_COST {
            return Ok(ActOutcome::Stale(StaleReason::NoEnergy));
        }
        let from = record.cell;
        let Some(to) = from.step(direction).filter(|cell| grid.contains(*cell)) else {
            return Ok(ActOutcome::Stale(StaleReason::OutOfBounds));
        };
        if grid.get(to) != Some(Cell::Empty) {
            return Ok(ActOutcome::Stale(StaleReason::TargetChanged));
        }

        grid.swap(from, Cell::Robot(robot), Cell::Empty)?;
        grid.swap(to, Cell::Empty, Cell::Robot(robot))?;
        record.cell = to;
        let energy = record.spend(MOVE_COST)?;
        out_events.push(Event::RobotMoved {
            robot,
            from,
            to,
            energy,
        });
        tracing::trace!(%robot, %from, %to, energy, "robot moved");

        if energy == 0 {
            let cell = retire(grid, robots, robot)?;
            out_events.push(Event::RobotExhausted { robot, cell });
            tracing::info!(%robot, %cell, "robot exhausted its energy while moving");
        }

        self.publish(Some(grid), robots, BatteryPatch::Unchanged);
        Ok(ActOutcome::Committed)
    }

    fn commit_duel(
        &self,
        grid: &mut Grid,
        robots: &mut RobotTable,
        robot: RobotId,
        opponent: RobotId,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<ActOutcome, InvariantViolation> {
        if let Some(reason) = self.stale_actor(robots, robot)? {
            return Ok(ActOutcome::Stale(reason));
        }

        let challenger = robots.expect_mut(robot)?.clone();
        if opponent == robot || !challenger.cell.is_adjacent(cell) {
            return Ok(ActOutcome::Stale(StaleReason::NotAdjacent));
        }

        let defender = robots.expect_mut(opponent)?.clone();
        if grid.get(cell) != Some(Cell::Robot(opponent)) {
            let reason = if defender.is_alive() {
                StaleReason::TargetChanged
            } else {
                StaleReason::OpponentDead
            };
            return Ok(ActOutcome::Stale(reason));
        }
        if !defender.is_alive() || defender.cell != cell {
            return Err(InvariantViolation::new(format!(
                "grid shows {opponent} on {cell} but its record disagrees"
            )));
        }

        let outcome = resolve(contestant(&challenger), contestant(&defender));
        match outcome {
            DuelOutcome::Victory { loser, .. } => {
                let _ = retire(grid, robots, loser)?;
            }
            DuelOutcome::Stalemate {
                challenger,
                defender,
                ..
            } => {
                let _ = retire(grid, robots, challenger)?;
                let _ = retire(grid, robots, defender)?;
            }
        }
        out_events.push(Event::DuelResolved { outcome });
        tracing::info!(challenger = %robot, defender = %opponent, ?outcome, "duel resolved");

        self.publish(Some(grid), robots, BatteryPatch::Unchanged);
        Ok(ActOutcome::Committed)
    }

    /// Revalidates the parts of a collection that do not need the battery lock.
    pub(crate) fn precheck_collect(
        &self,
        grid: &Grid,
        robots: &RobotTable,
        robot: RobotId,
        cell: CellCoord,
    ) -> Result<Option<StaleReason>, InvariantViolation> {
        if let Some(reason) = self.stale_actor(robots, robot)? {
            return Ok(Some(reason));
        }
        let from = robots
            .get(robot)
            .map(|record| record.cell)
            .ok_or_else(|| InvariantViolation::new(format!("{robot} is not in the arena")))?;
        if !from.is_adjacent(cell) || !grid.contains(cell) {
            return Ok(Some(StaleReason::NotAdjacent));
        }
        Ok(None)
    }

    /// Commits a collection. Requires `grid_lock`, `robots_lock` and the battery's lock.
    pub(crate) fn commit_collect(
        &self,
        grid: &mut Grid,
        robots: &mut RobotTable,
        battery: &mut Battery,
        robot: RobotId,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<ActOutcome, InvariantViolation> {
        if let Some(reason) = self.precheck_collect(grid, robots, robot, cell)? {
            return Ok(ActOutcome::Stale(reason));
        }
        if !battery.state.is_available() {
            return Ok(ActOutcome::Stale(StaleReason::BatteryCollected));
        }
        if battery.cell != cell {
            return Ok(ActOutcome::Stale(StaleReason::TargetChanged));
        }

        grid.swap(cell, Cell::Battery(battery.id), Cell::Empty)?;
        battery.state = BatteryState::Collected { by: robot };
        let energy = robots.expect_mut(robot)?.recharge();
        out_events.push(Event::BatteryCollected {
            robot,
            battery: battery.id,
            energy,
        });
        tracing::debug!(%robot, battery = %battery.id, energy, "battery collected");

        self.publish(
            Some(grid),
            robots,
            BatteryPatch::Collected(battery_snapshot(battery)),
        );
        Ok(ActOutcome::Committed)
    }
}

fn contestant(robot: &Robot) -> Contestant {
    Contestant {
        id: robot.id,
        force: robot.attributes.force,
        energy: robot.attributes.energy,
    }
}

fn battery_snapshot(battery: &Battery) -> BatterySnapshot {
    BatterySnapshot {
        id: battery.id,
        cell: battery.cell,
        state: battery.state,
    }
}
