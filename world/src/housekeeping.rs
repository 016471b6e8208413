//! Low-frequency maintenance: metabolic drain and the win condition.

use robot_arena_core::{Event, InvariantViolation, Outcome, RobotAttributes, RobotId};

use crate::{query::BatteryPatch, state::retire, Arena};

/// Energy drained from a robot on every housekeeping tick.
///
/// Faster and stronger robots burn more: `max(1, (V + F) / 4)`.
#[must_use]
pub fn metabolic_cost(attributes: RobotAttributes) -> u32 {
    (attributes.velocity.saturating_add(attributes.force) / 4).max(1)
}

/// Result of a single metabolic tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metabolism {
    /// Energy was drained and the robot lives on.
    Drained {
        /// Energy remaining afterwards.
        energy: u32,
    },
    /// The robot ran out of energy and died.
    Exhausted,
    /// The robot was already dead or the game is over; nothing changed.
    Inert,
}

impl Arena {
    /// Drains the metabolic cost from `robot` under `robots_lock`.
    ///
    /// When the drain empties the robot, the lock is released and the death is
    /// committed in a separate `grid_lock -> robots_lock` transaction, because
    /// releasing the robot's cell needs the grid.
    pub fn metabolize(
        &self,
        robot: RobotId,
        out_events: &mut Vec<Event>,
    ) -> Result<Metabolism, InvariantViolation> {
        self.ensure_running()?;

        {
            let mut stage = self.locks.robots();
            if self.is_game_over() {
                return Ok(Metabolism::Inert);
            }
            let record = stage.robots.expect_mut(robot)?;
            if !record.is_alive() {
                return Ok(Metabolism::Inert);
            }

            let energy = record.drain(metabolic_cost(record.attributes));
            out_events.push(Event::EnergyDrained { robot, energy });
            tracing::trace!(%robot, energy, "metabolic drain");
            self.publish(None, &stage.robots, BatteryPatch::Unchanged);
            if energy > 0 {
                return Ok(Metabolism::Drained { energy });
            }
        }

        self.retire_exhausted(robot, out_events)
    }

    fn retire_exhausted(
        &self,
        robot: RobotId,
        out_events: &mut Vec<Event>,
    ) -> Result<Metabolism, InvariantViolation> {
        let mut txn = self.locks.grid().robots();
        let (grid, robots) = (&mut *txn.grid, &mut *txn.robots);

        let record = robots.expect_mut(robot)?;
        if !record.is_alive() {
            return Ok(Metabolism::Inert);
        }
        if record.attributes.energy > 0 {
            // Recharged between the drain and this transaction.
            return Ok(Metabolism::Drained {
                energy: record.attributes.energy,
            });
        }

        let cell = retire(grid, robots, robot)?;
        out_events.push(Event::RobotExhausted { robot, cell });
        tracing::info!(%robot, %cell, "robot exhausted its energy");
        self.publish(Some(grid), robots, BatteryPatch::Unchanged);
        Ok(Metabolism::Exhausted)
    }

    /// Decides the game once at most one robot is alive. Runs under `robots_lock`.
    ///
    /// Returns the outcome whenever one has been recorded, by this call or an
    /// earlier one.
    pub fn settle_outcome(&self, out_events: &mut Vec<Event>) -> Option<Outcome> {
        let stage = self.locks.robots();
        if let Some(outcome) = self.outcome() {
            return Some(outcome);
        }
        if !self.is_initialized() {
            return None;
        }

        let mut alive = stage.robots.alive().map(|robot| robot.id);
        let outcome = match (alive.next(), alive.next()) {
            (None, _) => Outcome::NoSurvivors,
            (Some(winner), None) => Outcome::Winner(winner),
            (Some(_), Some(_)) => return None,
        };

        let _ = self.outcome.set(outcome);
        out_events.push(Event::OutcomeDecided { outcome });
        match outcome {
            Outcome::Winner(winner) => tracing::info!(%winner, "game over"),
            Outcome::NoSurvivors => tracing::info!("game over without survivors"),
        }
        self.publish(None, &stage.robots, BatteryPatch::Unchanged);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metabolic_cost_never_drops_below_one() {
        let sluggish = RobotAttributes {
            force: 1,
            energy: 50,
            velocity: 1,
        };
        let brute = RobotAttributes {
            force: 10,
            energy: 50,
            velocity: 5,
        };

        assert_eq!(metabolic_cost(sluggish), 1);
        assert_eq!(metabolic_cost(brute), 3);
    }
}
