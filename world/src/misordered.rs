//! Bounded-wait collection, including the deliberately misordered lock path.
//!
//! [`LockOrder::Misordered`] takes `battery_lock[k]` before `grid_lock`, which
//! can form a circular wait with any ordered transaction on the same battery.
//! Every acquisition on these paths is bounded, and a timeout releases all
//! locks the attempt already holds before reporting [`TransactionError::Timeout`].

use std::time::Duration;

use robot_arena_core::{BatteryId, CellCoord, Event, InvariantViolation, RobotId, StaleReason};
use thiserror::Error;

use crate::{
    locks::{LockTimeout, Resource},
    transaction::ActOutcome,
    Arena,
};

/// Lock acquisition order used by a bounded collection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockOrder {
    /// `grid_lock -> robots_lock -> battery_lock[k]`.
    Ordered,
    /// `battery_lock[k] -> grid_lock -> robots_lock`; the fault-injection path.
    Misordered,
}

impl LockOrder {
    /// Resource acquired first under this order.
    #[must_use]
    pub const fn first_resource(&self, battery: BatteryId) -> Resource {
        match self {
            LockOrder::Ordered => Resource::Grid,
            LockOrder::Misordered => Resource::Battery(battery),
        }
    }
}

/// Parameters of a bounded-wait collection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedCollect {
    /// Robot collecting the battery.
    pub robot: RobotId,
    /// Battery the robot expects to find.
    pub battery: BatteryId,
    /// Cell the battery was observed on.
    pub cell: CellCoord,
    /// Order in which the locks are taken.
    pub order: LockOrder,
    /// Upper bound for each individual acquisition.
    pub timeout: Duration,
}

/// Failure of a bounded-wait transaction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A lock could not be acquired in time; everything held was released.
    #[error(transparent)]
    Timeout(#[from] LockTimeout),
    /// The transaction detected corrupted shared state.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl Arena {
    /// Attempts a collection with bounded waits on every lock.
    ///
    /// `on_first_lock` runs while only the first lock of `order` is held,
    /// which lets callers line up contending attempts deterministically.
    pub fn collect_within<F>(
        &self,
        attempt: BoundedCollect,
        on_first_lock: F,
        out_events: &mut Vec<Event>,
    ) -> Result<ActOutcome, TransactionError>
    where
        F: FnOnce(),
    {
        self.ensure_running()?;
        let BoundedCollect {
            robot,
            battery,
            cell,
            order,
            timeout,
        } = attempt;

        let outcome = match order {
            LockOrder::Ordered => {
                let stage = self.locks.grid_within(timeout)?;
                on_first_lock();
                let txn = stage.robots_within(timeout)?;
                let stale = self.precheck_collect(&txn.grid, &txn.robots, robot, cell)?;
                match stale {
                    Some(reason) => ActOutcome::Stale(reason),
                    None => match txn.battery_within(battery, timeout)? {
                        Some(mut txn) => {
                            let (grid, robots, battery) =
                                (&mut *txn.grid, &mut *txn.robots, &mut *txn.battery);
                            self.commit_collect(grid, robots, battery, robot, cell, out_events)?
                        }
                        None => ActOutcome::Stale(StaleReason::TargetChanged),
                    },
                }
            }
            LockOrder::Misordered => {
                let Some(stage) = self.locks.misordered_battery(battery) else {
                    return Ok(ActOutcome::Stale(StaleReason::TargetChanged));
                };
                tracing::warn!(%robot, %battery, "acquired battery lock ahead of grid lock");
                on_first_lock();
                let mut txn = stage.grid_and_robots_within(timeout)?;
                let (grid, robots, battery) =
                    (&mut *txn.grid, &mut *txn.robots, &mut *txn.battery);
                self.commit_collect(grid, robots, battery, robot, cell, out_events)?
            }
        };

        if let ActOutcome::Stale(reason) = outcome {
            tracing::trace!(%robot, %battery, ?order, ?reason, "stale collection aborted");
        }
        Ok(outcome)
    }
}
