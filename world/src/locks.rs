//! Lock manager and the acquisition-order protocol.
//!
//! Normal transactions climb a chain of typed stages:
//!
//! ```text
//! init_lock -> grid_lock -> robots_lock -> battery_lock[k]
//! ```
//!
//! Each stage only exposes the next lock in the order, so an ordered path
//! cannot be written in the wrong order. Stage structs declare their guards in
//! release order, which makes dropping a stage release the locks in strict
//! reverse acquisition order.
//!
//! [`LockManager::misordered_battery`] is the single exception: it starts at
//! a battery lock and then climbs back to the grid lock. It exists only for
//! the deadlock drill.

use std::{fmt, time::Duration};

use parking_lot::{Mutex, MutexGuard};
use robot_arena_core::BatteryId;
use thiserror::Error;

use crate::{
    layout::Layout,
    state::{Battery, Grid, RobotTable},
};

/// Resources that can be acquired through the lock manager, in mandated order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Gate for the one-time arena setup.
    Init,
    /// Cell occupancy and adjacency.
    Grid,
    /// Robot attribute table.
    Robots,
    /// State transition of a single battery.
    Battery(BatteryId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Init => f.write_str("init_lock"),
            Resource::Grid => f.write_str("grid_lock"),
            Resource::Robots => f.write_str("robots_lock"),
            Resource::Battery(id) => write!(f, "battery_lock[{}]", id.get()),
        }
    }
}

/// A bounded-wait acquisition gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("timed out after {waited:?} waiting for {resource}")]
pub struct LockTimeout {
    /// Resource that could not be acquired.
    pub resource: Resource,
    /// How long the caller waited.
    pub waited: Duration,
}

/// State behind `init_lock`.
#[derive(Debug)]
pub(crate) struct InitGate {
    pub(crate) done: bool,
    pub(crate) layout: Option<Layout>,
}

/// Owns the complete mutex set guarding the arena.
#[derive(Debug)]
pub(crate) struct LockManager {
    init: Mutex<InitGate>,
    grid: Mutex<Grid>,
    robots: Mutex<RobotTable>,
    batteries: Box<[Mutex<Battery>]>,
}

impl LockManager {
    pub(crate) fn new(grid: Grid, batteries: Vec<Battery>, layout: Layout) -> Self {
        Self {
            init: Mutex::new(InitGate {
                done: false,
                layout: Some(layout),
            }),
            grid: Mutex::new(grid),
            robots: Mutex::new(RobotTable::default()),
            batteries: batteries.into_iter().map(Mutex::new).collect(),
        }
    }

    pub(crate) fn battery_count(&self) -> usize {
        self.batteries.len()
    }

    /// Acquires `init_lock`, blocking until available.
    pub(crate) fn init(&self) -> InitStage<'_> {
        InitStage {
            locks: self,
            gate: self.init.lock(),
        }
    }

    /// Acquires `grid_lock`, blocking until available.
    pub(crate) fn grid(&self) -> GridStage<'_> {
        GridStage {
            locks: self,
            grid: self.grid.lock(),
        }
    }

    /// Acquires `grid_lock`, giving up after `timeout`.
    pub(crate) fn grid_within(&self, timeout: Duration) -> Result<GridStage<'_>, LockTimeout> {
        Ok(GridStage {
            locks: self,
            grid: acquire_within(&self.grid, Resource::Grid, timeout)?,
        })
    }

    /// Acquires `robots_lock` alone, blocking until available.
    pub(crate) fn robots(&self) -> RobotsStage<'_> {
        RobotsStage {
            robots: self.robots.lock(),
        }
    }

    /// Acquires `battery_lock[k]` as the first lock of a transaction.
    ///
    /// Climbing from here to the grid lock inverts the mandated order. Only the
    /// deadlock drill may call this.
    pub(crate) fn misordered_battery(&self, battery: BatteryId) -> Option<MisorderedStage<'_>> {
        let mutex = self.batteries.get(battery.index())?;
        Some(MisorderedStage {
            locks: self,
            battery: mutex.lock(),
        })
    }

    fn battery_mutex(&self, battery: BatteryId) -> Option<&Mutex<Battery>> {
        self.batteries.get(battery.index())
    }
}

fn acquire_within<'a, T>(
    mutex: &'a Mutex<T>,
    resource: Resource,
    timeout: Duration,
) -> Result<MutexGuard<'a, T>, LockTimeout> {
    if let Some(guard) = mutex.try_lock() {
        return Ok(guard);
    }

    tracing::warn!(%resource, ?timeout, "blocked waiting for lock");
    mutex.try_lock_for(timeout).ok_or(LockTimeout {
        resource,
        waited: timeout,
    })
}

/// Holds `init_lock`.
pub(crate) struct InitStage<'a> {
    locks: &'a LockManager,
    pub(crate) gate: MutexGuard<'a, InitGate>,
}

impl<'a> InitStage<'a> {
    /// Acquires `grid_lock` then `robots_lock` on top of `init_lock`.
    pub(crate) fn grid_and_robots(self) -> InitTransaction<'a> {
        let grid = self.locks.grid.lock();
        let robots = self.locks.robots.lock();
        InitTransaction {
            robots,
            grid,
            gate: self.gate,
        }
    }
}

/// Holds `init_lock`, `grid_lock` and `robots_lock`.
pub(crate) struct InitTransaction<'a> {
    pub(crate) robots: MutexGuard<'a, RobotTable>,
    pub(crate) grid: MutexGuard<'a, Grid>,
    pub(crate) gate: MutexGuard<'a, InitGate>,
}

/// Holds `grid_lock`.
pub(crate) struct GridStage<'a> {
    locks: &'a LockManager,
    grid: MutexGuard<'a, Grid>,
}

impl<'a> GridStage<'a> {
    /// Acquires `robots_lock`, blocking until available.
    pub(crate) fn robots(self) -> Transaction<'a> {
        let robots = self.locks.robots.lock();
        Transaction {
            locks: self.locks,
            robots,
            grid: self.grid,
        }
    }

    /// Acquires `robots_lock`, releasing `grid_lock` if it times out.
    pub(crate) fn robots_within(self, timeout: Duration) -> Result<Transaction<'a>, LockTimeout> {
        let robots = acquire_within(&self.locks.robots, Resource::Robots, timeout)?;
        Ok(Transaction {
            locks: self.locks,
            robots,
            grid: self.grid,
        })
    }
}

/// Holds `grid_lock` and `robots_lock`: the critical section for moves and duels.
pub(crate) struct Transaction<'a> {
    locks: &'a LockManager,
    pub(crate) robots: MutexGuard<'a, RobotTable>,
    pub(crate) grid: MutexGuard<'a, Grid>,
}

impl<'a> Transaction<'a> {
    /// Acquires `battery_lock[k]`, blocking until available.
    ///
    /// Returns `None` for an unknown battery; the held locks are released.
    pub(crate) fn battery(self, battery: BatteryId) -> Option<BatteryTransaction<'a>> {
        let guard = self.locks.battery_mutex(battery)?.lock();
        Some(BatteryTransaction {
            battery: guard,
            robots: self.robots,
            grid: self.grid,
        })
    }

    /// Acquires `battery_lock[k]`, releasing everything held if it times out.
    pub(crate) fn battery_within(
        self,
        battery: BatteryId,
        timeout: Duration,
    ) -> Result<Option<BatteryTransaction<'a>>, LockTimeout> {
        let Some(mutex) = self.locks.battery_mutex(battery) else {
            return Ok(None);
        };
        let guard = acquire_within(mutex, Resource::Battery(battery), timeout)?;
        Ok(Some(BatteryTransaction {
            battery: guard,
            robots: self.robots,
            grid: self.grid,
        }))
    }

    /// Acquires every battery lock in increasing index order.
    pub(crate) fn all_batteries(self) -> AuditTransaction<'a> {
        let batteries = self
            .locks
            .batteries
            .iter()
            .map(|mutex| mutex.lock())
            .collect();
        AuditTransaction {
            batteries,
            robots: self.robots,
            grid: self.grid,
        }
    }
}

/// Holds `grid_lock`, `robots_lock` and one `battery_lock[k]`.
pub(crate) struct BatteryTransaction<'a> {
    pub(crate) battery: MutexGuard<'a, Battery>,
    pub(crate) robots: MutexGuard<'a, RobotTable>,
    pub(crate) grid: MutexGuard<'a, Grid>,
}

/// Holds `grid_lock`, `robots_lock` and every battery lock.
pub(crate) struct AuditTransaction<'a> {
    pub(crate) batteries: Vec<MutexGuard<'a, Battery>>,
    pub(crate) robots: MutexGuard<'a, RobotTable>,
    pub(crate) grid: MutexGuard<'a, Grid>,
}

impl Drop for AuditTransaction<'_> {
    fn drop(&mut self) {
        // Vec drops front to back; release the highest battery index first.
        while let Some(guard) = self.batteries.pop() {
            drop(guard);
        }
    }
}

/// Holds `robots_lock` alone: the critical section for housekeeping.
pub(crate) struct RobotsStage<'a> {
    pub(crate) robots: MutexGuard<'a, RobotTable>,
}

/// Holds a battery lock acquired ahead of the grid lock.
pub(crate) struct MisorderedStage<'a> {
    locks: &'a LockManager,
    battery: MutexGuard<'a, Battery>,
}

impl<'a> MisorderedStage<'a> {
    /// Climbs from the battery lock to `grid_lock` and then `robots_lock`.
    ///
    /// Either timeout releases everything acquired so far.
    pub(crate) fn grid_and_robots_within(
        self,
        timeout: Duration,
    ) -> Result<MisorderedTransaction<'a>, LockTimeout> {
        let grid = acquire_within(&self.locks.grid, Resource::Grid, timeout)?;
        let robots = acquire_within(&self.locks.robots, Resource::Robots, timeout)?;
        Ok(MisorderedTransaction {
            robots,
            grid,
            battery: self.battery,
        })
    }
}

/// Holds a battery lock, `grid_lock` and `robots_lock`, acquired in that order.
pub(crate) struct MisorderedTransaction<'a> {
    pub(crate) robots: MutexGuard<'a, RobotTable>,
    pub(crate) grid: MutexGuard<'a, Grid>,
    pub(crate) battery: MutexGuard<'a, Battery>,
}
