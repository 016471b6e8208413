#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative shared state for the robot arena.
//!
//! The [`Arena`] owns the grid, the robot table, the battery table and the
//! control flags. Every mutation runs as a transaction that acquires its locks
//! in the order `init -> grid -> robots -> battery[k]` and releases them in
//! reverse. After each committed transaction the arena publishes an immutable
//! [`query::ArenaSnapshot`] which readers obtain without touching the core
//! locks.

mod audit;
mod housekeeping;
mod layout;
mod locks;
mod misordered;
pub mod query;
mod state;
mod transaction;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use robot_arena_core::{
    ArenaConfig, BatteryId, BatteryState, Cell, CellCoord, ConfigError, InvariantViolation,
    Outcome, RobotId, RobotStatus,
};

use crate::{
    locks::LockManager,
    query::{ArenaSnapshot, BatteryPatch, BatterySnapshot, RobotSnapshot},
    state::{Battery, Grid, Robot, RobotTable},
};

pub use housekeeping::{metabolic_cost, Metabolism};
pub use layout::{Layout, RobotSeed};
pub use locks::{LockTimeout, Resource};
pub use misordered::{BoundedCollect, LockOrder, TransactionError};
pub use transaction::ActOutcome;

/// Result of a call to [`Arena::ensure_initialized`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Initialization {
    /// This caller performed the one-time setup.
    Performed,
    /// Another caller had already performed the setup.
    AlreadyDone,
}

/// Shared arena state guarded by the lock manager.
#[derive(Debug)]
pub struct Arena {
    config: ArenaConfig,
    seed: u64,
    locks: LockManager,
    board: RwLock<Arc<ArenaSnapshot>>,
    initialized: AtomicBool,
    outcome: OnceLock<Outcome>,
    halt: OnceLock<InvariantViolation>,
}

impl Arena {
    /// Validates the configuration and rolls a layout from its seed.
    ///
    /// A random seed is drawn when the configuration does not provide one.
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let layout = Layout::generate(&config, &mut rng);
        Self::build(config, seed, layout)
    }

    /// Creates an arena that installs the provided layout instead of a rolled one.
    ///
    /// The entity counts of `config` are replaced by the counts of `layout`.
    /// Placed robots may start with any energy in `1..=MAX_ENERGY`; only rolled
    /// robots are held to the configured energy range.
    pub fn with_layout(config: ArenaConfig, layout: Layout) -> Result<Self, ConfigError> {
        let config = ArenaConfig {
            robot_count: entity_count(layout.robots.len())?,
            battery_count: entity_count(layout.batteries.len())?,
            barrier_count: entity_count(layout.barriers.len())?,
            ..config
        };
        config.validate()?;
        layout.validate(&config)?;
        let seed = config.seed.unwrap_or_else(rand::random);
        Self::build(config, seed, layout)
    }

    fn build(config: ArenaConfig, seed: u64, layout: Layout) -> Result<Self, ConfigError> {
        let batteries = layout
            .batteries
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                Ok(Battery {
                    id: BatteryId::new(entity_count(index)?),
                    cell: *cell,
                    state: BatteryState::Available,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let grid = Grid::new(config.columns, config.rows);
        let board = ArenaSnapshot::empty(config.columns, config.rows);

        Ok(Self {
            locks: LockManager::new(grid, batteries, layout),
            board: RwLock::new(Arc::new(board)),
            initialized: AtomicBool::new(false),
            outcome: OnceLock::new(),
            halt: OnceLock::new(),
            config,
            seed,
        })
    }

    /// Performs the one-time setup unless another caller already did.
    ///
    /// Acquires `init_lock -> grid_lock -> robots_lock`. Callers that lose the
    /// race observe the done flag and skip the setup.
    pub fn ensure_initialized(&self) -> Result<Initialization, InvariantViolation> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(Initialization::AlreadyDone);
        }

        let stage = self.locks.init();
        if stage.gate.done {
            return Ok(Initialization::AlreadyDone);
        }

        let mut txn = stage.grid_and_robots();
        let layout = txn
            .gate
            .layout
            .take()
            .ok_or_else(|| InvariantViolation::new("arena layout was consumed twice"))?;
        if !txn.robots.is_empty() {
            return Err(InvariantViolation::new(
                "robot table was populated before initialization",
            ));
        }
        if layout.batteries.len() != self.locks.battery_count() {
            return Err(InvariantViolation::new(
                "battery locks do not match the battery layout",
            ));
        }

        let grid = &mut *txn.grid;
        let robots = &mut *txn.robots;
        for row in 0..self.config.rows {
            for column in 0..self.config.columns {
                let cell = CellCoord::new(column, row);
                if grid.is_perimeter(cell) {
                    grid.set(cell, Cell::Barrier)?;
                }
            }
        }
        for cell in &layout.barriers {
            grid.swap(*cell, Cell::Empty, Cell::Barrier)?;
        }

        let mut batteries = Vec::with_capacity(layout.batteries.len());
        for (index, cell) in layout.batteries.iter().enumerate() {
            let id = BatteryId::new(table_index(index)?);
            grid.swap(*cell, Cell::Empty, Cell::Battery(id))?;
            batteries.push(BatterySnapshot {
                id,
                cell: *cell,
                state: BatteryState::Available,
            });
        }

        for (index, seed) in layout.robots.iter().enumerate() {
            let id = RobotId::new(table_index(index)?);
            grid.swap(seed.cell, Cell::Empty, Cell::Robot(id))?;
            robots.push(Robot {
                id,
                attributes: seed.attributes,
                cell: seed.cell,
                status: RobotStatus::Alive,
            });
        }

        txn.gate.done = true;
        self.initialized.store(true, Ordering::Release);
        self.publish(
            Some(&*txn.grid),
            &txn.robots,
            BatteryPatch::Installed(batteries),
        );
        tracing::info!(
            seed = self.seed,
            robots = layout.robots.len(),
            batteries = layout.batteries.len(),
            barriers = layout.barriers.len(),
            "arena initialized"
        );
        Ok(Initialization::Performed)
    }

    /// Latest published snapshot. Never blocks on the core locks.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ArenaSnapshot> {
        Arc::clone(&*self.board.read())
    }

    /// Terminal result, once decided.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.get().copied()
    }

    /// Reports whether the game reached its terminal state.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Reports whether the one-time setup has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Stops the whole run after an invariant violation. Only the first violation is kept.
    pub fn halt(&self, violation: InvariantViolation) {
        tracing::error!(detail = violation.detail(), "halting arena");
        let _ = self.halt.set(violation);
    }

    /// Violation that halted the run, if any.
    #[must_use]
    pub fn halted(&self) -> Option<&InvariantViolation> {
        self.halt.get()
    }

    /// Configuration the arena was created from.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Seed that produced the layout.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Identifiers of every robot in the arena.
    pub fn robot_ids(&self) -> impl Iterator<Item = RobotId> {
        (0..self.config.robot_count).map(RobotId::new)
    }

    fn ensure_running(&self) -> Result<(), InvariantViolation> {
        match self.halted() {
            Some(violation) => Err(violation.clone()),
            None => Ok(()),
        }
    }

    /// Replaces the board. Requires `robots_lock`, which serializes publishers.
    ///
    /// `grid` must be passed whenever the caller also holds `grid_lock`.
    fn publish(&self, grid: Option<&Grid>, robots: &RobotTable, batteries: BatteryPatch) {
        let previous = self.snapshot();
        let (columns, rows) = grid.map_or((previous.columns, previous.rows), Grid::dimensions);
        let cells = grid.map_or_else(|| previous.cells.clone(), |grid| grid.cells().to_vec());
        let robots = robots
            .iter()
            .map(|robot| RobotSnapshot {
                id: robot.id,
                cell: robot.cell,
                attributes: robot.attributes,
                status: robot.status,
                player: robot.is_player(),
            })
            .collect();
        let batteries = match batteries {
            BatteryPatch::Unchanged => previous.batteries.clone(),
            BatteryPatch::Installed(batteries) => batteries,
            BatteryPatch::Collected(collected) => {
                let mut batteries = previous.batteries.clone();
                if let Some(slot) = batteries.get_mut(collected.id.index()) {
                    *slot = collected;
                }
                batteries
            }
        };

        let next = ArenaSnapshot {
            version: previous.version.saturating_add(1),
            columns,
            rows,
            cells,
            robots,
            batteries,
            outcome: self.outcome(),
            initialized: self.is_initialized(),
        };
        *self.board.write() = Arc::new(next);
    }
}

fn entity_count(len: usize) -> Result<u32, ConfigError> {
    u32::try_from(len)
        .map_err(|_| ConfigError::InvalidLayout(format!("{len} entities exceed the id space")))
}

fn table_index(index: usize) -> Result<u32, InvariantViolation> {
    u32::try_from(index)
        .map_err(|_| InvariantViolation::new(format!("table index {index} exceeds the id space")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ArenaConfig {
        ArenaConfig {
            columns: 12,
            rows: 8,
            robot_count: 5,
            battery_count: 6,
            barrier_count: 4,
            seed: Some(21),
            ..ArenaConfig::default()
        }
    }

    #[test]
    fn construction_rejects_invalid_configuration() {
        let config = ArenaConfig {
            robot_count: 2,
            ..ArenaConfig::default()
        };

        assert!(matches!(
            Arena::new(config),
            Err(ConfigError::TooFewRobots { requested: 2, .. })
        ));

        let oversized = ArenaConfig {
            columns: u32::MAX,
            rows: u32::MAX,
            battery_count: 0,
            barrier_count: 0,
            ..ArenaConfig::default()
        };
        assert!(matches!(
            Arena::new(oversized),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn nothing_is_published_before_initialization() {
        let arena = Arena::new(config()).expect("configuration is valid");
        let snapshot = arena.snapshot();

        assert!(!arena.is_initialized());
        assert!(!snapshot.initialized);
        assert!(snapshot.robots.is_empty());
        assert!(snapshot.cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn initialization_installs_the_layout_once() {
        let arena = Arena::new(config()).expect("configuration is valid");

        assert_eq!(arena.ensure_initialized(), Ok(Initialization::Performed));
        assert_eq!(arena.ensure_initialized(), Ok(Initialization::AlreadyDone));

        let snapshot = arena.snapshot();
        assert!(snapshot.initialized);
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.robots.len(), 5);
        assert_eq!(snapshot.batteries.len(), 6);
        assert!(snapshot.robots[0].player);
        assert!(snapshot.robots[1..].iter().all(|robot| !robot.player));

        let barriers = snapshot
            .cells
            .iter()
            .filter(|cell| **cell == Cell::Barrier)
            .count();
        let perimeter = 2 * 12 + 2 * 8 - 4;
        assert_eq!(barriers, perimeter + 4);
        for robot in &snapshot.robots {
            assert_eq!(snapshot.cell(robot.cell), Some(Cell::Robot(robot.id)));
        }
        assert_eq!(arena.audit(), Ok(()));
    }

    #[test]
    fn seeded_arenas_share_a_layout() {
        let first = Arena::new(config()).expect("configuration is valid");
        let second = Arena::new(config()).expect("configuration is valid");
        let _ = first.ensure_initialized().expect("setup succeeds");
        let _ = second.ensure_initialized().expect("setup succeeds");

        assert_eq!(first.seed(), 21);
        assert_eq!(first.snapshot().cells, second.snapshot().cells);
        assert_eq!(first.snapshot().robots, second.snapshot().robots);
    }

    #[test]
    fn explicit_layouts_override_entity_counts() {
        let layout = Layout {
            barriers: vec![CellCoord::new(5, 5)],
            robots: (1..=4)
                .map(|column| RobotSeed {
                    cell: CellCoord::new(column, 1),
                    attributes: robot_arena_core::RobotAttributes {
                        force: 1,
                        energy: 10,
                        velocity: 1,
                    },
                })
                .collect(),
            batteries: Vec::new(),
        };

        let arena = Arena::with_layout(ArenaConfig::default(), layout).expect("layout is valid");

        assert_eq!(arena.config().robot_count, 4);
        assert_eq!(arena.config().battery_count, 0);
        assert_eq!(arena.config().barrier_count, 1);
        assert_eq!(arena.robot_ids().count(), 4);
    }

    #[test]
    fn halting_keeps_the_first_violation() {
        let arena = Arena::new(config()).expect("configuration is valid");

        arena.halt(InvariantViolation::new("first"));
        arena.halt(InvariantViolation::new("second"));

        assert_eq!(arena.halted().map(InvariantViolation::detail), Some("first"));
        assert!(arena.ensure_running().is_err());
    }
}
