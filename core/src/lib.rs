#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the robot arena.
//!
//! This crate defines the vocabulary that connects robot agents, the shared
//! arena state, and read-only adapters. Agents decide an [`Intent`] from a
//! possibly stale snapshot, the world revalidates and commits it inside a
//! locked transaction, and then reports the committed effects as [`Event`]
//! values. Nothing in this crate owns threads or locks.

mod config;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{
    ArenaConfig, AttributeRange, ConfigError, ENERGY_BOUNDS, FORCE_BOUNDS, VELOCITY_BOUNDS,
};

/// Upper bound for any robot's energy.
pub const MAX_ENERGY: u32 = 100;

/// Energy granted by a single battery before capping at [`MAX_ENERGY`].
pub const BATTERY_BOOST: u32 = 20;

/// Energy spent for each committed cell step.
pub const MOVE_COST: u32 = 1;

/// Minimum number of robots an arena must host.
pub const MIN_ROBOTS: u32 = 4;

/// Identifier of the robot driven by the external player handler.
pub const PLAYER_ROBOT: RobotId = RobotId::new(0);

/// Cardinal directions available to robots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Every direction in a fixed clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Reports whether the two cells share an edge.
    #[must_use]
    pub fn is_adjacent(self, other: CellCoord) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Returns the neighbouring cell in the provided direction.
    ///
    /// Yields `None` when the step would leave the non-negative quadrant; the
    /// caller is responsible for checking the far grid bounds.
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        match direction {
            Direction::North => self.row.checked_sub(1).map(|row| Self::new(self.column, row)),
            Direction::East => self
                .column
                .checked_add(1)
                .map(|column| Self::new(column, self.row)),
            Direction::South => self.row.checked_add(1).map(|row| Self::new(self.column, row)),
            Direction::West => self
                .column
                .checked_sub(1)
                .map(|column| Self::new(column, self.row)),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Unique identifier assigned to a robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotId(u32);

impl RobotId {
    /// Creates a new robot identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the robot within the robot table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot-{}", self.0)
    }
}

/// Unique identifier assigned to a battery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatteryId(u32);

impl BatteryId {
    /// Creates a new battery identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the battery within the battery table and lock set.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BatteryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "battery-{}", self.0)
    }
}

/// Contents of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Nothing occupies the cell.
    #[default]
    Empty,
    /// Fixed obstacle that never changes after initialization.
    Barrier,
    /// An available battery rests on the cell.
    Battery(BatteryId),
    /// A live robot occupies the cell.
    Robot(RobotId),
}

impl Cell {
    /// Reports whether the cell can be entered by a moving robot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// Lifecycle status of a robot. Transitions only from alive to dead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotStatus {
    /// The robot participates in play.
    Alive,
    /// The robot lost a duel or ran out of energy and remains as an inert record.
    Dead,
}

/// Tunable attributes rolled for each robot at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RobotAttributes {
    /// Force used when computing duel power.
    pub force: u32,
    /// Remaining energy; the robot dies when it reaches zero.
    pub energy: u32,
    /// Maximum number of move attempts per sense-act cycle.
    pub velocity: u32,
}

/// Lifecycle state of a battery. Transitions only from available to collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatteryState {
    /// The battery rests on its cell and may be collected.
    Available,
    /// The battery was collected and removed from play for good.
    Collected {
        /// Robot that collected the battery.
        by: RobotId,
    },
}

impl BatteryState {
    /// Reports whether the battery may still be collected.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, BatteryState::Available)
    }
}

/// Action chosen by a robot during its decide phase.
///
/// Intents are decided from an unsynchronized snapshot and therefore carry
/// the expectation they were based on; the world re-checks it under lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Step one cell in the provided direction into an empty cell.
    Move {
        /// Direction of travel.
        direction: Direction,
    },
    /// Collect the battery expected to rest on an adjacent cell.
    Collect {
        /// Battery the robot expects to find.
        battery: BatteryId,
        /// Cell the battery was observed on.
        cell: CellCoord,
    },
    /// Challenge the live robot expected to occupy an adjacent cell.
    Duel {
        /// Robot the actor expects to fight.
        opponent: RobotId,
        /// Cell the opponent was observed on.
        cell: CellCoord,
    },
}

/// Why a decided intent no longer held once the transaction revalidated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StaleReason {
    /// The acting robot died before its transaction ran.
    ActorDead,
    /// The game already has an outcome.
    GameOver,
    /// The target cell lies outside the grid.
    OutOfBounds,
    /// The target cell no longer matches what the snapshot showed.
    TargetChanged,
    /// The target is not orthogonally adjacent to the acting robot.
    NotAdjacent,
    /// Another robot collected the battery first.
    BatteryCollected,
    /// The opponent died before the duel could start.
    OpponentDead,
    /// The robot has no energy left to pay for a step.
    NoEnergy,
}

/// Result of a duel between two adjacent robots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DuelOutcome {
    /// One contestant had strictly greater power.
    Victory {
        /// Robot that survives unchanged.
        winner: RobotId,
        /// Robot that dies and releases its cell.
        loser: RobotId,
        /// Power computed for the winner.
        winner_power: u32,
        /// Power computed for the loser.
        loser_power: u32,
    },
    /// Both contestants had equal power and both die.
    Stalemate {
        /// Robot that initiated the duel.
        challenger: RobotId,
        /// Robot that was challenged.
        defender: RobotId,
        /// Power shared by both contestants.
        power: u32,
    },
}

/// Terminal result of a simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Exactly one robot remains alive.
    Winner(RobotId),
    /// No robot remains alive.
    NoSurvivors,
}

/// Events broadcast by the world after committing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A robot moved between two adjacent cells.
    RobotMoved {
        /// Robot that moved.
        robot: RobotId,
        /// Cell the robot left.
        from: CellCoord,
        /// Cell the robot entered.
        to: CellCoord,
        /// Energy remaining after paying for the step.
        energy: u32,
    },
    /// A robot collected a battery.
    BatteryCollected {
        /// Robot that collected the battery.
        robot: RobotId,
        /// Battery that left play.
        battery: BatteryId,
        /// Energy after the capped boost.
        energy: u32,
    },
    /// A duel was resolved.
    DuelResolved {
        /// Result of the power comparison.
        outcome: DuelOutcome,
    },
    /// Housekeeping drained a robot's energy.
    EnergyDrained {
        /// Robot that paid the metabolic cost.
        robot: RobotId,
        /// Energy remaining afterwards.
        energy: u32,
    },
    /// A robot died from running out of energy.
    RobotExhausted {
        /// Robot that died.
        robot: RobotId,
        /// Cell the robot released.
        cell: CellCoord,
    },
    /// The game reached its terminal state.
    OutcomeDecided {
        /// Final result.
        outcome: Outcome,
    },
}

/// A cross-entity invariant failed, which indicates a locking protocol bug.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("arena invariant violated: {detail}")]
pub struct InvariantViolation {
    detail: String,
}

impl InvariantViolation {
    /// Creates a violation carrying the provided diagnostic.
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// Diagnostic describing the violated invariant.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}
