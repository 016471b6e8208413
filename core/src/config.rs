//! Initial configuration surface consumed once when the arena is created.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MIN_ROBOTS;

const DEFAULT_COLUMNS: u32 = 40;
const DEFAULT_ROWS: u32 = 20;
const DEFAULT_BATTERY_COUNT: u32 = 20;
const DEFAULT_BARRIER_COUNT: u32 = 24;
const MIN_GRID_EDGE: u32 = 3;
const MAX_GRID_EDGE: u32 = 1024;

/// Absolute limits for rolled force values.
pub const FORCE_BOUNDS: AttributeRange = AttributeRange::new(1, 10);
/// Absolute limits for rolled initial energy values.
pub const ENERGY_BOUNDS: AttributeRange = AttributeRange::new(10, 100);
/// Absolute limits for rolled velocity values.
pub const VELOCITY_BOUNDS: AttributeRange = AttributeRange::new(1, 5);

/// Inclusive range used when rolling a robot attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRange {
    /// Smallest value that may be rolled.
    pub min: u32,
    /// Largest value that may be rolled.
    pub max: u32,
}

impl AttributeRange {
    /// Creates a new inclusive range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Reports whether `value` lies within the range.
    #[must_use]
    pub const fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, attribute: &'static str, bounds: AttributeRange) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::EmptyRange {
                attribute,
                min: self.min,
                max: self.max,
            });
        }

        if !bounds.contains(self.min) || !bounds.contains(self.max) {
            return Err(ConfigError::RangeOutOfBounds {
                attribute,
                min: self.min,
                max: self.max,
                lower: bounds.min,
                upper: bounds.max,
            });
        }

        Ok(())
    }
}

/// Parameters consumed once when the shared arena is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Number of grid columns, including the perimeter wall.
    pub columns: u32,
    /// Number of grid rows, including the perimeter wall.
    pub rows: u32,
    /// Number of robots; robot 0 is the player robot.
    pub robot_count: u32,
    /// Number of batteries placed at initialization.
    pub battery_count: u32,
    /// Number of interior barrier cells placed on top of the perimeter wall.
    pub barrier_count: u32,
    /// Range rolled for each robot's force.
    pub force: AttributeRange,
    /// Range rolled for each robot's initial energy.
    pub energy: AttributeRange,
    /// Range rolled for each robot's velocity.
    pub velocity: AttributeRange,
    /// Seed for the initialization RNG; a random seed is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            robot_count: MIN_ROBOTS,
            battery_count: DEFAULT_BATTERY_COUNT,
            barrier_count: DEFAULT_BARRIER_COUNT,
            force: FORCE_BOUNDS,
            energy: ENERGY_BOUNDS,
            velocity: VELOCITY_BOUNDS,
            seed: None,
        }
    }
}

impl ArenaConfig {
    /// Rejects configurations that cannot produce a playable arena.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns < MIN_GRID_EDGE || self.rows < MIN_GRID_EDGE {
            return Err(ConfigError::GridTooSmall {
                columns: self.columns,
                rows: self.rows,
            });
        }
        if self.columns > MAX_GRID_EDGE || self.rows > MAX_GRID_EDGE {
            return Err(ConfigError::GridTooLarge {
                columns: self.columns,
                rows: self.rows,
                maximum: MAX_GRID_EDGE,
            });
        }

        if self.robot_count < MIN_ROBOTS {
            return Err(ConfigError::TooFewRobots {
                requested: self.robot_count,
                minimum: MIN_ROBOTS,
            });
        }

        self.force.check("force", FORCE_BOUNDS)?;
        self.energy.check("energy", ENERGY_BOUNDS)?;
        self.velocity.check("velocity", VELOCITY_BOUNDS)?;

        let requested = u64::from(self.robot_count)
            + u64::from(self.battery_count)
            + u64::from(self.barrier_count);
        let available = self.interior_cells();
        if requested > available {
            return Err(ConfigError::Overcrowded {
                requested,
                available,
            });
        }

        Ok(())
    }

    /// Number of cells inside the perimeter wall.
    #[must_use]
    pub fn interior_cells(&self) -> u64 {
        u64::from(self.columns.saturating_sub(2)) * u64::from(self.rows.saturating_sub(2))
    }
}

/// Reasons a configuration is rejected before any shared state is created.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The grid cannot hold a perimeter wall and an interior.
    #[error("grid {columns}x{rows} is too small; both edges need at least 3 cells")]
    GridTooSmall {
        /// Requested number of columns.
        columns: u32,
        /// Requested number of rows.
        rows: u32,
    },
    /// The grid exceeds the largest edge the arena allocates.
    #[error("grid {columns}x{rows} is too large; neither edge may exceed {maximum} cells")]
    GridTooLarge {
        /// Requested number of columns.
        columns: u32,
        /// Requested number of rows.
        rows: u32,
        /// Largest accepted edge.
        maximum: u32,
    },
    /// Fewer robots than the arena requires.
    #[error("{requested} robots requested but at least {minimum} are required")]
    TooFewRobots {
        /// Requested robot count.
        requested: u32,
        /// Minimum robot count.
        minimum: u32,
    },
    /// An attribute range has its bounds inverted.
    #[error("{attribute} range {min}..={max} is empty")]
    EmptyRange {
        /// Attribute the range configures.
        attribute: &'static str,
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
    },
    /// An attribute range exceeds the absolute limits.
    #[error("{attribute} range {min}..={max} must lie within {lower}..={upper}")]
    RangeOutOfBounds {
        /// Attribute the range configures.
        attribute: &'static str,
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
        /// Absolute lower limit.
        lower: u32,
        /// Absolute upper limit.
        upper: u32,
    },
    /// More robots, batteries and barriers than interior cells.
    #[error("{requested} entities requested but only {available} interior cells exist")]
    Overcrowded {
        /// Number of cells the entities need.
        requested: u64,
        /// Number of interior cells.
        available: u64,
    },
    /// An explicit layout conflicts with the grid or with itself.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}
