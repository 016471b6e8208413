//! Placement of barriers, batteries and robots applied by the one-time setup.

use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use robot_arena_core::{
    ArenaConfig, AttributeRange, CellCoord, ConfigError, RobotAttributes, FORCE_BOUNDS,
    MAX_ENERGY, MIN_ROBOTS, VELOCITY_BOUNDS,
};

/// Energy accepted for explicitly placed robots.
///
/// Rolled robots start within the configured energy range, which never drops
/// below [`robot_arena_core::ENERGY_BOUNDS`]. Explicit layouts stage mid-game
/// positions, so any live energy level is accepted for them.
const PLACED_ENERGY_BOUNDS: AttributeRange = AttributeRange::new(1, MAX_ENERGY);

/// Starting cell and rolled attributes for a single robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RobotSeed {
    /// Interior cell the robot starts on.
    pub cell: CellCoord,
    /// Attributes the robot starts with.
    pub attributes: RobotAttributes,
}

/// Complete arena population installed during initialization.
///
/// Robot identifiers and battery identifiers follow vector order; the robot at
/// index 0 is the player robot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    /// Interior barrier cells placed in addition to the perimeter wall.
    pub barriers: Vec<CellCoord>,
    /// Robots in identifier order.
    pub robots: Vec<RobotSeed>,
    /// Battery cells in identifier order.
    pub batteries: Vec<CellCoord>,
}

impl Layout {
    /// Rolls a random layout for an already validated configuration.
    pub fn generate<R>(config: &ArenaConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut cells = interior_cells(config.columns, config.rows);
        cells.shuffle(rng);
        let mut cells = cells.into_iter();

        let barriers = cells.by_ref().take(count(config.barrier_count)).collect();
        let robots = cells
            .by_ref()
            .take(count(config.robot_count))
            .map(|cell| RobotSeed {
                cell,
                attributes: RobotAttributes {
                    force: roll(rng, config.force),
                    energy: roll(rng, config.energy),
                    velocity: roll(rng, config.velocity),
                },
            })
            .collect();
        let batteries = cells.take(count(config.battery_count)).collect();

        Self {
            barriers,
            robots,
            batteries,
        }
    }

    /// Rejects layouts that overlap, leave the interior, or roll impossible attributes.
    pub fn validate(&self, config: &ArenaConfig) -> Result<(), ConfigError> {
        if self.robots.len() < count(MIN_ROBOTS) {
            return Err(ConfigError::TooFewRobots {
                requested: u32::try_from(self.robots.len()).unwrap_or(u32::MAX),
                minimum: MIN_ROBOTS,
            });
        }

        let placed = self
            .barriers
            .iter()
            .chain(self.robots.iter().map(|seed| &seed.cell))
            .chain(self.batteries.iter());
        let mut seen = HashSet::new();
        for cell in placed {
            let inside = cell.column() > 0
                && cell.row() > 0
                && cell.column() + 1 < config.columns
                && cell.row() + 1 < config.rows;
            if !inside {
                return Err(ConfigError::InvalidLayout(format!(
                    "cell {cell} is not an interior cell of a {}x{} grid",
                    config.columns, config.rows
                )));
            }
            if !seen.insert(*cell) {
                return Err(ConfigError::InvalidLayout(format!(
                    "cell {cell} is claimed more than once"
                )));
            }
        }

        for (index, seed) in self.robots.iter().enumerate() {
            let attributes = seed.attributes;
            let valid = FORCE_BOUNDS.contains(attributes.force)
                && PLACED_ENERGY_BOUNDS.contains(attributes.energy)
                && VELOCITY_BOUNDS.contains(attributes.velocity);
            if !valid {
                return Err(ConfigError::InvalidLayout(format!(
                    "robot {index} has out-of-range attributes {attributes:?}"
                )));
            }
        }

        Ok(())
    }
}

fn interior_cells(columns: u32, rows: u32) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    for row in 1..rows.saturating_sub(1) {
        for column in 1..columns.saturating_sub(1) {
            cells.push(CellCoord::new(column, row));
        }
    }
    cells
}

fn count(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn roll<R>(rng: &mut R, range: AttributeRange) -> u32
where
    R: Rng + ?Sized,
{
    rng.gen_range(range.min..=range.max)
}
