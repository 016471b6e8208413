#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure duel resolution between two adjacent robots.
//!
//! The resolver never touches shared state. The world calls it while already
//! holding the grid and robot locks and applies the returned outcome inside
//! the same critical section.

use robot_arena_core::{DuelOutcome, RobotId};

/// Attributes of one side of a duel, read under the held robot lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contestant {
    /// Identifier of the contesting robot.
    pub id: RobotId,
    /// Force of the contesting robot.
    pub force: u32,
    /// Energy of the contesting robot.
    pub energy: u32,
}

impl Contestant {
    /// Power of this contestant.
    #[must_use]
    pub fn power(&self) -> u32 {
        power(self.force, self.energy)
    }
}

/// Duel power: twice the force plus the current energy.
#[must_use]
pub fn power(force: u32, energy: u32) -> u32 {
    force.saturating_mul(2).saturating_add(energy)
}

/// Compares both contestants; strictly greater power wins, equal power kills both.
#[must_use]
pub fn resolve(challenger: Contestant, defender: Contestant) -> DuelOutcome {
    let challenger_power = challenger.power();
    let defender_power = defender.power();

    if challenger_power > defender_power {
        DuelOutcome::Victory {
            winner: challenger.id,
            loser: defender.id,
            winner_power: challenger_power,
            loser_power: defender_power,
        }
    } else if defender_power > challenger_power {
        DuelOutcome::Victory {
            winner: defender.id,
            loser: challenger.id,
            winner_power: defender_power,
            loser_power: challenger_power,
        }
    } else {
        DuelOutcome::Stalemate {
            challenger: challenger.id,
            defender: defender.id,
            power: challenger_power,
        }
    }
}
