#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Robot agents that compete inside a shared arena.
//!
//! Every robot runs two threads: a sense-act loop that decides from the latest
//! snapshot and commits through the arena's transactions, and a lower
//! frequency housekeeping loop that drains energy and checks the win
//! condition. The [`Simulation`] spawns both for every robot and joins them
//! once the game is decided.

mod agent;
mod decide;
mod player;
mod tuning;

use std::{fmt, io, sync::Arc, thread};

use robot_arena_core::{InvariantViolation, Outcome, RobotId};
use robot_arena_world::Arena;
use thiserror::Error;

use crate::agent::Agent;

pub use decide::{decide, steer};
pub use player::PlayerInput;
pub use tuning::{AgentTuning, Backoff};

/// Concurrent activity run on behalf of a robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Activity {
    /// Sense, decide, act.
    SenseAct,
    /// Metabolic drain and win-condition check.
    Housekeeping,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::SenseAct => f.write_str("sense-act"),
            Activity::Housekeeping => f.write_str("housekeeping"),
        }
    }
}

/// Reasons a simulation run ends without an outcome.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Shared state was corrupted; the arena was halted.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    /// The operating system refused to start an agent thread.
    #[error("failed to spawn the {activity} thread of {robot}")]
    Spawn {
        /// Robot the thread belonged to.
        robot: RobotId,
        /// Activity the thread would have run.
        activity: Activity,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },
    /// An agent thread panicked.
    #[error("the {activity} thread of {robot} panicked")]
    Panicked {
        /// Robot the thread belonged to.
        robot: RobotId,
        /// Activity the thread ran.
        activity: Activity,
    },
    /// Every agent stopped before the game was decided.
    #[error("all agents stopped before the game was decided")]
    Undecided,
}

/// Runs one agent pair per robot until the game is decided.
#[derive(Debug, Default)]
pub struct Simulation {
    tuning: AgentTuning,
    player: Option<Arc<PlayerInput>>,
}

impl Simulation {
    /// Creates a simulation whose robots are all autonomous.
    #[must_use]
    pub fn new(tuning: AgentTuning) -> Self {
        Self {
            tuning,
            player: None,
        }
    }

    /// Hands the player robot to an external steering handler.
    #[must_use]
    pub fn with_player_input(mut self, input: Arc<PlayerInput>) -> Self {
        self.player = Some(input);
        self
    }

    /// Steering handle of the player robot, when one is attached.
    #[must_use]
    pub fn player_input(&self) -> Option<&Arc<PlayerInput>> {
        self.player.as_ref()
    }

    /// Tuning shared by every agent.
    #[must_use]
    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    /// Spawns every agent, blocks until all of them stop and reports the outcome.
    ///
    /// The arena is initialized by whichever agent gets there first. After
    /// all agents stop, the arena is audited; a failed audit halts it.
    pub fn run(&self, arena: &Arena) -> Result<Outcome, SimulationError> {
        tracing::info!(
            robots = arena.config().robot_count,
            fault_injection = self.tuning.fault_injection,
            "starting simulation"
        );

        thread::scope(|scope| {
            let mut handles = Vec::new();
            for robot in arena.robot_ids() {
                for activity in [Activity::SenseAct, Activity::Housekeeping] {
                    let agent = Agent::new(arena, robot, &self.tuning, self.player.as_deref());
                    let spawned = thread::Builder::new()
                        .name(format!("{robot}-{activity}"))
                        .spawn_scoped(scope, move || match activity {
                            Activity::SenseAct => agent.sense_act(),
                            Activity::Housekeeping => agent.housekeeping(),
                        });
                    match spawned {
                        Ok(handle) => handles.push((robot, activity, handle)),
                        Err(source) => {
                            arena.halt(InvariantViolation::new(format!(
                                "could not start the {activity} thread of {robot}"
                            )));
                            return Err(SimulationError::Spawn {
                                robot,
                                activity,
                                source,
                            });
                        }
                    }
                }
            }

            let mut failure = None;
            for (robot, activity, handle) in handles {
                let result = match handle.join() {
                    Ok(Ok(())) => continue,
                    Ok(Err(violation)) => SimulationError::Invariant(violation),
                    Err(_) => {
                        arena.halt(InvariantViolation::new(format!(
                            "the {activity} thread of {robot} panicked"
                        )));
                        SimulationError::Panicked { robot, activity }
                    }
                };
                let _ = failure.get_or_insert(result);
            }
            failure.map_or(Ok(()), Err)
        })?;

        if let Some(violation) = arena.halted() {
            return Err(SimulationError::Invariant(violation.clone()));
        }
        if let Err(violation) = arena.audit() {
            arena.halt(violation.clone());
            return Err(SimulationError::Invariant(violation));
        }

        let Some(outcome) = arena.outcome() else {
            arena.halt(InvariantViolation::new(
                "all agents stopped before the game was decided",
            ));
            return Err(SimulationError::Undecided);
        };
        match outcome {
            Outcome::Winner(winner) => tracing::info!(%winner, "simulation finished"),
            Outcome::NoSurvivors => tracing::info!("simulation finished without survivors"),
        }
        Ok(outcome)
    }
}
