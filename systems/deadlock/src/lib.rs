#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! On-demand circular wait between two collectors, and its recovery.
//!
//! Two robots adjacent to the same battery collect it at the same time. One
//! takes `battery_lock[k]` before `grid_lock`, the other follows the mandated
//! order. Both hold their first lock before reaching for the second, which
//! closes the cycle. Every acquisition is bounded: a timeout releases what the
//! attempt holds, the robot backs off for a random delay and then senses
//! again before retrying.

mod rendezvous;
mod report;

use std::{thread, time::Duration};

use robot_arena_core::{
    ArenaConfig, BatteryId, CellCoord, ConfigError, InvariantViolation, RobotAttributes,
    RobotId, StaleReason,
};
use robot_arena_system_agent::Backoff;
use robot_arena_world::{
    query::ArenaSnapshot, ActOutcome, Arena, BoundedCollect, Layout, LockOrder, RobotSeed,
    TransactionError,
};
use thiserror::Error;

use crate::rendezvous::Rendezvous;

pub use report::{ContenderReport, DrillReport};

const RENDEZVOUS_PATIENCE: Duration = Duration::from_secs(1);
const STAGED_ATTRIBUTES: RobotAttributes = RobotAttributes {
    force: 5,
    energy: 50,
    velocity: 1,
};

/// Timing of a deadlock drill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrillConfig {
    /// Bound for each lock acquisition.
    pub lock_timeout: Duration,
    /// How long each contender keeps its first lock before reaching for the second.
    pub hold: Duration,
    /// Attempts per contender before the drill gives up.
    pub max_attempts: u32,
    /// Delay drawn after each timeout.
    pub backoff: Backoff,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(50),
            hold: Duration::from_millis(20),
            max_attempts: 16,
            backoff: Backoff::default(),
        }
    }
}

/// Reasons a drill could not run or did not resolve.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DrillError {
    /// Shared state was corrupted; the arena was halted.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    /// No available battery has two live robots next to it.
    #[error("no available battery is flanked by two live robots")]
    NoContest,
    /// A contender ran out of attempts.
    #[error("{robot} gave up after {attempts} attempts")]
    Unresolved {
        /// Contender that gave up.
        robot: RobotId,
        /// Attempts it made.
        attempts: u32,
    },
    /// A contender thread panicked.
    #[error("the drill thread of {robot} panicked")]
    Panicked {
        /// Contender whose thread panicked.
        robot: RobotId,
    },
}

#[derive(Clone, Copy, Debug)]
struct Contest {
    battery: BatteryId,
    cell: CellCoord,
    contenders: [RobotId; 2],
}

/// Reproduces the circular wait and drives it to a resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeadlockDrill {
    config: DrillConfig,
}

impl DeadlockDrill {
    /// Creates a drill with the provided timing.
    #[must_use]
    pub fn new(config: DrillConfig) -> Self {
        Self { config }
    }

    /// Builds an arena with one battery in the middle and a robot on either side.
    ///
    /// Robots 1 and 2 flank the battery; the remaining robots fill the first
    /// interior rows. Barrier and battery counts of `config` are ignored.
    pub fn stage(config: ArenaConfig) -> Result<Arena, ConfigError> {
        config.validate()?;
        if config.columns < 5 {
            return Err(ConfigError::InvalidLayout(format!(
                "the drill needs at least 5 columns, got {}",
                config.columns
            )));
        }

        let (column, row) = (config.columns / 2, config.rows / 2);
        let battery = CellCoord::new(column, row);
        let west = CellCoord::new(column - 1, row);
        let east = CellCoord::new(column + 1, row);

        let fillers = usize::try_from(config.robot_count.saturating_sub(2)).unwrap_or(usize::MAX);
        let mut cells: Vec<CellCoord> = (1..config.rows - 1)
            .flat_map(|row| (1..config.columns - 1).map(move |column| CellCoord::new(column, row)))
            .filter(|cell| ![battery, west, east].contains(cell))
            .take(fillers)
            .collect();
        if cells.len() < fillers {
            return Err(ConfigError::InvalidLayout(format!(
                "no room for {} robots around the contested battery",
                config.robot_count
            )));
        }
        cells.insert(1, west);
        cells.insert(2, east);

        let layout = Layout {
            barriers: Vec::new(),
            robots: cells
                .into_iter()
                .map(|cell| RobotSeed {
                    cell,
                    attributes: STAGED_ATTRIBUTES,
                })
                .collect(),
            batteries: vec![battery],
        };
        Arena::with_layout(config, layout)
    }

    /// Runs both contenders to completion and audits the arena afterwards.
    ///
    /// The lower robot id takes the misordered path, the higher one the
    /// ordered path.
    pub fn run(&self, arena: &Arena) -> Result<DrillReport, DrillError> {
        let _ = arena.ensure_initialized()?;
        let contest = find_contest(&arena.snapshot()).ok_or(DrillError::NoContest)?;
        let [misordered, ordered] = contest.contenders;
        tracing::info!(
            battery = %contest.battery,
            %misordered,
            %ordered,
            timeout = ?self.config.lock_timeout,
            "starting deadlock drill"
        );

        let rendezvous = Rendezvous::new(2);
        let plan = [
            (misordered, LockOrder::Misordered),
            (ordered, LockOrder::Ordered),
        ];
        let [first, second] = thread::scope(|scope| {
            let handles = plan.map(|(robot, order)| {
                let rendezvous = &rendezvous;
                let contest = &contest;
                let handle =
                    scope.spawn(move || self.contend(arena, contest, robot, order, rendezvous));
                (robot, handle)
            });
            handles.map(|(robot, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(DrillError::Panicked { robot }))
            })
        });
        let report = DrillReport {
            contenders: [first?, second?],
        };

        if let Err(violation) = arena.audit() {
            arena.halt(violation.clone());
            return Err(violation.into());
        }
        tracing::info!(
            deadlocks = report.deadlocks_detected(),
            collector = ?report.collector(),
            "deadlock drill resolved"
        );
        Ok(report)
    }

    fn contend(
        &self,
        arena: &Arena,
        contest: &Contest,
        robot: RobotId,
        order: LockOrder,
        rendezvous: &Rendezvous,
    ) -> Result<ContenderReport, DrillError> {
        let mut events = Vec::new();
        let mut timeouts = 0;

        for attempt in 1..=self.config.max_attempts {
            let request = BoundedCollect {
                robot,
                battery: contest.battery,
                cell: contest.cell,
                order,
                timeout: self.config.lock_timeout,
            };
            let on_first_lock = || {
                if attempt > 1 {
                    return;
                }
                let resource = order.first_resource(contest.battery);
                tracing::info!(%robot, %resource, "holding first lock");
                if !rendezvous.arrive(RENDEZVOUS_PATIENCE) {
                    tracing::warn!(%robot, "the other contender never took its first lock");
                }
                thread::sleep(self.config.hold);
            };

            match arena.collect_within(request, on_first_lock, &mut events) {
                Ok(outcome) => {
                    for event in events.drain(..) {
                        tracing::debug!(%robot, ?event, "committed");
                    }
                    return Ok(ContenderReport {
                        robot,
                        order,
                        attempts: attempt,
                        timeouts,
                        outcome,
                    });
                }
                Err(TransactionError::Timeout(timeout)) => {
                    timeouts += 1;
                    let delay = self.config.backoff.delay(attempt, &mut rand::thread_rng());
                    tracing::warn!(
                        %robot,
                        ?order,
                        resource = %timeout.resource,
                        attempt,
                        ?delay,
                        "deadlock detected; released held locks and backing off"
                    );
                    thread::sleep(delay);

                    if let Some(reason) = resense(&arena.snapshot(), robot, contest.battery) {
                        tracing::info!(%robot, ?reason, "standing down after re-sensing");
                        return Ok(ContenderReport {
                            robot,
                            order,
                            attempts: attempt,
                            timeouts,
                            outcome: ActOutcome::Stale(reason),
                        });
                    }
                }
                Err(TransactionError::Invariant(violation)) => {
                    tracing::error!(%robot, detail = violation.detail(), "invariant violated");
                    arena.halt(violation.clone());
                    return Err(violation.into());
                }
            }
        }

        Err(DrillError::Unresolved {
            robot,
            attempts: self.config.max_attempts,
        })
    }
}

fn find_contest(snapshot: &ArenaSnapshot) -> Option<Contest> {
    snapshot
        .batteries
        .iter()
        .filter(|battery| battery.state.is_available())
        .find_map(|battery| {
            let mut flanking = snapshot
                .robots
                .iter()
                .filter(|robot| robot.is_alive() && robot.cell.is_adjacent(battery.cell))
                .map(|robot| robot.id);
            Some(Contest {
                battery: battery.id,
                cell: battery.cell,
                contenders: [flanking.next()?, flanking.next()?],
            })
        })
}

/// Re-decides from a fresh snapshot whether the collection is still worth trying.
fn resense(snapshot: &ArenaSnapshot, robot: RobotId, battery: BatteryId) -> Option<StaleReason> {
    if snapshot.is_game_over() {
        return Some(StaleReason::GameOver);
    }
    if !snapshot.robot(robot).is_some_and(|me| me.is_alive()) {
        return Some(StaleReason::ActorDead);
    }
    if !snapshot
        .battery(battery)
        .is_some_and(|battery| battery.state.is_available())
    {
        return Some(StaleReason::BatteryCollected);
    }
    None
}
