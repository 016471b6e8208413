//! Per-robot activities: the sense-act loop and the housekeeping loop.

use std::{
    thread,
    time::{Duration, Instant},
};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use robot_arena_core::{Event, Intent, InvariantViolation, RobotId, PLAYER_ROBOT};
use robot_arena_world::{
    query::ArenaSnapshot, ActOutcome, Arena, BoundedCollect, LockOrder, Metabolism,
    TransactionError,
};

use crate::{decide, player::PlayerInput, tuning::AgentTuning};

const PAUSE_SLICE: Duration = Duration::from_millis(10);

/// State owned by one robot's activities.
pub(crate) struct Agent<'a> {
    arena: &'a Arena,
    robot: RobotId,
    tuning: &'a AgentTuning,
    player: Option<&'a PlayerInput>,
    rng: ChaCha8Rng,
    events: Vec<Event>,
}

impl<'a> Agent<'a> {
    pub(crate) fn new(
        arena: &'a Arena,
        robot: RobotId,
        tuning: &'a AgentTuning,
        player: Option<&'a PlayerInput>,
    ) -> Self {
        let seed = arena.seed().wrapping_add(u64::from(robot.get()));
        Self {
            arena,
            robot,
            tuning,
            player: player.filter(|_| robot == PLAYER_ROBOT),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    /// Repeats sense, decide, act until the robot dies or the game stops.
    pub(crate) fn sense_act(mut self) -> Result<(), InvariantViolation> {
        let _ = self
            .arena
            .ensure_initialized()
            .map_err(|violation| self.fail(violation))?;
        tracing::debug!(robot = %self.robot, "sense-act loop started");

        while self.is_active() {
            self.cycle().map_err(|violation| self.fail(violation))?;
            pause(self.arena, self.tuning.cycle);
        }

        tracing::debug!(robot = %self.robot, "sense-act loop stopped");
        Ok(())
    }

    /// Drains energy and checks the win condition until the robot dies.
    pub(crate) fn housekeeping(mut self) -> Result<(), InvariantViolation> {
        let _ = self
            .arena
            .ensure_initialized()
            .map_err(|violation| self.fail(violation))?;

        loop {
            pause(self.arena, self.tuning.housekeeping);
            if stopped(self.arena) {
                return Ok(());
            }

            let metabolism = self
                .arena
                .metabolize(self.robot, &mut self.events)
                .map_err(|violation| self.fail(violation))?;
            self.report();
            let _ = self.arena.settle_outcome(&mut self.events);
            self.report();

            if metabolism == Metabolism::Inert || metabolism == Metabolism::Exhausted {
                return Ok(());
            }
        }
    }

    /// One cycle: up to V moves, or a single collection or duel.
    fn cycle(&mut self) -> Result<(), InvariantViolation> {
        let mut moves = 0;
        let mut timeouts = 0;

        loop {
            let snapshot = self.arena.snapshot();
            let Some(velocity) = snapshot
                .robot(self.robot)
                .filter(|me| me.is_alive())
                .map(|me| me.attributes.velocity)
            else {
                return Ok(());
            };
            let Some(intent) = self.decide(&snapshot) else {
                return Ok(());
            };

            match self.act(intent) {
                Ok(outcome) => {
                    self.report();
                    if let ActOutcome::Stale(reason) = outcome {
                        tracing::trace!(robot = %self.robot, ?reason, "decision went stale");
                    }
                    if !matches!(intent, Intent::Move { .. }) {
                        return Ok(());
                    }
                    moves += 1;
                    if moves >= velocity.max(1) {
                        return Ok(());
                    }
                }
                Err(TransactionError::Timeout(timeout)) => {
                    timeouts += 1;
                    if timeouts > self.tuning.max_retries {
                        tracing::warn!(
                            robot = %self.robot,
                            timeouts,
                            "giving up on this cycle after repeated lock timeouts"
                        );
                        return Ok(());
                    }
                    let delay = self
                        .tuning
                        .backoff
                        .delay(timeouts, &mut rand::thread_rng());
                    tracing::warn!(
                        robot = %self.robot,
                        resource = %timeout.resource,
                        attempt = timeouts,
                        ?delay,
                        "lock timeout; released held locks and backing off"
                    );
                    thread::sleep(delay);
                }
                Err(TransactionError::Invariant(violation)) => return Err(violation),
            }
        }
    }

    fn decide(&mut self, snapshot: &ArenaSnapshot) -> Option<Intent> {
        match self.player {
            Some(input) => input
                .take()
                .and_then(|direction| decide::steer(snapshot, self.robot, direction)),
            None => decide::decide(snapshot, self.robot, &mut self.rng),
        }
    }

    fn act(&mut self, intent: Intent) -> Result<ActOutcome, TransactionError> {
        match intent {
            Intent::Collect { battery, cell } if self.tuning.fault_injection => {
                let order = if self.robot.get() % 2 == 1 {
                    LockOrder::Misordered
                } else {
                    LockOrder::Ordered
                };
                self.arena.collect_within(
                    BoundedCollect {
                        robot: self.robot,
                        battery,
                        cell,
                        order,
                        timeout: self.tuning.lock_timeout,
                    },
                    || {},
                    &mut self.events,
                )
            }
            _ => self
                .arena
                .act(self.robot, intent, &mut self.events)
                .map_err(TransactionError::Invariant),
        }
    }

    fn report(&mut self) {
        for event in self.events.drain(..) {
            tracing::debug!(robot = %self.robot, ?event, "committed");
        }
    }

    fn fail(&self, violation: InvariantViolation) -> InvariantViolation {
        tracing::error!(robot = %self.robot, detail = violation.detail(), "invariant violated");
        self.arena.halt(violation.clone());
        violation
    }

    fn is_active(&self) -> bool {
        !stopped(self.arena)
            && self
                .arena
                .snapshot()
                .robot(self.robot)
                .is_some_and(|me| me.is_alive())
    }
}

fn stopped(arena: &Arena) -> bool {
    arena.is_game_over() || arena.halted().is_some()
}

/// Sleeps for `duration`, waking early once the run stops.
fn pause(arena: &Arena, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !stopped(arena) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}
