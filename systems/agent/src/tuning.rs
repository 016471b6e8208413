use std::time::Duration;

use rand::Rng;

const DEFAULT_CYCLE: Duration = Duration::from_millis(120);
const DEFAULT_HOUSEKEEPING: Duration = Duration::from_secs(1);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(50);
const DEFAULT_MAX_RETRIES: u32 = 32;

/// Randomized retry delay used after a lock timeout.
///
/// Each retry doubles the ceiling of the jitter window until it reaches
/// `max_growth` times the base window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Smallest delay ever drawn.
    pub min: Duration,
    /// Ceiling of the jitter window on the first retry.
    pub max: Duration,
    /// Largest multiplier applied to `max`.
    pub max_growth: u32,
}

impl Backoff {
    /// Draws the delay before retry number `attempt`, counting from 1.
    pub fn delay<R>(&self, attempt: u32, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let growth = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX)
            .min(self.max_growth.max(1));
        let ceiling = self.max.saturating_mul(growth).max(self.min);
        if ceiling == self.min {
            return self.min;
        }
        rng.gen_range(self.min..=ceiling)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(5),
            max: Duration::from_millis(40),
            max_growth: 8,
        }
    }
}

/// Timing and fault-injection knobs shared by every robot agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentTuning {
    /// Pause between two sense-act cycles.
    pub cycle: Duration,
    /// Pause between two housekeeping ticks.
    pub housekeeping: Duration,
    /// Routes battery collection through bounded, partly misordered lock paths.
    pub fault_injection: bool,
    /// Bound for each lock acquisition on the fault-injection path.
    pub lock_timeout: Duration,
    /// Timeouts tolerated within one cycle before the agent gives up on it.
    pub max_retries: u32,
    /// Delay drawn after each timeout.
    pub backoff: Backoff,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            cycle: DEFAULT_CYCLE,
            housekeeping: DEFAULT_HOUSEKEEPING,
            fault_injection: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
        }
    }
}
