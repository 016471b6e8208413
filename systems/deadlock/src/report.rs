use std::fmt;

use robot_arena_core::RobotId;
use robot_arena_world::{ActOutcome, LockOrder};

/// How one contender fared in the drill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContenderReport {
    /// Robot that contended for the battery.
    pub robot: RobotId,
    /// Lock order the robot used on every attempt.
    pub order: LockOrder,
    /// Transactions started, including the final one.
    pub attempts: u32,
    /// Attempts aborted on a lock timeout.
    pub timeouts: u32,
    /// Result of the transaction that ended the robot's participation.
    pub outcome: ActOutcome,
}

/// Result of a deadlock drill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrillReport {
    /// The misordered contender first, the ordered one second.
    pub contenders: [ContenderReport; 2],
}

impl DrillReport {
    /// Lock timeouts observed across both contenders.
    #[must_use]
    pub fn deadlocks_detected(&self) -> u32 {
        self.contenders.iter().map(|report| report.timeouts).sum()
    }

    /// Contender whose collection committed, if any.
    #[must_use]
    pub fn collector(&self) -> Option<RobotId> {
        self.contenders
            .iter()
            .find(|report| report.outcome.is_committed())
            .map(|report| report.robot)
    }
}

impl fmt::Display for DrillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "deadlocks detected: {}", self.deadlocks_detected())?;
        for report in &self.contenders {
            let outcome = match report.outcome {
                ActOutcome::Committed => "collected the battery".to_owned(),
                ActOutcome::Stale(reason) => format!("stood down ({reason:?})"),
            };
            writeln!(
                f,
                "{} [{:?}]: {} attempt(s), {} timeout(s), {}",
                report.robot, report.order, report.attempts, report.timeouts, outcome
            )?;
        }
        match self.collector() {
            Some(robot) => write!(f, "resolved: {robot} collected the battery"),
            None => write!(f, "resolved: nobody collected the battery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_arena_core::StaleReason;

    #[test]
    fn report_totals_timeouts_and_names_the_collector() {
        let report = DrillReport {
            contenders: [
                ContenderReport {
                    robot: RobotId::new(1),
                    order: LockOrder::Misordered,
                    attempts: 2,
                    timeouts: 1,
                    outcome: ActOutcome::Committed,
                },
                ContenderReport {
                    robot: RobotId::new(2),
                    order: LockOrder::Ordered,
                    attempts: 1,
                    timeouts: 1,
                    outcome: ActOutcome::Stale(StaleReason::BatteryCollected),
                },
            ],
        };

        assert_eq!(report.deadlocks_detected(), 2);
        assert_eq!(report.collector(), Some(RobotId::new(1)));
        let text = report.to_string();
        assert!(text.starts_with("deadlocks detected: 2"));
        assert!(text.ends_with("resolved: robot-1 collected the battery"));
    }
}
