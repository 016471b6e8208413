//! Layered run settings: defaults, then an optional TOML file, then flags.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use robot_arena_core::ArenaConfig;
use robot_arena_system_agent::{AgentTuning, Backoff};
use robot_arena_system_deadlock::DrillConfig;
use serde::Deserialize;

/// Command-line values that take precedence over the settings file.
#[derive(Args, Debug, Default)]
pub(crate) struct Overrides {
    /// Grid columns, perimeter included.
    #[arg(long)]
    columns: Option<u32>,
    /// Grid rows, perimeter included.
    #[arg(long)]
    rows: Option<u32>,
    /// Number of robots (at least 4).
    #[arg(long)]
    robots: Option<u32>,
    /// Number of batteries.
    #[arg(long)]
    batteries: Option<u32>,
    /// Number of interior barriers.
    #[arg(long)]
    barriers: Option<u32>,
    /// Seed for a reproducible layout.
    #[arg(long)]
    seed: Option<u64>,
    /// Pause between sense-act cycles, in milliseconds.
    #[arg(long, value_name = "MS")]
    cycle_ms: Option<u64>,
    /// Pause between housekeeping ticks, in milliseconds.
    #[arg(long, value_name = "MS")]
    housekeeping_ms: Option<u64>,
    /// Bound for each lock acquisition on the bounded paths, in milliseconds.
    #[arg(long, value_name = "MS")]
    lock_timeout_ms: Option<u64>,
    /// Viewer refresh interval, in milliseconds.
    #[arg(long, value_name = "MS")]
    refresh_ms: Option<u64>,
    /// Route battery collection through the bounded, partly misordered lock paths.
    #[arg(long)]
    fault_injection: bool,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AgentSection {
    cycle_ms: u64,
    housekeeping_ms: u64,
    fault_injection: bool,
    lock_timeout_ms: u64,
    max_retries: u32,
    backoff_min_ms: u64,
    backoff_max_ms: u64,
    backoff_max_growth: u32,
}

impl Default for AgentSection {
    fn default() -> Self {
        let tuning = AgentTuning::default();
        Self {
            cycle_ms: millis(tuning.cycle),
            housekeeping_ms: millis(tuning.housekeeping),
            fault_injection: tuning.fault_injection,
            lock_timeout_ms: millis(tuning.lock_timeout),
            max_retries: tuning.max_retries,
            backoff_min_ms: millis(tuning.backoff.min),
            backoff_max_ms: millis(tuning.backoff.max),
            backoff_max_growth: tuning.backoff.max_growth,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ViewerSection {
    refresh_ms: u64,
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self { refresh_ms: 100 }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DrillSection {
    hold_ms: u64,
    max_attempts: u32,
}

impl Default for DrillSection {
    fn default() -> Self {
        let drill = DrillConfig::default();
        Self {
            hold_ms: millis(drill.hold),
            max_attempts: drill.max_attempts,
        }
    }
}

/// Everything a run needs, after all layers were applied.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) arena: ArenaConfig,
    agents: AgentSection,
    viewer: ViewerSection,
    drill: DrillSection,
}

impl Settings {
    /// Reads `path` when provided, otherwise starts from the defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid settings toml")
    }

    /// Replaces file values with every flag that was given.
    pub(crate) fn apply(&mut self, overrides: &Overrides) {
        let arena = &mut self.arena;
        replace(&mut arena.columns, overrides.columns);
        replace(&mut arena.rows, overrides.rows);
        replace(&mut arena.robot_count, overrides.robots);
        replace(&mut arena.battery_count, overrides.batteries);
        replace(&mut arena.barrier_count, overrides.barriers);
        if overrides.seed.is_some() {
            arena.seed = overrides.seed;
        }

        replace(&mut self.agents.cycle_ms, overrides.cycle_ms);
        replace(&mut self.agents.housekeeping_ms, overrides.housekeeping_ms);
        replace(&mut self.agents.lock_timeout_ms, overrides.lock_timeout_ms);
        replace(&mut self.viewer.refresh_ms, overrides.refresh_ms);
        self.agents.fault_injection |= overrides.fault_injection;
    }

    pub(crate) fn tuning(&self) -> AgentTuning {
        let agents = &self.agents;
        AgentTuning {
            cycle: Duration::from_millis(agents.cycle_ms),
            housekeeping: Duration::from_millis(agents.housekeeping_ms),
            fault_injection: agents.fault_injection,
            lock_timeout: Duration::from_millis(agents.lock_timeout_ms),
            max_retries: agents.max_retries,
            backoff: self.backoff(),
        }
    }

    pub(crate) fn drill(&self) -> DrillConfig {
        DrillConfig {
            lock_timeout: Duration::from_millis(self.agents.lock_timeout_ms),
            hold: Duration::from_millis(self.drill.hold_ms),
            max_attempts: self.drill.max_attempts,
            backoff: self.backoff(),
        }
    }

    pub(crate) fn refresh(&self) -> Duration {
        Duration::from_millis(self.viewer.refresh_ms)
    }

    fn backoff(&self) -> Backoff {
        Backoff {
            min: Duration::from_millis(self.agents.backoff_min_ms),
            max: Duration::from_millis(self.agents.backoff_max_ms),
            max_growth: self.agents.backoff_max_growth,
        }
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_library_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.tuning(), AgentTuning::default());
        assert_eq!(settings.drill(), DrillConfig::default());
        assert_eq!(settings.refresh(), Duration::from_millis(100));
    }

    #[test]
    fn partial_files_keep_the_remaining_defaults() {
        let settings = Settings::parse(
            r#"
            [arena]
            columns = 30
            robot_count = 6
            seed = 9

            [agents]
            cycle_ms = 40
            fault_injection = true
            "#,
        )
        .expect("settings parse");

        assert_eq!(settings.arena.columns, 30);
        assert_eq!(settings.arena.rows, 20);
        assert_eq!(settings.arena.robot_count, 6);
        assert_eq!(settings.arena.seed, Some(9));
        let tuning = settings.tuning();
        assert_eq!(tuning.cycle, Duration::from_millis(40));
        assert!(tuning.fault_injection);
        assert_eq!(tuning.housekeeping, AgentTuning::default().housekeeping);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::parse("[agents]\ncycle = 4\n").is_err());
    }

    #[test]
    fn flags_win_over_the_file() {
        let mut settings = Settings::parse("[arena]\ncolumns = 30\nseed = 9\n").expect("parse");
        let overrides = Overrides {
            columns: Some(16),
            robots: Some(5),
            lock_timeout_ms: Some(15),
            fault_injection: true,
            ..Overrides::default()
        };

        settings.apply(&overrides);

        assert_eq!(settings.arena.columns, 16);
        assert_eq!(settings.arena.robot_count, 5);
        assert_eq!(settings.arena.seed, Some(9));
        assert_eq!(settings.tuning().lock_timeout, Duration::from_millis(15));
        assert_eq!(settings.drill().lock_timeout, Duration::from_millis(15));
        assert!(settings.tuning().fault_injection);
    }
}
