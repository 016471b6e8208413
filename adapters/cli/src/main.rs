#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a robot arena match or the deadlock drill.

mod keyboard;
mod settings;

use std::{io, path::PathBuf, sync::Arc, thread};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use robot_arena_core::Outcome;
use robot_arena_system_agent::{PlayerInput, Simulation};
use robot_arena_system_deadlock::DeadlockDrill;
use robot_arena_viewer::{TerminalSink, Viewer};
use robot_arena_world::Arena;
use tracing_subscriber::EnvFilter;

use crate::settings::{Overrides, Settings};

const DEFAULT_LOG_FILTER: &str = "robot_arena=info";

/// Concurrent robot arena simulation.
#[derive(Debug, Parser)]
#[command(name = "robot-arena", version)]
struct Cli {
    /// TOML settings file; flags override its values.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
    /// Stage two robots around one battery with opposite lock orders and report the recovery.
    #[arg(long)]
    deadlock_drill: bool,
    /// Do not render frames while the match runs.
    #[arg(long)]
    no_viewer: bool,
    /// Steer robot 0 with w/a/s/d lines on stdin.
    #[arg(long)]
    player: bool,
}

/// Entry point for the robot arena command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(&cli.overrides);

    if cli.deadlock_drill {
        run_drill(&settings)
    } else {
        run_match(&cli, &settings)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_match(cli: &Cli, settings: &Settings) -> Result<()> {
    let arena = Arena::new(settings.arena.clone()).context("invalid arena configuration")?;
    tracing::info!(seed = arena.seed(), "arena created");

    let mut simulation = Simulation::new(settings.tuning());
    if cli.player {
        let input = Arc::new(PlayerInput::new());
        keyboard::spawn_reader(Arc::clone(&input)).context("failed to read the keyboard")?;
        simulation = simulation.with_player_input(input);
        eprintln!("steer the player robot with w/a/s/d followed by enter");
    }
    let viewer = (!cli.no_viewer).then(|| Viewer::new(settings.refresh()));

    let (outcome, viewed) = thread::scope(|scope| {
        let arena = &arena;
        let viewing = viewer.map(|viewer| {
            scope.spawn(move || viewer.run(arena, &mut TerminalSink::new(io::stdout().lock())))
        });
        let outcome = simulation.run(arena);
        let viewed = viewing.map(|handle| {
            handle
                .join()
                .map_err(|_| anyhow!("viewer thread panicked"))
        });
        (outcome, viewed)
    });

    let outcome = outcome.context("simulation aborted")?;
    if let Some(viewed) = viewed {
        let _ = viewed?.context("viewer failed")?;
    }

    match outcome {
        Outcome::Winner(winner) => println!("{winner} wins"),
        Outcome::NoSurvivors => println!("no survivors"),
    }
    Ok(())
}

fn run_drill(settings: &Settings) -> Result<()> {
    let arena =
        DeadlockDrill::stage(settings.arena.clone()).context("cannot stage the deadlock drill")?;
    let report = DeadlockDrill::new(settings.drill())
        .run(&arena)
        .context("deadlock drill failed")?;
    println!("{report}");
    Ok(())
}
