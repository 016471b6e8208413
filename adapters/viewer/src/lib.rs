#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Read-only text viewer for the robot arena.
//!
//! The viewer only ever reads published snapshots. It never takes any of the
//! arena's mutating locks, so it cannot stall or reorder a transaction.

use std::{fmt, io::Write, thread, time::Duration};

use anyhow::{Context, Result as AnyResult};
use robot_arena_core::{Cell, Outcome};
use robot_arena_world::{
    query::{ArenaSnapshot, RobotSnapshot},
    Arena,
};

const BARRIER_GLYPH: char = '#';
const BATTERY_GLYPH: char = 'B';
const PLAYER_GLYPH: char = 'P';
const EMPTY_GLYPH: char = ' ';
const UNKNOWN_ROBOT_GLYPH: char = '?';
const DEFAULT_REFRESH: Duration = Duration::from_millis(100);
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Text rendition of a single snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Publication counter of the rendered snapshot.
    pub version: u64,
    /// One string per grid row.
    pub grid: Vec<String>,
    /// One status line per robot.
    pub status: Vec<String>,
    /// Game-over banner, once the outcome is known.
    pub banner: Option<String>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.grid.iter().chain(&self.status) {
            writeln!(f, "{line}")?;
        }
        if let Some(banner) = &self.banner {
            writeln!(f, "{banner}")?;
        }
        Ok(())
    }
}

/// Renders `snapshot` into a text frame.
///
/// Barriers are `#`, available batteries `B`, the player robot `P` and every
/// other live robot its identifier as a base-36 digit.
#[must_use]
pub fn render(snapshot: &ArenaSnapshot) -> Frame {
    let width = usize::try_from(snapshot.columns).unwrap_or(usize::MAX).max(1);
    let grid = snapshot
        .cells
        .chunks(width)
        .map(|row| row.iter().map(|cell| glyph(snapshot, *cell)).collect())
        .collect();
    let status = snapshot.robots.iter().map(status_line).collect();
    let banner = snapshot.outcome.map(|outcome| match outcome {
        Outcome::Winner(winner) => format!("GAME OVER: {winner} wins"),
        Outcome::NoSurvivors => "GAME OVER: no survivors".to_owned(),
    });

    Frame {
        version: snapshot.version,
        grid,
        status,
        banner,
    }
}

fn glyph(snapshot: &ArenaSnapshot, cell: Cell) -> char {
    match cell {
        Cell::Empty => EMPTY_GLYPH,
        Cell::Barrier => BARRIER_GLYPH,
        Cell::Battery(_) => BATTERY_GLYPH,
        Cell::Robot(id) => match snapshot.robot(id) {
            Some(robot) if robot.player => PLAYER_GLYPH,
            _ => char::from_digit(id.get() % 36, 36).unwrap_or(UNKNOWN_ROBOT_GLYPH),
        },
    }
}

fn status_line(robot: &RobotSnapshot) -> String {
    let attributes = robot.attributes;
    let status = if robot.is_alive() { "alive" } else { "dead" };
    let role = if robot.player { " (player)" } else { "" };
    format!(
        "{:<9} F {:>2}  E {:>3}  V {}  {status}{role}",
        robot.id.to_string(),
        attributes.force,
        attributes.energy,
        attributes.velocity,
    )
}

/// Destination for rendered frames.
pub trait FrameSink {
    /// Presents a freshly rendered frame.
    fn present(&mut self, frame: &Frame) -> AnyResult<()>;
}

/// Writes frames to a terminal, clearing the screen before each one.
#[derive(Debug)]
pub struct TerminalSink<W> {
    out: W,
}

impl<W: Write> TerminalSink<W> {
    /// Wraps the provided writer.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> FrameSink for TerminalSink<W> {
    fn present(&mut self, frame: &Frame) -> AnyResult<()> {
        write!(self.out, "{CLEAR_SCREEN}{frame}").context("failed to write frame")?;
        self.out.flush().context("failed to flush frame")
    }
}

/// Polls the snapshot board and presents every new publication.
#[derive(Clone, Copy, Debug)]
pub struct Viewer {
    refresh: Duration,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH)
    }
}

impl Viewer {
    /// Creates a viewer that polls every `refresh`.
    #[must_use]
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }

    /// Presents frames until the game is over or the arena halts.
    ///
    /// Returns the last frame presented.
    pub fn run<S>(&self, arena: &Arena, sink: &mut S) -> AnyResult<Frame>
    where
        S: FrameSink + ?Sized,
    {
        let mut shown = None;
        loop {
            let snapshot = arena.snapshot();
            let stopping = snapshot.is_game_over() || arena.halted().is_some();

            let frame = match shown.take() {
                Some(frame) if !is_newer(&frame, &snapshot) => frame,
                _ => {
                    let frame = render(&snapshot);
                    sink.present(&frame)?;
                    frame
                }
            };

            if stopping {
                tracing::debug!(version = frame.version, "viewer stopped");
                return Ok(frame);
            }
            shown = Some(frame);
            thread::sleep(self.refresh);
        }
    }
}

fn is_newer(frame: &Frame, snapshot: &ArenaSnapshot) -> bool {
    snapshot.version > frame.version
}
