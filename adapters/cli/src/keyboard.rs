//! Line-based keyboard steering for the player robot.

use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use robot_arena_core::Direction;
use robot_arena_system_agent::PlayerInput;

/// Starts a detached thread that forwards `w`/`a`/`s`/`d` keys from stdin.
///
/// Keys take effect once the line is submitted; the last key of a line wins.
pub(crate) fn spawn_reader(input: Arc<PlayerInput>) -> io::Result<()> {
    let _ = thread::Builder::new()
        .name("player-keyboard".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    tracing::warn!("stopped reading player input");
                    return;
                };
                for direction in line.chars().filter_map(direction_for) {
                    input.steer(direction);
                }
            }
        })?;
    Ok(())
}

fn direction_for(key: char) -> Option<Direction> {
    match key.to_ascii_lowercase() {
        'w' => Some(Direction::North),
        'a' => Some(Direction::West),
        's' => Some(Direction::South),
        'd' => Some(Direction::East),
        _ => None,
    }
}
