use parking_lot::Mutex;
use robot_arena_core::Direction;

/// Steering handle shared between an external input handler and the player robot.
///
/// The handler queues the latest direction; the player's sense-act loop takes
/// it on its next decision. Only the most recent direction is kept.
#[derive(Debug, Default)]
pub struct PlayerInput {
    pending: Mutex<Option<Direction>>,
}

impl PlayerInput {
    /// Creates a handle with no queued direction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `direction`, replacing any direction not yet consumed.
    pub fn steer(&self, direction: Direction) {
        *self.pending.lock() = Some(direction);
    }

    /// Takes the queued direction, if any.
    pub fn take(&self) -> Option<Direction> {
        self.pending.lock().take()
    }
}
