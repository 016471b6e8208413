use std::time::Duration;

use anyhow::Result as AnyResult;
use robot_arena_core::{
    ArenaConfig, CellCoord, Intent, InvariantViolation, Outcome, RobotAttributes, RobotId,
};
use robot_arena_viewer::{Frame, FrameSink, TerminalSink, Viewer};
use robot_arena_world::{Arena, Layout, RobotSeed};

#[derive(Default)]
struct Recorder {
    frames: Vec<Frame>,
}

impl FrameSink for Recorder {
    fn present(&mut self, frame: &Frame) -> AnyResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

fn seed(column: u32, row: u32, force: u32) -> RobotSeed {
    RobotSeed {
        cell: CellCoord::new(column, row),
        attributes: RobotAttributes {
            force,
            energy: 40,
            velocity: 1,
        },
    }
}

fn crowded_arena() -> Arena {
    let config = ArenaConfig {
        columns: 6,
        rows: 5,
        seed: Some(2),
        ..ArenaConfig::default()
    };
    let layout = Layout {
        barriers: Vec::new(),
        robots: vec![seed(2, 2, 9), seed(1, 2, 1), seed(3, 2, 1), seed(2, 1, 1)],
        batteries: Vec::new(),
    };
    let arena = Arena::with_layout(config, layout).expect("layout is valid");
    let _ = arena.ensure_initialized().expect("setup succeeds");
    arena
}

#[test]
fn viewer_stops_on_game_over_with_a_banner() {
    let arena = crowded_arena();
    let mut events = Vec::new();
    for (opponent, cell) in [(1, (1, 2)), (2, (3, 2)), (3, (2, 1))] {
        let intent = Intent::Duel {
            opponent: RobotId::new(opponent),
            cell: CellCoord::new(cell.0, cell.1),
        };
        let outcome = arena
            .act(RobotId::new(0), intent, &mut events)
            .expect("duel commits");
        assert!(outcome.is_committed());
    }
    assert_eq!(
        arena.settle_outcome(&mut events),
        Some(Outcome::Winner(RobotId::new(0)))
    );

    let mut recorder = Recorder::default();
    let last = Viewer::new(Duration::from_millis(1))
        .run(&arena, &mut recorder)
        .expect("viewer runs");

    assert_eq!(recorder.frames, vec![last.clone()]);
    assert_eq!(last.banner.as_deref(), Some("GAME OVER: robot-0 wins"));
    assert_eq!(last.grid[2], "# P  #");
}

#[test]
fn viewer_stops_when_the_arena_halts() {
    let arena = crowded_arena();
    arena.halt(InvariantViolation::new("test halt"));

    let mut out = Vec::new();
    let last = Viewer::default()
        .run(&arena, &mut TerminalSink::new(&mut out))
        .expect("viewer runs");

    assert_eq!(last.banner, None);
    let text = String::from_utf8(out).expect("frames are utf-8");
    assert!(text.contains("robot-0"));
    assert!(text.ends_with(&last.to_string()));
}
