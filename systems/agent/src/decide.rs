//! Pure decision policy evaluated against a possibly stale snapshot.

use rand::{seq::SliceRandom, Rng};
use robot_arena_core::{Cell, CellCoord, Direction, Intent, RobotId};
use robot_arena_world::query::ArenaSnapshot;

/// Chooses the next intent for an autonomous robot.
///
/// Preference order: duel an adjacent live robot, collect an adjacent
/// battery, step toward the nearest battery, step toward the nearest rival,
/// wander to a random empty neighbour. Returns `None` when the robot is dead
/// or boxed in.
pub fn decide<R>(snapshot: &ArenaSnapshot, robot: RobotId, rng: &mut R) -> Option<Intent>
where
    R: Rng + ?Sized,
{
    let me = snapshot.robot(robot).filter(|me| me.is_alive())?;
    let origin = me.cell;

    let mut empty = Vec::with_capacity(4);
    let mut battery = None;
    for (direction, cell) in snapshot.neighbours(origin) {
        match snapshot.cell(cell) {
            Some(Cell::Robot(opponent)) if is_rival(snapshot, robot, opponent) => {
                return Some(Intent::Duel { opponent, cell });
            }
            Some(Cell::Battery(found)) if battery.is_none() => {
                let available = snapshot
                    .battery(found)
                    .is_some_and(|battery| battery.state.is_available());
                if available {
                    battery = Some(Intent::Collect {
                        battery: found,
                        cell,
                    });
                }
            }
            Some(Cell::Empty) => empty.push((direction, cell)),
            _ => {}
        }
    }

    if battery.is_some() {
        return battery;
    }

    let target = nearest_battery(snapshot, origin).or_else(|| nearest_rival(snapshot, robot));
    if let Some(target) = target {
        let closer = empty
            .iter()
            .filter(|(_, cell)| cell.manhattan_distance(target) < origin.manhattan_distance(target))
            .min_by_key(|(_, cell)| cell.manhattan_distance(target));
        if let Some((direction, _)) = closer {
            return Some(Intent::Move {
                direction: *direction,
            });
        }
    }

    empty
        .choose(rng)
        .map(|(direction, _)| Intent::Move {
            direction: *direction,
        })
}

/// Translates a steering direction into an intent for the player robot.
///
/// Steering into an empty cell moves, into a battery collects and into a live
/// robot duels. Barriers and dead robots yield `None`.
#[must_use]
pub fn steer(snapshot: &ArenaSnapshot, robot: RobotId, direction: Direction) -> Option<Intent> {
    let me = snapshot.robot(robot).filter(|me| me.is_alive())?;
    let cell = me.cell.step(direction)?;
    match snapshot.cell(cell)? {
        Cell::Empty => Some(Intent::Move { direction }),
        Cell::Battery(battery) => Some(Intent::Collect { battery, cell }),
        Cell::Robot(opponent) if is_rival(snapshot, robot, opponent) => {
            Some(Intent::Duel { opponent, cell })
        }
        Cell::Robot(_) | Cell::Barrier => None,
    }
}

fn is_rival(snapshot: &ArenaSnapshot, robot: RobotId, other: RobotId) -> bool {
    other != robot && snapshot.robot(other).is_some_and(|other| other.is_alive())
}

fn nearest_battery(snapshot: &ArenaSnapshot, origin: CellCoord) -> Option<CellCoord> {
    snapshot
        .batteries
        .iter()
        .filter(|battery| battery.state.is_available())
        .map(|battery| battery.cell)
        .min_by_key(|cell| origin.manhattan_distance(*cell))
}

fn nearest_rival(snapshot: &ArenaSnapshot, robot: RobotId) -> Option<CellCoord> {
    let origin = snapshot.robot(robot)?.cell;
    snapshot
        .robots
        .iter()
        .filter(|other| other.id != robot && other.is_alive())
        .map(|other| other.cell)
        .min_by_key(|cell| origin.manhattan_distance(*cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use robot_arena_core::{ArenaConfig, BatteryId, RobotAttributes};
    use robot_arena_world::{Arena, Layout, RobotSeed};

    fn seed(column: u32, row: u32) -> RobotSeed {
        RobotSeed {
            cell: CellCoord::new(column, row),
            attributes: RobotAttributes {
                force: 4,
                energy: 40,
                velocity: 2,
            },
        }
    }

    fn snapshot(robots: Vec<RobotSeed>, batteries: Vec<CellCoord>) -> std::sync::Arc<ArenaSnapshot> {
        let config = ArenaConfig {
            columns: 12,
            rows: 8,
            seed: Some(3),
            ..ArenaConfig::default()
        };
        let layout = Layout {
            barriers: vec![CellCoord::new(2, 6)],
            robots,
            batteries,
        };
        let arena = Arena::with_layout(config, layout).expect("layout is valid");
        let _ = arena.ensure_initialized().expect("setup succeeds");
        arena.snapshot()
    }

    #[test]
    fn adjacent_rivals_are_challenged_first() {
        let snapshot = snapshot(
            vec![seed(3, 3), seed(4, 3), seed(10, 1), seed(10, 6)],
            vec![CellCoord::new(3, 2)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(
            decide(&snapshot, RobotId::new(0), &mut rng),
            Some(Intent::Duel {
                opponent: RobotId::new(1),
                cell: CellCoord::new(4, 3),
            }),
        );
    }

    #[test]
    fn adjacent_batteries_are_collected() {
        let snapshot = snapshot(
            vec![seed(3, 3), seed(8, 3), seed(10, 1), seed(10, 6)],
            vec![CellCoord::new(3, 4)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(
            decide(&snapshot, RobotId::new(0), &mut rng),
            Some(Intent::Collect {
                battery: BatteryId::new(0),
                cell: CellCoord::new(3, 4),
            }),
        );
    }

    #[test]
    fn robots_head_for_the_nearest_battery() {
        let snapshot = snapshot(
            vec![seed(3, 3), seed(8, 1), seed(10, 1), seed(10, 6)],
            vec![CellCoord::new(6, 3), CellCoord::new(1, 6)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(
            decide(&snapshot, RobotId::new(0), &mut rng),
            Some(Intent::Move {
                direction: Direction::East,
            }),
        );
    }

    #[test]
    fn without_batteries_robots_hunt_rivals() {
        let snapshot = snapshot(
            vec![seed(3, 3), seed(3, 6), seed(10, 1), seed(10, 6)],
            Vec::new(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(
            decide(&snapshot, RobotId::new(0), &mut rng),
            Some(Intent::Move {
                direction: Direction::South,
            }),
        );
    }

    #[test]
    fn steering_maps_cell_contents_to_intents() {
        let snapshot = snapshot(
            vec![seed(3, 3), seed(4, 3), seed(10, 1), seed(1, 6)],
            vec![CellCoord::new(3, 2)],
        );
        let player = RobotId::new(0);

        assert_eq!(
            steer(&snapshot, player, Direction::East),
            Some(Intent::Duel {
                opponent: RobotId::new(1),
                cell: CellCoord::new(4, 3),
            }),
        );
        assert_eq!(
            steer(&snapshot, player, Direction::North),
            Some(Intent::Collect {
                battery: BatteryId::new(0),
                cell: CellCoord::new(3, 2),
            }),
        );
        assert_eq!(
            steer(&snapshot, player, Direction::West),
            Some(Intent::Move {
                direction: Direction::West,
            }),
        );
        assert_eq!(steer(&snapshot, RobotId::new(3), Direction::West), None);
        assert_eq!(steer(&snapshot, RobotId::new(3), Direction::East), None);
    }
}
