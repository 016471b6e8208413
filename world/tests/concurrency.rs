use std::{collections::HashSet, sync::Barrier, thread, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use robot_arena_core::{
    ArenaConfig, BatteryId, Cell, CellCoord, Direction, Intent, RobotAttributes, RobotId,
    StaleReason, MAX_ENERGY,
};
use robot_arena_world::{
    ActOutcome, Arena, BoundedCollect, Initialization, Layout, LockOrder, Resource, RobotSeed,
    TransactionError,
};

fn seed(column: u32, row: u32, force: u32, energy: u32) -> RobotSeed {
    RobotSeed {
        cell: CellCoord::new(column, row),
        attributes: RobotAttributes {
            force,
            energy,
            velocity: 1,
        },
    }
}

fn arena(robots: Vec<RobotSeed>, batteries: Vec<CellCoord>) -> Arena {
    let config = ArenaConfig {
        columns: 12,
        rows: 8,
        seed: Some(5),
        ..ArenaConfig::default()
    };
    let layout = Layout {
        barriers: Vec::new(),
        robots,
        batteries,
    };
    let arena = Arena::with_layout(config, layout).expect("layout is valid");
    let _ = arena.ensure_initialized().expect("setup succeeds");
    arena
}

#[test]
fn initialization_runs_exactly_once_under_contention() {
    let arena = Arena::new(ArenaConfig {
        robot_count: 8,
        seed: Some(99),
        ..ArenaConfig::default()
    })
    .expect("configuration is valid");
    let start = Barrier::new(8);

    let results: Vec<Initialization> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let _ = start.wait();
                    arena.ensure_initialized().expect("setup succeeds")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("initializer panicked"))
            .collect()
    });

    let performed = results
        .iter()
        .filter(|result| **result == Initialization::Performed)
        .count();
    assert_eq!(performed, 1);
    assert_eq!(arena.snapshot().robots.len(), 8);
    assert_eq!(arena.audit(), Ok(()));
}

#[test]
fn a_contested_battery_is_collected_once() {
    let battery = CellCoord::new(5, 3);
    let arena = arena(
        vec![
            seed(4, 3, 2, 30),
            seed(6, 3, 2, 30),
            seed(5, 2, 2, 30),
            seed(5, 4, 2, 30),
        ],
        vec![battery],
    );
    let start = Barrier::new(4);

    let outcomes: Vec<ActOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = arena
            .robot_ids()
            .map(|robot| {
                let arena = &arena;
                let start = &start;
                scope.spawn(move || {
                    let mut events = Vec::new();
                    let _ = start.wait();
                    arena
                        .act(
                            robot,
                            Intent::Collect {
                                battery: BatteryId::new(0),
                                cell: battery,
                            },
                            &mut events,
                        )
                        .expect("no invariant is violated")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("collector panicked"))
            .collect()
    });

    let committed = outcomes.iter().filter(|outcome| outcome.is_committed()).count();
    assert_eq!(committed, 1);
    assert!(outcomes
        .iter()
        .filter(|outcome| !outcome.is_committed())
        .all(|outcome| *outcome == ActOutcome::Stale(StaleReason::BatteryCollected)));

    let energies: Vec<u32> = arena
        .snapshot()
        .robots
        .iter()
        .map(|robot| robot.attributes.energy)
        .collect();
    assert_eq!(energies.iter().sum::<u32>(), 4 * 30 + 20);
    assert_eq!(arena.audit(), Ok(()));
}

#[test]
fn simultaneous_challenges_resolve_a_single_duel() {
    let arena = arena(
        vec![
            seed(3, 3, 8, 50),
            seed(4, 3, 3, 40),
            seed(10, 1, 1, 60),
            seed(10, 6, 1, 60),
        ],
        Vec::new(),
    );
    let start = Barrier::new(2);
    let pairs = [
        (RobotId::new(0), RobotId::new(1), CellCoord::new(4, 3)),
        (RobotId::new(1), RobotId::new(0), CellCoord::new(3, 3)),
    ];

    let outcomes: Vec<ActOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = pairs
            .into_iter()
            .map(|(robot, opponent, cell)| {
                let arena = &arena;
                let start = &start;
                scope.spawn(move || {
                    let mut events = Vec::new();
                    let _ = start.wait();
                    arena
                        .act(robot, Intent::Duel { opponent, cell }, &mut events)
                        .expect("no invariant is violated")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("duellist panicked"))
            .collect()
    });

    assert_eq!(
        outcomes.iter().filter(|outcome| outcome.is_committed()).count(),
        1
    );
    let snapshot = arena.snapshot();
    assert!(snapshot.robot(RobotId::new(0)).is_some_and(|robot| robot.is_alive()));
    assert!(snapshot.robot(RobotId::new(1)).is_some_and(|robot| !robot.is_alive()));
    assert_eq!(arena.audit(), Ok(()));
}

#[test]
fn random_traffic_preserves_invariants() {
    let arena = Arena::new(ArenaConfig {
        columns: 16,
        rows: 10,
        robot_count: 8,
        battery_count: 12,
        barrier_count: 10,
        seed: Some(2024),
        ..ArenaConfig::default()
    })
    .expect("configuration is valid");
    let _ = arena.ensure_initialized().expect("setup succeeds");

    thread::scope(|scope| {
        for robot in arena.robot_ids() {
            let arena = &arena;
            let _ = scope.spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(u64::from(robot.get()));
                let mut events = Vec::new();
                for _ in 0..400 {
                    let snapshot = arena.snapshot();
                    let Some(me) = snapshot.robot(robot).filter(|me| me.is_alive()) else {
                        break;
                    };
                    let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                    let intent = match me.cell.step(direction).and_then(|cell| {
                        snapshot.cell(cell).map(|contents| (cell, contents))
                    }) {
                        Some((cell, Cell::Robot(opponent))) => {
                            Intent::Duel { opponent, cell }
                        }
                        Some((cell, Cell::Battery(battery))) => {
                            Intent::Collect { battery, cell }
                        }
                        _ => Intent::Move { direction },
                    };
                    let _ = arena
                        .act(robot, intent, &mut events)
                        .expect("no invariant is violated");
                    let _ = arena
                        .metabolize(robot, &mut events)
                        .expect("no invariant is violated");
                }
            });
        }
    });

    assert_eq!(arena.audit(), Ok(()));
    let snapshot = arena.snapshot();
    let mut occupied = HashSet::new();
    for robot in snapshot.robots.iter().filter(|robot| robot.is_alive()) {
        assert!(robot.attributes.energy <= MAX_ENERGY);
        assert!(occupied.insert(robot.cell), "two robots share {}", robot.cell);
    }
}

#[test]
fn opposite_lock_orders_deadlock_and_time_out() {
    let battery = CellCoord::new(5, 3);
    let arena = arena(
        vec![
            seed(4, 3, 2, 30),
            seed(6, 3, 2, 30),
            seed(10, 1, 1, 60),
            seed(10, 6, 1, 60),
        ],
        vec![battery],
    );
    let both_hold_first_lock = Barrier::new(2);
    let timeout = Duration::from_millis(100);
    let attempts = [
        (RobotId::new(0), LockOrder::Misordered),
        (RobotId::new(1), LockOrder::Ordered),
    ];

    let results: Vec<Result<ActOutcome, TransactionError>> = thread::scope(|scope| {
        let handles: Vec<_> = attempts
            .into_iter()
            .map(|(robot, order)| {
                let arena = &arena;
                let barrier = &both_hold_first_lock;
                scope.spawn(move || {
                    let mut events = Vec::new();
                    arena.collect_within(
                        BoundedCollect {
                            robot,
                            battery: BatteryId::new(0),
                            cell: battery,
                            order,
                            timeout,
                        },
                        || {
                            let _ = barrier.wait();
                        },
                        &mut events,
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("collector panicked"))
            .collect()
    });

    let timeouts: Vec<Resource> = results
        .iter()
        .filter_map(|result| match result {
            Err(TransactionError::Timeout(timeout)) => Some(timeout.resource),
            _ => None,
        })
        .collect();
    assert!(!timeouts.is_empty(), "circular wait went undetected: {results:?}");
    assert!(timeouts
        .iter()
        .all(|resource| matches!(resource, Resource::Grid | Resource::Battery(_))));
    assert!(results
        .iter()
        .all(|result| !matches!(result, Err(TransactionError::Invariant(_)))));
    let committed = results
        .iter()
        .filter(|result| matches!(result, Ok(outcome) if outcome.is_committed()))
        .count();
    assert!(committed <= 1);
    assert_eq!(arena.audit(), Ok(()));
}
