use std::time::Duration;

use robot_arena_core::{ArenaConfig, BatteryId, BatteryState, ConfigError, RobotId, StaleReason};
use robot_arena_system_agent::Backoff;
use robot_arena_system_deadlock::{DeadlockDrill, DrillConfig, DrillError};
use robot_arena_world::{ActOutcome, Arena, LockOrder};

fn drill_config() -> ArenaConfig {
    ArenaConfig {
        columns: 12,
        rows: 8,
        seed: Some(41),
        ..ArenaConfig::default()
    }
}

fn quick_drill() -> DeadlockDrill {
    DeadlockDrill::new(DrillConfig {
        lock_timeout: Duration::from_millis(60),
        hold: Duration::from_millis(10),
        max_attempts: 16,
        backoff: Backoff {
            min: Duration::from_millis(2),
            max: Duration::from_millis(30),
            max_growth: 4,
        },
    })
}

#[test]
fn staged_arena_flanks_a_single_battery() {
    let arena = DeadlockDrill::stage(drill_config()).expect("stage is valid");
    let _ = arena.ensure_initialized().expect("setup succeeds");
    let snapshot = arena.snapshot();

    assert_eq!(snapshot.batteries.len(), 1);
    let battery = snapshot.batteries[0].cell;
    for robot in [RobotId::new(1), RobotId::new(2)] {
        let cell = snapshot.robot(robot).expect("robot exists").cell;
        assert!(cell.is_adjacent(battery), "{robot} sits at {cell}");
    }
    assert_eq!(snapshot.robots.len(), 4);
}

#[test]
fn drill_detects_the_circular_wait_and_resolves_it() {
    let arena = DeadlockDrill::stage(drill_config()).expect("stage is valid");

    let report = quick_drill().run(&arena).expect("drill resolves");

    assert!(report.deadlocks_detected() >= 1, "no deadlock observed: {report:?}");
    assert_eq!(report.contenders[0].order, LockOrder::Misordered);
    assert_eq!(report.contenders[1].order, LockOrder::Ordered);

    let collector = report.collector().expect("someone collects the battery");
    let committed = report
        .contenders
        .iter()
        .filter(|contender| contender.outcome.is_committed())
        .count();
    assert_eq!(committed, 1);
    let loser = report
        .contenders
        .iter()
        .find(|contender| contender.robot != collector)
        .expect("two contenders");
    assert_eq!(loser.outcome, ActOutcome::Stale(StaleReason::BatteryCollected));

    let snapshot = arena.snapshot();
    let battery = snapshot.battery(BatteryId::new(0)).expect("battery exists");
    assert_eq!(battery.state, BatteryState::Collected { by: collector });
    let energy = snapshot
        .robot(collector)
        .expect("collector exists")
        .attributes
        .energy;
    assert_eq!(energy, 70);
    assert_eq!(arena.audit(), Ok(()));
}

#[test]
fn drill_needs_a_flanked_battery() {
    let arena = Arena::new(ArenaConfig {
        battery_count: 0,
        ..drill_config()
    })
    .expect("configuration is valid");

    assert_eq!(quick_drill().run(&arena), Err(DrillError::NoContest));
}

#[test]
fn narrow_grids_cannot_stage_the_drill() {
    let config = ArenaConfig {
        columns: 4,
        rows: 8,
        barrier_count: 0,
        battery_count: 0,
        ..ArenaConfig::default()
    };

    assert!(matches!(
        DeadlockDrill::stage(config),
        Err(ConfigError::InvalidLayout(_))
    ));
}
