use std::process::{Command, Output};

fn robot_arena(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_robot-arena"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch the robot-arena binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn oversized_grids_are_rejected_at_startup() {
    let output = robot_arena(&["--no-viewer", "--columns", "5000"]);

    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("invalid arena configuration"), "{message}");
    assert!(message.contains("too large"), "{message}");
}

#[test]
fn too_few_robots_are_rejected_at_startup() {
    let output = robot_arena(&["--no-viewer", "--robots", "3"]);

    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("at least 4 are required"), "{message}");
}

#[test]
fn missing_settings_files_are_reported() {
    let output = robot_arena(&["--no-viewer", "--config", "does-not-exist.toml"]);

    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("failed to read settings file"), "{message}");
}

#[test]
fn headless_match_prints_the_outcome() {
    let output = robot_arena(&[
        "--no-viewer",
        "--columns",
        "12",
        "--rows",
        "8",
        "--batteries",
        "4",
        "--barriers",
        "4",
        "--seed",
        "11",
        "--cycle-ms",
        "2",
        "--housekeeping-ms",
        "5",
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    let printed = stdout(&output);
    let last = printed.lines().last().unwrap_or_default();
    assert!(
        last.ends_with(" wins") || last == "no survivors",
        "unexpected outcome line {last:?}"
    );
}

#[test]
fn deadlock_drill_reports_its_recovery() {
    let output = robot_arena(&["--deadlock-drill", "--seed", "3"]);

    assert!(output.status.success(), "{}", stderr(&output));
    let report = stdout(&output);
    assert!(report.starts_with("deadlocks detected: "), "{report}");
    assert!(report.contains("resolved: "), "{report}");
}
