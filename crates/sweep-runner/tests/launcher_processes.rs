#![cfg(unix)]

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sweep_runner::job::{build_job_queue, cartesian_triples};
use sweep_runner::{ChildOutput, LaunchOptions, Launcher, OutputLayout, SweepPaths};

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "rawsim_sweep_it_{}_{}_{}",
        tag,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn options(dir: &Path, parallelism: usize) -> LaunchOptions {
    LaunchOptions {
        parallelism,
        poll_interval: Duration::from_millis(20),
        dispatch_delay: Duration::ZERO,
        working_dir: dir.to_path_buf(),
        output: ChildOutput::Null,
    }
}

#[test]
fn every_job_runs_once_with_a_seed() {
    let dir = scratch_dir("seeds");
    let paths = SweepPaths {
        experiment_dir: dir.join("out"),
        program: names(&[
            "sh",
            "-c",
            r#"mkdir -p "$3" && echo "$4" >> "$3/seeds.txt""#,
        ]),
        ..SweepPaths::default()
    };
    let triples = cartesian_triples(
        &names(&["Sv5r10", "Sv5r20"]),
        &names(&["JOSi1000o500"]),
        &names(&["SAIn"]),
    );
    let jobs = build_job_queue(2, &triples, &paths, OutputLayout::PerBaseInstance).expect("queue");

    // One slot keeps the appends to seeds.txt from interleaving.
    let summary = Launcher::new(jobs, options(&dir, 1))
        .expect("launcher")
        .run()
        .expect("run");
    assert_eq!(summary.dispatched, 4);

    let seeds = fs::read_to_string(dir.join("out").join("Sv5").join("seeds.txt")).expect("seeds");
    let lines: Vec<&str> = seeds.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines
        .iter()
        .all(|l| l.len() == 10 && l.chars().all(|c| c.is_ascii_digit())));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn failing_children_vacate_their_slot() {
    let dir = scratch_dir("failing");
    let paths = SweepPaths {
        experiment_dir: dir.clone(),
        program: names(&["sh", "-c", "sleep 0.05; exit 3"]),
        ..SweepPaths::default()
    };
    let triples = cartesian_triples(&names(&["A", "B", "C"]), &names(&["S"]), &names(&["C"]));
    let jobs = build_job_queue(1, &triples, &paths, OutputLayout::Flat).expect("queue");

    let summary = Launcher::new(jobs, options(&dir, 2))
        .expect("launcher")
        .run()
        .expect("run");
    assert_eq!(summary.total_jobs, 3);
    assert_eq!(summary.dispatched, 3);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_program_aborts_the_run() {
    let dir = scratch_dir("missing");
    let paths = SweepPaths {
        experiment_dir: dir.clone(),
        program: names(&["rawsim-sweep-no-such-simulator"]),
        ..SweepPaths::default()
    };
    let triples = cartesian_triples(&names(&["A"]), &names(&["S"]), &names(&["C"]));
    let jobs = build_job_queue(1, &triples, &paths, OutputLayout::Flat).expect("queue");

    let err = Launcher::new(jobs, options(&dir, 1))
        .expect("launcher")
        .run()
        .err()
        .expect("spawn must fail");
    assert!(err.to_string().contains("failed to spawn"));
    let _ = fs::remove_dir_all(dir);
}
