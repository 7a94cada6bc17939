//! Macro host facade over a simulated runtime.

mod common;

use common::SimRuntime;
use macrompi::{Communicator, Config, Lifecycle, MacroHost, FAILURE, SUCCESS};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn host_in(dir: &Path, runtime: SimRuntime) -> MacroHost {
    let config = Config {
        log_dir: dir.to_path_buf(),
        ..Config::default()
    };
    let host = MacroHost::with_communicator(config, Communicator::new(Box::new(runtime)));
    assert_eq!(host.initialise(), SUCCESS);
    host
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn progress_file_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_in(dir.path(), SimRuntime::new(0, 4));

    assert_eq!(host.add_task("load"), 0);
    assert_eq!(host.add_task("compute"), 1);
    assert_eq!(host.report_tasks(), SUCCESS);
    assert_eq!(host.add_task("late"), FAILURE);

    assert_eq!(host.report_progress(0, 50), SUCCESS);
    assert_eq!(host.report_progress(0, 30), SUCCESS);
    assert_eq!(host.report_progress(0, 101), 50);
    assert_eq!(host.report_progress(1, -4), FAILURE);
    assert!(host.report_progress(7, 10) < 0);

    assert_eq!(
        lines(&dir.path().join("progress_0.plog")),
        ["4", "0,load", "1,compute", "0,50"]
    );
}

#[test]
fn files_are_named_after_the_rank() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_in(dir.path(), SimRuntime::new(3, 4));

    assert_eq!(host.get_rank(), 3);
    assert_eq!(host.get_size(), 4);
    assert_eq!(host.report_text("rank three checking in"), SUCCESS);
    assert_eq!(host.report_text("done"), SUCCESS);

    assert_eq!(
        lines(&dir.path().join("report_3.tlog")),
        ["rank three checking in", "done"]
    );
}

#[test]
fn text_collectives() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<f64> = (0..10).map(f64::from).collect();
    let host = host_in(dir.path(), SimRuntime::new(1, 3).with_root_data(&data));

    assert_eq!(host.scatter_equally("", 10, 0).as_deref(), Some("4.0, 5.0, 6.0"));
    assert_eq!(host.scatter("", 3, 3, 0).as_deref(), Some("3.0, 4.0, 5.0"));
    assert_eq!(host.gather("6.0, 7.0", 2, 2, 0).as_deref(), Some(""));
    assert_eq!(host.gather_equally("4.0, 5.0, 6.0", 10, 0).as_deref(), Some(""));
    assert_eq!(host.scatter_equally("", -1, 0), None);
    assert_eq!(host.scatter("1.0, nope", 1, 1, 1), None);
    assert_eq!(host.barrier(), SUCCESS);
}

#[test]
fn lifecycle_through_host() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_in(dir.path(), SimRuntime::new(0, 1));
    assert_eq!(host.lifecycle(), Lifecycle::Initialised);
    assert!(host.initialise() < 0);

    assert_eq!(host.finalise(), SUCCESS);
    assert_eq!(host.lifecycle(), Lifecycle::Finalised);
    assert_eq!(host.get_rank(), FAILURE);
    assert!(host.barrier() < 0);
}

#[test]
fn concurrent_progress_stays_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(host_in(dir.path(), SimRuntime::new(0, 2)));
    let task = host.add_task("tiles");
    assert_eq!(host.report_tasks(), SUCCESS);

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let host = Arc::clone(&host);
            thread::spawn(move || {
                for step in 0..=100 {
                    let value = (step + worker * 7) % 101;
                    host.report_progress(task, value);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let recorded: Vec<i32> = lines(&dir.path().join("progress_0.plog"))
        .iter()
        .skip(2)
        .map(|line| line.split_once(',').unwrap().1.parse().unwrap())
        .collect();
    assert!(!recorded.is_empty());
    assert!(recorded.windows(2).all(|w| w[0] < w[1]), "{recorded:?}");
    assert_eq!(recorded.last(), Some(&100));
}

#[test]
fn reset_allows_a_new_task_table() {
    let dir = tempfile::tempdir().unwrap();
    let host = host_in(dir.path(), SimRuntime::new(0, 1));
    host.add_task("first");
    host.report_tasks();

    host.reset_tasks();
    assert_eq!(host.add_task("second"), 0);
    assert_eq!(host.report_tasks(), SUCCESS);
    assert_eq!(lines(&dir.path().join("progress_0.plog")), ["1", "0,second"]);
}
