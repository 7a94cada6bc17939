//! Progress logging through the macro host facade.
//!
//! Every rank registers two tasks, reports its task table and then a few
//! progress values, some of them repeated or out of range. The files land in
//! `MACROMPI_LOG_DIR` (the current directory by default) as
//! `progress_<rank>.plog` and `report_<rank>.tlog`.
//!
//! Run with: mpiexec -n 4 cargo run --example progress_report

use macrompi::{MacroHost, SUCCESS};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = MacroHost::from_env();
    if host.initialise() != SUCCESS {
        eprintln!("could not start MPI");
        std::process::exit(1);
    }

    let rank = host.get_rank();
    let started = Instant::now();

    let load = host.add_task("load");
    let filter = host.add_task("filter");
    host.report_tasks();

    for progress in [0, 25, 25, 50, 40, 100] {
        host.report_progress(load, progress);
    }

    let share = host
        .scatter_equally("1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0", 7, 0)
        .unwrap_or_default();
    host.report_text(&format!("rank {rank} filters [{share}]"));

    for step in 1..=4 {
        host.report_progress(filter, step * 25);
    }
    let last = host.report_progress(filter, 150);
    host.report_text(&format!(
        "rank {rank} done in {:.3} s, last filter progress {last}",
        started.elapsed().as_secs_f64()
    ));

    host.barrier();
    if rank == 0 {
        println!("Logs written, see progress_<rank>.plog and report_<rank>.tlog");
    }
    host.finalise();
}
