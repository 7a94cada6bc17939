//! Hello World example - locate, bind and initialize the installed MPI.
//!
//! Run with: mpiexec -n 4 cargo run --example hello_world
//!
//! Set `RUST_LOG=macrompi=debug` to see which library was picked.

use macrompi::{Communicator, Config, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Find and bind the runtime
    let config = Config::from_env();
    let mut world = Communicator::discover(&config)?;
    world.initialise(&config.init_args())?;

    let rank = world.rank()?;
    let size = world.size()?;

    println!(
        "Hello from rank {} of {} ({})",
        rank,
        size,
        world.flavor().unwrap_or("unknown")
    );

    // Synchronize before exiting
    world.barrier()?;

    if rank == 0 {
        println!("\nAll processes reported in. Test passed!");
    }

    world.finalise()
}
