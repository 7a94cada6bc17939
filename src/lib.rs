//! # macrompi
//!
//! Distributed array work for macro-driven image processing hosts, on top of
//! whatever MPI implementation is installed on the machine.
//!
//! This crate binds to MPI at run time instead of build time, providing:
//! - Discovery of the installed MPI library ([`RuntimeLocator`])
//! - Late binding through `dlopen` for Open MPI and MPICH-ABI runtimes
//! - Safe, generic scatter/gather collectives ([`Communicator`])
//! - Conversion between the host's `"1.0, 2.0"` array text and native buffers
//!   ([`encode`], [`decode`], [`Partition`])
//! - Per-rank, append-only progress and report logs ([`ProgressLedger`])
//! - A value-returned facade for macro interpreters ([`MacroHost`])
//!
//! ## Supported Types
//!
//! Collectives are generic over [`Element`]: `f64`, `bool`, `u8`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use macrompi::{Communicator, Config};
//!
//! fn main() -> Result<(), macrompi::Error> {
//!     let config = Config::from_env();
//!     let mut world = Communicator::discover(&config)?;
//!     world.initialise(&config.init_args())?;
//!
//!     let rank = world.rank()?;
//!     let size = world.size()?;
//!     println!("Hello from rank {} of {}", rank, size);
//!
//!     // Rank 0 keeps the remainder of an uneven split
//!     let data: Vec<f64> = (0..10).map(f64::from).collect();
//!     let mine = world.scatter_equally(&data, data.len(), 0)?;
//!     println!("Rank {rank}: {mine:?}");
//!
//!     world.finalise()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime Discovery
//!
//! | Source | Description |
//! |--------|-------------|
//! | `MACROMPI_RUNTIME` | explicit library path |
//! | `MPI_HOME`, `MPI_ROOT` | install prefixes |
//! | `mpicc -show` | library directories of the MPI compiler wrapper |
//! | `CRAY_MPICH_DIR`, `LD_LIBRARY_PATH` | Cray and loader search paths |
//! | common prefixes | `/usr/lib64/openmpi/lib`, `/opt/mpich/lib`, ... |
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber in the
//! application to see them.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod binding;
mod codec;
mod comm;
mod config;
mod datatype;
mod error;
mod ffi;
mod host;
mod ledger;
mod locate;
mod runtime;

pub use binding::bind;
pub use codec::{decode, encode, Partition, SEPARATOR};
pub use comm::Communicator;
pub use config::{Config, DEFAULT_PROGRAM_NAME};
pub use datatype::{Element, ElementKind};
pub use error::{Error, Result};
pub use host::{MacroHost, FAILURE, SUCCESS};
pub use ledger::{ProgressLedger, ProgressUpdate};
pub use locate::{locate, RuntimeLocator};
pub use runtime::{Lifecycle, Runtime};
