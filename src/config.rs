//! Environment-driven configuration.
//!
//! # Environment Variables
//!
//! | Field | Variable | Default |
//! |-------|----------|---------|
//! | `runtime_path` | `MACROMPI_RUNTIME` | search (see [`RuntimeLocator`](crate::RuntimeLocator)) |
//! | `log_dir` | `MACROMPI_LOG_DIR` | current directory |
//! | `program_name` | `MACROMPI_PROGRAM` | `ImageJ-linux64` |

use std::env;
use std::path::PathBuf;

/// `argv[0]` handed to `MPI_Init` when nothing else is configured.
pub const DEFAULT_PROGRAM_NAME: &str = "ImageJ-linux64";

/// Settings for runtime discovery and progress logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit MPI library; skips the search when it exists.
    pub runtime_path: Option<PathBuf>,
    /// Directory receiving the per-rank `.plog` and `.tlog` files.
    pub log_dir: PathBuf,
    /// Program name passed as the first argument to `MPI_Init`.
    pub program_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime_path: None,
            log_dir: PathBuf::from("."),
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
        }
    }
}

impl Config {
    /// Read the configuration from `MACROMPI_*` variables.
    ///
    /// Empty variables count as unset.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            runtime_path: non_empty("MACROMPI_RUNTIME").map(PathBuf::from),
            log_dir: non_empty("MACROMPI_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            program_name: non_empty("MACROMPI_PROGRAM").unwrap_or(defaults.program_name),
        }
    }

    /// Argument vector for `MPI_Init`.
    pub fn init_args(&self) -> Vec<String> {
        vec![self.program_name.clone()]
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.runtime_path, None);
        assert_eq!(config.log_dir, PathBuf::from("."));
        assert_eq!(config.init_args(), vec!["ImageJ-linux64".to_string()]);
    }

    /// Tests that mutate environment variables are combined into a single test
    /// to avoid data races when tests run in parallel.
    #[test]
    fn env_var_parsing() {
        unsafe {
            env::set_var("MACROMPI_RUNTIME", "/opt/mpi/lib/libmpi.so");
            env::set_var("MACROMPI_LOG_DIR", "/scratch/logs");
            env::remove_var("MACROMPI_PROGRAM");
        }
        let config = Config::from_env();
        assert_eq!(
            config.runtime_path,
            Some(PathBuf::from("/opt/mpi/lib/libmpi.so"))
        );
        assert_eq!(config.log_dir, PathBuf::from("/scratch/logs"));
        assert_eq!(config.program_name, DEFAULT_PROGRAM_NAME);

        // --- empty values fall back to defaults ---
        unsafe {
            env::set_var("MACROMPI_RUNTIME", "");
            env::set_var("MACROMPI_LOG_DIR", "");
            env::set_var("MACROMPI_PROGRAM", "fiji");
        }
        let config = Config::from_env();
        assert_eq!(config.runtime_path, None);
        assert_eq!(config.log_dir, PathBuf::from("."));
        assert_eq!(config.init_args(), vec!["fiji".to_string()]);

        unsafe {
            env::remove_var("MACROMPI_RUNTIME");
            env::remove_var("MACROMPI_LOG_DIR");
            env::remove_var("MACROMPI_PROGRAM");
        }
    }
}
