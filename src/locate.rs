//! Discovery of an installed MPI runtime library.
//!
//! The locator builds an ordered list of directories from the environment and
//! well-known install prefixes, then returns the first candidate library file
//! that exists. Search order:
//!
//! 1. `MACROMPI_RUNTIME`: explicit file, used as-is
//! 2. `$MPI_HOME/lib`, `$MPI_ROOT/lib`
//! 3. `-L` directories reported by `mpicc -show` (`$MPICC` overrides)
//! 4. `$CRAY_MPICH_DIR/lib`
//! 5. `LD_LIBRARY_PATH` entries
//! 6. common prefixes (`/usr/lib64/openmpi/lib`, `/usr/local/lib`, ...)

use crate::config::Config;
use crate::error::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Well-known library directories, searched last.
const COMMON_DIRS: &[&str] = &[
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/usr/lib64/openmpi/lib",
    "/usr/lib64/mpich/lib",
    "/usr/lib/x86_64-linux-gnu/openmpi/lib",
    "/usr/lib64",
    "/usr/lib",
    "/usr/local/lib",
    "/opt/openmpi/lib",
    "/opt/mpich/lib",
];

/// Library file names tried in every directory, in order.
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libmpi.dylib", "libmpi.40.dylib", "libmpich.dylib"];
#[cfg(windows)]
const LIBRARY_NAMES: &[&str] = &["msmpi.dll", "impi.dll"];
#[cfg(not(any(target_os = "macos", windows)))]
const LIBRARY_NAMES: &[&str] = &[
    "libmpi.so",
    "libmpi.so.40",
    "libmpi.so.12",
    "libmpich.so",
    "libmpich.so.12",
];

/// Finds the MPI shared library on this host.
#[derive(Debug, Clone, Default)]
pub struct RuntimeLocator {
    explicit: Option<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl RuntimeLocator {
    /// Locator over an explicit list of directories and nothing else.
    pub fn with_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut locator = RuntimeLocator::default();
        for dir in dirs {
            locator.push_dir(dir.into());
        }
        locator
    }

    /// Locator using the configured override plus every environment hint
    /// and the common install prefixes.
    pub fn from_config(config: &Config) -> Self {
        let mut locator = RuntimeLocator {
            explicit: config.runtime_path.clone(),
            dirs: Vec::new(),
        };

        for var in ["MPI_HOME", "MPI_ROOT"] {
            if let Some(prefix) = env::var_os(var) {
                locator.push_dir(PathBuf::from(prefix).join("lib"));
            }
        }

        match mpicc_link_dirs() {
            Ok(dirs) => {
                for dir in dirs {
                    locator.push_dir(dir);
                }
            }
            Err(reason) => debug!(%reason, "mpicc not usable for runtime discovery"),
        }

        if let Some(prefix) = env::var_os("CRAY_MPICH_DIR") {
            locator.push_dir(PathBuf::from(prefix).join("lib"));
        }

        if let Some(paths) = env::var_os("LD_LIBRARY_PATH") {
            for dir in env::split_paths(&paths) {
                locator.push_dir(dir);
            }
        }

        for dir in COMMON_DIRS {
            locator.push_dir(PathBuf::from(dir));
        }

        locator
    }

    fn push_dir(&mut self, dir: PathBuf) {
        if !dir.as_os_str().is_empty() && !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    /// Directories that will be searched, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Return the first existing runtime library.
    ///
    /// # Errors
    ///
    /// [`Error::RuntimeUnavailable`] if no candidate exists.
    pub fn locate(&self) -> Result<PathBuf> {
        let mut searched = Vec::new();

        if let Some(path) = &self.explicit {
            if path.is_file() {
                info!(path = %path.display(), "using configured MPI runtime");
                return Ok(path.clone());
            }
            searched.push(path.clone());
        }

        for dir in &self.dirs {
            if let Some(found) = find_in(dir) {
                info!(path = %found.display(), "found MPI runtime");
                return Ok(found);
            }
            searched.push(dir.clone());
        }

        Err(Error::RuntimeUnavailable { searched })
    }
}

/// Locate the runtime with the environment-derived search list.
pub fn locate(config: &Config) -> Result<PathBuf> {
    RuntimeLocator::from_config(config).locate()
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    LIBRARY_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn mpicc_link_dirs() -> std::result::Result<Vec<PathBuf>, String> {
    let mpicc = env::var_os("MPICC").unwrap_or_else(|| OsString::from("mpicc"));

    let output = Command::new(&mpicc)
        .arg("-show")
        .output()
        .map_err(|e| format!("failed to run '{}': {e}", mpicc.to_string_lossy()))?;

    if !output.status.success() {
        return Err("mpicc -show failed".to_string());
    }

    Ok(parse_mpicc_show(&String::from_utf8_lossy(&output.stdout)))
}

/// Extract library directories from `mpicc -show` output.
///
/// Both `-L<dir>` and `-Wl,-rpath,<dir>` forms are honored.
fn parse_mpicc_show(output: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    for part in output.split_whitespace() {
        if let Some(path) = part.strip_prefix("-L") {
            dirs.push(PathBuf::from(path));
        } else if let Some(rest) = part.strip_prefix("-Wl,-rpath,") {
            dirs.extend(rest.split(',').map(PathBuf::from));
        }
    }

    dirs
}
