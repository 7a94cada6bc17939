//! Safe collective operations over a bound runtime.

use crate::binding;
use crate::codec::{self, Partition};
use crate::config::Config;
use crate::datatype::Element;
use crate::error::{Error, Result};
use crate::locate::RuntimeLocator;
use crate::runtime::{Lifecycle, Runtime};
use tracing::{debug, info};

/// The world communicator of a late-bound MPI runtime.
///
/// Owns the capability handle and the lifecycle state. Every collective is
/// rejected with [`Error::State`] unless the communicator is
/// [`Initialised`](Lifecycle::Initialised), and all arguments are checked
/// before the runtime is called, so a failed operation never leaves a
/// half-written buffer behind.
///
/// # Example
///
/// ```no_run
/// use macrompi::{Communicator, Config};
///
/// let config = Config::from_env();
/// let mut world = Communicator::discover(&config).unwrap();
/// world.initialise(&config.init_args()).unwrap();
///
/// let part = world.scatter_equally(&[1.0, 2.0, 3.0, 4.0, 5.0], 5, 0).unwrap();
/// println!("rank {} got {:?}", world.rank().unwrap(), part);
///
/// world.finalise().unwrap();
/// ```
pub struct Communicator {
    runtime: Option<Box<dyn Runtime>>,
    state: Lifecycle,
}

impl Communicator {
    /// Communicator with no runtime behind it.
    pub fn unbound() -> Self {
        Communicator {
            runtime: None,
            state: Lifecycle::Unbound,
        }
    }

    /// Communicator over an already bound runtime.
    pub fn new(runtime: Box<dyn Runtime>) -> Self {
        Communicator {
            runtime: Some(runtime),
            state: Lifecycle::Bound,
        }
    }

    /// Locate and bind the installed MPI runtime.
    pub fn discover(config: &Config) -> Result<Self> {
        let path = RuntimeLocator::from_config(config).locate()?;
        Ok(Communicator::new(binding::bind(&path)?))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Name of the bound implementation family.
    pub fn flavor(&self) -> Option<&str> {
        self.runtime.as_deref().map(|rt| rt.flavor())
    }

    fn runtime_in(&self, operation: &'static str, expected: Lifecycle) -> Result<&dyn Runtime> {
        match self.runtime.as_deref() {
            Some(runtime) if self.state == expected => Ok(runtime),
            _ => Err(Error::State {
                operation,
                state: self.state,
            }),
        }
    }

    fn active(&self, operation: &'static str) -> Result<&dyn Runtime> {
        self.runtime_in(operation, Lifecycle::Initialised)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize the runtime; must precede every collective.
    pub fn initialise(&mut self, args: &[String]) -> Result<()> {
        if self.state != Lifecycle::Bound {
            return Err(Error::State {
                operation: "initialise",
                state: self.state,
            });
        }
        if let Some(runtime) = self.runtime.as_deref_mut() {
            runtime.init(args)?;
            info!(flavor = runtime.flavor(), "MPI initialised");
        }
        self.state = Lifecycle::Initialised;
        Ok(())
    }

    /// Finalize the runtime; no collective may follow.
    pub fn finalise(&mut self) -> Result<()> {
        if self.state != Lifecycle::Initialised {
            return Err(Error::State {
                operation: "finalise",
                state: self.state,
            });
        }
        if let Some(runtime) = self.runtime.as_deref_mut() {
            runtime.finalize()?;
        }
        self.state = Lifecycle::Finalised;
        info!("MPI finalised");
        Ok(())
    }

    /// Whether the runtime reports itself initialized.
    pub fn is_initialised(&self) -> Result<bool> {
        match self.runtime.as_deref() {
            Some(runtime) => runtime.is_initialized(),
            None => Ok(false),
        }
    }

    /// Whether the runtime reports itself finalized.
    pub fn is_finalised(&self) -> Result<bool> {
        match self.runtime.as_deref() {
            Some(runtime) => runtime.is_finalized(),
            None => Ok(false),
        }
    }

    // ========================================================================
    // Queries and synchronization
    // ========================================================================

    /// Rank of the calling process.
    pub fn rank(&self) -> Result<i32> {
        self.active("rank")?.rank()
    }

    /// Number of participating processes.
    pub fn size(&self) -> Result<i32> {
        self.active("size")?.size()
    }

    /// Barrier synchronization.
    ///
    /// No process returns until all processes have entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.active("barrier")?.barrier()
    }

    fn participants<T: Element>(&self, operation: &'static str, root: i32) -> Result<Participants<'_>> {
        let runtime = self.active(operation)?;
        if !runtime.supports(T::KIND) {
            return Err(Error::UnsupportedElement(T::KIND));
        }
        let rank = runtime.rank()?;
        let size = runtime.size()?;
        if size <= 0 {
            return Err(Error::InvalidCount(i64::from(size)));
        }
        if rank < 0 || rank >= size {
            return Err(Error::InvalidRank(rank));
        }
        if root < 0 || root >= size {
            return Err(Error::InvalidRank(root));
        }
        Ok(Participants {
            runtime,
            rank: rank as usize,
            size: size as usize,
            root,
        })
    }

    // ========================================================================
    // Scatter
    // ========================================================================

    /// Scatter equal segments of the root's buffer.
    ///
    /// Rank `i` receives elements `[i * send_count, (i + 1) * send_count)` of
    /// `send` as it exists on `root`. `send` is ignored on other ranks. The
    /// returned buffer is freshly allocated with `receive_count` elements.
    pub fn scatter<T: Element>(
        &self,
        send: &[T],
        send_count: usize,
        receive_count: usize,
        root: i32,
    ) -> Result<Vec<T>> {
        let p = self.participants::<T>("scatter", root)?;
        if p.is_root() {
            let needed = send_count
                .checked_mul(p.size)
                .ok_or(Error::InvalidCount(send_count as i64))?;
            check_len("scatter send", send.len(), needed)?;
        }

        let (send_count, recv_count) = (to_count(send_count)?, to_count(receive_count)?);
        let mut recv = vec![0u8; receive_count * T::KIND.size()];
        p.runtime
            .scatter(&T::to_bytes(send), send_count, &mut recv, recv_count, T::KIND, root)?;
        debug!(rank = p.rank, receive_count, "scatter complete");
        Ok(T::from_bytes(&recv))
    }

    /// Scatter segments of different lengths.
    ///
    /// On `root`, rank `i` receives `send_counts[i]` elements starting at
    /// `displs[i]`; both slices must hold one entry per rank there and may be
    /// empty elsewhere.
    pub fn scatterv<T: Element>(
        &self,
        send: &[T],
        send_counts: &[usize],
        displs: &[usize],
        receive_count: usize,
        root: i32,
    ) -> Result<Vec<T>> {
        let p = self.participants::<T>("scatterv", root)?;
        p.scatterv(send, send_counts, displs, receive_count)
    }

    /// Split `total` elements of the root's buffer as evenly as possible.
    ///
    /// Every rank gets `total / size` elements, rank 0 additionally the
    /// remainder, so each element reaches exactly one rank.
    pub fn scatter_equally<T: Element>(&self, send: &[T], total: usize, root: i32) -> Result<Vec<T>> {
        let p = self.participants::<T>("scatter_equally", root)?;
        let counts = Partition::counts(total, p.size)?;
        let displs = Partition::displacements(&counts);
        p.scatterv(send, &counts, &displs, counts[p.rank])
    }

    // ========================================================================
    // Gather
    // ========================================================================

    /// Gather `send_count` elements from every rank into the root.
    ///
    /// The root receives `receive_count * size` elements ordered by rank;
    /// other ranks get an empty buffer.
    pub fn gather<T: Element>(
        &self,
        send: &[T],
        send_count: usize,
        receive_count: usize,
        root: i32,
    ) -> Result<Vec<T>> {
        let p = self.participants::<T>("gather", root)?;
        check_len("gather send", send.len(), send_count)?;

        let recv_len = if p.is_root() {
            receive_count
                .checked_mul(p.size)
                .ok_or(Error::InvalidCount(receive_count as i64))?
        } else {
            0
        };
        let counts = (to_count(send_count)?, to_count(receive_count)?);
        let mut recv = vec![0u8; recv_len * T::KIND.size()];
        p.runtime.gather(
            &T::to_bytes(&send[..send_count]),
            counts.0,
            &mut recv,
            counts.1,
            T::KIND,
            root,
        )?;
        Ok(T::from_bytes(&recv))
    }

    /// Gather segments of different lengths into the root.
    ///
    /// On `root`, rank `i`'s contribution lands at `displs[i]` and must be
    /// `receive_counts[i]` elements long. Other ranks get an empty buffer.
    pub fn gatherv<T: Element>(
        &self,
        send: &[T],
        send_count: usize,
        receive_counts: &[usize],
        displs: &[usize],
        root: i32,
    ) -> Result<Vec<T>> {
        let p = self.participants::<T>("gatherv", root)?;
        p.gatherv(send, send_count, receive_counts, displs)
    }

    /// Inverse of [`scatter_equally`](Self::scatter_equally): collect every
    /// rank's share of `total` elements back into the root.
    pub fn gather_equally<T: Element>(&self, send: &[T], total: usize, root: i32) -> Result<Vec<T>> {
        let p = self.participants::<T>("gather_equally", root)?;
        let counts = Partition::counts(total, p.size)?;
        let displs = Partition::displacements(&counts);
        p.gatherv(send, counts[p.rank], &counts, &displs)
    }

    // ========================================================================
    // Text variants
    // ========================================================================

    /// [`scatter`](Self::scatter) over comma separated text.
    pub fn scatter_text(&self, send: &str, send_count: usize, receive_count: usize, root: i32) -> Result<String> {
        let values = codec::decode(send)?;
        Ok(codec::encode(&self.scatter(&values, send_count, receive_count, root)?))
    }

    /// [`scatter_equally`](Self::scatter_equally) over comma separated text.
    pub fn scatter_equally_text(&self, send: &str, total: usize, root: i32) -> Result<String> {
        let values = codec::decode(send)?;
        Ok(codec::encode(&self.scatter_equally(&values, total, root)?))
    }

    /// [`gather`](Self::gather) over comma separated text.
    pub fn gather_text(&self, send: &str, send_count: usize, receive_count: usize, root: i32) -> Result<String> {
        let values = codec::decode(send)?;
        Ok(codec::encode(&self.gather(&values, send_count, receive_count, root)?))
    }

    /// [`gather_equally`](Self::gather_equally) over comma separated text.
    pub fn gather_equally_text(&self, send: &str, total: usize, root: i32) -> Result<String> {
        let values = codec::decode(send)?;
        Ok(codec::encode(&self.gather_equally(&values, total, root)?))
    }
}

/// Rank, size and root resolved for one collective call.
struct Participants<'a> {
    runtime: &'a dyn Runtime,
    rank: usize,
    size: usize,
    root: i32,
}

impl Participants<'_> {
    fn is_root(&self) -> bool {
        self.rank as i32 == self.root
    }

    /// Check per-rank `counts`/`displs` against a buffer of `len` elements.
    fn check_layout(&self, what: &str, counts: &[usize], displs: &[usize], len: usize) -> Result<()> {
        if counts.len() != self.size || displs.len() != self.size {
            return Err(Error::InvalidBuffer(format!(
                "{what} needs {} counts and displacements, got {} and {}",
                self.size,
                counts.len(),
                displs.len()
            )));
        }
        for (&count, &displ) in counts.iter().zip(displs) {
            let end = displ
                .checked_add(count)
                .ok_or(Error::InvalidCount(count as i64))?;
            check_len(what, len, end)?;
        }
        Ok(())
    }

    fn scatterv<T: Element>(
        &self,
        send: &[T],
        send_counts: &[usize],
        displs: &[usize],
        receive_count: usize,
    ) -> Result<Vec<T>> {
        if self.is_root() {
            self.check_layout("scatterv send", send_counts, displs, send.len())?;
        }

        let counts = to_counts(send_counts)?;
        let offsets = to_counts(displs)?;
        let recv_count = to_count(receive_count)?;
        let mut recv = vec![0u8; receive_count * T::KIND.size()];
        self.runtime.scatterv(
            &T::to_bytes(send),
            &counts,
            &offsets,
            &mut recv,
            recv_count,
            T::KIND,
            self.root,
        )?;
        debug!(rank = self.rank, receive_count, "scatterv complete");
        Ok(T::from_bytes(&recv))
    }

    fn gatherv<T: Element>(
        &self,
        send: &[T],
        send_count: usize,
        receive_counts: &[usize],
        displs: &[usize],
    ) -> Result<Vec<T>> {
        check_len("gatherv send", send.len(), send_count)?;

        let recv_len = if self.is_root() {
            let extent = receive_counts
                .iter()
                .zip(displs)
                .map(|(&count, &displ)| count.saturating_add(displ))
                .max()
                .unwrap_or(0);
            self.check_layout("gatherv receive", receive_counts, displs, extent)?;
            extent
        } else {
            0
        };

        let count = to_count(send_count)?;
        let counts = to_counts(receive_counts)?;
        let offsets = to_counts(displs)?;
        let mut recv = vec![0u8; recv_len * T::KIND.size()];
        self.runtime.gatherv(
            &T::to_bytes(&send[..send_count]),
            count,
            &mut recv,
            &counts,
            &offsets,
            T::KIND,
            self.root,
        )?;
        debug!(rank = self.rank, send_count, "gatherv complete");
        Ok(T::from_bytes(&recv))
    }
}

fn check_len(what: &str, len: usize, needed: usize) -> Result<()> {
    if len < needed {
        return Err(Error::InvalidBuffer(format!(
            "{what} buffer holds {len} elements, {needed} required"
        )));
    }
    Ok(())
}

fn to_count(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::InvalidCount(n as i64))
}

fn to_counts(values: &[usize]) -> Result<Vec<i32>> {
    values.iter().map(|&n| to_count(n)).collect()
}

impl Default for Communicator {
    fn default() -> Self {
        Communicator::unbound()
    }
}
