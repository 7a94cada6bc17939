//! The capability surface every other component talks to.
//!
//! [`Runtime`] is the narrow, stable set of operations obtained from a
//! discovered MPI implementation. The dynamically bound implementation lives
//! in [`binding`](crate::binding); tests and alternative transports can
//! provide their own.
//!
//! Buffers are passed as byte images together with element counts and the
//! [`ElementKind`] selecting the runtime datatype. Callers guarantee that
//! every buffer holds at least `count * kind.size()` bytes for the counts
//! they pass, and that counts and displacements are non-negative.

use crate::datatype::ElementKind;
use crate::error::Result;
use std::fmt;

/// Lifecycle of the process-wide runtime binding.
///
/// `Unbound → Bound → Initialised → Finalised`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No runtime has been located or bound yet
    Unbound,
    /// Entry points are resolved but `MPI_Init` has not run
    Bound,
    /// Collectives may be used
    Initialised,
    /// `MPI_Finalize` has run; nothing more can be done in this process
    Finalised,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Unbound => "unbound",
            Lifecycle::Bound => "bound",
            Lifecycle::Initialised => "initialised",
            Lifecycle::Finalised => "finalised",
        };
        f.write_str(name)
    }
}

/// Operations resolved from a message-passing runtime.
///
/// All collectives act on the world communicator.
pub trait Runtime: Send {
    /// Human readable name of the implementation family (e.g. `"Open MPI"`).
    fn flavor(&self) -> &str;

    /// Initialize the runtime with the given argument vector.
    fn init(&mut self, args: &[String]) -> Result<()>;

    /// Finalize the runtime.
    fn finalize(&mut self) -> Result<()>;

    /// Whether `init` has completed in this process.
    fn is_initialized(&self) -> Result<bool>;

    /// Whether `finalize` has completed in this process.
    fn is_finalized(&self) -> Result<bool>;

    /// Rank of the calling process.
    fn rank(&self) -> Result<i32>;

    /// Number of participating processes.
    fn size(&self) -> Result<i32>;

    /// Block until every participant has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Whether buffers of `kind` can be transferred.
    fn supports(&self, kind: ElementKind) -> bool;

    /// Regular scatter of `send_count` elements to every rank.
    fn scatter(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()>;

    /// Irregular scatter with per-rank counts and displacements.
    #[allow(clippy::too_many_arguments)]
    fn scatterv(
        &self,
        send: &[u8],
        send_counts: &[i32],
        displs: &[i32],
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()>;

    /// Regular gather of `recv_count` elements from every rank.
    fn gather(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()>;

    /// Irregular gather with per-rank counts and displacements.
    #[allow(clippy::too_many_arguments)]
    fn gatherv(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_counts: &[i32],
        displs: &[i32],
        kind: ElementKind,
        root: i32,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_display() {
        assert_eq!(Lifecycle::Unbound.to_string(), "unbound");
        assert_eq!(Lifecycle::Initialised.to_string(), "initialised");
    }
}
