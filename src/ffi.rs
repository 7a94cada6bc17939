//! Raw signatures of the MPI C entry points resolved at bind time.
//!
//! Every collective signature is generic over the handle type `H`, because
//! Open MPI passes communicators and datatypes as object addresses while the
//! MPICH ABI passes them as 32-bit integers.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

// ============================================================
// Symbol names
// ============================================================

pub const MPI_INIT: &str = "MPI_Init";
pub const MPI_FINALIZE: &str = "MPI_Finalize";
pub const MPI_INITIALIZED: &str = "MPI_Initialized";
pub const MPI_FINALIZED: &str = "MPI_Finalized";
pub const MPI_BARRIER: &str = "MPI_Barrier";
pub const MPI_COMM_RANK: &str = "MPI_Comm_rank";
pub const MPI_COMM_SIZE: &str = "MPI_Comm_size";
pub const MPI_SCATTER: &str = "MPI_Scatter";
pub const MPI_SCATTERV: &str = "MPI_Scatterv";
pub const MPI_GATHER: &str = "MPI_Gather";
pub const MPI_GATHERV: &str = "MPI_Gatherv";

// Open MPI predefined objects; the handle is the object's address.
pub const OMPI_COMM_WORLD: &str = "ompi_mpi_comm_world";
pub const OMPI_DOUBLE: &str = "ompi_mpi_double";
pub const OMPI_C_BOOL: &str = "ompi_mpi_c_bool";
pub const OMPI_CHAR: &str = "ompi_mpi_char";

// MPICH ABI (MPICH, Intel MPI, MVAPICH, Cray MPICH) predefined handles.
pub const MPICH_COMM_WORLD: c_int = 0x4400_0000;
pub const MPICH_DOUBLE: c_int = 0x4c00_080b;
pub const MPICH_C_BOOL: c_int = 0x4c00_013f;
pub const MPICH_CHAR: c_int = 0x4c00_0101;

// ============================================================
// Initialization and Finalization
// ============================================================

pub type init_fn = unsafe extern "C" fn(argc: *mut c_int, argv: *mut *mut *mut c_char) -> c_int;
pub type finalize_fn = unsafe extern "C" fn() -> c_int;
pub type flag_fn = unsafe extern "C" fn(flag: *mut c_int) -> c_int;

// ============================================================
// Communicator queries and synchronization
// ============================================================

pub type barrier_fn<H> = unsafe extern "C" fn(comm: H) -> c_int;
pub type comm_query_fn<H> = unsafe extern "C" fn(comm: H, value: *mut c_int) -> c_int;

// ============================================================
// Collectives
// ============================================================

pub type scatter_fn<H> = unsafe extern "C" fn(
    sendbuf: *const c_void,
    sendcount: c_int,
    sendtype: H,
    recvbuf: *mut c_void,
    recvcount: c_int,
    recvtype: H,
    root: c_int,
    comm: H,
) -> c_int;

pub type scatterv_fn<H> = unsafe extern "C" fn(
    sendbuf: *const c_void,
    sendcounts: *const c_int,
    displs: *const c_int,
    sendtype: H,
    recvbuf: *mut c_void,
    recvcount: c_int,
    recvtype: H,
    root: c_int,
    comm: H,
) -> c_int;

pub type gather_fn<H> = scatter_fn<H>;

pub type gatherv_fn<H> = unsafe extern "C" fn(
    sendbuf: *const c_void,
    sendcount: c_int,
    sendtype: H,
    recvbuf: *mut c_void,
    recvcounts: *const c_int,
    displs: *const c_int,
    recvtype: H,
    root: c_int,
    comm: H,
) -> c_int;
