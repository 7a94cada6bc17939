//! Late binding of an installed MPI library.
//!
//! [`bind`] opens the shared library found by the
//! [`RuntimeLocator`](crate::RuntimeLocator), detects which handle ABI it
//! speaks and resolves every entry point the [`Communicator`](crate::Communicator)
//! needs. A library missing any of them is rejected as a whole: handing out a
//! partially bound runtime would let ranks disagree about which collectives
//! exist.
//!
//! Two ABIs are understood:
//!
//! | Family | Communicator / datatype handles |
//! |--------|---------------------------------|
//! | Open MPI | addresses of exported objects (`ompi_mpi_comm_world`, ...) |
//! | MPICH, Intel MPI, MVAPICH, Cray | 32-bit integer constants |

use crate::datatype::ElementKind;
use crate::error::{Error, Result};
use crate::ffi;
use crate::runtime::Runtime;
use libloading::{Library, Symbol};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Global flag tracking whether MPI has been initialized in this process
static MPI_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Seals [`Handle`] to the two ABI handle types.
mod sealed {
    pub trait Sealed {}
}

/// Communicator or datatype handle as passed by value to the C ABI.
pub trait Handle: sealed::Sealed + Copy + Send + Sync + 'static {}

impl sealed::Sealed for c_int {}
impl Handle for c_int {}

/// Open MPI handle: the address of a predefined object inside the library.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct ObjectHandle(*mut c_void);

// The address points into the mapped library, which is never unloaded.
unsafe impl Send for ObjectHandle {}
unsafe impl Sync for ObjectHandle {}

impl sealed::Sealed for ObjectHandle {}
impl Handle for ObjectHandle {}

/// Entry points resolved from the library.
struct EntryPoints<H> {
    init: ffi::init_fn,
    finalize: ffi::finalize_fn,
    initialized: ffi::flag_fn,
    finalized: ffi::flag_fn,
    barrier: ffi::barrier_fn<H>,
    comm_rank: ffi::comm_query_fn<H>,
    comm_size: ffi::comm_query_fn<H>,
    scatter: ffi::scatter_fn<H>,
    scatterv: ffi::scatterv_fn<H>,
    gather: ffi::gather_fn<H>,
    gatherv: ffi::gatherv_fn<H>,
}

impl<H: Handle> EntryPoints<H> {
    /// # Safety
    ///
    /// `library` must be an MPI implementation whose handle type is `H`.
    unsafe fn resolve(library: &Library) -> Result<Self> {
        Ok(EntryPoints {
            init: function(library, ffi::MPI_INIT)?,
            finalize: function(library, ffi::MPI_FINALIZE)?,
            initialized: function(library, ffi::MPI_INITIALIZED)?,
            finalized: function(library, ffi::MPI_FINALIZED)?,
            barrier: function(library, ffi::MPI_BARRIER)?,
            comm_rank: function(library, ffi::MPI_COMM_RANK)?,
            comm_size: function(library, ffi::MPI_COMM_SIZE)?,
            scatter: function(library, ffi::MPI_SCATTER)?,
            scatterv: function(library, ffi::MPI_SCATTERV)?,
            gather: function(library, ffi::MPI_GATHER)?,
            gatherv: function(library, ffi::MPI_GATHERV)?,
        })
    }
}

/// Resolve a function symbol as the pointer type `T`.
unsafe fn function<T: Copy>(library: &Library, symbol: &'static str) -> Result<T> {
    let resolved: Symbol<T> = library
        .get(symbol.as_bytes())
        .map_err(|source| Error::Bind { symbol, source })?;
    debug!(symbol, "resolved entry point");
    Ok(*resolved)
}

/// Resolve the address of an exported data object.
unsafe fn object(library: &Library, symbol: &'static str) -> Result<ObjectHandle> {
    let resolved: Symbol<*mut c_void> = library
        .get(symbol.as_bytes())
        .map_err(|source| Error::Bind { symbol, source })?;
    Ok(ObjectHandle(*resolved))
}

/// An MPI runtime bound through `dlopen`.
pub struct DynamicRuntime<H: Handle> {
    entry: EntryPoints<H>,
    world: H,
    double: H,
    boolean: Option<H>,
    character: Option<H>,
    flavor: &'static str,
    /// MPI registers exit handlers, so the library stays mapped until the
    /// process ends.
    _library: ManuallyDrop<Library>,
}

/// Load the MPI library at `path` and resolve the capability surface.
///
/// # Errors
///
/// [`Error::Load`] if the file cannot be opened as a shared library,
/// [`Error::Bind`] if a required entry point or predefined handle is missing.
pub fn bind(path: &Path) -> Result<Box<dyn Runtime>> {
    let library = unsafe { open(path) }.map_err(|source| Error::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let runtime: Box<dyn Runtime> = match unsafe { object(&library, ffi::OMPI_COMM_WORLD) } {
        Ok(world) => Box::new(unsafe { bind_open_mpi(library, world)? }) as Box<dyn Runtime>,
        Err(_) => Box::new(unsafe { bind_mpich(library)? }),
    };

    info!(path = %path.display(), flavor = runtime.flavor(), "bound MPI runtime");
    Ok(runtime)
}

/// Open the library with its symbols in the global scope.
///
/// Open MPI `dlopen`s its MCA components at `MPI_Init`, and those resolve
/// `libmpi`/`libopen-pal` symbols globally.
#[cfg(unix)]
unsafe fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL).map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    Library::new(path)
}

unsafe fn bind_open_mpi(
    library: Library,
    world: ObjectHandle,
) -> Result<DynamicRuntime<ObjectHandle>> {
    let entry = EntryPoints::resolve(&library)?;
    let double = object(&library, ffi::OMPI_DOUBLE)?;
    let boolean = object(&library, ffi::OMPI_C_BOOL).ok();
    let character = object(&library, ffi::OMPI_CHAR).ok();
    Ok(DynamicRuntime {
        entry,
        world,
        double,
        boolean,
        character,
        flavor: "Open MPI",
        _library: ManuallyDrop::new(library),
    })
}

unsafe fn bind_mpich(library: Library) -> Result<DynamicRuntime<c_int>> {
    let entry = EntryPoints::resolve(&library)?;
    Ok(DynamicRuntime {
        entry,
        world: ffi::MPICH_COMM_WORLD,
        double: ffi::MPICH_DOUBLE,
        boolean: Some(ffi::MPICH_C_BOOL),
        character: Some(ffi::MPICH_CHAR),
        flavor: "MPICH",
        _library: ManuallyDrop::new(library),
    })
}

impl<H: Handle> DynamicRuntime<H> {
    fn datatype(&self, kind: ElementKind) -> Result<H> {
        match kind {
            ElementKind::F64 => Some(self.double),
            ElementKind::Bool => self.boolean,
            ElementKind::Char => self.character,
        }
        .ok_or(Error::UnsupportedElement(kind))
    }

    fn flag(&self, query: ffi::flag_fn) -> Result<bool> {
        let mut flag: c_int = 0;
        let ret = unsafe { query(&mut flag) };
        Error::check(ret)?;
        Ok(flag != 0)
    }

    fn comm_query(&self, query: ffi::comm_query_fn<H>) -> Result<i32> {
        let mut value: c_int = -1;
        let ret = unsafe { query(self.world, &mut value) };
        Error::check(ret)?;
        Ok(value)
    }
}

impl<H: Handle> Runtime for DynamicRuntime<H> {
    fn flavor(&self) -> &str {
        self.flavor
    }

    fn init(&mut self, args: &[String]) -> Result<()> {
        if MPI_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        for arg in args {
            match CString::new(arg.as_str()) {
                Ok(arg) => argv.push(arg.into_raw()),
                Err(_) => {
                    MPI_INITIALIZED.store(false, Ordering::SeqCst);
                    return Err(Error::InvalidBuffer(format!(
                        "argument {arg:?} contains a NUL byte"
                    )));
                }
            }
        }
        argv.push(ptr::null_mut::<c_char>());
        // MPI may hold on to argv for the rest of the process.
        let argv: &'static mut [*mut c_char] = argv.leak();
        let mut argc = args.len() as c_int;
        let mut argv_ptr = argv.as_mut_ptr();

        let ret = unsafe { (self.entry.init)(&mut argc, &mut argv_ptr) };
        if ret != 0 {
            MPI_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(Error::MpiError(ret));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let ret = unsafe { (self.entry.finalize)() };
        Error::check(ret)
    }

    fn is_initialized(&self) -> Result<bool> {
        self.flag(self.entry.initialized)
    }

    fn is_finalized(&self) -> Result<bool> {
        self.flag(self.entry.finalized)
    }

    fn rank(&self) -> Result<i32> {
        self.comm_query(self.entry.comm_rank)
    }

    fn size(&self) -> Result<i32> {
        self.comm_query(self.entry.comm_size)
    }

    fn barrier(&self) -> Result<()> {
        let ret = unsafe { (self.entry.barrier)(self.world) };
        Error::check(ret)
    }

    fn supports(&self, kind: ElementKind) -> bool {
        self.datatype(kind).is_ok()
    }

    fn scatter(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        let datatype = self.datatype(kind)?;
        let ret = unsafe {
            (self.entry.scatter)(
                send.as_ptr().cast(),
                send_count,
                datatype,
                recv.as_mut_ptr().cast(),
                recv_count,
                datatype,
                root,
                self.world,
            )
        };
        Error::check(ret)
    }

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
    ) -> Result<()> {
        let datatype = self.datatype(kind)?;
        let ret = unsafe {
            (self.entry.scatterv)(
                send.as_ptr().cast(),
                send_counts.as_ptr(),
                displs.as_ptr(),
                datatype,
                recv.as_mut_ptr().cast(),
                recv_count,
                datatype,
                root,
                self.world,
            )
        };
        Error::check(ret)
    }

    fn gather(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        let datatype = self.datatype(kind)?;
        let ret = unsafe {
            (self.entry.gather)(
                send.as_ptr().cast(),
                send_count,
                datatype,
                recv.as_mut_ptr().cast(),
                recv_count,
                datatype,
                root,
                self.world,
            )
        };
        Error::check(ret)
    }

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
    ) -> Result<()> {
        let datatype = self.datatype(kind)?;
        let ret = unsafe {
            (self.entry.gatherv)(
                send.as_ptr().cast(),
                send_count,
                datatype,
                recv.as_mut_ptr().cast(),
                recv_counts.as_ptr(),
                displs.as_ptr(),
                datatype,
                root,
                self.world,
            )
        };
        Error::check(ret)
    }
}

impl<H: Handle> Drop for DynamicRuntime<H> {
    fn drop(&mut self) {
        // Only finalize if MPI is up and nobody finalized it yet
        let live = self.is_initialized().unwrap_or(false) && !self.is_finalized().unwrap_or(true);
        if live {
            let _ = self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = bind(&dir.path().join("libmpi.so")).err().unwrap();
        assert!(matches!(err, Error::Load { .. }), "{err}");
    }

    #[test]
    fn garbage_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libmpi.so");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"not an ELF object").unwrap();
        drop(file);

        let err = bind(&path).err().unwrap();
        assert!(matches!(err, Error::Load { .. }), "{err}");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn global_open_resolves_symbols() {
        let library = unsafe { open(Path::new("libm.so.6")) }.unwrap();
        let cos: Symbol<unsafe extern "C" fn(f64) -> f64> =
            unsafe { library.get(b"cos") }.unwrap();
        assert_eq!(unsafe { cos(0.0) }, 1.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_without_mpi_is_rejected_whole() {
        let err = bind(Path::new("libc.so.6")).err().unwrap();
        match err {
            Error::Bind { symbol, .. } => assert_eq!(symbol, ffi::MPI_INIT),
            other => panic!("expected bind error, got {other}"),
        }
    }
}
