//! Element kinds that can travel through a collective operation.
//!
//! This module provides the [`Element`] trait, a sealed trait that maps Rust
//! primitive types to the runtime datatypes resolved by the binder.
//!
//! # Supported Types
//!
//! | Rust Type | MPI Equivalent | Kind               |
//! |-----------|----------------|--------------------|
//! | `f64`     | `MPI_DOUBLE`   | [`ElementKind::F64`]  |
//! | `bool`    | `MPI_C_BOOL`   | [`ElementKind::Bool`] |
//! | `u8`      | `MPI_CHAR`     | [`ElementKind::Char`] |
//!
//! Buffers cross the [`Runtime`](crate::Runtime) boundary as native-endian
//! bytes; [`Element::to_bytes`] and [`Element::from_bytes`] do the
//! conversion so that no caller ever reinterprets memory.

/// Private supertrait that keeps [`Element`] closed.
mod sealed {
    pub trait Sealed {}
}

/// Element kind of a collective buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 64-bit floating point (`MPI_DOUBLE`)
    F64,
    /// Boolean (`MPI_C_BOOL`)
    Bool,
    /// Single character (`MPI_CHAR`)
    Char,
}

impl ElementKind {
    /// Size in bytes of one element.
    pub const fn size(self) -> usize {
        match self {
            ElementKind::F64 => 8,
            ElementKind::Bool | ElementKind::Char => 1,
        }
    }
}

/// Trait for types that can be used in collective operations.
///
/// Sealed: it cannot be implemented outside this crate.
/// Supported types: [`f64`], [`bool`], [`u8`].
pub trait Element: sealed::Sealed + Copy + Send + 'static {
    /// The kind used to pick the runtime datatype handle.
    const KIND: ElementKind;

    /// Native-endian byte image of `values`.
    fn to_bytes(values: &[Self]) -> Vec<u8>;

    /// Rebuild elements from a byte image produced by the runtime.
    ///
    /// `bytes.len()` must be a multiple of `Self::KIND.size()`.
    fn from_bytes(bytes: &[u8]) -> Vec<Self>;
}

impl sealed::Sealed for f64 {}
impl Element for f64 {
    const KIND: ElementKind = ElementKind::F64;

    fn to_bytes(values: &[Self]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_ne_bytes(raw)
            })
            .collect()
    }
}

impl sealed::Sealed for bool {}
impl Element for bool {
    const KIND: ElementKind = ElementKind::Bool;

    fn to_bytes(values: &[Self]) -> Vec<u8> {
        values.iter().map(|&v| u8::from(v)).collect()
    }

    // Any non-zero byte is true, as for C `_Bool` written by foreign code.
    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| b != 0).collect()
    }
}

impl sealed::Sealed for u8 {}
impl Element for u8 {
    const KIND: ElementKind = ElementKind::Char;

    fn to_bytes(values: &[Self]) -> Vec<u8> {
        values.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes.to_vec()
    }
}
