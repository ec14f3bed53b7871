mod array;
mod parser;
mod writer;

pub use array::*;
pub use parser::*;
pub use writer::*;

/// The magic string that opens every `.npy` file.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Byte alignment of the preamble (magic, version, header length and header).
pub const NPY_HEADER_ALIGNMENT: usize = 16;

/// Error types for the NPY module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NpyError {
    /// Failed to read or write the NPY file
    #[error("Failed to read NPY file")]
    Io(#[from] std::io::Error),

    /// The buffer does not start with the NPY magic string
    #[error("Not a npy file")]
    InvalidMagic,

    /// The format version is not supported
    #[error("Unsupported NPY format version {0}")]
    UnsupportedVersion(u8),

    /// The header dictionary could not be parsed
    #[error("Malformed NPY header: {0}")]
    MalformedHeader(String),

    /// The dtype descriptor is not one of the supported codes
    #[error("Unsupported dtype: {0}")]
    UnsupportedDtype(String),

    /// Column-major arrays are not supported
    #[error("Fortran ordered arrays are not supported")]
    UnsupportedFortranOrder,

    /// The payload size does not match the header shape and dtype
    #[error("NPY payload has {actual} bytes, expected {expected}")]
    DataSizeMismatch {
        /// Number of bytes implied by the header.
        expected: usize,
        /// Number of bytes found after the header.
        actual: usize,
    },

    /// The number of elements does not match the shape
    #[error("Shape {shape:?} holds {expected} elements, got {actual}")]
    ShapeMismatch {
        /// The requested shape.
        shape: Vec<usize>,
        /// Number of elements implied by the shape.
        expected: usize,
        /// Number of elements provided.
        actual: usize,
    },
}
