mod parser;

pub use parser::*;

/// Error types for the PCD module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// Failed to read PCD file
    #[error("Failed to read PCD file")]
    Io(#[from] std::io::Error),

    /// Unsupported header
    #[error("Unsupported PCD header: {0}")]
    UnsupportedProperty(String),

    /// Malformed PCD header
    #[error("Malformed PCD header")]
    MalformedHeader,

    /// The point data ends before the announced number of points
    #[error("PCD data truncated: expected {expected} points, got {actual}")]
    Truncated {
        /// Announced number of points.
        expected: usize,
        /// Number of complete points found.
        actual: usize,
    },

    /// An ascii value is not a number
    #[error("Invalid PCD value: {0}")]
    InvalidValue(String),

    /// Invalid PCD file extension
    #[error("Invalid PCD file extension. Got:{0}")]
    InvalidFileExtension(String),
}
