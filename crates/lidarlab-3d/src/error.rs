use lidarlab_io::npy::NpyError;

use crate::io::{kitti::KittiError, pcd::PcdError};

/// Error types for annotation operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AnnotationError {
    /// The metadata file could not be decoded
    #[error("Failed to decode metadata")]
    Format(#[from] NpyError),

    /// The point geometry could not be decoded
    #[error("Failed to decode point geometry")]
    Pcd(#[from] PcdError),

    /// A label file could not be read or written
    #[error("Failed to process KITTI labels")]
    Kitti(#[from] KittiError),

    /// Failed to read or write a file
    #[error("Failed to access file")]
    Io(#[from] std::io::Error),

    /// The metadata array does not have shape (N, 9)
    #[error("Metadata must have shape (N, 9), got {0:?}")]
    InvalidMetaShape(Vec<usize>),

    /// The metadata row count does not match the loaded point count
    #[error("Point cloud / metadata mismatch: {points} vs {rows}")]
    Mismatch {
        /// Number of loaded points.
        points: usize,
        /// Number of metadata rows.
        rows: usize,
    },

    /// The operation needs a loaded point cloud
    #[error("No point cloud loaded")]
    NoPointCloud,

    /// The operation needs loaded metadata
    #[error("No metadata loaded")]
    NoMetadata,

    /// A box cannot be derived from an empty point group
    #[error("Cannot derive a box from an empty point group")]
    EmptyGroup,

    /// A box dimension is non-finite or below the minimum size
    #[error("Invalid box size {size:?}, every dimension must be finite and at least {min_size}")]
    InvalidGeometry {
        /// The rejected dimensions.
        size: [f64; 3],
        /// The minimum allowed dimension.
        min_size: f64,
    },

    /// There are no boxes to export
    #[error("No boxes to export")]
    NothingToExport,

    /// The class name is not among the candidate classes
    #[error("Unknown class: {0}")]
    UnknownClass(String),
}
