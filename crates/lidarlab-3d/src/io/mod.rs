/// KITTI label reader and writer module.
pub mod kitti;

/// Per-point metadata table module.
pub mod meta;

/// PCD geometry reader module.
pub mod pcd;
