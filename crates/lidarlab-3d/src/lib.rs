#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera capability supplied by the host renderer.
pub mod camera;

/// Tunable editor parameters.
pub mod config;

/// Oriented box derivation from labeled point groups.
pub mod derive;

/// Interactive box editing state machine.
pub mod edit;

/// The editor context that owns all annotation state.
pub mod editor;

/// Error types for annotation operations.
pub mod error;

/// Oriented instance boxes.
pub mod instance_box;

/// I/O utilities for point geometry, metadata and label files.
pub mod io;

/// Category tables, color policy and label decisions.
pub mod labels;

/// Labeled point cloud store.
pub mod pointcloud;

/// Ray casting against planes and oriented boxes.
pub mod raycast;

/// Scene capability and renderable primitives.
pub mod scene;

/// Screen-space lasso selection.
pub mod selection;
