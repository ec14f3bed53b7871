use serde::{Deserialize, Serialize};

/// Minimum edge length of a box in meters.
pub const MIN_BOX_SIZE: f64 = 0.05;

/// Minimum number of points a labeled group needs to produce a box.
pub const MIN_GROUP_POINTS: usize = 10;

/// Structure to define the editor parameters.
///
/// Missing fields take their default value when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Horizontal nudge step in meters.
    pub move_step: f64,
    /// Vertical nudge step in meters.
    pub move_step_z: f64,
    /// Yaw nudge step in radians.
    pub rotate_step: f64,
    /// Yaw change in radians per pixel of horizontal drag.
    pub rotate_sensitivity: f64,
    /// Minimum box edge length in meters.
    pub min_box_size: f64,
    /// Minimum number of points per labeled group.
    pub min_group_points: usize,
    /// Pixel radius for picking a single point.
    pub pick_radius_px: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            move_step: 0.2,
            move_step_z: 0.1,
            rotate_step: 2f64.to_radians(),
            rotate_sensitivity: 0.005,
            min_box_size: MIN_BOX_SIZE,
            min_group_points: MIN_GROUP_POINTS,
            pick_radius_px: 8.0,
        }
    }
}
