use std::f64::consts::{PI, TAU};

use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

/// An oriented 3D box around one labeled object.
///
/// The box rotates only about the vertical axis. This record is the
/// authoritative box state; anything drawn on screen is rebuilt from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceBox {
    /// Category id of the object.
    pub category: u16,
    /// Instance id of the object within its category.
    pub instance: u16,
    /// Box center in world space.
    pub center: DVec3,
    /// Full extents `(dx, dy, dz)` along the box axes.
    pub size: DVec3,
    /// Rotation about the vertical axis in radians.
    pub yaw: f64,
}

/// View-only arrow marking the box front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingIndicator {
    /// Arrow start, at the center of the front face.
    pub origin: DVec3,
    /// Unit arrow direction.
    pub direction: DVec3,
    /// Arrow length.
    pub length: f64,
}

/// Human readable box summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxInfo {
    /// Category id.
    pub category: u16,
    /// Instance id.
    pub instance: u16,
    /// Center `[x, y, z]`.
    pub center: [f64; 3],
    /// Size `[dx, dy, dz]`.
    pub size: [f64; 3],
    /// Yaw in radians.
    pub yaw: f64,
    /// Yaw in degrees.
    pub yaw_degrees: f64,
}

/// Wrap an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Check that every dimension is finite and at least `min_size`.
pub fn validate_size(size: DVec3, min_size: f64) -> Result<(), AnnotationError> {
    if size.is_finite() && size.min_element() >= min_size {
        Ok(())
    } else {
        Err(AnnotationError::InvalidGeometry {
            size: size.to_array(),
            min_size,
        })
    }
}

impl InstanceBox {
    /// Create a new box.
    pub fn new(category: u16, instance: u16, center: DVec3, size: DVec3, yaw: f64) -> Self {
        Self {
            category,
            instance,
            center,
            size,
            yaw,
        }
    }

    /// Rotation of the box about the vertical axis.
    pub fn rotation(&self) -> DQuat {
        DQuat::from_rotation_z(self.yaw)
    }

    /// Rigid transform from the box frame to world space.
    pub fn local_to_world(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation(), self.center)
    }

    /// Express a world point in the box frame (centered, unrotated).
    pub fn world_to_local(&self, point: DVec3) -> DVec3 {
        self.rotation().inverse() * (point - self.center)
    }

    /// Unit vector along the box length (local +x) in world space.
    pub fn forward(&self) -> DVec3 {
        DVec3::new(self.yaw.cos(), self.yaw.sin(), 0.0)
    }

    /// Unit vector along the box width (local +y) in world space.
    pub fn left(&self) -> DVec3 {
        DVec3::new(-self.yaw.sin(), self.yaw.cos(), 0.0)
    }

    /// Height of the bottom face.
    pub fn bottom_z(&self) -> f64 {
        self.center.z - self.size.z * 0.5
    }

    /// The heading arrow drawn from the front face.
    pub fn heading(&self) -> HeadingIndicator {
        let direction = self.forward();
        HeadingIndicator {
            origin: self.center + direction * (self.size.x * 0.5),
            direction,
            length: self.size.x * 0.6,
        }
    }

    /// Replace the dimensions, keeping center and yaw.
    pub fn set_size(&mut self, size: DVec3, min_size: f64) -> Result<(), AnnotationError> {
        validate_size(size, min_size)?;
        self.size = size;
        Ok(())
    }

    /// Summary for display.
    pub fn info(&self) -> BoxInfo {
        BoxInfo {
            category: self.category,
            instance: self.instance,
            center: self.center.to_array(),
            size: self.size.to_array(),
            yaw: self.yaw,
            yaw_degrees: self.yaw.to_degrees(),
        }
    }
}
