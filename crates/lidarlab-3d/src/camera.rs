use glam::{DMat4, DVec2, DVec3};

use crate::raycast::Ray;

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Viewport {
    /// Create a new viewport.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Convert normalized device coordinates to pixels (origin top-left, y down).
    pub fn ndc_to_screen(&self, ndc: DVec2) -> DVec2 {
        DVec2::new(
            (ndc.x * 0.5 + 0.5) * self.width,
            (-ndc.y * 0.5 + 0.5) * self.height,
        )
    }

    /// Convert pixels to normalized device coordinates.
    pub fn screen_to_ndc(&self, screen: DVec2) -> DVec2 {
        DVec2::new(
            screen.x / self.width * 2.0 - 1.0,
            -(screen.y / self.height) * 2.0 + 1.0,
        )
    }
}

/// Projection capability of the host camera.
///
/// The annotation core never owns a camera. The host implements this trait
/// on whatever camera it renders with and passes it into each operation.
pub trait Camera {
    /// Project a world point into normalized device coordinates.
    fn world_to_ndc(&self, point: DVec3) -> DVec3;

    /// The world-space ray through a point in normalized device coordinates.
    fn ndc_to_ray(&self, ndc: DVec2) -> Ray;

    /// The viewport the camera renders into.
    fn viewport(&self) -> Viewport;

    /// Project a world point to pixels.
    ///
    /// Returns `None` when the projected depth falls outside `[-1, 1]`.
    fn project_to_screen(&self, point: DVec3) -> Option<DVec2> {
        let ndc = self.world_to_ndc(point);
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(self.viewport().ndc_to_screen(ndc.truncate()))
    }

    /// The world-space ray through a pixel.
    fn screen_ray(&self, screen: DVec2) -> Ray {
        self.ndc_to_ray(self.viewport().screen_to_ndc(screen))
    }
}

/// A right-handed perspective camera with OpenGL depth conventions.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    eye: DVec3,
    view_projection: DMat4,
    inverse_view_projection: DMat4,
    viewport: Viewport,
}

impl PerspectiveCamera {
    /// Create a camera looking from `eye` towards `target`.
    ///
    /// # Arguments
    ///
    /// * `eye` - Camera position.
    /// * `target` - Point the camera looks at.
    /// * `up` - Up direction, must not be parallel to the viewing direction.
    /// * `fov_y` - Vertical field of view in radians.
    /// * `near` - Near clipping distance.
    /// * `far` - Far clipping distance.
    /// * `viewport` - Drawing surface size.
    pub fn look_at(
        eye: DVec3,
        target: DVec3,
        up: DVec3,
        fov_y: f64,
        near: f64,
        far: f64,
        viewport: Viewport,
    ) -> Self {
        let view = DMat4::look_at_rh(eye, target, up);
        let projection =
            DMat4::perspective_rh_gl(fov_y, viewport.width / viewport.height, near, far);
        let view_projection = projection * view;
        Self {
            eye,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            viewport,
        }
    }

    /// The camera position.
    pub fn eye(&self) -> DVec3 {
        self.eye
    }
}

impl Camera for PerspectiveCamera {
    fn world_to_ndc(&self, point: DVec3) -> DVec3 {
        self.view_projection.project_point3(point)
    }

    fn ndc_to_ray(&self, ndc: DVec2) -> Ray {
        let near = self
            .inverse_view_projection
            .project_point3(DVec3::new(ndc.x, ndc.y, -1.0));
        let far = self
            .inverse_view_projection
            .project_point3(DVec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(near, far - near)
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}
