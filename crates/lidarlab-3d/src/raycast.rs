use glam::{DMat4, DVec3};

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start of the ray.
    pub origin: DVec3,
    /// Unit direction of the ray.
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray, normalizing the direction.
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// The point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Intersect with the plane through `point` with normal `normal`.
    ///
    /// Returns `None` when the ray is parallel to the plane or the plane lies
    /// behind the origin.
    pub fn intersect_plane(&self, point: DVec3, normal: DVec3) -> Option<DVec3> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = normal.dot(point - self.origin) / denom;
        if t < 0.0 || !t.is_finite() {
            return None;
        }
        Some(self.at(t))
    }

    /// Intersect with the horizontal plane at height `z`.
    pub fn intersect_horizontal_plane(&self, z: f64) -> Option<DVec3> {
        self.intersect_plane(DVec3::new(0.0, 0.0, z), DVec3::Z)
    }
}

/// The nearest intersection of a ray with an oriented box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxHit {
    /// Distance along the ray.
    pub distance: f64,
    /// Hit point in world space.
    pub point: DVec3,
    /// Hit point in the box frame (centered, unrotated).
    pub local_point: DVec3,
    /// Outward normal of the hit face in the box frame.
    pub local_normal: DVec3,
}

/// Slab-method ray–AABB intersection.
///
/// Returns the distance to the entry point, or to the exit point when the
/// origin is inside the box.
pub fn ray_aabb_hit_t(origin: DVec3, direction: DVec3, min: DVec3, max: DVec3) -> Option<f64> {
    let inv = DVec3::new(
        if direction.x != 0.0 { 1.0 / direction.x } else { f64::INFINITY },
        if direction.y != 0.0 { 1.0 / direction.y } else { f64::INFINITY },
        if direction.z != 0.0 { 1.0 / direction.z } else { f64::INFINITY },
    );

    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;
    for axis in 0..3 {
        let mut t0 = (min[axis] - origin[axis]) * inv[axis];
        let mut t1 = (max[axis] - origin[axis]) * inv[axis];
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    if t_far < 0.0 {
        return None;
    }
    Some(if t_near >= 0.0 { t_near } else { t_far })
}

/// Outward normal of the face a box-frame point lies on.
fn face_normal(local_point: DVec3, half_extents: DVec3) -> DVec3 {
    let mut axis = 0;
    let mut best = f64::NEG_INFINITY;
    for i in 0..3 {
        let ratio = if half_extents[i] > 0.0 {
            local_point[i].abs() / half_extents[i]
        } else {
            f64::INFINITY
        };
        if ratio > best {
            best = ratio;
            axis = i;
        }
    }
    let mut normal = DVec3::ZERO;
    normal[axis] = if local_point[axis] >= 0.0 { 1.0 } else { -1.0 };
    normal
}

/// Intersect a ray with an oriented box.
///
/// # Arguments
///
/// * `ray` - The ray in world space.
/// * `local_to_world` - Rigid transform from the box frame to world space.
/// * `size` - Full box extents along the box axes.
pub fn ray_hits_obb(ray: &Ray, local_to_world: &DMat4, size: DVec3) -> Option<BoxHit> {
    let world_to_local = local_to_world.inverse();
    let origin = world_to_local.transform_point3(ray.origin);
    let direction = world_to_local.transform_vector3(ray.direction);
    let half = size * 0.5;

    let t = ray_aabb_hit_t(origin, direction, -half, half)?;
    let local_point = origin + direction * t;

    Some(BoxHit {
        distance: t,
        point: ray.at(t),
        local_point,
        local_normal: face_normal(local_point, half),
    })
}
