use std::collections::BTreeMap;

use glam::{DVec2, DVec3};

use crate::error::AnnotationError;
use crate::instance_box::InstanceBox;
use crate::labels::BACKGROUND;
use crate::pointcloud::PointCloud;

/// The points of one labeled object.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGroup {
    /// Category id of the group.
    pub category: u16,
    /// Instance id of the group.
    pub instance: u16,
    /// Positions of the member points.
    pub points: Vec<DVec3>,
}

/// Center, size and yaw of a derived box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    /// Box center.
    pub center: DVec3,
    /// Full extents along the box axes.
    pub size: DVec3,
    /// Rotation about the vertical axis in radians.
    pub yaw: f64,
}

/// Partition the labeled points by `(category, instance)`.
///
/// Points with a background category or instance are skipped, as are groups
/// with fewer than `min_points` members. Groups come out sorted by
/// `(category, instance)`.
pub fn collect_groups(cloud: &PointCloud, min_points: usize) -> Vec<PointGroup> {
    let mut groups: BTreeMap<(u16, u16), Vec<DVec3>> = BTreeMap::new();

    for (i, (&category, &instance)) in cloud
        .categories()
        .iter()
        .zip(cloud.instances())
        .enumerate()
    {
        if category == BACKGROUND || instance == BACKGROUND {
            continue;
        }
        if let Some(position) = cloud.position(i) {
            groups.entry((category, instance)).or_default().push(position);
        }
    }

    groups
        .into_iter()
        .filter(|(_, points)| points.len() >= min_points)
        .map(|((category, instance), points)| PointGroup {
            category,
            instance,
            points,
        })
        .collect()
}

/// Mean of the XY coordinates.
fn xy_mean(points: &[DVec3]) -> DVec2 {
    points.iter().map(|p| p.truncate()).sum::<DVec2>() / points.len() as f64
}

/// Heading of the major horizontal axis from the XY second moments.
///
/// The result lies in `[-π/2, π/2]`; the front/back direction is ambiguous.
pub fn principal_yaw(points: &[DVec3]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let mean = xy_mean(points);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p.truncate() - mean;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }

    0.5 * (2.0 * sxy).atan2(sxx - syy)
}

/// Fit an oriented box to a group of points.
///
/// The box is aligned with the principal horizontal axis of the points and
/// spans their full vertical range.
pub fn compute_box(points: &[DVec3]) -> Result<BoxGeometry, AnnotationError> {
    if points.is_empty() {
        return Err(AnnotationError::EmptyGroup);
    }

    let yaw = principal_yaw(points);
    let mean = xy_mean(points);
    let to_local = DVec2::from_angle(-yaw);

    let mut min = DVec3::splat(f64::INFINITY);
    let mut max = DVec3::splat(f64::NEG_INFINITY);
    for p in points {
        let local = to_local.rotate(p.truncate() - mean);
        let local = local.extend(p.z);
        min = min.min(local);
        max = max.max(local);
    }

    let local_center = (min + max) * 0.5;
    let center_xy = mean + DVec2::from_angle(yaw).rotate(local_center.truncate());

    Ok(BoxGeometry {
        center: center_xy.extend(local_center.z),
        size: max - min,
        yaw,
    })
}

/// Derive one box per labeled group with at least `min_points` members.
pub fn derive_boxes(cloud: &PointCloud, min_points: usize) -> Result<Vec<InstanceBox>, AnnotationError> {
    let boxes = collect_groups(cloud, min_points)
        .into_iter()
        .map(|group| {
            let geometry = compute_box(&group.points)?;
            Ok(InstanceBox::new(
                group.category,
                group.instance,
                geometry.center,
                geometry.size,
                geometry.yaw,
            ))
        })
        .collect::<Result<Vec<_>, AnnotationError>>()?;

    log::info!("derived {} instance boxes", boxes.len());
    Ok(boxes)
}
