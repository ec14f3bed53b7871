use std::path::Path;

use glam::DVec3;

use crate::instance_box::InstanceBox;
use crate::labels::{category_from_kitti_type, kitti_type_name};

/// File name of the exported labels.
pub const KITTI_FILE_NAME: &str = "000000.txt";

/// Number of fields in a label line.
const KITTI_FIELDS: usize = 8;

/// Error types for the KITTI module.
#[derive(Debug, thiserror::Error)]
pub enum KittiError {
    /// Failed to read or write the label file
    #[error("Failed to access KITTI label file")]
    Io(#[from] std::io::Error),

    /// A numeric field could not be parsed
    #[error("Invalid number {field:?} on line {line}")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// The offending field.
        field: String,
    },
}

/// Format one box as `<type> <x> <y> <z_bottom> <l> <w> <h> <yaw>`.
///
/// The z coordinate is the bottom of the box.
pub fn box_to_kitti_line(instance_box: &InstanceBox) -> String {
    let c = instance_box.center;
    let s = instance_box.size;
    format!(
        "{} {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} {:.6}",
        kitti_type_name(instance_box.category),
        c.x,
        c.y,
        instance_box.bottom_z(),
        s.x,
        s.y,
        s.z,
        instance_box.yaw
    )
}

/// Format boxes as newline-joined label lines.
pub fn boxes_to_kitti<'a>(boxes: impl IntoIterator<Item = &'a InstanceBox>) -> String {
    boxes
        .into_iter()
        .map(box_to_kitti_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse label lines back into boxes.
///
/// Lines with fewer than eight fields are skipped. The type name maps back
/// to its category, and each box takes its 1-based line number as instance.
pub fn parse_kitti(text: &str) -> Result<Vec<InstanceBox>, KittiError> {
    let mut boxes = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_number = i + 1;
        let fields = line.split_whitespace().collect::<Vec<_>>();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < KITTI_FIELDS {
            log::warn!(
                "skipping KITTI line {line_number}: expected {KITTI_FIELDS} fields, got {}",
                fields.len()
            );
            continue;
        }

        let mut values = [0f64; KITTI_FIELDS - 1];
        for (value, field) in values.iter_mut().zip(&fields[1..KITTI_FIELDS]) {
            *value = field.parse().map_err(|_| KittiError::InvalidNumber {
                line: line_number,
                field: field.to_string(),
            })?;
        }
        let [x, y, z_bottom, l, w, h, yaw] = values;

        boxes.push(InstanceBox::new(
            category_from_kitti_type(fields[0]),
            u16::try_from(line_number).unwrap_or(u16::MAX),
            DVec3::new(x, y, z_bottom + h * 0.5),
            DVec3::new(l, w, h),
            yaw,
        ));
    }

    Ok(boxes)
}

/// Write boxes to a label file.
pub fn write_kitti<'a>(
    path: impl AsRef<Path>,
    boxes: impl IntoIterator<Item = &'a InstanceBox>,
) -> Result<(), KittiError> {
    std::fs::write(path, boxes_to_kitti(boxes))?;
    Ok(())
}

/// Read boxes from a label file.
pub fn read_kitti(path: impl AsRef<Path>) -> Result<Vec<InstanceBox>, KittiError> {
    let text = std::fs::read_to_string(path)?;
    parse_kitti(&text)
}
