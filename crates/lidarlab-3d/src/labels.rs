use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

/// Category and instance id reserved for unlabeled / background points.
pub const BACKGROUND: u16 = 0;

/// Color of points in the current selection.
pub const SELECTION_COLOR: [f32; 3] = [1.0, 0.3, 0.3];

/// Color of a point picked for inspection.
pub const PICK_COLOR: [f32; 3] = [0.0, 1.0, 1.0];

/// A KITTI object type and the category id it is exported from.
pub struct KittiClass {
    /// Category id.
    pub id: u16,
    /// KITTI type name.
    pub name: &'static str,
}

/// Categories with a KITTI type name. Anything else exports as `Unknown`.
pub const KITTI_CLASSES: &[KittiClass] = &[
    KittiClass { id: 1, name: "Car" },
    KittiClass {
        id: 2,
        name: "Pedestrian",
    },
    KittiClass {
        id: 3,
        name: "Cyclist",
    },
];

/// KITTI type name of unmapped categories.
pub const KITTI_UNKNOWN: &str = "Unknown";

/// The KITTI type name for a category id.
pub fn kitti_type_name(category: u16) -> &'static str {
    KITTI_CLASSES
        .iter()
        .find(|c| c.id == category)
        .map_or(KITTI_UNKNOWN, |c| c.name)
}

/// The category id for a KITTI type name, [`BACKGROUND`] if unmapped.
pub fn category_from_kitti_type(name: &str) -> u16 {
    KITTI_CLASSES
        .iter()
        .find(|c| c.name == name)
        .map_or(BACKGROUND, |c| c.id)
}

/// Deterministic display color of a category.
///
/// Multiplicative hashing spreads neighbouring ids across the color space.
/// Every channel stays in `[0.2, 1.0]` so no category renders black.
pub fn category_color(category: u16) -> [f32; 3] {
    let x = (category as u32).wrapping_mul(2_654_435_761);
    let channel = |shift: u32| 0.2 + 0.8 * (((x >> shift) & 255) as f32 / 255.0);
    [channel(0), channel(8), channel(16)]
}

/// A class offered to the annotator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOption {
    /// Category id.
    pub id: u16,
    /// Display name.
    pub name: String,
    /// Countable objects ("things") get an instance id; amorphous regions
    /// ("stuff") do not.
    pub is_thing: bool,
}

/// The annotator's instance choice for a thing class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceChoice {
    /// Reuse an existing instance id.
    Existing(u16),
    /// Allocate the next free instance id.
    New,
}

/// A `(category, instance)` pair to apply to selected points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Category id.
    pub category: u16,
    /// Instance id, [`BACKGROUND`] for stuff classes.
    pub instance: u16,
}

/// The instance id that follows the existing ones.
pub fn next_instance_id(existing: &[u16]) -> u16 {
    existing
        .iter()
        .copied()
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Decide which label to apply for a class/instance choice.
///
/// # Arguments
///
/// * `options` - The candidate classes.
/// * `class_name` - The chosen class.
/// * `choice` - The chosen instance, ignored for stuff classes.
/// * `existing_instances` - Instance ids already used by the chosen class.
///
/// # Returns
///
/// The label, or [`AnnotationError::UnknownClass`] if `class_name` is not a
/// candidate.
pub fn decide_label(
    options: &[ClassOption],
    class_name: &str,
    choice: InstanceChoice,
    existing_instances: &[u16],
) -> Result<Label, AnnotationError> {
    let option = options
        .iter()
        .find(|o| o.name == class_name)
        .ok_or_else(|| AnnotationError::UnknownClass(class_name.to_string()))?;

    let instance = if !option.is_thing {
        BACKGROUND
    } else {
        match choice {
            InstanceChoice::Existing(id) => id,
            InstanceChoice::New => next_instance_id(existing_instances),
        }
    };

    Ok(Label {
        category: option.id,
        instance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<ClassOption> {
        vec![
            ClassOption {
                id: 1,
                name: "car".into(),
                is_thing: true,
            },
            ClassOption {
                id: 7,
                name: "road".into(),
                is_thing: false,
            },
        ]
    }

    #[test]
    fn test_kitti_names() {
        assert_eq!(kitti_type_name(1), "Car");
        assert_eq!(kitti_type_name(2), "Pedestrian");
        assert_eq!(kitti_type_name(3), "Cyclist");
        assert_eq!(kitti_type_name(0), "Unknown");
        assert_eq!(kitti_type_name(42), "Unknown");
        assert_eq!(category_from_kitti_type("Cyclist"), 3);
        assert_eq!(category_from_kitti_type("Tram"), BACKGROUND);
    }

    #[test]
    fn test_category_color() {
        let c = category_color(5);
        assert_eq!(c, category_color(5));
        assert_ne!(c, category_color(6));
        for v in c {
            assert!((0.2..=1.0).contains(&v));
        }
        // id 0 hashes to zero: every channel at the floor
        assert_eq!(category_color(0), [0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_decide_label() -> Result<(), AnnotationError> {
        let options = options();

        let label = decide_label(&options, "car", InstanceChoice::New, &[1, 4, 2])?;
        assert_eq!(label, Label { category: 1, instance: 5 });

        let label = decide_label(&options, "car", InstanceChoice::New, &[])?;
        assert_eq!(label.instance, 1);

        let label = decide_label(&options, "car", InstanceChoice::Existing(2), &[1, 2])?;
        assert_eq!(label.instance, 2);

        let label = decide_label(&options, "road", InstanceChoice::New, &[3])?;
        assert_eq!(label, Label { category: 7, instance: BACKGROUND });

        assert!(matches!(
            decide_label(&options, "tree", InstanceChoice::New, &[]),
            Err(AnnotationError::UnknownClass(_))
        ));
        Ok(())
    }
}
