use std::collections::HashMap;

use glam::{DMat4, DVec3};

use crate::instance_box::InstanceBox;

/// Identifier of a box owned by the editor.
pub type BoxId = u64;

/// Color of an idle box wireframe.
pub const BOX_COLOR: [f32; 3] = [0.0, 1.0, 1.0];

/// Color of the active box wireframe.
pub const ACTIVE_BOX_COLOR: [f32; 3] = [1.0, 0.667, 0.0];

/// Color of the heading arrow.
pub const HEADING_COLOR: [f32; 3] = [1.0, 0.667, 0.0];

/// Key of a primitive in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKey {
    /// The wireframe of a box.
    Box(BoxId),
    /// The heading arrow of a box.
    Heading(BoxId),
}

/// A renderable primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// A unit cube scaled by `size` then moved by `transform`.
    Box {
        /// Box frame to world transform.
        transform: DMat4,
        /// Full extents.
        size: DVec3,
        /// Wireframe color.
        color: [f32; 3],
    },
    /// An arrow.
    Arrow {
        /// Arrow start.
        origin: DVec3,
        /// Unit direction.
        direction: DVec3,
        /// Arrow length.
        length: f64,
        /// Arrow color.
        color: [f32; 3],
    },
}

/// Host-provided renderable scene.
///
/// Adding under an existing key replaces the primitive.
pub trait Scene {
    /// Insert or replace a primitive.
    fn add(&mut self, key: PrimitiveKey, primitive: Primitive);

    /// Remove a primitive if present.
    fn remove(&mut self, key: PrimitiveKey);
}

/// Rebuild the wireframe and heading arrow of a box from its authoritative state.
///
/// `active` only selects the wireframe color.
pub fn sync_box(scene: &mut dyn Scene, id: BoxId, instance_box: &InstanceBox, active: bool) {
    let color = if active { ACTIVE_BOX_COLOR } else { BOX_COLOR };
    scene.add(
        PrimitiveKey::Box(id),
        Primitive::Box {
            transform: instance_box.local_to_world(),
            size: instance_box.size,
            color,
        },
    );

    let heading = instance_box.heading();
    scene.add(
        PrimitiveKey::Heading(id),
        Primitive::Arrow {
            origin: heading.origin,
            direction: heading.direction,
            length: heading.length,
            color: HEADING_COLOR,
        },
    );
}

/// Remove every primitive of a box.
pub fn remove_box(scene: &mut dyn Scene, id: BoxId) {
    scene.remove(PrimitiveKey::Box(id));
    scene.remove(PrimitiveKey::Heading(id));
}

/// In-memory scene for batch tools and tests.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    primitives: HashMap<PrimitiveKey, Primitive>,
}

impl HeadlessScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a primitive by key.
    pub fn get(&self, key: PrimitiveKey) -> Option<&Primitive> {
        self.primitives.get(&key)
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Check if the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl Scene for HeadlessScene {
    fn add(&mut self, key: PrimitiveKey, primitive: Primitive) {
        self.primitives.insert(key, primitive);
    }

    fn remove(&mut self, key: PrimitiveKey) {
        self.primitives.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sync_box_active_toggle() {
        let mut scene = HeadlessScene::new();
        let b = InstanceBox::new(1, 1, DVec3::ZERO, DVec3::new(4.0, 2.0, 1.5), 0.0);

        sync_box(&mut scene, 7, &b, true);
        assert_eq!(scene.len(), 2);
        match scene.get(PrimitiveKey::Box(7)) {
            Some(Primitive::Box { color, size, .. }) => {
                assert_eq!(*color, ACTIVE_BOX_COLOR);
                assert_eq!(*size, b.size);
            }
            other => panic!("unexpected primitive {other:?}"),
        }

        // deactivating recolors the box and keeps its arrow
        sync_box(&mut scene, 7, &b, false);
        assert_eq!(scene.len(), 2);
        assert!(matches!(
            scene.get(PrimitiveKey::Box(7)),
            Some(Primitive::Box { color, .. }) if *color == BOX_COLOR
        ));
        assert!(matches!(
            scene.get(PrimitiveKey::Heading(7)),
            Some(Primitive::Arrow { .. })
        ));

        remove_box(&mut scene, 7);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_sync_box_heading_follows_box() {
        let mut scene = HeadlessScene::new();
        let mut b = InstanceBox::new(1, 1, DVec3::new(1.0, 2.0, 0.5), DVec3::new(4.0, 2.0, 1.0), 0.0);
        sync_box(&mut scene, 3, &b, false);

        b.yaw = std::f64::consts::FRAC_PI_2;
        sync_box(&mut scene, 3, &b, false);
        match scene.get(PrimitiveKey::Heading(3)) {
            Some(Primitive::Arrow {
                origin,
                direction,
                length,
                ..
            }) => {
                assert_relative_eq!(direction.y, 1.0, epsilon = 1e-12);
                assert_relative_eq!(origin.y, 4.0, epsilon = 1e-12);
                assert_relative_eq!(*length, 2.4, epsilon = 1e-12);
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }
}
