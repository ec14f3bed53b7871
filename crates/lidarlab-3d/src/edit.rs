use std::collections::BTreeMap;

use glam::{DVec2, DVec3};

use crate::camera::Camera;
use crate::config::EditorConfig;
use crate::error::AnnotationError;
use crate::instance_box::{normalize_angle, BoxInfo, InstanceBox};
use crate::raycast::ray_hits_obb;
use crate::scene::{remove_box, sync_box, BoxId, Scene};

/// A pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Primary button.
    Left,
    /// Wheel button.
    Middle,
    /// Secondary button.
    Right,
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Alt / Option.
    pub alt: bool,
    /// Control.
    pub ctrl: bool,
    /// Shift.
    pub shift: bool,
}

/// A drag gesture on the active box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Slide the box on its horizontal plane.
    Move,
    /// Turn the box about the vertical axis.
    Rotate,
    /// Drag one face of the box.
    Resize,
}

impl Gesture {
    /// Map a pointer press to a gesture.
    ///
    /// Alt+Left moves, Alt+Right rotates and Ctrl+Left resizes.
    pub fn from_pointer(button: PointerButton, modifiers: Modifiers) -> Option<Self> {
        match (button, modifiers.alt, modifiers.ctrl) {
            (PointerButton::Left, true, _) => Some(Gesture::Move),
            (PointerButton::Right, true, _) => Some(Gesture::Rotate),
            (PointerButton::Left, false, true) => Some(Gesture::Resize),
            _ => None,
        }
    }
}

/// A discrete keyboard adjustment of the active box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeKey {
    /// Along the box heading.
    Forward,
    /// Against the box heading.
    Back,
    /// Towards the box's left side.
    Left,
    /// Towards the box's right side.
    Right,
    /// Up.
    Up,
    /// Down.
    Down,
    /// Counter-clockwise, seen from above.
    YawLeft,
    /// Clockwise, seen from above.
    YawRight,
}

impl NudgeKey {
    /// Map a key name (`w`, `ArrowUp`, ...) to a nudge, ignoring case.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "w" => Some(NudgeKey::Forward),
            "s" => Some(NudgeKey::Back),
            "a" => Some(NudgeKey::Left),
            "d" => Some(NudgeKey::Right),
            "arrowup" => Some(NudgeKey::Up),
            "arrowdown" => Some(NudgeKey::Down),
            "q" => Some(NudgeKey::YawLeft),
            "e" => Some(NudgeKey::YawRight),
            _ => None,
        }
    }
}

/// Check if a key name requests deleting the active box.
pub fn is_delete_key(key: &str) -> bool {
    matches!(key, "Delete" | "Backspace")
}

/// The drag state of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// No drag in progress.
    Idle,
    /// Moving the active box.
    Moving,
    /// Rotating the active box.
    Rotating,
    /// Resizing the active box.
    Resizing,
}

/// Reference data of a face drag, captured at pointer-down.
#[derive(Debug, Clone)]
struct ResizeBaseline {
    // the box as it was when the drag started
    original: InstanceBox,
    axis: usize,
    sign: f64,
    // hit coordinate along `axis` in the original box frame
    start: f64,
    // drag plane through the start hit, containing the world axis
    plane_point: DVec3,
    plane_normal: DVec3,
}

#[derive(Debug, Clone)]
enum EditSession {
    Move { id: BoxId, previous: DVec3 },
    Rotate { id: BoxId, start_x: f64, start_yaw: f64 },
    Resize { id: BoxId, baseline: ResizeBaseline },
}

/// Unit vector of a box-frame axis.
fn unit_axis(axis: usize) -> DVec3 {
    let mut v = DVec3::ZERO;
    v[axis] = 1.0;
    v
}

/// Index of the component with the largest magnitude.
fn dominant_axis(v: DVec3) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// The collection of instance boxes and the interactive edit state machine.
///
/// Only the active box takes pointer gestures and keyboard nudges. Every
/// mutation rebuilds the scene primitives of the touched box.
#[derive(Debug, Default)]
pub struct BoxEditor {
    config: EditorConfig,
    entries: BTreeMap<BoxId, InstanceBox>,
    next_id: BoxId,
    active: Option<BoxId>,
    session: Option<EditSession>,
}

impl BoxEditor {
    /// Create an empty editor.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The editor parameters.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Number of boxes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no boxes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a box by id.
    pub fn get(&self, id: BoxId) -> Option<&InstanceBox> {
        self.entries.get(&id)
    }

    /// Iterate over the boxes in insertion order.
    pub fn boxes(&self) -> impl Iterator<Item = (BoxId, &InstanceBox)> + '_ {
        self.entries.iter().map(|(&id, b)| (id, b))
    }

    /// The active box id.
    pub fn active(&self) -> Option<BoxId> {
        self.active
    }

    /// The active box.
    pub fn active_box(&self) -> Option<&InstanceBox> {
        self.active.and_then(|id| self.entries.get(&id))
    }

    /// The current drag state.
    pub fn state(&self) -> EditState {
        match self.session {
            None => EditState::Idle,
            Some(EditSession::Move { .. }) => EditState::Moving,
            Some(EditSession::Rotate { .. }) => EditState::Rotating,
            Some(EditSession::Resize { .. }) => EditState::Resizing,
        }
    }

    /// Add a box and draw it.
    pub fn insert(&mut self, instance_box: InstanceBox, scene: &mut dyn Scene) -> BoxId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, instance_box);
        self.sync(id, scene);
        id
    }

    /// Remove every box from the editor and the scene.
    pub fn clear(&mut self, scene: &mut dyn Scene) {
        for &id in self.entries.keys() {
            remove_box(scene, id);
        }
        self.entries.clear();
        self.active = None;
        self.session = None;
    }

    /// Replace every box.
    ///
    /// # Returns
    ///
    /// The ids of the new boxes, in the given order.
    pub fn replace_all(&mut self, boxes: Vec<InstanceBox>, scene: &mut dyn Scene) -> Vec<BoxId> {
        self.clear(scene);
        boxes
            .into_iter()
            .map(|instance_box| self.insert(instance_box, scene))
            .collect()
    }

    /// The box nearest to the camera under the pointer.
    pub fn pick(&self, screen: DVec2, camera: &dyn Camera) -> Option<BoxId> {
        let ray = camera.screen_ray(screen);
        self.entries
            .iter()
            .filter_map(|(&id, b)| {
                ray_hits_obb(&ray, &b.local_to_world(), b.size).map(|hit| (id, hit.distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Make a box the active one, or deactivate with `None`.
    ///
    /// Refused while a drag is in progress or if the id is unknown.
    pub fn activate(&mut self, id: Option<BoxId>, scene: &mut dyn Scene) -> bool {
        if self.session.is_some() {
            return false;
        }
        if let Some(id) = id {
            if !self.entries.contains_key(&id) {
                return false;
            }
        }

        let previous = std::mem::replace(&mut self.active, id);
        if let Some(previous) = previous {
            self.sync(previous, scene);
        }
        if let Some(id) = id {
            self.sync(id, scene);
            if let Some(b) = self.entries.get(&id) {
                log::debug!("activated box {} / {}", b.category, b.instance);
            }
        }
        true
    }

    /// Activate the box under the pointer.
    pub fn pick_and_activate(
        &mut self,
        screen: DVec2,
        camera: &dyn Camera,
        scene: &mut dyn Scene,
    ) -> Option<BoxId> {
        if self.session.is_some() {
            return None;
        }
        let id = self.pick(screen, camera)?;
        self.activate(Some(id), scene);
        Some(id)
    }

    /// Start a drag gesture on the active box.
    ///
    /// Nothing happens if there is no active box, a drag is already in
    /// progress, the press maps to no gesture, or the gesture finds no
    /// initial intersection.
    ///
    /// # Returns
    ///
    /// The state after the press.
    pub fn pointer_down(
        &mut self,
        screen: DVec2,
        button: PointerButton,
        modifiers: Modifiers,
        camera: &dyn Camera,
    ) -> EditState {
        if self.session.is_some() {
            return self.state();
        }
        let (Some(id), Some(gesture)) = (self.active, Gesture::from_pointer(button, modifiers))
        else {
            return self.state();
        };
        let Some(target) = self.entries.get(&id) else {
            return self.state();
        };

        let ray = camera.screen_ray(screen);
        self.session = match gesture {
            Gesture::Move => ray
                .intersect_horizontal_plane(target.center.z)
                .map(|previous| EditSession::Move { id, previous }),
            Gesture::Rotate => Some(EditSession::Rotate {
                id,
                start_x: screen.x,
                start_yaw: target.yaw,
            }),
            Gesture::Resize => {
                let hit = ray_hits_obb(&ray, &target.local_to_world(), target.size);
                hit.and_then(|hit| {
                    let axis = dominant_axis(hit.local_normal);
                    let sign = if hit.local_normal[axis] >= 0.0 { 1.0 } else { -1.0 };
                    let axis_world = target.rotation() * unit_axis(axis);

                    // face the camera as much as possible while keeping the axis in-plane
                    let normal = ray.direction - axis_world * ray.direction.dot(axis_world);
                    if normal.length_squared() < 1e-12 {
                        return None;
                    }

                    Some(EditSession::Resize {
                        id,
                        baseline: ResizeBaseline {
                            original: target.clone(),
                            axis,
                            sign,
                            start: hit.local_point[axis],
                            plane_point: hit.point,
                            plane_normal: normal.normalize(),
                        },
                    })
                })
            }
        };

        if self.session.is_some() {
            log::debug!("start {:?} on box {id}", gesture);
        }
        self.state()
    }

    /// Update the active drag with a new pointer position.
    ///
    /// A resize tracks the pointer on the drag plane fixed at pointer-down,
    /// so it keeps following the pointer after it leaves the box faces.
    ///
    /// # Returns
    ///
    /// `true` if a box changed.
    pub fn pointer_move(&mut self, screen: DVec2, camera: &dyn Camera, scene: &mut dyn Scene) -> bool {
        let min_size = self.config.min_box_size;
        let sensitivity = self.config.rotate_sensitivity;
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let ray = camera.screen_ray(screen);
        let id = match session {
            EditSession::Move { id, previous } => {
                let Some(target) = self.entries.get_mut(id) else {
                    return false;
                };
                let Some(p) = ray.intersect_horizontal_plane(target.center.z) else {
                    return false;
                };
                let delta = p - *previous;
                target.center.x += delta.x;
                target.center.y += delta.y;
                *previous = p;
                *id
            }
            EditSession::Rotate {
                id,
                start_x,
                start_yaw,
            } => {
                let Some(target) = self.entries.get_mut(id) else {
                    return false;
                };
                target.yaw = normalize_angle(*start_yaw + (screen.x - *start_x) * sensitivity);
                *id
            }
            EditSession::Resize { id, baseline } => {
                let Some(target) = self.entries.get_mut(id) else {
                    return false;
                };
                let Some(p) = ray.intersect_plane(baseline.plane_point, baseline.plane_normal)
                else {
                    return false;
                };

                let original = &baseline.original;
                let axis = baseline.axis;
                let delta = original.world_to_local(p)[axis] - baseline.start;

                let base = original.size[axis];
                let clamped = (base + delta * baseline.sign).max(min_size);
                let applied = clamped - base;

                target.size = original.size;
                target.size[axis] = clamped;
                target.center = original.center
                    + original.rotation() * unit_axis(axis) * (applied * 0.5 * baseline.sign);
                *id
            }
        };

        self.sync(id, scene);
        true
    }

    /// Finish the active drag.
    ///
    /// # Returns
    ///
    /// `true` if a drag was in progress.
    pub fn pointer_up(&mut self) -> bool {
        match self.session.take() {
            Some(_) => {
                if let Some(b) = self.active_box() {
                    log::debug!("committed box {:?}", b.info());
                }
                true
            }
            None => false,
        }
    }

    /// Apply a keyboard nudge to the active box.
    ///
    /// Refused while a drag is in progress.
    pub fn nudge(&mut self, key: NudgeKey, scene: &mut dyn Scene) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some(id) = self.active else {
            return false;
        };
        let Some(target) = self.entries.get_mut(&id) else {
            return false;
        };

        let step = self.config.move_step;
        let (forward, left) = (target.forward(), target.left());
        match key {
            NudgeKey::Forward => target.center += forward * step,
            NudgeKey::Back => target.center -= forward * step,
            NudgeKey::Left => target.center += left * step,
            NudgeKey::Right => target.center -= left * step,
            NudgeKey::Up => target.center.z += self.config.move_step_z,
            NudgeKey::Down => target.center.z -= self.config.move_step_z,
            NudgeKey::YawLeft => target.yaw = normalize_angle(target.yaw + self.config.rotate_step),
            NudgeKey::YawRight => {
                target.yaw = normalize_angle(target.yaw - self.config.rotate_step)
            }
        }

        self.sync(id, scene);
        true
    }

    /// Remove the active box.
    ///
    /// Refused while a drag is in progress.
    pub fn delete_active(&mut self, scene: &mut dyn Scene) -> Option<InstanceBox> {
        if self.session.is_some() {
            return None;
        }
        let id = self.active.take()?;
        remove_box(scene, id);
        let removed = self.entries.remove(&id);
        if let Some(b) = &removed {
            log::info!("deleted box {} / {}", b.category, b.instance);
        }
        removed
    }

    /// Replace the dimensions of a box, keeping its center and yaw.
    pub fn set_size(
        &mut self,
        id: BoxId,
        size: DVec3,
        scene: &mut dyn Scene,
    ) -> Result<bool, AnnotationError> {
        let Some(target) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        target.set_size(size, self.config.min_box_size)?;
        self.sync(id, scene);
        Ok(true)
    }

    /// Summary of a box.
    pub fn info(&self, id: BoxId) -> Option<BoxInfo> {
        self.entries.get(&id).map(InstanceBox::info)
    }

    /// Rebuild the primitives of a box from its record.
    fn sync(&self, id: BoxId, scene: &mut dyn Scene) {
        if let Some(b) = self.entries.get(&id) {
            sync_box(scene, id, b, self.active == Some(id));
        }
    }
}
