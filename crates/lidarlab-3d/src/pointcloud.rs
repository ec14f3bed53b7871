use glam::{DVec2, DVec3};

use crate::camera::Camera;
use crate::error::AnnotationError;
use crate::io::meta::MetaTable;
use crate::labels::{category_color, Label, BACKGROUND, PICK_COLOR, SELECTION_COLOR};
use crate::selection::{point_in_polygon, SelectionMask};

/// A labeled point cloud with a selection mask.
///
/// Positions, labels and the selection are co-indexed. The number of points
/// is fixed for the lifetime of the value; loading new geometry builds a new
/// `PointCloud`.
#[derive(Debug, Clone)]
pub struct PointCloud {
    // The point positions.
    positions: Vec<[f32; 3]>,
    // The category id of each point.
    categories: Vec<u16>,
    // The instance id of each point.
    instances: Vec<u16>,
    // The source frame of each point, if known.
    frames: Option<Vec<u16>>,
    // The points picked by lasso strokes.
    selection: SelectionMask,
}

impl PointCloud {
    /// Create an unlabeled point cloud.
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        let n = positions.len();
        Self {
            positions,
            categories: vec![BACKGROUND; n],
            instances: vec![BACKGROUND; n],
            frames: None,
            selection: SelectionMask::new(n),
        }
    }

    /// Create a point cloud with existing labels.
    ///
    /// # Arguments
    ///
    /// * `positions` - The point positions.
    /// * `categories` - One category id per point.
    /// * `instances` - One instance id per point.
    pub fn with_labels(
        positions: Vec<[f32; 3]>,
        categories: Vec<u16>,
        instances: Vec<u16>,
    ) -> Result<Self, AnnotationError> {
        for labels in [&categories, &instances] {
            if labels.len() != positions.len() {
                return Err(AnnotationError::Mismatch {
                    points: positions.len(),
                    rows: labels.len(),
                });
            }
        }

        let mut cloud = Self::new(positions);
        cloud.categories = categories;
        cloud.instances = instances;
        Ok(cloud)
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get as reference the point positions.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    /// Get as reference the category ids.
    pub fn categories(&self) -> &[u16] {
        &self.categories
    }

    /// Get as reference the instance ids.
    pub fn instances(&self) -> &[u16] {
        &self.instances
    }

    /// Get as reference the source frames, if known.
    pub fn frames(&self) -> Option<&[u16]> {
        self.frames.as_deref()
    }

    /// Get as reference the selection mask.
    pub fn selection(&self) -> &SelectionMask {
        &self.selection
    }

    /// The position of a point in double precision.
    #[inline]
    pub fn position(&self, index: usize) -> Option<DVec3> {
        self.positions
            .get(index)
            .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
    }

    /// The label of a point.
    pub fn label(&self, index: usize) -> Option<Label> {
        Some(Label {
            category: *self.categories.get(index)?,
            instance: *self.instances.get(index)?,
        })
    }

    /// Replace labels and frames with the columns of a metadata table.
    ///
    /// Nothing changes if the table has a different number of rows.
    pub fn set_labels_from_meta(&mut self, meta: &MetaTable) -> Result<(), AnnotationError> {
        if meta.len() != self.len() {
            return Err(AnnotationError::Mismatch {
                points: self.len(),
                rows: meta.len(),
            });
        }
        self.categories = meta.categories();
        self.instances = meta.instances();
        self.frames = Some(meta.frames());
        Ok(())
    }

    /// Copy the labels into the label columns of a metadata table.
    pub fn write_labels_to_meta(&self, meta: &mut MetaTable) -> Result<(), AnnotationError> {
        if meta.len() != self.len() {
            return Err(AnnotationError::Mismatch {
                points: self.len(),
                rows: meta.len(),
            });
        }
        meta.set_labels(&self.categories, &self.instances)
    }

    /// Project a point to pixels.
    pub fn project_to_screen(&self, index: usize, camera: &dyn Camera) -> Option<DVec2> {
        camera.project_to_screen(self.position(index)?)
    }

    /// Add every unselected point whose projection lies inside `polygon`
    /// to the selection.
    ///
    /// # Returns
    ///
    /// The number of newly selected points.
    pub fn select_in_polygon(&mut self, polygon: &[DVec2], camera: &dyn Camera) -> usize {
        if polygon.len() < 3 {
            return 0;
        }

        let mut added = 0;
        for i in 0..self.len() {
            if self.selection.contains(i) {
                continue;
            }
            let Some(screen) = self.project_to_screen(i, camera) else {
                continue;
            };
            if point_in_polygon(screen, polygon) && self.selection.insert(i) {
                added += 1;
            }
        }

        log::debug!(
            "lasso selected {added} points, {} selected in total",
            self.selection.count()
        );
        added
    }

    /// Overwrite the labels of every selected point and clear the selection.
    ///
    /// # Returns
    ///
    /// The number of relabeled points.
    pub fn apply_labels(&mut self, category: u16, instance: u16) -> usize {
        let mut count = 0;
        for i in self.selection.iter() {
            self.categories[i] = category;
            self.instances[i] = instance;
            count += 1;
        }
        self.selection.clear();

        if count > 0 {
            log::info!("labeled {count} points as category {category} instance {instance}");
        }
        count
    }

    /// Deselect every point.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Find the point whose projection is nearest to `screen`.
    ///
    /// # Arguments
    ///
    /// * `screen` - Pointer position in pixels.
    /// * `radius` - Maximum pixel distance.
    /// * `camera` - The view camera.
    ///
    /// # Returns
    ///
    /// The index of the nearest point within `radius`, preferring the point
    /// closer to the camera on equal pixel distance.
    pub fn pick_point(&self, screen: DVec2, radius: f64, camera: &dyn Camera) -> Option<usize> {
        let viewport = camera.viewport();
        let mut best: Option<(usize, f64, f64)> = None;

        for i in 0..self.len() {
            let Some(position) = self.position(i) else {
                continue;
            };
            let ndc = camera.world_to_ndc(position);
            if !(-1.0..=1.0).contains(&ndc.z) {
                continue;
            }
            let distance = viewport.ndc_to_screen(ndc.truncate()).distance(screen);
            if distance > radius {
                continue;
            }
            let closer = match best {
                None => true,
                Some((_, d, z)) => distance < d || (distance == d && ndc.z < z),
            };
            if closer {
                best = Some((i, distance, ndc.z));
            }
        }

        best.map(|(i, _, _)| i)
    }

    /// Sorted instance ids in use for a category, excluding the background id.
    pub fn instances_of(&self, category: u16) -> Vec<u16> {
        let mut ids = self
            .categories
            .iter()
            .zip(&self.instances)
            .filter(|(c, i)| **c == category && **i != BACKGROUND)
            .map(|(_, i)| *i)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Display color of a point.
    pub fn point_color(&self, index: usize) -> [f32; 3] {
        if self.selection.contains(index) {
            SELECTION_COLOR
        } else {
            category_color(self.categories.get(index).copied().unwrap_or(BACKGROUND))
        }
    }

    /// Display colors of every point, with an optional picked point.
    pub fn colors(&self, picked: Option<usize>) -> Vec<[f32; 3]> {
        (0..self.len())
            .map(|i| {
                if picked == Some(i) {
                    PICK_COLOR
                } else {
                    self.point_color(i)
                }
            })
            .collect()
    }

    /// Get the minimum bound of the point cloud.
    pub fn get_min_bound(&self) -> DVec3 {
        (0..self.len())
            .filter_map(|i| self.position(i))
            .reduce(DVec3::min)
            .unwrap_or(DVec3::ZERO)
    }

    /// Get the maximum bound of the point cloud.
    pub fn get_max_bound(&self) -> DVec3 {
        (0..self.len())
            .filter_map(|i| self.position(i))
            .reduce(DVec3::max)
            .unwrap_or(DVec3::ZERO)
    }
}
