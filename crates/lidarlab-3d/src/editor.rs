use std::path::Path;

use glam::{DVec2, DVec3};
use serde::Serialize;

use crate::camera::Camera;
use crate::config::EditorConfig;
use crate::derive::derive_boxes;
use crate::edit::BoxEditor;
use crate::error::AnnotationError;
use crate::io::kitti::{boxes_to_kitti, write_kitti};
use crate::io::meta::MetaTable;
use crate::io::pcd::decode_pcd;
use crate::labels::{decide_label, ClassOption, InstanceChoice, Label};
use crate::pointcloud::PointCloud;
use crate::scene::{BoxId, Scene};
use crate::selection::Lasso;

/// Number of leading rows whose positions are compared on metadata load.
const META_CHECK_ROWS: usize = 10;

/// Position tolerance of the metadata check.
const META_CHECK_EPS: f64 = 1e-3;

/// Metadata of a picked point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointInfo {
    /// Index of the point.
    pub index: usize,
    /// Point position.
    pub position: [f64; 3],
    /// Source frame, if metadata is loaded.
    pub frame: Option<u16>,
    /// Category id.
    pub category: u16,
    /// Instance id.
    pub instance: u16,
}

/// The annotation session.
///
/// Owns the point cloud, its metadata, the lasso stroke and the boxes. The
/// host passes its camera and scene into each operation that needs them.
#[derive(Debug, Default)]
pub struct Annotator {
    config: EditorConfig,
    cloud: Option<PointCloud>,
    meta: Option<MetaTable>,
    lasso: Lasso,
    boxes: BoxEditor,
}

impl Annotator {
    /// Create an empty session.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            boxes: BoxEditor::new(config.clone()),
            config,
            ..Default::default()
        }
    }

    /// The session parameters.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The loaded point cloud.
    pub fn cloud(&self) -> Option<&PointCloud> {
        self.cloud.as_ref()
    }

    /// The loaded metadata.
    pub fn meta(&self) -> Option<&MetaTable> {
        self.meta.as_ref()
    }

    /// The box editor.
    pub fn boxes(&self) -> &BoxEditor {
        &self.boxes
    }

    /// The box editor, for pointer and keyboard editing.
    pub fn boxes_mut(&mut self) -> &mut BoxEditor {
        &mut self.boxes
    }

    /// The lasso stroke.
    pub fn lasso(&self) -> &Lasso {
        &self.lasso
    }

    /// Replace the point geometry.
    ///
    /// The previous cloud, its selection and any metadata are dropped. Boxes
    /// are kept.
    pub fn load_points(&mut self, positions: Vec<[f32; 3]>) -> &PointCloud {
        log::info!("loaded {} points", positions.len());
        self.meta = None;
        self.lasso = Lasso::new();
        self.cloud.insert(PointCloud::new(positions))
    }

    /// Decode PCD bytes and replace the point geometry.
    ///
    /// The session is untouched if decoding fails.
    pub fn load_pcd_bytes(&mut self, bytes: &[u8]) -> Result<&PointCloud, AnnotationError> {
        let positions = decode_pcd(bytes)?;
        Ok(self.load_points(positions))
    }

    /// Attach metadata to the loaded cloud and take its labels.
    ///
    /// The session is untouched on error.
    pub fn load_meta(&mut self, meta: MetaTable) -> Result<(), AnnotationError> {
        let cloud = self.cloud.as_mut().ok_or(AnnotationError::NoPointCloud)?;
        if meta.len() != cloud.len() {
            return Err(AnnotationError::Mismatch {
                points: cloud.len(),
                rows: meta.len(),
            });
        }

        for i in 0..meta.len().min(META_CHECK_ROWS) {
            if let (Some(stored), Some(loaded)) = (meta.position(i), cloud.position(i)) {
                if stored.distance(loaded) > META_CHECK_EPS {
                    log::warn!(
                        "metadata row {i} position {stored} differs from point position {loaded}"
                    );
                }
            }
        }

        cloud.set_labels_from_meta(&meta)?;
        log::info!("loaded metadata with {} rows", meta.len());
        self.meta = Some(meta);
        Ok(())
    }

    /// Decode `.npy` bytes and attach them as metadata.
    pub fn load_meta_bytes(&mut self, bytes: &[u8]) -> Result<(), AnnotationError> {
        let meta = MetaTable::decode(bytes)?;
        self.load_meta(meta)
    }

    /// Start a lasso stroke.
    pub fn begin_lasso(&mut self, screen: DVec2) {
        self.lasso.begin(screen);
    }

    /// Extend the lasso stroke.
    pub fn extend_lasso(&mut self, screen: DVec2) {
        self.lasso.extend(screen);
    }

    /// Close the lasso stroke and select the points inside it.
    ///
    /// # Returns
    ///
    /// The number of newly selected points.
    pub fn finish_lasso(&mut self, camera: &dyn Camera) -> Result<usize, AnnotationError> {
        let polygon = self.lasso.finish().unwrap_or_default();
        self.select_lasso(&polygon, camera)
    }

    /// Add the points inside a screen-space polygon to the selection.
    pub fn select_lasso(&mut self, polygon: &[DVec2], camera: &dyn Camera) -> Result<usize, AnnotationError> {
        let cloud = self.cloud.as_mut().ok_or(AnnotationError::NoPointCloud)?;
        Ok(cloud.select_in_polygon(polygon, camera))
    }

    /// Label the selected points and clear the selection.
    pub fn apply_labels(&mut self, label: Label) -> Result<usize, AnnotationError> {
        let cloud = self.cloud.as_mut().ok_or(AnnotationError::NoPointCloud)?;
        Ok(cloud.apply_labels(label.category, label.instance))
    }

    /// Resolve a class/instance choice and label the selected points with it.
    pub fn apply_decision(
        &mut self,
        options: &[ClassOption],
        class_name: &str,
        choice: InstanceChoice,
    ) -> Result<(Label, usize), AnnotationError> {
        let cloud = self.cloud.as_ref().ok_or(AnnotationError::NoPointCloud)?;
        let category = options
            .iter()
            .find(|o| o.name == class_name)
            .map(|o| o.id)
            .ok_or_else(|| AnnotationError::UnknownClass(class_name.to_string()))?;

        let label = decide_label(options, class_name, choice, &cloud.instances_of(category))?;
        let count = self.apply_labels(label)?;
        Ok((label, count))
    }

    /// Discard the current selection.
    pub fn clear_selection(&mut self) {
        if let Some(cloud) = self.cloud.as_mut() {
            cloud.clear_selection();
        }
    }

    /// Inspect the point under the pointer.
    pub fn pick_point(&self, screen: DVec2, camera: &dyn Camera) -> Option<PointInfo> {
        let cloud = self.cloud.as_ref()?;
        let index = cloud.pick_point(screen, self.config.pick_radius_px, camera)?;
        let label = cloud.label(index)?;
        Some(PointInfo {
            index,
            position: cloud.position(index)?.to_array(),
            frame: self.meta.as_ref().and_then(|m| m.frame(index)),
            category: label.category,
            instance: label.instance,
        })
    }

    /// Derive one box per labeled group, replacing every existing box.
    pub fn generate_boxes(&mut self, scene: &mut dyn Scene) -> Result<Vec<BoxId>, AnnotationError> {
        let cloud = self.cloud.as_ref().ok_or(AnnotationError::NoPointCloud)?;
        let boxes = derive_boxes(cloud, self.config.min_group_points)?;
        Ok(self.boxes.replace_all(boxes, scene))
    }

    /// Remove every box.
    pub fn delete_all_boxes(&mut self, scene: &mut dyn Scene) {
        let count = self.boxes.len();
        self.boxes.clear(scene);
        log::info!("deleted {count} boxes");
    }

    /// Replace the dimensions of a box.
    pub fn set_box_size(
        &mut self,
        id: BoxId,
        size: DVec3,
        scene: &mut dyn Scene,
    ) -> Result<bool, AnnotationError> {
        self.boxes.set_size(id, size, scene)
    }

    /// Copy the current labels into the metadata and encode it as `.npy`.
    pub fn export_meta_npy(&mut self) -> Result<Vec<u8>, AnnotationError> {
        let cloud = self.cloud.as_ref().ok_or(AnnotationError::NoPointCloud)?;
        let meta = self.meta.as_mut().ok_or(AnnotationError::NoMetadata)?;
        cloud.write_labels_to_meta(meta)?;
        meta.encode()
    }

    /// Format the boxes as KITTI labels.
    pub fn export_kitti(&self) -> Result<String, AnnotationError> {
        if self.boxes.is_empty() {
            return Err(AnnotationError::NothingToExport);
        }
        Ok(boxes_to_kitti(self.boxes.boxes().map(|(_, b)| b)))
    }

    /// Write the boxes as a KITTI label file.
    pub fn write_kitti(&self, path: impl AsRef<Path>) -> Result<(), AnnotationError> {
        if self.boxes.is_empty() {
            return Err(AnnotationError::NothingToExport);
        }
        write_kitti(path, self.boxes.boxes().map(|(_, b)| b))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PerspectiveCamera, Viewport};
    use crate::scene::{HeadlessScene, Primitive, PrimitiveKey};

    fn top_down() -> PerspectiveCamera {
        PerspectiveCamera::look_at(
            DVec3::new(0.0, 0.0, 20.0),
            DVec3::ZERO,
            DVec3::Y,
            60f64.to_radians(),
            0.1,
            100.0,
            Viewport::new(800.0, 600.0),
        )
    }

    fn cluster() -> Vec<[f32; 3]> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..3 {
                points.push([i as f32, j as f32 * 0.5, 0.0]);
                points.push([i as f32, j as f32 * 0.5, 1.0]);
            }
        }
        points
    }

    #[test]
    fn test_requires_point_cloud() {
        let camera = top_down();
        let mut scene = HeadlessScene::new();
        let mut annotator = Annotator::new(EditorConfig::default());

        assert!(matches!(
            annotator.generate_boxes(&mut scene),
            Err(AnnotationError::NoPointCloud)
        ));
        assert!(matches!(
            annotator.load_meta(MetaTable::default()),
            Err(AnnotationError::NoPointCloud)
        ));
        assert!(matches!(
            annotator.select_lasso(&[], &camera),
            Err(AnnotationError::NoPointCloud)
        ));
        assert!(matches!(
            annotator.export_kitti(),
            Err(AnnotationError::NothingToExport)
        ));
        assert!(annotator.pick_point(DVec2::new(400.0, 300.0), &camera).is_none());
    }

    #[test]
    fn test_meta_mismatch_keeps_state() {
        let mut annotator = Annotator::new(EditorConfig::default());
        annotator.load_points(vec![[0.0; 3]; 3]);

        let meta = MetaTable::from_rows(vec![[0.0; 9]; 2]);
        assert!(matches!(
            annotator.load_meta(meta),
            Err(AnnotationError::Mismatch { points: 3, rows: 2 })
        ));
        assert!(annotator.meta().is_none());
        assert!(matches!(
            annotator.export_meta_npy(),
            Err(AnnotationError::NoMetadata)
        ));

        // a failed geometry decode leaves the cloud in place
        assert!(annotator.load_pcd_bytes(b"garbage").is_err());
        assert_eq!(annotator.cloud().map(PointCloud::len), Some(3));
    }

    #[test]
    fn test_lasso_label_and_generate() -> Result<(), AnnotationError> {
        let camera = top_down();
        let mut scene = HeadlessScene::new();
        let mut annotator = Annotator::new(EditorConfig::default());
        annotator.load_points(cluster());

        let corners = [
            DVec3::new(-0.5, -0.5, 0.0),
            DVec3::new(4.5, -0.5, 0.0),
            DVec3::new(4.5, 1.5, 0.0),
            DVec3::new(-0.5, 1.5, 0.0),
        ];
        let mut corners = corners.iter().map(|&p| camera.project_to_screen(p).unwrap());
        annotator.begin_lasso(corners.next().unwrap());
        corners.for_each(|p| annotator.extend_lasso(p));
        assert_eq!(annotator.finish_lasso(&camera)?, 30);

        let options = vec![ClassOption {
            id: 1,
            name: "car".into(),
            is_thing: true,
        }];
        let (label, count) = annotator.apply_decision(&options, "car", InstanceChoice::New)?;
        assert_eq!(label, Label { category: 1, instance: 1 });
        assert_eq!(count, 30);

        let ids = annotator.generate_boxes(&mut scene)?;
        assert_eq!(ids.len(), 1);
        assert_eq!(scene.len(), 2);
        assert!(matches!(
            scene.get(PrimitiveKey::Heading(ids[0])),
            Some(Primitive::Arrow { .. })
        ));

        let text = annotator.export_kitti()?;
        assert!(text.starts_with("Car 2.000 0.500 0.000 4.000 1.000 1.000 "));

        let info = annotator
            .pick_point(camera.project_to_screen(DVec3::new(4.0, 1.0, 1.0)).unwrap(), &camera)
            .unwrap();
        assert_eq!(info.category, 1);
        assert_eq!(info.position, [4.0, 1.0, 1.0]);
        assert_eq!(info.frame, None);

        annotator.delete_all_boxes(&mut scene);
        assert!(scene.is_empty());
        Ok(())
    }

    #[test]
    fn test_export_meta() -> Result<(), AnnotationError> {
        let mut annotator = Annotator::new(EditorConfig::default());
        annotator.load_points(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        annotator.load_meta(MetaTable::from_rows(vec![
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 1.0, 2.0],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0],
        ]))?;
        assert_eq!(annotator.cloud().unwrap().categories(), &[1, 0]);

        let bytes = annotator.export_meta_npy()?;
        let table = MetaTable::decode(&bytes)?;
        assert_eq!(table.categories(), vec![1, 0]);
        assert_eq!(table.instances(), vec![2, 0]);
        assert_eq!(table.frame(1), Some(2));
        Ok(())
    }
}
