use argh::FromArgs;
use serde::Serialize;
use std::path::{Path, PathBuf};

use lidarlab::k3d::config::EditorConfig;
use lidarlab::k3d::editor::Annotator;
use lidarlab::k3d::instance_box::BoxInfo;
use lidarlab::k3d::io::{kitti, meta, pcd};
use lidarlab::k3d::labels::kitti_type_name;
use lidarlab::k3d::scene::HeadlessScene;

#[derive(FromArgs)]
/// Derive oriented boxes from a labeled point cloud and export them as KITTI labels
struct Args {
    /// path to the per-point metadata (.npy, shape (N, 9))
    #[argh(option, short = 'm')]
    meta_path: PathBuf,

    /// path to the point geometry (.pcd); the metadata positions are used if omitted
    #[argh(option, short = 'p')]
    pcd_path: Option<PathBuf>,

    /// directory to write the label file and the box summary to
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,

    /// path to a JSON file with editor parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// also write the metadata with the current labels
    #[argh(switch)]
    write_meta: bool,
}

#[derive(Serialize)]
struct BoxSummary {
    kitti_type: &'static str,
    #[serde(flatten)]
    info: BoxInfo,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => EditorConfig::default(),
    };
    log::debug!("editor config: {config:?}");

    let table = meta::MetaTable::read(&args.meta_path)?;

    // the geometry comes from the pcd file or from the metadata columns
    let positions = match &args.pcd_path {
        Some(path) => pcd::read_pcd(path)?,
        None => (0..table.len())
            .filter_map(|i| table.position(i))
            .map(|p| p.as_vec3().to_array())
            .collect(),
    };

    let mut annotator = Annotator::new(config);
    annotator.load_points(positions);
    annotator.load_meta(table)?;

    let mut scene = HeadlessScene::new();
    let ids = annotator.generate_boxes(&mut scene)?;
    println!("Derived #{} boxes", ids.len());

    for path in write_outputs(&mut annotator, &args.output_dir, args.write_meta)? {
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Write the label file, the box summary and optionally the metadata.
///
/// The label file is skipped when there are no boxes.
fn write_outputs(
    annotator: &mut Annotator,
    output_dir: &Path,
    write_meta: bool,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if annotator.boxes().is_empty() {
        log::warn!("no labeled group has enough points, skipping the KITTI labels");
    } else {
        let kitti_path = output_dir.join(kitti::KITTI_FILE_NAME);
        annotator.write_kitti(&kitti_path)?;
        written.push(kitti_path);
    }

    let summary = annotator
        .boxes()
        .boxes()
        .map(|(_, b)| BoxSummary {
            kitti_type: kitti_type_name(b.category),
            info: b.info(),
        })
        .collect::<Vec<_>>();
    let summary_path = output_dir.join("boxes.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    written.push(summary_path);

    if write_meta {
        let meta_path = output_dir.join(meta::META_FILE_NAME);
        std::fs::write(&meta_path, annotator.export_meta_npy()?)?;
        written.push(meta_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_summary_without_boxes() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;

        // three labeled points are below the group minimum
        let rows = (0..3)
            .map(|i| [i as f64, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0])
            .collect::<Vec<_>>();
        let positions = rows.iter().map(|r| [r[0] as f32, 0.0, 0.0]).collect();

        let mut annotator = Annotator::new(EditorConfig::default());
        annotator.load_points(positions);
        annotator.load_meta(meta::MetaTable::from_rows(rows))?;
        let mut scene = HeadlessScene::new();
        assert!(annotator.generate_boxes(&mut scene)?.is_empty());

        let written = write_outputs(&mut annotator, tmp_dir.path(), true)?;
        assert_eq!(written.len(), 2);
        assert!(!tmp_dir.path().join(kitti::KITTI_FILE_NAME).exists());
        assert_eq!(
            std::fs::read_to_string(tmp_dir.path().join("boxes.json"))?,
            "[]"
        );
        assert!(tmp_dir.path().join(meta::META_FILE_NAME).exists());
        Ok(())
    }
}
