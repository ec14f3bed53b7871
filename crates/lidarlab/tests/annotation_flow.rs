use approx::assert_relative_eq;
use glam::{DVec2, DVec3};

use lidarlab::io::npy;
use lidarlab::k3d::camera::{Camera, PerspectiveCamera, Viewport};
use lidarlab::k3d::config::EditorConfig;
use lidarlab::k3d::edit::{EditState, Modifiers, NudgeKey, PointerButton};
use lidarlab::k3d::editor::Annotator;
use lidarlab::k3d::io::kitti::{read_kitti, KITTI_FILE_NAME};
use lidarlab::k3d::io::meta::{MetaTable, META_FILE_NAME};
use lidarlab::k3d::labels::{ClassOption, InstanceChoice};
use lidarlab::k3d::scene::{HeadlessScene, PrimitiveKey};

fn camera() -> PerspectiveCamera {
    PerspectiveCamera::look_at(
        DVec3::new(0.0, 0.0, 40.0),
        DVec3::ZERO,
        DVec3::Y,
        60f64.to_radians(),
        0.1,
        200.0,
        Viewport::new(1024.0, 768.0),
    )
}

/// Two well separated 3 x 1 x 1 clusters of 4 x 3 x 2 points.
fn scene_rows() -> Vec<[f64; 9]> {
    let mut rows = Vec::new();
    for (cx, frame) in [(-6.0, 0.0), (6.0, 1.0)] {
        for i in 0..4 {
            for j in 0..3 {
                for k in 0..2 {
                    let x = cx - 1.5 + i as f64;
                    let y = -0.5 + 0.5 * j as f64;
                    let z = k as f64;
                    rows.push([x, y, z, 0.0, 0.0, 0.0, frame, 0.0, 0.0]);
                }
            }
        }
    }
    rows
}

fn pcd_ascii(rows: &[[f64; 9]]) -> Vec<u8> {
    let mut text = format!(
        "VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\nWIDTH {n}\nHEIGHT 1\nPOINTS {n}\nDATA ascii\n",
        n = rows.len()
    );
    for r in rows {
        text.push_str(&format!("{} {} {}\n", r[0], r[1], r[2]));
    }
    text.into_bytes()
}

fn lasso_around(camera: &dyn Camera, min: DVec2, max: DVec2) -> Vec<DVec2> {
    [
        DVec2::new(min.x, min.y),
        DVec2::new(max.x, min.y),
        DVec2::new(max.x, max.y),
        DVec2::new(min.x, max.y),
    ]
    .iter()
    .filter_map(|p| camera.project_to_screen(p.extend(0.0)))
    .collect()
}

#[test]
fn label_derive_edit_and_export() -> Result<(), Box<dyn std::error::Error>> {
    let camera = camera();
    let mut scene = HeadlessScene::new();
    let mut annotator = Annotator::new(EditorConfig::default());

    let rows = scene_rows();
    let meta_bytes = MetaTable::from_rows(rows.clone()).encode()?;

    annotator.load_pcd_bytes(&pcd_ascii(&rows))?;
    annotator.load_meta_bytes(&meta_bytes)?;
    assert_eq!(annotator.cloud().map(|c| c.len()), Some(48));

    let options = vec![
        ClassOption {
            id: 1,
            name: "car".into(),
            is_thing: true,
        },
        ClassOption {
            id: 2,
            name: "pedestrian".into(),
            is_thing: true,
        },
    ];

    // left cluster becomes car #1, right cluster car #2
    let selected = annotator.select_lasso(
        &lasso_around(&camera, DVec2::new(-8.0, -2.0), DVec2::new(-4.0, 2.0)),
        &camera,
    )?;
    assert_eq!(selected, 24);
    let (first, count) = annotator.apply_decision(&options, "car", InstanceChoice::New)?;
    assert_eq!((first.category, first.instance, count), (1, 1, 24));

    annotator.select_lasso(
        &lasso_around(&camera, DVec2::new(4.0, -2.0), DVec2::new(8.0, 2.0)),
        &camera,
    )?;
    let (second, _) = annotator.apply_decision(&options, "car", InstanceChoice::New)?;
    assert_eq!(second.instance, 2);

    let ids = annotator.generate_boxes(&mut scene)?;
    assert_eq!(ids.len(), 2);
    let derived = annotator.boxes().get(ids[1]).cloned().ok_or("missing box")?;
    assert_relative_eq!(derived.center.x, 6.0, epsilon = 1e-6);
    assert_relative_eq!(derived.size.x, 3.0, epsilon = 1e-6);
    assert_relative_eq!(derived.size.y, 1.0, epsilon = 1e-6);

    // activate the right box, drag it 2 m along y, then nudge it up
    let editor = annotator.boxes_mut();
    let picked = editor.pick_and_activate(
        camera.project_to_screen(derived.center).ok_or("off screen")?,
        &camera,
        &mut scene,
    );
    assert_eq!(picked, Some(ids[1]));
    assert!(scene.get(PrimitiveKey::Heading(ids[1])).is_some());

    let alt = Modifiers {
        alt: true,
        ..Default::default()
    };
    let z = derived.center.z;
    let start = camera
        .project_to_screen(DVec3::new(6.0, 0.0, z))
        .ok_or("off screen")?;
    let end = camera
        .project_to_screen(DVec3::new(6.0, 2.0, z))
        .ok_or("off screen")?;
    assert_eq!(
        editor.pointer_down(start, PointerButton::Left, alt, &camera),
        EditState::Moving
    );
    editor.pointer_move(end, &camera, &mut scene);
    editor.pointer_up();
    assert!(editor.nudge(NudgeKey::Up, &mut scene));

    let moved = editor.get(ids[1]).cloned().ok_or("missing box")?;
    assert_relative_eq!(moved.center.y, derived.center.y + 2.0, epsilon = 1e-6);
    assert_relative_eq!(moved.center.z, derived.center.z + 0.1, epsilon = 1e-12);

    // export both files and read them back
    let tmp_dir = tempfile::tempdir()?;
    let kitti_path = tmp_dir.path().join(KITTI_FILE_NAME);
    annotator.write_kitti(&kitti_path)?;

    let text = annotator.export_kitti()?;
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|l| l.starts_with("Car ")));

    let labels = read_kitti(&kitti_path)?;
    assert_eq!(labels.len(), 2);
    assert_relative_eq!(labels[1].center.y, moved.center.y, epsilon = 1e-3);
    assert_relative_eq!(labels[1].center.z, moved.center.z, epsilon = 1e-3);

    let meta_path = tmp_dir.path().join(META_FILE_NAME);
    std::fs::write(&meta_path, annotator.export_meta_npy()?)?;

    let array = npy::read_npy(&meta_path)?;
    assert_eq!(array.shape(), &[48, 9]);
    assert_eq!(array.dtype(), npy::NpyDType::Float64);

    let table = MetaTable::read(&meta_path)?;
    assert_eq!(table.categories(), vec![1; 48]);
    assert_eq!(&table.instances()[..24], &[1; 24][..]);
    assert_eq!(&table.instances()[24..], &[2; 24][..]);
    assert_eq!(table.frame(47), Some(1));
    assert_eq!(table.position(5), MetaTable::from_rows(rows).position(5));

    Ok(())
}

#[test]
fn failed_loads_leave_state_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let mut annotator = Annotator::new(EditorConfig::default());
    let rows = scene_rows();
    annotator.load_pcd_bytes(&pcd_ascii(&rows))?;
    annotator.load_meta(MetaTable::from_rows(rows))?;

    // wrong magic
    assert!(annotator.load_meta_bytes(b"NOTNUMPY").is_err());
    // wrong row count
    let short = MetaTable::from_rows(vec![[0.0; 9]; 3]).encode()?;
    assert!(annotator.load_meta_bytes(&short).is_err());
    // wrong column count
    let array = npy::NpyArray::new(vec![48, 3], npy::NpyData::Float64(vec![0.0; 144]))?;
    assert!(annotator.load_meta_bytes(&npy::encode_npy(&array)?).is_err());

    assert_eq!(annotator.meta().map(MetaTable::len), Some(48));
    assert_eq!(annotator.cloud().map(|c| c.len()), Some(48));
    Ok(())
}
