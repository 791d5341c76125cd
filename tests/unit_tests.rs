use nalgebra as na;

use uuv_synth_data::camera::{CameraPose, Intrinsics, Trajectory};
use uuv_synth_data::coco::{binary_mask_to_rle, mask_bbox, Rle, Segmentation};
use uuv_synth_data::config::validate_quality;
use uuv_synth_data::conversion::{
    convert_annotations, label_file_name, normalize_bbox, round4, SourceAnnotation,
};
use uuv_synth_data::scene::{assign_categories, ObjectKind, SceneObject};
use uuv_synth_data::Error;

fn annotation(image_id: u64, bbox: [f64; 4], width: f64, height: f64) -> SourceAnnotation {
    SourceAnnotation {
        image_id,
        bbox,
        width,
        height,
    }
}

#[test]
fn test_normalize_reference_box() {
    let label = annotation(1, [100.0, 50.0, 40.0, 20.0], 640.0, 480.0)
        .to_yolo(0, 0)
        .unwrap();

    assert_eq!(label.x_center, 0.1875);
    assert_eq!(label.y_center, 0.125);
    assert_eq!(label.width, 0.0625);
    assert_eq!(label.height, 0.0417);
    assert_eq!(label.to_line(), "0 0.1875 0.125 0.0625 0.0417");
}

#[test]
fn test_integral_values_keep_decimal_point() {
    let label = annotation(1, [0.0, 0.0, 640.0, 480.0], 640.0, 480.0)
        .to_yolo(0, 3)
        .unwrap();
    assert_eq!(label.to_line(), "3 0.5 0.5 1.0 1.0");

    let corner = annotation(1, [0.0, 0.0, 0.0, 0.0], 640.0, 480.0)
        .to_yolo(0, 0)
        .unwrap();
    assert_eq!(corner.to_line(), "0 0.0 0.0 0.0 0.0");
}

#[test]
fn test_normalized_boxes_inside_image_stay_in_unit_range() {
    let boxes = [
        [0.0, 0.0, 1.0, 1.0],
        [639.0, 479.0, 1.0, 1.0],
        [13.0, 200.0, 300.0, 17.0],
        [320.0, 0.0, 320.0, 480.0],
    ];
    for bbox in boxes {
        for v in normalize_bbox(&bbox, 640.0, 480.0) {
            assert!((0.0..=1.0).contains(&v), "{:?} gave {}", bbox, v);
        }
    }
}

#[test]
fn test_round4() {
    assert_eq!(round4(0.041666), 0.0417);
    assert_eq!(round4(0.12344), 0.1234);
    assert_eq!(round4(1.0), 1.0);
}

#[test]
fn test_round4_ties_to_even() {
    assert_eq!(round4(20.0 / 640.0), 0.0312);
    assert_eq!(round4(100.0 / 640.0), 0.1562);
    assert_eq!(round4(300.0 / 640.0), 0.4688);

    assert_eq!(
        normalize_bbox(&[0.0, 0.0, 20.0, 100.0], 640.0, 640.0),
        [0.0156, 0.0781, 0.0312, 0.1562]
    );
}

#[test]
fn test_label_file_name() {
    assert_eq!(label_file_name(7), "000007.txt");
    assert_eq!(label_file_name(0), "000000.txt");
    assert_eq!(label_file_name(123456), "123456.txt");
}

#[test]
fn test_zero_dimension_is_an_error() {
    let annotations = vec![
        annotation(4, [1.0, 1.0, 2.0, 2.0], 10.0, 10.0),
        annotation(5, [1.0, 1.0, 2.0, 2.0], 10.0, 0.0),
    ];

    match convert_annotations(&annotations, 0) {
        Err(Error::ZeroDimension {
            index,
            image_id,
            dimension,
        }) => {
            assert_eq!(index, 1);
            assert_eq!(image_id, 5);
            assert_eq!(dimension, "height");
        }
        other => panic!("expected a zero dimension error, got {:?}", other),
    }
}

#[test]
fn test_convert_annotations_groups_by_image_in_file_order() {
    let annotations = vec![
        annotation(2, [0.0, 0.0, 10.0, 10.0], 100.0, 100.0),
        annotation(1, [50.0, 50.0, 10.0, 10.0], 100.0, 100.0),
        annotation(2, [20.0, 20.0, 10.0, 10.0], 100.0, 100.0),
    ];

    let groups = convert_annotations(&annotations, 0).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&1], vec!["0 0.55 0.55 0.1 0.1"]);
    assert_eq!(groups[&2], vec!["0 0.05 0.05 0.1 0.1", "0 0.25 0.25 0.1 0.1"]);
}

#[test]
fn test_camera_pose_round_trip() {
    let pose = CameraPose::new(
        na::Vector3::new(1.0, -2.0, 3.5),
        na::UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        na::Vector3::new(1.0, 1.0, 1.0),
    );

    let decomposed = CameraPose::from_matrix(&pose.to_matrix());

    assert!((decomposed.location - pose.location).norm() < 1e-9);
    assert!((decomposed.scale - pose.scale).norm() < 1e-9);
    assert!(decomposed.rotation.angle_to(&pose.rotation) < 1e-9);
}

#[test]
fn test_camera_pose_mirrored_matrix_recomposes() {
    let matrix = na::Matrix4::new_translation(&na::Vector3::new(0.5, 0.0, -1.0))
        * na::UnitQuaternion::from_euler_angles(0.0, 0.4, 0.0).to_homogeneous()
        * na::Matrix4::new_nonuniform_scaling(&na::Vector3::new(-2.0, 1.0, 1.0));

    let pose = CameraPose::from_matrix(&matrix);

    assert!(pose.scale.iter().all(|s| *s < 0.0));
    assert!((pose.to_matrix() - matrix).norm() < 1e-9);
}

#[test]
fn test_intrinsics_k_matrix() {
    let intrinsics = Intrinsics::calibrated();
    let k = intrinsics.k_matrix();

    assert_eq!(k[(0, 0)], 605.455139160156);
    assert_eq!(k[(1, 1)], 604.331848144531);
    assert_eq!(k[(0, 2)], 325.368804931641);
    assert_eq!(k[(1, 2)], 248.078979492188);
    assert_eq!(k[(2, 2)], 1.0);
    assert_eq!(Intrinsics::from_k_matrix(&k).unwrap(), intrinsics);

    let (fov_x, fov_y) = intrinsics.field_of_view(640, 480);
    assert!(fov_x > fov_y && fov_y > 0.0);
}

#[test]
fn test_intrinsics_reject_skew() {
    let mut k = Intrinsics::calibrated().k_matrix();
    k[(0, 1)] = 0.5;
    assert!(matches!(
        Intrinsics::from_k_matrix(&k),
        Err(Error::InvalidIntrinsics(_))
    ));

    let mut k = Intrinsics::calibrated().k_matrix();
    k[(2, 2)] = 2.0;
    assert!(Intrinsics::from_k_matrix(&k).is_err());
}

#[test]
fn test_trajectory_range() {
    let poses = (0..3)
        .map(|i| {
            CameraPose::new(
                na::Vector3::new(i as f64, 0.0, 0.0),
                na::UnitQuaternion::identity(),
                na::Vector3::new(1.0, 1.0, 1.0),
            )
        })
        .collect();
    let trajectory = Trajectory::new(poses);

    assert_eq!(trajectory.len(), 3);
    assert!(!trajectory.is_empty());
    assert!(Trajectory::default().is_empty());
    assert_eq!(trajectory.pose(2).unwrap().location.x, 2.0);
    assert!(trajectory.check_frames(3).is_ok());
    assert!(matches!(
        trajectory.pose(3),
        Err(Error::FrameOutOfRange {
            frame: 3,
            available: 3
        })
    ));
    assert!(matches!(
        trajectory.check_frames(4),
        Err(Error::FrameOutOfRange { .. })
    ));
}

#[test]
fn test_binary_mask_to_rle() {
    // 3 wide, 2 high, row-major
    let mask = [false, true, true, false, true, false];
    assert_eq!(
        binary_mask_to_rle(&mask, 3, 2),
        Rle {
            counts: vec![2, 3, 1],
            size: [2, 3],
        }
    );

    // Foreground first still opens with an empty background run
    let mask = [true, false];
    assert_eq!(binary_mask_to_rle(&mask, 1, 2).counts, vec![0, 1, 1]);
}

#[test]
fn test_mask_bbox() {
    let mask = [false, true, true, false, true, false];
    assert_eq!(mask_bbox(&mask, 3, 2), Some([1.0, 0.0, 2.0, 2.0]));
    assert_eq!(mask_bbox(&[false; 6], 3, 2), None);
}

#[test]
fn test_segmentation_accepts_coco_variants() {
    let rle: Segmentation =
        serde_json::from_str(r#"{"counts": [2, 3, 1], "size": [2, 3]}"#).unwrap();
    assert!(matches!(rle, Segmentation::Rle(_)));

    let compressed: Segmentation =
        serde_json::from_str(r#"{"counts": "52203", "size": [2, 3]}"#).unwrap();
    assert!(matches!(compressed, Segmentation::CompressedRle { .. }));

    let polygon: Segmentation = serde_json::from_str("[[0.0, 0.0, 4.0, 0.0, 4.0, 4.0]]").unwrap();
    assert!(matches!(polygon, Segmentation::Polygon(_)));
}

#[test]
fn test_assign_categories() {
    let mut objects = vec![
        SceneObject::new("Gun1", ObjectKind::Mesh),
        SceneObject::new("Gun_holster", ObjectKind::Mesh),
        SceneObject::new("BigGun", ObjectKind::Mesh),
        SceneObject::new("Camera", ObjectKind::Camera),
    ];

    let tagged = assign_categories(&mut objects, "Gun", 1);

    assert_eq!(tagged, vec!["Gun1", "Gun_holster"]);
    assert_eq!(objects[0].category_id, Some(1));
    assert_eq!(objects[2].category_id, None);
    assert_eq!(objects[3].category_id, None);
}

#[test]
fn test_validate_quality() {
    assert!(validate_quality("95").is_ok());
    assert!(validate_quality("1").is_ok());
    assert!(validate_quality("100").is_ok());
    assert!(validate_quality("0").is_err());
    assert!(validate_quality("101").is_err());
    assert!(validate_quality("abc").is_err());
}
