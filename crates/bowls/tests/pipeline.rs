mod common;

use approx::assert_abs_diff_eq;
use bowls::{
    ErrorKind, MeasureRequest, Pipeline, PipelineParams, ProcessError, SettingsSnapshot, Stage,
    StageCell, Team,
};
use image::{Rgb, RgbImage};

use common::{end_scene, marker_scene, png_bytes, sharp_snapshot};

#[test]
fn fast_mode_ranks_bowls_by_edge_gap() {
    let request = MeasureRequest::new(png_bytes(&end_scene(1.0)));
    let stage = StageCell::default();
    let result = Pipeline::default()
        .run(&request, &sharp_snapshot(), &stage)
        .expect("measure");

    assert_eq!(stage.get(), Stage::Done);
    assert!(!result.using_high_accuracy);
    assert_eq!(result.accuracy_message, None);
    assert_eq!(result.image_width, Some(560));
    assert_eq!(result.image_height, Some(300));
    result.check_invariants().expect("invariants");

    assert_eq!(result.bowls.len(), 2);
    let near = &result.bowls[0];
    let far = &result.bowls[1];
    assert_eq!(near.rank, 1);
    assert_abs_diff_eq!(near.distance_from_jack, 15.9, epsilon = 0.3);
    assert_abs_diff_eq!(near.x, 75.0, epsilon = 0.5);
    assert_abs_diff_eq!(far.distance_from_jack, 31.3, epsilon = 0.5);
    assert_abs_diff_eq!(far.x, 480.0, epsilon = 0.5);

    // uncalibrated: color buckets, most populous first
    assert_ne!(near.team, far.team);
    assert!(matches!(near.team, Team::TeamA | Team::TeamB));

    let jack = result.jack.expect("jack position");
    assert_abs_diff_eq!(jack.x, 230.0, epsilon = 0.5);
    assert_abs_diff_eq!(jack.radius, 20.0, epsilon = 1.0);
}

#[test]
fn large_images_are_measured_at_reduced_size_and_reported_in_original_pixels() {
    let params = PipelineParams {
        max_dimension: 840,
        ..PipelineParams::default()
    };
    let request = MeasureRequest::new(png_bytes(&end_scene(3.0)));
    let result = Pipeline::new(params)
        .run(&request, &sharp_snapshot(), &StageCell::default())
        .expect("measure");

    assert_eq!(result.image_width, Some(1680));
    assert_eq!(result.image_height, Some(900));
    assert_eq!(result.bowls.len(), 2);
    assert_abs_diff_eq!(result.bowls[0].distance_from_jack, 15.9, epsilon = 0.5);
    assert_abs_diff_eq!(result.bowls[0].x, 225.0, epsilon = 2.0);
    assert_abs_diff_eq!(result.bowls[0].y, 450.0, epsilon = 2.0);
    let jack = result.jack.expect("jack position");
    assert_abs_diff_eq!(jack.x, 690.0, epsilon = 2.0);
    assert_abs_diff_eq!(jack.radius, 60.0, epsilon = 3.0);
}

#[test]
fn corner_markers_give_plane_distances() {
    let request = MeasureRequest::new(png_bytes(&marker_scene(&[0, 1, 2, 3])))
        .with_high_accuracy(true);
    let stage = StageCell::default();
    let result = Pipeline::default()
        .run(&request, &sharp_snapshot(), &stage)
        .expect("measure");

    assert!(result.using_high_accuracy);
    assert_eq!(result.accuracy_message, None);
    // marker blobs are not bowls
    assert_eq!(result.bowls.len(), 1);
    // 100 px between centers, 2000 mm over 296 px
    assert_abs_diff_eq!(result.bowls[0].distance_from_jack, 67.6, epsilon = 0.3);
}

#[test]
fn missing_markers_fall_back_to_jack_scale() {
    let request =
        MeasureRequest::new(png_bytes(&marker_scene(&[0, 2]))).with_high_accuracy(true);
    let result = Pipeline::default()
        .run(&request, &sharp_snapshot(), &StageCell::default())
        .expect("fallback result");

    assert!(!result.using_high_accuracy);
    let msg = result.accuracy_message.as_deref().expect("message");
    assert!(msg.contains("[1, 3]"), "{msg}");

    // the two decoded markers are not ranked as bowls
    assert_eq!(result.bowls.len(), 1);
    let bowl = &result.bowls[0];
    assert_abs_diff_eq!(bowl.x, 300.0, epsilon = 1.0);
    // 50 px edge gap at 40 px per 63.5 mm
    assert_abs_diff_eq!(bowl.distance_from_jack, 7.9, epsilon = 0.2);
}

#[test]
fn markers_are_not_bowls_in_fast_mode() {
    let request = MeasureRequest::new(png_bytes(&marker_scene(&[0, 1, 2, 3])));
    let result = Pipeline::default()
        .run(&request, &sharp_snapshot(), &StageCell::default())
        .expect("measure");

    assert!(!result.using_high_accuracy);
    assert_eq!(result.accuracy_message, None);
    assert_eq!(result.bowls.len(), 1);
    assert_abs_diff_eq!(result.bowls[0].x, 300.0, epsilon = 1.0);
    assert_abs_diff_eq!(result.bowls[0].distance_from_jack, 7.9, epsilon = 0.2);
}

#[test]
fn missing_markers_are_an_error_when_high_accuracy_is_required() {
    let params = PipelineParams {
        require_high_accuracy: true,
        ..PipelineParams::default()
    };
    let request =
        MeasureRequest::new(png_bytes(&marker_scene(&[0, 2]))).with_high_accuracy(true);
    let err = Pipeline::new(params)
        .run(&request, &sharp_snapshot(), &StageCell::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MarkersIncomplete);
    assert!(!err.has_fallback_artifact());
}

#[test]
fn empty_mat_reports_no_objects() {
    let img = RgbImage::from_pixel(300, 200, common::MAT);
    let err = Pipeline::default()
        .run(
            &MeasureRequest::new(png_bytes(&img)),
            &SettingsSnapshot::default(),
            &StageCell::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessError::NoObjectsDetected {
            image_size: (300, 200)
        }
    ));
}

#[test]
fn elongated_objects_only_means_no_jack() {
    let mut img = RgbImage::from_pixel(300, 200, common::MAT);
    for y in 90..110 {
        for x in 40..140 {
            img.put_pixel(x, y, Rgb([20, 20, 25]));
        }
        for x in 170..260 {
            img.put_pixel(x, y, Rgb([200, 30, 30]));
        }
    }
    let err = Pipeline::default()
        .run(
            &MeasureRequest::new(png_bytes(&img)),
            &sharp_snapshot(),
            &StageCell::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessError::JackNotFound {
            candidates: 2,
            image_size: (300, 200)
        }
    ));
}

#[test]
fn manual_jack_bypasses_selection() {
    let mut img = RgbImage::from_pixel(300, 200, common::MAT);
    for y in 90..110 {
        for x in 40..140 {
            img.put_pixel(x, y, Rgb([20, 20, 25]));
        }
    }
    // no object at the tap: a synthetic jack sized like the smallest object
    let request = MeasureRequest::new(png_bytes(&img)).with_manual_jack(250.0, 100.0);
    let result = Pipeline::default()
        .run(&request, &sharp_snapshot(), &StageCell::default())
        .expect("measure");
    assert_eq!(result.bowls.len(), 1);
    let jack = result.jack.expect("jack");
    assert_abs_diff_eq!(jack.x, 250.0, epsilon = 1e-9);
    assert!(result.bowls[0].distance_from_jack > 0.0);
}
