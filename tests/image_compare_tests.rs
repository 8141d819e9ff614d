use render_parity::{
    ColorImage, DepthImage, ImageComparator, ImageTolerances, LabelImage, OracleError, Raster,
};

const W: u32 = 20;
const H: u32 = 10;

fn gradient_color() -> ColorImage {
    let samples = (0..W * H)
        .flat_map(|i| [(i % 256) as u8, (i * 7 % 256) as u8, 128])
        .collect();
    Raster::new(W, H, 3, samples).expect("raster")
}

/// Offsets the first `rows` rows of `image` by `delta` on the red channel.
fn shift_rows(image: &ColorImage, rows: u32, delta: u8) -> ColorImage {
    let mut out = image.clone();
    for y in 0..rows {
        for x in 0..W {
            let px = out.pixel_at_mut(x, y);
            px[0] = px[0].saturating_add(delta);
        }
    }
    out
}

#[test]
fn identical_images_pass_with_zero_fraction() {
    let cmp = ImageComparator::default();

    let color = gradient_color();
    let report = cmp.compare_color(&color, &color).expect("color");
    assert_eq!(report.invalid_fraction, 0.0);
    assert!(report.passed);

    let mut depth = DepthImage::filled(W, H, 1, 1.25);
    depth.pixel_at_mut(3, 4)[0] = f32::INFINITY;
    depth.pixel_at_mut(5, 6)[0] = f32::NAN;
    let report = cmp.compare_depth(&depth, &depth).expect("depth");
    assert_eq!(report.invalid_fraction, 0.0);

    let labels = LabelImage::filled(W, H, 1, 7);
    let report = cmp.compare_label(&labels, &labels).expect("label");
    assert_eq!(report.invalid_fraction, 0.0);
    assert!(report.passed);
}

#[test]
fn ten_percent_over_tolerance_still_passes() {
    let reference = ColorImage::filled(W, H, 3, 50);
    // one row of 20 pixels out of 200
    let candidate = shift_rows(&reference, 1, 21);
    let report = ImageComparator::default()
        .compare_color(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 20);
    assert!((report.invalid_fraction - 0.1).abs() < 1e-12);
    assert!(report.passed);
}

#[test]
fn twenty_percent_over_tolerance_fails() {
    let reference = ColorImage::filled(W, H, 3, 50);
    let candidate = shift_rows(&reference, 2, 21);
    let report = ImageComparator::default()
        .compare_color(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 40);
    // the threshold is exclusive
    assert!(!report.passed);
    assert_eq!(report.sample_invalid.first(), Some(&(0, 0)));
}

#[test]
fn color_difference_at_tolerance_is_valid() {
    let reference = ColorImage::filled(W, H, 3, 50);
    let candidate = shift_rows(&reference, H, 20);
    let report = ImageComparator::default()
        .compare_color(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 0);
    assert_eq!(report.max_difference, 20.0);
}

#[test]
fn color_differences_do_not_wrap() {
    let reference = ColorImage::filled(2, 2, 3, 0);
    let candidate = ColorImage::filled(2, 2, 3, 255);
    let report = ImageComparator::default()
        .compare_color(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_fraction, 1.0);
    assert_eq!(report.max_difference, 255.0);
}

#[test]
fn depth_non_finite_matches_zero() {
    let mut reference = DepthImage::filled(W, H, 1, 2.0);
    let mut candidate = reference.clone();
    for x in 0..W {
        reference.pixel_at_mut(x, 0)[0] = f32::INFINITY;
        reference.pixel_at_mut(x, 1)[0] = f32::NAN;
        candidate.pixel_at_mut(x, 0)[0] = 0.0;
        candidate.pixel_at_mut(x, 1)[0] = f32::NEG_INFINITY;
    }
    let report = ImageComparator::default()
        .compare_depth(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 0);
    assert!(report.passed);
}

#[test]
fn depth_tolerance_is_one_millimetre() {
    let reference = DepthImage::filled(4, 1, 1, 1.0);
    let mut candidate = reference.clone();
    candidate.pixel_at_mut(0, 0)[0] = 1.0005;
    candidate.pixel_at_mut(1, 0)[0] = 1.01;
    let report = ImageComparator::default()
        .compare_depth(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 1);
    assert_eq!(report.sample_invalid, vec![(1, 0)]);
    // 1 of 4 pixels invalid
    assert!(!report.passed);
}

#[test]
fn trusted_background_label_is_remapped() {
    let reference = LabelImage::filled(W, H, 1, 32766);
    let candidate = LabelImage::filled(W, H, 1, 32764);
    let report = ImageComparator::default()
        .compare_label(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_fraction, 0.0);
    assert!(report.passed);
}

#[test]
fn remap_applies_to_reference_only() {
    // the candidate's use of the trusted code is not forgiven
    let reference = LabelImage::filled(W, H, 1, 32764);
    let candidate = LabelImage::filled(W, H, 1, 32766);
    let report = ImageComparator::default()
        .compare_label(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_fraction, 1.0);
}

#[test]
fn labels_require_exact_match() {
    let reference = LabelImage::filled(10, 10, 1, 3);
    let mut candidate = reference.clone();
    for x in 0..10 {
        candidate.pixel_at_mut(x, 0)[0] = 4;
        candidate.pixel_at_mut(x, 1)[0] = 4;
    }
    let report = ImageComparator::default()
        .compare_label(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.invalid_pixels, 20);
    assert!(!report.passed);
}

#[test]
fn shape_mismatch_is_fatal() {
    let cmp = ImageComparator::default();
    let rgb = ColorImage::filled(4, 4, 3, 0);
    let rgba = ColorImage::filled(4, 4, 4, 0);
    let err = cmp.compare_color(&rgb, &rgba).unwrap_err();
    assert!(matches!(err, OracleError::ShapeMismatch { .. }));

    let small = DepthImage::filled(4, 3, 1, 0.0);
    let large = DepthImage::filled(4, 4, 1, 0.0);
    let err = cmp.compare_depth(&small, &large).unwrap_err();
    assert!(err.to_string().contains("4x3x1"));
}

#[test]
fn custom_threshold_is_honored() {
    let tolerances = ImageTolerances {
        invalid_fraction: 0.05,
        ..ImageTolerances::default()
    };
    let reference = ColorImage::filled(W, H, 3, 50);
    let candidate = shift_rows(&reference, 1, 21);
    let report = ImageComparator::new(tolerances)
        .compare_color(&candidate, &reference)
        .expect("compare");
    assert_eq!(report.threshold, 0.05);
    assert!(!report.passed);
}
