use super::*;

fn canvas() -> Canvas {
    Canvas {
        width: 32,
        height: 18,
    }
}

fn solid(w: u32, h: u32, px: [u8; 4]) -> image::RgbaImage {
    image::RgbaImage::from_pixel(w, h, image::Rgba(px))
}

#[test]
fn scale_stays_within_breathing_range() {
    let b = BreathingParams::default();
    for i in 0..500 {
        let s = b.scale_at(f64::from(i) * 0.1);
        assert!((1.0..=1.1 + 1e-12).contains(&s), "scale {s}");
    }
    // sin(0) = 0, so t=0 sits halfway.
    assert!((b.scale_at(0.0) - 1.05).abs() < 1e-12);
    // Quarter period (1 / (4 * 0.08) s) peaks.
    assert!((b.scale_at(3.125) - 1.1).abs() < 1e-9);
}

#[test]
fn zero_amplitude_never_zooms() {
    let b = BreathingParams {
        amplitude: 0.0,
        frequency_hz: 0.5,
    };
    assert_eq!(b.scale_at(0.7), 1.0);
}

#[test]
fn transform_keeps_center_fixed() {
    let bg = BackgroundAnimator::from_rgba(
        solid(8, 8, [255, 0, 0, 255]),
        canvas(),
        FitMode::Stretch,
        BreathingParams::default(),
    )
    .unwrap();
    let tr = bg.transform_at(1.3);
    let c = canvas().center();
    let mapped = tr * kurbo::Point::new(c.x, c.y);
    assert!((mapped.x - c.x).abs() < 1e-9);
    assert!((mapped.y - c.y).abs() < 1e-9);

    // Corners move outward, so the scaled image still covers the canvas.
    let corner = tr * kurbo::Point::ORIGIN;
    assert!(corner.x <= 0.0 && corner.y <= 0.0);
}

#[test]
fn fit_modes_produce_canvas_sized_images() {
    let img = solid(40, 10, [0, 0, 255, 255]);
    for fit in [FitMode::Stretch, FitMode::Cover] {
        let out = fit_to_canvas(&img, canvas(), fit);
        assert_eq!(out.dimensions(), (32, 18));
    }
}

#[test]
fn rejects_invalid_inputs() {
    assert!(
        BackgroundAnimator::from_rgba(
            solid(4, 4, [0; 4]),
            Canvas {
                width: 31,
                height: 18
            },
            FitMode::Stretch,
            BreathingParams::default()
        )
        .is_err()
    );
    assert!(
        BackgroundAnimator::from_rgba(
            solid(4, 4, [0; 4]),
            canvas(),
            FitMode::Stretch,
            BreathingParams {
                amplitude: f64::NAN,
                frequency_hz: 0.1
            }
        )
        .is_err()
    );
}

#[test]
fn open_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = BackgroundAnimator::open(
        &dir.path().join("9.png"),
        canvas(),
        FitMode::Stretch,
        BreathingParams::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("9.png"));
}
