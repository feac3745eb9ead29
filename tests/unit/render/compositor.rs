use super::*;
use crate::animation::envelope::Envelope;
use crate::background::animator::{BreathingParams, FitMode};
use crate::foundation::core::Vec2;
use crate::text::overlay::Position;
use crate::text::sprite::TextSprite;

fn canvas() -> Canvas {
    Canvas {
        width: 64,
        height: 36,
    }
}

fn background() -> Arc<BackgroundAnimator> {
    let img = image::RgbaImage::from_pixel(16, 9, image::Rgba([0, 0, 255, 255]));
    Arc::new(
        BackgroundAnimator::from_rgba(img, canvas(), FitMode::Stretch, BreathingParams::default())
            .unwrap(),
    )
}

fn red_clip(start: f64, duration: f64) -> TextClip {
    let (w, h) = (20u32, 10u32);
    let data = [255u8, 0, 0, 255].repeat((w * h) as usize);
    let sprite = TextSprite::from_premul(data, w, h, Vec2::new(10.0, 5.0)).unwrap();
    TextClip {
        start_secs: start,
        duration_secs: duration,
        sprite: Arc::new(sprite),
        envelope: Envelope::default(),
        position: Position::Center,
    }
}

fn comp(duration: f64, overlays: Vec<TextClip>) -> Composition {
    Composition::new(
        canvas(),
        Fps::new(10, 1).unwrap(),
        duration,
        background(),
        overlays,
        None,
    )
    .unwrap()
}

fn close(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

#[test]
fn duration_frames_rounds_up_and_is_at_least_one() {
    assert_eq!(comp(2.0, vec![]).duration_frames(), 20);
    assert_eq!(comp(2.01, vec![]).duration_frames(), 21);
    assert_eq!(comp(0.01, vec![]).duration_frames(), 1);
}

#[test]
fn rejects_bad_duration() {
    for d in [0.0, -1.0, f64::NAN] {
        assert!(
            Composition::new(canvas(), Fps::default(), d, background(), vec![], None).is_err()
        );
    }
}

#[test]
fn overlays_are_fitted_to_timeline() {
    let c = comp(
        3.0,
        vec![red_clip(2.5, 1.0), red_clip(3.0, 1.0), red_clip(0.5, 1.0)],
    );
    assert_eq!(c.overlays.len(), 2);
    assert_eq!(c.overlays[0].start_secs, 0.5);
    assert_eq!(c.overlays[1].start_secs, 2.5);
    assert!((c.overlays[1].end_secs() - 3.0).abs() < 1e-12);
}

#[test]
fn frame_at_clamps_to_timeline() {
    let c = comp(2.0, vec![]);
    assert_eq!(c.frame_at(-1.0), FrameIndex(0));
    assert_eq!(c.frame_at(0.55), FrameIndex(5));
    assert_eq!(c.frame_at(99.0), FrameIndex(19));
}

#[test]
fn renders_background_and_active_overlay() {
    let c = comp(3.0, vec![red_clip(1.0, 1.5)]);
    let mut compositor = FrameCompositor::new(canvas()).unwrap();

    let before = compositor.render_frame(&c, FrameIndex(0)).unwrap();
    assert_eq!(before.data.len(), 64 * 36 * 4);
    assert!(close(before.pixel(32, 18), [0, 0, 255, 255]));
    assert!(close(before.pixel(0, 0), [0, 0, 255, 255]));

    // t = 1.5s is in the hold phase.
    let hold = compositor.render_frame(&c, FrameIndex(15)).unwrap();
    assert!(close(hold.pixel(32, 18), [255, 0, 0, 255]));
    assert!(close(hold.pixel(2, 2), [0, 0, 255, 255]));

    // Fade-in start is fully transparent.
    let start = compositor.render_frame(&c, FrameIndex(10)).unwrap();
    assert!(close(start.pixel(32, 18), [0, 0, 255, 255]));

    // Mid fade-in blends both colors; the caption is still rising (offset ~8.7px).
    let fading = compositor.render_frame(&c, FrameIndex(11)).unwrap();
    let px = fading.pixel(32, 27);
    assert!(px[0] > 10 && px[2] > 10, "{px:?}");
}

#[test]
fn later_overlays_draw_on_top() {
    let mut green = red_clip(0.0, 2.0);
    let data = [0u8, 255, 0, 255].repeat(200);
    green.sprite = Arc::new(TextSprite::from_premul(data, 20, 10, Vec2::new(10.0, 5.0)).unwrap());
    let red = red_clip(0.5, 1.5);
    let c = comp(2.0, vec![red, green]);
    let mut compositor = FrameCompositor::new(canvas()).unwrap();
    let f = compositor.render_frame(&c, FrameIndex(10)).unwrap();
    assert!(close(f.pixel(32, 18), [255, 0, 0, 255]));
}

#[test]
fn rejects_out_of_range_and_mismatched_canvas() {
    let c = comp(1.0, vec![]);
    let mut compositor = FrameCompositor::new(canvas()).unwrap();
    assert!(compositor.render_frame(&c, FrameIndex(10)).is_err());

    let mut other = FrameCompositor::new(Canvas {
        width: 32,
        height: 18,
    })
    .unwrap();
    assert!(other.render_frame(&c, FrameIndex(0)).is_err());
}
