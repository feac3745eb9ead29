use super::*;

fn sprite(w: u32, h: u32) -> Arc<TextSprite> {
    let data = vec![0u8; (w * h * 4) as usize];
    let center = Vec2::new(f64::from(w) / 2.0, f64::from(h) / 2.0);
    Arc::new(TextSprite::from_premul(data, w, h, center).unwrap())
}

fn clip(start: f64, duration: f64) -> TextClip {
    TextClip {
        start_secs: start,
        duration_secs: duration,
        sprite: sprite(100, 40),
        envelope: Envelope::default(),
        position: Position::Center,
    }
}

#[test]
fn state_is_none_outside_clip() {
    let c = clip(1.0, 2.0);
    assert!(c.state_at(0.99).is_none());
    assert!(c.state_at(3.0).is_none());
    assert!(c.state_at(1.0).is_some());
}

#[test]
fn state_follows_envelope_phases() {
    let c = clip(1.0, 2.0);
    let start = c.state_at(1.0).unwrap();
    assert_eq!(start.phase, Phase::FadeIn);
    assert_eq!(start.opacity, 0.0);

    let mid = c.state_at(2.0).unwrap();
    assert_eq!(mid.phase, Phase::Hold);
    assert_eq!(mid.opacity, 1.0);
    assert_eq!(mid.scale, 1.0);

    let late = c.state_at(2.95).unwrap();
    assert_eq!(late.phase, Phase::FadeOut);
    assert!(late.opacity < 1.0);
}

#[test]
fn fragment_states_cover_clip_frames() {
    let fps = Fps::new(10, 1).unwrap();
    let c = clip(0.25, 1.0);
    // t in [0.25, 1.25) at 10fps: frames 3..=12.
    assert_eq!(c.frame_range(fps), 3..13);
    let states = c.fragment_states(fps);
    assert_eq!(states.len(), 10);
    assert_eq!(states.first().unwrap().0, FrameIndex(3));
    assert_eq!(states.last().unwrap().0, FrameIndex(12));
    assert!(
        states
            .iter()
            .all(|(_, s)| (0.0..=1.0).contains(&s.opacity))
    );
}

#[test]
fn frame_range_matches_visible_frames_for_millisecond_starts() {
    let fps = Fps::new(30, 1).unwrap();
    let mut c = clip(0.0, 0.5);
    for ms in 0..100_000u32 {
        c.start_secs = f64::from(ms) / 1000.0;
        let range = c.frame_range(fps);
        assert!(!range.is_empty(), "start {}", c.start_secs);
        assert!(
            c.state_at(fps.frames_to_secs(range.start)).is_some(),
            "first frame hidden for start {}",
            c.start_secs
        );
        assert!(c.state_at(fps.frames_to_secs(range.end - 1)).is_some());
        assert!(c.state_at(fps.frames_to_secs(range.end)).is_none());
        if range.start > 0 {
            assert!(c.state_at(fps.frames_to_secs(range.start - 1)).is_none());
        }
    }
}

#[test]
fn fragment_states_len_matches_frame_range() {
    let fps = Fps::new(30, 1).unwrap();
    for start in [0.1, 0.7, 1.3, 33.367, 99.999] {
        let c = clip(start, 1.234);
        assert_eq!(c.fragment_states(fps).len() as u64, {
            let r = c.frame_range(fps);
            r.end - r.start
        });
    }
}

#[test]
fn clip_shorter_than_a_frame_may_have_no_states() {
    let fps = Fps::new(10, 1).unwrap();
    let c = clip(0.01, 0.05);
    assert!(c.fragment_states(fps).is_empty());
}

#[test]
fn positions_anchor_inside_canvas() {
    let canvas = Canvas {
        width: 400,
        height: 200,
    };
    let s = sprite(100, 40);
    assert_eq!(Position::Center.anchor(canvas, &s), Vec2::new(200.0, 100.0));
    assert_eq!(
        Position::Top { margin_px: 10.0 }.anchor(canvas, &s),
        Vec2::new(200.0, 30.0)
    );
    assert_eq!(
        Position::Bottom { margin_px: 10.0 }.anchor(canvas, &s),
        Vec2::new(200.0, 170.0)
    );
}

#[test]
fn transform_maps_text_center_to_anchor() {
    let canvas = Canvas {
        width: 400,
        height: 200,
    };
    let c = clip(0.0, 2.0);
    let state = OverlayState {
        phase: Phase::FadeIn,
        opacity: 0.5,
        scale: 0.8,
        offset_y: 12.0,
    };
    let tr = c.transform(canvas, &state);
    let p = tr * kurbo::Point::new(50.0, 20.0);
    assert!((p.x - 200.0).abs() < 1e-9);
    assert!((p.y - 112.0).abs() < 1e-9);
}

#[test]
fn position_deserializes_tagged() {
    let p: Position = serde_json::from_str(r#"{"anchor":"bottom","margin_px":80}"#).unwrap();
    assert_eq!(p, Position::Bottom { margin_px: 80.0 });
    let p: Position = serde_json::from_str(r#"{"anchor":"center"}"#).unwrap();
    assert_eq!(p, Position::Center);
}
