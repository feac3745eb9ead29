use super::*;

fn linear() -> Envelope {
    Envelope {
        fade_in_secs: 1.0,
        fade_out_secs: 1.0,
        ease_in: Ease::Linear,
        ease_out: Ease::Linear,
        scale_in: 0.5,
        scale_out: 2.0,
        rise_px: 10.0,
    }
}

#[test]
fn outside_cue_is_none() {
    let env = linear();
    assert!(env.sample(-0.01, 4.0).is_none());
    assert!(env.sample(4.0, 4.0).is_none());
    assert!(env.sample(f64::NAN, 4.0).is_none());
}

#[test]
fn phases_follow_fade_in_hold_fade_out() {
    let env = linear();

    let start = env.sample(0.0, 4.0).unwrap();
    assert_eq!(start.phase, Phase::FadeIn);
    assert_eq!(start.opacity, 0.0);
    assert!((start.scale - 0.5).abs() < 1e-9);
    assert!((start.offset_y - 10.0).abs() < 1e-9);

    let mid_in = env.sample(0.5, 4.0).unwrap();
    assert!((mid_in.opacity - 0.5).abs() < 1e-6);
    assert!((mid_in.scale - 0.75).abs() < 1e-9);

    let hold = env.sample(2.0, 4.0).unwrap();
    assert_eq!(hold.phase, Phase::Hold);
    assert_eq!(hold.opacity, 1.0);
    assert_eq!(hold.scale, 1.0);
    assert_eq!(hold.offset_y, 0.0);

    let mid_out = env.sample(3.5, 4.0).unwrap();
    assert_eq!(mid_out.phase, Phase::FadeOut);
    assert!((mid_out.opacity - 0.5).abs() < 1e-6);
    assert!((mid_out.scale - 1.5).abs() < 1e-9);
}

#[test]
fn short_cue_shrinks_fades_proportionally() {
    let env = Envelope {
        fade_in_secs: 0.3,
        fade_out_secs: 0.1,
        ..linear()
    };
    let (fi, fo) = env.fade_spans(0.2);
    assert!((fi - 0.15).abs() < 1e-9);
    assert!((fo - 0.05).abs() < 1e-9);

    for i in 0..20 {
        let s = env.sample(f64::from(i) * 0.01, 0.2).unwrap();
        assert_ne!(s.phase, Phase::Hold);
    }
}

#[test]
fn zero_fades_hold_for_entire_cue() {
    let env = Envelope {
        fade_in_secs: 0.0,
        fade_out_secs: 0.0,
        ..linear()
    };
    let s = env.sample(0.0, 1.0).unwrap();
    assert_eq!(s.phase, Phase::Hold);
    assert_eq!(s.opacity, 1.0);
}

#[test]
fn overshooting_ease_keeps_opacity_bounded() {
    let env = Envelope {
        ease_in: Ease::OutBack,
        ..Envelope::default()
    };
    for i in 0..100 {
        let s = env.sample(f64::from(i) * 0.01, 1.0).unwrap();
        assert!((0.0..=1.0).contains(&s.opacity));
    }
}

#[test]
fn validate_rejects_bad_values() {
    assert!(Envelope::default().validate().is_ok());
    assert!(
        Envelope {
            fade_in_secs: -1.0,
            ..Envelope::default()
        }
        .validate()
        .is_err()
    );
    assert!(
        Envelope {
            scale_in: 0.0,
            ..Envelope::default()
        }
        .validate()
        .is_err()
    );
}
