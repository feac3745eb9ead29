use super::*;
use crate::animation::ease::Ease;

#[test]
fn defaults_match_documented_values() {
    let cfg = RenderConfig::default();
    assert_eq!(cfg.canvas, Canvas::default());
    assert_eq!(cfg.fps, Fps::new(30, 1).unwrap());
    assert_eq!(cfg.fit, FitMode::Stretch);
    assert_eq!(cfg.text.style.font_size_px, 100.0);
    assert_eq!(cfg.text.position, Position::Center);
    assert_eq!(cfg.encoder.video_codec, "libx264");
    assert_eq!(cfg.logging.level, "info");
    assert!(!cfg.threading.parallel);
    cfg.validate().unwrap();
}

#[test]
fn empty_object_is_all_defaults() {
    let cfg: RenderConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg, RenderConfig::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let json = r##"{
        "canvas": {"width": 1280, "height": 720},
        "fit": "cover",
        "text": {
            "font_path": "fonts/klementin.otf",
            "font_size_px": 72,
            "shadow_color": "#202020",
            "position": {"anchor": "bottom", "margin_px": 120}
        },
        "animation": {"fade_in_secs": 0.5, "ease_in": "in_out_sine"},
        "encoder": {"video_codec": "h264_nvenc"},
        "workers": 2,
        "logging": {"json": true}
    }"##;
    let cfg: RenderConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.canvas.width, 1280);
    assert_eq!(cfg.fit, FitMode::Cover);
    assert_eq!(
        cfg.text.font_path.as_deref(),
        Some(Path::new("fonts/klementin.otf"))
    );
    assert_eq!(cfg.text.style.font_size_px, 72.0);
    assert_eq!(cfg.text.style.shadow_opacity, 0.8);
    assert_eq!(cfg.text.position, Position::Bottom { margin_px: 120.0 });
    assert_eq!(cfg.animation.fade_in_secs, 0.5);
    assert_eq!(cfg.animation.ease_in, Ease::InOutSine);
    assert_eq!(cfg.animation.fade_out_secs, 0.3);
    assert_eq!(cfg.encoder.video_codec, "h264_nvenc");
    assert_eq!(cfg.encoder.audio_codec, "aac");
    assert_eq!(cfg.resolved_workers(), 2);
    assert!(cfg.logging.json);
    assert_eq!(cfg.logging.level, "info");
    cfg.validate().unwrap();
}

#[test]
fn validate_catches_bad_sections() {
    let mut cfg = RenderConfig::default();
    cfg.canvas.width = 1919;
    assert!(cfg.validate().is_err());

    let mut cfg = RenderConfig::default();
    cfg.workers = Some(0);
    assert!(cfg.validate().is_err());

    let mut cfg = RenderConfig::default();
    cfg.animation.scale_in = 0.0;
    assert!(cfg.validate().is_err());

    let mut cfg = RenderConfig::default();
    cfg.text.style.shadow_opacity = 2.0;
    assert!(cfg.validate().is_err());
}

#[test]
fn resolved_workers_defaults_to_parallelism() {
    assert!(RenderConfig::default().resolved_workers() >= 1);
}

#[test]
fn from_path_reports_file_and_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(
        RenderConfig::from_path(&missing)
            .unwrap_err()
            .to_string()
            .contains("missing.json")
    );

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{\"fps\": 30}").unwrap();
    let err = RenderConfig::from_path(&bad).unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));

    let good = dir.path().join("good.json");
    std::fs::write(&good, "{\"fps\": {\"num\": 24, \"den\": 1}}").unwrap();
    assert_eq!(RenderConfig::from_path(&good).unwrap().fps.num, 24);
}
