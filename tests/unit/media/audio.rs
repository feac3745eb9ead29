use super::*;

#[test]
fn parses_format_duration_and_stream_metadata() {
    let json = br#"{
        "streams": [
            { "codec_type": "video", "codec_name": "png" },
            { "codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100", "channels": 2, "duration": "9.000000" }
        ],
        "format": { "duration": "12.345000" }
    }"#;
    let track = parse_probe_json(Path::new("3.mp3"), json).unwrap();
    assert!((track.duration_secs - 12.345).abs() < 1e-9);
    assert_eq!(track.sample_rate, Some(44_100));
    assert_eq!(track.channels, Some(2));
    assert_eq!(track.codec, "mp3");
    assert_eq!(track.path, PathBuf::from("3.mp3"));
}

#[test]
fn falls_back_to_stream_duration() {
    let json = br#"{
        "streams": [{ "codec_type": "audio", "codec_name": "pcm_s16le", "duration": "2.5" }],
        "format": {}
    }"#;
    let track = parse_probe_json(Path::new("1.wav"), json).unwrap();
    assert!((track.duration_secs - 2.5).abs() < 1e-9);
    assert_eq!(track.sample_rate, None);
}

#[test]
fn rejects_missing_audio_stream() {
    let json = br#"{ "streams": [{ "codec_type": "video" }], "format": { "duration": "1.0" } }"#;
    let err = parse_probe_json(Path::new("x.mp3"), json).unwrap_err();
    assert!(err.to_string().contains("no audio stream"));
}

#[test]
fn rejects_non_positive_duration() {
    let json = br#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "0.000000" } }"#;
    assert!(parse_probe_json(Path::new("x.mp3"), json).is_err());

    let json = br#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "N/A" } }"#;
    assert!(parse_probe_json(Path::new("x.mp3"), json).is_err());
}

#[test]
fn load_reports_missing_file_as_media_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AudioTrack::load(&dir.path().join("4.mp3")).unwrap_err();
    assert!(matches!(err, ReelError::Media(_)));
    assert!(err.to_string().contains("not found"));
}
