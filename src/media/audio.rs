use std::path::{Path, PathBuf};

use crate::foundation::error::{ReelError, ReelResult};

/// Probed audio track.
///
/// The file itself is the playable handle: encoders read `path` directly as a second input.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    /// Source audio file.
    pub path: PathBuf,
    /// Total duration in seconds (finite, > 0).
    pub duration_secs: f64,
    /// Sample rate in Hz, when reported.
    pub sample_rate: Option<u32>,
    /// Channel count, when reported.
    pub channels: Option<u16>,
    /// Codec short name (e.g. `mp3`, `pcm_s16le`).
    pub codec: String,
}

impl AudioTrack {
    /// Probe `path` through `ffprobe` and return its duration and stream metadata.
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> ReelResult<Self> {
        let result = Self::probe(path);
        if let Err(e) = &result {
            tracing::error!(path = %path.display(), error = %e, "failed to load audio file");
        }
        result
    }

    fn probe(path: &Path) -> ReelResult<Self> {
        if !path.is_file() {
            return Err(ReelError::media(format!(
                "audio file '{}' not found",
                path.display()
            )));
        }

        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                ReelError::media(format!(
                    "failed to run ffprobe (is it installed and on PATH?): {e}"
                ))
            })?;
        if !out.status.success() {
            return Err(ReelError::media(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        parse_probe_json(path, &out.stdout)
    }
}

/// Build an [`AudioTrack`] from `ffprobe -print_format json -show_streams -show_format` output.
pub(crate) fn parse_probe_json(path: &Path, json: &[u8]) -> ReelResult<AudioTrack> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        sample_rate: Option<String>,
        channels: Option<u16>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ReelError::media(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| {
            ReelError::media(format!("no audio stream found in '{}'", path.display()))
        })?;

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            ReelError::media(format!("ffprobe reported no duration for '{}'", path.display()))
        })?;
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(ReelError::media(format!(
            "audio '{}' has invalid duration {duration_secs}",
            path.display()
        )));
    }

    Ok(AudioTrack {
        path: path.to_path_buf(),
        duration_secs,
        sample_rate: stream
            .sample_rate
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok()),
        channels: stream.channels,
        codec: stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/audio.rs"]
mod tests;
