use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, FrameIndex, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::media::probe::is_ffmpeg_on_path;
use crate::render::frame::{FrameRGBA, flatten_premul_over_bg_to_opaque_rgba8};

/// Codec and container settings passed to `ffmpeg`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Video encoder name (`libx264`, `h264_nvenc`, ...).
    pub video_codec: String,
    /// Encoder preset; omitted from the command line when `None`.
    pub preset: Option<String>,
    /// Constant rate factor; omitted when `None`.
    pub crf: Option<u8>,
    /// Output pixel format.
    pub pixel_format: String,
    /// Audio encoder name.
    pub audio_codec: String,
    /// Audio bitrate such as `192k`; encoder default when `None`.
    pub audio_bitrate: Option<String>,
    /// Rescale the encoded video to this size.
    pub output_size: Option<Canvas>,
    /// Encoder thread count; `ffmpeg` decides when `None`.
    pub threads: Option<u32>,
    /// Extra output arguments inserted before the output path.
    pub extra_args: Vec<String>,
    /// Color used to flatten transparent pixels.
    pub background: Rgba8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: Some("fast".to_string()),
            crf: Some(20),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: Some("192k".to_string()),
            output_size: None,
            threads: None,
            extra_args: Vec::new(),
            background: Rgba8::BLACK,
        }
    }
}

impl EncoderSettings {
    /// Reject empty codec names, out-of-range CRF, and odd output sizes.
    pub fn validate(&self) -> ReelResult<()> {
        if self.video_codec.trim().is_empty() {
            return Err(ReelError::validation("encoder video_codec must be non-empty"));
        }
        if self.audio_codec.trim().is_empty() {
            return Err(ReelError::validation("encoder audio_codec must be non-empty"));
        }
        if self.pixel_format.trim().is_empty() {
            return Err(ReelError::validation(
                "encoder pixel_format must be non-empty",
            ));
        }
        if let Some(crf) = self.crf
            && crf > 51
        {
            return Err(ReelError::validation("encoder crf must be within 0..=51"));
        }
        if let Some(size) = self.output_size {
            size.validate()?;
        }
        Ok(())
    }
}

/// Options for one [`FfmpegSink`] output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output file path.
    pub out_path: PathBuf,
    /// Replace an existing file at `out_path`.
    pub overwrite: bool,
    /// Codec settings.
    pub settings: EncoderSettings,
}

impl FfmpegSinkOpts {
    /// Options writing to `out_path` with default settings.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            settings: EncoderSettings::default(),
        }
    }
}

/// Full `ffmpeg` argument list for streaming raw RGBA frames (stdin) plus an optional audio file
/// into `opts.out_path`.
pub fn build_ffmpeg_args(cfg: &SinkConfig, opts: &FfmpegSinkOpts) -> Vec<OsString> {
    fn push(args: &mut Vec<OsString>, v: impl AsRef<OsStr>) {
        args.push(v.as_ref().to_os_string());
    }

    let s = &opts.settings;
    let mut args = Vec::new();

    push(&mut args, if opts.overwrite { "-y" } else { "-n" });
    for a in ["-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba", "-s"] {
        push(&mut args, a);
    }
    push(&mut args, format!("{}x{}", cfg.width, cfg.height));
    // `-r` before `-i` sets the rawvideo input rate.
    push(&mut args, "-r");
    push(&mut args, format!("{}/{}", cfg.fps.num, cfg.fps.den));
    push(&mut args, "-i");
    push(&mut args, "pipe:0");

    if let Some(audio) = cfg.audio.as_ref() {
        push(&mut args, "-i");
        push(&mut args, &audio.path);
        // Ignore cover-art streams in the audio file.
        for a in ["-map", "0:v:0", "-map", "1:a:0"] {
            push(&mut args, a);
        }
    }

    push(&mut args, "-c:v");
    push(&mut args, &s.video_codec);
    if let Some(preset) = &s.preset {
        push(&mut args, "-preset");
        push(&mut args, preset);
    }
    if let Some(crf) = s.crf {
        push(&mut args, "-crf");
        push(&mut args, crf.to_string());
    }
    if let Some(size) = s.output_size {
        push(&mut args, "-vf");
        push(&mut args, format!("scale={}:{}", size.width, size.height));
    }
    push(&mut args, "-pix_fmt");
    push(&mut args, &s.pixel_format);
    if let Some(threads) = s.threads {
        push(&mut args, "-threads");
        push(&mut args, threads.to_string());
    }

    if cfg.audio.is_some() {
        push(&mut args, "-c:a");
        push(&mut args, &s.audio_codec);
        if let Some(bitrate) = &s.audio_bitrate {
            push(&mut args, "-b:a");
            push(&mut args, bitrate);
        }
        push(&mut args, "-shortest");
    } else {
        push(&mut args, "-an");
    }
    push(&mut args, "-movflags");
    push(&mut args, "+faststart");
    for extra in &s.extra_args {
        push(&mut args, extra);
    }
    push(&mut args, &opts.out_path);
    args
}

/// Sink that spawns the system `ffmpeg` and streams flattened RGBA frames to its stdin.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a sink; `ffmpeg` is spawned on `begin`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    fn finish_child(&mut self) -> ReelResult<(std::process::ExitStatus, Vec<u8>)> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelError::media("ffmpeg sink not started"))?;

        let status = child
            .wait()
            .map_err(|e| ReelError::media(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelError::media("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelError::media(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        Ok((status, stderr_bytes))
    }
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("opts", &self.opts)
            .field("running", &self.child.is_some())
            .field("last_idx", &self.last_idx)
            .finish_non_exhaustive()
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        cfg.fps.validate()?;
        Canvas {
            width: cfg.width,
            height: cfg.height,
        }
        .validate()?;
        self.opts.settings.validate()?;

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if let Some(audio) = cfg.audio.as_ref()
            && !audio.path.is_file()
        {
            return Err(ReelError::validation(format!(
                "audio input '{}' does not exist",
                audio.path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ReelError::media(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let args = build_ffmpeg_args(&cfg, &self.opts);
        tracing::debug!(out = %self.opts.out_path.display(), ?args, "spawning ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::media(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::media("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::media("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::media("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(ReelError::render(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(ReelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        let bg = self.opts.settings.background;
        flatten_premul_over_bg_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            [bg.r, bg.g, bg.b, 255],
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::media("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(&self.scratch) {
            // A broken pipe means ffmpeg exited; its stderr says why.
            let detail = match self.finish_child() {
                Ok((status, stderr)) => format!(
                    "ffmpeg exited with status {status}: {}",
                    String::from_utf8_lossy(&stderr).trim()
                ),
                Err(join_err) => join_err.to_string(),
            };
            self.cfg = None;
            return Err(ReelError::media(format!(
                "failed to write frame {} to ffmpeg stdin: {e} ({detail})",
                idx.0
            )));
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        let (status, stderr_bytes) = self.finish_child()?;
        self.cfg = None;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelError::media(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Abandoned without `end`: close stdin and reap the child so no zombie is left behind.
        if self.child.is_some() {
            if let Some(child) = self.child.as_mut() {
                let _ = child.kill();
            }
            let _ = self.finish_child();
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
