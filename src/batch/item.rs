use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::background::animator::BackgroundAnimator;
use crate::batch::layout::{InputLayout, ItemInputs};
use crate::config::RenderConfig;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::foundation::error::{ReelError, ReelResult};
use crate::media::audio::AudioTrack;
use crate::render::compositor::Composition;
use crate::render::pipeline::render_to_sink;
use crate::subtitle::srt::read_srt_file;
use crate::text::overlay::TextClip;
use crate::text::sprite::{TextRenderer, TextSprite};

/// Assets loaded once per batch and shared by every worker.
#[derive(Clone, Debug)]
pub struct SharedAssets {
    /// Font file the bytes were read from.
    pub font_path: PathBuf,
    /// Raw font bytes.
    pub font: Arc<Vec<u8>>,
}

impl SharedAssets {
    /// Read the font at `font_path`.
    pub fn load(font_path: &Path) -> ReelResult<Self> {
        let font = std::fs::read(font_path)
            .with_context(|| format!("read font '{}'", font_path.display()))?;
        Ok(Self {
            font_path: font_path.to_path_buf(),
            font: Arc::new(font),
        })
    }

    /// Font configured in `cfg.text.font_path`.
    pub fn from_config(cfg: &RenderConfig) -> ReelResult<Self> {
        let path = cfg.text.font_path.as_deref().ok_or_else(|| {
            ReelError::validation("no font configured (set text.font_path or pass --font)")
        })?;
        Self::load(path)
    }

    /// Build a caption renderer for the configured style.
    pub fn text_renderer(&self, cfg: &RenderConfig) -> ReelResult<TextRenderer> {
        TextRenderer::new(&self.font, cfg.text.style.clone()).map_err(|e| match e {
            ReelError::Validation(msg) => ReelError::validation(format!(
                "font '{}': {msg}",
                self.font_path.display()
            )),
            other => other,
        })
    }
}

/// Summary of one rendered item.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemReport {
    /// Item number.
    pub item: u64,
    /// Final output path.
    pub output: PathBuf,
    /// Frames encoded.
    pub frames: u64,
    /// Video duration in seconds (the audio duration).
    pub duration_secs: f64,
    /// Captions placed on the timeline.
    pub cues: usize,
    /// Wall time spent on the item.
    pub elapsed: Duration,
}

/// Load every input of `inputs` and assemble the composition.
///
/// Captions with identical text share one sprite.
pub fn build_composition(
    inputs: &ItemInputs,
    renderer: &mut TextRenderer,
    cfg: &RenderConfig,
) -> ReelResult<Composition> {
    let audio = AudioTrack::load(&inputs.audio)?;
    let background = BackgroundAnimator::open(
        &inputs.background,
        cfg.canvas,
        cfg.fit,
        cfg.background,
    )?;
    let cues = read_srt_file(&inputs.subtitles)?;
    if cues.is_empty() {
        tracing::warn!(item = inputs.item, "subtitle file has no cues, rendering background only");
    }

    let mut sprites: HashMap<&str, Arc<TextSprite>> = HashMap::new();
    let mut clips = Vec::with_capacity(cues.len());
    for cue in &cues {
        if cue.start_secs >= audio.duration_secs {
            tracing::warn!(
                item = inputs.item,
                cue = cue.index,
                start = cue.start_secs,
                duration = audio.duration_secs,
                "dropping caption that starts after the audio ends"
            );
            continue;
        }
        let sprite = match sprites.get(cue.text.as_str()) {
            Some(s) => Arc::clone(s),
            None => {
                let s = Arc::new(renderer.render_sprite(&cue.text, cfg.canvas)?);
                sprites.insert(cue.text.as_str(), Arc::clone(&s));
                s
            }
        };
        clips.push(TextClip {
            start_secs: cue.start_secs,
            duration_secs: cue.duration_secs,
            sprite,
            envelope: cfg.animation,
            position: cfg.text.position,
        });
    }

    Composition::new(
        cfg.canvas,
        cfg.fps,
        audio.duration_secs,
        Arc::new(background),
        clips,
        Some(audio),
    )
}

/// Render one item end to end.
///
/// The video is encoded to the partial path and renamed into place only after `ffmpeg` succeeds,
/// so a failed item never leaves a final output behind. An existing final output is an error.
pub fn render_item(
    layout: &InputLayout,
    item: u64,
    assets: &SharedAssets,
    cfg: &RenderConfig,
) -> ReelResult<ItemReport> {
    let mut renderer = assets.text_renderer(cfg)?;
    render_item_with(layout, item, &mut renderer, cfg)
}

/// [`render_item`] with a caller-owned caption renderer.
#[tracing::instrument(level = "info", skip(layout, renderer, cfg))]
pub fn render_item_with(
    layout: &InputLayout,
    item: u64,
    renderer: &mut TextRenderer,
    cfg: &RenderConfig,
) -> ReelResult<ItemReport> {
    let started = Instant::now();
    let inputs = ItemInputs::resolve(layout, item)?;
    if inputs.output.exists() {
        return Err(ReelError::validation(format!(
            "output '{}' already exists",
            inputs.output.display()
        )));
    }

    let comp = build_composition(&inputs, renderer, cfg)?;
    let frames = comp.duration_frames();
    tracing::info!(
        audio = %inputs.audio.display(),
        duration_secs = comp.duration_secs,
        frames,
        cues = comp.overlays.len(),
        "rendering"
    );

    remove_if_exists(&inputs.partial)?;
    let mut sink = FfmpegSink::new(FfmpegSinkOpts {
        out_path: inputs.partial.clone(),
        overwrite: true,
        settings: cfg.encoder.clone(),
    });
    let encoded = render_to_sink(&comp, &mut sink, &cfg.threading).and_then(|stats| {
        std::fs::rename(&inputs.partial, &inputs.output).with_context(|| {
            format!(
                "move '{}' to '{}'",
                inputs.partial.display(),
                inputs.output.display()
            )
        })?;
        Ok(stats)
    });
    let stats = match encoded {
        Ok(stats) => stats,
        Err(e) => {
            if let Err(cleanup) = remove_if_exists(&inputs.partial) {
                tracing::warn!(error = %cleanup, "failed to remove partial output");
            }
            return Err(e);
        }
    };

    let report = ItemReport {
        item,
        output: inputs.output,
        frames: stats.frames_total,
        duration_secs: comp.duration_secs,
        cues: comp.overlays.len(),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        output = %report.output.display(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "item finished"
    );
    Ok(report)
}

fn remove_if_exists(path: &Path) -> ReelResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("remove '{}'", path.display()))
            .into()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/item.rs"]
mod tests;
