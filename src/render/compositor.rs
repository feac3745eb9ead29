use std::sync::Arc;

use crate::background::animator::BackgroundAnimator;
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::media::audio::AudioTrack;
use crate::render::frame::FrameRGBA;
use crate::render::raster::{affine_to_cpu, dims_u16};
use crate::text::overlay::TextClip;

/// Everything needed to render one output video.
#[derive(Clone, Debug)]
pub struct Composition {
    /// Output size.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Timeline length in seconds.
    pub duration_secs: f64,
    /// Animated still image beneath all captions.
    pub background: Arc<BackgroundAnimator>,
    /// Captions ordered by start time; later entries draw on top.
    pub overlays: Vec<TextClip>,
    /// Soundtrack muxed by the encoder.
    pub audio: Option<AudioTrack>,
}

impl Composition {
    /// Validate the timeline and fit overlays into `[0, duration_secs)`.
    ///
    /// Overlays starting at or after the end are dropped; overlays running past it are truncated.
    pub fn new(
        canvas: Canvas,
        fps: Fps,
        duration_secs: f64,
        background: Arc<BackgroundAnimator>,
        overlays: Vec<TextClip>,
        audio: Option<AudioTrack>,
    ) -> ReelResult<Self> {
        canvas.validate()?;
        fps.validate()?;
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(ReelError::validation(format!(
                "composition duration must be finite and > 0, got {duration_secs}"
            )));
        }
        if background.canvas() != canvas {
            return Err(ReelError::validation(
                "background was prepared for a different canvas",
            ));
        }

        let mut fitted = Vec::with_capacity(overlays.len());
        for mut clip in overlays {
            if !clip.start_secs.is_finite() || !clip.duration_secs.is_finite() {
                return Err(ReelError::validation("overlay timing must be finite"));
            }
            if clip.start_secs >= duration_secs {
                tracing::warn!(
                    start = clip.start_secs,
                    duration = duration_secs,
                    "dropping caption that starts after the audio ends"
                );
                continue;
            }
            if clip.end_secs() > duration_secs {
                tracing::warn!(
                    start = clip.start_secs,
                    end = clip.end_secs(),
                    duration = duration_secs,
                    "truncating caption that runs past the audio"
                );
                clip.duration_secs = duration_secs - clip.start_secs;
            }
            if clip.duration_secs <= 0.0 {
                continue;
            }
            fitted.push(clip);
        }
        fitted.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        Ok(Self {
            canvas,
            fps,
            duration_secs,
            background,
            overlays: fitted,
            audio,
        })
    }

    /// Number of output frames, `max(1, ceil(duration * fps))`.
    pub fn duration_frames(&self) -> u64 {
        self.fps.secs_to_frames_ceil(self.duration_secs).max(1)
    }

    /// Timeline time of frame `idx`.
    pub fn frame_time(&self, idx: FrameIndex) -> f64 {
        self.fps.frames_to_secs(idx.0)
    }

    /// Frame shown at `secs`, clamped to the timeline.
    pub fn frame_at(&self, secs: f64) -> FrameIndex {
        let last = self.duration_frames() - 1;
        FrameIndex(self.fps.secs_to_frames_floor(secs.max(0.0)).min(last))
    }
}

/// CPU compositor with a reusable raster context.
pub struct FrameCompositor {
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    canvas: Canvas,
}

impl std::fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("canvas", &self.canvas)
            .finish_non_exhaustive()
    }
}

impl FrameCompositor {
    /// Allocate raster state for `canvas`.
    pub fn new(canvas: Canvas) -> ReelResult<Self> {
        canvas.validate()?;
        let (w, h) = dims_u16(canvas.width, canvas.height)?;
        Ok(Self {
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
            canvas,
        })
    }

    /// Render frame `idx`: background at `t = idx / fps`, then every active caption in start
    /// order.
    pub fn render_frame(&mut self, comp: &Composition, idx: FrameIndex) -> ReelResult<FrameRGBA> {
        if comp.canvas != self.canvas {
            return Err(ReelError::render(format!(
                "compositor is {}x{} but composition is {}x{}",
                self.canvas.width, self.canvas.height, comp.canvas.width, comp.canvas.height
            )));
        }
        let total = comp.duration_frames();
        if idx.0 >= total {
            return Err(ReelError::render(format!(
                "frame {} is outside the timeline of {total} frames",
                idx.0
            )));
        }
        let t = comp.frame_time(idx);

        let ctx = &mut self.ctx;
        ctx.reset();
        comp.background.draw(ctx, t);

        for clip in &comp.overlays {
            if clip.start_secs > t {
                break;
            }
            let Some(state) = clip.state_at(t) else {
                continue;
            };
            if state.opacity <= 0.0 {
                continue;
            }
            let sprite = &clip.sprite;
            ctx.set_transform(affine_to_cpu(clip.transform(comp.canvas, &state)));
            ctx.set_paint(sprite.paint.clone());
            if state.opacity < 1.0 {
                ctx.push_opacity_layer(state.opacity);
            }
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(sprite.width),
                f64::from(sprite.height),
            ));
            if state.opacity < 1.0 {
                ctx.pop_layer();
            }
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
