use std::path::Path;

use anyhow::Context as _;
use image::imageops::FilterType;

use crate::foundation::core::{Affine, Canvas};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::raster::{affine_to_cpu, image_paint_from_premul, premultiply_rgba8_in_place};

/// How the source image is fitted to the output canvas before animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Resize to exactly the canvas size, ignoring aspect ratio.
    #[default]
    Stretch,
    /// Preserve aspect ratio, scale to cover the canvas and center-crop the overflow.
    Cover,
}

/// Periodic "breathing" zoom parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BreathingParams {
    /// Peak additional zoom (0.1 zooms between 100% and 110%).
    pub amplitude: f64,
    /// Oscillation frequency in Hz.
    pub frequency_hz: f64,
}

impl Default for BreathingParams {
    fn default() -> Self {
        Self {
            amplitude: 0.1,
            frequency_hz: 0.08,
        }
    }
}

impl BreathingParams {
    /// Validate that both parameters are finite and non-negative.
    pub fn validate(&self) -> ReelResult<()> {
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(ReelError::validation(
                "background amplitude must be finite and >= 0",
            ));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz < 0.0 {
            return Err(ReelError::validation(
                "background frequency_hz must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Zoom factor at time `t`, always within `[1, 1 + amplitude]`.
    pub fn scale_at(&self, t: f64) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * self.frequency_hz * t;
        1.0 + self.amplitude * 0.5 * (1.0 + phase.sin())
    }
}

/// Still image animated with a centered breathing zoom.
///
/// The image is resampled to the canvas once (Lanczos3); per-frame zoom is applied as a raster
/// transform so every frame fully covers the canvas.
#[derive(Clone)]
pub struct BackgroundAnimator {
    canvas: Canvas,
    breathing: BreathingParams,
    paint: vello_cpu::Image,
}

impl std::fmt::Debug for BackgroundAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundAnimator")
            .field("canvas", &self.canvas)
            .field("breathing", &self.breathing)
            .finish_non_exhaustive()
    }
}

impl BackgroundAnimator {
    /// Decode the image at `path` and prepare it for `canvas`.
    pub fn open(
        path: &Path,
        canvas: Canvas,
        fit: FitMode,
        breathing: BreathingParams,
    ) -> ReelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read background image '{}'", path.display()))?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("decode background image '{}'", path.display()))?;
        Self::from_rgba(img.to_rgba8(), canvas, fit, breathing)
    }

    /// Prepare an already decoded straight-alpha image for `canvas`.
    pub fn from_rgba(
        img: image::RgbaImage,
        canvas: Canvas,
        fit: FitMode,
        breathing: BreathingParams,
    ) -> ReelResult<Self> {
        canvas.validate()?;
        breathing.validate()?;
        if img.width() == 0 || img.height() == 0 {
            return Err(ReelError::validation("background image has zero size"));
        }

        let fitted = fit_to_canvas(&img, canvas, fit);
        let mut premul = fitted.into_raw();
        premultiply_rgba8_in_place(&mut premul);
        let paint = image_paint_from_premul(&premul, canvas.width, canvas.height)?;

        Ok(Self {
            canvas,
            breathing,
            paint,
        })
    }

    /// Canvas this background was prepared for.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Zoom factor at time `t` seconds.
    pub fn scale_at(&self, t: f64) -> f64 {
        self.breathing.scale_at(t)
    }

    /// Image-to-canvas transform at time `t`: a zoom about the canvas center.
    pub fn transform_at(&self, t: f64) -> Affine {
        let c = self.canvas.center();
        Affine::translate(c) * Affine::scale(self.scale_at(t)) * Affine::translate(-c)
    }

    pub(crate) fn draw(&self, ctx: &mut vello_cpu::RenderContext, t: f64) {
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(self.transform_at(t)));
        ctx.set_paint(self.paint.clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.canvas.width),
            f64::from(self.canvas.height),
        ));
    }
}

fn fit_to_canvas(img: &image::RgbaImage, canvas: Canvas, fit: FitMode) -> image::RgbaImage {
    let (w, h) = (canvas.width, canvas.height);
    if img.dimensions() == (w, h) {
        return img.clone();
    }
    match fit {
        FitMode::Stretch => image::imageops::resize(img, w, h, FilterType::Lanczos3),
        FitMode::Cover => {
            let (iw, ih) = (f64::from(img.width()), f64::from(img.height()));
            let s = (f64::from(w) / iw).max(f64::from(h) / ih);
            let rw = ((iw * s).ceil() as u32).max(w);
            let rh = ((ih * s).ceil() as u32).max(h);
            let resized = image::imageops::resize(img, rw, rh, FilterType::Lanczos3);
            let x = (rw - w) / 2;
            let y = (rh - h) / 2;
            image::imageops::crop_imm(&resized, x, y, w, h).to_image()
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/background/animator.rs"]
mod tests;
