use std::sync::Arc;

use image::imageops::FilterType;

use crate::foundation::core::{Canvas, Rgba8, Vec2};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::{mul_div255_u8, premul_over_in_place};
use crate::render::raster::{dims_u16, image_paint_from_premul};
use crate::text::blur::blur_mask;
use crate::text::layout::TextLayoutEngine;

/// Visual style of caption text and its drop shadow.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in output pixels.
    pub font_size_px: f32,
    /// Fill color.
    pub color: Rgba8,
    /// Shadow color; its alpha is multiplied with `shadow_opacity`.
    pub shadow_color: Rgba8,
    /// Shadow displacement `[x, y]` in output pixels.
    pub shadow_offset: [f32; 2],
    /// Shadow softness (Gaussian standard deviation is half of this) in output pixels.
    pub shadow_spread: f32,
    /// Shadow opacity in `[0, 1]`.
    pub shadow_opacity: f32,
    /// Transparent margin around the text block, in output pixels.
    pub padding_px: u32,
    /// Line advance as a multiple of the natural line height.
    pub line_spacing: f32,
    /// Maximum text block width as a fraction of the canvas width.
    pub max_width_frac: f32,
    /// Rasterization oversampling factor.
    pub supersample: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size_px: 100.0,
            color: Rgba8::WHITE,
            shadow_color: Rgba8::BLACK,
            shadow_offset: [6.0, 6.0],
            shadow_spread: 8.0,
            shadow_opacity: 0.8,
            padding_px: 10,
            line_spacing: 1.15,
            max_width_frac: 0.9,
            supersample: 2,
        }
    }
}

impl TextStyle {
    /// Validate sizes, factors, and opacity.
    pub fn validate(&self) -> ReelResult<()> {
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(ReelError::validation(
                "text font_size_px must be finite and > 0",
            ));
        }
        if !self.shadow_offset.iter().all(|v| v.is_finite()) {
            return Err(ReelError::validation("text shadow_offset must be finite"));
        }
        if !self.shadow_spread.is_finite() || self.shadow_spread < 0.0 {
            return Err(ReelError::validation(
                "text shadow_spread must be finite and >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.shadow_opacity) {
            return Err(ReelError::validation(
                "text shadow_opacity must be within [0, 1]",
            ));
        }
        if !self.line_spacing.is_finite() || self.line_spacing <= 0.0 {
            return Err(ReelError::validation(
                "text line_spacing must be finite and > 0",
            ));
        }
        if !self.max_width_frac.is_finite() || self.max_width_frac <= 0.0 {
            return Err(ReelError::validation(
                "text max_width_frac must be finite and > 0",
            ));
        }
        if self.supersample == 0 || self.supersample > 8 {
            return Err(ReelError::validation("text supersample must be in 1..=8"));
        }
        Ok(())
    }

    fn margin_px(&self) -> u32 {
        let shadow_reach = (1.5 * self.shadow_spread).ceil() as u32;
        let offset = self.shadow_offset[0].abs().max(self.shadow_offset[1].abs()).ceil() as u32;
        self.padding_px + shadow_reach + offset
    }
}

/// Rasterized caption: text over its soft shadow, premultiplied RGBA8.
#[derive(Clone)]
pub struct TextSprite {
    /// Sprite width in pixels.
    pub width: u32,
    /// Sprite height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 pixels.
    pub data: Arc<Vec<u8>>,
    /// Center of the text block inside the sprite.
    pub text_center: Vec2,
    pub(crate) paint: vello_cpu::Image,
}

impl std::fmt::Debug for TextSprite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSprite")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("text_center", &self.text_center)
            .finish_non_exhaustive()
    }
}

impl TextSprite {
    pub(crate) fn from_premul(
        data: Vec<u8>,
        width: u32,
        height: u32,
        text_center: Vec2,
    ) -> ReelResult<Self> {
        let paint = image_paint_from_premul(&data, width, height)?;
        Ok(Self {
            width,
            height,
            data: Arc::new(data),
            text_center,
            paint,
        })
    }
}

/// Renders caption text into [`TextSprite`]s with one font and style.
///
/// Not `Sync`: each worker thread owns its own renderer.
pub struct TextRenderer {
    engine: TextLayoutEngine,
    font: vello_cpu::peniko::FontData,
    style: TextStyle,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("engine", &self.engine)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl TextRenderer {
    /// Register `font_bytes` (TrueType/OpenType) and validate `style`.
    pub fn new(font_bytes: &[u8], style: TextStyle) -> ReelResult<Self> {
        style.validate()?;
        let engine = TextLayoutEngine::new(font_bytes)?;
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            0,
        );
        Ok(Self {
            engine,
            font,
            style,
        })
    }

    /// Style this renderer was built with.
    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    /// Family name of the registered font.
    pub fn family_name(&self) -> &str {
        self.engine.family_name()
    }

    /// Render `text` wrapped to the configured fraction of `canvas` width.
    #[tracing::instrument(level = "trace", skip(self, text), fields(chars = text.len()))]
    pub fn render_sprite(&mut self, text: &str, canvas: Canvas) -> ReelResult<TextSprite> {
        let style = &self.style;
        let margin = style.margin_px();
        let limit = u64::from(u16::MAX);
        if 2 * u64::from(margin) >= limit {
            return Err(ReelError::render(format!(
                "caption margin {margin}px leaves no room in the raster"
            )));
        }

        // Oversized blocks first lose supersampling, then font size, until they fit a raster.
        let mut ss = style.supersample;
        let mut font_px = style.font_size_px;
        let (block, width, height) = loop {
            let ssf = ss as f32;
            let block = self.engine.layout_block(
                text,
                font_px * ssf,
                style.max_width_frac * canvas.width as f32 * ssf,
                style.line_spacing,
            )?;
            let block_w = (f64::from(block.width) / f64::from(ss)).ceil().max(1.0);
            let block_h = (f64::from(block.height) / f64::from(ss)).ceil().max(1.0);
            let width = block_w as u64 + 2 * u64::from(margin);
            let height = block_h as u64 + 2 * u64::from(margin);
            let largest = width.max(height);
            if largest * u64::from(ss) <= limit {
                break (block, width as u32, height as u32);
            }
            if ss > 1 {
                let fits = u32::try_from(limit / largest).unwrap_or(1);
                ss = fits.clamp(1, ss - 1);
                tracing::debug!(supersample = ss, "lowering caption supersampling to fit raster");
                continue;
            }
            let room = (limit - 2 * u64::from(margin)) as f64;
            let shrink = (room / block_w.max(block_h) * 0.95).min(0.95) as f32;
            if !shrink.is_finite() || font_px * shrink < 1.0 {
                return Err(ReelError::render(format!(
                    "caption block {width}x{height}px cannot fit a raster"
                )));
            }
            font_px *= shrink;
            tracing::warn!(font_size_px = font_px, "shrinking oversized caption to fit raster");
        };
        let ssf = ss as f32;
        let (hi_w, hi_h) = dims_u16(width * ss, height * ss)?;

        // Glyph coverage at the oversampled resolution.
        let mut ctx = vello_cpu::RenderContext::new(hi_w, hi_h);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
        let origin = (margin * ss) as f32;
        for line in &block.lines {
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                f64::from(origin + line.x),
                f64::from(origin + line.y),
            )));
            for pline in line.layout.lines() {
                for item in pline.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&self.font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(hi_w, hi_h);
        ctx.render_to_pixmap(&mut pixmap);

        let hi_mask = pixmap
            .data_as_u8_slice()
            .chunks_exact(4)
            .map(|px| px[3])
            .collect::<Vec<u8>>();
        let mask = downsample_mask(hi_mask, width, height, ss)?;

        let shadow = shadow_layer(&mask, width, height, style)?;
        let text_layer = tint_mask(&mask, style.color, 1.0);

        let mut data = shadow;
        premul_over_in_place(&mut data, &text_layer, 1.0);

        let text_center = Vec2::new(
            f64::from(margin) + f64::from(block.width / ssf) / 2.0,
            f64::from(margin) + f64::from(block.height / ssf) / 2.0,
        );
        TextSprite::from_premul(data, width, height, text_center)
    }
}

fn downsample_mask(hi: Vec<u8>, width: u32, height: u32, ss: u32) -> ReelResult<Vec<u8>> {
    if ss == 1 {
        return Ok(hi);
    }
    let hi_img = image::GrayImage::from_raw(width * ss, height * ss, hi)
        .ok_or_else(|| ReelError::render("text mask buffer size mismatch"))?;
    Ok(image::imageops::resize(&hi_img, width, height, FilterType::Lanczos3).into_raw())
}

/// Premultiplied RGBA8 from a coverage mask and a straight-alpha color.
fn tint_mask(mask: &[u8], color: Rgba8, opacity: f32) -> Vec<u8> {
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as u16).min(255);
    let alpha_scale = u16::from(mul_div255_u8(u16::from(color.a), op));
    let mut out = vec![0u8; mask.len() * 4];
    for (px, &m) in out.chunks_exact_mut(4).zip(mask) {
        let a = mul_div255_u8(u16::from(m), alpha_scale);
        px[0] = mul_div255_u8(u16::from(color.r), u16::from(a));
        px[1] = mul_div255_u8(u16::from(color.g), u16::from(a));
        px[2] = mul_div255_u8(u16::from(color.b), u16::from(a));
        px[3] = a;
    }
    out
}

fn shadow_layer(mask: &[u8], width: u32, height: u32, style: &TextStyle) -> ReelResult<Vec<u8>> {
    let dx = style.shadow_offset[0].round() as i64;
    let dy = style.shadow_offset[1].round() as i64;
    let (w, h) = (i64::from(width), i64::from(height));

    let mut shifted = vec![0u8; mask.len()];
    for y in 0..h {
        let sy = y - dy;
        if !(0..h).contains(&sy) {
            continue;
        }
        for x in 0..w {
            let sx = x - dx;
            if !(0..w).contains(&sx) {
                continue;
            }
            shifted[(y * w + x) as usize] = mask[(sy * w + sx) as usize];
        }
    }

    let blurred = blur_mask(&shifted, width, height, style.shadow_spread / 2.0)?;
    Ok(tint_mask(&blurred, style.shadow_color, style.shadow_opacity))
}

#[cfg(test)]
#[path = "../../tests/unit/text/sprite.rs"]
mod tests;
