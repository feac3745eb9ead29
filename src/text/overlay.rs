use std::sync::Arc;

use crate::animation::envelope::{Envelope, Phase};
use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Vec2};
use crate::text::sprite::TextSprite;

/// Where a caption sits on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "anchor", rename_all = "snake_case")]
pub enum Position {
    /// Centered on the canvas.
    #[default]
    Center,
    /// Horizontally centered, `margin_px` below the top edge.
    Top {
        /// Gap between the canvas edge and the sprite.
        margin_px: f64,
    },
    /// Horizontally centered, `margin_px` above the bottom edge.
    Bottom {
        /// Gap between the canvas edge and the sprite.
        margin_px: f64,
    },
}

impl Position {
    /// Canvas point the sprite's text center is placed on.
    pub fn anchor(self, canvas: Canvas, sprite: &TextSprite) -> Vec2 {
        let c = canvas.center();
        match self {
            Self::Center => c,
            Self::Top { margin_px } => Vec2::new(c.x, margin_px + sprite.text_center.y),
            Self::Bottom { margin_px } => Vec2::new(
                c.x,
                f64::from(canvas.height) - margin_px - (f64::from(sprite.height) - sprite.text_center.y),
            ),
        }
    }
}

/// Animated overlay values at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayState {
    /// Envelope phase.
    pub phase: Phase,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Scale about the text center.
    pub scale: f64,
    /// Vertical displacement in pixels.
    pub offset_y: f64,
}

/// A caption sprite placed on the timeline.
#[derive(Clone, Debug)]
pub struct TextClip {
    /// Timeline start in seconds.
    pub start_secs: f64,
    /// Visible duration in seconds.
    pub duration_secs: f64,
    /// Rendered caption.
    pub sprite: Arc<TextSprite>,
    /// Fade/scale animation.
    pub envelope: Envelope,
    /// Placement on the canvas.
    pub position: Position,
}

impl TextClip {
    /// Timeline end in seconds (exclusive).
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    /// Overlay state at timeline time `t`, or `None` when the clip is not visible.
    pub fn state_at(&self, t: f64) -> Option<OverlayState> {
        let s = self.envelope.sample(t - self.start_secs, self.duration_secs)?;
        Some(OverlayState {
            phase: s.phase,
            opacity: s.opacity,
            scale: s.scale,
            offset_y: s.offset_y,
        })
    }

    /// Timeline frames this clip covers, `[first, end)`.
    ///
    /// Exactly the frames whose timestamp [`TextClip::state_at`] reports as visible.
    pub fn frame_range(&self, fps: Fps) -> std::ops::Range<u64> {
        let visible = |f: u64| {
            let local = fps.frames_to_secs(f) - self.start_secs;
            local >= 0.0 && local < self.duration_secs
        };

        // The snapped ceilings can land one frame off either way; settle on the exact edges.
        let mut first = fps.secs_to_frames_ceil(self.start_secs);
        while first > 0 && fps.frames_to_secs(first - 1) - self.start_secs >= 0.0 {
            first -= 1;
        }
        while fps.frames_to_secs(first) - self.start_secs < 0.0 {
            first += 1;
        }

        let mut end = fps.secs_to_frames_ceil(self.end_secs()).max(first);
        while end > first && !visible(end - 1) {
            end -= 1;
        }
        while visible(end) {
            end += 1;
        }
        first..end
    }

    /// One state per output frame while the clip is visible.
    pub fn fragment_states(&self, fps: Fps) -> Vec<(FrameIndex, OverlayState)> {
        self.frame_range(fps)
            .filter_map(|f| {
                let t = fps.frames_to_secs(f);
                self.state_at(t).map(|s| (FrameIndex(f), s))
            })
            .collect()
    }

    /// Sprite-to-canvas transform for `state`.
    pub fn transform(&self, canvas: Canvas, state: &OverlayState) -> Affine {
        let anchor = self.position.anchor(canvas, &self.sprite);
        Affine::translate(anchor + Vec2::new(0.0, state.offset_y))
            * Affine::scale(state.scale)
            * Affine::translate(-self.sprite.text_center)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/overlay.rs"]
mod tests;
