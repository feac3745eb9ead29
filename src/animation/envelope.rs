use crate::animation::ease::Ease;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::lerp;

/// Three-phase (fade-in / hold / fade-out) animation applied to each text overlay.
///
/// During fade-in, opacity rises from 0 to 1 while scale eases from `scale_in` to 1 and the
/// vertical offset settles from `rise_px` to 0. During fade-out opacity falls back to 0 and scale
/// moves from 1 to `scale_out`. The hold phase is fully opaque at scale 1.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// Fade-in length in seconds.
    pub fade_in_secs: f64,
    /// Fade-out length in seconds.
    pub fade_out_secs: f64,
    /// Easing applied to fade-in progress.
    pub ease_in: Ease,
    /// Easing applied to fade-out progress.
    pub ease_out: Ease,
    /// Scale factor at the start of fade-in.
    pub scale_in: f64,
    /// Scale factor at the end of fade-out.
    pub scale_out: f64,
    /// Vertical offset in pixels at the start of fade-in (positive is downward).
    pub rise_px: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            fade_in_secs: 0.35,
            fade_out_secs: 0.3,
            ease_in: Ease::OutCubic,
            ease_out: Ease::InQuad,
            scale_in: 0.85,
            scale_out: 1.05,
            rise_px: 24.0,
        }
    }
}

/// Envelope phase at a sampled instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Opacity and scale are rising toward the hold values.
    FadeIn,
    /// Fully visible at rest.
    Hold,
    /// Opacity is falling toward zero.
    FadeOut,
}

/// Animated values sampled from an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSample {
    /// Phase containing the sampled instant.
    pub phase: Phase,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Uniform scale factor about the overlay center.
    pub scale: f64,
    /// Vertical offset in output pixels.
    pub offset_y: f64,
}

impl Envelope {
    /// Validate durations and scale factors.
    pub fn validate(&self) -> ReelResult<()> {
        for (name, v) in [
            ("fade_in_secs", self.fade_in_secs),
            ("fade_out_secs", self.fade_out_secs),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ReelError::validation(format!(
                    "animation {name} must be finite and >= 0"
                )));
            }
        }
        for (name, v) in [("scale_in", self.scale_in), ("scale_out", self.scale_out)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ReelError::validation(format!(
                    "animation {name} must be finite and > 0"
                )));
            }
        }
        if !self.rise_px.is_finite() {
            return Err(ReelError::validation("animation rise_px must be finite"));
        }
        Ok(())
    }

    /// Effective `(fade_in, fade_out)` lengths for a cue of `duration` seconds.
    ///
    /// Fades that do not fit are shrunk proportionally so together they span the whole cue.
    pub fn fade_spans(&self, duration: f64) -> (f64, f64) {
        let total = self.fade_in_secs + self.fade_out_secs;
        if total > duration && total > 0.0 {
            let k = duration.max(0.0) / total;
            (self.fade_in_secs * k, self.fade_out_secs * k)
        } else {
            (self.fade_in_secs, self.fade_out_secs)
        }
    }

    /// Sample the envelope at cue-local time `t` for a cue lasting `duration` seconds.
    ///
    /// Returns `None` outside the half-open interval `[0, duration)`.
    pub fn sample(&self, t: f64, duration: f64) -> Option<EnvelopeSample> {
        if !(t >= 0.0 && t < duration) {
            return None;
        }
        let (fade_in, fade_out) = self.fade_spans(duration);

        if fade_in > 0.0 && t < fade_in {
            let p = self.ease_in.apply(t / fade_in);
            return Some(EnvelopeSample {
                phase: Phase::FadeIn,
                opacity: p.clamp(0.0, 1.0) as f32,
                scale: lerp(self.scale_in, 1.0, p),
                offset_y: lerp(self.rise_px, 0.0, p),
            });
        }

        // Shrunk fades meet exactly at the end of fade-in, leaving no hold.
        let out_start = if fade_in + fade_out >= duration - 1e-9 {
            fade_in
        } else {
            duration - fade_out
        };
        if fade_out > 0.0 && t >= out_start {
            let p = self.ease_out.apply((t - out_start) / fade_out);
            return Some(EnvelopeSample {
                phase: Phase::FadeOut,
                opacity: (1.0 - p).clamp(0.0, 1.0) as f32,
                scale: lerp(1.0, self.scale_out, p),
                offset_y: 0.0,
            });
        }

        Some(EnvelopeSample {
            phase: Phase::Hold,
            opacity: 1.0,
            scale: 1.0,
            offset_y: 0.0,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/envelope.rs"]
mod tests;
