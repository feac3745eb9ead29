//! Render configuration loaded from JSON.
//!
//! Every section is optional; missing fields take the defaults below.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::animation::envelope::Envelope;
use crate::background::animator::{BreathingParams, FitMode};
use crate::encode::ffmpeg::EncoderSettings;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::pipeline::RenderThreading;
use crate::text::overlay::Position;
use crate::text::sprite::TextStyle;

/// Top-level configuration for batch and single-item rendering.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output canvas size.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// How the background image is fitted to the canvas.
    pub fit: FitMode,
    /// Background breathing animation.
    pub background: BreathingParams,
    /// Caption font, style and placement.
    pub text: TextConfig,
    /// Caption fade/scale envelope.
    pub animation: Envelope,
    /// ffmpeg codec settings.
    pub encoder: EncoderSettings,
    /// Items rendered concurrently; available parallelism when `None`.
    pub workers: Option<usize>,
    /// Frame parallelism inside one item.
    pub threading: RenderThreading,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Caption text settings.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// TrueType/OpenType font file used for every caption.
    pub font_path: Option<PathBuf>,
    /// Placement on the canvas.
    pub position: Position,
    /// Font size, colors and shadow.
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `subreel=debug,warn`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RenderConfig {
    /// Load a JSON config file.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read config '{}'", path.display()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ReelError::validation(format!("invalid config '{}': {e}", path.display()))
        })
    }

    /// Validate every section.
    pub fn validate(&self) -> ReelResult<()> {
        self.canvas.validate()?;
        self.fps.validate()?;
        self.background.validate()?;
        self.text.style.validate()?;
        self.animation.validate()?;
        self.encoder.validate()?;
        if self.workers == Some(0) {
            return Err(ReelError::validation("workers must be >= 1 when set"));
        }
        if self.threading.threads == Some(0) {
            return Err(ReelError::validation(
                "threading.threads must be >= 1 when set",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ReelError::validation("logging.level must be non-empty"));
        }
        Ok(())
    }

    /// Worker count for the batch pool.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
