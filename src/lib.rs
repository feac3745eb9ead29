//! subreel renders captioned short videos in batches.
//!
//! Each numbered item `<n>` in an input directory provides a still image (`<n>.png`), an SRT
//! subtitle file (`<n>.srt`) and a soundtrack (`<n>.mp3` or `<n>.wav`). The rendered
//! `output_<n>.mp4` shows the image with a slow breathing zoom, each caption fading and scaling in
//! and out over a soft drop shadow, and the soundtrack muxed in. Video length follows the audio.
//!
//! - [`BatchScheduler`] discovers pending items and renders them on a worker pool
//! - [`render_item`] renders one item end to end
//! - [`Composition`] and [`FrameCompositor`] produce individual frames
//! - [`FfmpegSink`] encodes frames through the system `ffmpeg`
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod background;
pub(crate) mod batch;
pub(crate) mod encode;
pub(crate) mod media;
pub(crate) mod render;
pub(crate) mod subtitle;
pub(crate) mod text;

pub mod config;
pub mod logging;

pub use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Rgba8, Vec2};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::envelope::{Envelope, EnvelopeSample, Phase};
pub use crate::background::animator::{BackgroundAnimator, BreathingParams, FitMode};
pub use crate::batch::item::{
    ItemReport, SharedAssets, build_composition, render_item, render_item_with,
};
pub use crate::batch::layout::{AUDIO_EXTENSIONS, InputLayout, ItemInputs, discover_pending};
pub use crate::batch::scheduler::{BatchReport, BatchScheduler, DEFAULT_POLL_INTERVAL, ItemOutcome};
pub use crate::config::{LoggingConfig, RenderConfig, TextConfig};
pub use crate::encode::ffmpeg::{
    EncoderSettings, FfmpegSink, FfmpegSinkOpts, build_ffmpeg_args, ensure_parent_dir,
};
pub use crate::encode::sink::{AudioInput, FrameSink, InMemorySink, SinkConfig};
pub use crate::logging::init_logging;
pub use crate::media::audio::AudioTrack;
pub use crate::media::probe::{is_ffmpeg_on_path, is_ffprobe_on_path};
pub use crate::render::compositor::{Composition, FrameCompositor};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::pipeline::{RenderStats, RenderThreading, render_to_sink};
pub use crate::subtitle::srt::{Cue, parse_srt, read_srt_file};
pub use crate::text::overlay::{OverlayState, Position, TextClip};
pub use crate::text::sprite::{TextRenderer, TextSprite, TextStyle};

#[cfg(test)]
#[path = "../tests/unit/support/mod.rs"]
mod test_support;
