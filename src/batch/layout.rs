use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Audio extensions in lookup order.
pub const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// Input/output directory conventions.
///
/// Item `n` reads `<n>.png`, `<n>.srt` and `<n>.mp3` (or `<n>.wav`) from `input_dir` and writes
/// `output_<n>.mp4` to `output_dir`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLayout {
    /// Directory holding numbered inputs.
    pub input_dir: PathBuf,
    /// Directory receiving rendered videos.
    pub output_dir: PathBuf,
}

impl InputLayout {
    /// Layout over the given directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// `<input>/<n>.png`
    pub fn background_path(&self, item: u64) -> PathBuf {
        self.input_dir.join(format!("{item}.png"))
    }

    /// `<input>/<n>.srt`
    pub fn subtitle_path(&self, item: u64) -> PathBuf {
        self.input_dir.join(format!("{item}.srt"))
    }

    /// First existing audio file for `item`, trying mp3 before wav.
    pub fn find_audio(&self, item: u64) -> Option<PathBuf> {
        AUDIO_EXTENSIONS
            .iter()
            .map(|ext| self.input_dir.join(format!("{item}.{ext}")))
            .find(|p| p.is_file())
    }

    /// `<output>/output_<n>.mp4`
    pub fn output_path(&self, item: u64) -> PathBuf {
        self.output_dir.join(format!("output_{item}.mp4"))
    }

    /// Temporary encode target, renamed to [`Self::output_path`] on success.
    pub fn partial_path(&self, item: u64) -> PathBuf {
        self.output_dir.join(format!("output_{item}.partial.mp4"))
    }

    /// Latest modification time across the item's inputs that exist.
    pub(crate) fn inputs_modified(&self, item: u64) -> Option<SystemTime> {
        [
            Some(self.background_path(item)),
            Some(self.subtitle_path(item)),
            self.find_audio(item),
        ]
        .into_iter()
        .flatten()
        .filter_map(|p| p.metadata().and_then(|m| m.modified()).ok())
        .max()
    }
}

/// Resolved input and output paths for one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemInputs {
    /// Item number.
    pub item: u64,
    /// Background image.
    pub background: PathBuf,
    /// Subtitle file.
    pub subtitles: PathBuf,
    /// Audio file (mp3 preferred over wav).
    pub audio: PathBuf,
    /// Final output path.
    pub output: PathBuf,
    /// Temporary output path.
    pub partial: PathBuf,
}

impl ItemInputs {
    /// Resolve paths for `item`, failing with a validation error naming the first missing input.
    pub fn resolve(layout: &InputLayout, item: u64) -> ReelResult<Self> {
        let background = layout.background_path(item);
        if !background.is_file() {
            return Err(ReelError::validation(format!(
                "background image not found: {}",
                background.display()
            )));
        }
        let subtitles = layout.subtitle_path(item);
        if !subtitles.is_file() {
            return Err(ReelError::validation(format!(
                "subtitle file not found: {}",
                subtitles.display()
            )));
        }
        let audio = layout.find_audio(item).ok_or_else(|| {
            ReelError::validation(format!(
                "audio file not found for item {item} (looked for {item}.mp3, {item}.wav in {})",
                layout.input_dir.display()
            ))
        })?;
        Ok(Self {
            item,
            background,
            subtitles,
            audio,
            output: layout.output_path(item),
            partial: layout.partial_path(item),
        })
    }
}

/// Items with a subtitle file, a background, an audio file and no final output, ascending.
///
/// Only canonical decimal stems count: `7.srt` is item 7, while `07.srt` and `intro.srt` are
/// ignored.
pub fn discover_pending(layout: &InputLayout) -> ReelResult<Vec<u64>> {
    let entries = std::fs::read_dir(&layout.input_dir)
        .with_context(|| format!("read input directory '{}'", layout.input_dir.display()))?;

    let mut pending = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("read input directory '{}'", layout.input_dir.display()))?;
        let path = entry.path();
        let Some(item) = item_number(&path) else {
            continue;
        };
        if !layout.background_path(item).is_file() || layout.find_audio(item).is_none() {
            tracing::trace!(item, "skipping item with incomplete inputs");
            continue;
        }
        if layout.output_path(item).exists() {
            continue;
        }
        pending.push(item);
    }
    pending.sort_unstable();
    pending.dedup();
    Ok(pending)
}

fn item_number(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != "srt" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let n = stem.parse::<u64>().ok()?;
    if n.to_string() != stem {
        tracing::debug!(file = %path.display(), "ignoring non-canonical item number");
        return None;
    }
    Some(n)
}

#[cfg(test)]
#[path = "../../tests/unit/batch/layout.rs"]
mod tests;
