//! SRT caption reader.
//!
//! Produces the ordered `(start, duration, text)` cue sequence that drives text overlays.

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// One timed caption.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cue {
    /// Index from the file, or the 1-based position when the file omits it.
    pub index: u32,
    /// Start time in seconds.
    pub start_secs: f64,
    /// Display duration in seconds (always > 0).
    pub duration_secs: f64,
    /// Caption text with markup removed; multiple lines are joined with `\n`.
    pub text: String,
}

impl Cue {
    /// End time in seconds (exclusive).
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Read and parse an SRT file.
///
/// Invalid UTF-8 is replaced lossily rather than rejected.
pub fn read_srt_file(path: &Path) -> ReelResult<Vec<Cue>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read subtitle file '{}'", path.display()))?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), "subtitle file is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    parse_srt(&text).map_err(|e| match e {
        ReelError::Subtitle(msg) => ReelError::subtitle(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Parse SRT text into cues sorted by start time.
///
/// Cues with an end time not after their start, or with no text left after markup removal, are
/// dropped. Malformed blocks are skipped with a warning; the input is only rejected when it has
/// blocks and none of them is a well-formed cue.
pub fn parse_srt(input: &str) -> ReelResult<Vec<Cue>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut cues = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();
    let mut position = 0u32;
    let mut well_formed = 0usize;
    let mut first_error: Option<String> = None;

    let lines = input.lines().enumerate().map(|(i, l)| (i + 1, l));
    for (lineno, line) in lines.chain(std::iter::once((0, ""))) {
        if !line.trim().is_empty() {
            block.push((lineno, line));
            continue;
        }
        if block.is_empty() {
            continue;
        }
        position += 1;
        match parse_block(&block, position) {
            Ok(cue) => {
                well_formed += 1;
                cues.extend(cue);
            }
            Err(msg) => {
                tracing::warn!(line = block[0].0, error = %msg, "skipping malformed subtitle block");
                first_error.get_or_insert(msg);
            }
        }
        block.clear();
    }

    if well_formed == 0
        && let Some(msg) = first_error
    {
        return Err(ReelError::subtitle(format!("no valid cues: {msg}")));
    }

    cues.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    Ok(cues)
}

/// `Err` carries a line-numbered description of a malformed block.
fn parse_block(block: &[(usize, &str)], position: u32) -> Result<Option<Cue>, String> {
    let (first_no, first) = block[0];
    let (index, timing, text_lines) = if first.contains("-->") {
        (position, block[0], &block[1..])
    } else {
        let index = first.trim().parse::<u32>().map_err(|_| {
            format!(
                "line {first_no}: expected cue index or timing, found '{}'",
                first.trim()
            )
        })?;
        let Some(&timing) = block.get(1) else {
            return Err(format!("line {first_no}: cue {index} has no timing line"));
        };
        (index, timing, &block[2..])
    };

    let (start_secs, end_secs) =
        parse_timing(timing.1).map_err(|msg| format!("line {}: {msg}", timing.0))?;

    let raw = text_lines
        .iter()
        .map(|(_, l)| l.trim())
        .collect::<Vec<_>>()
        .join("\n");
    let text = strip_markup(&raw);

    if end_secs <= start_secs {
        tracing::warn!(
            cue = index,
            line = timing.0,
            "dropping subtitle cue whose end is not after its start"
        );
        return Ok(None);
    }
    if text.is_empty() {
        tracing::debug!(cue = index, line = timing.0, "dropping empty subtitle cue");
        return Ok(None);
    }

    Ok(Some(Cue {
        index,
        start_secs,
        duration_secs: end_secs - start_secs,
        text,
    }))
}

/// Parse `HH:MM:SS,mmm --> HH:MM:SS,mmm [position hints]`.
fn parse_timing(line: &str) -> Result<(f64, f64), String> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| format!("expected timing line, found '{}'", line.trim()))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| "timing line has no end time".to_string())?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Parse `HH:MM:SS,mmm` (or `MM:SS,mmm`, `.` accepted for `,`) into seconds.
pub(crate) fn parse_timestamp(s: &str) -> Result<f64, String> {
    let bad = || format!("invalid timestamp '{s}'");

    let (clock, frac) = match s.split_once([',', '.']) {
        Some((clock, frac)) => (clock, frac),
        None => (s, ""),
    };
    let parts = clock.split(':').collect::<Vec<_>>();
    let (h, m, sec) = match parts.as_slice() {
        [h, m, sec] => (*h, *m, *sec),
        [m, sec] => ("0", *m, *sec),
        _ => return Err(bad()),
    };
    let field = |v: &str| -> Result<u64, String> {
        if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        v.parse::<u64>().map_err(|_| bad())
    };
    let h = field(h)?;
    let m = field(m)?;
    let sec = field(sec)?;
    if m >= 60 || sec >= 60 {
        return Err(bad());
    }

    let frac_secs = if frac.is_empty() {
        0.0
    } else {
        let digits = field(frac)?;
        digits as f64 / 10f64.powi(frac.len() as i32)
    };

    let whole = h
        .checked_mul(3600)
        .and_then(|v| v.checked_add(m * 60 + sec))
        .ok_or_else(bad)?;
    Ok(whole as f64 + frac_secs)
}

/// Remove `<tag>` and `{\override}` markup, then trim.
pub(crate) fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut closer: Option<char> = None;
    for c in text.chars() {
        match (closer, c) {
            (None, '<') => closer = Some('>'),
            (None, '{') => closer = Some('}'),
            (None, _) => out.push(c),
            (Some(end), _) if c == end => closer = None,
            (Some(_), _) => {}
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "../../tests/unit/subtitle/srt.rs"]
mod tests;
