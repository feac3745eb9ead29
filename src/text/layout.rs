use crate::foundation::error::{ReelError, ReelResult};

/// One shaped line of a text block, positioned inside the block.
pub(crate) struct PlacedLine {
    pub(crate) layout: parley::Layout<()>,
    /// Left edge inside the block (lines are horizontally centered).
    pub(crate) x: f32,
    /// Top edge inside the block.
    pub(crate) y: f32,
}

/// Wrapped, centered, shaped text.
pub(crate) struct TextBlock {
    pub(crate) lines: Vec<PlacedLine>,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

/// Parley contexts bound to a single registered font.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
}

impl std::fmt::Debug for TextLayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLayoutEngine")
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl TextLayoutEngine {
    /// Register `font_bytes` and prepare fresh Parley contexts.
    pub(crate) fn new(font_bytes: &[u8]) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            ReelError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::validation("registered font family has no name"))?
            .to_string();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
        })
    }

    pub(crate) fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Shape a single line without wrapping.
    pub(crate) fn layout_line(&mut self, text: &str, size_px: f32) -> parley::Layout<()> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Borrowed(&self.family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        layout.align(
            None,
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );
        layout
    }

    /// Advance width of `text` set on one line.
    pub(crate) fn measure(&mut self, text: &str, size_px: f32) -> f32 {
        self.layout_line(text, size_px).width()
    }

    /// Greedy word wrap: words are appended while the line fits `max_width`; a word that does not
    /// fit on its own is left on a line by itself. Explicit newlines always break.
    pub(crate) fn wrap(&mut self, text: &str, size_px: f32, max_width: f32) -> Vec<String> {
        let mut out = Vec::new();
        for paragraph in text.lines() {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{current} {word}");
                if self.measure(&candidate, size_px) <= max_width {
                    current = candidate;
                } else {
                    out.push(std::mem::replace(&mut current, word.to_string()));
                }
            }
            if !current.is_empty() {
                out.push(current);
            }
        }
        out
    }

    /// Wrap, shape, and center `text`. Each line advances by its own height times `line_spacing`.
    pub(crate) fn layout_block(
        &mut self,
        text: &str,
        size_px: f32,
        max_width: f32,
        line_spacing: f32,
    ) -> ReelResult<TextBlock> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let wrapped = self.wrap(text, size_px, max_width);
        if wrapped.is_empty() {
            return Err(ReelError::validation("text has no visible words"));
        }

        let layouts = wrapped
            .iter()
            .map(|line| self.layout_line(line, size_px))
            .collect::<Vec<_>>();
        let width = layouts.iter().map(|l| l.width()).fold(0.0f32, f32::max);

        let mut lines = Vec::with_capacity(layouts.len());
        let mut y = 0.0f32;
        let count = layouts.len();
        for (i, layout) in layouts.into_iter().enumerate() {
            let line_h = layout.height();
            let x = ((width - layout.width()) * 0.5).max(0.0);
            lines.push(PlacedLine { layout, x, y });
            y += if i + 1 == count {
                line_h
            } else {
                line_h * line_spacing
            };
        }

        Ok(TextBlock {
            lines,
            width,
            height: y,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/layout.rs"]
mod tests;
