// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Formatting pipeline: inline markup parsing and per-character attribute
//! runs.
//!
//! Both entry points produce a [`FormattingRuns`] bundle whose run sets all
//! share the domain `[0, content_text.len())` — the plain-text projection of
//! the source with markup stripped.

mod iterator;
mod parser;

pub use iterator::{FormattingEvent, FormattingIterator};

use crate::font::Font;
use crate::style::{Color, StrokeState};
use crate::value_runs::ValueRuns;

/// A markup problem encountered while parsing. The parse always completes;
/// issues describe what was skipped or passed through literally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupIssue {
    /// Byte offset into the *source* text where the issue begins.
    pub source_offset: usize,
    pub kind: MarkupIssueKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkupIssueKind {
    UnknownTag,
    UnmatchedCloser,
    MalformedAttribute,
    UnknownFontFace,
    UnterminatedTag,
}

/// Per-character formatting state over the content text, plus the content
/// text itself and a map back to source offsets.
#[derive(Clone, Debug, Default)]
pub struct FormattingRuns {
    pub font_runs: ValueRuns<Font>,
    pub color_runs: ValueRuns<Color>,
    pub stroke_runs: ValueRuns<StrokeState>,
    pub strikethrough_runs: ValueRuns<bool>,
    pub underline_runs: ValueRuns<bool>,
    pub content_text: String,
    /// Content-index → source-index map: for each run the value is the byte
    /// delta to add to a content offset to obtain the source offset.
    pub source_map: ValueRuns<i32>,
    pub issues: Vec<MarkupIssue>,
}

impl FormattingRuns {
    /// Source byte offset corresponding to a content byte offset.
    pub fn source_index(&self, content_index: usize) -> usize {
        if self.source_map.is_empty() || content_index as i32 >= self.source_map.limit() {
            return content_index;
        }
        (content_index as i32 + self.source_map.get_value(content_index as i32)) as usize
    }
}

/// Builds single-run formatting covering the whole source text with the base
/// values; the content text is the source text.
pub fn make_default_formatting_runs(
    text: &str,
    base_font: Font,
    base_color: Color,
    base_stroke: StrokeState,
) -> FormattingRuns {
    let limit = text.len() as i32;
    let mut runs = FormattingRuns {
        content_text: text.to_owned(),
        ..Default::default()
    };
    if limit > 0 {
        runs.font_runs = ValueRuns::single(base_font, limit);
        runs.color_runs = ValueRuns::single(base_color, limit);
        runs.stroke_runs = ValueRuns::single(base_stroke, limit);
        runs.strikethrough_runs = ValueRuns::single(false, limit);
        runs.underline_runs = ValueRuns::single(false, limit);
        runs.source_map = ValueRuns::single(0, limit);
    }
    runs
}

/// Parses the inline markup grammar and produces content text plus runs.
///
/// Recognized tags: `<color rgb=…>`, `<stroke color=… thickness=… joins=…>`,
/// `<b>`, `<i>`, `<font face="…" size=…>`, `<u>`, `<s>`, and `<!-- -->`
/// comments. Unknown tags pass through literally; unmatched closers are
/// discarded. Both are recorded as issues.
pub fn parse_inline_formatting(
    text: &str,
    base_font: Font,
    base_color: Color,
    base_stroke: StrokeState,
) -> FormattingRuns {
    parser::parse(text, base_font, base_color, base_stroke)
}
