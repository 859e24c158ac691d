// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical-order traversal of formatting runs with decoration events.

use super::FormattingRuns;
use crate::style::{Color, StrokeState};
use crate::value_runs::ValueRuns;

/// Decoration transitions crossed by an [`FormattingIterator::advance_to`]
/// step. A color change inside an open decoration ends the old span and
/// begins a new one so the drawn rect picks up the new color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattingEvent(u32);

impl FormattingEvent {
    pub const NONE: Self = Self(0);
    pub const UNDERLINE_BEGIN: Self = Self(1);
    pub const UNDERLINE_END: Self = Self(2);
    pub const STRIKETHROUGH_BEGIN: Self = Self(4);
    pub const STRIKETHROUGH_END: Self = Self(8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for FormattingEvent {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Walks the formatting runs following glyph order within a visual run.
///
/// Construction takes the starting logical index: a left-to-right run starts
/// at its `char_start_index`, a right-to-left run at its `char_end_index`
/// (glyphs are visited in decreasing logical order, and the run cursors walk
/// backward accordingly).
pub struct FormattingIterator<'a> {
    formatting: &'a FormattingRuns,
    color_run: usize,
    stroke_run: usize,
    strikethrough_run: usize,
    underline_run: usize,
    color: Color,
    prev_color: Color,
    strikethrough: bool,
    underline: bool,
}

impl<'a> FormattingIterator<'a> {
    pub fn new(formatting: &'a FormattingRuns, char_index: u32) -> Self {
        let index = clamped_run_index(&formatting.color_runs, char_index);
        let color = *formatting.color_runs.get_run_value(index);
        Self {
            formatting,
            color_run: index,
            stroke_run: clamped_run_index(&formatting.stroke_runs, char_index),
            strikethrough_run: clamped_run_index(&formatting.strikethrough_runs, char_index),
            underline_run: clamped_run_index(&formatting.underline_runs, char_index),
            color,
            prev_color: color,
            strikethrough: false,
            underline: false,
        }
    }

    /// Moves the run cursors to `char_index` (forward or backward) and
    /// reports the decoration transitions crossed since the previous
    /// position.
    pub fn advance_to(&mut self, char_index: u32) -> FormattingEvent {
        self.stroke_run = advance_run(&self.formatting.stroke_runs, self.stroke_run, char_index);
        self.color_run = advance_run(&self.formatting.color_runs, self.color_run, char_index);
        self.strikethrough_run = advance_run(
            &self.formatting.strikethrough_runs,
            self.strikethrough_run,
            char_index,
        );
        self.underline_run = advance_run(
            &self.formatting.underline_runs,
            self.underline_run,
            char_index,
        );

        let color = *self.formatting.color_runs.get_run_value(self.color_run);
        let strikethrough = *self
            .formatting
            .strikethrough_runs
            .get_run_value(self.strikethrough_run);
        let underline = *self
            .formatting
            .underline_runs
            .get_run_value(self.underline_run);
        let color_changed = color != self.color;

        let mut event = FormattingEvent::NONE;
        if strikethrough && (!self.strikethrough || color_changed) {
            event = event | FormattingEvent::STRIKETHROUGH_BEGIN;
        }
        if (!strikethrough && self.strikethrough) || (strikethrough && color_changed) {
            event = event | FormattingEvent::STRIKETHROUGH_END;
        }
        if underline && (!self.underline || color_changed) {
            event = event | FormattingEvent::UNDERLINE_BEGIN;
        }
        if (!underline && self.underline) || (underline && color_changed) {
            event = event | FormattingEvent::UNDERLINE_END;
        }

        self.prev_color = self.color;
        self.color = color;
        self.strikethrough = strikethrough;
        self.underline = underline;
        event
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// The color active immediately before the last transition. Decoration
    /// end events draw the span that just closed with this color.
    pub fn prev_color(&self) -> Color {
        self.prev_color
    }

    pub fn stroke(&self) -> StrokeState {
        *self.formatting.stroke_runs.get_run_value(self.stroke_run)
    }

    pub fn has_strikethrough(&self) -> bool {
        self.strikethrough
    }

    pub fn has_underline(&self) -> bool {
        self.underline
    }
}

fn clamped_run_index<T>(runs: &ValueRuns<T>, char_index: u32) -> usize {
    if runs.is_empty() {
        return 0;
    }
    runs.get_run_index((char_index as i32).min(runs.limit() - 1).max(0))
}

/// Moves a run cursor forward or backward so it contains `char_index`. A
/// right-to-left visual run visits decreasing indices, so the cursor must be
/// able to walk back.
fn advance_run<T>(runs: &ValueRuns<T>, mut run_index: usize, char_index: u32) -> usize {
    let char_index = char_index as i32;
    while run_index + 1 < runs.run_count() && char_index >= runs.get_run_limit(run_index) {
        run_index += 1;
    }
    while run_index > 0 && char_index < runs.get_run_limit(run_index - 1) {
        run_index -= 1;
    }
    run_index
}
