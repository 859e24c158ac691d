// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paragraph layout: positioned glyphs grouped into visual runs and lines,
//! plus the geometric queries the editor builds on.

mod builder;
pub mod itemize;

pub use builder::{build_layout_info, LayoutFlags};
pub(crate) use builder::font_vertical_metrics;

use crate::editing::cursor::{CursorAffinity, CursorPosition, GraphemeBreaks};
use crate::font::SingleScriptFont;
use crate::style::{TextXAlignment, TextYAlignment};
use crate::util::lower_bound;

/// A maximal single-face, single-direction span of glyphs on one line,
/// stored in visual order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisualRun {
    pub font: SingleScriptFont,
    /// One past the last glyph of this run in the layout's glyph arrays.
    pub glyph_end_index: u32,
    /// First (lowest) logical byte index of the run.
    pub char_start_index: u32,
    /// First logical byte index not in the run.
    pub char_end_index: u32,
    /// Bytes of a paragraph separator logically following the run, if any.
    pub char_end_offset: u8,
    pub right_to_left: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LineInfo {
    /// One past the last visual run of this line.
    pub visual_runs_end_index: u32,
    pub width: f32,
    pub ascent: f32,
    /// Total descent from the top of the paragraph to the bottom of this
    /// line; the difference from the previous line's value is the height.
    pub total_descent: f32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CursorPositionResult {
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub line_number: usize,
}

/// The laid-out form of a text block: glyphs in visual order per run,
/// runs in visual order per line, lines in top-to-bottom order.
#[derive(Clone, Debug, Default)]
pub struct LayoutInfo {
    pub visual_runs: Vec<VisualRun>,
    pub lines: Vec<LineInfo>,
    pub glyphs: Vec<u16>,
    /// Logical byte offset per glyph.
    pub char_indices: Vec<u32>,
    /// Interleaved x,y pairs, one per glyph plus one trailing pair per run
    /// holding the run's end position.
    pub glyph_positions: Vec<f32>,
    pub text_start_y: f32,
    pub right_to_left: bool,
}

impl LayoutInfo {
    /// Clears all layout information, retaining allocations.
    pub fn clear(&mut self) {
        self.visual_runs.clear();
        self.lines.clear();
        self.glyphs.clear();
        self.char_indices.clear();
        self.glyph_positions.clear();
        self.text_start_y = 0.;
        self.right_to_left = false;
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Pixel position, height and line number of the cursor.
    pub fn calc_cursor_pixel_pos(
        &self,
        text_width: f32,
        alignment: TextXAlignment,
        cursor: CursorPosition,
    ) -> CursorPositionResult {
        if self.lines.is_empty() {
            return CursorPositionResult::default();
        }
        let (run_index, line_index) = self.get_run_containing_cursor(cursor);
        let line_x = self.get_line_x_start(line_index, text_width, alignment);
        let glyph_offset = self.get_glyph_offset_in_run(run_index, cursor.position());
        let prev_descent = if line_index == 0 {
            0.
        } else {
            self.lines[line_index - 1].total_descent
        };
        CursorPositionResult {
            x: line_x + glyph_offset,
            y: self.text_start_y + prev_descent,
            height: self.lines[line_index].total_descent - prev_descent,
            line_number: line_index,
        }
    }

    /// Index of the run containing the cursor, with affinity deciding run
    /// membership at seams: line-end defaults to the next run's start,
    /// RTL→LTR seams default to the next run's start, LTR→RTL seams to the
    /// current run's end.
    pub fn get_run_containing_cursor(&self, cursor: CursorPosition) -> (usize, usize) {
        let cursor_pos = cursor.position();
        let mut line_number = 0_usize;

        for i in 0..self.visual_runs.len() {
            let run = &self.visual_runs[i];
            let run_before_line_break = i + 1 < self.visual_runs.len()
                && i + 1 == self.lines[line_number].visual_runs_end_index as usize;
            let run_after_line_break = i == self.lines[line_number].visual_runs_end_index as usize;
            if run_after_line_break {
                line_number += 1;
            }

            let run_before_soft_break = run_before_line_break && run.char_end_offset == 0;
            let run_after_soft_break =
                run_after_line_break && i > 0 && self.visual_runs[i - 1].char_end_offset == 0;

            let use_prev_run_end = i > 0
                && affinity_prefer_prev_run(
                    run_after_line_break,
                    run_after_soft_break,
                    self.visual_runs[i - 1].right_to_left,
                    run.right_to_left,
                    cursor.affinity(),
                );
            let use_next_run_start = i + 1 < self.visual_runs.len()
                && !affinity_prefer_prev_run(
                    run_before_line_break,
                    run_before_soft_break,
                    run.right_to_left,
                    self.visual_runs[i + 1].right_to_left,
                    cursor.affinity(),
                );

            let ignore_start = cursor_pos == run.char_start_index && use_prev_run_end;
            let ignore_end = cursor_pos == run.char_end_index + u32::from(run.char_end_offset)
                && use_next_run_start;

            if cursor_pos >= run.char_start_index
                && cursor_pos <= run.char_end_index + u32::from(run.char_end_offset)
                && !ignore_start
                && !ignore_end
            {
                return (i, line_number);
            }
        }

        (self.visual_runs.len() - 1, self.lines.len() - 1)
    }

    /// Line index closest to pixel height `y`. Heights above the first line
    /// return 0; heights past the last line return the line count.
    pub fn get_closest_line_to_height(&self, y: f32) -> usize {
        lower_bound(0, self.lines.len(), |index| {
            self.lines[index].total_descent < y
        })
    }

    pub fn get_line_start_position(&self, line_index: usize) -> CursorPosition {
        let first_run = self.get_first_run_index(line_index);
        let mut lowest_run = first_run;
        let mut lowest_run_end = self.visual_runs[first_run].char_end_index;
        for i in first_run + 1..self.lines[line_index].visual_runs_end_index as usize {
            if self.visual_runs[i].char_end_index < lowest_run_end {
                lowest_run = i;
                lowest_run_end = self.visual_runs[i].char_end_index;
            }
        }
        let run = &self.visual_runs[lowest_run];
        CursorPosition::new(if run.right_to_left {
            run.char_end_index
        } else {
            run.char_start_index
        })
    }

    pub fn get_line_end_position(&self, line_index: usize) -> CursorPosition {
        let first_run = self.get_first_run_index(line_index);
        let mut highest_run = first_run;
        let mut highest_run_end = self.visual_runs[first_run].char_end_index;
        for i in first_run + 1..self.lines[line_index].visual_runs_end_index as usize {
            if self.visual_runs[i].char_end_index > highest_run_end {
                highest_run = i;
                highest_run_end = self.visual_runs[i].char_end_index;
            }
        }
        let opposite_affinity = highest_run
            == self.lines[line_index].visual_runs_end_index as usize - 1
            && self.visual_runs[highest_run].char_end_offset == 0;
        let run = &self.visual_runs[highest_run];
        CursorPosition::with_affinity(
            if run.right_to_left {
                run.char_start_index
            } else {
                run.char_end_index
            },
            opposite_affinity,
        )
    }

    pub fn get_line_x_start(
        &self,
        line_index: usize,
        text_width: f32,
        alignment: TextXAlignment,
    ) -> f32 {
        let line_width = self.lines[line_index].width;
        match alignment {
            TextXAlignment::Left => {
                if self.right_to_left {
                    text_width - line_width
                } else {
                    0.
                }
            }
            TextXAlignment::Right => text_width - line_width,
            TextXAlignment::Center => 0.5 * (text_width - line_width),
        }
    }

    /// The cursor position on `line_number` whose visual x is closest to
    /// `cursor_x`, scanning grapheme boundaries and interpolating inside
    /// multi-byte clusters.
    pub fn find_closest_cursor_position(
        &self,
        text_width: f32,
        alignment: TextXAlignment,
        breaks: &GraphemeBreaks,
        line_number: usize,
        cursor_x: f32,
    ) -> CursorPosition {
        let cursor_x = cursor_x - self.get_line_x_start(line_number, text_width, alignment);

        // Find the run containing the position.
        let first_run_index = self.get_first_run_index(line_number);
        let last_run_index = self.lines[line_number].visual_runs_end_index as usize;
        let run_index = lower_bound(
            first_run_index,
            last_run_index - first_run_index,
            |index| {
                let last_pos_index = 2 * (self.visual_runs[index].glyph_end_index as usize + index);
                self.glyph_positions[last_pos_index] < cursor_x
            },
        );

        if run_index == last_run_index {
            // Past the line's trailing edge: land on the line's last
            // logical boundary.
            let run = &self.visual_runs[last_run_index - 1];
            return CursorPosition::new(if run.right_to_left {
                run.char_start_index
            } else {
                run.char_end_index
            });
        }

        // Find the closest glyph in the run.
        let first_glyph_index = self.get_first_glyph_index(run_index);
        let last_glyph_index = self.visual_runs[run_index].glyph_end_index as usize;
        let first_pos_index = self.get_first_position_index(run_index);
        let right_to_left = self.visual_runs[run_index].right_to_left;

        let glyph_index = first_glyph_index
            + lower_bound(0, last_glyph_index - first_glyph_index, |index| {
                self.glyph_positions[first_pos_index + 2 * index] < cursor_x
            });

        // Visual and logical bounds of the current glyph's cluster.
        let run = &self.visual_runs[run_index];
        let cluster_start_char;
        let cluster_end_char;
        let cluster_start_pos;
        let cluster_end_pos;

        if right_to_left {
            if glyph_index == first_glyph_index {
                cluster_start_char = run.char_end_index;
                cluster_end_char = run.char_end_index;
                cluster_start_pos = self.glyph_positions[first_pos_index];
                cluster_end_pos = cluster_start_pos;
            } else {
                cluster_start_char = self.char_indices[glyph_index - 1];
                cluster_end_char = if glyph_index - 1 == first_glyph_index {
                    run.char_end_index
                } else {
                    self.char_indices[glyph_index - 2]
                };
                cluster_start_pos =
                    self.glyph_positions[first_pos_index + 2 * (glyph_index - first_glyph_index)];
                cluster_end_pos = self.glyph_positions
                    [first_pos_index + 2 * (glyph_index - 1 - first_glyph_index)];
            }
        } else {
            cluster_start_char = if glyph_index == first_glyph_index {
                run.char_start_index
            } else {
                self.char_indices[glyph_index - 1]
            };
            cluster_end_char = if glyph_index == last_glyph_index {
                run.char_end_index
            } else {
                self.char_indices[glyph_index]
            };
            cluster_start_pos = if glyph_index == first_glyph_index {
                self.glyph_positions[first_pos_index]
            } else {
                self.glyph_positions[first_pos_index + 2 * (glyph_index - 1 - first_glyph_index)]
            };
            cluster_end_pos =
                self.glyph_positions[first_pos_index + 2 * (glyph_index - first_glyph_index)];
        }

        // Affinity needed at the run seams.
        let first_run_in_line = run_index == first_run_index;
        let last_run_in_line = run_index == last_run_index - 1;
        let at_soft_line_break = last_run_in_line && run.char_end_offset == 0;

        let first_glyph_affinity = !first_run_in_line
            && !right_to_left
            && self.visual_runs[run_index - 1].right_to_left;
        let last_glyph_affinity = at_soft_line_break
            || (!last_run_in_line
                && !right_to_left
                && self.visual_runs[run_index + 1].right_to_left);

        if cluster_start_char == cluster_end_char {
            return CursorPosition::with_affinity(cluster_start_char, first_glyph_affinity);
        }

        let mut curr_char_index = cluster_start_char;
        let mut curr_pos = cluster_start_pos;

        loop {
            let next_char_index = match breaks.following(curr_char_index as usize) {
                Some(next) => next as u32,
                None => return CursorPosition::new(cluster_start_char),
            };
            let next_pos = cluster_start_pos
                + (next_char_index - cluster_start_char) as f32
                    / (cluster_end_char - cluster_start_char) as f32
                    * (cluster_end_pos - cluster_start_pos);

            if right_to_left {
                if cursor_x > next_pos && cursor_x <= curr_pos {
                    let selected_char = if cursor_x - next_pos < curr_pos - cursor_x {
                        next_char_index
                    } else {
                        curr_char_index
                    };
                    let affinity = (selected_char == run.char_end_index && first_glyph_affinity)
                        || (selected_char == run.char_start_index && last_glyph_affinity);
                    return CursorPosition::with_affinity(selected_char, affinity);
                }
            } else if cursor_x > curr_pos && cursor_x <= next_pos {
                let selected_char = if next_pos - cursor_x < cursor_x - curr_pos {
                    next_char_index
                } else {
                    curr_char_index
                };
                let affinity = (selected_char == run.char_start_index && first_glyph_affinity)
                    || (selected_char == run.char_end_index && last_glyph_affinity);
                return CursorPosition::with_affinity(selected_char, affinity);
            }

            if next_char_index >= cluster_end_char {
                return CursorPosition::new(cluster_start_char);
            }

            curr_char_index = next_char_index;
            curr_pos = next_pos;
        }
    }

    /// Whether `[first_char_index, last_char_index)` intersects the run's
    /// logical range.
    pub fn run_contains_char_range(
        &self,
        run_index: usize,
        first_char_index: u32,
        last_char_index: u32,
    ) -> bool {
        self.visual_runs[run_index].char_start_index < last_char_index
            && self.visual_runs[run_index].char_end_index > first_char_index
    }

    /// Horizontal pixel range covered by the char range within the run. For
    /// right-to-left runs the logical endpoints swap visually.
    pub fn get_position_range_in_run(
        &self,
        run_index: usize,
        first_char_index: u32,
        last_char_index: u32,
    ) -> (f32, f32) {
        let run = &self.visual_runs[run_index];
        let clamp =
            |index: u32| index.min(run.char_end_index).max(run.char_start_index);
        let min_pos = self.get_glyph_offset_in_run(run_index, clamp(first_char_index));
        let max_pos = self.get_glyph_offset_in_run(run_index, clamp(last_char_index));
        if run.right_to_left {
            (max_pos, min_pos)
        } else {
            (min_pos, max_pos)
        }
    }

    pub fn get_first_run_index(&self, line_index: usize) -> usize {
        if line_index == 0 {
            0
        } else {
            self.lines[line_index - 1].visual_runs_end_index as usize
        }
    }

    pub fn get_first_glyph_index(&self, run_index: usize) -> usize {
        if run_index == 0 {
            0
        } else {
            self.visual_runs[run_index - 1].glyph_end_index as usize
        }
    }

    pub fn get_first_position_index(&self, run_index: usize) -> usize {
        if run_index == 0 {
            0
        } else {
            2 * (self.visual_runs[run_index - 1].glyph_end_index as usize + run_index)
        }
    }

    pub fn get_line_height(&self, line_index: usize) -> f32 {
        if line_index == 0 {
            self.lines[0].total_descent
        } else {
            self.lines[line_index].total_descent - self.lines[line_index - 1].total_descent
        }
    }

    pub fn get_run_positions(&self, run_index: usize) -> &[f32] {
        let first = self.get_first_position_index(run_index);
        let count = self.get_run_glyph_count(run_index);
        &self.glyph_positions[first..first + 2 * (count + 1)]
    }

    pub fn get_run_glyph_count(&self, run_index: usize) -> usize {
        self.visual_runs[run_index].glyph_end_index as usize
            - self.get_first_glyph_index(run_index)
    }

    /// Horizontal offset of `cursor` from the start of its line. The cursor
    /// must satisfy `char_start_index <= cursor <= char_end_index` of the
    /// run.
    pub fn get_glyph_offset_in_run(&self, run_index: usize, cursor: u32) -> f32 {
        if self.visual_runs[run_index].right_to_left {
            self.get_glyph_offset_rtl(run_index, cursor)
        } else {
            self.get_glyph_offset_ltr(run_index, cursor)
        }
    }

    fn get_glyph_offset_ltr(&self, run_index: usize, cursor: u32) -> f32 {
        let first_glyph_index = self.get_first_glyph_index(run_index);
        let last_glyph_index = self.visual_runs[run_index].glyph_end_index as usize;
        let first_pos_index = self.get_first_position_index(run_index);

        let glyph_index = lower_bound(
            first_glyph_index,
            last_glyph_index - first_glyph_index,
            |index| self.char_indices[index] < cursor,
        );

        let next_char_index = if glyph_index == last_glyph_index {
            self.visual_runs[run_index].char_end_index
        } else {
            self.char_indices[glyph_index]
        };
        let cluster_diff = next_char_index.saturating_sub(cursor);

        let mut glyph_offset =
            self.glyph_positions[first_pos_index + 2 * (glyph_index - first_glyph_index)];

        // Interpolate inside a multi-byte cluster.
        if cluster_diff > 0 && glyph_index > first_glyph_index {
            let cluster_byte_count = next_char_index - self.char_indices[glyph_index - 1];
            let prev_glyph_offset =
                self.glyph_positions[first_pos_index + 2 * (glyph_index - 1 - first_glyph_index)];
            let scale =
                (cluster_byte_count - cluster_diff) as f32 / cluster_byte_count as f32;
            glyph_offset = prev_glyph_offset + (glyph_offset - prev_glyph_offset) * scale;
        }

        glyph_offset
    }

    fn get_glyph_offset_rtl(&self, run_index: usize, cursor: u32) -> f32 {
        let first_glyph_index = self.get_first_glyph_index(run_index);
        let last_glyph_index = self.visual_runs[run_index].glyph_end_index as usize;
        let first_pos_index = self.get_first_position_index(run_index);

        let glyph_index = lower_bound(
            first_glyph_index,
            last_glyph_index - first_glyph_index,
            |index| self.char_indices[index] >= cursor,
        );

        let next_char_index = if glyph_index == first_glyph_index {
            self.visual_runs[run_index].char_end_index
        } else {
            self.char_indices[glyph_index - 1]
        };
        let cluster_diff = next_char_index.saturating_sub(cursor);

        let mut glyph_offset =
            self.glyph_positions[first_pos_index + 2 * (glyph_index - first_glyph_index)];

        if cluster_diff > 0 && glyph_index < last_glyph_index {
            let cluster_byte_count = next_char_index - self.char_indices[glyph_index];
            let prev_glyph_offset =
                self.glyph_positions[first_pos_index + 2 * (glyph_index + 1 - first_glyph_index)];
            let scale =
                (cluster_byte_count - cluster_diff) as f32 / cluster_byte_count as f32;
            glyph_offset = prev_glyph_offset + (glyph_offset - prev_glyph_offset) * scale;
        }

        glyph_offset
    }

    /// Visits every line with its aligned x origin and baseline y.
    pub fn for_each_line(
        &self,
        text_width: f32,
        alignment: TextXAlignment,
        mut func: impl FnMut(usize, f32, f32),
    ) {
        if self.lines.is_empty() {
            return;
        }
        let mut line_y = self.lines[0].ascent;
        for i in 0..self.lines.len() {
            let line_x = self.get_line_x_start(i, text_width, alignment);
            func(i, line_x, line_y);
            line_y += self.get_line_height(i);
        }
    }

    /// Visits every run in visual order with its line index and line
    /// origin.
    pub fn for_each_run(
        &self,
        text_width: f32,
        alignment: TextXAlignment,
        mut func: impl FnMut(usize, usize, f32, f32),
    ) {
        let mut run_index = 0;
        self.for_each_line(text_width, alignment, |line_index, line_x, line_y| {
            while run_index < self.lines[line_index].visual_runs_end_index as usize {
                func(line_index, run_index, line_x, line_y);
                run_index += 1;
            }
        });
    }

    /// Visits every glyph with its id, logical byte index, position and
    /// owning run.
    pub fn for_each_glyph(
        &self,
        text_width: f32,
        alignment: TextXAlignment,
        mut func: impl FnMut(u16, u32, f32, f32, &VisualRun, f32, f32),
    ) {
        let mut glyph_index = 0;
        let mut glyph_pos_index = 0;
        self.for_each_run(text_width, alignment, |_, run_index, line_x, line_y| {
            let run = &self.visual_runs[run_index];
            while glyph_index < run.glyph_end_index as usize {
                func(
                    self.glyphs[glyph_index],
                    self.char_indices[glyph_index],
                    self.glyph_positions[glyph_pos_index],
                    self.glyph_positions[glyph_pos_index + 1],
                    run,
                    line_x,
                    line_y,
                );
                glyph_index += 1;
                glyph_pos_index += 2;
            }
            glyph_pos_index += 2;
        });
    }
}

/// Whether the cursor at a seam belongs to the previous run.
fn affinity_prefer_prev_run(
    at_line_break: bool,
    at_soft_line_break: bool,
    prev_run_rtl: bool,
    next_run_rtl: bool,
    affinity: CursorAffinity,
) -> bool {
    // At a soft line break the opposite affinity selects the line tail.
    (at_soft_line_break && affinity == CursorAffinity::Opposite)
        // RTL→LTR seam.
        || (!at_line_break && prev_run_rtl && !next_run_rtl && affinity == CursorAffinity::Default)
        // LTR→RTL seam.
        || (!at_line_break && !prev_run_rtl && next_run_rtl && affinity == CursorAffinity::Opposite)
}
