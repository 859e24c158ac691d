// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Builds [`LayoutInfo`] from text and font runs.
//!
//! Each paragraph is segmented by script, resolved to single-face sub-runs
//! through the registry's fallback walk, shaped per logical run, broken
//! greedily into lines at the wrap width, and reordered per line by the
//! bidi engine into positioned visual runs.

use swash::shape::{Direction as ShapeDirection, ShapeContext};
use swash::text::Script;
use tracing::trace;

use super::itemize::{is_real_script, ScriptRunIterator};
use super::{LayoutInfo, LineInfo, VisualRun};
use crate::bidi::{BidiOptions, LineBidi, ParagraphBidi};
use crate::font::{registry, Font, SingleScriptFont};
use crate::style::TextYAlignment;
use crate::util::lower_bound;
use crate::value_runs::{iterate_run_intersections, iterate_run_intersections3, ValueRuns};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutFlags {
    /// Base paragraph direction is right-to-left.
    pub right_to_left: bool,
}

/// One shaped glyph in logical order: positions are derived later, when
/// glyphs are emitted into visual runs.
#[derive(Copy, Clone, Debug)]
struct ShapedGlyph {
    id: u16,
    char_index: u32,
    x_offset: f32,
    y_offset: f32,
    advance: f32,
}

struct LogicalRun {
    font: SingleScriptFont,
    ascent: f32,
    descent: f32,
    right_to_left: bool,
    /// Paragraph-relative byte offset one past the run.
    char_end_index: usize,
    glyph_end_index: usize,
}

struct LayoutBuildState {
    shape_context: ShapeContext,
    glyphs: Vec<ShapedGlyph>,
    /// Paragraph-relative byte positions where a line break may occur.
    break_opportunities: Vec<usize>,
}

/// Builds the layout for `text` into `result`, reusing its buffers.
///
/// `text_area_width` of zero disables line breaking. `font_runs` must cover
/// `[0, text.len())`.
pub fn build_layout_info(
    result: &mut LayoutInfo,
    text: &str,
    font_runs: &ValueRuns<Font>,
    text_area_width: f32,
    text_area_height: f32,
    y_alignment: TextYAlignment,
    flags: LayoutFlags,
) {
    result.clear();
    result.right_to_left = flags.right_to_left;

    let mut state = LayoutBuildState {
        shape_context: ShapeContext::new(),
        glyphs: Vec::with_capacity(text.len()),
        break_opportunities: Vec::new(),
    };

    let mut subset_font_runs = ValueRuns::with_capacity(font_runs.run_count());
    let mut paragraph_offset = 0_usize;

    while paragraph_offset < text.len() {
        let (content_len, separator_len) = paragraph_boundary(&text[paragraph_offset..]);
        let paragraph_length = content_len + separator_len;
        let is_last = paragraph_offset + paragraph_length == text.len();

        let last_highest_run;
        if content_len > 0 {
            // The final paragraph keeps its separator in the shaped text so
            // the cursor can sit after it.
            let byte_count = if is_last {
                paragraph_length
            } else {
                content_len
            };
            subset_font_runs.clear();
            font_runs.get_runs_subset(
                paragraph_offset as i32,
                byte_count as i32,
                &mut subset_font_runs,
            );

            let para_text = &text[paragraph_offset..paragraph_offset + byte_count];
            let para_bidi = ParagraphBidi::resolve(
                para_text,
                flags.right_to_left.then_some(true),
                BidiOptions::default(),
            );
            last_highest_run = build_sub_paragraph(
                &mut state,
                result,
                &para_bidi,
                para_text,
                paragraph_offset,
                &subset_font_runs,
                text_area_width,
            );
        } else {
            // A paragraph that is only a separator still occupies a line.
            let font = *font_runs.get_value(paragraph_offset as i32);
            let single = SingleScriptFont {
                face: registry::get_face(font),
                size: font.size,
            };
            let (ascent, descent) = font_vertical_metrics(single);
            let height = ascent + descent;

            last_highest_run = result.visual_runs.len();
            let glyph_end_index = result
                .visual_runs
                .last()
                .map(|run| run.glyph_end_index)
                .unwrap_or(0);

            // Inserted runs still need their trailing position pair.
            result.glyph_positions.push(0.);
            result.glyph_positions.push(0.);
            result.visual_runs.push(VisualRun {
                font: single,
                glyph_end_index,
                char_start_index: paragraph_offset as u32,
                char_end_index: paragraph_offset as u32,
                char_end_offset: 0,
                right_to_left: false,
            });
            result.lines.push(LineInfo {
                visual_runs_end_index: result.visual_runs.len() as u32,
                width: 0.,
                ascent,
                total_descent: result
                    .lines
                    .last()
                    .map(|line| line.total_descent + height)
                    .unwrap_or(height),
            });
        }

        result.visual_runs[last_highest_run].char_end_offset = if is_last {
            0
        } else {
            separator_len as u8
        };

        paragraph_offset += paragraph_length;
    }

    let total_height = result.lines.last().map(|l| l.total_descent).unwrap_or(0.);
    result.text_start_y = y_alignment.factor() * (text_area_height - total_height) * 0.5;

    trace!(
        lines = result.lines.len(),
        runs = result.visual_runs.len(),
        glyphs = result.glyphs.len(),
        "layout rebuilt"
    );
}

/// Length of the paragraph content at the start of `text` and of the
/// separator that terminates it. CR+LF counts as one separator.
fn paragraph_boundary(text: &str) -> (usize, usize) {
    for (idx, ch) in text.char_indices() {
        match ch {
            '\r' => {
                let sep = if text[idx + 1..].starts_with('\n') { 2 } else { 1 };
                return (idx, sep);
            }
            '\n' | '\u{2028}' | '\u{2029}' => return (idx, ch.len_utf8()),
            _ => {}
        }
    }
    (text.len(), 0)
}

/// Ascent and descent for a sized face, falling back to size-derived values
/// when the face has no loadable data.
pub(crate) fn font_vertical_metrics(font: SingleScriptFont) -> (f32, f32) {
    match registry::get_single_script_font_data(font) {
        Some(data) => (data.ascent(), data.descent()),
        None => (font.size as f32 * 0.8, font.size as f32 * 0.2),
    }
}

/// Lays out one paragraph, returning the index of the visual run with the
/// highest logical char end (the run a trailing separator attaches to).
fn build_sub_paragraph(
    state: &mut LayoutBuildState,
    result: &mut LayoutInfo,
    para_bidi: &ParagraphBidi<'_>,
    para_text: &str,
    string_offset: usize,
    font_runs: &ValueRuns<Font>,
    text_area_width: f32,
) -> usize {
    let count = para_text.len();

    let level_runs = compute_levels(para_bidi);
    let script_runs = compute_scripts(para_text);
    let sub_font_runs = compute_sub_fonts(para_text, font_runs, &script_runs);

    let mut logical_runs: Vec<LogicalRun> = Vec::new();
    iterate_run_intersections3(
        &sub_font_runs,
        &level_runs,
        &script_runs,
        |limit, font, level, _script| {
            let (ascent, descent) = font_vertical_metrics(*font);
            logical_runs.push(LogicalRun {
                font: *font,
                ascent,
                descent,
                right_to_left: level & 1 != 0,
                char_end_index: limit as usize,
                glyph_end_index: 0,
            });
        },
    );

    state.glyphs.clear();
    let mut run_start = 0;
    for i in 0..logical_runs.len() {
        let run = &logical_runs[i];
        shape_logical_run(
            state,
            run.font,
            para_text,
            run_start,
            run.char_end_index - run_start,
            script_at(&script_runs, run_start),
            run.right_to_left,
            string_offset,
        );
        let end = state.glyphs.len();
        let run = &mut logical_runs[i];
        run.glyph_end_index = end;
        run_start = run.char_end_index;
    }

    let mut highest_run = 0_usize;
    let mut highest_run_char_end = i32::MIN;

    if text_area_width == 0. {
        compute_line_visual_runs(
            state,
            result,
            &logical_runs,
            para_bidi,
            0,
            count,
            string_offset,
            &mut highest_run,
            &mut highest_run_char_end,
        );
        return highest_run;
    }

    compute_break_opportunities(para_text, &mut state.break_opportunities);

    let glyph_count = state.glyphs.len();
    let mut line_end = 0_usize;
    while line_end < count {
        let line_start = line_end;

        let mut glyph_index = lower_bound(0, glyph_count, |index| {
            (state.glyphs[index].char_index as usize) < line_start + string_offset
        });

        let mut line_width_so_far = 0_f32;
        while glyph_index < glyph_count
            && line_width_so_far + state.glyphs[glyph_index].advance <= text_area_width
        {
            line_width_so_far += state.glyphs[glyph_index].advance;
            glyph_index += 1;
        }

        // If nothing fits, force one glyph onto the line. Zero width glyphs
        // never start a line unless the paragraph is nothing but them,
        // since they attach to the end of the previous line.
        if line_width_so_far == 0. && glyph_index < glyph_count {
            glyph_index += 1;
        }

        let char_index = if glyph_index == glyph_count {
            count
        } else {
            state.glyphs[glyph_index].char_index as usize - string_offset
        };
        line_end = find_prev_line_break(&state.break_opportunities, para_text, char_index);

        // If this break is at or before the last one, take the next glyph
        // boundary that makes progress.
        while line_end <= line_start {
            if glyph_index >= glyph_count {
                line_end = count;
                break;
            }
            line_end = state.glyphs[glyph_index].char_index as usize - string_offset;
            glyph_index += 1;
        }

        compute_line_visual_runs(
            state,
            result,
            &logical_runs,
            para_bidi,
            line_start,
            line_end,
            string_offset,
            &mut highest_run,
            &mut highest_run_char_end,
        );
    }

    highest_run
}

fn compute_levels(para_bidi: &ParagraphBidi<'_>) -> ValueRuns<u8> {
    let levels = para_bidi.levels();
    let mut runs = ValueRuns::new();
    let mut last_level = levels[0];
    for (i, &level) in levels.iter().enumerate().skip(1) {
        if level != last_level {
            runs.add(i as i32, last_level);
            last_level = level;
        }
    }
    runs.add(levels.len() as i32, last_level);
    runs
}

fn compute_scripts(text: &str) -> ValueRuns<Script> {
    let mut iter = ScriptRunIterator::new(text);
    let mut runs = ValueRuns::new();
    while let Some((_, limit, script)) = iter.next_run() {
        runs.add(limit as i32, script);
    }
    runs
}

fn compute_sub_fonts(
    text: &str,
    font_runs: &ValueRuns<Font>,
    script_runs: &ValueRuns<Script>,
) -> ValueRuns<SingleScriptFont> {
    let mut result = ValueRuns::with_capacity(font_runs.run_count());
    let mut offset = 0_usize;
    iterate_run_intersections(font_runs, script_runs, |limit, font, script| {
        while offset < limit as usize {
            let sub = registry::get_sub_font(*font, text, &mut offset, limit as usize, *script);
            result.add(offset as i32, sub);
        }
    });
    result
}

fn script_at(script_runs: &ValueRuns<Script>, offset: usize) -> Script {
    let script = *script_runs.get_value(offset as i32);
    if is_real_script(script) {
        script
    } else {
        Script::Latin
    }
}

/// Shapes one logical run, appending glyphs in logical order with absolute
/// byte indices. A face without loadable data shapes to `.notdef`
/// placeholders with a deterministic advance so the layout stays
/// structurally complete.
#[allow(clippy::too_many_arguments)]
fn shape_logical_run(
    state: &mut LayoutBuildState,
    font: SingleScriptFont,
    text: &str,
    offset: usize,
    count: usize,
    script: Script,
    right_to_left: bool,
    string_offset: usize,
) {
    let piece = &text[offset..offset + count];

    if let Some(data) = registry::get_single_script_font_data(font) {
        let font_ref = data.as_font_ref();
        let direction = if right_to_left {
            ShapeDirection::RightToLeft
        } else {
            ShapeDirection::LeftToRight
        };
        let mut shaper = state
            .shape_context
            .builder(font_ref)
            .script(script)
            .size(font.size as f32)
            .direction(direction)
            .build();
        shaper.add_str(piece);

        // Clusters arrive in logical order regardless of direction; visual
        // reversal of right-to-left runs happens when runs are emitted.
        let glyphs = &mut state.glyphs;
        shaper.shape_with(|cluster| {
            let char_index = (cluster.source.start as usize + offset + string_offset) as u32;
            for glyph in cluster.glyphs {
                glyphs.push(ShapedGlyph {
                    id: glyph.id,
                    char_index,
                    x_offset: glyph.x,
                    y_offset: glyph.y,
                    advance: glyph.advance,
                });
            }
        });
    } else {
        // Placeholder shaping: one .notdef per codepoint.
        let advance = font.size as f32 * 0.5;
        for (idx, ch) in piece.char_indices() {
            state.glyphs.push(ShapedGlyph {
                id: 0,
                char_index: (idx + offset + string_offset) as u32,
                x_offset: 0.,
                y_offset: 0.,
                advance: if ch.is_control() { 0. } else { advance },
            });
        }
    }
}

/// Byte positions in `text` where a line may break: after whitespace and
/// after hyphens.
fn compute_break_opportunities(text: &str, out: &mut Vec<usize>) {
    out.clear();
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() || ch == '-' {
            out.push(idx + ch.len_utf8());
        }
    }
}

/// The break opportunity at or before `char_index`, skipping forward over
/// whitespace and controls first because they may hang in the margin.
/// Returns 0 when no suitable break exists.
fn find_prev_line_break(breaks: &[usize], text: &str, char_index: usize) -> usize {
    let mut idx = char_index;
    while idx < text.len() {
        let ch = text[idx..].chars().next().expect("index is a char boundary");
        if !ch.is_whitespace() && !ch.is_control() {
            break;
        }
        idx += ch.len_utf8();
    }
    if idx >= text.len() {
        return text.len();
    }
    // Step past the char we stopped on so a break exactly here is found.
    idx += text[idx..].chars().next().map(char::len_utf8).unwrap_or(0);

    // Largest break strictly before the stopped position's successor.
    match breaks.partition_point(|&b| b < idx) {
        0 => 0,
        n => breaks[n - 1],
    }
}

/// Appends the visual runs of one line, cutting logical runs at the bidi
/// engine's visual run boundaries.
#[allow(clippy::too_many_arguments)]
fn compute_line_visual_runs(
    state: &LayoutBuildState,
    result: &mut LayoutInfo,
    logical_runs: &[LogicalRun],
    para_bidi: &ParagraphBidi<'_>,
    line_start: usize,
    line_end: usize,
    string_offset: usize,
    highest_run: &mut usize,
    highest_run_char_end: &mut i32,
) {
    let line = LineBidi::set_line(para_bidi, line_start, line_end)
        .expect("line ranges produced by the breaker are valid");

    let mut max_ascent = 0_f32;
    let mut max_descent = 0_f32;
    let mut visual_run_last_x = 0_f32;

    for i in 0..line.run_count() {
        let (logical_start, length, right_to_left) = line.visual_run(i);
        let run_start = line_start + logical_start;
        let run_end = run_start + length - 1;

        if !right_to_left {
            let mut run = lower_bound(0, logical_runs.len(), |index| {
                logical_runs[index].char_end_index <= run_start
            });
            let mut chr_index = run_start;
            loop {
                let logical_run_end = logical_runs[run].char_end_index;
                max_ascent = max_ascent.max(logical_runs[run].ascent);
                max_descent = max_descent.max(logical_runs[run].descent);

                if run_end < logical_run_end {
                    append_visual_run(
                        state,
                        result,
                        logical_runs,
                        run,
                        chr_index + string_offset,
                        run_end + string_offset,
                        &mut visual_run_last_x,
                        highest_run,
                        highest_run_char_end,
                    );
                    break;
                }
                append_visual_run(
                    state,
                    result,
                    logical_runs,
                    run,
                    chr_index + string_offset,
                    logical_run_end - 1 + string_offset,
                    &mut visual_run_last_x,
                    highest_run,
                    highest_run_char_end,
                );
                chr_index = logical_run_end;
                run += 1;
            }
        } else {
            let mut run = lower_bound(0, logical_runs.len(), |index| {
                logical_runs[index].char_end_index <= run_end
            });
            let mut chr_index = run_end;
            loop {
                let logical_run_start = if run == 0 {
                    0
                } else {
                    logical_runs[run - 1].char_end_index
                };
                max_ascent = max_ascent.max(logical_runs[run].ascent);
                max_descent = max_descent.max(logical_runs[run].descent);

                if run_start >= logical_run_start {
                    append_visual_run(
                        state,
                        result,
                        logical_runs,
                        run,
                        run_start + string_offset,
                        chr_index + string_offset,
                        &mut visual_run_last_x,
                        highest_run,
                        highest_run_char_end,
                    );
                    break;
                }
                append_visual_run(
                    state,
                    result,
                    logical_runs,
                    run,
                    logical_run_start + string_offset,
                    chr_index + string_offset,
                    &mut visual_run_last_x,
                    highest_run,
                    highest_run_char_end,
                );
                chr_index = logical_run_start - 1;
                run -= 1;
            }
        }
    }

    let height = max_ascent + max_descent;
    let last_run_index = result.visual_runs.len() - 1;
    let width = result.glyph_positions
        [2 * (result.visual_runs[last_run_index].glyph_end_index as usize + last_run_index)];

    result.lines.push(LineInfo {
        visual_runs_end_index: result.visual_runs.len() as u32,
        width,
        ascent: max_ascent,
        total_descent: result
            .lines
            .last()
            .map(|line| line.total_descent + height)
            .unwrap_or(height),
    });
}

/// Emits the glyphs of `logical_runs[run]` covering the inclusive char
/// range `[char_start_index, char_end_index]` as one visual run.
#[allow(clippy::too_many_arguments)]
fn append_visual_run(
    state: &LayoutBuildState,
    result: &mut LayoutInfo,
    logical_runs: &[LogicalRun],
    run: usize,
    char_start_index: usize,
    char_end_index: usize,
    visual_run_last_x: &mut f32,
    highest_run: &mut usize,
    highest_run_char_end: &mut i32,
) {
    let logical_first_glyph = if run == 0 {
        0
    } else {
        logical_runs[run - 1].glyph_end_index
    };
    let logical_last_glyph = logical_runs[run].glyph_end_index;
    let right_to_left = logical_runs[run].right_to_left;

    if char_end_index as i32 > *highest_run_char_end {
        *highest_run = result.visual_runs.len();
        *highest_run_char_end = char_end_index as i32;
    }

    // Glyph subrange covering the char range; char indices are monotone in
    // logical storage.
    let first_glyph = lower_bound(
        logical_first_glyph,
        logical_last_glyph - logical_first_glyph,
        |index| (state.glyphs[index].char_index as usize) < char_start_index,
    );
    let last_glyph = lower_bound(
        first_glyph,
        logical_last_glyph - first_glyph,
        |index| state.glyphs[index].char_index as usize <= char_end_index,
    );

    if right_to_left {
        // Glyph storage is logical; a right-to-left run renders reversed.
        let mut pen_x = 0_f32;
        for i in (first_glyph..last_glyph).rev() {
            let glyph = &state.glyphs[i];
            result.glyphs.push(glyph.id);
            result.char_indices.push(glyph.char_index);
            result
                .glyph_positions
                .push(*visual_run_last_x + pen_x + glyph.x_offset);
            result.glyph_positions.push(glyph.y_offset);
            pen_x += glyph.advance;
        }
        result.glyph_positions.push(*visual_run_last_x + pen_x);
        result.glyph_positions.push(0.);
        *visual_run_last_x += pen_x;
    } else {
        let mut pen_x = 0_f32;
        for i in first_glyph..last_glyph {
            let glyph = &state.glyphs[i];
            result.glyphs.push(glyph.id);
            result.char_indices.push(glyph.char_index);
            result
                .glyph_positions
                .push(*visual_run_last_x + pen_x + glyph.x_offset);
            result.glyph_positions.push(glyph.y_offset);
            pen_x += glyph.advance;
        }
        result.glyph_positions.push(*visual_run_last_x + pen_x);
        result.glyph_positions.push(0.);
        *visual_run_last_x += pen_x;
    }

    result.visual_runs.push(VisualRun {
        font: logical_runs[run].font,
        glyph_end_index: result.glyphs.len() as u32,
        char_start_index: char_start_index as u32,
        char_end_index: char_end_index as u32 + 1,
        char_end_offset: 0,
        right_to_left,
    });
}
