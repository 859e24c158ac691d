// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::utils::{advance, line_height, test_font};
use crate::editing::cursor::{CursorPosition, GraphemeBreaks};
use crate::layout::{build_layout_info, LayoutFlags, LayoutInfo};
use crate::style::{TextXAlignment, TextYAlignment};
use crate::value_runs::ValueRuns;

fn layout(text: &str, width: f32, height: f32, y_alignment: TextYAlignment) -> LayoutInfo {
    let font = test_font(16);
    let font_runs = ValueRuns::single(font, text.len() as i32);
    let mut result = LayoutInfo::default();
    build_layout_info(
        &mut result,
        text,
        &font_runs,
        width,
        height,
        y_alignment,
        LayoutFlags::default(),
    );
    result
}

#[test]
fn plain_ltr_single_line() {
    let info = layout("hello", 0., 100., TextYAlignment::Top);

    assert_eq!(info.lines.len(), 1);
    assert_eq!(info.visual_runs.len(), 1);
    assert_eq!(info.glyphs.len(), 5);
    assert_eq!(info.char_indices, vec![0, 1, 2, 3, 4]);
    assert!(!info.visual_runs[0].right_to_left);

    // Cursor after "hel" sits at the summed advances.
    let pos = info.calc_cursor_pixel_pos(200., TextXAlignment::Left, CursorPosition::new(3));
    assert_eq!(pos.x, 3. * advance(16));
    assert_eq!(pos.line_number, 0);
    assert_eq!(pos.height, line_height(16));
}

#[test]
fn bidi_mix_produces_three_visual_runs() {
    let text = "abcאבגdef";
    let info = layout(text, 0., 100., TextYAlignment::Top);

    assert_eq!(info.lines.len(), 1);
    assert_eq!(info.visual_runs.len(), 3);
    assert!(!info.visual_runs[0].right_to_left);
    assert!(info.visual_runs[1].right_to_left);
    assert!(!info.visual_runs[2].right_to_left);

    assert_eq!(info.visual_runs[0].char_start_index, 0);
    assert_eq!(info.visual_runs[0].char_end_index, 3);
    assert_eq!(info.visual_runs[1].char_start_index, 3);
    assert_eq!(info.visual_runs[1].char_end_index, 9);
    assert_eq!(info.visual_runs[2].char_start_index, 9);
    assert_eq!(info.visual_runs[2].char_end_index, 12);

    // Hebrew glyphs are stored in visual order: logical byte indices
    // decrease across the middle run.
    assert_eq!(info.char_indices[3..6], [7, 5, 3]);

    // Hit testing at the seam between `c` and the Hebrew run selects the
    // first Hebrew codepoint.
    let mut breaks = GraphemeBreaks::new(text);
    let seam_x = 3. * advance(16);
    let pos = info.find_closest_cursor_position(
        200.,
        TextXAlignment::Left,
        &mut breaks,
        0,
        seam_x,
    );
    assert_eq!(pos.position(), 3);
}

#[test]
fn wrapping_breaks_after_whitespace() {
    // Nine glyphs of width 8 fit into 72: the space after "bbbb" carries
    // the break.
    let text = "aaaa bbbb cccc";
    let info = layout(text, 72., 100., TextYAlignment::Top);

    assert_eq!(info.lines.len(), 2);
    let line0_end = info.get_line_end_position(0);
    assert_eq!(line0_end.position(), 10);

    // Second line covers "cccc".
    assert_eq!(info.get_line_start_position(1).position(), 10);
    assert_eq!(info.get_line_end_position(1).position(), 14);

    // Hit testing far right of the short second line clamps to its end.
    let mut breaks = GraphemeBreaks::new(text);
    let pos =
        info.find_closest_cursor_position(72., TextXAlignment::Left, &mut breaks, 1, 500.);
    assert_eq!(pos.position(), 14);
}

#[test]
fn forced_break_when_nothing_fits() {
    // Width fits a single glyph; every line still makes progress.
    let info = layout("abcdef", advance(16) + 1., 100., TextYAlignment::Top);
    assert_eq!(info.lines.len(), 6);
}

#[test]
fn crlf_counts_as_one_separator() {
    let text = "x\r\ny";
    let info = layout(text, 0., 100., TextYAlignment::Top);

    assert_eq!(info.lines.len(), 2);
    assert_eq!(info.visual_runs.len(), 2);

    // The first line's run ends at the byte offset of the CR and carries
    // the two separator bytes.
    assert_eq!(info.visual_runs[0].char_end_index, 1);
    assert_eq!(info.visual_runs[0].char_end_offset, 2);
    assert_eq!(info.get_line_end_position(0).position(), 1);

    assert_eq!(info.visual_runs[1].char_start_index, 3);
    assert_eq!(info.visual_runs[1].char_end_index, 4);
}

#[test]
fn empty_paragraph_occupies_a_line() {
    let info = layout("a\n\nb", 0., 100., TextYAlignment::Top);

    assert_eq!(info.lines.len(), 3);
    let middle = &info.visual_runs[1];
    assert_eq!(middle.char_start_index, 2);
    assert_eq!(middle.char_end_index, 2);
    assert_eq!(info.lines[1].width, 0.);
    assert_eq!(info.get_line_height(1), line_height(16));
}

#[test]
fn trailing_newline_stays_in_final_paragraph() {
    let info = layout("x\n", 0., 100., TextYAlignment::Top);
    assert_eq!(info.lines.len(), 1);
    assert_eq!(info.visual_runs[0].char_end_offset, 0);
    assert_eq!(info.visual_runs[0].char_end_index, 2);
}

#[test]
fn vertical_alignment_offsets_text_start() {
    let top = layout("a", 0., 100., TextYAlignment::Top);
    assert_eq!(top.text_start_y, 0.);

    let center = layout("a", 0., 100., TextYAlignment::Center);
    assert_eq!(center.text_start_y, (100. - line_height(16)) * 0.5);

    let bottom = layout("a", 0., 100., TextYAlignment::Bottom);
    assert_eq!(bottom.text_start_y, 100. - line_height(16));
}

#[test]
fn run_position_range_covers_selection_span() {
    let info = layout("hello", 0., 100., TextYAlignment::Top);
    let (min, max) = info.get_position_range_in_run(0, 1, 4);
    assert_eq!(min, advance(16));
    assert_eq!(max, 4. * advance(16));
    assert!(info.run_contains_char_range(0, 1, 4));
    assert!(!info.run_contains_char_range(0, 5, 9));
}

#[test]
fn closest_line_to_height_clamps() {
    let info = layout("a\nb\nc", 0., 100., TextYAlignment::Top);
    assert_eq!(info.get_closest_line_to_height(-5.), 0);
    assert_eq!(info.get_closest_line_to_height(1.), 0);
    assert_eq!(info.get_closest_line_to_height(line_height(16) + 1.), 1);
    assert_eq!(info.get_closest_line_to_height(1000.), 3);
}

#[test]
fn alignment_shifts_line_origin() {
    let info = layout("hello", 0., 100., TextYAlignment::Top);
    let line_width = 5. * advance(16);
    assert_eq!(info.get_line_x_start(0, 200., TextXAlignment::Left), 0.);
    assert_eq!(
        info.get_line_x_start(0, 200., TextXAlignment::Right),
        200. - line_width
    );
    assert_eq!(
        info.get_line_x_start(0, 200., TextXAlignment::Center),
        (200. - line_width) * 0.5
    );
}

#[test]
fn glyph_positions_carry_trailing_advance_per_run() {
    let info = layout("abcאבגdef", 0., 100., TextYAlignment::Top);
    // Three runs: each contributes its glyph pairs plus one trailing pair.
    let glyph_pairs = info.glyphs.len();
    assert_eq!(
        info.glyph_positions.len(),
        2 * (glyph_pairs + info.visual_runs.len())
    );

    // The trailing entry of each run equals the next run's start.
    let run0_positions = info.get_run_positions(0);
    let run1_positions = info.get_run_positions(1);
    assert_eq!(
        run0_positions[2 * info.get_run_glyph_count(0)],
        run1_positions[0]
    );
}
