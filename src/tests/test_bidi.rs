// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use unicode_bidi::BidiInfo;

use crate::bidi::{
    BidiOptions, Direction, InsertPoint, LineBidi, MarkFlags, ParagraphBidi, MAP_NOWHERE,
};

fn resolve(text: &str) -> ParagraphBidi<'_> {
    ParagraphBidi::resolve(text, None, BidiOptions::default())
}

#[test]
fn ltr_line_is_identity() {
    let para = resolve("abc def");
    let line = LineBidi::set_line(&para, 0, 7).unwrap();
    assert_eq!(line.direction(), Direction::Ltr);
    for k in 0..7 {
        assert_eq!(line.visual_index(k).unwrap(), k as i32);
        assert_eq!(line.logical_index(k).unwrap(), k as i32);
    }
}

#[test]
fn rtl_line_reflects() {
    let text = "אבג";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();
    assert_eq!(line.direction(), Direction::Rtl);
    let len = text.len();
    for k in 0..len {
        assert_eq!(line.visual_index(k).unwrap(), (len - k - 1) as i32);
    }
}

#[test]
fn mixed_line_runs_in_visual_order() {
    let text = "abcאבגdef";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();
    assert_eq!(line.direction(), Direction::Mixed);
    assert_eq!(line.run_count(), 3);

    assert_eq!(line.visual_run(0), (0, 3, false));
    assert_eq!(line.visual_run(1), (3, 6, true));
    assert_eq!(line.visual_run(2), (9, 3, false));

    // The first Hebrew codepoint reflects to the far end of its run's
    // visual span.
    assert_eq!(line.visual_index(3).unwrap(), 8);
    assert_eq!(line.visual_index(4).unwrap(), 7);
    assert_eq!(line.visual_index(9).unwrap(), 9);
}

#[test]
fn mixed_line_mapping_is_invertible() {
    let text = "abcאבג defג12";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();
    for k in 0..text.len() {
        let visual = line.visual_index(k).unwrap();
        assert!(visual >= 0);
        assert_eq!(line.logical_index(visual as usize).unwrap(), k as i32);
    }
}

#[test]
fn maps_agree_with_index_queries() {
    let text = "aאbבcג";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();
    let logical_map = line.logical_map();
    let visual_map = line.visual_map();
    assert_eq!(logical_map.len(), text.len());
    assert_eq!(visual_map.len(), line.result_length());
    for k in 0..text.len() {
        assert_eq!(logical_map[k], line.visual_index(k).unwrap());
    }
    for v in 0..line.result_length() {
        assert_eq!(visual_map[v], line.logical_index(v).unwrap());
    }
}

#[test]
fn run_order_matches_reference_reordering() {
    for text in ["abcאבגdef", "abc אבג", "אבג abc דהו"] {
        let para = resolve(text);
        let line = LineBidi::set_line(&para, 0, text.len()).unwrap();

        let info = BidiInfo::new(text, None);
        let para_info = &info.paragraphs[0];
        let (levels, runs) = info.visual_runs(para_info, 0..text.len());

        assert_eq!(line.run_count(), runs.len(), "text: {text}");
        for (i, range) in runs.iter().enumerate() {
            let (logical_start, length, rtl) = line.visual_run(i);
            assert_eq!(logical_start, range.start, "text: {text} run {i}");
            assert_eq!(length, range.len(), "text: {text} run {i}");
            assert_eq!(rtl, levels[range.start].is_rtl(), "text: {text} run {i}");
        }
    }
}

#[test]
fn trailing_whitespace_stays_at_paragraph_level() {
    let text = "abcאבג  ";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();
    assert_eq!(line.direction(), Direction::Mixed);
    // Whitespace after the Hebrew belongs to the paragraph level.
    assert_eq!(line.trailing_ws_start(), 9);
    for k in 9..text.len() {
        assert_eq!(line.level_at(k), line.para_level());
    }
    // The trailing WS run is visually last in an LTR paragraph.
    let last = line.run_count() - 1;
    assert_eq!(line.visual_run(last), (9, 2, false));
}

#[test]
fn line_ranges_are_validated() {
    let text = "abc";
    let para = resolve(text);
    assert!(LineBidi::set_line(&para, 2, 2).is_err());
    assert!(LineBidi::set_line(&para, 0, 4).is_err());
    assert!(LineBidi::set_line(&para, 2, 1).is_err());
}

#[test]
fn inserted_marks_shift_the_visual_space() {
    let text = "abc";
    let mut para = resolve(text);
    para.add_insert_point(InsertPoint {
        pos: 0,
        flag: MarkFlags::LRM_BEFORE,
    });
    let line = LineBidi::set_line(&para, 0, 3).unwrap();
    assert_eq!(line.result_length(), 4);

    // The mark occupies visual slot 0.
    assert_eq!(line.visual_index(0).unwrap(), 1);
    assert_eq!(line.logical_index(0).unwrap(), MAP_NOWHERE);
    assert_eq!(line.logical_index(1).unwrap(), 0);

    let visual_map = line.visual_map();
    assert_eq!(visual_map, vec![MAP_NOWHERE, 0, 1, 2]);
    let logical_map = line.logical_map();
    assert_eq!(logical_map, vec![1, 2, 3]);
}

#[test]
fn removed_controls_map_nowhere() {
    let text = "ab\u{200E}cd";
    let para = ParagraphBidi::resolve(text, None, BidiOptions { remove_controls: true });
    let line = LineBidi::set_line(&para, 0, text.len()).unwrap();

    // The LRM occupies three bytes; the result shrinks accordingly.
    assert_eq!(line.result_length(), text.len() - 3);

    assert_eq!(line.visual_index(2).unwrap(), MAP_NOWHERE);
    assert_eq!(line.visual_index(5).unwrap(), 2);
    assert_eq!(line.logical_index(2).unwrap(), 5);

    let logical_map = line.logical_map();
    assert_eq!(logical_map, vec![0, 1, MAP_NOWHERE, MAP_NOWHERE, MAP_NOWHERE, 2, 3]);
    let visual_map = line.visual_map();
    assert_eq!(visual_map, vec![0, 1, 5, 6]);
}

#[test]
fn sub_line_of_mixed_paragraph() {
    // A line covering only the Hebrew span of a mixed paragraph is itself
    // purely right-to-left.
    let text = "abcאבגdef";
    let para = resolve(text);
    let line = LineBidi::set_line(&para, 3, 9).unwrap();
    assert_eq!(line.direction(), Direction::Rtl);
    assert_eq!(line.len(), 6);
    assert_eq!(line.visual_index(0).unwrap(), 5);
}
