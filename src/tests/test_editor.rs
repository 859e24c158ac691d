// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::utils::{advance, editable_box, test_context};
use crate::editing::{ButtonAction, Key, KeyAction, Modifiers, MouseButton, PipelineId};

const NO_MODS: Modifiers = Modifiers {
    shift: false,
    control: false,
};
const SHIFT: Modifiers = Modifiers {
    shift: true,
    control: false,
};
const CTRL: Modifiers = Modifiers {
    shift: false,
    control: true,
};

#[test]
fn select_all_then_backspace_empties_the_buffer() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "hello", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.cursor_position().position(), 0);

    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, SHIFT);
    assert_eq!(text_box.selection_start().position(), 0);
    assert_eq!(text_box.cursor_position().position(), 5);

    text_box.handle_key_press(&mut ctx, Key::Backspace, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.text(), "");
    assert_eq!(text_box.cursor_position().position(), 0);
    assert!(!text_box.selection_start().is_valid());
}

#[test]
fn double_click_selects_the_word() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar baz", 200., 40.);
    text_box.capture_focus(&mut ctx);

    // Click in the middle of "bar" (byte 5), twice in quick succession.
    let x = 5. * advance(16) + 2.;
    let y = 8.;
    text_box.handle_mouse_button(&mut ctx, MouseButton::Primary, ButtonAction::Press, NO_MODS, x, y);
    text_box.handle_mouse_button(&mut ctx, MouseButton::Primary, ButtonAction::Release, NO_MODS, x, y);
    assert_eq!(text_box.cursor_position().position(), 5);

    text_box.handle_mouse_button(&mut ctx, MouseButton::Primary, ButtonAction::Press, NO_MODS, x, y);

    // Word motion runs to the next word start, so the selection spans the
    // word plus its trailing space.
    assert_eq!(text_box.selection_start().position(), 4);
    assert_eq!(text_box.cursor_position().position(), 8);
}

#[test]
fn triple_click_selects_the_line() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar", 200., 40.);
    text_box.capture_focus(&mut ctx);

    let x = 5. * advance(16) + 2.;
    let y = 8.;
    for _ in 0..3 {
        text_box.handle_mouse_button(
            &mut ctx,
            MouseButton::Primary,
            ButtonAction::Press,
            NO_MODS,
            x,
            y,
        );
        text_box.handle_mouse_button(
            &mut ctx,
            MouseButton::Primary,
            ButtonAction::Release,
            NO_MODS,
            x,
            y,
        );
    }

    assert_eq!(text_box.selection_start().position(), 0);
    assert_eq!(text_box.cursor_position().position(), 7);
}

#[test]
fn word_navigation_lands_on_word_boundaries() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar baz", 200., 40.);
    text_box.capture_focus(&mut ctx);
    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, NO_MODS);

    text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 4);
    text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 8);
    text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 11);
    // Repeated next-word terminates at the end of the text.
    text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 11);

    text_box.handle_key_press(&mut ctx, Key::Left, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 8);
    text_box.handle_key_press(&mut ctx, Key::Left, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 4);
    text_box.handle_key_press(&mut ctx, Key::Left, KeyAction::Press, CTRL);
    assert_eq!(text_box.cursor_position().position(), 0);
}

#[test]
fn insert_then_remove_round_trips() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "abcdef", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.insert_text(&mut ctx, "XY", 2);
    assert_eq!(text_box.text(), "abXYcdef");
    text_box.remove_text(&mut ctx, 2, 4);
    assert_eq!(text_box.text(), "abcdef");
}

#[test]
fn text_input_replaces_the_selection() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "hello", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, SHIFT);
    text_box.handle_text_input(&mut ctx, 'x');

    assert_eq!(text_box.text(), "x");
    assert_eq!(text_box.cursor_position().position(), 1);
}

#[test]
fn multibyte_input_advances_by_encoded_length() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.handle_text_input(&mut ctx, 'é');
    assert_eq!(text_box.text(), "é");
    assert_eq!(text_box.cursor_position().position(), 2);
}

#[test]
fn clipboard_copy_and_paste() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar", 200., 40.);
    text_box.capture_focus(&mut ctx);

    // Select "foo" and copy it.
    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, NO_MODS);
    for _ in 0..3 {
        text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, SHIFT);
    }
    text_box.handle_key_press(&mut ctx, Key::C, KeyAction::Press, CTRL);

    // Paste at the end.
    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::V, KeyAction::Press, CTRL);

    assert_eq!(text_box.text(), "foo barfoo");
}

#[test]
fn cut_removes_the_selection() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, NO_MODS);
    for _ in 0..4 {
        text_box.handle_key_press(&mut ctx, Key::Right, KeyAction::Press, SHIFT);
    }
    text_box.handle_key_press(&mut ctx, Key::X, KeyAction::Press, CTRL);
    assert_eq!(text_box.text(), "bar");

    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::V, KeyAction::Press, CTRL);
    assert_eq!(text_box.text(), "barfoo ");
}

#[test]
fn enter_inserts_newline_only_in_multi_line_boxes() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "ab", 200., 80.);
    text_box.set_multi_line(true);
    text_box.capture_focus(&mut ctx);

    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::Enter, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.text(), "ab\n");
    assert!(text_box.is_focused(&ctx));

    let mut single = editable_box(&mut ctx, "cd", 200., 40.);
    single.capture_focus(&mut ctx);
    single.handle_key_press(&mut ctx, Key::Enter, KeyAction::Press, NO_MODS);
    assert_eq!(single.text(), "cd");
    assert!(!single.is_focused(&ctx));
}

#[test]
fn vertical_motion_preserves_the_column() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "aaaa\nbb\ncccc", 200., 80.);
    text_box.set_multi_line(true);
    text_box.capture_focus(&mut ctx);

    // Place the cursor at the end of the first line (column 4).
    text_box.handle_key_press(&mut ctx, Key::Home, KeyAction::Press, CTRL);
    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.cursor_position().position(), 4);

    // Down onto the short line clamps to its end.
    text_box.handle_key_press(&mut ctx, Key::Down, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.cursor_position().position(), 7);

    // Down again: the remembered x from the latest layout run applies.
    text_box.handle_key_press(&mut ctx, Key::Down, KeyAction::Press, NO_MODS);
    let pos = text_box.cursor_position().position();
    assert!((10..=12).contains(&pos), "landed at {pos}");
}

#[test]
fn clicking_outside_releases_focus() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "hello", 100., 40.);
    text_box.capture_focus(&mut ctx);
    assert!(text_box.is_focused(&ctx));

    text_box.handle_mouse_button(
        &mut ctx,
        MouseButton::Primary,
        ButtonAction::Press,
        NO_MODS,
        500.,
        500.,
    );
    assert!(!text_box.is_focused(&ctx));
    assert!(!text_box.selection_start().is_valid());
}

#[test]
fn drag_extends_the_selection() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "foo bar baz", 200., 40.);

    let y = 8.;
    text_box.handle_mouse_button(
        &mut ctx,
        MouseButton::Primary,
        ButtonAction::Press,
        NO_MODS,
        0.,
        y,
    );
    assert_eq!(text_box.cursor_position().position(), 0);

    text_box.handle_mouse_move(&mut ctx, 4. * advance(16), y);
    assert_eq!(text_box.selection_start().position(), 0);
    assert_eq!(text_box.cursor_position().position(), 4);

    // Selection renders as a highlight rect before any glyph rects.
    assert!(text_box
        .rects()
        .iter()
        .any(|rect| rect.pipeline == PipelineId::Rect && rect.width > 0.));
}

#[test]
fn render_emits_cursor_rect_when_focused() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "hi", 200., 40.);
    text_box.capture_focus(&mut ctx);
    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);

    let mut rects = Vec::new();
    text_box.render(&ctx, |rect| rects.push(rect));
    let cursor_rect = rects.last().expect("cursor rect present");
    assert_eq!(cursor_rect.width, 1.);
    assert_eq!(cursor_rect.x, 2. * advance(16));
    assert_eq!(cursor_rect.height, 16.);
}

#[test]
fn backspace_removes_one_character() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "héllo", 200., 40.);
    text_box.capture_focus(&mut ctx);
    text_box.handle_key_press(&mut ctx, Key::End, KeyAction::Press, NO_MODS);

    text_box.handle_key_press(&mut ctx, Key::Backspace, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.text(), "héll");

    // The two-byte é comes off in one step.
    text_box.handle_key_press(&mut ctx, Key::Backspace, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::Backspace, KeyAction::Press, NO_MODS);
    text_box.handle_key_press(&mut ctx, Key::Backspace, KeyAction::Press, NO_MODS);
    assert_eq!(text_box.text(), "h");
}

#[test]
fn ctrl_a_selects_everything() {
    let mut ctx = test_context();
    let mut text_box = editable_box(&mut ctx, "hello", 200., 40.);
    text_box.capture_focus(&mut ctx);

    text_box.handle_key_press(&mut ctx, Key::A, KeyAction::Press, CTRL);
    assert_eq!(text_box.selection_start().position(), 0);
    assert_eq!(text_box.cursor_position().position(), 5);
}
