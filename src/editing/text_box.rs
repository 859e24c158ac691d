// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interactive text box: owns the text buffer and formatting flags,
//! dispatches input events, maintains the caret and selection, and emits
//! draw rectangles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::cursor::{char_at, is_line_break, CursorPosition, GraphemeBreaks};
use super::{
    ButtonAction, Clipboard, GlyphAtlas, Key, KeyAction, Modifiers, MouseButton, PipelineId,
    TextRect, TextureId,
};
use crate::font::{registry, Font, SingleScriptFont};
use crate::layout::{build_layout_info, CursorPositionResult, LayoutFlags, LayoutInfo};
use crate::markup::{
    make_default_formatting_runs, parse_inline_formatting, FormattingEvent, FormattingIterator,
    FormattingRuns,
};
use crate::style::{Color, StrokeState, TextXAlignment, TextYAlignment};

const DOUBLE_CLICK_TIME: f64 = 0.5;

const UV_FULL: [f32; 4] = [0., 0., 1., 1.];

static NEXT_TEXT_BOX_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a text box, used as a weak focus reference: a destroyed
/// box's id simply never matches again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextBoxId(u64);

enum PostLayoutCursorMove {
    LineStart,
    LineEnd,
    LineAbove,
    LineBelow,
    MousePosition { x: f32, y: f32 },
}

struct PostLayoutOp {
    move_type: PostLayoutCursorMove,
    selection_mode: bool,
}

/// Shared editor state passed through event dispatch: the focused box, the
/// click chain, the cursor's pixel position, and the platform capabilities.
pub struct EditContext {
    focused: Option<TextBoxId>,
    breaks: Option<GraphemeBreaks>,
    cursor_pos: CursorPositionResult,
    mouse_down: bool,
    last_click_time: Option<Instant>,
    click_count: u32,
    last_click_pos: CursorPosition,
    clipboard: Box<dyn Clipboard>,
    atlas: Box<dyn GlyphAtlas>,
}

impl EditContext {
    pub fn new(clipboard: Box<dyn Clipboard>, atlas: Box<dyn GlyphAtlas>) -> Self {
        Self {
            focused: None,
            breaks: None,
            cursor_pos: CursorPositionResult::default(),
            mouse_down: false,
            last_click_time: None,
            click_count: 0,
            last_click_pos: CursorPosition::INVALID,
            clipboard,
            atlas,
        }
    }

    pub fn focused_text_box(&self) -> Option<TextBoxId> {
        self.focused
    }

    /// Pixel position of the cursor in the focused box, from the most
    /// recent layout.
    pub fn cursor_pixel_pos(&self) -> CursorPositionResult {
        self.cursor_pos
    }
}

pub struct TextBox {
    id: TextBoxId,
    text: String,
    content_text: String,
    font: Option<Font>,
    text_color: Color,
    position: [f32; 2],
    size: [f32; 2],
    x_alignment: TextXAlignment,
    y_alignment: TextYAlignment,
    text_wrapped: bool,
    rich_text: bool,
    editable: bool,
    selectable: bool,
    multi_line: bool,
    cursor_position: CursorPosition,
    selection_start: CursorPosition,
    layout: LayoutInfo,
    text_rects: Vec<TextRect>,
}

impl Default for TextBox {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBox {
    pub fn new() -> Self {
        Self {
            id: TextBoxId(NEXT_TEXT_BOX_ID.fetch_add(1, Ordering::Relaxed)),
            text: String::new(),
            content_text: String::new(),
            font: None,
            text_color: Color::BLACK,
            position: [0., 0.],
            size: [0., 0.],
            x_alignment: TextXAlignment::Left,
            y_alignment: TextYAlignment::Top,
            text_wrapped: false,
            rich_text: false,
            editable: false,
            selectable: false,
            multi_line: false,
            cursor_position: CursorPosition::default(),
            selection_start: CursorPosition::INVALID,
            layout: LayoutInfo::default(),
            text_rects: Vec::new(),
        }
    }

    pub fn id(&self) -> TextBoxId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content_text(&self) -> &str {
        &self.content_text
    }

    pub fn cursor_position(&self) -> CursorPosition {
        self.cursor_position
    }

    pub fn selection_start(&self) -> CursorPosition {
        self.selection_start
    }

    pub fn layout(&self) -> &LayoutInfo {
        &self.layout
    }

    pub fn rects(&self) -> &[TextRect] {
        &self.text_rects
    }

    pub fn is_focused(&self, ctx: &EditContext) -> bool {
        ctx.focused == Some(self.id)
    }

    pub fn is_mouse_inside(&self, x: f32, y: f32) -> bool {
        x >= self.position[0]
            && y >= self.position[1]
            && x - self.position[0] <= self.size[0]
            && y - self.position[1] <= self.size[1]
    }

    // --- Event handlers ---

    pub fn handle_mouse_button(
        &mut self,
        ctx: &mut EditContext,
        button: MouseButton,
        action: ButtonAction,
        mods: Modifiers,
        x: f32,
        y: f32,
    ) -> bool {
        if button != MouseButton::Primary {
            return false;
        }

        let mouse_inside = self.is_mouse_inside(x, y);

        match action {
            ButtonAction::Press => {
                if self.is_focused(ctx) {
                    if mouse_inside {
                        self.cursor_move_to_mouse(
                            ctx,
                            x - self.position[0],
                            y - self.position[1],
                            mods.shift,
                        );

                        let now = Instant::now();
                        let chained = self.cursor_position == ctx.last_click_pos
                            && ctx
                                .last_click_time
                                .map(|last| {
                                    now.duration_since(last).as_secs_f64() <= DOUBLE_CLICK_TIME
                                })
                                .unwrap_or(false);
                        if chained {
                            ctx.click_count += 1;
                        } else {
                            ctx.click_count = 0;
                        }
                        ctx.last_click_time = Some(now);
                        ctx.last_click_pos = self.cursor_position;

                        match ctx.click_count % 4 {
                            // Highlight the current word.
                            1 => {
                                self.cursor_move_to_prev_word(ctx, false);
                                self.cursor_move_to_next_word(ctx, true);
                            }
                            // Highlight the current line.
                            2 => {
                                self.cursor_move_to_line_start(ctx, false);
                                self.cursor_move_to_line_end(ctx, true);
                            }
                            // Highlight the whole text.
                            3 => {
                                self.cursor_move_to_text_start(ctx, false);
                                self.cursor_move_to_text_end(ctx, true);
                            }
                            _ => {}
                        }
                    } else {
                        self.release_focus(ctx);
                    }
                } else {
                    self.capture_focus(ctx);
                    self.cursor_move_to_mouse(
                        ctx,
                        x - self.position[0],
                        y - self.position[1],
                        mods.shift,
                    );
                }

                ctx.mouse_down = true;
                mouse_inside
            }
            ButtonAction::Release => {
                if self.is_focused(ctx) {
                    ctx.mouse_down = false;
                }
                false
            }
        }
    }

    pub fn handle_key_press(
        &mut self,
        ctx: &mut EditContext,
        key: Key,
        action: KeyAction,
        mods: Modifiers,
    ) -> bool {
        if action == KeyAction::Release {
            return false;
        }
        if !self.is_focused(ctx) {
            return false;
        }

        let selection_mode = mods.shift;
        match key {
            Key::Up => self.cursor_move_to_prev_line(ctx, selection_mode),
            Key::Down => self.cursor_move_to_next_line(ctx, selection_mode),
            Key::Left => {
                if mods.control {
                    self.cursor_move_to_prev_word(ctx, selection_mode);
                } else {
                    self.cursor_move_to_prev_character(ctx, selection_mode);
                }
            }
            Key::Right => {
                if mods.control {
                    self.cursor_move_to_next_word(ctx, selection_mode);
                } else {
                    self.cursor_move_to_next_character(ctx, selection_mode);
                }
            }
            Key::Home => {
                if mods.control {
                    self.cursor_move_to_text_start(ctx, selection_mode);
                } else {
                    self.cursor_move_to_line_start(ctx, selection_mode);
                }
            }
            Key::End => {
                if mods.control {
                    self.cursor_move_to_text_end(ctx, selection_mode);
                } else {
                    self.cursor_move_to_line_end(ctx, selection_mode);
                }
            }
            Key::Backspace => self.handle_key_backspace(ctx, mods.control),
            Key::Delete => self.handle_key_delete(ctx, mods.control),
            Key::Enter => self.handle_key_enter(ctx),
            Key::X => {
                if mods.control {
                    self.clipboard_cut_text(ctx);
                }
            }
            Key::C => {
                if mods.control {
                    self.clipboard_copy_text(ctx);
                }
            }
            Key::V => {
                if mods.control {
                    self.clipboard_paste_text(ctx);
                }
            }
            Key::A => {
                if mods.control {
                    self.cursor_move_to_text_start(ctx, false);
                    self.cursor_move_to_text_end(ctx, true);
                }
            }
        }
        true
    }

    pub fn handle_mouse_move(&mut self, ctx: &mut EditContext, x: f32, y: f32) -> bool {
        if self.is_focused(ctx) && ctx.mouse_down {
            self.cursor_move_to_mouse(ctx, x - self.position[0], y - self.position[1], true);
        }
        false
    }

    pub fn handle_text_input(&mut self, ctx: &mut EditContext, codepoint: char) -> bool {
        if !self.is_focused(ctx) || !self.editable {
            return false;
        }
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(ctx);
        }
        let mut buffer = [0_u8; 4];
        let encoded = codepoint.encode_utf8(&mut buffer).to_owned();
        let start = self.cursor_position.position();
        self.insert_text(ctx, &encoded, start);
        true
    }

    // --- Focus ---

    pub fn capture_focus(&mut self, ctx: &mut EditContext) {
        if self.is_focused(ctx) {
            return;
        }
        ctx.focused = Some(self.id);
        ctx.mouse_down = false;
        ctx.click_count = 0;
        ctx.last_click_pos = CursorPosition::INVALID;
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    /// Must be called before the box is dropped if it might hold focus.
    pub fn release_focus(&mut self, ctx: &mut EditContext) {
        if !self.is_focused(ctx) {
            return;
        }
        ctx.focused = None;
        ctx.breaks = None;
        ctx.mouse_down = false;
        ctx.click_count = 0;
        ctx.last_click_pos = CursorPosition::INVALID;
        self.selection_start = CursorPosition::INVALID;
        self.recalc_text(ctx);
    }

    // --- Rendering ---

    /// Emits this box's rectangles, positioned absolutely, followed by the
    /// cursor rectangle when focused.
    pub fn render(&self, ctx: &EditContext, mut sink: impl FnMut(TextRect)) {
        for rect in &self.text_rects {
            let mut rect = *rect;
            rect.x += self.position[0];
            rect.y += self.position[1];
            sink(rect);
        }

        if self.is_focused(ctx) {
            sink(TextRect {
                x: self.position[0] + ctx.cursor_pos.x,
                y: self.position[1] + ctx.cursor_pos.y,
                width: 1.,
                height: ctx.cursor_pos.height,
                tex_coords: UV_FULL,
                texture: Some(ctx.atlas.default_texture()),
                color: Color::BLACK,
                pipeline: PipelineId::Rect,
            });
        }
    }

    // --- Cursor motion ---

    fn should_focused_use_rich_text(&self) -> bool {
        // Editable boxes show source text while focused so cursor offsets
        // match the buffer being edited.
        self.rich_text && !self.editable
    }

    fn cursor_move_to_next_character(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        if let Some(breaks) = ctx.breaks.as_ref() {
            if let Some(next) = breaks.following(self.cursor_position.position() as usize) {
                self.set_cursor_position_internal(
                    CursorPosition::new(next as u32),
                    selection_mode,
                );
            }
        }
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_prev_character(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        if let Some(breaks) = ctx.breaks.as_ref() {
            if let Some(prev) = breaks.preceding(self.cursor_position.position() as usize) {
                self.set_cursor_position_internal(
                    CursorPosition::new(prev as u32),
                    selection_mode,
                );
            }
        }
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_next_word(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        if let Some(breaks) = ctx.breaks.as_ref() {
            let mut last_whitespace = char_at(breaks.text(), self.cursor_position.position() as usize)
                .map(char::is_whitespace)
                .unwrap_or(false);

            while let Some(next) = breaks.following(self.cursor_position.position() as usize) {
                self.set_cursor_position_internal(CursorPosition::new(next as u32), selection_mode);
                let ch = char_at(breaks.text(), next);
                let whitespace = ch.map(char::is_whitespace).unwrap_or(false);
                if (!whitespace && last_whitespace) || ch.map(is_line_break).unwrap_or(false) {
                    break;
                }
                last_whitespace = whitespace;
            }
        }
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_prev_word(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        if let Some(breaks) = ctx.breaks.as_ref() {
            let mut last_whitespace = true;

            while let Some(prev) = breaks.preceding(self.cursor_position.position() as usize) {
                let ch = char_at(breaks.text(), prev).unwrap_or(' ');
                let whitespace = ch.is_whitespace();
                if whitespace && !last_whitespace {
                    break;
                }
                self.set_cursor_position_internal(CursorPosition::new(prev as u32), selection_mode);
                if is_line_break(ch) {
                    break;
                }
                last_whitespace = whitespace;
            }
        }
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_next_line(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        let op = PostLayoutOp {
            move_type: PostLayoutCursorMove::LineBelow,
            selection_mode,
        };
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), Some(&op));
    }

    fn cursor_move_to_prev_line(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        let op = PostLayoutOp {
            move_type: PostLayoutCursorMove::LineAbove,
            selection_mode,
        };
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), Some(&op));
    }

    fn cursor_move_to_line_start(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        let op = PostLayoutOp {
            move_type: PostLayoutCursorMove::LineStart,
            selection_mode,
        };
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), Some(&op));
    }

    fn cursor_move_to_line_end(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        let op = PostLayoutOp {
            move_type: PostLayoutCursorMove::LineEnd,
            selection_mode,
        };
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), Some(&op));
    }

    fn cursor_move_to_text_start(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        self.set_cursor_position_internal(CursorPosition::default(), selection_mode);
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_text_end(&mut self, ctx: &mut EditContext, selection_mode: bool) {
        let end = ctx
            .breaks
            .as_ref()
            .map(|breaks| breaks.text().len())
            .unwrap_or(self.text.len());
        self.set_cursor_position_internal(CursorPosition::new(end as u32), selection_mode);
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), None);
    }

    fn cursor_move_to_mouse(&mut self, ctx: &mut EditContext, x: f32, y: f32, selection_mode: bool) {
        let op = PostLayoutOp {
            move_type: PostLayoutCursorMove::MousePosition { x, y },
            selection_mode,
        };
        self.recalc_text_internal(ctx, self.should_focused_use_rich_text(), Some(&op));
    }

    fn set_cursor_position_internal(&mut self, pos: CursorPosition, selection_mode: bool) {
        if selection_mode {
            if !self.selection_start.is_valid() {
                self.selection_start = self.cursor_position;
            }
            self.cursor_position = pos;
        } else {
            self.selection_start = CursorPosition::INVALID;
            self.cursor_position = pos;
        }
    }

    // --- Editing ---

    fn handle_key_backspace(&mut self, ctx: &mut EditContext, ctrl: bool) {
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(ctx);
        } else if self.cursor_position.position() > 0 {
            let end_pos = self.cursor_position.position();
            if ctrl {
                self.cursor_move_to_prev_word(ctx, false);
            } else {
                self.cursor_move_to_prev_character(ctx, false);
            }
            let start_pos = self.cursor_position.position();
            self.remove_text(ctx, start_pos, end_pos);
        }
    }

    fn handle_key_delete(&mut self, ctx: &mut EditContext, ctrl: bool) {
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(ctx);
        } else if (self.cursor_position.position() as usize) < self.text.len() {
            let start_pos = self.cursor_position;
            if ctrl {
                self.cursor_move_to_next_word(ctx, false);
            } else {
                self.cursor_move_to_next_character(ctx, false);
            }
            let end_pos = self.cursor_position.position();
            self.cursor_position = start_pos;
            self.remove_text(ctx, start_pos.position(), end_pos);
        }
    }

    fn handle_key_enter(&mut self, ctx: &mut EditContext) {
        if self.multi_line {
            self.remove_highlighted_text(ctx);
            let start = self.cursor_position.position();
            self.insert_text(ctx, "\n", start);
        } else {
            self.release_focus(ctx);
        }
    }

    fn clipboard_cut_text(&mut self, ctx: &mut EditContext) {
        if !self.editable {
            return;
        }
        self.clipboard_copy_text(ctx);
        self.remove_highlighted_text(ctx);
    }

    fn clipboard_copy_text(&mut self, ctx: &mut EditContext) {
        if !self.selection_start.is_valid() {
            return;
        }
        let mut start = self.selection_start.position() as usize;
        let mut end = self.cursor_position.position() as usize;
        if start == end {
            return;
        }
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        ctx.clipboard.set_string(&self.text[start..end]);
    }

    fn clipboard_paste_text(&mut self, ctx: &mut EditContext) {
        if !self.editable {
            return;
        }
        self.remove_highlighted_text(ctx);
        let pasted = ctx.clipboard.get_string();
        let start = self.cursor_position.position();
        self.insert_text(ctx, &pasted, start);
    }

    /// Inserts at `start_index` and advances the cursor by the inserted
    /// byte length.
    pub fn insert_text(&mut self, ctx: &mut EditContext, text: &str, start_index: u32) {
        self.cursor_position =
            CursorPosition::new(self.cursor_position.position() + text.len() as u32);
        let start_index = (start_index as usize).min(self.text.len());
        let mut new_text = String::with_capacity(self.text.len() + text.len());
        new_text.push_str(&self.text[..start_index]);
        new_text.push_str(text);
        new_text.push_str(&self.text[start_index..]);
        self.set_text(ctx, new_text);
    }

    pub fn remove_text(&mut self, ctx: &mut EditContext, start_index: u32, end_index: u32) {
        let start = (start_index as usize).min(self.text.len());
        let end = (end_index as usize).min(self.text.len());
        let mut new_text = String::with_capacity(self.text.len() - (end - start));
        new_text.push_str(&self.text[..start]);
        new_text.push_str(&self.text[end..]);
        self.set_text(ctx, new_text);
    }

    fn remove_highlighted_text(&mut self, ctx: &mut EditContext) {
        let mut start = self.selection_start;
        let mut end = self.cursor_position;
        if !start.is_valid() || start == end {
            return;
        }
        if start.position() > end.position() {
            std::mem::swap(&mut start, &mut end);
        }
        self.cursor_position = start;
        self.selection_start = CursorPosition::INVALID;
        self.remove_text(ctx, start.position(), end.position());
    }

    // --- Layout and rect generation ---

    pub fn recalc_text(&mut self, ctx: &mut EditContext) {
        let rich = if self.is_focused(ctx) {
            self.should_focused_use_rich_text()
        } else {
            self.rich_text
        };
        self.recalc_text_internal(ctx, rich, None);
    }

    fn recalc_text_internal(
        &mut self,
        ctx: &mut EditContext,
        rich_text: bool,
        post_layout_op: Option<&PostLayoutOp>,
    ) {
        self.text_rects.clear();

        // The cached cursor pixel state survives until the post-layout move
        // has consumed it: vertical motion needs the previous line number
        // and x column.
        let focused = self.is_focused(ctx);

        let Some(font) = self.font else {
            if focused {
                ctx.cursor_pos = CursorPositionResult::default();
            }
            return;
        };

        let stroke = StrokeState::default();
        let runs = if rich_text {
            parse_inline_formatting(&self.text, font, self.text_color, stroke)
        } else {
            make_default_formatting_runs(&self.text, font, self.text_color, stroke)
        };
        self.content_text = runs.content_text.clone();

        if self.content_text.is_empty() {
            if focused {
                ctx.breaks = Some(GraphemeBreaks::new(""));
                let single = SingleScriptFont {
                    face: registry::get_face(font),
                    size: font.size,
                };
                let (ascent, descent) = crate::layout::font_vertical_metrics(single);
                ctx.cursor_pos = CursorPositionResult::default();
                ctx.cursor_pos.height = ascent + descent;
            }
            return;
        }

        let display_text = if rich_text {
            runs.content_text.clone()
        } else {
            self.text.clone()
        };
        if focused {
            ctx.breaks = Some(GraphemeBreaks::new(&display_text));
        }

        self.create_text_rects(ctx, &runs, &display_text, post_layout_op);
    }

    fn create_text_rects(
        &mut self,
        ctx: &mut EditContext,
        runs: &FormattingRuns,
        text: &str,
        post_layout_op: Option<&PostLayoutOp>,
    ) {
        build_layout_info(
            &mut self.layout,
            text,
            &runs.font_runs,
            if self.text_wrapped { self.size[0] } else { 0. },
            self.size[1],
            self.y_alignment,
            LayoutFlags::default(),
        );

        let focused = self.is_focused(ctx);

        if let Some(op) = post_layout_op {
            if let Some(breaks) = ctx.breaks.as_ref() {
                let new_cursor = apply_cursor_move(
                    &self.layout,
                    self.size[0],
                    self.x_alignment,
                    op,
                    self.cursor_position,
                    &ctx.cursor_pos,
                    breaks,
                );
                self.set_cursor_position_internal(new_cursor, op.selection_mode);
            }
        }

        if focused {
            ctx.cursor_pos = self.layout.calc_cursor_pixel_pos(
                self.size[0],
                self.x_alignment,
                self.cursor_position,
            );
        }

        let has_highlight = self.selection_start.is_valid();
        let mut selection_start = self.selection_start.position();
        let mut selection_end = self.cursor_position.position();
        if selection_start > selection_end {
            std::mem::swap(&mut selection_start, &mut selection_end);
        }

        let layout = &self.layout;
        let rects = &mut self.text_rects;
        let atlas = ctx.atlas.as_mut();
        let default_texture = atlas.default_texture();
        let text_width = self.size[0];
        let alignment = self.x_alignment;

        // Highlight ranges go in a separate pass to keep them from clipping
        // across runs.
        if has_highlight {
            layout.for_each_run(text_width, alignment, |line_index, run_index, line_x, line_y| {
                if layout.run_contains_char_range(run_index, selection_start, selection_end) {
                    let (min_pos, max_pos) =
                        layout.get_position_range_in_run(run_index, selection_start, selection_end);
                    emit_rect(
                        rects,
                        line_x + min_pos,
                        layout.text_start_y + line_y - layout.lines[line_index].ascent,
                        max_pos - min_pos,
                        layout.get_line_height(line_index),
                        UV_FULL,
                        Some(default_texture),
                        Color::from_rgb8(0, 120, 215),
                        PipelineId::Rect,
                        None,
                    );
                }
            });
        }

        let mut glyph_index = 0_usize;
        let mut glyph_pos_index = 0_usize;

        layout.for_each_run(text_width, alignment, |_, run_index, line_x, line_y| {
            let run = &layout.visual_runs[run_index];

            let run_has_highlight = has_highlight
                && layout.run_contains_char_range(run_index, selection_start, selection_end);
            let clip = if run_has_highlight {
                Some(layout.get_position_range_in_run(run_index, selection_start, selection_end))
            } else {
                None
            };

            let deco = decoration_metrics(run.font);
            let mut iter = FormattingIterator::new(
                runs,
                if run.right_to_left {
                    run.char_end_index
                } else {
                    run.char_start_index
                },
            );
            let mut underline_start_pos = layout.glyph_positions[glyph_pos_index];
            let mut strikethrough_start_pos = underline_start_pos;

            while glyph_index < run.glyph_end_index as usize {
                let px = layout.glyph_positions[glyph_pos_index];
                let py = layout.glyph_positions[glyph_pos_index + 1];
                let glyph_id = layout.glyphs[glyph_index];
                let event = iter.advance_to(layout.char_indices[glyph_index]);
                let stroke = iter.stroke();

                if stroke.color.a > 0. {
                    if let Some(info) =
                        atlas.stroke_info(run.font, glyph_id, stroke.thickness, stroke.joins)
                    {
                        emit_rect(
                            rects,
                            line_x + px + info.offset[0],
                            layout.text_start_y + line_y + py + info.offset[1],
                            info.size[0],
                            info.size[1],
                            info.tex_coords,
                            Some(info.texture),
                            stroke.color,
                            info.pipeline,
                            None,
                        );
                    }
                }

                if let Some(info) = atlas.glyph_info(run.font, glyph_id) {
                    let color = if info.has_color {
                        Color::WHITE
                    } else {
                        iter.color()
                    };
                    emit_rect(
                        rects,
                        line_x + px + info.offset[0],
                        layout.text_start_y + line_y + py + info.offset[1],
                        info.size[0],
                        info.size[1],
                        info.tex_coords,
                        Some(info.texture),
                        color,
                        info.pipeline,
                        clip,
                    );
                }

                if event.contains(FormattingEvent::UNDERLINE_END) {
                    emit_rect(
                        rects,
                        line_x + underline_start_pos,
                        layout.text_start_y + line_y + deco.underline_position,
                        px - underline_start_pos,
                        deco.underline_thickness + 0.5,
                        UV_FULL,
                        Some(default_texture),
                        iter.prev_color(),
                        PipelineId::Rect,
                        clip,
                    );
                }
                if event.contains(FormattingEvent::UNDERLINE_BEGIN) {
                    underline_start_pos = px;
                }

                if event.contains(FormattingEvent::STRIKETHROUGH_END) {
                    emit_rect(
                        rects,
                        line_x + strikethrough_start_pos,
                        layout.text_start_y + line_y + deco.strikethrough_position,
                        px - strikethrough_start_pos,
                        deco.strikethrough_thickness + 0.5,
                        UV_FULL,
                        Some(default_texture),
                        iter.prev_color(),
                        PipelineId::Rect,
                        clip,
                    );
                }
                if event.contains(FormattingEvent::STRIKETHROUGH_BEGIN) {
                    strikethrough_start_pos = px;
                }

                glyph_index += 1;
                glyph_pos_index += 2;
            }

            // Flush decorations still open at the end of the run.
            let run_end_pos = layout.glyph_positions[glyph_pos_index];
            if iter.has_strikethrough() {
                emit_rect(
                    rects,
                    line_x + strikethrough_start_pos,
                    layout.text_start_y + line_y + deco.strikethrough_position,
                    run_end_pos - strikethrough_start_pos,
                    deco.strikethrough_thickness + 0.5,
                    UV_FULL,
                    Some(default_texture),
                    iter.color(),
                    PipelineId::Rect,
                    clip,
                );
            }
            if iter.has_underline() {
                emit_rect(
                    rects,
                    line_x + underline_start_pos,
                    layout.text_start_y + line_y + deco.underline_position,
                    run_end_pos - underline_start_pos,
                    deco.underline_thickness + 0.5,
                    UV_FULL,
                    Some(default_texture),
                    iter.color(),
                    PipelineId::Rect,
                    clip,
                );
            }

            glyph_pos_index += 2;
        });
    }

    // --- Setters ---

    pub fn set_text(&mut self, ctx: &mut EditContext, text: String) {
        self.text = text;
        self.recalc_text(ctx);
    }

    pub fn set_font(&mut self, ctx: &mut EditContext, font: Font) {
        self.font = Some(font);
        self.recalc_text(ctx);
    }

    pub fn set_text_color(&mut self, ctx: &mut EditContext, color: Color) {
        self.text_color = color;
        self.recalc_text(ctx);
    }

    pub fn set_position(&mut self, ctx: &mut EditContext, x: f32, y: f32) {
        self.position = [x, y];
        self.recalc_text(ctx);
    }

    pub fn set_size(&mut self, ctx: &mut EditContext, width: f32, height: f32) {
        self.size = [width, height];
        self.recalc_text(ctx);
    }

    pub fn set_text_x_alignment(&mut self, ctx: &mut EditContext, alignment: TextXAlignment) {
        self.x_alignment = alignment;
        self.recalc_text(ctx);
    }

    pub fn set_text_y_alignment(&mut self, ctx: &mut EditContext, alignment: TextYAlignment) {
        self.y_alignment = alignment;
        self.recalc_text(ctx);
    }

    pub fn set_text_wrapped(&mut self, ctx: &mut EditContext, wrapped: bool) {
        self.text_wrapped = wrapped;
        self.recalc_text(ctx);
    }

    pub fn set_rich_text(&mut self, ctx: &mut EditContext, rich_text: bool) {
        self.rich_text = rich_text;
        self.recalc_text(ctx);
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    pub fn set_multi_line(&mut self, multi_line: bool) {
        self.multi_line = multi_line;
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }
}

struct DecorationMetrics {
    underline_position: f32,
    underline_thickness: f32,
    strikethrough_position: f32,
    strikethrough_thickness: f32,
}

fn decoration_metrics(font: SingleScriptFont) -> DecorationMetrics {
    match registry::get_single_script_font_data(font) {
        Some(data) => DecorationMetrics {
            underline_position: data.underline_position(),
            underline_thickness: data.underline_thickness(),
            strikethrough_position: data.strikethrough_position(),
            strikethrough_thickness: data.strikethrough_thickness(),
        },
        None => {
            let size = font.size as f32;
            DecorationMetrics {
                underline_position: size * 0.1,
                underline_thickness: (size * 0.06).max(1.),
                strikethrough_position: -size * 0.3,
                strikethrough_thickness: (size * 0.06).max(1.),
            }
        }
    }
}

fn apply_cursor_move(
    layout: &LayoutInfo,
    text_width: f32,
    alignment: TextXAlignment,
    op: &PostLayoutOp,
    cursor: CursorPosition,
    cursor_pos: &CursorPositionResult,
    breaks: &GraphemeBreaks,
) -> CursorPosition {
    if layout.lines.is_empty() {
        return cursor;
    }
    match op.move_type {
        PostLayoutCursorMove::LineStart => layout.get_line_start_position(cursor_pos.line_number),
        PostLayoutCursorMove::LineEnd => layout.get_line_end_position(cursor_pos.line_number),
        PostLayoutCursorMove::LineAbove => {
            if cursor_pos.line_number > 0 {
                layout.find_closest_cursor_position(
                    text_width,
                    alignment,
                    breaks,
                    cursor_pos.line_number - 1,
                    cursor_pos.x,
                )
            } else {
                cursor
            }
        }
        PostLayoutCursorMove::LineBelow => {
            if cursor_pos.line_number + 1 < layout.lines.len() {
                layout.find_closest_cursor_position(
                    text_width,
                    alignment,
                    breaks,
                    cursor_pos.line_number + 1,
                    cursor_pos.x,
                )
            } else {
                cursor
            }
        }
        PostLayoutCursorMove::MousePosition { x, y } => {
            let mut line_index = layout.get_closest_line_to_height(y);
            if line_index == layout.lines.len() {
                line_index = layout.lines.len() - 1;
            }
            layout.find_closest_cursor_position(text_width, alignment, breaks, line_index, x)
        }
    }
}

/// Emits a rect, splitting it against a selection clip span: the parts
/// outside the span keep their color, the covered middle is drawn white.
/// A part narrower than a pixel is absorbed into the clipped middle to
/// avoid subpixel slivers.
#[allow(clippy::too_many_arguments)]
fn emit_rect(
    rects: &mut Vec<TextRect>,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    tex_coords: [f32; 4],
    texture: Option<TextureId>,
    color: Color,
    pipeline: PipelineId,
    clip: Option<(f32, f32)>,
) {
    let Some((clip_start, clip_end)) = clip else {
        rects.push(TextRect {
            x,
            y,
            width,
            height,
            tex_coords,
            texture,
            color,
            pipeline,
        });
        return;
    };

    // Completely uncovered by the clip range.
    if x >= clip_end || x + width <= clip_start {
        emit_rect(rects, x, y, width, height, tex_coords, texture, color, pipeline, None);
        return;
    }

    let mut new_x = x;
    let mut new_width = width;
    let mut new_u = tex_coords[0];
    let mut new_u_width = tex_coords[2];

    // Left side unclipped by at least a pixel.
    if clip_start >= x + 1. && clip_start < x + width {
        let diff = clip_start - x;
        new_x += diff;
        new_width -= diff;

        let tc_diff = tex_coords[2] * diff / width;
        new_u += tc_diff;
        new_u_width -= tc_diff;

        let left_coords = [tex_coords[0], tex_coords[1], tc_diff, tex_coords[3]];
        emit_rect(rects, x, y, diff, height, left_coords, texture, color, pipeline, None);
    }

    // Right side unclipped by at least a pixel.
    if clip_end > x && clip_end + 1. <= x + width {
        let diff = x + width - clip_end;
        new_width -= diff;

        let tc_diff = tex_coords[2] * diff / width;
        new_u_width -= tc_diff;

        let right_coords = [
            tex_coords[0] + tex_coords[2] - tc_diff,
            tex_coords[1],
            tc_diff,
            tex_coords[3],
        ];
        emit_rect(
            rects,
            x + width - diff,
            y,
            diff,
            height,
            right_coords,
            texture,
            color,
            pipeline,
            None,
        );
    }

    // What remains of the intersection is the clipped rect.
    let clipped_coords = [new_u, tex_coords[1], new_u_width, tex_coords[3]];
    emit_rect(
        rects,
        new_x,
        y,
        new_width,
        height,
        clipped_coords,
        texture,
        Color::WHITE,
        pipeline,
        None,
    );
}
