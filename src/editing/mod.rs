// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interactive editing: cursor state, the text box, and the abstract
//! interfaces it talks to (input events, clipboard, glyph atlas, draw
//! sink).

pub mod cursor;
pub mod text_box;

use crate::font::SingleScriptFont;
use crate::style::{Color, JoinStyle};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
    Repeat,
}

/// Modifier keys held during an event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
}

/// Keys the text box responds to. Printable input arrives separately
/// through `handle_text_input`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Backspace,
    Delete,
    Enter,
    A,
    C,
    V,
    X,
}

/// Opaque clipboard capability. Implementations must round-trip UTF-8.
pub trait Clipboard {
    fn get_string(&mut self) -> String;
    fn set_string(&mut self, text: &str);
}

/// Process-local clipboard, useful for tests and headless runs.
#[derive(Default)]
pub struct InMemoryClipboard {
    contents: String,
}

impl Clipboard for InMemoryClipboard {
    fn get_string(&mut self) -> String {
        self.contents.clone()
    }

    fn set_string(&mut self, text: &str) {
        self.contents = text.to_owned();
    }
}

/// Handle to a texture owned by the rendering side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipelineId {
    Rect,
    Msdf,
    Outline,
}

/// Placement of a rasterized glyph (or stroke outline) in an atlas.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphBitmapInfo {
    /// u, v, width, height in texture space.
    pub tex_coords: [f32; 4],
    pub size: [f32; 2],
    /// Bearing offset from the pen position.
    pub offset: [f32; 2],
    pub texture: TextureId,
    pub has_color: bool,
    pub pipeline: PipelineId,
}

/// Source of rasterized glyph bounds. The engine emits abstract textured
/// rectangles; the atlas decides raster format and pipeline.
pub trait GlyphAtlas {
    fn glyph_info(&mut self, font: SingleScriptFont, glyph_id: u16) -> Option<GlyphBitmapInfo>;
    fn stroke_info(
        &mut self,
        font: SingleScriptFont,
        glyph_id: u16,
        thickness: f32,
        joins: JoinStyle,
    ) -> Option<GlyphBitmapInfo>;
    fn default_texture(&self) -> TextureId;
}

/// Atlas that rasterizes nothing. Selection, decoration and cursor rects
/// are still produced, which is enough for headless layout work.
#[derive(Default)]
pub struct NullGlyphAtlas;

impl GlyphAtlas for NullGlyphAtlas {
    fn glyph_info(&mut self, _font: SingleScriptFont, _glyph_id: u16) -> Option<GlyphBitmapInfo> {
        None
    }

    fn stroke_info(
        &mut self,
        _font: SingleScriptFont,
        _glyph_id: u16,
        _thickness: f32,
        _joins: JoinStyle,
    ) -> Option<GlyphBitmapInfo> {
        None
    }

    fn default_texture(&self) -> TextureId {
        TextureId(0)
    }
}

/// One textured rectangle to draw. Coordinates are relative to the text
/// box origin until `render` applies the box position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub tex_coords: [f32; 4],
    pub texture: Option<TextureId>,
    pub color: Color,
    pub pipeline: PipelineId,
}
