// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the engine tests.
//!
//! The registered test faces carry byte blobs that are not parseable fonts,
//! which drives the layout pipeline down its placeholder shaping path: one
//! `.notdef` glyph per codepoint with an advance of half the font size, and
//! size-derived vertical metrics. That makes glyph counts, run structure
//! and cursor geometry fully deterministic without binary font fixtures.

use std::sync::{Arc, OnceLock};

use peniko::Blob;

use crate::editing::text_box::{EditContext, TextBox};
use crate::editing::{InMemoryClipboard, NullGlyphAtlas};
use crate::font::{registry, FaceCreateInfo, FamilyCreateInfo, Font, FontFamily};

pub fn fake_face_data() -> Blob<u8> {
    Blob::new(Arc::new(b"not an actual font file".to_vec()))
}

/// The shared test family; registered once per process.
pub fn test_family() -> FontFamily {
    static FAMILY: OnceLock<FontFamily> = OnceLock::new();
    *FAMILY.get_or_init(|| {
        registry::register_family(&FamilyCreateInfo {
            name: "TestSans".to_owned(),
            faces: vec![FaceCreateInfo {
                name: "TestSans-Regular".to_owned(),
                data: fake_face_data(),
                weight: Default::default(),
                style: Default::default(),
            }],
            ..Default::default()
        })
        .expect("test family registers once")
    })
}

pub fn test_font(size: u32) -> Font {
    Font::new(test_family(), size)
}

/// Placeholder advance of one glyph at `size`.
pub fn advance(size: u32) -> f32 {
    size as f32 * 0.5
}

/// Placeholder line height at `size` (ascent 0.8, descent 0.2).
pub fn line_height(size: u32) -> f32 {
    size as f32
}

pub fn test_context() -> EditContext {
    EditContext::new(
        Box::new(InMemoryClipboard::default()),
        Box::new(NullGlyphAtlas),
    )
}

/// An editable, focusable box over `text` with deterministic geometry.
pub fn editable_box(ctx: &mut EditContext, text: &str, width: f32, height: f32) -> TextBox {
    let mut text_box = TextBox::new();
    text_box.set_font(ctx, test_font(16));
    text_box.set_size(ctx, width, height);
    text_box.set_editable(true);
    text_box.set_text(ctx, text.to_owned());
    text_box
}
