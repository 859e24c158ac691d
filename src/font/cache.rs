// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-thread sized font data.
//!
//! Parsed face state is cached per thread keyed by face handle, because the
//! shaping context that consumes it is itself thread-local. A cache hit with
//! a different pixel size rescales the cached metrics in place.

use std::cell::RefCell;
use std::collections::HashMap;

use peniko::Blob;
use swash::{CacheKey, Charmap, FontRef};

/// Scaled metrics snapshot for a face at a specific pixel size. All values
/// are in pixels; offsets follow the font's y-up convention (positive above
/// the baseline).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScaledMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub leading: f32,
    pub underline_offset: f32,
    pub strikeout_offset: f32,
    pub stroke_size: f32,
}

/// Sized face data: shared blob, swash identity, and metrics at the active
/// size. Cheap to clone; the blob is reference counted.
#[derive(Clone, Debug)]
pub struct FontData {
    blob: Blob<u8>,
    offset: u32,
    key: CacheKey,
    size: u32,
    metrics: ScaledMetrics,
}

impl FontData {
    /// Reconstructs the swash view of this face.
    pub fn as_font_ref(&self) -> FontRef<'_> {
        FontRef {
            data: self.blob.data(),
            offset: self.offset,
            key: self.key,
        }
    }

    pub fn charmap(&self) -> Charmap<'_> {
        self.as_font_ref().charmap()
    }

    pub fn has_codepoint(&self, codepoint: char) -> bool {
        self.charmap().map(codepoint) != 0
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn metrics(&self) -> ScaledMetrics {
        self.metrics
    }

    pub fn ascent(&self) -> f32 {
        self.metrics.ascent
    }

    pub fn descent(&self) -> f32 {
        self.metrics.descent
    }

    /// Baseline-relative y of the underline top edge, in y-down screen
    /// space.
    pub fn underline_position(&self) -> f32 {
        -self.metrics.underline_offset
    }

    pub fn underline_thickness(&self) -> f32 {
        self.metrics.stroke_size
    }

    pub fn strikethrough_position(&self) -> f32 {
        -self.metrics.strikeout_offset
    }

    pub fn strikethrough_thickness(&self) -> f32 {
        self.metrics.stroke_size
    }
}

struct CachedFace {
    data: FontData,
}

thread_local! {
    static FONT_CACHE: RefCell<HashMap<u32, CachedFace>> = RefCell::new(HashMap::new());
}

fn scaled_metrics(font_ref: &FontRef<'_>, size: u32) -> ScaledMetrics {
    let metrics = font_ref.metrics(&[]).scale(size as f32);
    ScaledMetrics {
        ascent: metrics.ascent,
        descent: metrics.descent,
        leading: metrics.leading,
        underline_offset: metrics.underline_offset,
        strikeout_offset: metrics.strikeout_offset,
        stroke_size: metrics.stroke_size,
    }
}

/// Looks up (or creates) the sized data for `face_index` on this thread,
/// resizing a cached entry when the requested size differs. Returns `None`
/// when the blob cannot be parsed as a font; callers treat that face as
/// having no glyphs.
pub(crate) fn get_or_create(face_index: u32, blob: &Blob<u8>, size: u32) -> Option<FontData> {
    debug_assert!(size > 0, "font size must be positive");
    FONT_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(entry) = cache.get_mut(&face_index) {
            if entry.data.size != size {
                let font_ref = entry.data.as_font_ref();
                let metrics = scaled_metrics(&font_ref, size);
                entry.data.size = size;
                entry.data.metrics = metrics;
            }
            return Some(entry.data.clone());
        }

        let font_ref = FontRef::from_index(blob.data(), 0)?;
        let offset = font_ref.offset;
        let key = CacheKey::new();
        let font_ref = FontRef {
            data: blob.data(),
            offset,
            key,
        };
        let data = FontData {
            blob: blob.clone(),
            offset,
            key,
            metrics: scaled_metrics(&font_ref, size),
            size,
        };
        cache.insert(face_index, CachedFace { data: data.clone() });
        Some(data)
    })
}
