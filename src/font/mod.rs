// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Font registry, face resolution and per-codepoint fallback.
//!
//! Families are registered once with explicit face byte blobs, a script
//! coverage set, and ordered lists of linked and fallback families. Lookup
//! resolves a [`Font`] query (family, size, weight, style) against a script
//! to a concrete face, and [`registry::get_sub_font`] walks a substring
//! producing maximal spans drawable by a single face.

mod cache;
pub mod registry;

pub use cache::FontData;

use peniko::Blob;
use swash::text::Script;
use thiserror::Error;

/// Handle to a registered font family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontFamily(pub(crate) u32);

/// Handle to a loaded font face (one weight/style variant of a family).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontFace(pub(crate) u32);

impl FontFace {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The 9-step weight ladder. `Regular` is the default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FontWeight {
    Thin,
    ExtraLight,
    Light,
    #[default]
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl FontWeight {
    pub(crate) const COUNT: usize = 9;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub(crate) const COUNT: usize = 2;
}

/// A font query: the multi-script font callers hold and pass around.
/// Resolution to a concrete face happens per script span at layout time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Font {
    pub family: FontFamily,
    pub size: u32,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl Font {
    pub fn new(family: FontFamily, size: u32) -> Self {
        Self {
            family,
            size,
            weight: FontWeight::default(),
            style: FontStyle::default(),
        }
    }

    pub fn with_attributes(mut self, weight: FontWeight, style: FontStyle) -> Self {
        self.weight = weight;
        self.style = style;
        self
    }
}

/// A face bound to a pixel size, covering a maximal single-script span.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SingleScriptFont {
    pub face: FontFace,
    pub size: u32,
}

/// One face supplied to [`registry::register_family`]. Face names are
/// deduplicated globally: two entries with the same name share storage.
#[derive(Clone, Debug)]
pub struct FaceCreateInfo {
    pub name: String,
    pub data: Blob<u8>,
    pub weight: FontWeight,
    pub style: FontStyle,
}

/// Family registration input.
#[derive(Clone, Debug, Default)]
pub struct FamilyCreateInfo {
    pub name: String,
    /// Scripts this family covers. Empty means every script.
    pub scripts: Vec<Script>,
    /// Families consulted when this family does not cover a script at all.
    pub linked_families: Vec<String>,
    /// Families consulted codepoint-by-codepoint when the chosen face lacks
    /// a glyph.
    pub fallback_families: Vec<String>,
    pub faces: Vec<FaceCreateInfo>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("family is already loaded")]
    AlreadyLoaded,
    #[error("no faces supplied for family")]
    NoFaces,
}
