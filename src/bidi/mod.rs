// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bidirectional text support.
//!
//! Paragraph-level resolution (classification and the explicit/implicit
//! level rules) is delegated to `unicode-bidi`; this module keeps the
//! resolved per-byte state and builds the line-level view on top of it:
//! trailing-whitespace handling, visual run extraction and reordering, and
//! logical↔visual index mapping.
//!
//! All indices are UTF-8 byte offsets. Character traversal is always done by
//! codepoint; bidi control characters are never detected by inspecting
//! single bytes.

pub mod line;

pub use line::{BidiRun, LineBidi, MAP_NOWHERE};

use thiserror::Error;
use unicode_bidi::{BidiClass, BidiInfo, Level};

/// Highest embedding level producible by explicit directional formatting.
pub const MAX_EXPLICIT_LEVEL: u8 = 125;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum BidiError {
    #[error("range does not denote a valid line within the paragraph")]
    InvalidRange,
    #[error("illegal argument")]
    IllegalArgument,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
    Mixed,
}

/// Flags recorded on an insertion point and carried per run while mapping
/// indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarkFlags;

impl MarkFlags {
    pub const LRM_BEFORE: i32 = 1;
    pub const LRM_AFTER: i32 = 2;
    pub const RLM_BEFORE: i32 = 4;
    pub const RLM_AFTER: i32 = 8;
    pub const BEFORE: i32 = Self::LRM_BEFORE | Self::RLM_BEFORE;
    pub const AFTER: i32 = Self::LRM_AFTER | Self::RLM_AFTER;
}

/// An LRM/RLM insertion point accumulated by an upstream reordering pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InsertPoint {
    /// Byte position the mark attaches to.
    pub pos: usize,
    /// One of the [`MarkFlags`] bit values.
    pub flag: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BidiOptions {
    /// Count bidi control characters so index mapping can skip them, as if
    /// they were removed from the output.
    pub remove_controls: bool,
}

/// Resolved bidirectional state of a single paragraph.
pub struct ParagraphBidi<'t> {
    text: &'t str,
    levels: Vec<u8>,
    classes: Vec<BidiClass>,
    para_level: u8,
    direction: Direction,
    trailing_ws_start: usize,
    control_count: usize,
    insert_points: Vec<InsertPoint>,
}

impl<'t> ParagraphBidi<'t> {
    /// Runs the paragraph-level algorithm. `base_rtl` forces the base
    /// direction; `None` lets the first strong character decide.
    pub fn resolve(text: &'t str, base_rtl: Option<bool>, options: BidiOptions) -> Self {
        let default_level = base_rtl.map(|rtl| if rtl { Level::rtl() } else { Level::ltr() });
        let info = BidiInfo::new(text, default_level);

        let para_level = info
            .paragraphs
            .first()
            .map(|p| p.level.number())
            .unwrap_or_else(|| default_level.unwrap_or(Level::ltr()).number());
        let levels: Vec<u8> = info.levels.iter().map(|level| level.number()).collect();
        let classes = info.original_classes;

        let direction = if text.is_empty() {
            if para_level & 1 != 0 {
                Direction::Rtl
            } else {
                Direction::Ltr
            }
        } else {
            let first = levels[0] & 1;
            if levels.iter().all(|level| level & 1 == first) {
                if first != 0 {
                    Direction::Rtl
                } else {
                    Direction::Ltr
                }
            } else {
                Direction::Mixed
            }
        };

        // Controls are counted in bytes: the index maps operate on byte
        // positions, so a removed control vacates all of its bytes.
        let control_count = if options.remove_controls {
            text.chars()
                .filter(|&ch| is_bidi_control(ch))
                .map(char::len_utf8)
                .sum()
        } else {
            0
        };

        let trailing_ws_start =
            line::trailing_ws_start(&classes, &levels, para_level, text.len());

        Self {
            text,
            levels,
            classes,
            para_level,
            direction,
            trailing_ws_start,
            control_count,
            insert_points: Vec::new(),
        }
    }

    /// Records an LRM/RLM insertion point produced by an upstream
    /// reordering pass. Lines built afterwards account for the mark in
    /// their index maps.
    pub fn add_insert_point(&mut self, point: InsertPoint) {
        self.insert_points.push(point);
    }

    pub fn text(&self) -> &'t str {
        self.text
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    pub fn classes(&self) -> &[BidiClass] {
        &self.classes
    }

    pub fn para_level(&self) -> u8 {
        self.para_level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn trailing_ws_start(&self) -> usize {
        self.trailing_ws_start
    }

    pub(crate) fn control_count(&self) -> usize {
        self.control_count
    }

    pub(crate) fn insert_points(&self) -> &[InsertPoint] {
        &self.insert_points
    }
}

/// The characters removed by the `remove_controls` option: the implicit
/// marks, the explicit embedding/override/isolate codes, and ALM.
pub fn is_bidi_control(ch: char) -> bool {
    matches!(
        ch,
        '\u{200E}' | '\u{200F}' | '\u{061C}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// Classes treated as removable trailing whitespace at line level: actual
/// whitespace, boundary-neutral, and the explicit embedding codes.
pub(crate) fn is_trailing_ws_class(class: BidiClass) -> bool {
    matches!(
        class,
        BidiClass::WS
            | BidiClass::BN
            | BidiClass::LRE
            | BidiClass::RLE
            | BidiClass::LRO
            | BidiClass::RLO
            | BidiClass::PDF
    )
}
