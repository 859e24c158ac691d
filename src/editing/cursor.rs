// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor position and character break iteration.

use unicode_segmentation::GraphemeCursor;

/// Which side of a visual seam a cursor at a run boundary belongs to. The
/// default resolves to the visually natural run for the seam kind; the
/// opposite affinity picks the other one (set when arriving from a line
/// end or hit-testing near a direction change).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CursorAffinity {
    #[default]
    Default,
    Opposite,
}

/// A byte offset into the displayed text with an affinity bit packed into
/// the high bit, plus an invalid sentinel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorPosition(u32);

impl CursorPosition {
    pub const INVALID: Self = Self(u32::MAX);

    const AFFINITY_BIT: u32 = 1 << 31;

    pub const fn new(position: u32) -> Self {
        Self(position)
    }

    pub const fn with_affinity(position: u32, opposite: bool) -> Self {
        Self(position | ((opposite as u32) << 31))
    }

    pub fn position(self) -> u32 {
        self.0 & !Self::AFFINITY_BIT
    }

    pub fn affinity(self) -> CursorAffinity {
        if self.0 & Self::AFFINITY_BIT != 0 && self.0 != u32::MAX {
            CursorAffinity::Opposite
        } else {
            CursorAffinity::Default
        }
    }

    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self(0)
    }
}

/// Grapheme cluster boundary iterator over the currently displayed text.
pub struct GraphemeBreaks {
    text: String,
}

impl GraphemeBreaks {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The first boundary after `index`, or `None` at the end.
    pub fn following(&self, index: usize) -> Option<usize> {
        if index >= self.text.len() {
            return None;
        }
        let mut cursor = GraphemeCursor::new(index, self.text.len(), true);
        cursor.next_boundary(&self.text, 0).ok().flatten()
    }

    /// The last boundary before `index`, or `None` at the start.
    pub fn preceding(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return None;
        }
        let index = index.min(self.text.len());
        let mut cursor = GraphemeCursor::new(index, self.text.len(), true);
        cursor.prev_boundary(&self.text, 0).ok().flatten()
    }
}

/// Paragraph separators terminate word motion.
pub(crate) fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Codepoint at a byte offset; `None` past the end.
pub(crate) fn char_at(text: &str, index: usize) -> Option<char> {
    text.get(index..).and_then(|rest| rest.chars().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_packing() {
        let plain = CursorPosition::new(42);
        assert_eq!(plain.position(), 42);
        assert_eq!(plain.affinity(), CursorAffinity::Default);

        let opposite = CursorPosition::with_affinity(42, true);
        assert_eq!(opposite.position(), 42);
        assert_eq!(opposite.affinity(), CursorAffinity::Opposite);

        assert!(!CursorPosition::INVALID.is_valid());
        assert!(plain.is_valid());
    }

    #[test]
    fn grapheme_steps() {
        let mut breaks = GraphemeBreaks::new("a\u{0301}b");
        // 'a' + combining acute is one grapheme.
        assert_eq!(breaks.following(0), Some(3));
        assert_eq!(breaks.following(3), Some(4));
        assert_eq!(breaks.following(4), None);
        assert_eq!(breaks.preceding(4), Some(3));
        assert_eq!(breaks.preceding(3), Some(0));
        assert_eq!(breaks.preceding(0), None);
    }
}
