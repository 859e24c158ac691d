// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bidirectional rich text layout and interactive editing.
//!
//! The pipeline: source text (optionally carrying inline markup) is turned
//! into per-character formatting runs, segmented by script and resolved to
//! concrete font faces with per-codepoint fallback, shaped, broken into
//! lines, reordered per the Unicode Bidirectional Algorithm, and positioned.
//! [`TextBox`] drives the whole pipeline interactively: it owns a mutable
//! buffer, dispatches mouse/key/text events, maintains a caret and a
//! selection over the visual geometry, and emits abstract textured
//! rectangles for a renderer to consume.

pub use swash;

mod util;

pub mod bidi;
pub mod editing;
pub mod font;
pub mod layout;
pub mod markup;
pub mod style;
pub mod value_runs;

#[cfg(test)]
mod tests;

pub use editing::cursor::CursorPosition;
pub use editing::text_box::{EditContext, TextBox};
pub use font::{Font, FontFace, FontFamily, FontStyle, FontWeight, SingleScriptFont};
pub use layout::{build_layout_info, LayoutInfo};
pub use markup::FormattingRuns;
pub use style::{Color, JoinStyle, StrokeState, TextXAlignment, TextYAlignment};
pub use value_runs::ValueRuns;
