// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Permissive recursive-descent parser for the inline markup grammar.
//!
//! The parser never fails: recognized tags open push/pop style scopes,
//! unknown tags are replayed as literal text, unmatched closers are
//! discarded. Every irregularity is recorded as a [`MarkupIssue`].

use tracing::warn;

use super::{FormattingRuns, MarkupIssue, MarkupIssueKind};
use crate::font::{registry, Font, FontStyle, FontWeight};
use crate::style::{Color, JoinStyle, StrokeState};
use crate::value_runs::{ValueRunBuilder, ValueRuns};

pub(super) fn parse(
    text: &str,
    base_font: Font,
    base_color: Color,
    base_stroke: StrokeState,
) -> FormattingRuns {
    let mut parser = Parser {
        text,
        pos: 0,
        output: String::with_capacity(text.len()),
        font_runs: ValueRunBuilder::new(base_font),
        color_runs: ValueRunBuilder::new(base_color),
        stroke_runs: ValueRunBuilder::new(base_stroke),
        strikethrough_runs: ValueRunBuilder::new(false),
        underline_runs: ValueRunBuilder::new(false),
        source_map: ValueRuns::new(),
        cur_delta: None,
        issues: Vec::new(),
    };
    parser.parse_content(None);
    parser.finish()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    output: String,
    font_runs: ValueRunBuilder<Font>,
    color_runs: ValueRunBuilder<Color>,
    stroke_runs: ValueRunBuilder<StrokeState>,
    strikethrough_runs: ValueRunBuilder<bool>,
    underline_runs: ValueRunBuilder<bool>,
    source_map: ValueRuns<i32>,
    cur_delta: Option<i32>,
    issues: Vec<MarkupIssue>,
}

enum ScopeEnd {
    Closed,
    EndOfInput,
}

impl<'a> Parser<'a> {
    fn finish(mut self) -> FormattingRuns {
        let limit = self.output.len() as i32;
        if limit > 0 {
            self.font_runs.pop(limit);
            self.color_runs.pop(limit);
            self.stroke_runs.pop(limit);
            self.strikethrough_runs.pop(limit);
            self.underline_runs.pop(limit);
            if limit > self.source_map.limit() {
                self.source_map.add(limit, self.cur_delta.unwrap_or(0));
            }
        }
        if !self.issues.is_empty() {
            warn!(count = self.issues.len(), "inline markup had issues");
        }
        FormattingRuns {
            font_runs: self.font_runs.finish(),
            color_runs: self.color_runs.finish(),
            stroke_runs: self.stroke_runs.finish(),
            strikethrough_runs: self.strikethrough_runs.finish(),
            underline_runs: self.underline_runs.finish(),
            content_text: self.output,
            source_map: self.source_map,
            issues: self.issues,
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn issue(&mut self, source_offset: usize, kind: MarkupIssueKind) {
        self.issues.push(MarkupIssue {
            source_offset,
            kind,
        });
    }

    /// Appends the char at the current source position to the content text,
    /// keeping the content→source delta map current.
    fn append_current_char(&mut self) {
        let Some(ch) = self.peek() else { return };
        let content_pos = self.output.len() as i32;
        let delta = self.pos as i32 - content_pos;
        if self.cur_delta != Some(delta) {
            if let Some(prev) = self.cur_delta {
                if content_pos > self.source_map.limit() {
                    self.source_map.add(content_pos, prev);
                }
            }
            self.cur_delta = Some(delta);
        }
        self.output.push(ch);
        self.pos += ch.len_utf8();
    }

    fn parse_content(&mut self, expected_close: Option<&str>) -> ScopeEnd {
        loop {
            match self.peek() {
                None => {
                    if expected_close.is_some() {
                        self.issue(self.pos, MarkupIssueKind::UnterminatedTag);
                    }
                    return ScopeEnd::EndOfInput;
                }
                Some('<') => {
                    if let Some(end) = self.parse_tag(expected_close) {
                        return end;
                    }
                }
                Some(_) => self.append_current_char(),
            }
        }
    }

    /// Handles one `<…>` construct. Returns `Some` when the construct closed
    /// the current scope.
    fn parse_tag(&mut self, expected_close: Option<&str>) -> Option<ScopeEnd> {
        let tag_start = self.pos;
        let after_open = &self.text[self.pos + 1..];

        if after_open.starts_with("!--") {
            self.parse_comment(tag_start);
            return None;
        }
        if let Some(closer) = after_open.strip_prefix('/') {
            return self.parse_closer(tag_start, closer, expected_close);
        }

        let name_len = after_open
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after_open.len());
        let name = &after_open[..name_len];
        match name {
            "color" => self.parse_color_tag(tag_start),
            "stroke" => self.parse_stroke_tag(tag_start),
            "font" => self.parse_font_tag(tag_start),
            "b" => self.parse_attribute_free_scope(tag_start, "b", FontOverride::Bold),
            "i" => self.parse_attribute_free_scope(tag_start, "i", FontOverride::Italic),
            "u" => self.parse_attribute_free_scope(tag_start, "u", FontOverride::Underline),
            "s" => self.parse_attribute_free_scope(tag_start, "s", FontOverride::Strikethrough),
            _ => self.pass_through_literal(tag_start),
        }
        None
    }

    fn parse_comment(&mut self, tag_start: usize) {
        // Past "<!--".
        self.pos = tag_start + 4;
        match self.rest().find("-->") {
            Some(end) => self.pos += end + 3,
            None => {
                self.issue(tag_start, MarkupIssueKind::UnterminatedTag);
                self.pos = self.text.len();
            }
        }
    }

    fn parse_closer(
        &mut self,
        tag_start: usize,
        closer: &str,
        expected_close: Option<&str>,
    ) -> Option<ScopeEnd> {
        let Some(gt) = closer.find('>') else {
            self.issue(tag_start, MarkupIssueKind::UnmatchedCloser);
            self.pos = self.text.len();
            return None;
        };
        let name = closer[..gt].trim();
        // Skip "</", the name, and ">".
        self.pos = tag_start + 2 + gt + 1;
        if expected_close == Some(name) {
            Some(ScopeEnd::Closed)
        } else {
            self.issue(tag_start, MarkupIssueKind::UnmatchedCloser);
            None
        }
    }

    /// Re-emits `<…>` (or the remainder of the text when unterminated) as
    /// literal content.
    fn pass_through_literal(&mut self, tag_start: usize) {
        self.issue(tag_start, MarkupIssueKind::UnknownTag);
        let end = match self.rest().find('>') {
            Some(gt) => self.pos + gt + 1,
            None => self.text.len(),
        };
        while self.pos < end {
            self.append_current_char();
        }
    }

    fn parse_color_tag(&mut self, tag_start: usize) {
        self.pos = tag_start + "<color".len();
        let mut color = None;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                None => {
                    self.issue(tag_start, MarkupIssueKind::UnterminatedTag);
                    break;
                }
                Some(_) => {
                    let Some(attr) = self.parse_attribute_name() else {
                        self.recover_to_tag_end(tag_start);
                        break;
                    };
                    match attr {
                        "rgb" => color = self.parse_color_value(tag_start),
                        _ => {
                            self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                            self.skip_attribute_value();
                        }
                    }
                }
            }
        }

        let limit = self.output.len() as i32;
        let color = color.unwrap_or(*self.color_runs.current_value());
        self.color_runs.push(limit, color);
        self.parse_scope_body("color");
        self.color_runs.pop(self.output.len() as i32);
    }

    fn parse_stroke_tag(&mut self, tag_start: usize) {
        self.pos = tag_start + "<stroke".len();
        let mut stroke = StrokeState {
            color: Color::new(0., 0., 0., 1.),
            thickness: 1.,
            joins: JoinStyle::Round,
        };
        loop {
            self.skip_spaces();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                None => {
                    self.issue(tag_start, MarkupIssueKind::UnterminatedTag);
                    break;
                }
                Some(_) => {
                    let Some(attr) = self.parse_attribute_name() else {
                        self.recover_to_tag_end(tag_start);
                        break;
                    };
                    match attr {
                        "color" => {
                            if let Some(color) = self.parse_color_value(tag_start) {
                                stroke.color =
                                    Color::new(color.r, color.g, color.b, stroke.color.a);
                            }
                        }
                        "thickness" => {
                            if let Some(value) = self.parse_number_value::<f32>(tag_start) {
                                stroke.thickness = value;
                            }
                        }
                        "transparency" => {
                            if let Some(value) = self.parse_number_value::<f32>(tag_start) {
                                stroke.color.a = 1. - value;
                            }
                        }
                        "joins" => match self.parse_value_token() {
                            "round" => stroke.joins = JoinStyle::Round,
                            "bevel" => stroke.joins = JoinStyle::Bevel,
                            "miter" => stroke.joins = JoinStyle::Miter,
                            _ => self.issue(tag_start, MarkupIssueKind::MalformedAttribute),
                        },
                        _ => {
                            self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                            self.skip_attribute_value();
                        }
                    }
                }
            }
        }

        let limit = self.output.len() as i32;
        self.stroke_runs.push(limit, stroke);
        self.parse_scope_body("stroke");
        self.stroke_runs.pop(self.output.len() as i32);
    }

    fn parse_font_tag(&mut self, tag_start: usize) {
        self.pos = tag_start + "<font".len();
        let current = *self.font_runs.current_value();
        let mut font = current;
        let mut color = None;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                None => {
                    self.issue(tag_start, MarkupIssueKind::UnterminatedTag);
                    break;
                }
                Some(_) => {
                    let Some(attr) = self.parse_attribute_name() else {
                        self.recover_to_tag_end(tag_start);
                        break;
                    };
                    match attr {
                        "face" => {
                            let name = self.parse_value_token().to_owned();
                            match registry::get_family(&name) {
                                Some(family) => font.family = family,
                                None => {
                                    self.issue(tag_start, MarkupIssueKind::UnknownFontFace);
                                }
                            }
                        }
                        "size" => {
                            if let Some(size) = self.parse_number_value::<u32>(tag_start) {
                                font.size = size;
                            }
                        }
                        "color" => color = self.parse_color_value(tag_start),
                        _ => {
                            self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                            self.skip_attribute_value();
                        }
                    }
                }
            }
        }

        let limit = self.output.len() as i32;
        let font_change = font != current;
        if font_change {
            self.font_runs.push(limit, font);
        }
        if let Some(color) = color {
            self.color_runs.push(limit, color);
        }
        self.parse_scope_body("font");
        let limit = self.output.len() as i32;
        if font_change {
            self.font_runs.pop(limit);
        }
        if color.is_some() {
            self.color_runs.pop(limit);
        }
    }

    fn parse_attribute_free_scope(&mut self, tag_start: usize, name: &str, kind: FontOverride) {
        self.pos = tag_start + 1 + name.len();
        self.skip_spaces();
        if self.peek() == Some('>') {
            self.pos += 1;
        } else {
            // Attributes on these tags are not part of the grammar.
            self.recover_to_tag_end(tag_start);
        }

        let limit = self.output.len() as i32;
        match kind {
            FontOverride::Bold | FontOverride::Italic => {
                let mut font = *self.font_runs.current_value();
                match kind {
                    FontOverride::Bold => font.weight = FontWeight::Bold,
                    FontOverride::Italic => font.style = FontStyle::Italic,
                    _ => unreachable!(),
                }
                self.font_runs.push(limit, font);
                self.parse_scope_body(name);
                self.font_runs.pop(self.output.len() as i32);
            }
            FontOverride::Underline => {
                self.underline_runs.push(limit, true);
                self.parse_scope_body(name);
                self.underline_runs.pop(self.output.len() as i32);
            }
            FontOverride::Strikethrough => {
                self.strikethrough_runs.push(limit, true);
                self.parse_scope_body(name);
                self.strikethrough_runs.pop(self.output.len() as i32);
            }
        }
    }

    fn parse_scope_body(&mut self, close_name: &str) {
        let _ = self.parse_content(Some(close_name));
    }

    // Attribute scanning helpers.

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Reads `name=` and returns the name, or `None` when the next token is
    /// not an attribute.
    fn parse_attribute_name(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if len == 0 || !rest[len..].starts_with('=') {
            return None;
        }
        self.pos += len + 1;
        Some(&rest[..len])
    }

    /// Reads an attribute value: quoted string or a bare token running to
    /// the next whitespace or `>`.
    fn parse_value_token(&mut self) -> &'a str {
        if self.peek() == Some('"') {
            self.pos += 1;
            let rest = self.rest();
            let end = rest.find('"').unwrap_or(rest.len());
            self.pos += end + usize::from(end < rest.len());
            return &rest[..end];
        }
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '>')
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn skip_attribute_value(&mut self) {
        let _ = self.parse_value_token();
    }

    fn parse_number_value<T: std::str::FromStr>(&mut self, tag_start: usize) -> Option<T> {
        let token = self.parse_value_token();
        match token.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                None
            }
        }
    }

    /// Color value forms: `#RRGGBB`, a decimal `0xRRGGBB` integer, or
    /// `rgb(r, g, b)`.
    fn parse_color_value(&mut self, tag_start: usize) -> Option<Color> {
        let quoted = self.peek() == Some('"');
        if quoted {
            self.pos += 1;
        }
        let result = if self.rest().starts_with("rgb(") {
            self.parse_color_rgb_call(tag_start)
        } else {
            let token = {
                let rest = self.rest();
                let end = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '"')
                    .unwrap_or(rest.len());
                self.pos += end;
                &rest[..end]
            };
            if let Some(hex) = token.strip_prefix('#') {
                match u32::from_str_radix(hex, 16) {
                    Ok(value) if hex.len() == 6 => Some(Color::from_rgb_u32(value)),
                    _ => {
                        self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                        None
                    }
                }
            } else {
                match token.parse::<u32>() {
                    Ok(value) => Some(Color::from_rgb_u32(value)),
                    Err(_) => {
                        self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                        None
                    }
                }
            }
        };
        if quoted && self.peek() == Some('"') {
            self.pos += 1;
        }
        result
    }

    fn parse_color_rgb_call(&mut self, tag_start: usize) -> Option<Color> {
        let rest = self.rest();
        let Some(close) = rest.find(')') else {
            self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
            self.pos += rest.len();
            return None;
        };
        let inner = &rest["rgb(".len()..close];
        self.pos += close + 1;
        let mut channels = [0_u8; 3];
        let mut count = 0;
        for part in inner.split(',') {
            if count == 3 {
                count += 1;
                break;
            }
            match part.trim().parse::<u8>() {
                Ok(value) => {
                    channels[count] = value;
                    count += 1;
                }
                Err(_) => {
                    self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
                    return None;
                }
            }
        }
        if count != 3 {
            self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
            return None;
        }
        Some(Color::from_rgb8(channels[0], channels[1], channels[2]))
    }

    /// Skips forward past the closing `>` of a tag whose attributes could
    /// not be scanned.
    fn recover_to_tag_end(&mut self, tag_start: usize) {
        self.issue(tag_start, MarkupIssueKind::MalformedAttribute);
        match self.rest().find('>') {
            Some(gt) => self.pos += gt + 1,
            None => self.pos = self.text.len(),
        }
    }
}

#[derive(Copy, Clone)]
enum FontOverride {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}
