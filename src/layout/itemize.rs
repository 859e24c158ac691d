// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Script run segmentation.
//!
//! Splits text into maximal runs of a single script, merging COMMON and
//! INHERITED characters into the surrounding run. Paired punctuation
//! (brackets, quotes) adopts the script of its enclosing run via a small
//! fixed-depth stack, so `latin (עברית) latin` keeps the parentheses with
//! the text they wrap.

use swash::text::{Codepoint as _, Script};

const PAREN_STACK_DEPTH: usize = 128;

/// Paired punctuation, open/close interleaved; the open member has an even
/// index.
const PAIRED_CHARS: &[char] = &[
    '\u{0028}', '\u{0029}', // ascii paired punctuation
    '\u{003C}', '\u{003E}',
    '\u{005B}', '\u{005D}',
    '\u{007B}', '\u{007D}',
    '\u{00AB}', '\u{00BB}', // guillemets
    '\u{2018}', '\u{2019}', // general punctuation
    '\u{201C}', '\u{201D}',
    '\u{2039}', '\u{203A}',
    '\u{3008}', '\u{3009}', // CJK paired punctuation
    '\u{300A}', '\u{300B}',
    '\u{300C}', '\u{300D}',
    '\u{300E}', '\u{300F}',
    '\u{3010}', '\u{3011}',
    '\u{3014}', '\u{3015}',
    '\u{3016}', '\u{3017}',
    '\u{3018}', '\u{3019}',
    '\u{301A}', '\u{301B}',
];

#[derive(Copy, Clone)]
struct ParenRecord {
    pair_index: usize,
    script: Script,
}

pub struct ScriptRunIterator<'a> {
    text: &'a str,
    limit: usize,
    paren_stack: Vec<ParenRecord>,
    fixup_count: usize,
}

impl<'a> ScriptRunIterator<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            limit: 0,
            paren_stack: Vec::new(),
            fixup_count: 0,
        }
    }

    /// The next `(start, limit, script)` run, in byte offsets.
    pub fn next_run(&mut self) -> Option<(usize, usize, Script)> {
        if self.limit >= self.text.len() {
            return None;
        }

        self.fixup_count = 0;
        let start = self.limit;
        let mut script = Script::Common;

        for (idx, ch) in self.text[start..].char_indices() {
            self.limit = start + idx;
            let mut ch_script = ch.script();
            let pair_index = pair_index(ch);

            // An open character pushes the current script; a close
            // character adopts the script of its matching open, popping any
            // unmatched opens above it.
            if let Some(pair) = pair_index {
                if pair & 1 == 0 {
                    self.push(pair, script);
                } else {
                    let open = pair & !1;
                    while self
                        .paren_stack
                        .last()
                        .is_some_and(|record| record.pair_index != open)
                    {
                        self.pop();
                    }
                    if let Some(record) = self.paren_stack.last() {
                        ch_script = record.script;
                    }
                }
            }

            if script_is_same(script, ch_script) {
                if !is_real_script(script) && is_real_script(ch_script) {
                    script = ch_script;
                    self.fixup(script);
                }
                if matches!(pair_index, Some(pair) if pair & 1 != 0) {
                    self.pop();
                }
            } else {
                return Some((start, self.limit, script));
            }
        }

        self.limit = self.text.len();
        Some((start, self.limit, script))
    }

    fn push(&mut self, pair_index: usize, script: Script) {
        if self.paren_stack.len() == PAREN_STACK_DEPTH {
            self.paren_stack.remove(0);
        } else {
            self.fixup_count += 1;
        }
        self.paren_stack.push(ParenRecord { pair_index, script });
    }

    fn pop(&mut self) {
        if self.paren_stack.pop().is_some() {
            self.fixup_count = self.fixup_count.saturating_sub(1);
        }
    }

    /// Rewrites the scripts of entries pushed since the run start, once the
    /// run's real script becomes known.
    fn fixup(&mut self, script: Script) {
        let len = self.paren_stack.len();
        for record in &mut self.paren_stack[len - self.fixup_count..] {
            record.script = script;
        }
        self.fixup_count = 0;
    }
}

pub(crate) fn is_real_script(script: Script) -> bool {
    !matches!(script, Script::Common | Script::Inherited | Script::Unknown)
}

fn script_is_same(a: Script, b: Script) -> bool {
    !is_real_script(a) || !is_real_script(b) || a == b
}

fn pair_index(ch: char) -> Option<usize> {
    PAIRED_CHARS.binary_search(&ch).ok()
}
