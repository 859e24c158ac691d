// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line-level view over a resolved paragraph.
//!
//! A line aliases its paragraph's text, levels and classes. The trailing
//! whitespace boundary implements rule L1 without mutating the shared
//! arrays: characters at and after `trailing_ws_start` are implicitly at the
//! paragraph level. Visual runs are materialized lazily and reordered with
//! the standard level-sequence reversal.

use std::cell::OnceCell;

use unicode_bidi::BidiClass;

use super::{
    is_bidi_control, is_trailing_ws_class, BidiError, Direction, InsertPoint, MarkFlags,
    ParagraphBidi, MAX_EXPLICIT_LEVEL,
};

/// Sentinel for positions that map to an inserted mark or a removed control.
pub const MAP_NOWHERE: i32 = -1;

/// One visual run of a line. `visual_limit` is the prefix sum of run lengths
/// in visual order; `insert_remove` carries mark flags (positive bits) or a
/// negative removed-control byte count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BidiRun {
    pub logical_start: usize,
    pub visual_limit: usize,
    pub insert_remove: i32,
    pub rtl: bool,
}

pub struct LineBidi<'p> {
    text: &'p str,
    levels: &'p [u8],
    para_level: u8,
    direction: Direction,
    trailing_ws_start: usize,
    length: usize,
    result_length: usize,
    control_count: usize,
    insert_points: Vec<InsertPoint>,
    runs: OnceCell<Vec<BidiRun>>,
}

/// Start of the trailing run of whitespace in `[0, length)`, merged with a
/// preceding run already at the paragraph level. A line terminated by a
/// block separator keeps the separator at its own level.
pub(super) fn trailing_ws_start(
    classes: &[BidiClass],
    levels: &[u8],
    para_level: u8,
    length: usize,
) -> usize {
    if length == 0 {
        return 0;
    }
    if classes[length - 1] == BidiClass::B {
        return length;
    }
    let mut start = length;
    while start > 0 && is_trailing_ws_class(classes[start - 1]) {
        start -= 1;
    }
    while start > 0 && levels[start - 1] == para_level {
        start -= 1;
    }
    start
}

impl<'p> LineBidi<'p> {
    /// Creates a line view over `para[start..limit)`.
    pub fn set_line(
        para: &'p ParagraphBidi<'p>,
        start: usize,
        limit: usize,
    ) -> Result<Self, BidiError> {
        if start >= limit || limit > para.len() {
            return Err(BidiError::InvalidRange);
        }
        let text = para.text();
        if !text.is_char_boundary(start) || !text.is_char_boundary(limit) {
            return Err(BidiError::InvalidRange);
        }

        let line_text = &text[start..limit];
        let length = limit - start;
        let levels = &para.levels()[start..limit];
        let classes = &para.classes()[start..limit];
        let mut para_level = para.para_level();

        let mut control_count = 0;
        if para.control_count() > 0 {
            control_count = line_text
                .chars()
                .filter(|&ch| is_bidi_control(ch))
                .map(char::len_utf8)
                .sum();
        }

        let insert_points: Vec<InsertPoint> = para
            .insert_points()
            .iter()
            .filter(|point| (start..limit).contains(&point.pos))
            .map(|point| InsertPoint {
                pos: point.pos - start,
                flag: point.flag,
            })
            .collect();
        let result_length = length - control_count + insert_points.len();

        let mut direction;
        let mut ws_start;
        if para.direction() != Direction::Mixed {
            // The parent is already trivial; its levels are all implicitly
            // or explicitly at the paragraph level.
            direction = para.direction();
            ws_start = if para.trailing_ws_start() <= start {
                0
            } else if para.trailing_ws_start() < limit {
                para.trailing_ws_start() - start
            } else {
                length
            };
        } else {
            ws_start = trailing_ws_start(classes, levels, para_level, length);
            if ws_start == 0 {
                // All levels are at the paragraph level.
                direction = if para_level & 1 != 0 {
                    Direction::Rtl
                } else {
                    Direction::Ltr
                };
            } else {
                let level = levels[0] & 1;
                if ws_start < length && (para_level & 1) != level {
                    // The trailing WS is at the paragraph level, which
                    // differs from the first character's.
                    direction = Direction::Mixed;
                } else {
                    direction = if level != 0 {
                        Direction::Rtl
                    } else {
                        Direction::Ltr
                    };
                    for i in 1..ws_start {
                        if levels[i] & 1 != level {
                            direction = Direction::Mixed;
                            break;
                        }
                    }
                }
            }
        }

        match direction {
            Direction::Ltr => {
                para_level = (para_level + 1) & !1;
                ws_start = 0;
            }
            Direction::Rtl => {
                para_level |= 1;
                ws_start = 0;
            }
            Direction::Mixed => {}
        }

        Ok(Self {
            text: line_text,
            levels,
            para_level,
            direction,
            trailing_ws_start: ws_start,
            length,
            result_length,
            control_count,
            insert_points,
            runs: OnceCell::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Length of the line after mark insertion and control removal.
    pub fn result_length(&self) -> usize {
        self.result_length
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn para_level(&self) -> u8 {
        self.para_level
    }

    pub fn trailing_ws_start(&self) -> usize {
        self.trailing_ws_start
    }

    /// Level of the character containing `index`; the paragraph level inside
    /// the trailing whitespace run.
    pub fn level_at(&self, index: usize) -> u8 {
        if index >= self.length {
            return 0;
        }
        if self.direction != Direction::Mixed || index >= self.trailing_ws_start {
            self.para_level
        } else {
            self.levels[index]
        }
    }

    /// The visual runs of the line, in visual order.
    pub fn runs(&self) -> &[BidiRun] {
        self.runs.get_or_init(|| self.build_runs())
    }

    pub fn run_count(&self) -> usize {
        self.runs().len()
    }

    /// Logical start, byte length and direction of the `index`-th visual
    /// run.
    pub fn visual_run(&self, index: usize) -> (usize, usize, bool) {
        let runs = self.runs();
        let run = runs[index];
        let visual_start = if index > 0 { runs[index - 1].visual_limit } else { 0 };
        (run.logical_start, run.visual_limit - visual_start, run.rtl)
    }

    fn build_runs(&self) -> Vec<BidiRun> {
        let mut runs = self.build_reordered_runs();

        if !self.insert_points.is_empty() {
            for point in &self.insert_points {
                let index = run_from_logical_index(&runs, point.pos);
                runs[index].insert_remove |= point.flag;
            }
        } else if self.control_count > 0 {
            for (idx, ch) in self.text.char_indices() {
                if is_bidi_control(ch) {
                    let index = run_from_logical_index(&runs, idx);
                    runs[index].insert_remove -= ch.len_utf8() as i32;
                }
            }
        }

        runs
    }

    fn build_reordered_runs(&self) -> Vec<BidiRun> {
        let single = |level: u8| {
            vec![BidiRun {
                logical_start: 0,
                visual_limit: self.length,
                insert_remove: 0,
                rtl: level & 1 != 0,
            }]
        };

        if self.direction != Direction::Mixed {
            return single(self.para_level);
        }

        let levels = self.levels;
        let limit = self.trailing_ws_start;

        // Count the same-level runs before the trailing WS.
        let mut run_count = 0;
        let mut level = u8::MAX;
        for &l in &levels[..limit] {
            if l != level {
                run_count += 1;
                level = l;
            }
        }
        if run_count == 1 && limit == self.length {
            // One non-WS run and no trailing WS run.
            return single(levels[0]);
        }

        let has_ws_run = limit < self.length;
        let mut runs = Vec::with_capacity(run_count + usize::from(has_ws_run));
        let mut min_level = MAX_EXPLICIT_LEVEL + 1;
        let mut max_level = 0;

        let mut i = 0;
        while i < limit {
            let start = i;
            let level = levels[i];
            min_level = min_level.min(level);
            max_level = max_level.max(level);
            while i < limit && levels[i] == level {
                i += 1;
            }
            // `visual_limit` temporarily holds the run length.
            runs.push(BidiRun {
                logical_start: start,
                visual_limit: i - start,
                insert_remove: 0,
                rtl: false,
            });
        }
        if has_ws_run {
            runs.push(BidiRun {
                logical_start: limit,
                visual_limit: self.length - limit,
                insert_remove: 0,
                rtl: false,
            });
            min_level = min_level.min(self.para_level);
        }

        reorder_line(
            &mut runs,
            levels,
            min_level,
            max_level,
            self.trailing_ws_start,
            self.length,
        );

        // Add direction flags and convert lengths into prefix sums. The
        // trailing WS run is implicitly at the paragraph level: for an RTL
        // paragraph it ends up visually first, for LTR visually last.
        let mut acc = 0;
        for run in runs.iter_mut() {
            run.rtl = levels[run.logical_start] & 1 != 0;
            acc += run.visual_limit;
            run.visual_limit = acc;
        }
        if has_ws_run {
            let index = if self.para_level & 1 != 0 {
                0
            } else {
                runs.len() - 1
            };
            runs[index].rtl = self.para_level & 1 != 0;
        }
        runs
    }

    /// Visual position of the byte at `logical`, accounting for inserted
    /// marks and removed controls. Returns [`MAP_NOWHERE`] for a removed
    /// control byte.
    pub fn visual_index(&self, logical: usize) -> Result<i32, BidiError> {
        if logical >= self.length {
            return Err(BidiError::IllegalArgument);
        }

        let visual = match self.direction {
            Direction::Ltr => logical as i32,
            Direction::Rtl => (self.length - logical - 1) as i32,
            Direction::Mixed => {
                let runs = self.runs();
                let mut visual_start = 0;
                let mut result = None;
                for run in runs {
                    let len = run.visual_limit - visual_start;
                    let offset = logical as i64 - run.logical_start as i64;
                    if offset >= 0 && (offset as usize) < len {
                        result = Some(if run.rtl {
                            (visual_start + len) as i32 - offset as i32 - 1
                        } else {
                            visual_start as i32 + offset as i32
                        });
                        break;
                    }
                    visual_start = run.visual_limit;
                }
                match result {
                    Some(v) => v,
                    None => return Ok(MAP_NOWHERE),
                }
            }
        };

        if !self.insert_points.is_empty() {
            // Add the number of marks inserted before the visual index.
            let mut mark_found = 0;
            for run in self.runs() {
                if run.insert_remove & MarkFlags::BEFORE != 0 {
                    mark_found += 1;
                }
                if (visual as usize) < run.visual_limit {
                    return Ok(visual + mark_found);
                }
                if run.insert_remove & MarkFlags::AFTER != 0 {
                    mark_found += 1;
                }
            }
            return Ok(visual + mark_found);
        } else if self.control_count > 0 {
            let control_bytes = self.control_byte_map();
            if control_bytes[logical] {
                return Ok(MAP_NOWHERE);
            }
            // Subtract the number of control bytes before the visual index.
            let runs = self.runs();
            let mut control_found = 0;
            let mut visual_start = 0;
            for run in runs {
                let len = run.visual_limit - visual_start;
                let insert_remove = run.insert_remove;
                if visual as usize >= run.visual_limit {
                    control_found -= insert_remove;
                    visual_start = run.visual_limit;
                    continue;
                }
                if insert_remove == 0 {
                    return Ok(visual - control_found);
                }
                // Count control bytes visually before the target within
                // this run: logically before it for LTR, after it for RTL.
                let (start, end) = if run.rtl {
                    (logical + 1, run.logical_start + len)
                } else {
                    (run.logical_start, logical)
                };
                let found = control_bytes[start..end].iter().filter(|&&b| b).count();
                return Ok(visual - control_found - found as i32);
            }
        }

        Ok(visual)
    }

    /// Logical position of the byte at visual position `visual`. Returns
    /// [`MAP_NOWHERE`] for an inserted mark.
    pub fn logical_index(&self, visual: usize) -> Result<i32, BidiError> {
        if visual >= self.result_length {
            return Err(BidiError::IllegalArgument);
        }
        let mut visual = visual;

        if self.insert_points.is_empty() && self.control_count == 0 {
            match self.direction {
                Direction::Ltr => return Ok(visual as i32),
                Direction::Rtl => return Ok((self.length - visual - 1) as i32),
                Direction::Mixed => {}
            }
        }

        let runs = self.runs().to_vec();

        if !self.insert_points.is_empty() {
            // Subtract the number of marks until the visual index.
            let mut mark_found = 0_usize;
            let mut visual_start = 0;
            for run in &runs {
                let len = run.visual_limit - visual_start;
                if run.insert_remove & MarkFlags::BEFORE != 0 {
                    if visual <= visual_start + mark_found {
                        return Ok(MAP_NOWHERE);
                    }
                    mark_found += 1;
                }
                if visual < run.visual_limit + mark_found {
                    visual -= mark_found;
                    break;
                }
                if run.insert_remove & MarkFlags::AFTER != 0 {
                    if visual == visual_start + len + mark_found {
                        return Ok(MAP_NOWHERE);
                    }
                    mark_found += 1;
                }
                visual_start = run.visual_limit;
            }
        } else if self.control_count > 0 {
            // Add the number of removed control bytes until the visual
            // index.
            let control_bytes = self.control_byte_map();
            let mut control_found = 0_i32;
            let mut visual_start = 0;
            for run in &runs {
                let len = run.visual_limit - visual_start;
                let insert_remove = run.insert_remove;
                if visual as i32 >= run.visual_limit as i32 - control_found + insert_remove {
                    control_found -= insert_remove;
                    visual_start = run.visual_limit;
                    continue;
                }
                if insert_remove == 0 {
                    visual = (visual as i32 + control_found) as usize;
                    break;
                }
                for j in 0..len {
                    let b = if run.rtl {
                        run.logical_start + len - 1 - j
                    } else {
                        run.logical_start + j
                    };
                    if control_bytes[b] {
                        control_found += 1;
                    }
                    if visual as i32 + control_found == (visual_start + j) as i32 {
                        break;
                    }
                }
                visual = (visual as i32 + control_found) as usize;
                break;
            }
        }

        // Find the run containing the adjusted visual index.
        let i = if runs.len() <= 10 {
            let mut i = 0;
            while visual >= runs[i].visual_limit {
                i += 1;
            }
            i
        } else {
            let mut begin = 0;
            let mut limit = runs.len();
            loop {
                let i = (begin + limit) / 2;
                if visual >= runs[i].visual_limit {
                    begin = i + 1;
                } else if i == 0 || visual >= runs[i - 1].visual_limit {
                    break i;
                } else {
                    limit = i;
                }
            }
        };

        let run = runs[i];
        let visual_start = if i > 0 { runs[i - 1].visual_limit } else { 0 };
        if run.rtl {
            Ok((run.logical_start + run.visual_limit - visual - 1) as i32)
        } else {
            Ok((run.logical_start + visual - visual_start) as i32)
        }
    }

    /// Fills a logical→visual map of length `len()`. Positions of removed
    /// controls hold [`MAP_NOWHERE`].
    pub fn logical_map(&self) -> Vec<i32> {
        let mut map = vec![0_i32; self.length];
        if self.length > self.result_length {
            map.fill(MAP_NOWHERE);
        }

        let runs = self.runs();
        let mut visual_start = 0;
        for run in runs {
            let len = run.visual_limit - visual_start;
            if run.rtl {
                for j in 0..len {
                    map[run.logical_start + len - 1 - j] = (visual_start + j) as i32;
                }
            } else {
                for j in 0..len {
                    map[run.logical_start + j] = (visual_start + j) as i32;
                }
            }
            visual_start = run.visual_limit;
        }

        if !self.insert_points.is_empty() {
            let mut mark_found = 0_i32;
            let mut visual_start = 0;
            for run in runs {
                let len = run.visual_limit - visual_start;
                if run.insert_remove & MarkFlags::BEFORE != 0 {
                    mark_found += 1;
                }
                if mark_found > 0 {
                    for j in 0..len {
                        map[run.logical_start + j] += mark_found;
                    }
                }
                if run.insert_remove & MarkFlags::AFTER != 0 {
                    mark_found += 1;
                }
                visual_start = run.visual_limit;
            }
        } else if self.control_count > 0 {
            let control_bytes = self.control_byte_map();
            let mut control_found = 0_i32;
            let mut visual_start = 0;
            for run in runs {
                let len = run.visual_limit - visual_start;
                let insert_remove = run.insert_remove;
                if control_found - insert_remove == 0 {
                    visual_start = run.visual_limit;
                    continue;
                }
                if insert_remove == 0 {
                    for j in 0..len {
                        map[run.logical_start + j] -= control_found;
                    }
                    visual_start = run.visual_limit;
                    continue;
                }
                for j in 0..len {
                    let b = if run.rtl {
                        run.logical_start + len - 1 - j
                    } else {
                        run.logical_start + j
                    };
                    if control_bytes[b] {
                        control_found += 1;
                        map[b] = MAP_NOWHERE;
                    } else {
                        map[b] -= control_found;
                    }
                }
                visual_start = run.visual_limit;
            }
        }
        map
    }

    /// Fills a visual→logical map of length `result_length()`. Positions of
    /// inserted marks hold [`MAP_NOWHERE`].
    pub fn visual_map(&self) -> Vec<i32> {
        let runs = self.runs();
        let mut map = Vec::with_capacity(self.result_length.max(self.length));

        let mut visual_start = 0;
        for run in runs {
            let len = run.visual_limit - visual_start;
            if run.rtl {
                for j in 0..len {
                    map.push((run.logical_start + len - 1 - j) as i32);
                }
            } else {
                for j in 0..len {
                    map.push((run.logical_start + j) as i32);
                }
            }
            visual_start = run.visual_limit;
        }

        if !self.insert_points.is_empty() {
            let mut mark_found = 0_usize;
            for run in runs {
                if run.insert_remove & MarkFlags::BEFORE != 0 {
                    mark_found += 1;
                }
                if run.insert_remove & MarkFlags::AFTER != 0 {
                    mark_found += 1;
                }
            }
            // Move back indexes by the number of preceding marks.
            map.resize(self.result_length, MAP_NOWHERE);
            let mut k = self.result_length;
            for (i, run) in runs.iter().enumerate().rev() {
                if mark_found == 0 {
                    break;
                }
                if run.insert_remove & MarkFlags::AFTER != 0 {
                    k -= 1;
                    map[k] = MAP_NOWHERE;
                    mark_found -= 1;
                }
                let visual_start = if i > 0 { runs[i - 1].visual_limit } else { 0 };
                let mut j = run.visual_limit;
                while j > visual_start && mark_found > 0 {
                    j -= 1;
                    k -= 1;
                    map[k] = map[j];
                }
                if run.insert_remove & MarkFlags::BEFORE != 0 {
                    k -= 1;
                    map[k] = MAP_NOWHERE;
                    mark_found -= 1;
                }
            }
        } else if self.control_count > 0 {
            // Compress out the removed control bytes.
            let control_bytes = self.control_byte_map();
            let mut k = 0;
            for j in 0..self.length {
                let b = map[j] as usize;
                if !control_bytes[b] {
                    map[k] = map[j];
                    k += 1;
                }
            }
            map.truncate(k);
        }
        map
    }

    /// Per-byte flag: true for every byte of a bidi control character.
    fn control_byte_map(&self) -> Vec<bool> {
        let mut map = vec![false; self.length];
        for (idx, ch) in self.text.char_indices() {
            if is_bidi_control(ch) {
                for b in idx..idx + ch.len_utf8() {
                    map[b] = true;
                }
            }
        }
        map
    }
}

/// Reorders same-level run sequences: for each level from the maximum down
/// to `min_level | 1`, every maximal sequence of runs at or above that level
/// is reversed; an odd minimum level reverses the whole array once more.
fn reorder_line(
    runs: &mut [BidiRun],
    levels: &[u8],
    min_level: u8,
    max_level: u8,
    trailing_ws_start: usize,
    length: usize,
) {
    if max_level <= (min_level | 1) {
        return;
    }

    // Reorder only down to the lowest odd level; an odd minimum is handled
    // by the full reversal below.
    let min_level = min_level + 1;

    // The trailing WS run at the paragraph level never participates in the
    // per-level loops.
    let mut run_count = runs.len();
    if trailing_ws_start < length {
        run_count -= 1;
    }

    let mut level = max_level;
    loop {
        level -= 1;
        if level < min_level {
            break;
        }
        let mut first_run = 0;
        loop {
            while first_run < run_count && levels[runs[first_run].logical_start] < level {
                first_run += 1;
            }
            if first_run >= run_count {
                break;
            }
            let mut limit_run = first_run + 1;
            while limit_run < run_count && levels[runs[limit_run].logical_start] >= level {
                limit_run += 1;
            }
            runs[first_run..limit_run].reverse();
            if limit_run == run_count {
                break;
            }
            first_run = limit_run + 1;
        }
    }

    // An odd minimum level reverses everything, trailing WS run included.
    if min_level & 1 == 0 {
        runs.reverse();
    }
}

fn run_from_logical_index(runs: &[BidiRun], logical: usize) -> usize {
    let mut visual_start = 0;
    for (i, run) in runs.iter().enumerate() {
        let len = run.visual_limit - visual_start;
        if (run.logical_start..run.logical_start + len).contains(&logical) {
            return i;
        }
        visual_start = run.visual_limit;
    }
    unreachable!("logical index is always inside some run");
}
