// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact mapping from character index to per-character attribute values.
//!
//! A run set is a pair of parallel arrays: `values[i]` applies to the index
//! interval `[limits[i - 1], limits[i])` with `limits[-1] == 0`. Limits are
//! strictly increasing and, for a complete run set, `limits.last()` equals
//! the length of the covered text.

use crate::util::lower_bound;

#[derive(Clone, Debug, PartialEq)]
pub struct ValueRuns<T> {
    values: Vec<T>,
    limits: Vec<i32>,
}

impl<T> Default for ValueRuns<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValueRuns<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            limits: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            limits: Vec::with_capacity(capacity),
        }
    }

    /// Single-run set covering `[0, limit)`.
    pub fn single(value: T, limit: i32) -> Self {
        Self {
            values: vec![value],
            limits: vec![limit],
        }
    }

    /// Appends a run ending at `limit`. Limits must be supplied strictly
    /// increasing.
    pub fn add(&mut self, limit: i32, value: T) {
        debug_assert!(
            self.limits.last().map_or(true, |&last| limit > last),
            "run limits must be strictly increasing"
        );
        self.values.push(value);
        self.limits.push(limit);
    }

    /// Value of the run containing `index`. `index` must be below the final
    /// limit.
    pub fn get_value(&self, index: i32) -> &T {
        &self.values[self.get_run_index(index)]
    }

    /// Slot of the run containing `index`: the smallest `i` with
    /// `limits[i] > index`.
    pub fn get_run_index(&self, index: i32) -> usize {
        lower_bound(0, self.limits.len(), |i| self.limits[i] <= index)
    }

    pub fn get_run_value(&self, run_index: usize) -> &T {
        &self.values[run_index]
    }

    pub fn get_run_limit(&self, run_index: usize) -> i32 {
        self.limits[run_index]
    }

    /// Emits the runs covering `[offset, offset + length)` into `output`,
    /// rebased so the first run starts at zero and the last ends at
    /// `length`.
    pub fn get_runs_subset(&self, offset: i32, length: i32, output: &mut Self)
    where
        T: Clone,
    {
        let mut i = 0;
        while i < self.limits.len() && self.limits[i] < offset {
            i += 1;
        }
        while i < self.limits.len() {
            let new_limit = self.limits[i] - offset;
            if new_limit < length {
                output.add(new_limit, self.values[i].clone());
            } else {
                output.add(length, self.values[i].clone());
                break;
            }
            i += 1;
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.limits.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn run_count(&self) -> usize {
        self.limits.len()
    }

    /// The final limit, i.e. the length of the covered domain.
    pub fn limit(&self) -> i32 {
        self.limits.last().copied().unwrap_or(0)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn limits(&self) -> &[i32] {
        &self.limits
    }
}

/// Stack-driven builder for run sets produced by push/pop style scopes.
///
/// `push` closes the run of the previous top value at `limit` and makes the
/// new value current; `pop` closes the current run (if it extends past the
/// last emitted limit) and restores the enclosing value.
#[derive(Clone, Debug)]
pub struct ValueRunBuilder<T: Clone> {
    runs: ValueRuns<T>,
    stack: Vec<T>,
}

impl<T: Clone> ValueRunBuilder<T> {
    pub fn new(base_value: T) -> Self {
        Self {
            runs: ValueRuns::new(),
            stack: vec![base_value],
        }
    }

    pub fn push(&mut self, limit: i32, value: T) {
        let top = self.stack.last().expect("builder stack is never empty");
        if self.runs.is_empty() || self.runs.limit() < limit {
            self.runs.add(limit, top.clone());
        }
        self.stack.push(value);
    }

    pub fn pop(&mut self, limit: i32) {
        if self.runs.is_empty() || self.runs.limit() < limit {
            let top = self.stack.last().expect("builder stack is never empty");
            self.runs.add(limit, top.clone());
        }
        self.stack.pop();
    }

    pub fn base_value(&self) -> &T {
        &self.stack[0]
    }

    pub fn current_value(&self) -> &T {
        self.stack.last().expect("builder stack is never empty")
    }

    pub fn finish(self) -> ValueRuns<T> {
        self.runs
    }
}

/// Walks any number of run sets in lockstep and invokes `func` once per
/// intersection interval with the interval limit and the current value from
/// each set. All sets must share the same domain.
pub fn iterate_run_intersections<'a, T, U>(
    a: &'a ValueRuns<T>,
    b: &'a ValueRuns<U>,
    mut func: impl FnMut(i32, &'a T, &'a U),
) {
    let max_limit = a.limit().max(b.limit());
    let mut min_limit = 0;
    let (mut ia, mut ib) = (0, 0);
    while min_limit < max_limit {
        min_limit = a.limits()[ia].min(b.limits()[ib]);
        func(min_limit, &a.values()[ia], &b.values()[ib]);
        ia += usize::from(a.limits()[ia] <= min_limit);
        ib += usize::from(b.limits()[ib] <= min_limit);
    }
}

/// Three-way variant of [`iterate_run_intersections`].
pub fn iterate_run_intersections3<'a, T, U, V>(
    a: &'a ValueRuns<T>,
    b: &'a ValueRuns<U>,
    c: &'a ValueRuns<V>,
    mut func: impl FnMut(i32, &'a T, &'a U, &'a V),
) {
    let max_limit = a.limit().max(b.limit()).max(c.limit());
    let mut min_limit = 0;
    let (mut ia, mut ib, mut ic) = (0, 0, 0);
    while min_limit < max_limit {
        min_limit = a.limits()[ia].min(b.limits()[ib]).min(c.limits()[ic]);
        func(min_limit, &a.values()[ia], &b.values()[ib], &c.values()[ic]);
        ia += usize::from(a.limits()[ia] <= min_limit);
        ib += usize::from(b.limits()[ib] <= min_limit);
        ic += usize::from(c.limits()[ic] <= min_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueRuns<char> {
        let mut runs = ValueRuns::new();
        runs.add(3, 'a');
        runs.add(7, 'b');
        runs.add(12, 'c');
        runs
    }

    #[test]
    fn point_lookup() {
        let runs = sample();
        assert_eq!(*runs.get_value(0), 'a');
        assert_eq!(*runs.get_value(2), 'a');
        assert_eq!(*runs.get_value(3), 'b');
        assert_eq!(*runs.get_value(11), 'c');
        assert_eq!(runs.get_run_index(6), 1);
    }

    #[test]
    fn subset_agrees_with_point_lookup() {
        let runs = sample();
        for offset in 0..12 {
            for length in 1..=(12 - offset) {
                let mut subset = ValueRuns::new();
                runs.get_runs_subset(offset, length, &mut subset);
                assert_eq!(subset.limit(), length);
                for i in 0..length {
                    assert_eq!(
                        subset.get_value(i),
                        runs.get_value(offset + i),
                        "mismatch at offset {offset} length {length} index {i}"
                    );
                }
            }
        }
    }

    #[test]
    fn builder_push_pop() {
        let mut builder = ValueRunBuilder::new('x');
        builder.push(2, 'y');
        builder.pop(5);
        builder.pop(8);
        let runs = builder.finish();
        assert_eq!(runs.limits(), &[2, 5, 8]);
        assert_eq!(runs.values(), &['x', 'y', 'x']);
    }

    #[test]
    fn builder_empty_scope_emits_nothing_extra() {
        let mut builder = ValueRunBuilder::new(1);
        builder.push(4, 2);
        // Scope closes at the same limit it opened: no zero-width run.
        builder.pop(4);
        builder.pop(9);
        let runs = builder.finish();
        assert_eq!(runs.limits(), &[4, 9]);
        assert_eq!(runs.values(), &[1, 1]);
    }

    #[test]
    fn intersections_visit_every_boundary() {
        let mut a = ValueRuns::new();
        a.add(4, 'a');
        a.add(10, 'b');
        let mut b = ValueRuns::new();
        b.add(6, 1);
        b.add(10, 2);
        let mut seen = Vec::new();
        iterate_run_intersections(&a, &b, |limit, &x, &y| seen.push((limit, x, y)));
        assert_eq!(seen, vec![(4, 'a', 1), (6, 'b', 1), (10, 'b', 2)]);
    }
}
