// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use sextant_model::{index::VariableIndex, tightening::BoundKind};

/// A compact record of a single bound mutation.
///
/// `BoundTrailEntry` captures everything needed to undo one tightening:
/// - the variable that was affected,
/// - which of its two bounds changed,
/// - the bound value before the change,
/// - and the tightened flag before the change.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundTrailEntry {
    variable: VariableIndex,
    kind: BoundKind,
    old_value: f64,
    old_flag: bool,
}

impl BoundTrailEntry {
    #[inline(always)]
    pub fn new(variable: VariableIndex, kind: BoundKind, old_value: f64, old_flag: bool) -> Self {
        Self {
            variable,
            kind,
            old_value,
            old_flag,
        }
    }

    #[inline]
    pub fn variable(&self) -> VariableIndex {
        self.variable
    }

    #[inline]
    pub fn kind(&self) -> BoundKind {
        self.kind
    }

    /// Returns the bound value before the mutation.
    #[inline]
    pub fn old_value(&self) -> f64 {
        self.old_value
    }

    /// Returns the tightened flag before the mutation.
    #[inline]
    pub fn old_flag(&self) -> bool {
        self.old_flag
    }
}

impl std::fmt::Display for BoundTrailEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundTrailEntry(variable: {}, kind: {}, old_value: {}, old_flag: {})",
            self.variable, self.kind, self.old_value, self.old_flag
        )
    }
}

/// A linear undo log with frame markers for efficient backtracking.
///
/// `BoundTrail` records every bound mutation made while at least one frame
/// is open, enabling O(k) rollback of the k mutations of the innermost frame.
/// Typical usage:
/// 1. Call `push_frame()` when entering a search node,
/// 2. Call `record(...)` before each mutation,
/// 3. Call `pop_frame(...)` to restore the state at the start of the frame.
///
/// Mutations made while no frame is open are permanent and not recorded.
#[derive(Debug, Clone, Default)]
pub struct BoundTrail {
    /// The linear history of all changes made since the outermost frame.
    entries: Vec<BoundTrailEntry>,
    /// `frames[i]` stores the index in `entries` where depth `i + 1` began.
    frames: Vec<usize>,
}

impl BoundTrail {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a trail with room for `entries` mutations and `frames` open frames.
    #[inline]
    pub fn preallocated(entries: usize, frames: usize) -> Self {
        Self {
            entries: Vec::with_capacity(entries),
            frames: Vec::with_capacity(frames),
        }
    }

    #[inline]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of open frames.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frame is open.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Opens a new frame.
    #[inline]
    pub fn push_frame(&mut self) {
        self.frames.push(self.entries.len());
    }

    /// Records a mutation in the innermost frame. Does nothing at depth 0.
    #[inline]
    pub fn record(&mut self, entry: BoundTrailEntry) {
        if !self.frames.is_empty() {
            self.entries.push(entry);
        }
    }

    /// Closes the innermost frame, handing its entries to `undo` in reverse
    /// order of recording. Returns `false` if no frame was open.
    pub fn pop_frame<F>(&mut self, mut undo: F) -> bool
    where
        F: FnMut(&BoundTrailEntry),
    {
        let start = match self.frames.pop() {
            Some(start) => start,
            None => return false,
        };

        debug_assert!(
            start <= self.entries.len(),
            "called `BoundTrail::pop_frame` with a frame start beyond the trail: the len is {} but the start is {}",
            self.entries.len(),
            start
        );

        for entry in self.entries.drain(start..).rev() {
            undo(&entry);
        }
        true
    }

    /// Drops every frame and entry without undoing anything.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
        self.frames.clear();
    }
}

impl std::fmt::Display for BoundTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundTrail(depth: {}, entries: {})",
            self.depth(),
            self.num_entries()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: usize, old: f64) -> BoundTrailEntry {
        BoundTrailEntry::new(VariableIndex::new(v), BoundKind::Lower, old, false)
    }

    #[test]
    fn test_record_at_depth_zero_is_dropped() {
        let mut trail = BoundTrail::new();
        trail.record(entry(0, 1.0));
        assert_eq!(trail.num_entries(), 0);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_pop_frame_undoes_in_reverse_order() {
        let mut trail = BoundTrail::new();
        trail.push_frame();
        trail.record(entry(0, 1.0));
        trail.push_frame();
        trail.record(entry(1, 2.0));
        trail.record(entry(2, 3.0));

        let mut seen = Vec::new();
        assert!(trail.pop_frame(|e| seen.push(e.variable().get())));
        assert_eq!(seen, vec![2, 1]);
        assert_eq!(trail.depth(), 1);
        assert_eq!(trail.num_entries(), 1);

        seen.clear();
        assert!(trail.pop_frame(|e| seen.push(e.variable().get())));
        assert_eq!(seen, vec![0]);
        assert!(!trail.pop_frame(|_| unreachable!()));
    }

    #[test]
    fn test_empty_frame_pops_cleanly() {
        let mut trail = BoundTrail::preallocated(8, 2);
        trail.push_frame();
        let mut count = 0;
        assert!(trail.pop_frame(|_| count += 1));
        assert_eq!(count, 0);
    }
}
