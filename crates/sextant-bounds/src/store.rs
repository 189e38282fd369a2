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

//! # Bound Store
//!
//! `BoundStore` owns the current lower and upper bound of every variable of a
//! query, together with a "tightened" flag per bound that consumers use to find
//! the variables that changed since they last looked.
//!
//! ## Semantics
//!
//! - Bounds start at `(-∞, +∞)`.
//! - A tightening is accepted only if it is strictly tighter than the current
//!   bound; anything else is rejected and leaves the store bit-identical.
//! - After an accepted tightening the store checks `lower <= upper` (up to the
//!   store's tolerance). A violation is reported as `Infeasible`. The offending
//!   bound stays in place and is recorded on the trail, so popping the
//!   enclosing checkpoint restores the consistent state.
//! - Bounds widen only through `pop_checkpoint`. Mutations made while no
//!   checkpoint is open are permanent.
//!
//! ## Usage
//!
//! ```rust
//! use sextant_bounds::store::{BoundStore, TightenOutcome};
//! use sextant_model::index::VariableIndex;
//!
//! let mut store = BoundStore::new();
//! store.initialize(2);
//! let x = VariableIndex::new(0);
//!
//! assert_eq!(store.tighten_lower_bound(x, 0.0), TightenOutcome::Accepted);
//! store.push_checkpoint();
//! assert_eq!(store.tighten_upper_bound(x, -1.0), TightenOutcome::Infeasible);
//! store.pop_checkpoint();
//! assert_eq!(store.upper_bound(x), f64::INFINITY);
//! assert_eq!(store.lower_bound(x), 0.0);
//! ```

use crate::{
    error::BoundError,
    observer::BoundObserver,
    trail::{BoundTrail, BoundTrailEntry},
};
use fixedbitset::FixedBitSet;
use sextant_core::float::Tolerance;
use sextant_model::{
    index::VariableIndex,
    tightening::{BoundKind, Tightening},
};
use std::sync::Weak;

/// The result of a single tightening attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TightenOutcome {
    /// The bound was strictly tightened and the interval is still consistent.
    Accepted,
    /// The new value was not tighter; nothing changed.
    Rejected,
    /// The bound was tightened but now `lower > upper`.
    Infeasible,
}

impl TightenOutcome {
    #[inline]
    pub fn is_infeasible(self) -> bool {
        self == TightenOutcome::Infeasible
    }

    #[inline]
    pub fn is_accepted(self) -> bool {
        self == TightenOutcome::Accepted
    }

    /// Combines two outcomes of a batch: infeasibility dominates, then
    /// acceptance.
    #[inline]
    pub fn merge(self, other: TightenOutcome) -> TightenOutcome {
        match (self, other) {
            (TightenOutcome::Infeasible, _) | (_, TightenOutcome::Infeasible) => {
                TightenOutcome::Infeasible
            }
            (TightenOutcome::Accepted, _) | (_, TightenOutcome::Accepted) => {
                TightenOutcome::Accepted
            }
            _ => TightenOutcome::Rejected,
        }
    }
}

impl std::fmt::Display for TightenOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TightenOutcome::Accepted => write!(f, "Accepted"),
            TightenOutcome::Rejected => write!(f, "Rejected"),
            TightenOutcome::Infeasible => write!(f, "Infeasible"),
        }
    }
}

/// A deep copy of all bounds of a store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundSnapshot {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoundSnapshot {
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    #[inline]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }
}

/// Per-variable bounds with trail-based backtracking.
pub struct BoundStore {
    lower: Vec<f64>,
    upper: Vec<f64>,
    lower_tightened: FixedBitSet,
    upper_tightened: FixedBitSet,
    trail: BoundTrail,
    observer: Option<Weak<dyn BoundObserver>>,
    tolerance: Tolerance,
}

impl Default for BoundStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundStore {
    /// Creates an empty store with the default tolerance.
    #[inline]
    pub fn new() -> Self {
        Self::with_tolerance(Tolerance::default())
    }

    #[inline]
    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            lower: Vec::new(),
            upper: Vec::new(),
            lower_tightened: FixedBitSet::new(),
            upper_tightened: FixedBitSet::new(),
            trail: BoundTrail::new(),
            observer: None,
            tolerance,
        }
    }

    #[inline]
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.lower.len()
    }

    /// Registers one fresh variable with bounds `(-∞, +∞)`.
    pub fn register_variable(&mut self) -> VariableIndex {
        let index = VariableIndex::new(self.lower.len());
        self.lower.push(f64::NEG_INFINITY);
        self.upper.push(f64::INFINITY);
        self.lower_tightened.grow(self.lower.len());
        self.upper_tightened.grow(self.upper.len());
        index
    }

    /// Registers `num_variables` fresh variables.
    ///
    /// Must be called on an empty store.
    pub fn initialize(&mut self, num_variables: usize) {
        debug_assert!(
            self.lower.is_empty(),
            "called `BoundStore::initialize` on a store that already holds {} variables",
            self.lower.len()
        );

        self.lower = vec![f64::NEG_INFINITY; num_variables];
        self.upper = vec![f64::INFINITY; num_variables];
        self.lower_tightened = FixedBitSet::with_capacity(num_variables);
        self.upper_tightened = FixedBitSet::with_capacity(num_variables);
    }

    /// Registers the observer notified about accepted tightenings, replacing
    /// any previous one. The store never keeps the observer alive.
    #[inline]
    pub fn register_observer(&mut self, observer: Weak<dyn BoundObserver>) {
        self.observer = Some(observer);
    }

    #[inline]
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    #[inline]
    fn check_variable(&self, variable: VariableIndex, caller: &str) -> usize {
        let index = variable.get();
        assert!(
            index < self.lower.len(),
            "called `BoundStore::{}` with variable index out of bounds: the len is {} but the index is {}",
            caller,
            self.lower.len(),
            index
        );
        index
    }

    /// Returns the lower bound of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` was never registered.
    #[inline]
    pub fn lower_bound(&self, variable: VariableIndex) -> f64 {
        let index = self.check_variable(variable, "lower_bound");
        self.lower[index]
    }

    /// Returns the upper bound of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` was never registered.
    #[inline]
    pub fn upper_bound(&self, variable: VariableIndex) -> f64 {
        let index = self.check_variable(variable, "upper_bound");
        self.upper[index]
    }

    #[inline]
    pub fn try_lower_bound(&self, variable: VariableIndex) -> Result<f64, BoundError> {
        self.lower
            .get(variable.get())
            .copied()
            .ok_or(BoundError::OutOfRange {
                variable,
                num_variables: self.lower.len(),
            })
    }

    #[inline]
    pub fn try_upper_bound(&self, variable: VariableIndex) -> Result<f64, BoundError> {
        self.upper
            .get(variable.get())
            .copied()
            .ok_or(BoundError::OutOfRange {
                variable,
                num_variables: self.upper.len(),
            })
    }

    #[inline]
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    #[inline]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Returns `true` if both bounds of `variable` coincide.
    #[inline]
    pub fn is_fixed(&self, variable: VariableIndex) -> bool {
        let index = self.check_variable(variable, "is_fixed");
        self.tolerance.are_equal(self.lower[index], self.upper[index])
    }

    /// Returns `true` if `lower <= upper` holds for `variable`.
    #[inline]
    pub fn is_consistent(&self, variable: VariableIndex) -> bool {
        let index = self.check_variable(variable, "is_consistent");
        self.tolerance.gte(self.upper[index], self.lower[index])
    }

    /// Raises the lower bound of `variable` to `value` if that is strictly tighter.
    ///
    /// # Panics
    ///
    /// Panics if `variable` was never registered.
    pub fn tighten_lower_bound(&mut self, variable: VariableIndex, value: f64) -> TightenOutcome {
        let index = self.check_variable(variable, "tighten_lower_bound");
        if !(value > self.lower[index]) {
            return TightenOutcome::Rejected;
        }

        self.trail.record(BoundTrailEntry::new(
            variable,
            BoundKind::Lower,
            self.lower[index],
            self.lower_tightened.contains(index),
        ));
        self.lower[index] = value;
        self.lower_tightened.insert(index);

        if !self.tolerance.gte(self.upper[index], value) {
            tracing::trace!(
                "lower bound {} on {} crosses upper bound {}",
                value,
                variable,
                self.upper[index]
            );
            return TightenOutcome::Infeasible;
        }

        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.on_lower_tightened(variable, value);
        }
        TightenOutcome::Accepted
    }

    /// Lowers the upper bound of `variable` to `value` if that is strictly tighter.
    ///
    /// # Panics
    ///
    /// Panics if `variable` was never registered.
    pub fn tighten_upper_bound(&mut self, variable: VariableIndex, value: f64) -> TightenOutcome {
        let index = self.check_variable(variable, "tighten_upper_bound");
        if !(value < self.upper[index]) {
            return TightenOutcome::Rejected;
        }

        self.trail.record(BoundTrailEntry::new(
            variable,
            BoundKind::Upper,
            self.upper[index],
            self.upper_tightened.contains(index),
        ));
        self.upper[index] = value;
        self.upper_tightened.insert(index);

        if !self.tolerance.gte(value, self.lower[index]) {
            tracing::trace!(
                "upper bound {} on {} crosses lower bound {}",
                value,
                variable,
                self.lower[index]
            );
            return TightenOutcome::Infeasible;
        }

        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.on_upper_tightened(variable, value);
        }
        TightenOutcome::Accepted
    }

    /// Applies a single `Tightening`.
    #[inline]
    pub fn apply_tightening(&mut self, tightening: &Tightening) -> TightenOutcome {
        match tightening.kind {
            BoundKind::Lower => self.tighten_lower_bound(tightening.variable, tightening.value),
            BoundKind::Upper => self.tighten_upper_bound(tightening.variable, tightening.value),
        }
    }

    /// Applies a batch of tightenings, stopping at the first infeasible one.
    pub fn apply_tightenings<'a, I>(&mut self, tightenings: I) -> TightenOutcome
    where
        I: IntoIterator<Item = &'a Tightening>,
    {
        let mut outcome = TightenOutcome::Rejected;
        for tightening in tightenings {
            outcome = outcome.merge(self.apply_tightening(tightening));
            if outcome.is_infeasible() {
                break;
            }
        }
        outcome
    }

    /// Sets both bounds of `variable` to the given values as tightenings.
    #[inline]
    pub fn tighten_bounds(
        &mut self,
        variable: VariableIndex,
        lower: f64,
        upper: f64,
    ) -> TightenOutcome {
        let outcome = self.tighten_lower_bound(variable, lower);
        if outcome.is_infeasible() {
            return outcome;
        }
        outcome.merge(self.tighten_upper_bound(variable, upper))
    }

    /// Opens a checkpoint. Subsequent mutations are undone by the matching
    /// `pop_checkpoint`.
    #[inline]
    pub fn push_checkpoint(&mut self) {
        self.trail.push_frame();
    }

    /// Restores every bound and flag mutated since the matching
    /// `push_checkpoint` and discards the checkpoint.
    pub fn pop_checkpoint(&mut self) {
        debug_assert!(
            self.trail.depth() > 0,
            "called `BoundStore::pop_checkpoint` without an open checkpoint"
        );

        let Self {
            lower,
            upper,
            lower_tightened,
            upper_tightened,
            trail,
            ..
        } = self;

        trail.pop_frame(|entry| {
            let index = entry.variable().get();
            match entry.kind() {
                BoundKind::Lower => {
                    lower[index] = entry.old_value();
                    lower_tightened.set(index, entry.old_flag());
                }
                BoundKind::Upper => {
                    upper[index] = entry.old_value();
                    upper_tightened.set(index, entry.old_flag());
                }
            }
        });
    }

    /// Returns the number of open checkpoints.
    #[inline]
    pub fn depth(&self) -> usize {
        self.trail.depth()
    }

    #[inline]
    pub fn was_lower_tightened(&self, variable: VariableIndex) -> bool {
        let index = self.check_variable(variable, "was_lower_tightened");
        self.lower_tightened.contains(index)
    }

    #[inline]
    pub fn was_upper_tightened(&self, variable: VariableIndex) -> bool {
        let index = self.check_variable(variable, "was_upper_tightened");
        self.upper_tightened.contains(index)
    }

    /// Iterates over every variable whose lower or upper bound was tightened
    /// since the flags were last cleared.
    pub fn tightened_variables(&self) -> impl Iterator<Item = VariableIndex> + '_ {
        self.lower_tightened
            .union(&self.upper_tightened)
            .map(VariableIndex::new)
    }

    /// Resets all tightened flags. The reset itself is not recorded on the
    /// trail; a later `pop_checkpoint` may restore flags set before it.
    #[inline]
    pub fn clear_tightened_flags(&mut self) {
        self.lower_tightened.clear();
        self.upper_tightened.clear();
    }

    /// Takes a deep copy of all bounds.
    #[inline]
    pub fn snapshot(&self) -> BoundSnapshot {
        BoundSnapshot {
            lower: self.lower.clone(),
            upper: self.upper.clone(),
        }
    }

    /// Re-applies `snapshot` as tightenings on the current state.
    ///
    /// Only bounds strictly tighter than the current ones change, so applying a
    /// snapshot never widens anything, and everything it changes is recorded
    /// on the trail like any other tightening.
    pub fn apply_snapshot(&mut self, snapshot: &BoundSnapshot) -> Result<TightenOutcome, BoundError> {
        if snapshot.num_variables() != self.num_variables() {
            return Err(BoundError::SnapshotMismatch {
                snapshot: snapshot.num_variables(),
                store: self.num_variables(),
            });
        }

        let mut outcome = TightenOutcome::Rejected;
        for (index, (&lb, &ub)) in snapshot.lower.iter().zip(&snapshot.upper).enumerate() {
            outcome = outcome.merge(self.tighten_bounds(VariableIndex::new(index), lb, ub));
            if outcome.is_infeasible() {
                break;
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for BoundStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundStore")
            .field("num_variables", &self.num_variables())
            .field("depth", &self.depth())
            .field("trail", &self.trail.num_entries())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl std::fmt::Display for BoundStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "BoundStore(variables: {}, depth: {})",
            self.num_variables(),
            self.depth()
        )?;
        for (i, (lb, ub)) in self.lower.iter().zip(&self.upper).enumerate() {
            writeln!(f, "  {} in [{}, {}]", VariableIndex::new(i), lb, ub)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn x(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    fn store(n: usize) -> BoundStore {
        let mut store = BoundStore::new();
        store.initialize(n);
        store
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<(BoundKind, usize, f64)>>,
    }

    impl BoundObserver for RecordingObserver {
        fn on_lower_tightened(&self, variable: VariableIndex, value: f64) {
            self.events
                .lock()
                .unwrap()
                .push((BoundKind::Lower, variable.get(), value));
        }

        fn on_upper_tightened(&self, variable: VariableIndex, value: f64) {
            self.events
                .lock()
                .unwrap()
                .push((BoundKind::Upper, variable.get(), value));
        }
    }

    #[test]
    fn test_new_variables_are_unbounded() {
        let mut store = BoundStore::new();
        let v = store.register_variable();
        assert_eq!(v, x(0));
        assert_eq!(store.lower_bound(v), f64::NEG_INFINITY);
        assert_eq!(store.upper_bound(v), f64::INFINITY);
        assert!(!store.was_lower_tightened(v));
    }

    #[test]
    fn test_rejected_tightening_leaves_state_identical() {
        let mut store = store(1);
        assert_eq!(store.tighten_lower_bound(x(0), 2.0), TightenOutcome::Accepted);
        store.clear_tightened_flags();

        store.push_checkpoint();
        assert_eq!(store.tighten_lower_bound(x(0), 2.0), TightenOutcome::Rejected);
        assert_eq!(store.tighten_lower_bound(x(0), 1.0), TightenOutcome::Rejected);
        assert_eq!(store.lower_bound(x(0)).to_bits(), 2.0f64.to_bits());
        assert!(!store.was_lower_tightened(x(0)));
        assert_eq!(store.trail.num_entries(), 0);
    }

    #[test]
    fn test_infeasible_tightening_is_reported_and_undone_by_pop() {
        let mut store = store(1);
        store.tighten_bounds(x(0), 0.0, 1.0);

        store.push_checkpoint();
        assert_eq!(store.tighten_lower_bound(x(0), 5.0), TightenOutcome::Infeasible);
        assert_eq!(store.lower_bound(x(0)), 5.0);
        store.pop_checkpoint();

        assert_eq!(store.lower_bound(x(0)), 0.0);
        assert!(store.is_consistent(x(0)));
    }

    #[test]
    fn test_crossing_within_tolerance_is_not_infeasible() {
        let mut store = BoundStore::with_tolerance(Tolerance::new(1e-6));
        store.initialize(1);
        store.tighten_upper_bound(x(0), 1.0);
        assert_eq!(
            store.tighten_lower_bound(x(0), 1.0 + 1e-7),
            TightenOutcome::Accepted
        );
        assert!(store.is_fixed(x(0)));
    }

    #[test]
    fn test_depth_zero_mutations_are_permanent() {
        let mut store = store(1);
        store.tighten_lower_bound(x(0), 3.0);
        store.push_checkpoint();
        store.tighten_lower_bound(x(0), 4.0);
        store.pop_checkpoint();
        assert_eq!(store.lower_bound(x(0)), 3.0);
        assert_eq!(store.depth(), 0);
    }

    #[test]
    fn test_nested_checkpoints_restore_flags() {
        let mut store = store(2);
        store.push_checkpoint();
        store.tighten_upper_bound(x(1), 10.0);
        store.push_checkpoint();
        store.tighten_upper_bound(x(1), 5.0);
        store.tighten_lower_bound(x(0), -1.0);
        store.pop_checkpoint();

        assert_eq!(store.upper_bound(x(1)), 10.0);
        assert!(store.was_upper_tightened(x(1)));
        assert!(!store.was_lower_tightened(x(0)));

        store.pop_checkpoint();
        assert_eq!(store.upper_bound(x(1)), f64::INFINITY);
        assert!(!store.was_upper_tightened(x(1)));
    }

    #[test]
    fn test_observer_fires_only_for_accepted() {
        let observer = Arc::new(RecordingObserver::default());
        let weak: Weak<dyn BoundObserver> = Arc::downgrade(&observer) as Weak<dyn BoundObserver>;

        let mut store = store(1);
        store.register_observer(weak);
        store.tighten_upper_bound(x(0), 1.0);
        store.tighten_upper_bound(x(0), 2.0);
        store.tighten_lower_bound(x(0), 0.5);
        store.tighten_lower_bound(x(0), 3.0);

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![(BoundKind::Upper, 0, 1.0), (BoundKind::Lower, 0, 0.5)]
        );
    }

    #[test]
    fn test_dropped_observer_is_ignored() {
        let observer = Arc::new(RecordingObserver::default());
        let mut store = store(1);
        store.register_observer(Arc::downgrade(&observer) as Weak<dyn BoundObserver>);
        drop(observer);
        assert_eq!(store.tighten_lower_bound(x(0), 1.0), TightenOutcome::Accepted);
    }

    #[test]
    fn test_try_accessors_report_out_of_range() {
        let store = store(1);
        assert_eq!(store.try_lower_bound(x(0)), Ok(f64::NEG_INFINITY));
        assert_eq!(
            store.try_upper_bound(x(3)),
            Err(BoundError::OutOfRange {
                variable: x(3),
                num_variables: 1
            })
        );
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_unregistered_variable_panics() {
        let store = store(1);
        let _ = store.lower_bound(x(1));
    }

    #[test]
    fn test_snapshot_applies_as_tightenings() {
        let mut source = store(2);
        source.tighten_bounds(x(0), -1.0, 1.0);
        source.tighten_bounds(x(1), 0.0, 4.0);
        let snapshot = source.snapshot();

        let mut target = store(2);
        target.tighten_upper_bound(x(1), 2.0);
        assert_eq!(target.apply_snapshot(&snapshot), Ok(TightenOutcome::Accepted));
        assert_eq!(target.lower_bound(x(0)), -1.0);
        assert_eq!(target.upper_bound(x(1)), 2.0);

        let mut small = store(1);
        assert!(matches!(
            small.apply_snapshot(&snapshot),
            Err(BoundError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn test_tightened_variables_lists_union() {
        let mut store = store(3);
        store.tighten_lower_bound(x(0), 0.0);
        store.tighten_upper_bound(x(2), 0.0);
        let changed: Vec<usize> = store.tightened_variables().map(|v| v.get()).collect();
        assert_eq!(changed, vec![0, 2]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Lower(usize, f64),
        Upper(usize, f64),
        Push,
        Pop,
    }

    fn op_strategy(n: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..n, -10.0f64..10.0).prop_map(|(v, x)| Op::Lower(v, x)),
            (0..n, -10.0f64..10.0).prop_map(|(v, x)| Op::Upper(v, x)),
            Just(Op::Push),
            Just(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn prop_bounds_consistent_unless_infeasible_reported(
            ops in proptest::collection::vec(op_strategy(4), 1..64)
        ) {
            let mut store = store(4);
            for op in ops {
                let outcome = match op {
                    Op::Lower(v, value) => store.tighten_lower_bound(x(v), value),
                    Op::Upper(v, value) => store.tighten_upper_bound(x(v), value),
                    Op::Push => { store.push_checkpoint(); continue; }
                    Op::Pop => {
                        if store.depth() > 0 { store.pop_checkpoint(); }
                        continue;
                    }
                };
                if outcome.is_infeasible() {
                    // A branch would be abandoned here.
                    break;
                }
                for v in 0..4 {
                    prop_assert!(store.is_consistent(x(v)));
                }
            }
        }

        #[test]
        fn prop_push_mutate_pop_restores_exactly(
            setup in proptest::collection::vec(op_strategy(4), 0..16),
            ops in proptest::collection::vec(op_strategy(4), 0..64)
        ) {
            let mut store = store(4);
            for op in setup {
                match op {
                    Op::Lower(v, value) => { store.tighten_lower_bound(x(v), value); }
                    Op::Upper(v, value) => { store.tighten_upper_bound(x(v), value); }
                    _ => {}
                }
            }
            let before_lower: Vec<u64> = store.lower_bounds().iter().map(|b| b.to_bits()).collect();
            let before_upper: Vec<u64> = store.upper_bounds().iter().map(|b| b.to_bits()).collect();
            let before_flags: Vec<(bool, bool)> = (0..4)
                .map(|v| (store.was_lower_tightened(x(v)), store.was_upper_tightened(x(v))))
                .collect();

            store.push_checkpoint();
            let mut extra = 0;
            for op in ops {
                match op {
                    Op::Lower(v, value) => { store.tighten_lower_bound(x(v), value); }
                    Op::Upper(v, value) => { store.tighten_upper_bound(x(v), value); }
                    Op::Push => { store.push_checkpoint(); extra += 1; }
                    Op::Pop => if extra > 0 { store.pop_checkpoint(); extra -= 1; },
                }
            }
            for _ in 0..extra {
                store.pop_checkpoint();
            }
            store.pop_checkpoint();

            let after_lower: Vec<u64> = store.lower_bounds().iter().map(|b| b.to_bits()).collect();
            let after_upper: Vec<u64> = store.upper_bounds().iter().map(|b| b.to_bits()).collect();
            let after_flags: Vec<(bool, bool)> = (0..4)
                .map(|v| (store.was_lower_tightened(x(v)), store.was_upper_tightened(x(v))))
                .collect();
            prop_assert_eq!(before_lower, after_lower);
            prop_assert_eq!(before_upper, after_upper);
            prop_assert_eq!(before_flags, after_flags);
            prop_assert_eq!(store.depth(), 0);
        }
    }
}
