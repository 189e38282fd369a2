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

//! ReLU branching heuristics.
//!
//! Every heuristic picks among the ReLUs whose phase is not yet implied by
//! the current bounds, and returns `None` when all phases are fixed.

use crate::relu::{relu_phase, ReluPhase};
use sextant_bounds::store::BoundStore;
use sextant_core::float::{interval_width, Tolerance};
use sextant_model::{index::ReluIndex, query::InputQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BranchingHeuristic {
    /// The ReLU whose input interval is most balanced around zero.
    #[default]
    Polarity,
    /// The first unfixed ReLU in declaration order.
    EarliestRelu,
    /// The ReLU with the widest input interval.
    WidestInterval,
}

impl std::fmt::Display for BranchingHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchingHeuristic::Polarity => write!(f, "polarity"),
            BranchingHeuristic::EarliestRelu => write!(f, "earliest-relu"),
            BranchingHeuristic::WidestInterval => write!(f, "widest-interval"),
        }
    }
}

/// `(lb + ub) / (ub − lb)` of the interval `[lower, upper]`.
///
/// Lies in `[-1, 1]` for intervals containing zero; values near zero mean
/// the sign is most uncertain. Unbounded intervals score `1`.
#[inline]
pub fn polarity(lower: f64, upper: f64) -> f64 {
    if !lower.is_finite() || !upper.is_finite() || upper <= lower {
        return 1.0;
    }
    (lower + upper) / (upper - lower)
}

impl BranchingHeuristic {
    /// Selects the ReLU to branch on.
    pub fn select(
        self,
        query: &InputQuery,
        store: &BoundStore,
        tolerance: &Tolerance,
    ) -> Option<ReluIndex> {
        let mut unfixed = query
            .relus()
            .iter()
            .enumerate()
            .filter(|(_, relu)| relu_phase(relu, store, tolerance) == ReluPhase::Unfixed)
            .map(|(i, relu)| {
                let b = relu.b();
                (ReluIndex::new(i), store.lower_bound(b), store.upper_bound(b))
            });

        match self {
            BranchingHeuristic::EarliestRelu => unfixed.next().map(|(i, _, _)| i),
            BranchingHeuristic::Polarity => unfixed
                .min_by(|a, b| polarity(a.1, a.2).abs().total_cmp(&polarity(b.1, b.2).abs()))
                .map(|(i, _, _)| i),
            BranchingHeuristic::WidestInterval => unfixed
                .max_by(|a, b| {
                    interval_width(a.1, a.2)
                        .total_cmp(&interval_width(b.1, b.2))
                        // Prefer the earlier ReLU on ties.
                        .then(b.0.cmp(&a.0))
                })
                .map(|(i, _, _)| i),
        }
    }
}
