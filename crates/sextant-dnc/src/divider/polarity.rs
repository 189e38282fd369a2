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

//! Splitting on the phase of the most uncertain ReLU.
//!
//! For every region the divider propagates bounds, scores each unfixed ReLU
//! by the polarity `(lb + ub) / (ub - lb)` of its input and splits on the
//! one closest to zero. A region without unfixed ReLUs is bisected along its
//! widest input instead.

use crate::{
    divider::{emit_children, halvings, largest_interval::LargestIntervalDivider, QueryDivider},
    subquery::SubQuery,
};
use sextant_engine::{
    branching::BranchingHeuristic,
    propagation::{store_for_split, Propagator},
    relu::{phase_split, ReluPhase},
};
use sextant_model::{index::ReluIndex, query::InputQuery, tightening::CaseSplit};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PolarityDivider<'a> {
    query: &'a InputQuery,
    propagator: Propagator,
    fallback: LargestIntervalDivider<'a>,
}

impl<'a> PolarityDivider<'a> {
    #[inline]
    pub fn new(query: &'a InputQuery, propagator: Propagator) -> Self {
        Self {
            query,
            propagator,
            fallback: LargestIntervalDivider::new(query),
        }
    }

    /// The ReLU to split `split` on, or `None` if propagation fixes every
    /// ReLU or proves the region empty.
    pub fn select_relu(&self, split: &CaseSplit) -> Option<ReluIndex> {
        let tolerance = *self.propagator.tightener().tolerance();
        let (mut store, outcome) = store_for_split(self.query, split, tolerance);
        if outcome.is_infeasible() {
            return None;
        }
        if self.propagator.propagate(self.query, &[], &mut store).is_err() {
            return None;
        }
        BranchingHeuristic::Polarity.select(self.query, &store, &tolerance)
    }

    fn divide(&self, split: &CaseSplit) -> [CaseSplit; 2] {
        match self.select_relu(split) {
            Some(index) => {
                let relu = self.query.relu(index);
                [ReluPhase::Active, ReluPhase::Inactive].map(|phase| {
                    split.extended(phase_split(relu, phase).tightenings().iter().copied())
                })
            }
            None => self.fallback.bisect(split),
        }
    }
}

impl QueryDivider for PolarityDivider<'_> {
    fn create_sub_queries(
        &self,
        count: usize,
        id_prefix: &str,
        depth: usize,
        base_split: &CaseSplit,
        local_timeout: Duration,
        out: &mut Vec<SubQuery>,
    ) {
        let mut splits = vec![base_split.clone()];
        for _ in 0..halvings(count) {
            splits = splits.iter().flat_map(|split| self.divide(split)).collect();
        }
        emit_children(splits, id_prefix, depth, local_timeout, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_engine::config::EngineConfig;
    use sextant_model::{
        index::VariableIndex,
        query::QueryBuilder,
        tightening::{BoundKind, Tightening},
    };

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    /// x0 ∈ [-1, 3], x1 ∈ [-2, 2]; b2 = x0, b3 = x1; f4 = relu(b2),
    /// f5 = relu(b3). The polarity of b3 is 0, the one of b2 is 0.5.
    fn query() -> InputQuery {
        let mut builder = QueryBuilder::new(6);
        builder
            .set_bounds(v(0), -1.0, 3.0)
            .set_bounds(v(1), -2.0, 2.0)
            .mark_input(v(0))
            .mark_input(v(1))
            .mark_output(v(4))
            .mark_output(v(5))
            .add_equation_from_terms([(1.0, v(0)), (-1.0, v(2))], 0.0)
            .add_equation_from_terms([(1.0, v(1)), (-1.0, v(3))], 0.0)
            .add_relu(v(2), v(4))
            .add_relu(v(3), v(5));
        builder.build()
    }

    fn divider(query: &InputQuery) -> PolarityDivider<'_> {
        PolarityDivider::new(query, EngineConfig::default().propagator())
    }

    #[test]
    fn test_splits_on_most_balanced_relu() {
        let query = query();
        let divider = divider(&query);
        assert_eq!(divider.select_relu(&CaseSplit::new()), Some(ReluIndex::new(1)));

        let mut out = Vec::new();
        divider.create_sub_queries(2, "", 0, &CaseSplit::new(), Duration::from_secs(2), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].split().tightenings(),
            &[Tightening::lower(v(3), 0.0), Tightening::lower(v(5), 0.0)]
        );
        assert_eq!(
            out[1].split().tightenings(),
            &[Tightening::upper(v(3), 0.0), Tightening::upper(v(5), 0.0)]
        );
        assert!(out.iter().all(|q| q.depth() == 1));
    }

    #[test]
    fn test_second_halving_splits_the_other_relu() {
        let query = query();
        let divider = divider(&query);
        let mut out = Vec::new();
        divider.create_sub_queries(4, "1", 0, &CaseSplit::new(), Duration::ZERO, &mut out);

        assert_eq!(out.len(), 4);
        for child in &out {
            let on_b2 = child
                .split()
                .tightenings()
                .iter()
                .filter(|t| t.variable == v(2))
                .count();
            assert_eq!(on_b2, 1, "child {} does not split b2", child);
        }
    }

    #[test]
    fn test_falls_back_to_bisection_without_unfixed_relus() {
        let query = query();
        let divider = divider(&query);
        // Both ReLUs fixed active.
        let base = CaseSplit::from_tightenings(vec![
            Tightening::lower(v(0), 0.0),
            Tightening::lower(v(1), 0.0),
        ]);
        assert_eq!(divider.select_relu(&base), None);

        let mut out = Vec::new();
        divider.create_sub_queries(2, "", 0, &base, Duration::ZERO, &mut out);
        let last = |q: &SubQuery| q.split().tightenings().last().copied();
        // x0 ∈ [0, 3] is wider than x1 ∈ [0, 2].
        assert_eq!(last(&out[0]), Some(Tightening::upper(v(0), 1.5)));
        assert_eq!(last(&out[1]), Some(Tightening::lower(v(0), 1.5)));
    }

    #[test]
    fn test_infeasible_region_is_still_divided() {
        let query = query();
        let divider = divider(&query);
        let base = CaseSplit::from_tightenings(vec![Tightening::lower(v(0), 5.0)]);
        assert_eq!(divider.select_relu(&base), None);

        let mut out = Vec::new();
        divider.create_sub_queries(2, "", 0, &base, Duration::ZERO, &mut out);
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|q| q.split().tightenings()[0].kind == BoundKind::Lower));
    }
}
