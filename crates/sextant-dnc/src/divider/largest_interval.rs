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

//! Bisection of the widest input interval.

use crate::{
    divider::{emit_children, halvings, QueryDivider},
    subquery::SubQuery,
};
use sextant_core::float::{interval_split_point, interval_width};
use sextant_model::{
    index::VariableIndex,
    query::InputQuery,
    tightening::{CaseSplit, Tightening},
};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct LargestIntervalDivider<'a> {
    query: &'a InputQuery,
}

impl<'a> LargestIntervalDivider<'a> {
    #[inline]
    pub fn new(query: &'a InputQuery) -> Self {
        Self { query }
    }

    /// The input variable with the widest interval inside `split`, with its
    /// bounds. Ties go to the variable declared first.
    pub fn widest_input(&self, split: &CaseSplit) -> Option<(VariableIndex, f64, f64)> {
        self.query
            .input_variables()
            .iter()
            .map(|&variable| {
                let (lower, upper) = split.bounds_of(
                    variable,
                    self.query.lower_bound(variable),
                    self.query.upper_bound(variable),
                );
                (variable, lower, upper)
            })
            .fold(None, |best: Option<(VariableIndex, f64, f64)>, candidate| match best {
                Some(b) if interval_width(b.1, b.2) >= interval_width(candidate.1, candidate.2) => {
                    Some(b)
                }
                _ => Some(candidate),
            })
    }

    /// Splits `split` in two along its widest input interval. Half-unbounded
    /// intervals are cut at a finite point, so both parts are strictly smaller.
    pub fn bisect(&self, split: &CaseSplit) -> [CaseSplit; 2] {
        match self.widest_input(split) {
            Some((variable, lower, upper)) => {
                let mid = interval_split_point(lower, upper);
                [
                    split.extended([Tightening::upper(variable, mid)]),
                    split.extended([Tightening::lower(variable, mid)]),
                ]
            }
            None => {
                tracing::debug!("query has no input variables, duplicating split {}", split);
                [split.clone(), split.clone()]
            }
        }
    }
}

impl QueryDivider for LargestIntervalDivider<'_> {
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
            splits = splits.iter().flat_map(|split| self.bisect(split)).collect();
        }
        emit_children(splits, id_prefix, depth, local_timeout, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sextant_model::query::QueryBuilder;

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    /// Two inputs, x0 ∈ [0, 4] and x1 ∈ [-1, 1], plus one non-input.
    fn query() -> InputQuery {
        let mut builder = QueryBuilder::new(3);
        builder
            .set_bounds(v(0), 0.0, 4.0)
            .set_bounds(v(1), -1.0, 1.0)
            .set_bounds(v(2), -100.0, 100.0)
            .mark_input(v(0))
            .mark_input(v(1))
            .mark_output(v(2))
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1)), (-1.0, v(2))], 0.0);
        builder.build()
    }

    fn boxes(query: &InputQuery, out: &[SubQuery]) -> Vec<[(f64, f64); 2]> {
        out.iter()
            .map(|q| {
                let b = |i: usize| q.split().bounds_of(v(i), query.lower_bound(v(i)), query.upper_bound(v(i)));
                [b(0), b(1)]
            })
            .collect()
    }

    #[test]
    fn test_bisects_widest_input() {
        let query = query();
        let divider = LargestIntervalDivider::new(&query);
        let mut out = Vec::new();
        divider.create_sub_queries(2, "", 0, &CaseSplit::new(), Duration::from_secs(1), &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id(), "1");
        assert_eq!(out[1].id(), "2");
        assert!(out.iter().all(|q| q.depth() == 1));
        assert!(out.iter().all(|q| q.timeout() == Duration::from_secs(1)));
        assert_eq!(
            boxes(&query, &out),
            vec![[(0.0, 2.0), (-1.0, 1.0)], [(2.0, 4.0), (-1.0, 1.0)]]
        );
    }

    #[test]
    fn test_four_children_alternate_dimensions() {
        let query = query();
        let divider = LargestIntervalDivider::new(&query);
        let mut out = Vec::new();
        divider.create_sub_queries(4, "3", 1, &CaseSplit::new(), Duration::ZERO, &mut out);

        let ids: Vec<&str> = out.iter().map(|q| q.id()).collect();
        assert_eq!(ids, vec!["3-1", "3-2", "3-3", "3-4"]);
        assert!(out.iter().all(|q| q.depth() == 2));
        // [0, 2] and [-1, 1] tie on width; the earlier input wins.
        assert_eq!(
            boxes(&query, &out),
            vec![
                [(0.0, 1.0), (-1.0, 1.0)],
                [(1.0, 2.0), (-1.0, 1.0)],
                [(2.0, 3.0), (-1.0, 1.0)],
                [(3.0, 4.0), (-1.0, 1.0)],
            ]
        );
    }

    #[test]
    fn test_respects_base_split() {
        let query = query();
        let divider = LargestIntervalDivider::new(&query);
        let base = CaseSplit::from_tightenings(vec![Tightening::upper(v(0), 0.5)]);
        let mut out = Vec::new();
        divider.create_sub_queries(2, "1", 0, &base, Duration::ZERO, &mut out);

        // x0 ∈ [0, 0.5] is now narrower than x1 ∈ [-1, 1].
        assert_eq!(
            boxes(&query, &out),
            vec![[(0.0, 0.5), (-1.0, 0.0)], [(0.0, 0.5), (0.0, 1.0)]]
        );
    }

    #[test]
    fn test_half_unbounded_inputs_shrink() {
        let inf = f64::INFINITY;
        let mut builder = QueryBuilder::new(2);
        builder
            .set_lower_bound(v(0), 0.0)
            .set_upper_bound(v(1), -2.0)
            .mark_input(v(0))
            .mark_input(v(1));
        let query = builder.build();
        let divider = LargestIntervalDivider::new(&query);

        let [low, high] = divider.bisect(&CaseSplit::new());
        let parent = (0.0, inf);
        for child in [&low, &high] {
            assert_ne!(child.bounds_of(v(0), 0.0, inf), parent);
        }

        let mut out = Vec::new();
        divider.create_sub_queries(4, "", 0, &CaseSplit::new(), Duration::ZERO, &mut out);
        assert_eq!(
            boxes(&query, &out),
            vec![
                [(0.0, 1.0), (-inf, -4.0)],
                [(0.0, 1.0), (-4.0, -2.0)],
                [(1.0, 2.0), (-inf, -2.0)],
                [(2.0, inf), (-inf, -2.0)],
            ]
        );
    }

    #[test]
    fn test_count_one_keeps_region() {
        let query = query();
        let divider = LargestIntervalDivider::new(&query);
        let mut out = Vec::new();
        divider.create_sub_queries(1, "2", 4, &CaseSplit::new(), Duration::ZERO, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), "2-1");
        assert_eq!(out[0].depth(), 5);
        assert!(out[0].split().is_empty());
    }

    proptest! {
        #[test]
        fn prop_children_tile_the_input_box(
            halvings in 0u32..5,
            x0 in 0.0f64..4.0,
            x1 in -1.0f64..1.0,
        ) {
            let query = query();
            let divider = LargestIntervalDivider::new(&query);
            let mut out = Vec::new();
            divider.create_sub_queries(1 << halvings, "", 0, &CaseSplit::new(), Duration::ZERO, &mut out);
            prop_assert_eq!(out.len(), 1usize << halvings);

            let boxes = boxes(&query, &out);
            let inside = |b: &[(f64, f64); 2]| {
                b[0].0 <= x0 && x0 <= b[0].1 && b[1].0 <= x1 && x1 <= b[1].1
            };
            let strictly_inside = |b: &[(f64, f64); 2]| {
                b[0].0 < x0 && x0 < b[0].1 && b[1].0 < x1 && x1 < b[1].1
            };

            // Covered by some child, and in the interior of at most one.
            prop_assert!(boxes.iter().any(inside));
            prop_assert!(boxes.iter().filter(|b| strictly_inside(b)).count() <= 1);

            let volume: f64 = boxes.iter().map(|b| (b[0].1 - b[0].0) * (b[1].1 - b[1].0)).sum();
            prop_assert!((volume - 8.0).abs() < 1e-9);
        }
    }
}
