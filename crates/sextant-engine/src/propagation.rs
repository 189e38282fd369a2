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

//! Bound propagation to a fixpoint.
//!
//! A `Propagator` interleaves passes of the row tightener over the query's
//! equations (and, when supplied, over rows derived from the basis inverse)
//! with passes of the ReLU rules, until a round derives nothing new or the
//! round cap is hit.

use crate::{error::TightenerError, relu::propagate_relu, tightener::RowBoundTightener};
use sextant_bounds::store::{BoundStore, TightenOutcome};
use sextant_core::float::Tolerance;
use sextant_model::{
    equation::Equation, index::VariableIndex, query::InputQuery, relu::ReluConstraint,
    tightening::CaseSplit,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Propagator {
    tightener: RowBoundTightener,
}

impl Propagator {
    #[inline]
    pub fn new(tightener: RowBoundTightener) -> Self {
        Self { tightener }
    }

    #[inline]
    pub fn tightener(&self) -> &RowBoundTightener {
        &self.tightener
    }

    /// Propagates until saturation. `derived_rows` are extra rows implied by
    /// the equations, such as the rows of the basis inverse.
    ///
    /// Returns the number of new bounds, or `Err(Infeasible)` on a conflict.
    pub fn propagate(
        &self,
        query: &InputQuery,
        derived_rows: &[Equation],
        store: &mut BoundStore,
    ) -> Result<usize, TightenerError> {
        self.propagate_constraints(query.equations(), query.relus(), derived_rows, store)
    }

    /// Like `propagate`, for constraints that are not (yet) part of a query.
    pub fn propagate_constraints(
        &self,
        equations: &[Equation],
        relus: &[ReluConstraint],
        derived_rows: &[Equation],
        store: &mut BoundStore,
    ) -> Result<usize, TightenerError> {
        let tolerance = *self.tightener.tolerance();
        let mut total = 0;

        for _ in 0..self.tightener.max_rounds() {
            let mut new_bounds = self
                .tightener
                .examine_constraint_matrix(equations, store, false)?;
            new_bounds += self.tightener.examine_rows(derived_rows, store, false)?;
            for relu in relus {
                new_bounds += propagate_relu(relu, store, &tolerance)?;
            }

            total += new_bounds;
            if new_bounds == 0 {
                break;
            }
        }
        Ok(total)
    }
}

/// Creates a store holding the bounds of `query` with `split` applied on
/// top, at checkpoint depth 0.
pub fn store_for_split(
    query: &InputQuery,
    split: &CaseSplit,
    tolerance: Tolerance,
) -> (BoundStore, TightenOutcome) {
    let mut store = BoundStore::with_tolerance(tolerance);
    store.initialize(query.num_variables());

    let mut outcome = TightenOutcome::Rejected;
    for variable in VariableIndex::range(query.num_variables()) {
        outcome = outcome.merge(store.tighten_bounds(
            variable,
            query.lower_bound(variable),
            query.upper_bound(variable),
        ));
        if outcome.is_infeasible() {
            return (store, outcome);
        }
    }
    let outcome = outcome.merge(store.apply_tightenings(split.tightenings()));
    (store, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_model::{query::QueryBuilder, tightening::Tightening};

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    fn propagator() -> Propagator {
        Propagator::new(RowBoundTightener::new(Tolerance::default(), 1e-6, 20))
    }

    /// x1 = x0 − 1, x2 = relu(x1), x3 = −x2 with x0 ∈ [0, 3].
    fn query() -> InputQuery {
        let mut builder = QueryBuilder::new(4);
        builder
            .set_bounds(v(0), 0.0, 3.0)
            .mark_input(v(0))
            .mark_output(v(3))
            .add_equation_from_terms([(1.0, v(0)), (-1.0, v(1))], 1.0)
            .add_relu(v(1), v(2))
            .add_equation_from_terms([(1.0, v(2)), (1.0, v(3))], 0.0);
        builder.build()
    }

    #[test]
    fn test_propagates_through_equations_and_relus() {
        let query = query();
        let (mut store, outcome) = store_for_split(&query, &CaseSplit::new(), Tolerance::default());
        assert!(!outcome.is_infeasible());

        propagator().propagate(&query, &[], &mut store).unwrap();
        assert_eq!(store.lower_bound(v(1)), -1.0);
        assert_eq!(store.upper_bound(v(1)), 2.0);
        assert_eq!(store.lower_bound(v(2)), 0.0);
        assert_eq!(store.upper_bound(v(2)), 2.0);
        assert_eq!(store.lower_bound(v(3)), -2.0);
        assert_eq!(store.upper_bound(v(3)), 0.0);
    }

    #[test]
    fn test_split_is_applied_on_top_of_query_bounds() {
        let query = query();
        let split = CaseSplit::from_tightenings(vec![Tightening::upper(v(0), 0.5)]);
        let (mut store, _) = store_for_split(&query, &split, Tolerance::default());
        assert_eq!(store.depth(), 0);

        propagator().propagate(&query, &[], &mut store).unwrap();
        // x1 <= -0.5 fixes the relu inactive.
        assert_eq!(store.upper_bound(v(2)), 0.0);
        assert_eq!(store.lower_bound(v(3)), 0.0);
    }

    #[test]
    fn test_output_property_conflict_is_infeasible() {
        let query = query();
        let split = CaseSplit::from_tightenings(vec![
            Tightening::upper(v(0), 0.5),
            Tightening::upper(v(3), -1.0),
        ]);
        let (mut store, outcome) = store_for_split(&query, &split, Tolerance::default());
        assert!(!outcome.is_infeasible());
        assert_eq!(
            propagator().propagate(&query, &[], &mut store),
            Err(TightenerError::Infeasible)
        );
    }

    #[test]
    fn test_conflicting_split_is_reported() {
        let query = query();
        let split = CaseSplit::from_tightenings(vec![Tightening::lower(v(0), 5.0)]);
        let (_, outcome) = store_for_split(&query, &split, Tolerance::default());
        assert!(outcome.is_infeasible());
    }
}
