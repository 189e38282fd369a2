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

//! # Preprocessing
//!
//! Simplifies a query before search and records how to undo it.
//!
//! ## Steps
//!
//! Repeated until nothing changes:
//!
//! 1. Bound propagation over the equations and ReLUs.
//! 2. Fixing: a variable with `lower == upper` that is not an input, an
//!    output or part of a ReLU is replaced by its value in every equation.
//! 3. Merging: an equation `a·x − a·y = 0` over two such variables makes `x`
//!    an alias of `y`. The bounds of `y` become the intersection of both.
//! 4. Equations left without addends are removed. A removed equation with a
//!    nonzero right-hand side proves infeasibility.
//!
//! Finally the surviving variables are re-indexed densely.
//!
//! ## Solutions
//!
//! A solution of the processed query is translated back with
//! `VariableMap::map_solution`: merged variables follow the merge chain to
//! their representative, which is either fixed or has a new index.

use crate::propagation::{store_for_split, Propagator};
use rustc_hash::FxHashMap;
use sextant_bounds::store::BoundStore;
use sextant_core::float::Tolerance;
use sextant_model::{
    equation::Equation,
    index::VariableIndex,
    query::{InputQuery, QueryBuilder},
    tightening::CaseSplit,
};

/// How the variables of an original query relate to those of its processed
/// counterpart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableMap {
    num_original: usize,
    merged: FxHashMap<VariableIndex, VariableIndex>,
    fixed: FxHashMap<VariableIndex, f64>,
    new_index: FxHashMap<VariableIndex, VariableIndex>,
}

impl VariableMap {
    /// The map of a query that was not preprocessed.
    pub fn identity(num_variables: usize) -> Self {
        Self {
            num_original: num_variables,
            merged: FxHashMap::default(),
            fixed: FxHashMap::default(),
            new_index: VariableIndex::range(num_variables).map(|v| (v, v)).collect(),
        }
    }

    #[inline]
    pub fn num_original(&self) -> usize {
        self.num_original
    }

    #[inline]
    pub fn variable_is_merged(&self, variable: VariableIndex) -> bool {
        self.merged.contains_key(&variable)
    }

    /// The variable `variable` was merged into, one step along the chain.
    #[inline]
    pub fn merged_index(&self, variable: VariableIndex) -> Option<VariableIndex> {
        self.merged.get(&variable).copied()
    }

    #[inline]
    pub fn variable_is_fixed(&self, variable: VariableIndex) -> bool {
        self.fixed.contains_key(&variable)
    }

    #[inline]
    pub fn fixed_value(&self, variable: VariableIndex) -> Option<f64> {
        self.fixed.get(&variable).copied()
    }

    /// The index of an original variable in the processed query.
    #[inline]
    pub fn new_index(&self, variable: VariableIndex) -> Option<VariableIndex> {
        self.new_index.get(&variable).copied()
    }

    /// Follows the merge chain of `variable` to its representative.
    pub fn representative(&self, variable: VariableIndex) -> VariableIndex {
        let mut current = variable;
        while let Some(next) = self.merged_index(current) {
            current = next;
        }
        current
    }

    /// The value of the original `variable` under a processed solution.
    pub fn original_value(&self, variable: VariableIndex, processed: &[f64]) -> Option<f64> {
        let representative = self.representative(variable);
        self.fixed_value(representative).or_else(|| {
            self.new_index(representative)
                .and_then(|index| processed.get(index.get()).copied())
        })
    }

    /// Translates a processed solution to the original variables.
    ///
    /// Returns `None` if some original variable has no value, which only
    /// happens when `processed` is too short.
    pub fn map_solution(&self, processed: &[f64]) -> Option<Vec<f64>> {
        VariableIndex::range(self.num_original)
            .map(|variable| self.original_value(variable, processed))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    propagator: Propagator,
}

impl Preprocessor {
    #[inline]
    pub fn new(propagator: Propagator) -> Self {
        Self { propagator }
    }

    #[inline]
    fn tolerance(&self) -> Tolerance {
        *self.propagator.tightener().tolerance()
    }

    fn is_protected(query: &InputQuery, variable: VariableIndex) -> bool {
        query.is_input(variable) || query.is_output(variable) || query.participates_in_relu(variable)
    }

    /// Simplifies `query`. Returns `None` if the query was proven infeasible.
    pub fn preprocess(&self, query: &InputQuery) -> Option<(InputQuery, VariableMap)> {
        let tolerance = self.tolerance();
        let (mut store, outcome) = store_for_split(query, &CaseSplit::new(), tolerance);
        if outcome.is_infeasible() {
            return None;
        }

        let mut equations: Vec<Equation> = query.equations().to_vec();
        let mut map = VariableMap {
            num_original: query.num_variables(),
            ..VariableMap::default()
        };
        let mut removed_equations = 0;

        loop {
            self.propagator
                .propagate_constraints(&equations, query.relus(), &[], &mut store)
                .ok()?;

            let mut changed = self.fix_variables(query, &store, &mut equations, &mut map);
            changed |= self.merge_variables(query, &mut store, &mut equations, &mut map)?;

            let before = equations.len();
            for equation in equations.iter().filter(|e| e.is_empty()) {
                if !tolerance.is_zero(equation.scalar()) {
                    tracing::debug!("preprocessing found the contradiction 0 = {}", equation.scalar());
                    return None;
                }
            }
            equations.retain(|e| !e.is_empty());
            removed_equations += before - equations.len();
            changed |= before != equations.len();

            if !changed {
                break;
            }
        }

        let processed = Self::reindex(query, &store, equations, &mut map);
        tracing::debug!(
            "preprocessing: {} variables fixed, {} merged, {} equations removed, {} variables left",
            map.fixed.len(),
            map.merged.len(),
            removed_equations,
            processed.num_variables()
        );
        Some((processed, map))
    }

    fn fix_variables(
        &self,
        query: &InputQuery,
        store: &BoundStore,
        equations: &mut [Equation],
        map: &mut VariableMap,
    ) -> bool {
        let tolerance = self.tolerance();
        let mut changed = false;

        for variable in VariableIndex::range(query.num_variables()) {
            if Self::is_protected(query, variable)
                || map.variable_is_fixed(variable)
                || map.variable_is_merged(variable)
            {
                continue;
            }
            let (lower, upper) = (store.lower_bound(variable), store.upper_bound(variable));
            if lower.is_finite() && tolerance.are_equal(lower, upper) {
                for equation in equations.iter_mut() {
                    equation.fix_variable(variable, lower);
                }
                map.fixed.insert(variable, lower);
                changed = true;
            }
        }
        changed
    }

    /// Merges at most one pair per equation scan. Returns `None` on an empty
    /// bound intersection.
    fn merge_variables(
        &self,
        query: &InputQuery,
        store: &mut BoundStore,
        equations: &mut [Equation],
        map: &mut VariableMap,
    ) -> Option<bool> {
        let tolerance = self.tolerance();

        let pair = equations.iter().find_map(|equation| {
            let [first, second] = equation.addends() else {
                return None;
            };
            let mergeable = tolerance.is_zero(equation.scalar())
                && tolerance.are_equal(first.coefficient, -second.coefficient)
                && !Self::is_protected(query, first.variable)
                && !Self::is_protected(query, second.variable);
            mergeable.then_some((second.variable, first.variable))
        });

        let Some((from, to)) = pair else {
            return Some(false);
        };

        let outcome =
            store.tighten_bounds(to, store.lower_bound(from), store.upper_bound(from));
        if outcome.is_infeasible() {
            tracing::debug!("merging {} into {} leaves an empty interval", from, to);
            return None;
        }
        for equation in equations.iter_mut() {
            equation.merge_variable(from, to);
        }
        map.merged.insert(from, to);
        Some(true)
    }

    fn reindex(
        query: &InputQuery,
        store: &BoundStore,
        equations: Vec<Equation>,
        map: &mut VariableMap,
    ) -> InputQuery {
        let survivors: Vec<VariableIndex> = VariableIndex::range(query.num_variables())
            .filter(|&v| !map.variable_is_fixed(v) && !map.variable_is_merged(v))
            .collect();
        for (index, &variable) in survivors.iter().enumerate() {
            map.new_index.insert(variable, VariableIndex::new(index));
        }
        let renamed = |v: VariableIndex| map.new_index[&v];

        let mut builder = QueryBuilder::new(survivors.len());
        for &variable in &survivors {
            builder.set_bounds(
                renamed(variable),
                store.lower_bound(variable),
                store.upper_bound(variable),
            );
        }
        for mut equation in equations {
            equation.remap(renamed);
            builder.add_equation(equation);
        }
        for relu in query.relus() {
            builder.add_relu(renamed(relu.b()), renamed(relu.f()));
        }
        for &input in query.input_variables() {
            builder.mark_input(renamed(input));
        }
        for &output in query.output_variables() {
            builder.mark_output(renamed(output));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tightener::RowBoundTightener;

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(Propagator::new(RowBoundTightener::new(
            Tolerance::default(),
            1e-6,
            20,
        )))
    }

    /// Input x0 ∈ [0, 1], x1 = 2 (fixed), x2 = x0 + x1, x3 = x2 (merged),
    /// output x4 = x3.
    fn query() -> InputQuery {
        let mut builder = QueryBuilder::new(5);
        builder
            .set_bounds(v(0), 0.0, 1.0)
            .set_bounds(v(1), 2.0, 2.0)
            .mark_input(v(0))
            .mark_output(v(4))
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1)), (-1.0, v(2))], 0.0)
            .add_equation_from_terms([(1.0, v(2)), (-1.0, v(3))], 0.0)
            .add_equation_from_terms([(1.0, v(3)), (-1.0, v(4))], 0.0);
        builder.build()
    }

    #[test]
    fn test_fixes_and_merges() {
        let query = query();
        let (processed, map) = preprocessor().preprocess(&query).unwrap();

        assert!(map.variable_is_fixed(v(1)));
        assert_eq!(map.fixed_value(v(1)), Some(2.0));
        assert!(map.variable_is_merged(v(3)));
        assert_eq!(map.merged_index(v(3)), Some(v(2)));
        assert!(!map.variable_is_merged(v(4)));

        // x0, x2 and x4 survive.
        assert_eq!(processed.num_variables(), 3);
        assert_eq!(processed.num_equations(), 2);
        assert_eq!(map.new_index(v(0)), Some(v(0)));
        assert_eq!(map.new_index(v(2)), Some(v(1)));
        assert_eq!(map.new_index(v(4)), Some(v(2)));
        assert_eq!(processed.input_variables(), &[v(0)]);
        assert_eq!(processed.output_variables(), &[v(2)]);
        assert_eq!(processed.lower_bound(v(1)), 2.0);
        assert_eq!(processed.upper_bound(v(1)), 3.0);
    }

    #[test]
    fn test_mapped_solution_satisfies_original_query() {
        let query = query();
        let (processed, map) = preprocessor().preprocess(&query).unwrap();
        let tol = Tolerance::default();

        // x0 = 0.25, x2 = 2.25, x4 = 2.25 in processed indices.
        let solution = [0.25, 2.25, 2.25];
        assert!(processed.is_satisfied_by(&solution, &tol));

        let original = map.map_solution(&solution).unwrap();
        assert_eq!(original, vec![0.25, 2.0, 2.25, 2.25, 2.25]);
        assert!(query.is_satisfied_by(&original, &tol));
    }

    #[test]
    fn test_protected_variables_are_kept() {
        let mut builder = QueryBuilder::new(3);
        builder
            .set_bounds(v(0), 1.0, 1.0)
            .mark_input(v(0))
            .add_relu(v(1), v(2))
            .add_equation_from_terms([(1.0, v(1)), (-1.0, v(2))], 0.0);
        let query = builder.build();

        let (processed, map) = preprocessor().preprocess(&query).unwrap();
        assert_eq!(processed.num_variables(), 3);
        assert!(!map.variable_is_fixed(v(0)));
        assert!(!map.variable_is_merged(v(1)));
        assert_eq!(processed.num_relus(), 1);
    }

    #[test]
    fn test_contradiction_is_infeasible() {
        // x0 = 1 and x0 = 2 once x0 is fixed.
        let mut builder = QueryBuilder::new(2);
        builder
            .set_bounds(v(0), 1.0, 1.0)
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 1.0)
            .add_equation_from_terms([(1.0, v(1))], 1.0);
        let query = builder.build();
        assert!(preprocessor().preprocess(&query).is_none());
    }

    #[test]
    fn test_identity_map() {
        let map = VariableMap::identity(3);
        assert_eq!(map.num_original(), 3);
        assert_eq!(map.new_index(v(2)), Some(v(2)));
        assert_eq!(map.map_solution(&[1.0, 2.0, 3.0]), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(map.map_solution(&[1.0]), None);
    }
}
