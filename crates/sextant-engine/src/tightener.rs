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

//! # Row Bound Tightener
//!
//! Derives variable bounds from linear rows `Σ aᵢ·xᵢ = c`.
//!
//! For a row and one of its variables `x_j`,
//!
//! ```text
//! a_j·x_j = c − Σ_{i≠j} aᵢ·xᵢ
//! ```
//!
//! and the right-hand side ranges over an interval computed from the
//! current bounds of the other variables. Interval sums are kept with a
//! separate count of infinite contributions, so one pass over a row of
//! length `k` derives bounds for all `k` variables in `O(k)`.
//!
//! Three sources of rows are supported:
//!
//! - the equations of the query (`examine_constraint_matrix`),
//! - rows of the explicit inverse `A_B⁻¹` (`examine_inverted_basis_matrix`),
//! - rows of `A_B⁻¹` recovered one at a time with backward transformations
//!   (`examine_implicit_inverted_basis_matrix`), for factorizations that
//!   only hold the basis implicitly.
//!
//! Row `i` of `A_B⁻¹` turns `A_B·x_B + A_N·x_N = c` into the single-basic
//! equation `x_Bi + Σ_j (rᵢ·A_j)·x_j = rᵢ·c` over the non-basic `j`.

use crate::{basis::CrashBasis, error::TightenerError};
use fixedbitset::FixedBitSet;
use sextant_bounds::store::{BoundStore, TightenOutcome};
use sextant_core::float::Tolerance;
use sextant_factor::factorization::BasisFactorization;
use sextant_model::{equation::Equation, index::VariableIndex, query::InputQuery};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBoundTightener {
    tolerance: Tolerance,
    min_improvement: f64,
    max_rounds: usize,
}

/// Interval sum of `Σ aᵢ·xᵢ` with infinite contributions counted apart.
#[derive(Debug, Clone, Copy, Default)]
struct RowRange {
    finite_min: f64,
    finite_max: f64,
    infinite_min: usize,
    infinite_max: usize,
}

#[inline]
fn term_range(coefficient: f64, lower: f64, upper: f64) -> (f64, f64) {
    if coefficient > 0.0 {
        (coefficient * lower, coefficient * upper)
    } else {
        (coefficient * upper, coefficient * lower)
    }
}

impl RowRange {
    fn of(equation: &Equation, store: &BoundStore) -> Self {
        let mut range = Self::default();
        for addend in equation.addends() {
            let (min, max) = term_range(
                addend.coefficient,
                store.lower_bound(addend.variable),
                store.upper_bound(addend.variable),
            );
            if min.is_finite() {
                range.finite_min += min;
            } else {
                range.infinite_min += 1;
            }
            if max.is_finite() {
                range.finite_max += max;
            } else {
                range.infinite_max += 1;
            }
        }
        range
    }

    /// The range of the row without the term `(min, max)`.
    #[inline]
    fn without(&self, min: f64, max: f64) -> (f64, f64) {
        let rest_min = match (self.infinite_min, min.is_finite()) {
            (0, _) => self.finite_min - min,
            (1, false) => self.finite_min,
            _ => f64::NEG_INFINITY,
        };
        let rest_max = match (self.infinite_max, max.is_finite()) {
            (0, _) => self.finite_max - max,
            (1, false) => self.finite_max,
            _ => f64::INFINITY,
        };
        (rest_min, rest_max)
    }
}

impl RowBoundTightener {
    pub fn new(tolerance: Tolerance, min_improvement: f64, max_rounds: usize) -> Self {
        Self {
            tolerance,
            min_improvement,
            max_rounds: max_rounds.max(1),
        }
    }

    #[inline]
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    #[inline]
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Tightens bounds with the equations of the query. Returns the number of
    /// new bounds.
    pub fn examine_constraint_matrix(
        &self,
        equations: &[Equation],
        store: &mut BoundStore,
        until_saturation: bool,
    ) -> Result<usize, TightenerError> {
        self.examine_rows(equations, store, until_saturation)
    }

    /// Tightens bounds with the rows of the explicit inverse of the basis.
    ///
    /// Fails with `FactorizationError::NotExplicit` when the factorization
    /// does not currently hold the basis explicitly.
    pub fn examine_inverted_basis_matrix(
        &self,
        query: &InputQuery,
        basis: &CrashBasis,
        factorization: &dyn BasisFactorization,
        store: &mut BoundStore,
        until_saturation: bool,
    ) -> Result<usize, TightenerError> {
        let rows = self.inverted_basis_rows(query, basis, factorization)?;
        self.examine_rows(&rows, store, until_saturation)
    }

    /// Tightens bounds with the rows of the basis inverse, each recovered
    /// with one backward transformation.
    pub fn examine_implicit_inverted_basis_matrix(
        &self,
        query: &InputQuery,
        basis: &CrashBasis,
        factorization: &dyn BasisFactorization,
        store: &mut BoundStore,
        until_saturation: bool,
    ) -> Result<usize, TightenerError> {
        let rows = self.implicit_inverted_basis_rows(query, basis, factorization)?;
        self.examine_rows(&rows, store, until_saturation)
    }

    /// The single-basic rows `x_Bi + Σ_j (rᵢ·A_j)·x_j = rᵢ·c`, with `rᵢ`
    /// taken from the explicit inverse.
    pub fn inverted_basis_rows(
        &self,
        query: &InputQuery,
        basis: &CrashBasis,
        factorization: &dyn BasisFactorization,
    ) -> Result<Vec<Equation>, TightenerError> {
        let m = basis.dimension();
        let mut inverse = vec![0.0; m * m];
        factorization.invert_basis(&mut inverse)?;

        Ok(inverse
            .chunks_exact(m.max(1))
            .take(m)
            .enumerate()
            .map(|(i, row)| self.derived_row(query, basis, i, row))
            .collect())
    }

    /// The single-basic rows, with `rᵢ` computed as `eᵢ·A_B⁻¹`.
    pub fn implicit_inverted_basis_rows(
        &self,
        query: &InputQuery,
        basis: &CrashBasis,
        factorization: &dyn BasisFactorization,
    ) -> Result<Vec<Equation>, TightenerError> {
        let m = basis.dimension();
        let mut unit = vec![0.0; m];
        let mut row = vec![0.0; m];
        let mut rows = Vec::with_capacity(m);

        for i in 0..m {
            unit[i] = 1.0;
            factorization.backward_transformation(&unit, &mut row)?;
            unit[i] = 0.0;
            rows.push(self.derived_row(query, basis, i, &row));
        }
        Ok(rows)
    }

    fn derived_row(
        &self,
        query: &InputQuery,
        basis: &CrashBasis,
        i: usize,
        inverse_row: &[f64],
    ) -> Equation {
        let rhs: f64 = basis
            .rhs(query)
            .iter()
            .zip(inverse_row)
            .map(|(c, r)| c * r)
            .sum();

        let mut equation = Equation::new(rhs);
        equation.add_addend(1.0, basis.basic()[i]);

        for &variable in basis.non_basic() {
            let coefficient: f64 = basis
                .column(query, variable)
                .iter()
                .zip(inverse_row)
                .map(|(a, r)| a * r)
                .sum();
            if !self.tolerance.is_zero(coefficient) {
                equation.add_addend(coefficient, variable);
            }
        }
        equation
    }

    /// Runs passes over `rows`. The first pass visits every row; later passes
    /// only revisit rows containing a variable tightened by the pass before.
    pub fn examine_rows(
        &self,
        rows: &[Equation],
        store: &mut BoundStore,
        until_saturation: bool,
    ) -> Result<usize, TightenerError> {
        let n = store.num_variables();
        let mut occurrences: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (r, row) in rows.iter().enumerate() {
            for addend in row.addends() {
                occurrences[addend.variable.get()].push(r);
            }
        }

        let mut pending = FixedBitSet::with_capacity(rows.len());
        pending.insert_range(..);
        let mut tightened = FixedBitSet::with_capacity(n);
        let mut total = 0;

        for _ in 0..self.max_rounds {
            tightened.clear();
            let mut new_bounds = 0;
            for r in pending.ones() {
                new_bounds += self.examine_row(&rows[r], store, &mut tightened)?;
            }
            total += new_bounds;

            if !until_saturation || new_bounds == 0 {
                break;
            }

            pending.clear();
            for variable in tightened.ones() {
                for &r in &occurrences[variable] {
                    pending.insert(r);
                }
            }
        }
        Ok(total)
    }

    /// One pass over a single row.
    fn examine_row(
        &self,
        row: &Equation,
        store: &mut BoundStore,
        tightened: &mut FixedBitSet,
    ) -> Result<usize, TightenerError> {
        if row.is_empty() {
            return if self.tolerance.is_zero(row.scalar()) {
                Ok(0)
            } else {
                Err(TightenerError::Infeasible)
            };
        }

        let range = RowRange::of(row, store);
        let c = row.scalar();
        let mut count = 0;

        for addend in row.addends() {
            let a = addend.coefficient;
            if self.tolerance.is_zero(a) {
                continue;
            }
            let (min, max) = term_range(
                a,
                store.lower_bound(addend.variable),
                store.upper_bound(addend.variable),
            );
            let (rest_min, rest_max) = range.without(min, max);

            // a·x ∈ [c − rest_max, c − rest_min]
            let (lower, upper) = if a > 0.0 {
                ((c - rest_max) / a, (c - rest_min) / a)
            } else {
                ((c - rest_min) / a, (c - rest_max) / a)
            };

            if self.tighten_lower(store, addend.variable, lower)? {
                tightened.insert(addend.variable.get());
                count += 1;
            }
            if self.tighten_upper(store, addend.variable, upper)? {
                tightened.insert(addend.variable.get());
                count += 1;
            }
        }
        Ok(count)
    }

    fn tighten_lower(
        &self,
        store: &mut BoundStore,
        variable: VariableIndex,
        value: f64,
    ) -> Result<bool, TightenerError> {
        if !value.is_finite() {
            return Ok(false);
        }
        let current = store.lower_bound(variable);
        if current.is_finite() && value <= current + self.min_improvement {
            return Ok(false);
        }
        Self::outcome(store.tighten_lower_bound(variable, value))
    }

    fn tighten_upper(
        &self,
        store: &mut BoundStore,
        variable: VariableIndex,
        value: f64,
    ) -> Result<bool, TightenerError> {
        if !value.is_finite() {
            return Ok(false);
        }
        let current = store.upper_bound(variable);
        if current.is_finite() && value >= current - self.min_improvement {
            return Ok(false);
        }
        Self::outcome(store.tighten_upper_bound(variable, value))
    }

    #[inline]
    fn outcome(outcome: TightenOutcome) -> Result<bool, TightenerError> {
        match outcome {
            TightenOutcome::Infeasible => Err(TightenerError::Infeasible),
            TightenOutcome::Accepted => Ok(true),
            TightenOutcome::Rejected => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_factor::factorization::{
        create_factorization, FactorizationConfig, FactorizationKind,
    };
    use sextant_model::query::QueryBuilder;

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    fn tightener() -> RowBoundTightener {
        RowBoundTightener::new(Tolerance::default(), 1e-6, 20)
    }

    fn store_for(query: &InputQuery) -> BoundStore {
        let mut store = BoundStore::new();
        store.initialize(query.num_variables());
        for variable in VariableIndex::range(query.num_variables()) {
            store.tighten_bounds(
                variable,
                query.lower_bound(variable),
                query.upper_bound(variable),
            );
        }
        store
    }

    /// x2 = x0 + x1 with x0, x1 ∈ [0, 1] and x3 = 2·x2 − x0.
    fn chain_query() -> InputQuery {
        let mut builder = QueryBuilder::new(4);
        builder
            .set_bounds(v(0), 0.0, 1.0)
            .set_bounds(v(1), 0.0, 1.0)
            .mark_input(v(0))
            .mark_input(v(1))
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1)), (-1.0, v(2))], 0.0)
            .add_equation_from_terms([(2.0, v(2)), (-1.0, v(0)), (-1.0, v(3))], 0.0);
        builder.build()
    }

    #[test]
    fn test_row_bounds_for_sum() {
        let query = chain_query();
        let mut store = store_for(&query);
        let count = tightener()
            .examine_constraint_matrix(query.equations(), &mut store, true)
            .unwrap();
        assert!(count >= 4);
        assert_eq!(store.lower_bound(v(2)), 0.0);
        assert_eq!(store.upper_bound(v(2)), 2.0);
        assert_eq!(store.lower_bound(v(3)), -1.0);
        assert_eq!(store.upper_bound(v(3)), 4.0);
    }

    #[test]
    fn test_single_pass_uses_stale_bounds_only_once() {
        let query = chain_query();
        let mut store = store_for(&query);
        // Second row first: nothing is known about x2 yet.
        let rows = [query.equations()[1].clone(), query.equations()[0].clone()];
        tightener().examine_rows(&rows, &mut store, false).unwrap();
        assert_eq!(store.upper_bound(v(3)), f64::INFINITY);
        tightener().examine_rows(&rows, &mut store, true).unwrap();
        assert_eq!(store.upper_bound(v(3)), 4.0);
    }

    #[test]
    fn test_one_infinite_term_still_bounds_that_term() {
        // x0 + x1 = 5 with x0 ∈ [0, 1] and x1 unbounded.
        let mut builder = QueryBuilder::new(2);
        builder
            .set_bounds(v(0), 0.0, 1.0)
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 5.0);
        let query = builder.build();
        let mut store = store_for(&query);
        tightener()
            .examine_constraint_matrix(query.equations(), &mut store, true)
            .unwrap();
        assert_eq!(store.lower_bound(v(1)), 4.0);
        assert_eq!(store.upper_bound(v(1)), 5.0);
    }

    #[test]
    fn test_conflicting_row_is_infeasible() {
        // x0 + x1 = 5 with both in [0, 1].
        let mut builder = QueryBuilder::new(2);
        builder
            .set_bounds(v(0), 0.0, 1.0)
            .set_bounds(v(1), 0.0, 1.0)
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 5.0);
        let query = builder.build();
        let mut store = store_for(&query);
        assert_eq!(
            tightener().examine_constraint_matrix(query.equations(), &mut store, true),
            Err(TightenerError::Infeasible)
        );
    }

    #[test]
    fn test_empty_row_with_nonzero_scalar_is_infeasible() {
        let mut store = BoundStore::new();
        store.initialize(1);
        assert_eq!(
            tightener().examine_rows(&[Equation::new(1.0)], &mut store, false),
            Err(TightenerError::Infeasible)
        );
        assert_eq!(
            tightener().examine_rows(&[Equation::new(0.0)], &mut store, false),
            Ok(0)
        );
    }

    #[test]
    fn test_small_improvements_are_ignored() {
        let mut builder = QueryBuilder::new(2);
        builder
            .set_bounds(v(0), 0.0, 1.0)
            .set_bounds(v(1), 0.0, 1.0 + 1e-8)
            .add_equation_from_terms([(1.0, v(0)), (-1.0, v(1))], 0.0);
        let query = builder.build();
        let mut store = store_for(&query);
        tightener()
            .examine_constraint_matrix(query.equations(), &mut store, true)
            .unwrap();
        assert_eq!(store.upper_bound(v(1)), 1.0 + 1e-8);
    }

    #[test]
    fn test_explicit_and_implicit_inverse_rows_agree() {
        let query = chain_query();
        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        let mut factorization = create_factorization(
            FactorizationKind::ForrestTomlin,
            basis.dimension(),
            FactorizationConfig::default(),
        );
        factorization.set_basis(basis.matrix()).unwrap();

        let t = tightener();
        let explicit = t
            .inverted_basis_rows(&query, &basis, factorization.as_ref())
            .unwrap();
        let implicit = t
            .implicit_inverted_basis_rows(&query, &basis, factorization.as_ref())
            .unwrap();
        assert_eq!(explicit.len(), 2);
        for (a, b) in explicit.iter().zip(&implicit) {
            assert_eq!(a.len(), b.len());
            for (x, y) in a.addends().iter().zip(b.addends()) {
                assert_eq!(x.variable, y.variable);
                assert!((x.coefficient - y.coefficient).abs() < 1e-12);
            }
        }

        // x3 = 2·x2 − x0 = x0 + 2·x1: derived bounds come out in one pass.
        let mut store = store_for(&query);
        t.examine_inverted_basis_matrix(&query, &basis, factorization.as_ref(), &mut store, false)
            .unwrap();
        assert_eq!(store.lower_bound(v(3)), 0.0);
        assert_eq!(store.upper_bound(v(3)), 3.0);
    }

    #[test]
    fn test_implicit_rows_work_without_explicit_basis() {
        let query = chain_query();
        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        let mut factorization = create_factorization(
            FactorizationKind::ForrestTomlin,
            basis.dimension(),
            FactorizationConfig::default(),
        );
        factorization.set_basis(basis.matrix()).unwrap();
        // A unit eta keeps the basis but drops the explicit copy.
        factorization.push_eta_matrix(0, &[1.0, 0.0]).unwrap();
        assert!(!factorization.explicit_basis_available());

        let mut store = store_for(&query);
        assert!(tightener()
            .examine_inverted_basis_matrix(
                &query,
                &basis,
                factorization.as_ref(),
                &mut store,
                false
            )
            .is_err());
        tightener()
            .examine_implicit_inverted_basis_matrix(
                &query,
                &basis,
                factorization.as_ref(),
                &mut store,
                false,
            )
            .unwrap();
        assert_eq!(store.upper_bound(v(3)), 3.0);
    }
}
