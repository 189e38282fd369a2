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

//! # Crash Basis
//!
//! Picks one basic variable per linearly independent equation so the
//! constraint system can be written as `A_B·x_B + A_N·x_N = c` with an
//! invertible `A_B`. The basis factorization is seeded with `A_B`.
//!
//! The selection is a sequential Gaussian elimination over the dense rows.
//! Each equation is reduced by the pivot rows chosen so far; among the
//! remaining nonzero columns the pivot is chosen by preference:
//!
//! 1. columns that are not input variables,
//! 2. columns outside every ReLU, so ReLU outputs stay free to be repaired,
//! 3. columns occurring in a single equation of the query,
//! 4. the largest magnitude.
//!
//! Only columns within a factor of `RELATIVE_PIVOT_THRESHOLD` of the largest
//! reduced entry are eligible, so preferences never pick a tiny pivot.
//!
//! A row that reduces to zero is redundant when its right-hand side also
//! vanishes and is dropped. Otherwise the equations contradict each other.

use sextant_core::float::Tolerance;
use sextant_model::{
    index::{EquationIndex, VariableIndex},
    query::InputQuery,
};

const RELATIVE_PIVOT_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrashBasisError {
    /// The equations have no common solution.
    #[error("equation {equation} contradicts the preceding equations")]
    Inconsistent { equation: EquationIndex },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrashBasis {
    rows: Vec<EquationIndex>,
    basic: Vec<VariableIndex>,
    non_basic: Vec<VariableIndex>,
    /// `basic_position[v]` is the basis column of `v`, if it is basic.
    basic_position: Vec<Option<usize>>,
    /// `A_B`, row-major: entry `(r, k)` is the coefficient of `basic[k]` in
    /// equation `rows[r]`.
    matrix: Vec<f64>,
}

impl CrashBasis {
    /// Selects a basis for the equations of `query`.
    pub fn compute(query: &InputQuery, tolerance: &Tolerance) -> Result<Self, CrashBasisError> {
        let n = query.num_variables();

        let mut occurrences = vec![0usize; n];
        for equation in query.equations() {
            for addend in equation.addends() {
                occurrences[addend.variable.get()] += 1;
            }
        }

        // Reduced pivot rows: (pivot column, dense row normalized to 1 at the pivot, rhs).
        let mut pivots: Vec<(usize, Vec<f64>, f64)> = Vec::new();
        let mut rows = Vec::new();

        for (index, equation) in query.equations().iter().enumerate() {
            let mut row = vec![0.0; n];
            for addend in equation.addends() {
                row[addend.variable.get()] += addend.coefficient;
            }
            let mut rhs = equation.scalar();

            for (column, pivot_row, pivot_rhs) in &pivots {
                let factor = row[*column];
                if factor != 0.0 {
                    for (r, p) in row.iter_mut().zip(pivot_row) {
                        *r -= factor * p;
                    }
                    row[*column] = 0.0;
                    rhs -= factor * pivot_rhs;
                }
            }

            let largest = row.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            if tolerance.is_zero(largest) {
                if tolerance.is_zero(rhs) {
                    tracing::trace!("dropping redundant equation {}", index);
                    continue;
                }
                return Err(CrashBasisError::Inconsistent {
                    equation: EquationIndex::new(index),
                });
            }

            let threshold = largest * RELATIVE_PIVOT_THRESHOLD;
            let column = (0..n)
                .filter(|&j| row[j].abs() >= threshold && !tolerance.is_zero(row[j]))
                .max_by(|&a, &b| {
                    let key = |j: usize| {
                        let variable = VariableIndex::new(j);
                        (
                            !query.is_input(variable),
                            !query.participates_in_relu(variable),
                            occurrences[j] == 1,
                        )
                    };
                    key(a)
                        .cmp(&key(b))
                        .then(row[a].abs().total_cmp(&row[b].abs()))
                        // Prefer the earlier column on ties.
                        .then(b.cmp(&a))
                })
                .unwrap_or(0);

            let pivot = row[column];
            for value in row.iter_mut() {
                *value /= pivot;
            }
            rhs /= pivot;
            row[column] = 1.0;

            pivots.push((column, row, rhs));
            rows.push(EquationIndex::new(index));
        }

        let m = rows.len();
        let basic: Vec<VariableIndex> = pivots
            .iter()
            .map(|(column, _, _)| VariableIndex::new(*column))
            .collect();

        let mut basic_position = vec![None; n];
        for (k, variable) in basic.iter().enumerate() {
            basic_position[variable.get()] = Some(k);
        }
        let non_basic = (0..n)
            .filter(|&j| basic_position[j].is_none())
            .map(VariableIndex::new)
            .collect();

        let mut matrix = vec![0.0; m * m];
        for (r, row) in rows.iter().enumerate() {
            for addend in query.equation(*row).addends() {
                if let Some(k) = basic_position[addend.variable.get()] {
                    matrix[r * m + k] = addend.coefficient;
                }
            }
        }

        tracing::debug!(
            "crash basis: {} basic variables over {} equations",
            m,
            query.num_equations()
        );

        Ok(Self {
            rows,
            basic,
            non_basic,
            basic_position,
            matrix,
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn rows(&self) -> &[EquationIndex] {
        &self.rows
    }

    #[inline]
    pub fn basic(&self) -> &[VariableIndex] {
        &self.basic
    }

    #[inline]
    pub fn non_basic(&self) -> &[VariableIndex] {
        &self.non_basic
    }

    /// The basis column of `variable`, if it is basic.
    #[inline]
    pub fn basic_position(&self, variable: VariableIndex) -> Option<usize> {
        self.basic_position.get(variable.get()).copied().flatten()
    }

    #[inline]
    pub fn is_basic(&self, variable: VariableIndex) -> bool {
        self.basic_position(variable).is_some()
    }

    /// `A_B` in row-major order.
    #[inline]
    pub fn matrix(&self) -> &[f64] {
        &self.matrix
    }

    /// The column of `variable` restricted to the basis rows.
    pub fn column(&self, query: &InputQuery, variable: VariableIndex) -> Vec<f64> {
        self.rows
            .iter()
            .map(|&row| query.equation(row).coefficient_of(variable))
            .collect()
    }

    /// The right-hand sides of the basis rows.
    pub fn rhs(&self, query: &InputQuery) -> Vec<f64> {
        self.rows
            .iter()
            .map(|&row| query.equation(row).scalar())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_model::query::QueryBuilder;

    fn v(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    #[test]
    fn test_prefers_non_input_singleton_columns() {
        // x2 = x0 + x1, x3 = x2 - x0 with inputs x0, x1.
        let mut builder = QueryBuilder::new(4);
        builder
            .mark_input(v(0))
            .mark_input(v(1))
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1)), (-1.0, v(2))], 0.0)
            .add_equation_from_terms([(1.0, v(2)), (-1.0, v(0)), (-1.0, v(3))], 0.0);
        let query = builder.build();

        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        assert_eq!(basis.dimension(), 2);
        assert_eq!(basis.basic(), &[v(2), v(3)]);
        assert_eq!(basis.non_basic(), &[v(0), v(1)]);
        assert_eq!(basis.matrix(), &[-1.0, 0.0, 1.0, -1.0]);
        assert_eq!(basis.basic_position(v(3)), Some(1));
        assert!(!basis.is_basic(v(0)));
    }

    #[test]
    fn test_redundant_equation_is_dropped() {
        let mut builder = QueryBuilder::new(2);
        builder
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 2.0)
            .add_equation_from_terms([(2.0, v(0)), (2.0, v(1))], 4.0);
        let query = builder.build();

        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        assert_eq!(basis.dimension(), 1);
        assert_eq!(basis.rows(), &[EquationIndex::new(0)]);
        assert_eq!(basis.rhs(&query), vec![2.0]);
    }

    #[test]
    fn test_contradicting_equations_are_inconsistent() {
        let mut builder = QueryBuilder::new(2);
        builder
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 2.0)
            .add_equation_from_terms([(1.0, v(0)), (1.0, v(1))], 3.0);
        let query = builder.build();

        assert_eq!(
            CrashBasis::compute(&query, &Tolerance::default()),
            Err(CrashBasisError::Inconsistent {
                equation: EquationIndex::new(1)
            })
        );
    }

    #[test]
    fn test_column_follows_basis_rows() {
        let mut builder = QueryBuilder::new(3);
        builder
            .add_equation_from_terms([(1.0, v(0)), (3.0, v(2))], 1.0)
            .add_equation_from_terms([(1.0, v(1)), (-2.0, v(2))], 0.0);
        let query = builder.build();

        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        assert_eq!(basis.column(&query, v(2)), vec![3.0, -2.0]);
    }

    #[test]
    fn test_no_equations_gives_empty_basis() {
        let query = QueryBuilder::new(2).build();
        let basis = CrashBasis::compute(&query, &Tolerance::default()).unwrap();
        assert_eq!(basis.dimension(), 0);
        assert_eq!(basis.non_basic().len(), 2);
    }
}
