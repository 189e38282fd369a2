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

//! Linear equations `Σ aᵢ·xᵢ = c`.
//!
//! Network encodings produce many short equations (a neuron's weighted sum
//! touches one previous layer), so addends live in a `SmallVec` and spill to
//! the heap only for wide layers. Every variable appears at most once in an
//! equation; adding a variable twice folds the coefficients together.

use crate::index::VariableIndex;
use sextant_core::float::Tolerance;
use smallvec::SmallVec;

/// One term `coefficient · variable` of an equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Addend {
    pub coefficient: f64,
    pub variable: VariableIndex,
}

impl Addend {
    #[inline]
    pub fn new(coefficient: f64, variable: VariableIndex) -> Self {
        Self {
            coefficient,
            variable,
        }
    }
}

/// A linear equation `Σ coefficient·variable = scalar`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Equation {
    addends: SmallVec<[Addend; 4]>,
    scalar: f64,
}

impl Equation {
    /// Creates an equation without addends and with the given right-hand side.
    #[inline]
    pub fn new(scalar: f64) -> Self {
        Self {
            addends: SmallVec::new(),
            scalar,
        }
    }

    /// Creates an equation from `(coefficient, variable)` pairs.
    pub fn from_terms<I>(terms: I, scalar: f64) -> Self
    where
        I: IntoIterator<Item = (f64, VariableIndex)>,
    {
        let mut equation = Self::new(scalar);
        for (coefficient, variable) in terms {
            equation.add_addend(coefficient, variable);
        }
        equation
    }

    /// Adds `coefficient · variable`, folding it into an existing addend of
    /// the same variable. Addends whose coefficient cancels to zero are removed.
    pub fn add_addend(&mut self, coefficient: f64, variable: VariableIndex) -> &mut Self {
        if let Some(pos) = self.position_of(variable) {
            self.addends[pos].coefficient += coefficient;
            if self.addends[pos].coefficient == 0.0 {
                self.addends.remove(pos);
            }
        } else if coefficient != 0.0 {
            self.addends.push(Addend::new(coefficient, variable));
        }
        self
    }

    #[inline]
    pub fn set_scalar(&mut self, scalar: f64) {
        self.scalar = scalar;
    }

    #[inline]
    pub fn scalar(&self) -> f64 {
        self.scalar
    }

    #[inline]
    pub fn addends(&self) -> &[Addend] {
        &self.addends
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.addends.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addends.is_empty()
    }

    #[inline]
    pub fn contains(&self, variable: VariableIndex) -> bool {
        self.position_of(variable).is_some()
    }

    /// Returns the coefficient of `variable`, or `0.0` if it does not occur.
    #[inline]
    pub fn coefficient_of(&self, variable: VariableIndex) -> f64 {
        self.position_of(variable)
            .map(|pos| self.addends[pos].coefficient)
            .unwrap_or(0.0)
    }

    /// Evaluates the left-hand side for a full assignment.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not cover every variable of the equation.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.addends
            .iter()
            .map(|a| a.coefficient * values[a.variable.get()])
            .sum()
    }

    /// Returns `true` if the assignment satisfies the equation up to `tolerance`.
    #[inline]
    pub fn is_satisfied(&self, values: &[f64], tolerance: &Tolerance) -> bool {
        tolerance.are_equal(self.evaluate(values), self.scalar)
    }

    /// Replaces `variable` by the constant `value`, moving its contribution to
    /// the right-hand side.
    pub fn fix_variable(&mut self, variable: VariableIndex, value: f64) {
        if let Some(pos) = self.position_of(variable) {
            let addend = self.addends.remove(pos);
            self.scalar -= addend.coefficient * value;
        }
    }

    /// Replaces every occurrence of `from` by `to`, folding coefficients if
    /// `to` already occurs.
    pub fn merge_variable(&mut self, from: VariableIndex, to: VariableIndex) {
        if let Some(pos) = self.position_of(from) {
            let addend = self.addends.remove(pos);
            self.add_addend(addend.coefficient, to);
        }
    }

    /// Rewrites every variable through `map`.
    pub fn remap<F>(&mut self, mut map: F)
    where
        F: FnMut(VariableIndex) -> VariableIndex,
    {
        for addend in &mut self.addends {
            addend.variable = map(addend.variable);
        }
    }

    #[inline]
    fn position_of(&self, variable: VariableIndex) -> Option<usize> {
        self.addends.iter().position(|a| a.variable == variable)
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.addends.is_empty() {
            write!(f, "0")?;
        }
        for (i, addend) in self.addends.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}{}", addend.coefficient, addend.variable)?;
        }
        write!(f, " = {}", self.scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    #[test]
    fn test_add_addend_folds_duplicates_and_drops_zeros() {
        let mut eq = Equation::new(1.0);
        eq.add_addend(2.0, x(0)).add_addend(3.0, x(1)).add_addend(-2.0, x(0));

        assert_eq!(eq.len(), 1);
        assert!(!eq.contains(x(0)));
        assert_eq!(eq.coefficient_of(x(1)), 3.0);
    }

    #[test]
    fn test_evaluate_and_satisfaction() {
        let eq = Equation::from_terms([(1.0, x(0)), (-2.0, x(1))], 4.0);
        let tol = Tolerance::default();

        assert_eq!(eq.evaluate(&[6.0, 1.0]), 4.0);
        assert!(eq.is_satisfied(&[6.0, 1.0], &tol));
        assert!(!eq.is_satisfied(&[6.0, 2.0], &tol));
    }

    #[test]
    fn test_fix_variable_moves_contribution_to_scalar() {
        let mut eq = Equation::from_terms([(2.0, x(0)), (1.0, x(1))], 10.0);
        eq.fix_variable(x(0), 3.0);

        assert_eq!(eq.len(), 1);
        assert_eq!(eq.scalar(), 4.0);
    }

    #[test]
    fn test_merge_variable_folds_into_target() {
        let mut eq = Equation::from_terms([(1.0, x(0)), (-1.0, x(1)), (2.0, x(2))], 0.0);
        eq.merge_variable(x(1), x(0));

        assert!(!eq.contains(x(0)));
        assert!(!eq.contains(x(1)));
        assert_eq!(eq.coefficient_of(x(2)), 2.0);
    }

    #[test]
    fn test_display() {
        let eq = Equation::from_terms([(1.0, x(0)), (-2.0, x(3))], 5.0);
        assert_eq!(format!("{}", eq), "1x(0) + -2x(3) = 5");
    }
}
