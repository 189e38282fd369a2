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

//! # Input Queries
//!
//! An `InputQuery` is the complete description of one feasibility problem:
//! variable bounds, linear equations, ReLU constraints and the distinguished
//! input and output variables of the encoded network.
//!
//! ## Motivation
//!
//! Queries travel through several hands. The loader builds one, the
//! preprocessor rewrites it into a smaller equivalent one, and the
//! divide-and-conquer orchestrator hands deep copies to every worker engine.
//! Keeping the query a plain owned value (no shared interior state) makes those
//! copies trivially independent.
//!
//! ## Usage
//!
//! ```rust
//! use sextant_model::query::QueryBuilder;
//! use sextant_model::index::VariableIndex;
//!
//! let x0 = VariableIndex::new(0);
//! let x1 = VariableIndex::new(1);
//! let x2 = VariableIndex::new(2);
//!
//! let mut builder = QueryBuilder::new(3);
//! builder
//!     .set_bounds(x0, -1.0, 1.0)
//!     .add_equation_from_terms([(1.0, x0), (-1.0, x1)], 0.0)
//!     .add_relu(x1, x2)
//!     .mark_input(x0)
//!     .mark_output(x2);
//! let query = builder.build();
//!
//! assert_eq!(query.num_variables(), 3);
//! assert_eq!(query.num_equations(), 1);
//! assert_eq!(query.num_relus(), 1);
//! assert!(query.is_satisfied_by(&[0.5, 0.5, 0.5], &Default::default()));
//! ```

use crate::{
    equation::Equation,
    index::{EquationIndex, ReluIndex, VariableIndex},
    relu::ReluConstraint,
};
use sextant_core::float::Tolerance;

/// A feasibility problem over real-valued variables.
#[derive(Clone, PartialEq, Default)]
pub struct InputQuery {
    lower_bounds: Vec<f64>,
    upper_bounds: Vec<f64>,
    equations: Vec<Equation>,
    relus: Vec<ReluConstraint>,
    input_variables: Vec<VariableIndex>,
    output_variables: Vec<VariableIndex>,
    solution: Option<Vec<f64>>,
}

impl InputQuery {
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.lower_bounds.len()
    }

    #[inline]
    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    #[inline]
    pub fn num_relus(&self) -> usize {
        self.relus.len()
    }

    /// Returns the lower bound of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` is not in `0..num_variables()`.
    #[inline]
    pub fn lower_bound(&self, variable: VariableIndex) -> f64 {
        let index = variable.get();
        debug_assert!(
            index < self.num_variables(),
            "called `InputQuery::lower_bound` with variable index out of bounds: the len is {} but the index is {}",
            self.num_variables(),
            index
        );

        self.lower_bounds[index]
    }

    /// Returns the upper bound of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` is not in `0..num_variables()`.
    #[inline]
    pub fn upper_bound(&self, variable: VariableIndex) -> f64 {
        let index = variable.get();
        debug_assert!(
            index < self.num_variables(),
            "called `InputQuery::upper_bound` with variable index out of bounds: the len is {} but the index is {}",
            self.num_variables(),
            index
        );

        self.upper_bounds[index]
    }

    #[inline]
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower_bounds
    }

    #[inline]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    #[inline]
    pub fn set_lower_bound(&mut self, variable: VariableIndex, value: f64) {
        self.lower_bounds[variable.get()] = value;
    }

    #[inline]
    pub fn set_upper_bound(&mut self, variable: VariableIndex, value: f64) {
        self.upper_bounds[variable.get()] = value;
    }

    #[inline]
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    #[inline]
    pub fn equation(&self, equation: EquationIndex) -> &Equation {
        &self.equations[equation.get()]
    }

    #[inline]
    pub fn relus(&self) -> &[ReluConstraint] {
        &self.relus
    }

    #[inline]
    pub fn relu(&self, relu: ReluIndex) -> &ReluConstraint {
        &self.relus[relu.get()]
    }

    #[inline]
    pub fn input_variables(&self) -> &[VariableIndex] {
        &self.input_variables
    }

    #[inline]
    pub fn output_variables(&self) -> &[VariableIndex] {
        &self.output_variables
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.input_variables.len()
    }

    #[inline]
    pub fn is_input(&self, variable: VariableIndex) -> bool {
        self.input_variables.contains(&variable)
    }

    #[inline]
    pub fn is_output(&self, variable: VariableIndex) -> bool {
        self.output_variables.contains(&variable)
    }

    /// Returns `true` if `variable` is the input or output of any ReLU.
    pub fn participates_in_relu(&self, variable: VariableIndex) -> bool {
        self.relus.iter().any(|r| r.participates(variable))
    }

    /// Stores a satisfying assignment for this query.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have one entry per variable.
    pub fn set_solution(&mut self, values: Vec<f64>) {
        assert_eq!(
            values.len(),
            self.num_variables(),
            "called `InputQuery::set_solution` with a solution of the wrong length"
        );
        self.solution = Some(values);
    }

    #[inline]
    pub fn solution(&self) -> Option<&[f64]> {
        self.solution.as_deref()
    }

    #[inline]
    pub fn solution_value(&self, variable: VariableIndex) -> Option<f64> {
        self.solution.as_ref().map(|s| s[variable.get()])
    }

    /// Returns `true` if `values` meets every bound, equation and ReLU of the
    /// query up to `tolerance`.
    pub fn is_satisfied_by(&self, values: &[f64], tolerance: &Tolerance) -> bool {
        if values.len() != self.num_variables() {
            return false;
        }

        let within_bounds = values
            .iter()
            .zip(self.lower_bounds.iter().zip(&self.upper_bounds))
            .all(|(&v, (&lb, &ub))| tolerance.within(v, lb, ub));

        within_bounds
            && self.equations.iter().all(|e| e.is_satisfied(values, tolerance))
            && self.relus.iter().all(|r| r.is_satisfied(values, tolerance))
    }
}

impl std::fmt::Debug for InputQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputQuery")
            .field("num_variables", &self.num_variables())
            .field("num_equations", &self.num_equations())
            .field("num_relus", &self.num_relus())
            .field("input_variables", &self.input_variables)
            .field("output_variables", &self.output_variables)
            .finish()
    }
}

impl std::fmt::Display for InputQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "InputQuery(variables: {}, equations: {}, relus: {})",
            self.num_variables(),
            self.num_equations(),
            self.num_relus()
        )?;
        for (i, (lb, ub)) in self.lower_bounds.iter().zip(&self.upper_bounds).enumerate() {
            writeln!(f, "  {} in [{}, {}]", VariableIndex::new(i), lb, ub)?;
        }
        for equation in &self.equations {
            writeln!(f, "  {}", equation)?;
        }
        for relu in &self.relus {
            writeln!(f, "  {}", relu)?;
        }
        Ok(())
    }
}

/// Builder for `InputQuery`.
///
/// # Defaults
///
/// | Field | Default Value | Semantics |
/// | :--- | :--- | :--- |
/// | `lower_bounds` | `-∞` | Variables are unbounded below. |
/// | `upper_bounds` | `+∞` | Variables are unbounded above. |
/// | `equations` | empty | No linear constraints. |
/// | `relus` | empty | No piecewise-linear constraints. |
/// | `input/output variables` | empty | Nothing is marked. |
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: InputQuery,
}

impl QueryBuilder {
    /// Creates a builder for a query over `num_variables` unbounded variables.
    pub fn new(num_variables: usize) -> Self {
        Self {
            query: InputQuery {
                lower_bounds: vec![f64::NEG_INFINITY; num_variables],
                upper_bounds: vec![f64::INFINITY; num_variables],
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.query.num_variables()
    }

    #[inline]
    fn check_variable(&self, variable: VariableIndex, caller: &str) {
        assert!(
            variable.get() < self.num_variables(),
            "called `QueryBuilder::{}` with variable index out of bounds: the len is {} but the index is {}",
            caller,
            self.num_variables(),
            variable.get()
        );
    }

    /// Sets both bounds of `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `variable` is not in `0..num_variables()`.
    pub fn set_bounds(&mut self, variable: VariableIndex, lower: f64, upper: f64) -> &mut Self {
        self.check_variable(variable, "set_bounds");
        self.query.lower_bounds[variable.get()] = lower;
        self.query.upper_bounds[variable.get()] = upper;
        self
    }

    pub fn set_lower_bound(&mut self, variable: VariableIndex, lower: f64) -> &mut Self {
        self.check_variable(variable, "set_lower_bound");
        self.query.lower_bounds[variable.get()] = lower;
        self
    }

    pub fn set_upper_bound(&mut self, variable: VariableIndex, upper: f64) -> &mut Self {
        self.check_variable(variable, "set_upper_bound");
        self.query.upper_bounds[variable.get()] = upper;
        self
    }

    /// Adds an equation.
    ///
    /// # Panics
    ///
    /// Panics if the equation mentions a variable outside `0..num_variables()`.
    pub fn add_equation(&mut self, equation: Equation) -> &mut Self {
        for addend in equation.addends() {
            self.check_variable(addend.variable, "add_equation");
        }
        self.query.equations.push(equation);
        self
    }

    pub fn add_equation_from_terms<I>(&mut self, terms: I, scalar: f64) -> &mut Self
    where
        I: IntoIterator<Item = (f64, VariableIndex)>,
    {
        self.add_equation(Equation::from_terms(terms, scalar))
    }

    /// Adds the constraint `f = max(0, b)`.
    pub fn add_relu(&mut self, b: VariableIndex, f: VariableIndex) -> &mut Self {
        self.check_variable(b, "add_relu");
        self.check_variable(f, "add_relu");
        self.query.relus.push(ReluConstraint::new(b, f));
        self
    }

    pub fn mark_input(&mut self, variable: VariableIndex) -> &mut Self {
        self.check_variable(variable, "mark_input");
        if !self.query.input_variables.contains(&variable) {
            self.query.input_variables.push(variable);
        }
        self
    }

    pub fn mark_output(&mut self, variable: VariableIndex) -> &mut Self {
        self.check_variable(variable, "mark_output");
        if !self.query.output_variables.contains(&variable) {
            self.query.output_variables.push(variable);
        }
        self
    }

    #[inline]
    pub fn build(self) -> InputQuery {
        self.query
    }
}
