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

use crate::index::VariableIndex;
use sextant_core::float::Tolerance;

/// The constraint `f = max(0, b)` between a pre-activation variable `b` and
/// its activation `f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReluConstraint {
    b: VariableIndex,
    f: VariableIndex,
}

impl ReluConstraint {
    /// Creates a new ReLU constraint.
    ///
    /// # Panics
    ///
    /// Panics if `b` and `f` are the same variable.
    #[inline]
    pub fn new(b: VariableIndex, f: VariableIndex) -> Self {
        assert_ne!(
            b, f,
            "called `ReluConstraint::new` with the same variable as input and output"
        );
        Self { b, f }
    }

    /// The pre-activation (input) variable.
    #[inline]
    pub fn b(&self) -> VariableIndex {
        self.b
    }

    /// The activation (output) variable.
    #[inline]
    pub fn f(&self) -> VariableIndex {
        self.f
    }

    #[inline]
    pub fn participates(&self, variable: VariableIndex) -> bool {
        self.b == variable || self.f == variable
    }

    /// Returns `true` if `values[f] == max(0, values[b])` up to `tolerance`.
    #[inline]
    pub fn is_satisfied(&self, values: &[f64], tolerance: &Tolerance) -> bool {
        let b = values[self.b.get()];
        let f = values[self.f.get()];
        tolerance.are_equal(f, b.max(0.0))
    }

    /// Rewrites both variables through `map`.
    pub fn remap<F>(&mut self, mut map: F)
    where
        F: FnMut(VariableIndex) -> VariableIndex,
    {
        self.b = map(self.b);
        self.f = map(self.f);
    }
}

impl std::fmt::Display for ReluConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = relu({})", self.f, self.b)
    }
}
