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

//! Bound tightenings and case splits.
//!
//! A `Tightening` is one new bound for one variable. A `CaseSplit` is a set
//! of them describing a region of the search space: a box of the input
//! space produced by interval bisection, or one phase of a ReLU. Case splits
//! are what sub-queries carry between workers.

use crate::index::VariableIndex;

/// Which side of a variable's interval a bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Lower,
    Upper,
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundKind::Lower => write!(f, "LB"),
            BoundKind::Upper => write!(f, "UB"),
        }
    }
}

/// A single bound tightening `variable >= value` or `variable <= value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tightening {
    pub variable: VariableIndex,
    pub value: f64,
    pub kind: BoundKind,
}

impl Tightening {
    #[inline]
    pub fn lower(variable: VariableIndex, value: f64) -> Self {
        Self {
            variable,
            value,
            kind: BoundKind::Lower,
        }
    }

    #[inline]
    pub fn upper(variable: VariableIndex, value: f64) -> Self {
        Self {
            variable,
            value,
            kind: BoundKind::Upper,
        }
    }
}

impl std::fmt::Display for Tightening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            BoundKind::Lower => write!(f, "{} >= {}", self.variable, self.value),
            BoundKind::Upper => write!(f, "{} <= {}", self.variable, self.value),
        }
    }
}

/// A conjunction of bound tightenings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseSplit {
    tightenings: Vec<Tightening>,
}

impl CaseSplit {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn from_tightenings(tightenings: Vec<Tightening>) -> Self {
        Self { tightenings }
    }

    #[inline]
    pub fn store_bound_tightening(&mut self, tightening: Tightening) {
        self.tightenings.push(tightening);
    }

    #[inline]
    pub fn tightenings(&self) -> &[Tightening] {
        &self.tightenings
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tightenings.is_empty()
    }

    /// Returns the tightest lower and upper bound this split places on
    /// `variable`, starting from the given defaults.
    pub fn bounds_of(&self, variable: VariableIndex, lower: f64, upper: f64) -> (f64, f64) {
        self.tightenings
            .iter()
            .filter(|t| t.variable == variable)
            .fold((lower, upper), |(lb, ub), t| match t.kind {
                BoundKind::Lower => (lb.max(t.value), ub),
                BoundKind::Upper => (lb, ub.min(t.value)),
            })
    }

    /// Returns a copy of this split with `extra` appended.
    pub fn extended<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = Tightening>,
    {
        let mut split = self.clone();
        split.tightenings.extend(extra);
        split
    }
}

impl std::fmt::Display for CaseSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.tightenings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    #[test]
    fn test_bounds_of_takes_tightest_values() {
        let split = CaseSplit::from_tightenings(vec![
            Tightening::lower(x(0), -1.0),
            Tightening::upper(x(0), 3.0),
            Tightening::lower(x(0), 0.5),
            Tightening::upper(x(1), 7.0),
        ]);

        assert_eq!(split.bounds_of(x(0), -5.0, 5.0), (0.5, 3.0));
        assert_eq!(split.bounds_of(x(1), -5.0, 5.0), (-5.0, 5.0));
        assert_eq!(split.bounds_of(x(2), -5.0, 5.0), (-5.0, 5.0));
    }

    #[test]
    fn test_extended_keeps_original_untouched() {
        let base = CaseSplit::from_tightenings(vec![Tightening::lower(x(0), 0.0)]);
        let child = base.extended([Tightening::upper(x(0), 1.0)]);

        assert_eq!(base.tightenings().len(), 1);
        assert_eq!(child.tightenings().len(), 2);
    }

    #[test]
    fn test_display() {
        let split = CaseSplit::from_tightenings(vec![
            Tightening::lower(x(0), 1.0),
            Tightening::upper(x(2), 2.0),
        ]);
        assert_eq!(format!("{}", split), "[x(0) >= 1, x(2) <= 2]");
    }
}
