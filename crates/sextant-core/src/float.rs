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

//! # Tolerant Float Comparisons
//!
//! Bounds, pivots and candidate assignments are all floating point values
//! produced by long chains of arithmetic. Comparing them exactly turns
//! rounding noise into spurious conflicts, so every comparison in the solver
//! goes through a `Tolerance`.
//!
//! Infinite values are first-class: unbounded variables carry `-∞` / `+∞`,
//! and `gte(+∞, -∞)` must hold while `are_equal(+∞, +∞)` must not produce a
//! `NaN` driven `false`. Exact equality is therefore checked before the
//! epsilon test in every predicate.

use num_traits::Float;

/// Default epsilon for bound comparisons.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Default threshold under which a pivot element is treated as zero.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-10;

/// An epsilon together with the comparison predicates that use it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance<F = f64> {
    epsilon: F,
}

impl Default for Tolerance<f64> {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl<F> Tolerance<F>
where
    F: Float,
{
    /// Creates a tolerance with the given epsilon.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is negative or not finite.
    #[inline]
    pub fn new(epsilon: F) -> Self {
        assert!(
            epsilon.is_finite() && epsilon >= F::zero(),
            "called `Tolerance::new` with an invalid epsilon"
        );
        Self { epsilon }
    }

    #[inline(always)]
    pub fn epsilon(&self) -> F {
        self.epsilon
    }

    /// `|x| <= epsilon`.
    #[inline(always)]
    pub fn is_zero(&self, x: F) -> bool {
        x.abs() <= self.epsilon
    }

    #[inline(always)]
    pub fn is_positive(&self, x: F) -> bool {
        x > self.epsilon
    }

    #[inline(always)]
    pub fn is_negative(&self, x: F) -> bool {
        x < -self.epsilon
    }

    #[inline(always)]
    pub fn are_equal(&self, a: F, b: F) -> bool {
        a == b || (a - b).abs() <= self.epsilon
    }

    /// `a > b` by more than epsilon.
    #[inline(always)]
    pub fn gt(&self, a: F, b: F) -> bool {
        a != b && a - b > self.epsilon
    }

    /// `a >= b` up to epsilon.
    #[inline(always)]
    pub fn gte(&self, a: F, b: F) -> bool {
        a == b || a - b >= -self.epsilon
    }

    #[inline(always)]
    pub fn lt(&self, a: F, b: F) -> bool {
        self.gt(b, a)
    }

    #[inline(always)]
    pub fn lte(&self, a: F, b: F) -> bool {
        self.gte(b, a)
    }

    /// Returns `true` if `x` lies in `[lower, upper]` up to epsilon.
    #[inline(always)]
    pub fn within(&self, x: F, lower: F, upper: F) -> bool {
        self.gte(x, lower) && self.lte(x, upper)
    }
}

/// Returns the midpoint of `[lower, upper]`, falling back to the finite end
/// (or zero) when the interval is unbounded.
///
/// Finite intervals wider than `F::max_value()` still get a finite midpoint.
#[inline]
pub fn interval_midpoint<F>(lower: F, upper: F) -> F
where
    F: Float,
{
    let two = F::one() + F::one();
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) => lower / two + upper / two,
        (true, false) => lower,
        (false, true) => upper,
        (false, false) => F::zero(),
    }
}

/// Returns a point that splits `[lower, upper]` into two strictly smaller
/// parts whenever that is possible.
///
/// Finite intervals are split at their midpoint. A half-unbounded interval is
/// split at `max(1, |end|)` away from its finite end, so neither part equals
/// the original interval. `(-∞, +∞)` is split at zero.
#[inline]
pub fn interval_split_point<F>(lower: F, upper: F) -> F
where
    F: Float,
{
    let offset = |end: F| end.abs().max(F::one());
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) => interval_midpoint(lower, upper),
        (true, false) => (lower + offset(lower)).min(F::max_value()),
        (false, true) => (upper - offset(upper)).max(F::min_value()),
        (false, false) => F::zero(),
    }
}

/// Returns the width of `[lower, upper]`, which is `+∞` for unbounded intervals.
#[inline]
pub fn interval_width<F>(lower: F, upper: F) -> F
where
    F: Float,
{
    if lower.is_finite() && upper.is_finite() {
        upper - lower
    } else {
        F::infinity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_uses_default_epsilon() {
        let tol = Tolerance::default();
        assert_eq!(tol.epsilon(), DEFAULT_EPSILON);
    }

    #[test]
    fn test_infinite_values_compare_sanely() {
        let tol = Tolerance::new(1e-9);
        let inf = f64::INFINITY;

        assert!(tol.gte(inf, -inf));
        assert!(!tol.gte(-inf, inf));
        assert!(tol.are_equal(inf, inf));
        assert!(!tol.gt(inf, inf));
        assert!(tol.lte(-inf, 0.0));
        assert!(tol.within(5.0, -inf, inf));
    }

    #[test]
    fn test_values_within_epsilon_are_equal() {
        let tol = Tolerance::new(1e-6);
        assert!(tol.are_equal(1.0, 1.0 + 5e-7));
        assert!(!tol.are_equal(1.0, 1.0 + 5e-6));
        assert!(tol.gte(1.0, 1.0 + 5e-7));
        assert!(!tol.gt(1.0 + 5e-7, 1.0));
    }

    #[test]
    fn test_midpoint_handles_unbounded_intervals() {
        assert_eq!(interval_midpoint(0.0, 4.0), 2.0);
        assert_eq!(interval_midpoint(1.0, f64::INFINITY), 1.0);
        assert_eq!(interval_midpoint(f64::NEG_INFINITY, -3.0), -3.0);
        assert_eq!(interval_midpoint(f64::NEG_INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_midpoint_of_overflowing_width_is_finite() {
        assert_eq!(interval_midpoint(-1e308, 1e308), 0.0);
        assert_eq!(interval_midpoint(-f64::MAX, f64::MAX), 0.0);
        assert_eq!(interval_midpoint(0.0, f64::MAX), f64::MAX / 2.0);
    }

    #[test]
    fn test_split_point_shrinks_unbounded_intervals() {
        assert_eq!(interval_split_point(0.0, 4.0), 2.0);
        assert_eq!(interval_split_point(0.0, f64::INFINITY), 1.0);
        assert_eq!(interval_split_point(5.0, f64::INFINITY), 10.0);
        assert_eq!(interval_split_point(-4.0, f64::INFINITY), 0.0);
        assert_eq!(interval_split_point(f64::NEG_INFINITY, 0.0), -1.0);
        assert_eq!(interval_split_point(f64::NEG_INFINITY, -2.0), -4.0);
        assert_eq!(interval_split_point(f64::NEG_INFINITY, f64::INFINITY), 0.0);
        assert_eq!(interval_split_point(f64::MAX, f64::INFINITY), f64::MAX);
    }

    #[test]
    fn test_width_is_infinite_for_half_open_intervals() {
        assert_eq!(interval_width(-1.0, 1.0), 2.0);
        assert!(interval_width(0.0, f64::INFINITY).is_infinite());
    }

    #[test]
    #[should_panic(expected = "invalid epsilon")]
    fn test_negative_epsilon_panics() {
        let _ = Tolerance::new(-1.0);
    }

    proptest! {
        #[test]
        fn prop_gt_and_lte_are_complementary(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            let tol = Tolerance::new(1e-9);
            prop_assert_ne!(tol.gt(a, b), tol.lte(a, b));
        }
    }
}
