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

//! ReLU bound propagation and phases.
//!
//! For `f = max(0, b)` the following always hold:
//!
//! - `f >= 0`, `f >= b`, hence `f.lb >= b.lb` and `b.ub <= f.ub`,
//! - `f.ub <= max(0, b.ub)`.
//!
//! Once the phase is known the constraint becomes linear. In the active
//! phase (`b >= 0`) it is `f = b` and bounds are copied both ways; in the
//! inactive phase (`b <= 0`) it is `f = 0`.

use crate::error::TightenerError;
use sextant_bounds::store::{BoundStore, TightenOutcome};
use sextant_core::float::Tolerance;
use sextant_model::{
    relu::ReluConstraint,
    tightening::{CaseSplit, Tightening},
};

/// The phase of a ReLU under the current bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReluPhase {
    /// `b >= 0` and `f = b`.
    Active,
    /// `b <= 0` and `f = 0`.
    Inactive,
    Unfixed,
}

impl std::fmt::Display for ReluPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReluPhase::Active => write!(f, "active"),
            ReluPhase::Inactive => write!(f, "inactive"),
            ReluPhase::Unfixed => write!(f, "unfixed"),
        }
    }
}

/// Determines the phase of `relu` implied by `store`.
pub fn relu_phase(relu: &ReluConstraint, store: &BoundStore, tolerance: &Tolerance) -> ReluPhase {
    let (b, f) = (relu.b(), relu.f());
    if tolerance.gte(store.lower_bound(b), 0.0) || tolerance.is_positive(store.lower_bound(f)) {
        ReluPhase::Active
    } else if tolerance.lte(store.upper_bound(b), 0.0) || tolerance.lte(store.upper_bound(f), 0.0)
    {
        ReluPhase::Inactive
    } else {
        ReluPhase::Unfixed
    }
}

/// The tightenings that fix `relu` into `phase`.
///
/// # Panics
///
/// Panics if `phase` is `ReluPhase::Unfixed`.
pub fn phase_split(relu: &ReluConstraint, phase: ReluPhase) -> CaseSplit {
    match phase {
        ReluPhase::Active => CaseSplit::from_tightenings(vec![
            Tightening::lower(relu.b(), 0.0),
            Tightening::lower(relu.f(), 0.0),
        ]),
        ReluPhase::Inactive => CaseSplit::from_tightenings(vec![
            Tightening::upper(relu.b(), 0.0),
            Tightening::upper(relu.f(), 0.0),
        ]),
        ReluPhase::Unfixed => panic!("called `phase_split` with an unfixed phase"),
    }
}

#[inline]
fn count(outcome: TightenOutcome) -> Result<usize, TightenerError> {
    match outcome {
        TightenOutcome::Infeasible => Err(TightenerError::Infeasible),
        TightenOutcome::Accepted => Ok(1),
        TightenOutcome::Rejected => Ok(0),
    }
}

/// Applies the ReLU rules to `store`. Returns the number of new bounds.
pub fn propagate_relu(
    relu: &ReluConstraint,
    store: &mut BoundStore,
    tolerance: &Tolerance,
) -> Result<usize, TightenerError> {
    let (b, f) = (relu.b(), relu.f());
    let mut new_bounds = 0;

    new_bounds += count(store.tighten_lower_bound(f, 0.0))?;
    new_bounds += count(store.tighten_lower_bound(f, store.lower_bound(b)))?;
    new_bounds += count(store.tighten_upper_bound(f, store.upper_bound(b).max(0.0)))?;
    new_bounds += count(store.tighten_upper_bound(b, store.upper_bound(f)))?;

    match relu_phase(relu, store, tolerance) {
        ReluPhase::Active => {
            new_bounds += count(store.tighten_lower_bound(b, 0.0))?;
            new_bounds += count(store.tighten_lower_bound(b, store.lower_bound(f)))?;
            new_bounds += count(store.tighten_lower_bound(f, store.lower_bound(b)))?;
            new_bounds += count(store.tighten_upper_bound(f, store.upper_bound(b)))?;
            new_bounds += count(store.tighten_upper_bound(b, store.upper_bound(f)))?;
        }
        ReluPhase::Inactive => {
            new_bounds += count(store.tighten_upper_bound(f, 0.0))?;
            new_bounds += count(store.tighten_upper_bound(b, 0.0))?;
        }
        ReluPhase::Unfixed => {}
    }
    Ok(new_bounds)
}
