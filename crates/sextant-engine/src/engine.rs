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

//! # Search Engine Contract
//!
//! The divide-and-conquer orchestrator drives any number of engines through
//! the `SearchEngine` trait. An engine owns all of its search state
//! exclusively and is moved into the thread that runs it, hence the `Send`
//! bound.
//!
//! ## Lifecycle
//!
//! 1. `process_query` loads (and optionally preprocesses) the query.
//! 2. `solve` decides one region of the input space within a local time
//!    budget and returns an `ExitCode`. It can be called many times.
//! 3. After `Sat`, `extract_solution` yields the satisfying assignment over
//!    the processed query's variables; `variable_map` translates it back.
//!
//! The engine watches its own `quit_flag` and returns
//! `ExitCode::QuitRequested` soon after the flag is raised.

use crate::{branching::BranchingHeuristic, error::EngineError, preprocess::VariableMap};
use sextant_bounds::store::BoundSnapshot;
use sextant_factor::factorization::BasisFactorization;
use sextant_model::{query::InputQuery, tightening::CaseSplit};
use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

/// The state of an engine after its last `solve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExitCode {
    #[default]
    NotDone,
    Sat,
    Unsat,
    Timeout,
    QuitRequested,
    Error,
}

impl ExitCode {
    /// Returns `true` when the engine reached a definitive verdict.
    #[inline]
    pub fn is_conclusive(self) -> bool {
        matches!(self, ExitCode::Sat | ExitCode::Unsat)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::NotDone => write!(f, "NotDone"),
            ExitCode::Sat => write!(f, "Sat"),
            ExitCode::Unsat => write!(f, "Unsat"),
            ExitCode::Timeout => write!(f, "Timeout"),
            ExitCode::QuitRequested => write!(f, "QuitRequested"),
            ExitCode::Error => write!(f, "Error"),
        }
    }
}

/// The state reached at the root of a solved subquery: the propagated
/// bounds and, when available, the basis factorization.
///
/// Tree states are deep copies. A child subquery that starts from one
/// never shares anything with the engine that produced it.
#[derive(Debug, Clone)]
pub struct TreeState {
    bounds: BoundSnapshot,
    factorization: Option<Box<dyn BasisFactorization>>,
}

impl TreeState {
    #[inline]
    pub fn new(bounds: BoundSnapshot, factorization: Option<Box<dyn BasisFactorization>>) -> Self {
        Self {
            bounds,
            factorization,
        }
    }

    #[inline]
    pub fn bounds(&self) -> &BoundSnapshot {
        &self.bounds
    }

    #[inline]
    pub fn factorization(&self) -> Option<&dyn BasisFactorization> {
        self.factorization.as_deref()
    }
}

pub trait SearchEngine: Send {
    /// Loads `query`. With `preprocess` the full simplification pipeline
    /// runs first. Returns `Ok(false)` when infeasibility was proven while
    /// processing.
    fn process_query(&mut self, query: &InputQuery, preprocess: bool)
        -> Result<bool, EngineError>;

    /// The flag this engine watches for cancellation.
    fn quit_flag(&self) -> Arc<AtomicBool>;

    /// Decides the region `split` of the processed query. A zero
    /// `local_timeout` means unbounded. A `tree_state` produced by a
    /// previous call for an enclosing region may be used as a warm start.
    fn solve(
        &mut self,
        split: &CaseSplit,
        local_timeout: Duration,
        tree_state: Option<&TreeState>,
    ) -> ExitCode;

    fn exit_code(&self) -> ExitCode;

    /// The satisfying assignment found by the last `Sat` solve, indexed by
    /// the processed query's variables.
    fn extract_solution(&self) -> Option<Vec<f64>>;

    fn processed_query(&self) -> Option<&InputQuery>;

    fn variable_map(&self) -> Option<&VariableMap>;

    fn set_seed(&mut self, seed: u64);

    fn set_branching_heuristic(&mut self, heuristic: BranchingHeuristic);

    /// The root state of the last solved subquery.
    fn tree_state(&self) -> Option<TreeState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exit_code_is_not_done() {
        assert_eq!(ExitCode::default(), ExitCode::NotDone);
    }

    #[test]
    fn test_conclusive_exit_codes() {
        assert!(ExitCode::Sat.is_conclusive());
        assert!(ExitCode::Unsat.is_conclusive());
        assert!(!ExitCode::Timeout.is_conclusive());
        assert!(!ExitCode::Error.is_conclusive());
        assert_eq!(ExitCode::QuitRequested.to_string(), "QuitRequested");
    }
}
