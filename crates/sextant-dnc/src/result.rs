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

use crate::stats::DncStatistics;
use rustc_hash::FxHashMap;
use sextant_engine::{engine::ExitCode, error::EngineError};
use std::collections::TryReserveError;

/// The verdict of a whole divide-and-conquer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DncExitCode {
    Sat,
    Unsat,
    Error,
    #[default]
    NotDone,
    QuitRequested,
    Timeout,
}

impl DncExitCode {
    /// The result tag printed for this exit code.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            DncExitCode::Sat => "sat",
            DncExitCode::Unsat => "unsat",
            DncExitCode::Error => "ERROR",
            DncExitCode::NotDone => "NOT_DONE",
            DncExitCode::QuitRequested => "QUIT_REQUESTED",
            DncExitCode::Timeout => "TIMEOUT",
        }
    }

    /// Combines what the run observed into the final verdict.
    ///
    /// First match wins: `Sat`, `Timeout`, `QuitRequested`, `Error`, then
    /// `Unsat` when no subquery is left unresolved. Any other combination
    /// means the run ended without a reason and yields `NotDone`.
    pub fn decide(
        sat: bool,
        timeout_reached: bool,
        quit_requested: bool,
        error: bool,
        unresolved: usize,
    ) -> Self {
        if sat {
            DncExitCode::Sat
        } else if timeout_reached {
            DncExitCode::Timeout
        } else if quit_requested {
            DncExitCode::QuitRequested
        } else if error {
            DncExitCode::Error
        } else if unresolved == 0 {
            DncExitCode::Unsat
        } else {
            debug_assert!(
                false,
                "divide-and-conquer run ended with {} unresolved subqueries and no reason",
                unresolved
            );
            DncExitCode::NotDone
        }
    }
}

impl From<ExitCode> for DncExitCode {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::NotDone => DncExitCode::NotDone,
            ExitCode::Sat => DncExitCode::Sat,
            ExitCode::Unsat => DncExitCode::Unsat,
            ExitCode::Timeout => DncExitCode::Timeout,
            ExitCode::QuitRequested => DncExitCode::QuitRequested,
            ExitCode::Error => DncExitCode::Error,
        }
    }
}

impl std::fmt::Display for DncExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that abort a run before any search happens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DncError {
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DncOutcome {
    exit_code: DncExitCode,
    solution: Option<FxHashMap<usize, f64>>,
    statistics: DncStatistics,
}

impl DncOutcome {
    #[inline]
    pub fn new(
        exit_code: DncExitCode,
        solution: Option<FxHashMap<usize, f64>>,
        statistics: DncStatistics,
    ) -> Self {
        debug_assert!(
            solution.is_none() || exit_code == DncExitCode::Sat,
            "called `DncOutcome::new` with a solution for exit code {}",
            exit_code
        );
        Self {
            exit_code,
            solution,
            statistics,
        }
    }

    #[inline]
    pub fn exit_code(&self) -> DncExitCode {
        self.exit_code
    }

    #[inline]
    pub fn result_str(&self) -> &'static str {
        self.exit_code.as_str()
    }

    /// Values of the original query's variables, keyed by variable index.
    /// Present only for `Sat`.
    #[inline]
    pub fn solution(&self) -> Option<&FxHashMap<usize, f64>> {
        self.solution.as_ref()
    }

    /// The value of one original variable in the solution.
    #[inline]
    pub fn value(&self, variable: usize) -> Option<f64> {
        self.solution
            .as_ref()
            .and_then(|solution| solution.get(&variable).copied())
    }

    #[inline]
    pub fn statistics(&self) -> &DncStatistics {
        &self.statistics
    }
}

impl std::fmt::Display for DncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Result: {}", self.exit_code)?;
        write!(f, "{}", self.statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::DncStatisticsBuilder;

    #[test]
    fn test_result_tags() {
        assert_eq!(DncExitCode::Sat.as_str(), "sat");
        assert_eq!(DncExitCode::Unsat.as_str(), "unsat");
        assert_eq!(DncExitCode::Error.as_str(), "ERROR");
        assert_eq!(DncExitCode::NotDone.as_str(), "NOT_DONE");
        assert_eq!(DncExitCode::QuitRequested.as_str(), "QUIT_REQUESTED");
        assert_eq!(DncExitCode::Timeout.as_str(), "TIMEOUT");
        assert_eq!(DncExitCode::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_decide_precedence() {
        use DncExitCode::*;
        assert_eq!(DncExitCode::decide(true, true, true, true, 5), Sat);
        assert_eq!(DncExitCode::decide(false, true, true, true, 0), Timeout);
        assert_eq!(DncExitCode::decide(false, false, true, true, 0), QuitRequested);
        assert_eq!(DncExitCode::decide(false, false, false, true, 0), Error);
        assert_eq!(DncExitCode::decide(false, false, false, false, 0), Unsat);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no reason")]
    fn test_decide_without_reason_is_a_defect() {
        let _ = DncExitCode::decide(false, false, false, false, 3);
    }

    #[test]
    fn test_from_engine_exit_code() {
        assert_eq!(DncExitCode::from(ExitCode::Sat), DncExitCode::Sat);
        assert_eq!(DncExitCode::from(ExitCode::NotDone), DncExitCode::NotDone);
        assert_eq!(
            DncExitCode::from(ExitCode::QuitRequested),
            DncExitCode::QuitRequested
        );
    }

    #[test]
    fn test_outcome_value_lookup() {
        let mut solution = FxHashMap::default();
        solution.insert(2, 0.5);
        let outcome = DncOutcome::new(
            DncExitCode::Sat,
            Some(solution),
            DncStatisticsBuilder::new().build(),
        );
        assert_eq!(outcome.result_str(), "sat");
        assert_eq!(outcome.value(2), Some(0.5));
        assert_eq!(outcome.value(0), None);
        assert!(format!("{}", outcome).starts_with("Result: sat\n"));
    }
}
