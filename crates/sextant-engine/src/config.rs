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

//! Engine configuration.

use crate::{propagation::Propagator, tightener::RowBoundTightener};
use sextant_core::float::{Tolerance, DEFAULT_EPSILON};
use sextant_factor::factorization::{FactorizationConfig, FactorizationKind};

/// Rounds of propagation a single search node may run.
pub const DEFAULT_MAX_PROPAGATION_ROUNDS: usize = 20;

/// A derived bound must improve the current one by more than this to be
/// recorded. Keeps propagation over cyclic rows from creeping forever.
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 1e-6;

/// Random candidates tried per search node after the midpoint candidate.
pub const DEFAULT_NUM_RANDOM_CANDIDATES: usize = 4;

/// ReLU repair iterations per candidate.
pub const DEFAULT_MAX_REPAIR_ROUNDS: usize = 8;

/// Exchanges of fixed basic variables tried before candidates are built.
pub const DEFAULT_MAX_CANDIDATE_PIVOTS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub epsilon: f64,
    pub factorization_kind: FactorizationKind,
    pub factorization: FactorizationConfig,
    pub max_propagation_rounds: usize,
    pub min_improvement: f64,
    pub num_random_candidates: usize,
    pub max_repair_rounds: usize,
    pub max_candidate_pivots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            factorization_kind: FactorizationKind::default(),
            factorization: FactorizationConfig::default(),
            max_propagation_rounds: DEFAULT_MAX_PROPAGATION_ROUNDS,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            num_random_candidates: DEFAULT_NUM_RANDOM_CANDIDATES,
            max_repair_rounds: DEFAULT_MAX_REPAIR_ROUNDS,
            max_candidate_pivots: DEFAULT_MAX_CANDIDATE_PIVOTS,
        }
    }
}

impl EngineConfig {
    #[inline]
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.epsilon)
    }

    /// A propagator using this configuration's tolerance and round limits.
    pub fn propagator(&self) -> Propagator {
        Propagator::new(RowBoundTightener::new(
            self.tolerance(),
            self.min_improvement,
            self.max_propagation_rounds,
        ))
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_factorization_kind(mut self, kind: FactorizationKind) -> Self {
        self.factorization_kind = kind;
        self
    }

    pub fn with_factorization(mut self, config: FactorizationConfig) -> Self {
        self.factorization = config;
        self
    }

    pub fn with_max_propagation_rounds(mut self, rounds: usize) -> Self {
        self.max_propagation_rounds = rounds.max(1);
        self
    }

    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    pub fn with_num_random_candidates(mut self, count: usize) -> Self {
        self.num_random_candidates = count;
        self
    }

    pub fn with_max_repair_rounds(mut self, rounds: usize) -> Self {
        self.max_repair_rounds = rounds.max(1);
        self
    }

    pub fn with_max_candidate_pivots(mut self, pivots: usize) -> Self {
        self.max_candidate_pivots = pivots;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_limits_are_at_least_one() {
        let config = EngineConfig::default()
            .with_max_propagation_rounds(0)
            .with_max_repair_rounds(0);
        assert_eq!(config.max_propagation_rounds, 1);
        assert_eq!(config.max_repair_rounds, 1);
    }

    #[test]
    fn test_factorization_kind_is_forwarded() {
        let config = EngineConfig::default().with_factorization_kind(FactorizationKind::DenseLu);
        assert_eq!(config.factorization_kind, FactorizationKind::DenseLu);
        assert_eq!(config.tolerance().epsilon(), DEFAULT_EPSILON);
    }
}
