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

//! Configuration of a divide-and-conquer run.

use crate::divider::DivideStrategy;
use sextant_engine::config::EngineConfig;
use sextant_factor::factorization::FactorizationKind;
use std::time::Duration;

pub const DEFAULT_NUM_WORKERS: usize = 4;
pub const DEFAULT_INITIAL_DIVIDES: u32 = 0;
pub const DEFAULT_INITIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ONLINE_DIVIDES: u32 = 2;
pub const DEFAULT_ONLINE_DIVIDE_DEPTH: usize = 8;
pub const DEFAULT_TIMEOUT_FACTOR: f64 = 1.5;
/// Below this many input variables `DivideStrategy::Auto` bisects intervals.
pub const DEFAULT_INTERVAL_SPLITTING_THRESHOLD: usize = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The largest exponent accepted for `2^n` subquery counts.
const MAX_DIVIDES: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct DncConfig {
    verbosity: u8,
    timeout: Duration,
    num_workers: usize,
    initial_divides: u32,
    initial_timeout: Duration,
    online_divides: u32,
    online_divide_depth: usize,
    timeout_factor: f64,
    restore_tree_states: bool,
    divide_strategy: DivideStrategy,
    interval_splitting_threshold: usize,
    poll_interval: Duration,
    engine: EngineConfig,
}

impl Default for DncConfig {
    fn default() -> Self {
        DncConfigBuilder::new().build()
    }
}

impl DncConfig {
    #[inline]
    pub fn builder() -> DncConfigBuilder {
        DncConfigBuilder::new()
    }

    #[inline]
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// The global time limit. Zero means unbounded.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    #[inline]
    pub fn initial_divides(&self) -> u32 {
        self.initial_divides
    }

    /// `2^initial_divides`.
    #[inline]
    pub fn num_initial_subqueries(&self) -> usize {
        1 << self.initial_divides
    }

    /// The local timeout of the initial subqueries. Zero means unbounded.
    #[inline]
    pub fn initial_timeout(&self) -> Duration {
        self.initial_timeout
    }

    #[inline]
    pub fn online_divides(&self) -> u32 {
        self.online_divides
    }

    /// `2^online_divides`.
    #[inline]
    pub fn num_online_children(&self) -> usize {
        1 << self.online_divides
    }

    #[inline]
    pub fn online_divide_depth(&self) -> usize {
        self.online_divide_depth
    }

    #[inline]
    pub fn timeout_factor(&self) -> f64 {
        self.timeout_factor
    }

    #[inline]
    pub fn restore_tree_states(&self) -> bool {
        self.restore_tree_states
    }

    #[inline]
    pub fn divide_strategy(&self) -> DivideStrategy {
        self.divide_strategy
    }

    #[inline]
    pub fn interval_splitting_threshold(&self) -> usize {
        self.interval_splitting_threshold
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[inline]
    pub fn factorization(&self) -> FactorizationKind {
        self.engine.factorization_kind
    }

    /// The configuration every engine of the run is built with.
    #[inline]
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }
}

impl std::fmt::Display for DncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DncConfig(workers: {}, timeout: {:?}, initial: 2^{} @ {:?}, online: 2^{} up to depth {}, factor: {}, strategy: {}, factorization: {})",
            self.num_workers,
            self.timeout,
            self.initial_divides,
            self.initial_timeout,
            self.online_divides,
            self.online_divide_depth,
            self.timeout_factor,
            self.divide_strategy,
            self.engine.factorization_kind,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DncConfigBuilder {
    config: DncConfig,
}

impl Default for DncConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DncConfigBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            config: DncConfig {
                verbosity: 0,
                timeout: Duration::ZERO,
                num_workers: DEFAULT_NUM_WORKERS,
                initial_divides: DEFAULT_INITIAL_DIVIDES,
                initial_timeout: DEFAULT_INITIAL_TIMEOUT,
                online_divides: DEFAULT_ONLINE_DIVIDES,
                online_divide_depth: DEFAULT_ONLINE_DIVIDE_DEPTH,
                timeout_factor: DEFAULT_TIMEOUT_FACTOR,
                restore_tree_states: false,
                divide_strategy: DivideStrategy::default(),
                interval_splitting_threshold: DEFAULT_INTERVAL_SPLITTING_THRESHOLD,
                poll_interval: DEFAULT_POLL_INTERVAL,
                engine: EngineConfig::default(),
            },
        }
    }

    #[inline]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    /// Sets the global time limit. Zero means unbounded.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the number of worker threads, at least one.
    #[inline]
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.config.num_workers = num_workers.max(1);
        self
    }

    /// # Panics
    ///
    /// Panics if `2^divides` subqueries would be absurdly many.
    #[inline]
    pub fn with_initial_divides(mut self, divides: u32) -> Self {
        assert!(
            divides <= MAX_DIVIDES,
            "called `DncConfigBuilder::with_initial_divides` with {} > {}",
            divides,
            MAX_DIVIDES
        );
        self.config.initial_divides = divides;
        self
    }

    #[inline]
    pub fn with_initial_timeout(mut self, timeout: Duration) -> Self {
        self.config.initial_timeout = timeout;
        self
    }

    /// # Panics
    ///
    /// Panics if `2^divides` subqueries would be absurdly many.
    #[inline]
    pub fn with_online_divides(mut self, divides: u32) -> Self {
        assert!(
            divides <= MAX_DIVIDES,
            "called `DncConfigBuilder::with_online_divides` with {} > {}",
            divides,
            MAX_DIVIDES
        );
        self.config.online_divides = divides;
        self
    }

    #[inline]
    pub fn with_online_divide_depth(mut self, depth: usize) -> Self {
        self.config.online_divide_depth = depth;
        self
    }

    /// # Panics
    ///
    /// Panics if `factor` is not a finite number of at least one.
    #[inline]
    pub fn with_timeout_factor(mut self, factor: f64) -> Self {
        assert!(
            factor.is_finite() && factor >= 1.0,
            "called `DncConfigBuilder::with_timeout_factor` with invalid factor {}",
            factor
        );
        self.config.timeout_factor = factor;
        self
    }

    #[inline]
    pub fn with_restore_tree_states(mut self, restore: bool) -> Self {
        self.config.restore_tree_states = restore;
        self
    }

    #[inline]
    pub fn with_divide_strategy(mut self, strategy: DivideStrategy) -> Self {
        self.config.divide_strategy = strategy;
        self
    }

    #[inline]
    pub fn with_interval_splitting_threshold(mut self, threshold: usize) -> Self {
        self.config.interval_splitting_threshold = threshold;
        self
    }

    /// Sets how often the orchestrator checks for termination. Clamped to at
    /// least one millisecond.
    #[inline]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    #[inline]
    pub fn with_factorization(mut self, kind: FactorizationKind) -> Self {
        self.config.engine.factorization_kind = kind;
        self
    }

    #[inline]
    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    #[inline]
    pub fn build(self) -> DncConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DncConfig::default();
        assert_eq!(config.verbosity(), 0);
        assert_eq!(config.timeout(), Duration::ZERO);
        assert!(!config.has_timeout());
        assert_eq!(config.num_workers(), 4);
        assert_eq!(config.initial_divides(), 0);
        assert_eq!(config.num_initial_subqueries(), 1);
        assert_eq!(config.initial_timeout(), Duration::from_secs(5));
        assert_eq!(config.online_divides(), 2);
        assert_eq!(config.num_online_children(), 4);
        assert_eq!(config.online_divide_depth(), 8);
        assert_eq!(config.timeout_factor(), 1.5);
        assert!(!config.restore_tree_states());
        assert_eq!(config.divide_strategy(), DivideStrategy::Auto);
        assert_eq!(config.interval_splitting_threshold(), 10);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.factorization(), FactorizationKind::ForrestTomlin);
    }

    #[test]
    fn test_builder_sets_every_option() {
        let config = DncConfig::builder()
            .with_verbosity(2)
            .with_timeout(Duration::from_secs(60))
            .with_num_workers(8)
            .with_initial_divides(3)
            .with_initial_timeout(Duration::from_secs(1))
            .with_online_divides(1)
            .with_online_divide_depth(4)
            .with_timeout_factor(2.0)
            .with_restore_tree_states(true)
            .with_divide_strategy(DivideStrategy::Polarity)
            .with_interval_splitting_threshold(3)
            .with_poll_interval(Duration::from_millis(10))
            .with_factorization(FactorizationKind::DenseLu)
            .build();

        assert_eq!(config.verbosity(), 2);
        assert!(config.has_timeout());
        assert_eq!(config.num_workers(), 8);
        assert_eq!(config.num_initial_subqueries(), 8);
        assert_eq!(config.initial_timeout(), Duration::from_secs(1));
        assert_eq!(config.num_online_children(), 2);
        assert_eq!(config.online_divide_depth(), 4);
        assert_eq!(config.timeout_factor(), 2.0);
        assert!(config.restore_tree_states());
        assert_eq!(config.divide_strategy(), DivideStrategy::Polarity);
        assert_eq!(config.interval_splitting_threshold(), 3);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.factorization(), FactorizationKind::DenseLu);
        assert_eq!(config.engine().factorization_kind, FactorizationKind::DenseLu);
    }

    #[test]
    fn test_clamps() {
        let config = DncConfig::builder()
            .with_num_workers(0)
            .with_poll_interval(Duration::ZERO)
            .build();
        assert_eq!(config.num_workers(), 1);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    #[should_panic(expected = "invalid factor")]
    fn test_timeout_factor_below_one_panics() {
        let _ = DncConfig::builder().with_timeout_factor(0.5);
    }
}
