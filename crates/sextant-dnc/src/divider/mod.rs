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

//! # Query Dividers
//!
//! A divider partitions the region of a subquery into `count` smaller
//! regions whose union is the original one. The orchestrator uses it once
//! for the initial partition and the workers use it again whenever a
//! subquery runs out of local time.
//!
//! ## Strategies
//!
//! - `LargestInterval`: bisects the input variable with the widest interval.
//!   Works well for networks with few inputs.
//! - `Polarity`: splits on the phase of the ReLU whose pre-activation bounds
//!   are most balanced around zero. Scales to many inputs, where bisecting
//!   single input dimensions barely shrinks the problem.
//! - `Auto`: picks one of the two from the number of input variables.

pub mod largest_interval;
pub mod polarity;

use crate::{
    divider::{largest_interval::LargestIntervalDivider, polarity::PolarityDivider},
    subquery::SubQuery,
};
use sextant_engine::propagation::Propagator;
use sextant_model::{
    query::InputQuery,
    tightening::{CaseSplit, Tightening},
};
use std::{str::FromStr, time::Duration};

pub trait QueryDivider {
    /// Divides `base_split` into `count` subqueries and appends them to `out`.
    ///
    /// `count` must be a power of two. Child `i` (counting from 1) gets the id
    /// `"{id_prefix}-{i}"`, or just `"{i}"` for an empty prefix, and the depth
    /// `depth + 1`. Every child carries `local_timeout`.
    fn create_sub_queries(
        &self,
        count: usize,
        id_prefix: &str,
        depth: usize,
        base_split: &CaseSplit,
        local_timeout: Duration,
        out: &mut Vec<SubQuery>,
    );
}

impl std::fmt::Debug for dyn QueryDivider + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryDivider")
    }
}

/// The id of the `index`-th child (counting from 1) of the subquery `prefix`.
#[inline]
pub fn child_id(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        index.to_string()
    } else {
        format!("{}-{}", prefix, index)
    }
}

/// Turns the final list of child splits into subqueries.
pub(crate) fn emit_children(
    splits: Vec<CaseSplit>,
    id_prefix: &str,
    depth: usize,
    local_timeout: Duration,
    out: &mut Vec<SubQuery>,
) {
    out.extend(splits.into_iter().enumerate().map(|(i, split)| {
        SubQuery::new(child_id(id_prefix, i + 1), split, local_timeout, depth + 1)
    }));
}

/// The number of halvings needed to produce `count` children.
#[inline]
pub(crate) fn halvings(count: usize) -> u32 {
    debug_assert!(
        count.is_power_of_two(),
        "called `QueryDivider::create_sub_queries` with count {} that is not a power of two",
        count
    );
    count.max(1).trailing_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DivideStrategy {
    #[default]
    Auto,
    LargestInterval,
    Polarity,
}

impl DivideStrategy {
    /// Resolves `Auto` for a query with `num_inputs` input variables.
    /// Concrete strategies are returned unchanged.
    pub fn resolve(self, num_inputs: usize, interval_splitting_threshold: usize) -> Self {
        match self {
            DivideStrategy::Auto if num_inputs < interval_splitting_threshold => {
                DivideStrategy::LargestInterval
            }
            DivideStrategy::Auto => DivideStrategy::Polarity,
            other => other,
        }
    }
}

/// Creates the divider for a resolved `strategy`. An unresolved `Auto`
/// bisects intervals.
pub fn create_divider<'a>(
    strategy: DivideStrategy,
    query: &'a InputQuery,
    propagator: Propagator,
) -> Box<dyn QueryDivider + 'a> {
    match strategy {
        DivideStrategy::Polarity => Box::new(PolarityDivider::new(query, propagator)),
        DivideStrategy::Auto | DivideStrategy::LargestInterval => {
            Box::new(LargestIntervalDivider::new(query))
        }
    }
}

/// The split the initial division starts from. Interval bisection starts
/// from the input box of `query`; phase splitting starts from nothing.
pub fn initial_split(query: &InputQuery, strategy: DivideStrategy) -> CaseSplit {
    if strategy == DivideStrategy::Polarity {
        return CaseSplit::new();
    }

    let mut split = CaseSplit::new();
    for &variable in query.input_variables() {
        let (lower, upper) = (query.lower_bound(variable), query.upper_bound(variable));
        if lower.is_finite() {
            split.store_bound_tightening(Tightening::lower(variable, lower));
        }
        if upper.is_finite() {
            split.store_bound_tightening(Tightening::upper(variable, upper));
        }
    }
    split
}

impl std::fmt::Display for DivideStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DivideStrategy::Auto => write!(f, "auto"),
            DivideStrategy::LargestInterval => write!(f, "largest-interval"),
            DivideStrategy::Polarity => write!(f, "polarity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown divide strategy `{0}`, expected `auto`, `largest-interval` or `polarity`")]
pub struct ParseDivideStrategyError(String);

impl FromStr for DivideStrategy {
    type Err = ParseDivideStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(DivideStrategy::Auto),
            "largest-interval" | "largest_interval" => Ok(DivideStrategy::LargestInterval),
            "polarity" => Ok(DivideStrategy::Polarity),
            _ => Err(ParseDivideStrategyError(s.to_string())),
        }
    }
}
