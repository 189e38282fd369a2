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

//! # Sextant DnC
//!
//! Parallel divide-and-conquer solving of ReLU network queries.
//!
//! ## Motivation
//!
//! Some regions of a query's input space are decided in milliseconds while
//! others keep an engine busy for hours. Dividing the query into regions,
//! solving them on a pool of engines and dividing again whenever a region
//! runs out of time keeps every thread busy on work it can finish.
//!
//! ## Highlights
//!
//! - `manager`: the `DncManager` that preprocesses, divides, runs the workers
//!   and aggregates their verdicts into a `DncOutcome`.
//! - `worker`: the per-thread loop and worker diversification.
//! - `divider`: interval bisection and ReLU phase splitting.
//! - `queue`, `subquery`: the shared work queue and its items.
//! - `config`, `result`, `stats`: the ambient pieces.

pub mod config;
pub mod divider;
pub mod manager;
pub mod queue;
pub mod result;
pub mod stats;
pub mod subquery;
pub mod worker;
