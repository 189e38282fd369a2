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

use sextant_bounds::error::BoundError;
use sextant_factor::error::FactorizationError;

/// Errors an engine reports while loading or processing a query.
///
/// Infeasibility is not an error: `process_query` reports it as `Ok(false)`
/// and `solve` as `ExitCode::Unsat`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no query has been processed")]
    NoQuery,

    #[error("basis factorization failed: {0}")]
    Factorization(#[from] FactorizationError),

    #[error("bound store failed: {0}")]
    Bound(#[from] BoundError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// The outcome of a propagation step that did not complete normally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TightenerError {
    /// Some variable ended up with `lower > upper`.
    #[error("bounds are infeasible")]
    Infeasible,

    #[error("basis factorization failed: {0}")]
    Factorization(#[from] FactorizationError),
}
