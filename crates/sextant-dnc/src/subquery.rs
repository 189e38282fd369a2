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

//! The unit of work handed to a worker.

use sextant_engine::engine::TreeState;
use sextant_model::tightening::CaseSplit;
use std::time::Duration;

/// A region of the input space together with the time budget a worker may
/// spend on it.
///
/// The id is the path of the region in the split tree, e.g. `"3-2-4"` for
/// the fourth child of the second child of the third initial subquery.
#[derive(Debug, Clone)]
pub struct SubQuery {
    id: String,
    split: CaseSplit,
    timeout: Duration,
    depth: usize,
    tree_state: Option<TreeState>,
}

impl SubQuery {
    #[inline]
    pub fn new<S>(id: S, split: CaseSplit, timeout: Duration, depth: usize) -> Self
    where
        S: Into<String>,
    {
        Self {
            id: id.into(),
            split,
            timeout,
            depth,
            tree_state: None,
        }
    }

    /// Attaches a warm-start state for the engine that picks this subquery up.
    #[inline]
    pub fn with_tree_state(mut self, tree_state: Option<TreeState>) -> Self {
        self.tree_state = tree_state;
        self
    }

    /// Returns the same subquery with a different local timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn split(&self) -> &CaseSplit {
        &self.split
    }

    /// The local time budget. Zero means unbounded.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of divisions between the original query and this subquery.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn tree_state(&self) -> Option<&TreeState> {
        self.tree_state.as_ref()
    }
}

impl std::fmt::Display for SubQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SubQuery(id: {}, depth: {}, timeout: {:?}, split: {})",
            self.id, self.depth, self.timeout, self.split
        )
    }
}

/// Scales a local timeout, keeping zero (unbounded) as is.
pub fn scale_timeout(timeout: Duration, factor: f64) -> Duration {
    if timeout.is_zero() {
        return timeout;
    }
    Duration::try_from_secs_f64(timeout.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
