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

/// Counters of the last `solve` call of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Search nodes visited.
    pub nodes: u64,
    /// Nodes whose propagation ran into a conflict.
    pub conflicts: u64,
    /// Bounds derived by propagation.
    pub propagated_bounds: u64,
    /// Candidate assignments checked.
    pub candidates: u64,
    /// Leaves where every phase was fixed but no candidate satisfied the query.
    pub inconclusive_leaves: u64,
    /// Deepest branching level reached.
    pub max_depth: usize,
    pub solve_duration: std::time::Duration,
}

impl SearchStatistics {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Search Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        writeln!(f, "  Conflicts: {}", self.conflicts)?;
        writeln!(f, "  Propagated Bounds: {}", self.propagated_bounds)?;
        writeln!(f, "  Candidates: {}", self.candidates)?;
        writeln!(f, "  Inconclusive Leaves: {}", self.inconclusive_leaves)?;
        writeln!(f, "  Max Depth: {}", self.max_depth)?;
        writeln!(
            f,
            "  Solve Duration (secs): {:.3}",
            self.solve_duration.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_formats_all_fields() {
        let stats = SearchStatistics {
            nodes: 12,
            conflicts: 5,
            propagated_bounds: 40,
            candidates: 9,
            inconclusive_leaves: 1,
            max_depth: 3,
            solve_duration: Duration::from_millis(1234),
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("Search Statistics:"));
        assert!(rendered.contains("Nodes: 12"));
        assert!(rendered.contains("Conflicts: 5"));
        assert!(rendered.contains("Max Depth: 3"));
        assert!(rendered.contains("Solve Duration (secs): 1.234"));
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut stats = SearchStatistics {
            nodes: 3,
            ..SearchStatistics::default()
        };
        stats.reset();
        assert_eq!(stats, SearchStatistics::default());
    }
}
