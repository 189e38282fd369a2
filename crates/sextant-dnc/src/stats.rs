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

/// Statistics collected during a divide-and-conquer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DncStatistics {
    /// Number of worker threads the run used.
    pub num_workers: usize,
    /// Number of subqueries created by the initial division.
    pub initial_subqueries: usize,
    /// Number of `solve` calls performed by all workers together.
    pub subqueries_solved: u64,
    /// Number of subqueries that were divided again after a local timeout.
    pub splits: u64,
    /// Number of subqueries pushed back unchanged with a longer timeout.
    pub requeues: u64,
    /// Number of subqueries whose engine reported an error.
    pub errors: u64,
    /// Total duration of the run.
    pub solve_duration: std::time::Duration,
}

impl std::fmt::Display for DncStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DnC Statistics:")?;
        writeln!(f, "  Workers: {}", self.num_workers)?;
        writeln!(f, "  Initial Subqueries: {}", self.initial_subqueries)?;
        writeln!(f, "  Subqueries Solved: {}", self.subqueries_solved)?;
        writeln!(f, "  Splits: {}", self.splits)?;
        writeln!(f, "  Requeues: {}", self.requeues)?;
        writeln!(f, "  Errors: {}", self.errors)?;
        writeln!(
            f,
            "  Solve Duration (secs): {:.3}",
            self.solve_duration.as_secs_f64()
        )
    }
}

/// Builder for `DncStatistics`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DncStatisticsBuilder {
    num_workers: usize,
    initial_subqueries: usize,
    subqueries_solved: u64,
    splits: u64,
    requeues: u64,
    errors: u64,
    solve_duration: std::time::Duration,
}

impl Default for DncStatisticsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DncStatisticsBuilder {
    /// Creates a new `DncStatisticsBuilder` with default values.
    #[inline]
    pub fn new() -> Self {
        Self {
            num_workers: 0,
            initial_subqueries: 0,
            subqueries_solved: 0,
            splits: 0,
            requeues: 0,
            errors: 0,
            solve_duration: std::time::Duration::ZERO,
        }
    }

    #[inline]
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[inline]
    pub fn initial_subqueries(mut self, initial_subqueries: usize) -> Self {
        self.initial_subqueries = initial_subqueries;
        self
    }

    #[inline]
    pub fn subqueries_solved(mut self, subqueries_solved: u64) -> Self {
        self.subqueries_solved = subqueries_solved;
        self
    }

    #[inline]
    pub fn splits(mut self, splits: u64) -> Self {
        self.splits = splits;
        self
    }

    #[inline]
    pub fn requeues(mut self, requeues: u64) -> Self {
        self.requeues = requeues;
        self
    }

    #[inline]
    pub fn errors(mut self, errors: u64) -> Self {
        self.errors = errors;
        self
    }

    /// Sets the total solve duration.
    #[inline]
    pub fn solve_duration(mut self, solve_duration: std::time::Duration) -> Self {
        self.solve_duration = solve_duration;
        self
    }

    /// Builds the `DncStatistics` instance.
    #[inline]
    pub fn build(self) -> DncStatistics {
        DncStatistics {
            num_workers: self.num_workers,
            initial_subqueries: self.initial_subqueries,
            subqueries_solved: self.subqueries_solved,
            splits: self.splits,
            requeues: self.requeues,
            errors: self.errors,
            solve_duration: self.solve_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DncStatistics, DncStatisticsBuilder};
    use std::time::Duration;

    #[test]
    fn test_builder_constructs_expected_struct() {
        let stats = DncStatisticsBuilder::new()
            .num_workers(4)
            .initial_subqueries(8)
            .subqueries_solved(21)
            .splits(3)
            .requeues(1)
            .errors(0)
            .solve_duration(Duration::from_millis(1500))
            .build();

        assert_eq!(stats.num_workers, 4);
        assert_eq!(stats.initial_subqueries, 8);
        assert_eq!(stats.subqueries_solved, 21);
        assert_eq!(stats.splits, 3);
        assert_eq!(stats.requeues, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.solve_duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_display_formats_all_fields() {
        let stats = DncStatistics {
            num_workers: 2,
            initial_subqueries: 4,
            subqueries_solved: 9,
            splits: 1,
            requeues: 2,
            errors: 0,
            solve_duration: Duration::from_millis(1234),
        };

        let rendered = format!("{}", stats);
        assert!(rendered.contains("DnC Statistics:"), "missing header");
        assert!(rendered.contains("Workers: 2"));
        assert!(rendered.contains("Initial Subqueries: 4"));
        assert!(rendered.contains("Subqueries Solved: 9"));
        assert!(rendered.contains("Splits: 1"));
        assert!(rendered.contains("Requeues: 2"));
        assert!(rendered.contains("Solve Duration (secs): 1.234"));
    }
}
