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

//! # Worker Loop
//!
//! A worker owns one engine and drains the shared work queue until the run
//! is cancelled. Per subquery it reacts to the engine's verdict:
//!
//! - `Unsat`: the region is resolved. The worker that resolves the last
//!   open region cancels the run.
//! - `Sat`: cancels the run at once.
//! - `Timeout`: the region was too hard for its budget. It goes back into
//!   the queue with a longer budget, divided into `2^online_divides` smaller
//!   regions while the depth limit allows, unchanged otherwise.
//! - `Error`: counted and treated as resolved, so the run can still finish.
//! - `QuitRequested`: the subquery is dropped; cancellation is already set.

use crate::{
    divider::{create_divider, DivideStrategy},
    queue::WorkQueue,
    subquery::scale_timeout,
};
use sextant_engine::{
    branching::BranchingHeuristic,
    engine::{ExitCode, SearchEngine},
    propagation::Propagator,
};
use sextant_model::query::InputQuery;
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

/// How long an idle worker waits before it looks at the queue again.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Base seeds, alternating every two workers.
const SEEDS: [u64; 2] = [1995, 1219];

/// The deterministic seed and branching heuristic of worker `worker`.
///
/// Workers `4k` and `4k + 1` use seed `1995 + k`, workers `4k + 2` and
/// `4k + 3` use `1219 + k`. Even workers branch by polarity, odd workers on
/// the earliest unfixed ReLU.
pub fn seed_and_heuristic(worker: usize) -> (u64, BranchingHeuristic) {
    let seed = SEEDS[(worker % 4) / 2] + (worker / 4) as u64;
    let heuristic = if worker % 2 == 0 {
        BranchingHeuristic::Polarity
    } else {
        BranchingHeuristic::EarliestRelu
    };
    (seed, heuristic)
}

/// State shared by every worker of a run.
#[derive(Debug, Clone, Copy)]
pub struct SharedState<'a> {
    pub queue: &'a WorkQueue,
    /// Subqueries pushed but not yet resolved.
    pub unresolved: &'a AtomicUsize,
    pub cancel: &'a AtomicBool,
}

impl SharedState<'_> {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    #[inline]
    fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    fn resolve_one(&self) {
        if self.unresolved.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.cancel();
        }
    }
}

/// How a worker reacts to local timeouts.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub online_children: usize,
    pub online_divide_depth: usize,
    pub timeout_factor: f64,
    pub restore_tree_states: bool,
    pub strategy: DivideStrategy,
    pub propagator: Propagator,
}

/// What a worker did during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub solved: u64,
    pub splits: u64,
    pub requeues: u64,
    pub errors: u64,
    pub found_sat: bool,
}

/// A finished worker: its engine and its tally.
#[derive(Debug)]
pub struct WorkerOutcome<E> {
    pub id: usize,
    pub engine: E,
    pub tally: WorkerTally,
}

#[derive(Debug)]
pub struct Worker<'a, E> {
    id: usize,
    engine: E,
    query: InputQuery,
    shared: SharedState<'a>,
    settings: WorkerSettings,
}

impl<'a, E> Worker<'a, E>
where
    E: SearchEngine,
{
    /// Creates a worker. `query` is the worker's own copy of the processed
    /// query that `engine` has loaded; dividing is done on it.
    #[inline]
    pub fn new(
        id: usize,
        engine: E,
        query: InputQuery,
        shared: SharedState<'a>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            engine,
            query,
            shared,
            settings,
        }
    }

    pub fn run(self) -> WorkerOutcome<E> {
        let Worker {
            id,
            mut engine,
            query,
            shared,
            settings,
        } = self;
        let divider = create_divider(settings.strategy, &query, settings.propagator);
        let mut tally = WorkerTally::default();

        tracing::debug!("worker {} started", id);

        while !shared.is_cancelled() {
            let Some(subquery) = shared.queue.pop() else {
                std::thread::sleep(IDLE_WAIT);
                continue;
            };

            let tree_state = if settings.restore_tree_states {
                subquery.tree_state()
            } else {
                None
            };
            let exit_code = engine.solve(subquery.split(), subquery.timeout(), tree_state);
            tally.solved += 1;

            tracing::debug!(
                "worker {} finished subquery {} with {}",
                id,
                subquery.id(),
                exit_code
            );

            match exit_code {
                ExitCode::Unsat => shared.resolve_one(),
                ExitCode::Sat => {
                    tracing::info!("worker {} found a solution in subquery {}", id, subquery.id());
                    tally.found_sat = true;
                    shared.cancel();
                    break;
                }
                ExitCode::Timeout => {
                    let timeout = scale_timeout(subquery.timeout(), settings.timeout_factor);
                    if subquery.depth() < settings.online_divide_depth {
                        let mut children = Vec::with_capacity(settings.online_children);
                        divider.create_sub_queries(
                            settings.online_children,
                            subquery.id(),
                            subquery.depth(),
                            subquery.split(),
                            timeout,
                            &mut children,
                        );
                        if settings.restore_tree_states {
                            let state = engine.tree_state();
                            children = children
                                .into_iter()
                                .map(|child| child.with_tree_state(state.clone()))
                                .collect();
                        }

                        debug_assert!(!children.is_empty());
                        shared
                            .unresolved
                            .fetch_add(children.len() - 1, Ordering::AcqRel);
                        shared.queue.extend(children);
                        tally.splits += 1;
                    } else {
                        shared.queue.push(subquery.with_timeout(timeout));
                        tally.requeues += 1;
                    }
                }
                ExitCode::QuitRequested => {}
                ExitCode::Error | ExitCode::NotDone => {
                    tracing::warn!(
                        "worker {} failed on subquery {} with {}",
                        id,
                        subquery.id(),
                        exit_code
                    );
                    tally.errors += 1;
                    shared.resolve_one();
                }
            }
        }

        tracing::debug!("worker {} stopped after {} subqueries", id, tally.solved);
        WorkerOutcome { id, engine, tally }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_heuristic_table() {
        use BranchingHeuristic::{EarliestRelu, Polarity};
        let expected = [
            (1995, Polarity),
            (1995, EarliestRelu),
            (1219, Polarity),
            (1219, EarliestRelu),
            (1996, Polarity),
            (1996, EarliestRelu),
            (1220, Polarity),
            (1220, EarliestRelu),
            (1997, Polarity),
        ];
        for (worker, pair) in expected.into_iter().enumerate() {
            assert_eq!(seed_and_heuristic(worker), pair, "worker {}", worker);
        }
    }
}
