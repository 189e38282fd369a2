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

//! # Divide-and-Conquer Manager
//!
//! Runs a pool of search engines over disjoint regions of one query and
//! aggregates their verdicts.
//!
//! ## Motivation
//!
//! A single engine explores one search tree sequentially. Splitting the input
//! space into regions and handing them to engines on separate threads lets
//! easy regions finish quickly while hard ones are divided further, and stops
//! the whole run as soon as any region is satisfiable.
//!
//! ## Highlights
//!
//! - Preprocessing runs once, on a base engine. Every worker loads the
//!   processed query without preprocessing it again.
//! - Workers are diversified with `seed_and_heuristic`.
//! - Workers run as `std::thread::scope` threads, so every thread is joined
//!   on every exit path. A panicking worker is reported as an error.
//! - Shared state is limited to the work queue, the unresolved counter and
//!   the cancellation flags.
//! - The manager polls for the global timeout and for an external quit
//!   request every `poll_interval`.
//! - On `Sat` the winning assignment is mapped back through the base engine's
//!   `VariableMap` onto the variables of the original query.
//!
//! ## Usage
//!
//! ```rust
//! use sextant_dnc::{config::DncConfig, manager::DncManager, result::DncExitCode};
//! use sextant_engine::reference::ReferenceEngine;
//! use sextant_model::{index::VariableIndex, query::QueryBuilder};
//!
//! // y = relu(x) with x ∈ [-1, 1] and y >= 0.5.
//! let (x, y) = (VariableIndex::new(0), VariableIndex::new(1));
//! let mut builder = QueryBuilder::new(3);
//! builder
//!     .set_bounds(x, -1.0, 1.0)
//!     .set_lower_bound(y, 0.5)
//!     .mark_input(x)
//!     .mark_output(y)
//!     .add_equation_from_terms([(1.0, x), (-1.0, VariableIndex::new(2))], 0.0)
//!     .add_relu(VariableIndex::new(2), y);
//! let query = builder.build();
//!
//! let config = DncConfig::builder().with_num_workers(2).build();
//! let engine_config = config.engine().clone();
//! let mut manager = DncManager::new(config, move || ReferenceEngine::new(engine_config.clone()));
//!
//! let outcome = manager.solve(&query);
//! assert_eq!(outcome.exit_code(), DncExitCode::Sat);
//! assert!(outcome.value(1).unwrap() >= 0.5 - 1e-6);
//! ```

use crate::{
    config::DncConfig,
    divider::{create_divider, initial_split},
    queue::WorkQueue,
    result::{DncError, DncExitCode, DncOutcome},
    stats::{DncStatistics, DncStatisticsBuilder},
    worker::{seed_and_heuristic, SharedState, Worker, WorkerOutcome, WorkerSettings, WorkerTally},
};
use rustc_hash::FxHashMap;
use sextant_engine::{engine::SearchEngine, error::EngineError};
use sextant_model::query::InputQuery;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::ScopedJoinHandle,
    time::{Duration, Instant},
};

/// Lets another thread ask a running `DncManager` to stop.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle {
    flag: Arc<AtomicBool>,
}

impl QuitHandle {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop. The run ends with `QuitRequested` unless a
    /// solution was found or the global timeout hit first.
    #[inline]
    pub fn request_quit(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_quit_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Why the manager stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollExit {
    /// A worker cancelled the run: a solution, or nothing left to solve.
    Cancelled,
    TimeoutReached,
    QuitRequested,
    /// A worker thread ended without cancelling the run.
    WorkerStopped,
}

/// Everything the workers reported back.
#[derive(Debug)]
struct RunReport<E> {
    outcomes: Vec<WorkerOutcome<E>>,
    panicked: usize,
    poll_exit: PollExit,
}

pub struct DncManager<E, F>
where
    F: FnMut() -> E,
{
    config: DncConfig,
    factory: F,
    quit: QuitHandle,
}

impl<E, F> std::fmt::Debug for DncManager<E, F>
where
    F: FnMut() -> E,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DncManager")
            .field("config", &self.config)
            .field("quit", &self.quit)
            .finish()
    }
}

impl<E, F> DncManager<E, F>
where
    E: SearchEngine,
    F: FnMut() -> E,
{
    /// Creates a manager that builds its engines with `factory`. The factory
    /// is called once for the base engine and once per worker on every
    /// `solve`.
    #[inline]
    pub fn new(config: DncConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            quit: QuitHandle::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &DncConfig {
        &self.config
    }

    /// A handle to stop a running `solve` from another thread.
    #[inline]
    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Decides `query`.
    ///
    /// Failures to set the run up (an engine rejecting the query, an
    /// allocation failure) are logged and reported as `DncExitCode::Error`.
    pub fn solve(&mut self, query: &InputQuery) -> DncOutcome {
        let start = Instant::now();
        match self.try_solve(query, start) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("divide-and-conquer run failed: {}", e);
                let statistics = DncStatisticsBuilder::new()
                    .solve_duration(start.elapsed())
                    .build();
                DncOutcome::new(DncExitCode::Error, None, statistics)
            }
        }
    }

    fn try_solve(&mut self, query: &InputQuery, start: Instant) -> Result<DncOutcome, DncError> {
        tracing::info!("starting divide-and-conquer run: {}", self.config);

        // 1. Preprocess once.
        let mut base = (self.factory)();
        if !base.process_query(query, true)? {
            tracing::info!("preprocessing proved the query infeasible");
            return Ok(self.unsat_without_search(start));
        }
        let processed = base
            .processed_query()
            .cloned()
            .ok_or(EngineError::NoQuery)?;

        let strategy = self
            .config
            .divide_strategy()
            .resolve(query.num_inputs(), self.config.interval_splitting_threshold());
        tracing::debug!("dividing with strategy {}", strategy);

        // 2. Diversified worker engines.
        let num_workers = self.config.num_workers();
        let mut engines = Vec::new();
        engines.try_reserve_exact(num_workers)?;
        for i in 0..num_workers {
            let mut engine = (self.factory)();
            let (seed, heuristic) = seed_and_heuristic(i);
            engine.set_seed(seed);
            engine.set_branching_heuristic(heuristic);
            if !engine.process_query(&processed, false)? {
                tracing::info!("worker {} proved the processed query infeasible", i);
                return Ok(self.unsat_without_search(start));
            }
            engines.push(engine);
        }

        // 3. Initial division.
        let propagator = self.config.engine().propagator();
        let count = self.config.num_initial_subqueries();
        let mut initial = Vec::new();
        initial.try_reserve_exact(count)?;
        create_divider(strategy, &processed, propagator).create_sub_queries(
            count,
            "",
            0,
            &initial_split(&processed, strategy),
            self.config.initial_timeout(),
            &mut initial,
        );
        let initial_subqueries = initial.len();

        let queue = WorkQueue::try_with_capacity(initial_subqueries)?;
        queue.extend(initial);
        let unresolved = AtomicUsize::new(initial_subqueries);
        let cancel = AtomicBool::new(false);
        let shared = SharedState {
            queue: &queue,
            unresolved: &unresolved,
            cancel: &cancel,
        };
        let settings = WorkerSettings {
            online_children: self.config.num_online_children(),
            online_divide_depth: self.config.online_divide_depth(),
            timeout_factor: self.config.timeout_factor(),
            restore_tree_states: self.config.restore_tree_states(),
            strategy,
            propagator,
        };

        // 4. and 5. Run the workers until the run is decided.
        let report = self.run_workers(engines, &processed, shared, settings, start);

        // 6. Verdict.
        let tallies: Vec<WorkerTally> = report.outcomes.iter().map(|o| o.tally).collect();
        let errors = tallies.iter().map(|t| t.errors).sum::<u64>() + report.panicked as u64;
        let exit_code = DncExitCode::decide(
            tallies.iter().any(|t| t.found_sat),
            report.poll_exit == PollExit::TimeoutReached,
            report.poll_exit == PollExit::QuitRequested || self.quit.is_quit_requested(),
            errors > 0,
            unresolved.load(Ordering::Acquire),
        );

        // 7. Map the solution back onto the original query.
        let solution = match exit_code {
            DncExitCode::Sat => report
                .outcomes
                .iter()
                .find(|o| o.tally.found_sat)
                .and_then(|winner| map_solution(&base, &winner.engine)),
            _ => None,
        };
        if exit_code == DncExitCode::Sat && solution.is_none() {
            tracing::warn!("the winning engine reported no usable solution");
        }

        let statistics = build_statistics(&tallies, num_workers, initial_subqueries, errors, start);
        tracing::info!(
            "divide-and-conquer run finished with {} after {:.3}s",
            exit_code,
            statistics.solve_duration.as_secs_f64()
        );
        Ok(DncOutcome::new(exit_code, solution, statistics))
    }

    /// Spawns one scoped thread per engine, polls until the run is decided,
    /// then stops and joins every worker.
    fn run_workers(
        &self,
        engines: Vec<E>,
        processed: &InputQuery,
        shared: SharedState<'_>,
        settings: WorkerSettings,
        start: Instant,
    ) -> RunReport<E> {
        let quit_flags: Vec<Arc<AtomicBool>> = engines.iter().map(|e| e.quit_flag()).collect();

        std::thread::scope(|scope| {
            let handles: Vec<ScopedJoinHandle<'_, WorkerOutcome<E>>> = engines
                .into_iter()
                .enumerate()
                .map(|(id, engine)| {
                    let worker = Worker::new(id, engine, processed.clone(), shared, settings);
                    scope.spawn(move || worker.run())
                })
                .collect();

            let poll_exit = self.poll_until_decided(shared.cancel, &handles, start);
            tracing::debug!("stopping workers: {:?}", poll_exit);

            shared.cancel.store(true, Ordering::Release);
            for flag in &quit_flags {
                flag.store(true, Ordering::Release);
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            let mut panicked = 0;
            for handle in handles {
                match handle.join() {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(_) => {
                        tracing::error!("a worker thread panicked");
                        panicked += 1;
                    }
                }
            }

            RunReport {
                outcomes,
                panicked,
                poll_exit,
            }
        })
    }

    fn poll_until_decided<T>(
        &self,
        cancel: &AtomicBool,
        handles: &[ScopedJoinHandle<'_, T>],
        start: Instant,
    ) -> PollExit {
        let timeout = self.config.timeout();
        loop {
            if cancel.load(Ordering::Acquire) {
                return PollExit::Cancelled;
            }
            if !timeout.is_zero() && start.elapsed() >= timeout {
                tracing::info!("global timeout of {:?} reached", timeout);
                return PollExit::TimeoutReached;
            }
            if self.quit.is_quit_requested() {
                tracing::info!("quit requested");
                return PollExit::QuitRequested;
            }
            if handles.iter().any(|h| h.is_finished()) {
                // Workers only return once the run is cancelled, so this is a
                // panic, or a cancellation that raced this check.
                return if cancel.load(Ordering::Acquire) {
                    PollExit::Cancelled
                } else {
                    PollExit::WorkerStopped
                };
            }

            let mut wait = self.config.poll_interval();
            if !timeout.is_zero() {
                wait = wait.min(timeout.saturating_sub(start.elapsed()));
            }
            std::thread::sleep(wait.max(Duration::from_millis(1)));
        }
    }

    fn unsat_without_search(&self, start: Instant) -> DncOutcome {
        let statistics = DncStatisticsBuilder::new()
            .solve_duration(start.elapsed())
            .build();
        DncOutcome::new(DncExitCode::Unsat, None, statistics)
    }
}

/// Maps the solution of `winner` through the base engine's variable map
/// onto the original query's variables.
fn map_solution<E>(base: &E, winner: &E) -> Option<FxHashMap<usize, f64>>
where
    E: SearchEngine,
{
    let processed = winner.extract_solution()?;
    let values = match base.variable_map() {
        Some(map) => map.map_solution(&processed)?,
        None => processed,
    };
    Some(values.into_iter().enumerate().collect())
}

fn build_statistics(
    tallies: &[WorkerTally],
    num_workers: usize,
    initial_subqueries: usize,
    errors: u64,
    start: Instant,
) -> DncStatistics {
    DncStatisticsBuilder::new()
        .num_workers(num_workers)
        .initial_subqueries(initial_subqueries)
        .subqueries_solved(tallies.iter().map(|t| t.solved).sum())
        .splits(tallies.iter().map(|t| t.splits).sum())
        .requeues(tallies.iter().map(|t| t.requeues).sum())
        .errors(errors)
        .solve_duration(start.elapsed())
        .build()
}
