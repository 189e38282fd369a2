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

//! # Reference Engine
//!
//! The bundled `SearchEngine`: a depth-first search over ReLU phases on top
//! of a trail-based `BoundStore`.
//!
//! ## Processing
//!
//! `process_query` optionally preprocesses the query, selects a crash basis
//! and seeds the basis factorization with it. Rows of the basis inverse are
//! derived once and join every propagation round as extra rows. When the
//! crash basis turns out numerically singular, those rows and candidate
//! generation are dropped for the query; the search itself still works on
//! propagation alone.
//!
//! ## Search
//!
//! `solve` starts from the query bounds (or a warm-start tree state),
//! applies the split and propagates. The state reached there is the root
//! state handed out by `tree_state`. Every node then
//!
//! 1. propagates to a fixpoint, backtracking on a conflict,
//! 2. tries candidate assignments: the non-basic variables get the midpoint
//!    of their interval first and seeded random samples after that, basic
//!    variables are solved for with the factorization, and a short repair
//!    loop re-aligns ReLU outputs with their inputs,
//! 3. otherwise branches on an unfixed ReLU.
//!
//! Every node consults the monitors: a raised quit flag yields
//! `QuitRequested`, an exhausted local budget yields `Timeout`. An exhausted
//! tree is `Unsat` when every leaf was a conflict, and `Timeout` when some
//! leaf had all phases fixed without a satisfying candidate: that region
//! needs a finer split.

use crate::{
    basis::{CrashBasis, CrashBasisError},
    branching::{polarity, BranchingHeuristic},
    config::EngineConfig,
    engine::{ExitCode, SearchEngine, TreeState},
    error::{EngineError, TightenerError},
    monitor::{
        composite::CompositeMonitor,
        interrupt::InterruptMonitor,
        search_monitor::{SearchCommand, SearchMonitor},
        time_limit::TimeLimitMonitor,
    },
    preprocess::{Preprocessor, VariableMap},
    propagation::Propagator,
    relu::{phase_split, ReluPhase},
    stats::SearchStatistics,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sextant_bounds::store::BoundStore;
use sextant_core::float::{interval_midpoint, Tolerance};
use sextant_factor::{
    error::FactorizationError,
    factorization::{create_factorization, BasisFactorization},
};
use sextant_model::{
    equation::Equation,
    index::{ReluIndex, VariableIndex},
    query::InputQuery,
    tightening::CaseSplit,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Entries of `B⁻¹·a_j` below this are not used as exchange pivots.
const MIN_EXCHANGE_PIVOT: f64 = 1e-6;

/// Seed used until `set_seed` is called.
pub const DEFAULT_SEED: u64 = 1995;

pub struct ReferenceEngine {
    config: EngineConfig,
    quit: Arc<AtomicBool>,
    seed: u64,
    heuristic: BranchingHeuristic,
    query: Option<InputQuery>,
    variable_map: Option<VariableMap>,
    basis: Option<CrashBasis>,
    factorization: Option<Box<dyn BasisFactorization>>,
    derived_rows: Vec<Equation>,
    exit_code: ExitCode,
    solution: Option<Vec<f64>>,
    root_state: Option<TreeState>,
    statistics: SearchStatistics,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for ReferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceEngine")
            .field("seed", &self.seed)
            .field("heuristic", &self.heuristic)
            .field("exit_code", &self.exit_code)
            .field(
                "num_variables",
                &self.query.as_ref().map(InputQuery::num_variables),
            )
            .field("statistics", &self.statistics)
            .finish()
    }
}

impl ReferenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            quit: Arc::new(AtomicBool::new(false)),
            seed: DEFAULT_SEED,
            heuristic: BranchingHeuristic::default(),
            query: None,
            variable_map: None,
            basis: None,
            factorization: None,
            derived_rows: Vec::new(),
            exit_code: ExitCode::NotDone,
            solution: None,
            root_state: None,
            statistics: SearchStatistics::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn branching_heuristic(&self) -> BranchingHeuristic {
        self.heuristic
    }

    #[inline]
    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }

    #[inline]
    pub fn factorization(&self) -> Option<&dyn BasisFactorization> {
        self.factorization.as_deref()
    }

    #[inline]
    fn propagator(&self) -> Propagator {
        self.config.propagator()
    }

    fn reset(&mut self) {
        self.query = None;
        self.variable_map = None;
        self.basis = None;
        self.factorization = None;
        self.derived_rows.clear();
        self.exit_code = ExitCode::NotDone;
        self.solution = None;
        self.root_state = None;
        self.statistics.reset();
    }

    /// Seeds a factorization with the crash basis and derives the rows of
    /// its inverse. A singular basis leaves the engine without both.
    fn setup_factorization(
        &mut self,
        query: &InputQuery,
        basis: &CrashBasis,
    ) -> Result<(), EngineError> {
        if basis.dimension() == 0 {
            return Ok(());
        }

        let mut factorization = create_factorization(
            self.config.factorization_kind,
            basis.dimension(),
            self.config.factorization,
        );
        match factorization.set_basis(basis.matrix()) {
            Ok(()) => {}
            Err(FactorizationError::Singular { column }) => {
                tracing::warn!(
                    "crash basis is singular at column {}; continuing without basis rows",
                    column
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let tightener = *self.propagator().tightener();
        let rows = if factorization.explicit_basis_available() {
            tightener.inverted_basis_rows(query, basis, factorization.as_ref())
        } else {
            tightener.implicit_inverted_basis_rows(query, basis, factorization.as_ref())
        };
        match rows {
            Ok(rows) => self.derived_rows = rows,
            Err(TightenerError::Factorization(e)) => return Err(e.into()),
            Err(TightenerError::Infeasible) => {}
        }

        self.factorization = Some(factorization);
        Ok(())
    }

    fn run_search(
        &mut self,
        split: &CaseSplit,
        local_timeout: Duration,
        tree_state: Option<&TreeState>,
    ) -> Result<ExitCode, EngineError> {
        let propagator = self.propagator();
        let Self {
            config,
            quit,
            seed,
            heuristic,
            query,
            basis,
            factorization,
            derived_rows,
            solution,
            root_state,
            statistics,
            ..
        } = self;
        let query = query.as_ref().ok_or(EngineError::NoQuery)?;
        let quit: &AtomicBool = quit;
        let tolerance = config.tolerance();

        let mut store = BoundStore::with_tolerance(tolerance);
        store.initialize(query.num_variables());
        for variable in VariableIndex::range(query.num_variables()) {
            store.tighten_bounds(
                variable,
                query.lower_bound(variable),
                query.upper_bound(variable),
            );
        }

        if let Some(state) = tree_state {
            if store.apply_snapshot(state.bounds())?.is_infeasible() {
                return Ok(ExitCode::Unsat);
            }
            if let (Some(target), Some(source)) = (factorization.as_mut(), state.factorization())
            {
                if let Err(e) = target.restore_factorization(source) {
                    tracing::debug!("ignoring tree state factorization: {}", e);
                }
            }
        }

        if store.apply_tightenings(split.tightenings()).is_infeasible() {
            return Ok(ExitCode::Unsat);
        }

        match propagator.propagate(query, derived_rows, &mut store) {
            Ok(new_bounds) => statistics.propagated_bounds += new_bounds as u64,
            Err(TightenerError::Infeasible) => return Ok(ExitCode::Unsat),
            Err(TightenerError::Factorization(e)) => return Err(e.into()),
        }
        *root_state = Some(TreeState::new(
            store.snapshot(),
            factorization.as_ref().map(|f| f.boxed_clone()),
        ));

        let mut monitor = CompositeMonitor::with_capacity(2);
        monitor.add_monitor(InterruptMonitor::new(quit));
        monitor.add_monitor(TimeLimitMonitor::new(local_timeout));

        let scratch = factorization.as_ref().map(|f| f.boxed_clone());
        let session = SearchSession {
            query,
            config,
            tolerance,
            propagator,
            basis: basis.as_ref(),
            factorization: factorization.as_deref_mut(),
            scratch,
            derived_rows,
            heuristic: *heuristic,
            rng: StdRng::seed_from_u64(*seed),
            monitor,
            quit,
            store,
            stack: Vec::new(),
            inconclusive: false,
            solution,
            statistics,
        };
        session.run()
    }
}

impl SearchEngine for ReferenceEngine {
    fn process_query(
        &mut self,
        query: &InputQuery,
        preprocess: bool,
    ) -> Result<bool, EngineError> {
        self.reset();

        let (processed, map) = if preprocess {
            match Preprocessor::new(self.propagator()).preprocess(query) {
                Some(result) => result,
                None => {
                    tracing::debug!("preprocessing proved the query infeasible");
                    self.exit_code = ExitCode::Unsat;
                    return Ok(false);
                }
            }
        } else {
            (query.clone(), VariableMap::identity(query.num_variables()))
        };

        let basis = match CrashBasis::compute(&processed, &self.config.tolerance()) {
            Ok(basis) => basis,
            Err(CrashBasisError::Inconsistent { equation }) => {
                tracing::debug!("equation {} makes the query infeasible", equation);
                self.exit_code = ExitCode::Unsat;
                return Ok(false);
            }
        };
        self.setup_factorization(&processed, &basis)?;

        tracing::debug!(
            "processed query: {} variables, {} equations, {} relus, {} derived rows",
            processed.num_variables(),
            processed.num_equations(),
            processed.num_relus(),
            self.derived_rows.len()
        );
        self.basis = Some(basis);
        self.query = Some(processed);
        self.variable_map = Some(map);
        Ok(true)
    }

    #[inline]
    fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    fn solve(
        &mut self,
        split: &CaseSplit,
        local_timeout: Duration,
        tree_state: Option<&TreeState>,
    ) -> ExitCode {
        let start = Instant::now();
        self.solution = None;
        self.root_state = None;
        self.statistics.reset();

        let exit_code = match self.run_search(split, local_timeout, tree_state) {
            Ok(exit_code) => exit_code,
            Err(e) => {
                tracing::warn!("search failed: {}", e);
                ExitCode::Error
            }
        };

        self.statistics.solve_duration = start.elapsed();
        tracing::debug!(
            "solved split {} with {} after {} nodes",
            split,
            exit_code,
            self.statistics.nodes
        );
        self.exit_code = exit_code;
        exit_code
    }

    #[inline]
    fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    fn extract_solution(&self) -> Option<Vec<f64>> {
        match self.exit_code {
            ExitCode::Sat => self.solution.clone(),
            _ => None,
        }
    }

    #[inline]
    fn processed_query(&self) -> Option<&InputQuery> {
        self.query.as_ref()
    }

    #[inline]
    fn variable_map(&self) -> Option<&VariableMap> {
        self.variable_map.as_ref()
    }

    #[inline]
    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    #[inline]
    fn set_branching_heuristic(&mut self, heuristic: BranchingHeuristic) {
        self.heuristic = heuristic;
    }

    fn tree_state(&self) -> Option<TreeState> {
        self.root_state.clone()
    }
}

/// A ReLU branched on, with the phase still to be explored.
#[derive(Debug, Clone, Copy)]
struct Frame {
    relu: ReluIndex,
    remaining: Option<ReluPhase>,
}

enum NodeOutcome {
    Satisfied(Vec<f64>),
    Conflict,
    Inconclusive,
    Branch(ReluIndex),
}

/// The state of a single `solve` call.
struct SearchSession<'a> {
    query: &'a InputQuery,
    config: &'a EngineConfig,
    tolerance: Tolerance,
    propagator: Propagator,
    basis: Option<&'a CrashBasis>,
    factorization: Option<&'a mut (dyn BasisFactorization + 'static)>,
    /// Holds the factorization while candidates exchange basic variables.
    scratch: Option<Box<dyn BasisFactorization>>,
    derived_rows: &'a [Equation],
    heuristic: BranchingHeuristic,
    rng: StdRng,
    monitor: CompositeMonitor<'a>,
    quit: &'a AtomicBool,
    store: BoundStore,
    stack: Vec<Frame>,
    inconclusive: bool,
    solution: &'a mut Option<Vec<f64>>,
    statistics: &'a mut SearchStatistics,
}

impl<'a> SearchSession<'a> {
    fn run(mut self) -> Result<ExitCode, EngineError> {
        self.monitor.on_enter_search(self.query);

        let exit_code = loop {
            self.monitor.on_step();
            if let SearchCommand::Terminate(reason) = self.monitor.search_command() {
                tracing::trace!("search terminated: {}", reason);
                break if self.quit.load(Ordering::Relaxed) {
                    ExitCode::QuitRequested
                } else {
                    ExitCode::Timeout
                };
            }

            let exhausted = match self.visit_node() {
                Ok(NodeOutcome::Satisfied(values)) => {
                    self.monitor.on_solution_found(&values);
                    *self.solution = Some(values);
                    break ExitCode::Sat;
                }
                Ok(NodeOutcome::Branch(relu)) => !self.branch(relu),
                Ok(NodeOutcome::Conflict) | Ok(NodeOutcome::Inconclusive) => !self.backtrack(),
                Err(e) => {
                    self.monitor.on_exit_search();
                    return Err(e);
                }
            };

            if exhausted {
                break if self.inconclusive {
                    ExitCode::Timeout
                } else {
                    ExitCode::Unsat
                };
            }
        };

        self.monitor.on_exit_search();
        Ok(exit_code)
    }

    fn visit_node(&mut self) -> Result<NodeOutcome, EngineError> {
        self.statistics.nodes += 1;

        match self
            .propagator
            .propagate(self.query, self.derived_rows, &mut self.store)
        {
            Ok(new_bounds) => self.statistics.propagated_bounds += new_bounds as u64,
            Err(TightenerError::Infeasible) => {
                self.statistics.conflicts += 1;
                return Ok(NodeOutcome::Conflict);
            }
            Err(TightenerError::Factorization(e)) => return Err(e.into()),
        }

        if let Some(values) = self.find_candidate()? {
            return Ok(NodeOutcome::Satisfied(values));
        }

        match self
            .heuristic
            .select(self.query, &self.store, &self.tolerance)
        {
            Some(relu) => Ok(NodeOutcome::Branch(relu)),
            None => {
                self.statistics.inconclusive_leaves += 1;
                self.inconclusive = true;
                Ok(NodeOutcome::Inconclusive)
            }
        }
    }

    /// Opens a frame for `relu` and enters its more likely phase first.
    /// Returns `false` if the search space is exhausted.
    fn branch(&mut self, relu: ReluIndex) -> bool {
        let b = self.query.relu(relu).b();
        let leaning_negative =
            polarity(self.store.lower_bound(b), self.store.upper_bound(b)) < 0.0;
        let (first, second) = if leaning_negative {
            (ReluPhase::Inactive, ReluPhase::Active)
        } else {
            (ReluPhase::Active, ReluPhase::Inactive)
        };

        self.stack.push(Frame {
            relu,
            remaining: Some(second),
        });
        self.statistics.max_depth = self.statistics.max_depth.max(self.stack.len());

        if self.enter_phase(relu, first) {
            return true;
        }
        self.statistics.conflicts += 1;
        self.backtrack()
    }

    fn enter_phase(&mut self, relu: ReluIndex, phase: ReluPhase) -> bool {
        self.store.push_checkpoint();
        let split = phase_split(self.query.relu(relu), phase);
        !self.store.apply_tightenings(split.tightenings()).is_infeasible()
    }

    /// Moves to the next unexplored phase. Returns `false` if there is none.
    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.stack.last_mut() {
            self.store.pop_checkpoint();
            if let Some(phase) = frame.remaining.take() {
                let relu = frame.relu;
                if self.enter_phase(relu, phase) {
                    return true;
                }
                self.statistics.conflicts += 1;
                continue;
            }
            self.stack.pop();
        }
        false
    }

    /// Tries to build an assignment satisfying every constraint within the
    /// current bounds.
    fn find_candidate(&mut self) -> Result<Option<Vec<f64>>, EngineError> {
        let n = self.query.num_variables();
        let mut basic: Vec<VariableIndex> = self
            .basis
            .map(|basis| basis.basic().to_vec())
            .unwrap_or_default();
        if !basic.is_empty() && self.factorization.is_none() {
            return Ok(None);
        }

        if let (Some(factorization), Some(scratch)) =
            (self.factorization.as_deref(), self.scratch.as_deref_mut())
        {
            factorization.store_factorization(scratch)?;
        }
        let result = self.sample_candidates(&mut basic, n);
        if let (Some(factorization), Some(scratch)) =
            (self.factorization.as_deref_mut(), self.scratch.as_deref())
        {
            factorization.restore_factorization(scratch)?;
        }
        result
    }

    fn sample_candidates(
        &mut self,
        basic: &mut [VariableIndex],
        n: usize,
    ) -> Result<Option<Vec<f64>>, EngineError> {
        let mut is_basic = vec![false; n];
        for variable in basic.iter() {
            is_basic[variable.get()] = true;
        }
        self.exchange_fixed_basics(basic, &mut is_basic)?;

        let mut values = vec![0.0; n];
        for attempt in 0..=self.config.num_random_candidates {
            for variable in VariableIndex::range(n).filter(|v| !is_basic[v.get()]) {
                let (lower, upper) = (
                    self.store.lower_bound(variable),
                    self.store.upper_bound(variable),
                );
                values[variable.get()] = if attempt == 0 {
                    interval_midpoint(lower, upper)
                } else {
                    sample(&mut self.rng, lower, upper)
                };
            }

            for _ in 0..self.config.max_repair_rounds {
                self.solve_basics(basic, &is_basic, &mut values)?;
                if !self.repair_relus(&is_basic, &mut values) {
                    break;
                }
            }
            self.solve_basics(basic, &is_basic, &mut values)?;

            self.statistics.candidates += 1;
            if self.is_satisfying(&values) {
                return Ok(Some(values));
            }
        }
        Ok(None)
    }

    /// Swaps basic variables that are fixed by the current bounds for
    /// non-basic ones that are not, so fixed variables get their value
    /// assigned directly.
    fn exchange_fixed_basics(
        &mut self,
        basic: &mut [VariableIndex],
        is_basic: &mut [bool],
    ) -> Result<(), EngineError> {
        let (Some(basis), Some(factorization)) = (self.basis, self.factorization.as_deref_mut())
        else {
            return Ok(());
        };

        let mut attempts = 0;
        let mut d = vec![0.0; basis.dimension()];
        for k in 0..basic.len() {
            if !self.store.is_fixed(basic[k]) {
                continue;
            }
            let entering = basis.non_basic().iter().copied().find(|&j| {
                !is_basic[j.get()] && !self.store.is_fixed(j) && {
                    attempts += 1;
                    attempts <= self.config.max_candidate_pivots
                        && factorization
                            .forward_transformation(&basis.column(self.query, j), &mut d)
                            .is_ok()
                        && d[k].abs() >= MIN_EXCHANGE_PIVOT
                }
            });

            if let Some(j) = entering {
                match factorization.push_eta_matrix(k, &d) {
                    Ok(()) => {
                        is_basic[basic[k].get()] = false;
                        is_basic[j.get()] = true;
                        basic[k] = j;
                    }
                    Err(FactorizationError::Singular { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if attempts >= self.config.max_candidate_pivots {
                break;
            }
        }
        Ok(())
    }

    /// Sets the basic variables to the unique values satisfying the basis
    /// rows for the current non-basic values.
    fn solve_basics(
        &self,
        basic: &[VariableIndex],
        is_basic: &[bool],
        values: &mut [f64],
    ) -> Result<(), EngineError> {
        let (Some(basis), Some(factorization)) = (self.basis, self.factorization.as_deref())
        else {
            return Ok(());
        };
        if basic.is_empty() {
            return Ok(());
        }

        let rhs: Vec<f64> = basis
            .rows()
            .iter()
            .map(|&row| {
                let equation = self.query.equation(row);
                equation.scalar()
                    - equation
                        .addends()
                        .iter()
                        .filter(|a| !is_basic[a.variable.get()])
                        .map(|a| a.coefficient * values[a.variable.get()])
                        .sum::<f64>()
            })
            .collect();

        let mut solved = vec![0.0; basic.len()];
        factorization.forward_transformation(&rhs, &mut solved)?;
        for (variable, value) in basic.iter().zip(solved) {
            values[variable.get()] = value;
        }
        Ok(())
    }

    /// Re-aligns ReLUs whose output or input is non-basic. Returns `true` if
    /// some value changed.
    fn repair_relus(&self, is_basic: &[bool], values: &mut [f64]) -> bool {
        let mut changed = false;
        for relu in self.query.relus() {
            let (b, f) = (relu.b().get(), relu.f().get());
            let expected = values[b].max(0.0);
            if self.tolerance.are_equal(values[f], expected) {
                continue;
            }

            if !is_basic[f] {
                values[f] = expected;
                changed = true;
            } else if !is_basic[b] {
                if self.tolerance.is_positive(values[f]) {
                    values[b] = values[f];
                    changed = true;
                } else if self.tolerance.is_zero(values[f]) && values[b] > 0.0 {
                    values[b] = 0.0;
                    changed = true;
                }
            }
        }
        changed
    }

    fn is_satisfying(&self, values: &[f64]) -> bool {
        VariableIndex::range(self.query.num_variables()).all(|v| {
            self.tolerance.within(
                values[v.get()],
                self.store.lower_bound(v),
                self.store.upper_bound(v),
            )
        }) && self.query.is_satisfied_by(values, &self.tolerance)
    }
}

/// Draws a value from `[lower, upper]`, or near its finite end when the
/// interval is unbounded.
fn sample(rng: &mut StdRng, lower: f64, upper: f64) -> f64 {
    match (lower.is_finite(), upper.is_finite()) {
        (true, true) if lower < upper && (upper - lower).is_finite() => {
            rng.gen_range(lower..=upper)
        }
        (true, true) if lower < upper => {
            let (mid, half) = (lower / 2.0 + upper / 2.0, upper / 2.0 - lower / 2.0);
            (mid + rng.gen_range(-1.0..=1.0) * half).clamp(lower, upper)
        }
        (true, true) => lower,
        (true, false) => lower + rng.gen_range(0.0..1.0),
        (false, true) => upper - rng.gen_range(0.0..1.0),
        (false, false) => rng.gen_range(-1.0..1.0),
    }
}
