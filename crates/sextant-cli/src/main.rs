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

//! # Sextant
//!
//! Loads a query file, solves it with the divide-and-conquer manager and
//! prints the verdict. On `sat` the values of the input and output
//! variables follow, one per line.

use clap::Parser;
use sextant_dnc::{
    config::{DncConfig, DEFAULT_INTERVAL_SPLITTING_THRESHOLD, DEFAULT_TIMEOUT_FACTOR},
    divider::DivideStrategy,
    manager::DncManager,
    result::{DncExitCode, DncOutcome},
};
use sextant_engine::reference::ReferenceEngine;
use sextant_factor::factorization::FactorizationKind;
use sextant_model::{index::VariableIndex, loading::QueryLoader, query::InputQuery};
use std::{path::PathBuf, process::ExitCode, time::Duration};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "sextant",
    author,
    version,
    about = "Decides ReLU network queries with parallel divide-and-conquer"
)]
struct Cli {
    /// Query file.
    #[arg(value_name = "FILE")]
    query: PathBuf,

    /// Logging detail, 0 to 3. `RUST_LOG` takes precedence when set.
    #[arg(long, default_value_t = 0)]
    verbosity: u8,

    /// Global timeout in seconds, 0 for none.
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    #[arg(long, default_value_t = 4)]
    num_workers: usize,

    /// Start with 2^n subqueries.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=20))]
    initial_divides: u32,

    /// Local timeout of the initial subqueries in seconds, 0 for none.
    #[arg(long, default_value_t = 5)]
    initial_timeout: u64,

    /// A timed out subquery is divided into 2^n children.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=20))]
    online_divides: u32,

    #[arg(long, default_value_t = 8)]
    online_divide_depth: usize,

    /// Multiplies the local timeout of every requeued subquery.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_FACTOR, value_parser = parse_timeout_factor)]
    timeout_factor: f64,

    /// Start divided subqueries from the state their parent reached.
    #[arg(long)]
    restore_tree_states: bool,

    /// `auto`, `largest-interval` or `polarity`.
    #[arg(long, default_value_t = DivideStrategy::Auto)]
    divide_strategy: DivideStrategy,

    /// `auto` bisects intervals below this many inputs.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SPLITTING_THRESHOLD)]
    interval_splitting_threshold: usize,

    /// How often the manager checks for termination, in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_interval: u64,

    /// `forrest-tomlin` or `dense-lu`.
    #[arg(long, default_value_t = FactorizationKind::ForrestTomlin)]
    factorization: FactorizationKind,
}

fn parse_timeout_factor(s: &str) -> Result<f64, String> {
    let factor: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if factor.is_finite() && factor >= 1.0 {
        Ok(factor)
    } else {
        Err(format!("timeout factor must be at least 1, got {}", factor))
    }
}

impl Cli {
    fn config(&self) -> DncConfig {
        DncConfig::builder()
            .with_verbosity(self.verbosity)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_num_workers(self.num_workers)
            .with_initial_divides(self.initial_divides)
            .with_initial_timeout(Duration::from_secs(self.initial_timeout))
            .with_online_divides(self.online_divides)
            .with_online_divide_depth(self.online_divide_depth)
            .with_timeout_factor(self.timeout_factor)
            .with_restore_tree_states(self.restore_tree_states)
            .with_divide_strategy(self.divide_strategy)
            .with_interval_splitting_threshold(self.interval_splitting_threshold)
            .with_poll_interval(Duration::from_millis(self.poll_interval))
            .with_factorization(self.factorization)
            .build()
    }
}

fn log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbosity: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The lines printed for `outcome`: the result tag, then on `sat` one
/// `x(i) = value` line per input and output variable.
fn report(query: &InputQuery, outcome: &DncOutcome) -> Vec<String> {
    let mut lines = vec![outcome.result_str().to_string()];
    if outcome.exit_code() != DncExitCode::Sat {
        return lines;
    }

    let mut print_group = |title: &str, variables: &[VariableIndex]| {
        lines.push(format!("{}:", title));
        for &variable in variables {
            match outcome.value(variable.get()) {
                Some(value) => lines.push(format!("  {} = {}", variable, value)),
                None => lines.push(format!("  {} = ?", variable)),
            }
        }
    };
    print_group("Input", query.input_variables());
    print_group("Output", query.output_variables());
    lines
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    let query = match QueryLoader::new().from_path(&cli.query) {
        Ok(query) => query,
        Err(e) => {
            tracing::error!("failed to load {}: {}", cli.query.display(), e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        "loaded {}: {} variables, {} equations, {} relus",
        cli.query.display(),
        query.num_variables(),
        query.num_equations(),
        query.num_relus()
    );

    let config = cli.config();
    let engine_config = config.engine().clone();
    let mut manager = DncManager::new(config, move || ReferenceEngine::new(engine_config.clone()));
    let outcome = manager.solve(&query);

    for line in report(&query, &outcome) {
        println!("{}", line);
    }
    tracing::info!("{}", outcome.statistics());

    match outcome.exit_code() {
        DncExitCode::Sat | DncExitCode::Unsat => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_dnc::stats::DncStatisticsBuilder;
    use sextant_model::query::QueryBuilder;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sextant").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_match_the_library() {
        let cli = parse(&["query.txt"]).unwrap();
        assert_eq!(cli.query, PathBuf::from("query.txt"));
        assert_eq!(cli.config(), DncConfig::default());
    }

    #[test]
    fn test_every_flag() {
        let cli = parse(&[
            "q",
            "--verbosity",
            "2",
            "--timeout",
            "60",
            "--num-workers",
            "8",
            "--initial-divides",
            "3",
            "--initial-timeout",
            "1",
            "--online-divides",
            "1",
            "--online-divide-depth",
            "4",
            "--timeout-factor",
            "2",
            "--restore-tree-states",
            "--divide-strategy",
            "polarity",
            "--interval-splitting-threshold",
            "3",
            "--poll-interval",
            "10",
            "--factorization",
            "dense-lu",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.verbosity(), 2);
        assert_eq!(config.timeout(), Duration::from_secs(60));
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
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["q", "--timeout-factor", "0.5"]).is_err());
        assert!(parse(&["q", "--initial-divides", "21"]).is_err());
        assert!(parse(&["q", "--divide-strategy", "random"]).is_err());
        assert!(parse(&["q", "--factorization", "qr"]).is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(7), "trace");
    }

    #[test]
    fn test_report() {
        let mut builder = QueryBuilder::new(2);
        builder
            .mark_input(VariableIndex::new(0))
            .mark_output(VariableIndex::new(1));
        let query = builder.build();

        let unsat = DncOutcome::new(DncExitCode::Unsat, None, DncStatisticsBuilder::new().build());
        assert_eq!(report(&query, &unsat), vec!["unsat".to_string()]);

        let solution = [(0, 0.25), (1, 0.5)].into_iter().collect();
        let sat = DncOutcome::new(
            DncExitCode::Sat,
            Some(solution),
            DncStatisticsBuilder::new().build(),
        );
        assert_eq!(
            report(&query, &sat),
            vec!["sat", "Input:", "  x(0) = 0.25", "Output:", "  x(1) = 0.5"]
        );
    }
}
