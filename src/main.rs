// ===============================
// src/main.rs
// ===============================
/*
=============================================================================
Project : mm_engine_rust — multi-venue market-making backtest engine in Rust
Module  : <module_name>.rs
Version : 0.3.0
License : MIT

Summary : Aggregates per-venue order books into a cross-venue view, quotes
          two-sided markets with volatility- and inventory-aware pricing,
          routes quotes to the cheapest venue, simulates maker fills,
          tracks positions and realized/unrealized PnL, and writes
          report/CSV metrics plus an optional JSONL event log.
=============================================================================
*/
mod domain;
mod config;
mod aggregator;
mod positions;
mod risk;
mod router;
mod gateway;
mod strategy;
mod metrics;
mod feed;
mod recorder;
mod backtest;

use clap::Parser;
use tracing::{error, info, warn};

use crate::backtest::BacktestRunner;
use crate::recorder::Recorder;

const REPORT_PATH: &str = "REPORT.md";
const RESULTS_CSV_PATH: &str = "data/backtest_results.csv";

fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config ----
    let args = config::Args::parse();
    let cfg = match config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            warn!(%e, "config load failed, continuing with empty config");
            config::BacktestConfig::default()
        }
    };

    info!(
        config = %args.config,
        instruments = cfg.instruments.len(),
        venues = cfg.venues.len(),
        data_file = %cfg.data_file,
        fill_probability = cfg.fill_probability,
        ticks = args.ticks,
        "startup config"
    );

    let num_instruments = cfg.instruments.len();
    let num_venues = cfg.venues.len();

    // ---- Runner (+ optional JSONL event log) ----
    let mut runner = BacktestRunner::new(cfg);
    if let Some(path) = args.record.as_deref() {
        match Recorder::create(path) {
            Ok(rec) => runner = runner.with_recorder(rec),
            Err(e) => error!(%path, %e, "recorder unavailable, continuing without"),
        }
    }

    // ---- Run ----
    if args.data {
        runner.run();
    } else {
        info!(
            ticks = args.ticks,
            instruments = num_instruments,
            venues = num_venues,
            "running synthetic backtest"
        );
        runner.run_synthetic(args.ticks, num_instruments, num_venues);
    }

    // ---- Outputs ----
    if let Err(e) = runner.write_report(REPORT_PATH) {
        error!(path = REPORT_PATH, %e, "failed to write report");
    }
    if let Err(e) = runner.write_csv(RESULTS_CSV_PATH) {
        error!(path = RESULTS_CSV_PATH, %e, "failed to write tick csv");
    }

    println!("{}", runner.metrics().generate_report());
    info!("results written to {REPORT_PATH} and {RESULTS_CSV_PATH}");
}
