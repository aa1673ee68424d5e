// ===============================
// src/backtest.rs
// ===============================
//
// The deterministic event loop. Per snapshot:
//   advance logical time -> controller ingests + requotes -> gateway
//   cross-check against the same snapshot -> fills applied to risk and
//   metrics -> tick metric -> mark-to-market + exposure.
//
// Orders rested on this tick are first eligible to fill on the next
// cross-check of the same (instrument, venue).
//
use std::fs;
use std::io::Write;
use std::path::Path;

use ahash::AHashMap as HashMap;
use tracing::{error, info, warn};

use crate::aggregator::MarketDataAggregator;
use crate::config::{BacktestConfig, VenueConfig};
use crate::domain::{Event, InstrumentId, Timestamp, VenueBookSnapshot};
use crate::feed;
use crate::gateway::SimExecutionGateway;
use crate::metrics::{MetricsCollector, TickMetric};
use crate::recorder::Recorder;
use crate::risk::RiskManager;
use crate::router::VenueRouter;
use crate::strategy::{MarketMaker, QuoteEngine};

pub struct BacktestRunner {
    config: BacktestConfig,
    metrics: MetricsCollector,
    recorder: Option<Recorder>,
}

impl BacktestRunner {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config, metrics: MetricsCollector::default(), recorder: None }
    }

    /// Attach a JSONL event log for this run.
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Replay the CSV data file from config.
    pub fn run(&mut self) {
        if self.config.data_file.is_empty() {
            warn!("no data file configured, use run_synthetic instead");
            return;
        }

        let data_file = self.config.data_file.clone();
        let snapshots = match feed::load_csv(&data_file) {
            Ok(s) => s,
            Err(e) => {
                error!(%data_file, %e, "failed to load data file");
                return;
            }
        };
        if snapshots.is_empty() {
            warn!(%data_file, "no data loaded");
            return;
        }

        info!(%data_file, snapshots = snapshots.len(), "replaying csv data");
        self.process_snapshots(&snapshots);
    }

    /// Drive the engine over seeded random-walk books.
    pub fn run_synthetic(&mut self, num_ticks: usize, num_instruments: usize, num_venues: usize) {
        let snapshots = feed::generate_synthetic(num_ticks, num_instruments, num_venues);
        self.process_snapshots(&snapshots);
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn write_report(&self, path: &str) -> std::io::Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut f = fs::File::create(path)?;
        f.write_all(self.metrics.generate_report().as_bytes())
    }

    pub fn write_csv(&self, path: &str) -> std::io::Result<()> {
        self.metrics.write_csv(path)
    }

    fn process_snapshots(&mut self, snapshots: &[VenueBookSnapshot]) {
        let mut venues = self.config.venues.clone();
        if venues.is_empty() {
            venues.push(VenueConfig {
                id: 1,
                name: "SIM".into(),
                maker_fee_bp: 1.0,
                taker_fee_bp: 2.0,
                latency_ms: 1.0,
                cancel_penalty_bp: 0.1,
            });
        }

        let instrument_ids: Vec<InstrumentId> = self.config.params.keys().copied().collect();

        let mut mm = MarketMaker::new(
            MarketDataAggregator::default(),
            RiskManager::new(self.config.params.clone()),
            QuoteEngine::new(self.config.params.clone()),
            VenueRouter::new(venues),
            SimExecutionGateway::new(),
            &instrument_ids,
        );

        let mut ts: Timestamp = 0;
        let mut fill_count: u64 = 0;

        for snapshot in snapshots {
            ts += 1;
            mm.set_current_time(ts);

            let quote = mm.on_market_data(snapshot);

            // Cross resting orders against the same snapshot.
            let fills = mm.gateway_mut().check_fills(snapshot);
            for fill in &fills {
                let mid = mm.view(fill.instrument).mid_price;
                let spread_captured = if mid > 0.0 {
                    if fill.qty > 0.0 { mid - fill.price } else { fill.price - mid }
                } else {
                    0.0
                };

                mm.on_fill(fill.instrument, fill.venue, fill.price, fill.qty);
                self.metrics.record_fill(fill.instrument, spread_captured);
                fill_count += 1;
                info!(
                    instrument = fill.instrument,
                    venue = fill.venue,
                    price = fill.price,
                    qty = fill.qty,
                    "fill"
                );
            }

            self.metrics.record_quote(snapshot.instrument);

            let view = mm.view(snapshot.instrument);
            let pos = mm.position(snapshot.instrument);
            self.metrics.record_tick(TickMetric {
                ts,
                instrument: snapshot.instrument,
                mid_price: view.mid_price,
                position: pos.quantity,
                realized_pnl: pos.realized_pnl,
                unrealized_pnl: pos.unrealized_pnl,
                bid_price: view.mid_price - view.spread / 2.0,
                ask_price: view.mid_price + view.spread / 2.0,
                spread_captured: 0.0,
            });

            let mut mids: HashMap<InstrumentId, f64> = HashMap::new();
            for &id in &instrument_ids {
                if mm.has_view(id) {
                    mids.insert(id, mm.view(id).mid_price);
                }
            }
            mm.update_unrealized(&mids);
            self.metrics.record_exposure(mm.risk().portfolio().net_exposure(&mids));

            if let Some(rec) = self.recorder.as_mut() {
                rec.record(&Event::Md(snapshot.clone()));
                if let Some(q) = quote {
                    rec.record(&Event::Quote(q));
                }
                for fill in &fills {
                    rec.record(&Event::Fill(*fill));
                }
            }
        }

        info!(ticks = ts, fills = fill_count, "backtest complete");
    }
}
