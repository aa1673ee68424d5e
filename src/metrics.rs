// ===============================
// src/metrics.rs
// ===============================
//
// In-memory backtest metrics. The driver appends one TickMetric per
// processed snapshot plus per-fill spread captures; everything else
// (drawdown, Sharpe proxy, averages, global totals) is derived on demand.
// Report and tick-CSV rendering live here as well; rows are emitted in
// ascending instrument-id order so runs diff cleanly.
//
use std::fmt::Write as _;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashMap as HashMap;

use crate::domain::{InstrumentId, Timestamp};

const STD_EPS: f64 = 1e-12;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct TickMetric {
    pub ts: Timestamp,
    pub instrument: InstrumentId,
    pub mid_price: f64,
    pub position: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub spread_captured: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentMetrics {
    pub id: InstrumentId,
    pub realized_pnl: f64,
    pub max_drawdown: f64,
    pub sharpe_approx: f64,
    pub avg_spread_captured: f64,
    pub total_quotes: u64,
    pub total_fills: u64,
    pub total_cancels: u64,
    pub max_position: f64,
    pub min_position: f64,
    pub pnl_series: Vec<f64>,
    pub inventory_series: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMetrics {
    pub total_pnl: f64,
    pub max_exposure: f64,
    pub total_quotes: u64,
    pub total_cancels: u64,
    pub total_fills: u64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    ticks: HashMap<InstrumentId, Vec<TickMetric>>,
    quote_counts: HashMap<InstrumentId, u64>,
    fill_counts: HashMap<InstrumentId, u64>,
    cancel_counts: HashMap<InstrumentId, u64>,
    spread_captures: HashMap<InstrumentId, Vec<f64>>,
    max_exposure: f64,
}

impl MetricsCollector {
    pub fn record_tick(&mut self, metric: TickMetric) {
        self.ticks.entry(metric.instrument).or_default().push(metric);
    }

    pub fn record_fill(&mut self, id: InstrumentId, spread_captured: f64) {
        *self.fill_counts.entry(id).or_default() += 1;
        self.spread_captures.entry(id).or_default().push(spread_captured);
    }

    pub fn record_quote(&mut self, id: InstrumentId) {
        *self.quote_counts.entry(id).or_default() += 1;
    }

    pub fn record_cancel(&mut self, id: InstrumentId) {
        *self.cancel_counts.entry(id).or_default() += 1;
    }

    /// Tracks the running max of |exposure|.
    pub fn record_exposure(&mut self, exposure: f64) {
        self.max_exposure = self.max_exposure.max(exposure.abs());
    }

    /// Instrument ids with recorded ticks, ascending.
    pub fn instrument_ids(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<InstrumentId> = self.ticks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn instrument_metrics(&self, id: InstrumentId) -> InstrumentMetrics {
        let mut m = InstrumentMetrics { id, ..Default::default() };

        let Some(ticks) = self.ticks.get(&id).filter(|t| !t.is_empty()) else {
            return m;
        };

        let mut peak_pnl = 0.0_f64;
        let mut max_dd = 0.0_f64;
        let mut max_pos = 0.0_f64;
        let mut min_pos = 0.0_f64;

        for t in ticks {
            let total_pnl = t.realized_pnl + t.unrealized_pnl;
            m.pnl_series.push(total_pnl);
            m.inventory_series.push(t.position);

            peak_pnl = peak_pnl.max(total_pnl);
            max_dd = max_dd.max(peak_pnl - total_pnl);
            max_pos = max_pos.max(t.position);
            min_pos = min_pos.min(t.position);
        }

        m.realized_pnl = ticks[ticks.len() - 1].realized_pnl;
        m.max_drawdown = max_dd;
        m.max_position = max_pos;
        m.min_position = min_pos;
        m.sharpe_approx = Self::sharpe_proxy(&m.pnl_series);

        if let Some(captures) = self.spread_captures.get(&id).filter(|c| !c.is_empty()) {
            m.avg_spread_captured = captures.iter().sum::<f64>() / captures.len() as f64;
        }

        m.total_quotes = self.quote_counts.get(&id).copied().unwrap_or(0);
        m.total_fills = self.fill_counts.get(&id).copied().unwrap_or(0);
        m.total_cancels = self.cancel_counts.get(&id).copied().unwrap_or(0);

        m
    }

    pub fn global_metrics(&self) -> GlobalMetrics {
        let mut g = GlobalMetrics { max_exposure: self.max_exposure, ..Default::default() };

        for id in self.instrument_ids() {
            let m = self.instrument_metrics(id);
            g.total_pnl += m.realized_pnl;
            g.total_quotes += m.total_quotes;
            g.total_fills += m.total_fills;
            g.total_cancels += m.total_cancels;
        }

        g
    }

    // Annualized mean/std of successive total-P&L differences; population
    // std, zero when the series is too short or flat.
    fn sharpe_proxy(pnl_series: &[f64]) -> f64 {
        if pnl_series.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = pnl_series.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / returns.len() as f64;
        let stddev = var.sqrt();

        if stddev > STD_EPS {
            (mean / stddev) * TRADING_DAYS.sqrt()
        } else {
            0.0
        }
    }

    pub fn write_csv(&self, path: &str) -> std::io::Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut w = BufWriter::new(fs::File::create(path)?);
        writeln!(
            w,
            "timestamp,instrument,mid_price,position,realized_pnl,unrealized_pnl,bid_price,ask_price,spread_captured"
        )?;

        for id in self.instrument_ids() {
            for t in &self.ticks[&id] {
                writeln!(
                    w,
                    "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
                    t.ts,
                    t.instrument,
                    t.mid_price,
                    t.position,
                    t.realized_pnl,
                    t.unrealized_pnl,
                    t.bid_price,
                    t.ask_price,
                    t.spread_captured
                )?;
            }
        }

        w.flush()
    }

    pub fn generate_report(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# Market Making Backtest Report\n");

        let g = self.global_metrics();
        let _ = writeln!(out, "## Global Metrics\n");
        let _ = writeln!(out, "| Metric | Value |");
        let _ = writeln!(out, "|--------|-------|");
        let _ = writeln!(out, "| Total P&L | {:.4} |", g.total_pnl);
        let _ = writeln!(out, "| Max Portfolio Exposure | {:.4} |", g.max_exposure);
        let _ = writeln!(out, "| Total Quotes | {} |", g.total_quotes);
        let _ = writeln!(out, "| Total Cancels | {} |", g.total_cancels);
        let _ = writeln!(out, "| Total Fills | {} |", g.total_fills);
        let _ = writeln!(out);

        let _ = writeln!(out, "## Per-Instrument Metrics\n");
        let _ = writeln!(
            out,
            "| Instrument | Realized P&L | Sharpe | Max DD | Avg Spread Captured | Quotes | Fills | Max Pos | Min Pos |"
        );
        let _ = writeln!(
            out,
            "|------------|-------------|--------|--------|---------------------|--------|-------|---------|--------|"
        );

        for id in self.instrument_ids() {
            let m = self.instrument_metrics(id);
            let _ = writeln!(
                out,
                "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {} | {} | {:.4} | {:.4} |",
                m.id,
                m.realized_pnl,
                m.sharpe_approx,
                m.max_drawdown,
                m.avg_spread_captured,
                m.total_quotes,
                m.total_fills,
                m.max_position,
                m.min_position
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(id: InstrumentId, ts: Timestamp, realized: f64, unrealized: f64, position: f64) -> TickMetric {
        TickMetric {
            ts,
            instrument: id,
            mid_price: 100.0,
            position,
            realized_pnl: realized,
            unrealized_pnl: unrealized,
            bid_price: 99.95,
            ask_price: 100.05,
            spread_captured: 0.0,
        }
    }

    #[test]
    fn empty_collector_derives_zeros() {
        let mc = MetricsCollector::default();
        let m = mc.instrument_metrics(1);
        assert_eq!(m.id, 1);
        assert_eq!(m.realized_pnl, 0.0);
        assert_eq!(m.sharpe_approx, 0.0);
        assert!(mc.instrument_ids().is_empty());
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut mc = MetricsCollector::default();
        for (ts, pnl) in [(1, 0.0), (2, 10.0), (3, 4.0), (4, 12.0), (5, 7.0)] {
            mc.record_tick(tick(1, ts, pnl, 0.0, 0.0));
        }

        let m = mc.instrument_metrics(1);
        assert_eq!(m.max_drawdown, 6.0); // peak 10 -> trough 4
        assert_eq!(m.realized_pnl, 7.0); // last tick
        assert_eq!(m.pnl_series.len(), 5);
    }

    #[test]
    fn flat_pnl_series_has_zero_sharpe() {
        let mut mc = MetricsCollector::default();
        for ts in 1..=10 {
            mc.record_tick(tick(1, ts, 5.0, 0.0, 0.0));
        }
        assert_eq!(mc.instrument_metrics(1).sharpe_approx, 0.0);
    }

    #[test]
    fn steady_gains_produce_positive_sharpe() {
        let mut mc = MetricsCollector::default();
        let mut pnl = 0.0;
        for ts in 1..=20 {
            pnl += if ts % 2 == 0 { 1.0 } else { 2.0 };
            mc.record_tick(tick(1, ts, pnl, 0.0, 0.0));
        }
        assert!(mc.instrument_metrics(1).sharpe_approx > 0.0);
    }

    #[test]
    fn position_extremes_are_tracked() {
        let mut mc = MetricsCollector::default();
        for (ts, position) in [(1, 0.0), (2, 12.0), (3, -7.0), (4, 3.0)] {
            mc.record_tick(tick(1, ts, 0.0, 0.0, position));
        }
        let m = mc.instrument_metrics(1);
        assert_eq!(m.max_position, 12.0);
        assert_eq!(m.min_position, -7.0);
    }

    #[test]
    fn spread_captures_average_per_fill() {
        let mut mc = MetricsCollector::default();
        mc.record_tick(tick(1, 1, 0.0, 0.0, 0.0));
        mc.record_fill(1, 0.05);
        mc.record_fill(1, 0.15);

        let m = mc.instrument_metrics(1);
        assert_eq!(m.total_fills, 2);
        assert!((m.avg_spread_captured - 0.10).abs() < 1e-12);
    }

    #[test]
    fn counters_and_exposure_roll_up_globally() {
        let mut mc = MetricsCollector::default();
        mc.record_tick(tick(1, 1, 3.0, 0.0, 0.0));
        mc.record_tick(tick(2, 1, 4.0, 0.0, 0.0));
        mc.record_quote(1);
        mc.record_quote(1);
        mc.record_quote(2);
        mc.record_cancel(1);
        mc.record_fill(2, 0.1);
        mc.record_exposure(-250.0);
        mc.record_exposure(100.0);

        let g = mc.global_metrics();
        assert_eq!(g.total_pnl, 7.0);
        assert_eq!(g.total_quotes, 3);
        assert_eq!(g.total_cancels, 1);
        assert_eq!(g.total_fills, 1);
        assert_eq!(g.max_exposure, 250.0); // absolute value
    }

    #[test]
    fn report_has_expected_sections_and_precision() {
        let mut mc = MetricsCollector::default();
        mc.record_tick(tick(1, 1, 1.23456789, 0.0, 0.0));
        mc.record_quote(1);

        let report = mc.generate_report();
        assert!(report.starts_with("# Market Making Backtest Report"));
        assert!(report.contains("## Global Metrics"));
        assert!(report.contains("## Per-Instrument Metrics"));
        assert!(report.contains("| Total P&L | 1.2346 |"));
    }

    #[test]
    fn csv_rows_are_fixed_precision_and_sorted() {
        let mut mc = MetricsCollector::default();
        mc.record_tick(tick(2, 1, 0.0, 0.0, 0.0));
        mc.record_tick(tick(1, 2, 0.0, 0.0, 0.0));

        let path = std::env::temp_dir().join("mm_engine_metrics_test.csv");
        let path = path.to_string_lossy().into_owned();
        mc.write_csv(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,instrument,mid_price,position,realized_pnl,unrealized_pnl,bid_price,ask_price,spread_captured"
        );
        assert_eq!(lines.next().unwrap(), "2,1,100.000000,0.000000,0.000000,0.000000,99.950000,100.050000,0.000000");
        assert_eq!(lines.next().unwrap(), "1,2,100.000000,0.000000,0.000000,0.000000,99.950000,100.050000,0.000000");
    }
}
