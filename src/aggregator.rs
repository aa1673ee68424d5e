// ===============================
// src/aggregator.rs
// ===============================
//
// Cross-venue market data aggregation:
// - one InstrumentMarketView per instrument, upserting venue snapshots
// - global best bid/ask across venues -> mid and spread
// - EWMA of squared log-returns on the aggregate mid -> volatility
//
// Degenerate input (one-sided or empty books) never fails; mid and spread
// simply keep their previous values and volatility is left untouched.
//
use std::collections::VecDeque;

use ahash::AHashMap as HashMap;

use crate::domain::{InstrumentId, InstrumentMarketView, VenueBookSnapshot};

pub const DEFAULT_EWMA_ALPHA: f64 = 0.05;
const MAX_MID_HISTORY: usize = 200;

#[derive(Debug, Default)]
struct InstrumentState {
    view: InstrumentMarketView,
    mid_history: VecDeque<f64>,
    ewma_variance: f64,
    initialized: bool,
}

impl InstrumentState {
    fn rebuild_aggregate(&mut self) {
        let mut global_best_bid = 0.0_f64;
        let mut global_best_ask = f64::INFINITY;
        let mut total_depth = 0.0;

        for vs in &self.view.venues {
            if !vs.bids.is_empty() {
                global_best_bid = global_best_bid.max(vs.best_bid());
            }
            if !vs.asks.is_empty() {
                global_best_ask = global_best_ask.min(vs.best_ask());
            }

            // Depth near mid: top-3 levels per side, truncating when thinner.
            total_depth += vs.bids.iter().take(3).map(|l| l.quantity).sum::<f64>();
            total_depth += vs.asks.iter().take(3).map(|l| l.quantity).sum::<f64>();
        }

        if global_best_bid > 0.0 && global_best_ask.is_finite() {
            self.view.mid_price = (global_best_bid + global_best_ask) / 2.0;
            self.view.spread = global_best_ask - global_best_bid;
        }

        self.view.weighted_depth = total_depth;
        self.view.volatility = self.ewma_variance.sqrt();
    }

    fn update_volatility(&mut self, alpha: f64, new_mid: f64) {
        self.mid_history.push_back(new_mid);
        if self.mid_history.len() > MAX_MID_HISTORY {
            self.mid_history.pop_front();
        }

        if self.mid_history.len() < 2 {
            return;
        }

        let prev = self.mid_history[self.mid_history.len() - 2];
        if prev <= 0.0 {
            return;
        }

        let log_return = (new_mid / prev).ln();

        if !self.initialized {
            self.ewma_variance = log_return * log_return;
            self.initialized = true;
        } else {
            self.ewma_variance =
                alpha * (log_return * log_return) + (1.0 - alpha) * self.ewma_variance;
        }

        self.view.volatility = self.ewma_variance.sqrt();
    }
}

#[derive(Debug)]
pub struct MarketDataAggregator {
    ewma_alpha: f64,
    states: HashMap<InstrumentId, InstrumentState>,
}

impl Default for MarketDataAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_EWMA_ALPHA)
    }
}

impl MarketDataAggregator {
    pub fn new(ewma_alpha: f64) -> Self {
        Self { ewma_alpha, states: HashMap::new() }
    }

    pub fn on_book_update(&mut self, snapshot: &VenueBookSnapshot) {
        let state = self.states.entry(snapshot.instrument).or_default();
        state.view.id = snapshot.instrument;

        // Upsert: at most one snapshot per (instrument, venue).
        match state.view.venues.iter_mut().find(|vs| vs.venue == snapshot.venue) {
            Some(vs) => *vs = snapshot.clone(),
            None => state.view.venues.push(snapshot.clone()),
        }

        state.rebuild_aggregate();

        if state.view.mid_price > 0.0 {
            let mid = state.view.mid_price;
            state.update_volatility(self.ewma_alpha, mid);
        }
    }

    /// Copy of the current view; unknown instruments get an empty view
    /// carrying the requested id.
    pub fn get_view(&self, id: InstrumentId) -> InstrumentMarketView {
        match self.states.get(&id) {
            Some(state) => state.view.clone(),
            None => InstrumentMarketView { id, ..Default::default() },
        }
    }

    pub fn has_view(&self, id: InstrumentId) -> bool {
        self.states.contains_key(&id)
    }
}
