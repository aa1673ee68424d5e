// ===============================
// src/strategy.rs
// ===============================
//
// Two layers:
// 1) QuoteEngine: pure pricing/sizing policy (volatility-widened spread,
//    inventory skew, inventory-scaled size). No side effects.
// 2) MarketMaker: the controller. Owns the component graph (aggregator,
//    risk, engine, router, gateway) and re-quotes an instrument on every
//    book update that survives the gates.
//
// Gate order on requote: configured instrument -> known view -> positive
// mid -> can_quote probe -> priced quote -> per-side limit check. Any
// failed gate skips the tick; that is control flow, not an error.
//
use std::time::Instant;

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::aggregator::MarketDataAggregator;
use crate::config::MarketMakingParams;
use crate::domain::{
    InstrumentId, InstrumentMarketView, LiveOrder, OrderId, Quote, Side, Timestamp,
    VenueBookSnapshot, VenueId,
};
use crate::gateway::ExecutionGateway;
use crate::positions::InstrumentPosition;
use crate::risk::RiskManager;
use crate::router::VenueRouter;

// Probe sizes for the quoting entry gate; each side is re-checked with its
// actual size before submission.
const CAN_QUOTE_PROBE: f64 = 0.1;

// -----------------------------------------------------------------------------
// QuoteEngine
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub struct QuoteEngine {
    params: HashMap<InstrumentId, MarketMakingParams>,
    clock: Instant, // steady clock for quote timestamps
}

impl QuoteEngine {
    pub fn new(params: HashMap<InstrumentId, MarketMakingParams>) -> Self {
        Self { params, clock: Instant::now() }
    }

    /// Derive a two-sided quote from view + position. Unknown instruments
    /// and non-positive mids yield a zero quote, which callers must read
    /// as "do not quote".
    pub fn compute_quote(
        &self,
        view: &InstrumentMarketView,
        position: &InstrumentPosition,
        venue: VenueId,
    ) -> Quote {
        let Some(p) = self.params.get(&view.id) else {
            return Quote { id: view.id, venue, ..Default::default() };
        };

        let mid = view.mid_price;
        if mid <= 0.0 {
            return Quote { id: view.id, venue, ..Default::default() };
        }

        let spread_bp = Self::spread_bp(p, view.volatility);
        let spread_abs = spread_bp * mid / 10_000.0;

        // Normalized inventory, signed.
        let q_tilde = if p.max_position > 0.0 { position.quantity / p.max_position } else { 0.0 };
        let skew = p.inventory_coeff * q_tilde * spread_abs;
        let size = Self::base_size(p, q_tilde);

        // Near either limit, starve the side that would add to the position.
        let mut bid_size = size;
        let mut ask_size = size;
        if q_tilde > 0.8 {
            bid_size *= (1.0 - q_tilde).max(0.1);
        }
        if q_tilde < -0.8 {
            ask_size *= (1.0 + q_tilde).max(0.1);
        }

        Quote {
            id: view.id,
            venue,
            bid_price: mid - spread_abs / 2.0 - skew,
            ask_price: mid + spread_abs / 2.0 - skew,
            bid_size,
            ask_size,
            ts: self.clock.elapsed().as_millis() as Timestamp,
        }
    }

    // Volatility is in log-return units; x10000 converts it to bp before
    // clamping into [min_spread_bp, max_spread_bp].
    fn spread_bp(p: &MarketMakingParams, volatility: f64) -> f64 {
        (p.base_spread_bp + p.volatility_coeff * volatility * 10_000.0)
            .clamp(p.min_spread_bp, p.max_spread_bp)
    }

    // size_base * (1 - scale * |q_tilde|), floored at 10% of size_base.
    fn base_size(p: &MarketMakingParams, q_tilde: f64) -> f64 {
        if p.max_position <= 0.0 {
            return p.size_base;
        }
        (p.size_base * (1.0 - p.size_inventory_scale * q_tilde.abs())).max(p.size_base * 0.1)
    }
}

// -----------------------------------------------------------------------------
// MarketMaker controller
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct QuoteState {
    last_bid_order_id: OrderId,
    last_ask_order_id: OrderId,
    last_quote_ts: Timestamp,
}

pub struct MarketMaker<G> {
    book: MarketDataAggregator,
    risk: RiskManager,
    engine: QuoteEngine,
    router: VenueRouter,
    gateway: G,
    state: HashMap<InstrumentId, QuoteState>,
    now: Timestamp,
}

impl<G: ExecutionGateway> MarketMaker<G> {
    pub fn new(
        book: MarketDataAggregator,
        risk: RiskManager,
        engine: QuoteEngine,
        router: VenueRouter,
        gateway: G,
        instruments: &[InstrumentId],
    ) -> Self {
        let state = instruments.iter().map(|&id| (id, QuoteState::default())).collect();
        Self { book, risk, engine, router, gateway, state, now: 0 }
    }

    /// Logical time, advanced by the driver each tick.
    pub fn set_current_time(&mut self, ts: Timestamp) {
        self.now = ts;
    }

    /// Ingest a venue snapshot and try to re-quote that instrument.
    /// Returns the submitted quote, if any, so the driver can record it.
    pub fn on_market_data(&mut self, snapshot: &VenueBookSnapshot) -> Option<Quote> {
        self.book.on_book_update(snapshot);
        self.try_requote(snapshot.instrument)
    }

    /// Apply a simulated fill to the ledger.
    pub fn on_fill(&mut self, instrument: InstrumentId, _venue: VenueId, price: f64, qty: f64) {
        self.risk.on_fill(instrument, price, qty);
    }

    pub fn view(&self, id: InstrumentId) -> InstrumentMarketView {
        self.book.get_view(id)
    }

    pub fn has_view(&self, id: InstrumentId) -> bool {
        self.book.has_view(id)
    }

    pub fn position(&self, id: InstrumentId) -> InstrumentPosition {
        self.risk.position(id)
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn update_unrealized(&mut self, mids: &HashMap<InstrumentId, f64>) {
        self.risk.update_unrealized(mids);
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    fn try_requote(&mut self, id: InstrumentId) -> Option<Quote> {
        if !self.state.contains_key(&id) {
            return None; // not a configured instrument
        }
        if !self.book.has_view(id) {
            return None;
        }

        let view = self.book.get_view(id);
        if view.mid_price <= 0.0 {
            return None;
        }

        let pos = self.risk.position(id);
        let venue = self.router.choose_venue(&view, &pos);

        if !self.risk.can_quote(id, CAN_QUOTE_PROBE, CAN_QUOTE_PROBE) {
            debug!(instrument = id, qty = pos.quantity, "both sides limit-blocked, not quoting");
            return None;
        }

        let quote = self.engine.compute_quote(&view, &pos, venue);
        if quote.bid_price <= 0.0 || quote.ask_price <= 0.0 {
            return None;
        }
        if quote.bid_size <= 0.0 && quote.ask_size <= 0.0 {
            return None;
        }

        // Pull the previous quote before resting the new one.
        let (prev_bid, prev_ask) = {
            let st = self.state.get_mut(&id)?;
            let prev = (st.last_bid_order_id, st.last_ask_order_id);
            st.last_bid_order_id = 0;
            st.last_ask_order_id = 0;
            prev
        };
        if prev_bid != 0 {
            self.gateway.cancel_order(prev_bid);
        }
        if prev_ask != 0 {
            self.gateway.cancel_order(prev_ask);
        }

        let mut bid_id = 0;
        if quote.bid_size > 0.0 && self.risk.within_limits(id, quote.bid_size) {
            bid_id = self.gateway.send_limit_order(&LiveOrder {
                id: 0,
                instrument: id,
                venue,
                side: Side::Buy,
                price: quote.bid_price,
                size: quote.bid_size,
            });
        }

        let mut ask_id = 0;
        if quote.ask_size > 0.0 && self.risk.within_limits(id, -quote.ask_size) {
            ask_id = self.gateway.send_limit_order(&LiveOrder {
                id: 0,
                instrument: id,
                venue,
                side: Side::Sell,
                price: quote.ask_price,
                size: quote.ask_size,
            });
        }

        if let Some(st) = self.state.get_mut(&id) {
            st.last_bid_order_id = bid_id;
            st.last_ask_order_id = ask_id;
            st.last_quote_ts = self.now;
        }

        Some(quote)
    }
}
