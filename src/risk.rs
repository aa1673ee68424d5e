// ===============================
// src/risk.rs
// ===============================
//
// Pre-trade gating over the portfolio ledger. All checks are pure reads;
// unknown instruments fail closed (false), fills for them are still
// recorded in the ledger so nothing is ever lost.
//
use ahash::AHashMap as HashMap;

use crate::config::MarketMakingParams;
use crate::domain::InstrumentId;
use crate::positions::{InstrumentPosition, PortfolioState};

#[derive(Debug, Default)]
pub struct RiskManager {
    portfolio: PortfolioState,
    params: HashMap<InstrumentId, MarketMakingParams>,
}

impl RiskManager {
    pub fn new(params: HashMap<InstrumentId, MarketMakingParams>) -> Self {
        Self { portfolio: PortfolioState::default(), params }
    }

    /// Signed fill: + buy, - sell.
    pub fn on_fill(&mut self, id: InstrumentId, price: f64, qty: f64) {
        self.portfolio.apply_fill(id, price, qty);
    }

    /// At least one side must stay inside the position limit for quoting
    /// to proceed; each side is then gated individually via within_limits.
    pub fn can_quote(&self, id: InstrumentId, bid_size: f64, ask_size: f64) -> bool {
        let Some(params) = self.params.get(&id) else { return false };
        let current = self.position(id).quantity;

        let buy_ok = (current + bid_size).abs() <= params.max_position;
        let sell_ok = (current - ask_size).abs() <= params.max_position;
        buy_ok || sell_ok
    }

    pub fn within_limits(&self, id: InstrumentId, delta_qty: f64) -> bool {
        let Some(params) = self.params.get(&id) else { return false };
        (self.position(id).quantity + delta_qty).abs() <= params.max_position
    }

    pub fn update_unrealized(&mut self, mids: &HashMap<InstrumentId, f64>) {
        self.portfolio.mark_to_market(mids);
    }

    /// Value copy; unknown instruments read as an empty position.
    pub fn position(&self, id: InstrumentId) -> InstrumentPosition {
        self.portfolio.positions.get(&id).copied().unwrap_or_default()
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }
}
