// ===============================
// src/positions.rs (PnL & inventory ledger)
// ===============================

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::domain::InstrumentId;

/// Quantities below this are treated as flat.
pub const QTY_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstrumentPosition {
    pub id: InstrumentId,
    pub quantity: f64, // signed
    pub avg_price: f64, // volume-weighted entry
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioState {
    pub positions: HashMap<InstrumentId, InstrumentPosition>,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
}

impl PortfolioState {
    /// Apply a signed fill (+ buy, - sell) at `price`.
    ///
    /// Same-sign (or opening) fills re-weight the average entry price;
    /// opposite-sign fills realize P&L against it, and a fill that crosses
    /// through zero re-opens the residual at the fill price.
    pub fn apply_fill(&mut self, id: InstrumentId, price: f64, qty: f64) {
        let pos = self.positions.entry(id).or_default();
        pos.id = id;

        let old_qty = pos.quantity;
        let new_qty = old_qty + qty;

        if (old_qty >= 0.0 && qty > 0.0) || (old_qty <= 0.0 && qty < 0.0) {
            let total_cost = pos.avg_price * old_qty.abs() + price * qty.abs();
            pos.avg_price = if new_qty.abs() > QTY_EPS {
                total_cost / new_qty.abs()
            } else {
                price
            };
        } else {
            let fill_qty = qty.abs().min(old_qty.abs());
            let pnl = if old_qty > 0.0 {
                (price - pos.avg_price) * fill_qty
            } else {
                (pos.avg_price - price) * fill_qty
            };
            pos.realized_pnl += pnl;
            self.total_realized_pnl += pnl;

            let crossed = (old_qty > 0.0 && new_qty < 0.0) || (old_qty < 0.0 && new_qty > 0.0);
            if new_qty.abs() > QTY_EPS && crossed {
                pos.avg_price = price;
            }
        }

        pos.quantity = new_qty;
    }

    /// Recompute unrealized P&L for every position against `mids` and
    /// refresh the portfolio total. Flat positions and instruments without
    /// a mid read as 0.
    pub fn mark_to_market(&mut self, mids: &HashMap<InstrumentId, f64>) {
        self.total_unrealized_pnl = 0.0;
        for (id, pos) in self.positions.iter_mut() {
            match mids.get(id) {
                Some(&mid) if pos.quantity.abs() > QTY_EPS => {
                    pos.unrealized_pnl = if pos.quantity > 0.0 {
                        (mid - pos.avg_price) * pos.quantity
                    } else {
                        (pos.avg_price - mid) * pos.quantity.abs()
                    };
                }
                _ => pos.unrealized_pnl = 0.0,
            }
            self.total_unrealized_pnl += pos.unrealized_pnl;
        }
    }

    /// sum(qty * mid); avg entry price stands in when no mid is known.
    pub fn net_exposure(&self, mids: &HashMap<InstrumentId, f64>) -> f64 {
        self.positions
            .iter()
            .map(|(id, pos)| pos.quantity * mids.get(id).copied().unwrap_or(pos.avg_price))
            .sum()
    }

    /// sum(|qty| * mid)
    pub fn gross_notional(&self, mids: &HashMap<InstrumentId, f64>) -> f64 {
        self.positions
            .iter()
            .map(|(id, pos)| pos.quantity.abs() * mids.get(id).copied().unwrap_or(pos.avg_price))
            .sum()
    }
}
