// ===============================
// src/gateway.rs (execution gateways)
// ===============================
//
// Two gateways behind one trait:
// - SimExecutionGateway: rests limit orders and fills them when a later
//   snapshot crosses the limit price; fills are drained by the driver.
// - NullExecutionGateway: counts traffic, never fills (test double).
//
// Fills are all-or-nothing at the resting size and execute at the resting
// limit price.
//
use std::collections::BTreeMap;

use crate::domain::{Fill, LiveOrder, OrderId, Side, VenueBookSnapshot};

pub trait ExecutionGateway {
    /// Assigns and returns the order id; ids start at 1 and strictly increase.
    fn send_limit_order(&mut self, order: &LiveOrder) -> OrderId;
    /// Idempotent; unknown ids are ignored.
    fn cancel_order(&mut self, order_id: OrderId);
}

#[derive(Debug)]
pub struct SimExecutionGateway {
    next_order_id: OrderId,
    // BTreeMap keeps cross-checks in submission order, so multi-fill ticks
    // replay identically.
    orders: BTreeMap<OrderId, LiveOrder>,
}

impl Default for SimExecutionGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SimExecutionGateway {
    pub fn new() -> Self {
        Self { next_order_id: 1, orders: BTreeMap::new() }
    }

    pub fn active_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Cross every resting order on this (instrument, venue) against the
    /// snapshot. Matches are collected first and removed afterwards, so
    /// every fill belonging to this tick is delivered.
    pub fn check_fills(&mut self, snapshot: &VenueBookSnapshot) -> Vec<Fill> {
        let mut filled_ids = Vec::new();
        let mut fills = Vec::new();

        for (&id, order) in &self.orders {
            if order.instrument != snapshot.instrument || order.venue != snapshot.venue {
                continue;
            }

            let crossed = match order.side {
                Side::Buy => !snapshot.asks.is_empty() && snapshot.best_ask() <= order.price,
                Side::Sell => !snapshot.bids.is_empty() && snapshot.best_bid() >= order.price,
            };

            if crossed {
                fills.push(Fill {
                    instrument: order.instrument,
                    venue: order.venue,
                    price: order.price, // maker fills at its own limit
                    qty: order.side.sign() * order.size,
                });
                filled_ids.push(id);
            }
        }

        for id in filled_ids {
            self.orders.remove(&id);
        }

        fills
    }
}

impl ExecutionGateway for SimExecutionGateway {
    fn send_limit_order(&mut self, order: &LiveOrder) -> OrderId {
        let id = self.next_order_id;
        self.next_order_id += 1;
        self.orders.insert(id, LiveOrder { id, ..*order });
        id
    }

    fn cancel_order(&mut self, order_id: OrderId) {
        self.orders.remove(&order_id);
    }
}

#[derive(Debug)]
pub struct NullExecutionGateway {
    next_order_id: OrderId,
    orders_sent: u64,
    cancels_sent: u64,
}

impl Default for NullExecutionGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl NullExecutionGateway {
    pub fn new() -> Self {
        Self { next_order_id: 1, orders_sent: 0, cancels_sent: 0 }
    }

    pub fn orders_sent(&self) -> u64 {
        self.orders_sent
    }

    pub fn cancels_sent(&self) -> u64 {
        self.cancels_sent
    }
}

impl ExecutionGateway for NullExecutionGateway {
    fn send_limit_order(&mut self, _order: &LiveOrder) -> OrderId {
        self.orders_sent += 1;
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    fn cancel_order(&mut self, _order_id: OrderId) {
        self.cancels_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookLevel;

    fn order(side: Side, price: f64, size: f64) -> LiveOrder {
        LiveOrder { id: 0, instrument: 1, venue: 1, side, price, size }
    }

    fn snap(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> VenueBookSnapshot {
        VenueBookSnapshot {
            instrument: 1,
            venue: 1,
            bids: bids.iter().map(|&(price, quantity)| BookLevel { price, quantity }).collect(),
            asks: asks.iter().map(|&(price, quantity)| BookLevel { price, quantity }).collect(),
        }
    }

    #[test]
    fn send_and_cancel() {
        let mut gw = SimExecutionGateway::new();
        let id = gw.send_limit_order(&order(Side::Buy, 99.0, 10.0));
        assert!(id > 0);
        assert_eq!(gw.active_order_count(), 1);

        gw.cancel_order(id);
        assert_eq!(gw.active_order_count(), 0);

        // Idempotent.
        gw.cancel_order(id);
        assert_eq!(gw.active_order_count(), 0);
    }

    #[test]
    fn order_ids_strictly_increase() {
        let mut gw = SimExecutionGateway::new();
        let a = gw.send_limit_order(&order(Side::Buy, 99.0, 1.0));
        let b = gw.send_limit_order(&order(Side::Sell, 101.0, 1.0));
        gw.cancel_order(a);
        let c = gw.send_limit_order(&order(Side::Buy, 99.0, 1.0));
        assert_eq!(a, 1);
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn buy_fills_when_ask_crosses() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&order(Side::Buy, 100.0, 5.0));

        let fills = gw.check_fills(&snap(&[(98.0, 10.0)], &[(99.5, 10.0)]));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].instrument, 1);
        assert_eq!(fills[0].venue, 1);
        assert_eq!(fills[0].price, 100.0); // filled at the resting limit
        assert_eq!(fills[0].qty, 5.0);
        assert_eq!(gw.active_order_count(), 0);
    }

    #[test]
    fn sell_fills_when_bid_crosses() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&order(Side::Sell, 100.0, 5.0));

        let fills = gw.check_fills(&snap(&[(100.5, 10.0)], &[(102.0, 10.0)]));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].qty, -5.0);
    }

    #[test]
    fn no_fill_without_cross() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&order(Side::Buy, 99.0, 5.0));

        let fills = gw.check_fills(&snap(&[(98.0, 10.0)], &[(101.0, 10.0)]));
        assert!(fills.is_empty());
        assert_eq!(gw.active_order_count(), 1);
    }

    #[test]
    fn empty_sides_never_cross() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&order(Side::Buy, 100.0, 5.0));
        gw.send_limit_order(&order(Side::Sell, 100.0, 5.0));

        assert!(gw.check_fills(&snap(&[], &[])).is_empty());
        assert_eq!(gw.active_order_count(), 2);
    }

    #[test]
    fn other_venue_or_instrument_untouched() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&LiveOrder { id: 0, instrument: 2, venue: 1, side: Side::Buy, price: 100.0, size: 5.0 });
        gw.send_limit_order(&LiveOrder { id: 0, instrument: 1, venue: 2, side: Side::Buy, price: 100.0, size: 5.0 });

        let fills = gw.check_fills(&snap(&[(98.0, 10.0)], &[(99.0, 10.0)]));
        assert!(fills.is_empty());
        assert_eq!(gw.active_order_count(), 2);
    }

    #[test]
    fn both_sides_fill_on_one_tick_in_submission_order() {
        let mut gw = SimExecutionGateway::new();
        gw.send_limit_order(&order(Side::Buy, 100.0, 5.0));
        gw.send_limit_order(&order(Side::Sell, 100.0, 5.0));

        // Crossed snapshot hits both resting orders at once.
        let fills = gw.check_fills(&snap(&[(100.5, 10.0)], &[(99.5, 10.0)]));
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].qty, 5.0);
        assert_eq!(fills[1].qty, -5.0);
        assert_eq!(gw.active_order_count(), 0);
    }

    #[test]
    fn null_gateway_counts_traffic() {
        let mut gw = NullExecutionGateway::new();
        let o = order(Side::Buy, 100.0, 5.0);
        let id1 = gw.send_limit_order(&o);
        let id2 = gw.send_limit_order(&o);
        gw.cancel_order(id1);

        assert_eq!(gw.orders_sent(), 2);
        assert_eq!(gw.cancels_sent(), 1);
        assert_ne!(id1, id2);
    }
}
