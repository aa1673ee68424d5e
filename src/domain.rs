// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

pub type InstrumentId = u32;
pub type VenueId = u8;
pub type OrderId = u64; // 0 reserved for "none"
pub type Timestamp = u64; // logical milliseconds

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side { pub fn sign(&self) -> f64 { match self { Side::Buy => 1.0, Side::Sell => -1.0 } } }

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLevel { pub price: f64, pub quantity: f64 }

/// One venue's book for one instrument. Bids descending, asks ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueBookSnapshot {
    pub instrument: InstrumentId,
    pub venue: VenueId,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl VenueBookSnapshot {
    /// Empty bid side reads as 0.
    pub fn best_bid(&self) -> f64 {
        self.bids.first().map(|l| l.price).unwrap_or(0.0)
    }

    /// Empty ask side reads as +inf; the sentinel never enters mid arithmetic.
    pub fn best_ask(&self) -> f64 {
        self.asks.first().map(|l| l.price).unwrap_or(f64::INFINITY)
    }
}

/// Cross-venue aggregate for one instrument. At most one snapshot per venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentMarketView {
    pub id: InstrumentId,
    pub mid_price: f64,
    pub spread: f64,
    pub volatility: f64,
    pub weighted_depth: f64,
    pub venues: Vec<VenueBookSnapshot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiveOrder {
    pub id: OrderId,
    pub instrument: InstrumentId,
    pub venue: VenueId,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

/// Simulated fill; qty signed: + buy, - sell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fill {
    pub instrument: InstrumentId,
    pub venue: VenueId,
    pub price: f64,
    pub qty: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Quote {
    pub id: InstrumentId,
    pub venue: VenueId,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub ts: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Md(VenueBookSnapshot),
    Quote(Quote),
    Fill(Fill),
    Note(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }

    #[test]
    fn empty_sides_read_as_sentinels() {
        let snap = VenueBookSnapshot { instrument: 1, venue: 1, ..Default::default() };
        assert_eq!(snap.best_bid(), 0.0);
        assert!(snap.best_ask().is_infinite());
    }

    #[test]
    fn best_levels_are_front_of_book() {
        let snap = VenueBookSnapshot {
            instrument: 1,
            venue: 1,
            bids: vec![BookLevel { price: 99.0, quantity: 10.0 }, BookLevel { price: 98.5, quantity: 20.0 }],
            asks: vec![BookLevel { price: 101.0, quantity: 10.0 }, BookLevel { price: 101.5, quantity: 20.0 }],
        };
        assert_eq!(snap.best_bid(), 99.0);
        assert_eq!(snap.best_ask(), 101.0);
    }
}
