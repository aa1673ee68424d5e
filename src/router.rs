// ===============================
// src/router.rs (venue selection)
// ===============================
//
// Stateless cost/depth scoring over the configured venues. Lower is
// better: maker fee and cancel penalty in bp, a latency penalty, minus a
// small bonus for resting depth on that venue in the current view.
//
use crate::domain::{InstrumentMarketView, VenueId};
use crate::config::VenueConfig;
use crate::positions::InstrumentPosition;

const LATENCY_WEIGHT: f64 = 0.01;
const DEPTH_WEIGHT: f64 = 0.001;

#[derive(Debug, Clone, Default)]
pub struct VenueRouter {
    venues: Vec<VenueConfig>,
}

impl VenueRouter {
    pub fn new(venues: Vec<VenueConfig>) -> Self {
        Self { venues }
    }

    /// Pick the cheapest venue for quoting this instrument. Ties keep the
    /// first-seen venue; no venues configured yields the 0 sentinel.
    pub fn choose_venue(&self, view: &InstrumentMarketView, _pos: &InstrumentPosition) -> VenueId {
        let Some(first) = self.venues.first() else { return 0 };

        let mut best_venue = first.id;
        let mut best_score = f64::INFINITY;

        for vc in &self.venues {
            let mut score = vc.maker_fee_bp + vc.cancel_penalty_bp + vc.latency_ms * LATENCY_WEIGHT;

            if let Some(vs) = view.venues.iter().find(|vs| vs.venue == vc.id) {
                let depth: f64 = vs.bids.iter().map(|l| l.quantity).sum::<f64>()
                    + vs.asks.iter().map(|l| l.quantity).sum::<f64>();
                score -= depth * DEPTH_WEIGHT;
            }

            if score < best_score {
                best_score = score;
                best_venue = vc.id;
            }
        }

        best_venue
    }
}
