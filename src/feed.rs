// ===============================
// src/feed.rs
// ===============================
//
// Snapshot sources for the backtest driver:
// - load_csv           : one-level books from `ts,inst,venue,bp,bq,ap,aq` records
// - generate_synthetic : seeded random-walk three-level books
//
// The CSV timestamp column is ignored; the driver assigns logical time in
// arrival order. Short records are skipped silently, unparsable ones with
// a warning.
//
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::domain::{BookLevel, InstrumentId, VenueBookSnapshot, VenueId};

/// Fixed seed keeps synthetic runs reproducible.
const SYNTHETIC_SEED: u64 = 42;
const MIN_CSV_FIELDS: usize = 7;

pub fn load_csv(path: &str) -> std::io::Result<Vec<VenueBookSnapshot>> {
    let content = fs::read_to_string(Path::new(path))?;
    let mut result = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < MIN_CSV_FIELDS {
            continue;
        }

        let Some(snap) = parse_record(&fields) else {
            warn!(%line, "skipping unparsable csv record");
            continue;
        };
        result.push(snap);
    }

    Ok(result)
}

fn parse_record(fields: &[&str]) -> Option<VenueBookSnapshot> {
    let instrument: InstrumentId = fields[1].trim().parse().ok()?;
    let venue: VenueId = fields[2].trim().parse().ok()?;
    let bid_price: f64 = fields[3].trim().parse().ok()?;
    let bid_qty: f64 = fields[4].trim().parse().ok()?;
    let ask_price: f64 = fields[5].trim().parse().ok()?;
    let ask_qty: f64 = fields[6].trim().parse().ok()?;

    Some(VenueBookSnapshot {
        instrument,
        venue,
        bids: vec![BookLevel { price: bid_price, quantity: bid_qty }],
        asks: vec![BookLevel { price: ask_price, quantity: ask_qty }],
    })
}

/// Random-walk books: per tick and instrument the price moves by
/// N(0, 0.001) with a floor of 1.0; each venue quotes three levels around
/// it with a jittered ~10bp spread. Emission order is (tick, instrument,
/// venue), which the driver maps to logical time.
pub fn generate_synthetic(
    num_ticks: usize,
    num_instruments: usize,
    num_venues: usize,
) -> Vec<VenueBookSnapshot> {
    let mut result = Vec::with_capacity(num_ticks * num_instruments * num_venues);

    let mut rng = StdRng::seed_from_u64(SYNTHETIC_SEED);
    let price_move = Normal::new(0.0, 0.001).expect("valid stddev");

    let mut prices: Vec<f64> = (0..num_instruments).map(|i| 100.0 + i as f64 * 50.0).collect();

    for _tick in 0..num_ticks {
        for inst in 0..num_instruments {
            let step: f64 = price_move.sample(&mut rng);
            prices[inst] = (prices[inst] * (1.0 + step)).max(1.0);

            let base_spread = prices[inst] * 0.001;

            for v in 0..num_venues {
                let jitter: f64 = rng.gen_range(0.8..1.2);
                let half_spread = base_spread * jitter / 2.0;

                let mut snap = VenueBookSnapshot {
                    instrument: (inst + 1) as InstrumentId,
                    venue: (v + 1) as VenueId,
                    ..Default::default()
                };

                for lvl in 0..3 {
                    let offset = half_spread * (1.0 + lvl as f64 * 0.5);
                    let qty = 10.0 + lvl as f64 * 5.0;
                    snap.bids.push(BookLevel { price: prices[inst] - offset, quantity: qty });
                    snap.asks.push(BookLevel { price: prices[inst] + offset, quantity: qty });
                }

                result.push(snap);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn synthetic_shape_and_ordering() {
        let snaps = generate_synthetic(4, 3, 2);
        assert_eq!(snaps.len(), 4 * 3 * 2);

        // (tick, instrument, venue) emission order.
        assert_eq!(snaps[0].instrument, 1);
        assert_eq!(snaps[0].venue, 1);
        assert_eq!(snaps[1].instrument, 1);
        assert_eq!(snaps[1].venue, 2);
        assert_eq!(snaps[2].instrument, 2);
        assert_eq!(snaps[2].venue, 1);
        assert_eq!(snaps[5].instrument, 3);
        assert_eq!(snaps[5].venue, 2);

        for snap in &snaps {
            assert_eq!(snap.bids.len(), 3);
            assert_eq!(snap.asks.len(), 3);
            assert_eq!(snap.bids[0].quantity, 10.0);
            assert_eq!(snap.bids[1].quantity, 15.0);
            assert_eq!(snap.bids[2].quantity, 20.0);
            assert!(snap.best_bid() < snap.best_ask());
            assert!(snap.best_bid() > 0.0);
        }
    }

    #[test]
    fn synthetic_is_deterministic() {
        let a = generate_synthetic(16, 2, 2);
        let b = generate_synthetic(16, 2, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn synthetic_instruments_start_fifty_apart() {
        let snaps = generate_synthetic(1, 2, 1);
        let mid1 = (snaps[0].best_bid() + snaps[0].best_ask()) / 2.0;
        let mid2 = (snaps[1].best_bid() + snaps[1].best_ask()) / 2.0;

        // One N(0, 0.001) step away from 100 and 150 respectively.
        assert!((mid1 - 100.0).abs() < 2.0);
        assert!((mid2 - 150.0).abs() < 3.0);
    }

    #[test]
    fn csv_records_parse_and_short_lines_skip() {
        let path = std::env::temp_dir().join("mm_engine_feed_test.csv");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "timestamp,instrument,venue,bid_price,bid_qty,ask_price,ask_qty").unwrap();
        writeln!(f, "1,1,1,99.5,10,100.5,12").unwrap();
        writeln!(f, "2,1,2,99.6,8,100.4,9").unwrap();
        writeln!(f, "3,1").unwrap(); // short record, skipped
        writeln!(f, "4,x,1,99.0,10,101.0,10").unwrap(); // unparsable, skipped
        drop(f);

        let snaps = load_csv(&path.to_string_lossy()).unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].instrument, 1);
        assert_eq!(snaps[0].venue, 1);
        assert_eq!(snaps[0].best_bid(), 99.5);
        assert_eq!(snaps[0].best_ask(), 100.5);
        assert_eq!(snaps[0].bids[0].quantity, 10.0);
        assert_eq!(snaps[1].venue, 2);
    }

    #[test]
    fn missing_csv_is_an_io_error() {
        assert!(load_csv("/nonexistent/mm_engine_feed.csv").is_err());
    }
}
