// ===============================
// src/config.rs
// ===============================
//
// CLI surface + JSON config file.
//
// Config shape (data/config.json):
//   {
//     "instruments": [{ "id", "symbol", "tick_size", "lot_size",
//                       "base_spread_bp", "inventory_limit", "params": {...} }],
//     "venues":      [{ "id", "name", "maker_fee_bp", "taker_fee_bp",
//                       "latency_ms", "cancel_penalty_bp" }],
//     "data_file": "data/ticks.csv",
//     "fill_probability": 0.3
//   }
//
// Missing params fields fall back to MarketMakingParams defaults, with
// base_spread_bp / max_position inherited from the instrument entry.
//
use std::fs;
use std::path::Path;

use ahash::AHashMap as HashMap;
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{InstrumentId, VenueId};

#[derive(Parser, Debug)]
#[command(name = "mm_engine", about = "Multi-venue market-making backtest engine")]
pub struct Args {
    /// Config file path
    #[arg(long, default_value = "data/config.json")]
    pub config: String,

    /// Number of synthetic ticks
    #[arg(long, default_value_t = 10_000)]
    pub ticks: usize,

    /// Replay the CSV data file from config instead of the synthetic generator
    #[arg(long)]
    pub data: bool,

    /// Append book updates, quotes and fills to a JSONL event log
    #[arg(long)]
    pub record: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}

/// Per-instrument quoting policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct MarketMakingParams {
    pub base_spread_bp: f64,
    pub min_spread_bp: f64,
    pub max_spread_bp: f64,
    pub volatility_coeff: f64,
    pub inventory_coeff: f64,
    pub size_base: f64,
    pub size_inventory_scale: f64,
    pub quote_refresh_ms: f64,
    pub max_position: f64,
}

impl Default for MarketMakingParams {
    fn default() -> Self {
        Self {
            base_spread_bp: 10.0,
            min_spread_bp: 2.0,
            max_spread_bp: 50.0,
            volatility_coeff: 1.0,
            inventory_coeff: 0.5,
            size_base: 1.0,
            size_inventory_scale: 0.5,
            quote_refresh_ms: 100.0,
            max_position: 100.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub id: InstrumentId,
    pub symbol: String,
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
    #[serde(default = "default_base_spread_bp")]
    pub base_spread_bp: f64,
    #[serde(default = "default_inventory_limit")]
    pub inventory_limit: f64,
    #[serde(default)]
    pub params: Option<ParamOverrides>,
}

/// Optional per-instrument overrides of MarketMakingParams.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ParamOverrides {
    pub base_spread_bp: Option<f64>,
    pub min_spread_bp: Option<f64>,
    pub max_spread_bp: Option<f64>,
    pub volatility_coeff: Option<f64>,
    pub inventory_coeff: Option<f64>,
    pub size_base: Option<f64>,
    pub size_inventory_scale: Option<f64>,
    pub quote_refresh_ms: Option<f64>,
    pub max_position: Option<f64>,
}

impl InstrumentConfig {
    /// Materialize quoting params: explicit overrides win, then the
    /// instrument-level base_spread_bp / inventory_limit, then defaults.
    pub fn quoting_params(&self) -> MarketMakingParams {
        let d = MarketMakingParams::default();
        let o = self.params.unwrap_or_default();
        MarketMakingParams {
            base_spread_bp: o.base_spread_bp.unwrap_or(self.base_spread_bp),
            min_spread_bp: o.min_spread_bp.unwrap_or(d.min_spread_bp),
            max_spread_bp: o.max_spread_bp.unwrap_or(d.max_spread_bp),
            volatility_coeff: o.volatility_coeff.unwrap_or(d.volatility_coeff),
            inventory_coeff: o.inventory_coeff.unwrap_or(d.inventory_coeff),
            size_base: o.size_base.unwrap_or(d.size_base),
            size_inventory_scale: o.size_inventory_scale.unwrap_or(d.size_inventory_scale),
            quote_refresh_ms: o.quote_refresh_ms.unwrap_or(d.quote_refresh_ms),
            max_position: o.max_position.unwrap_or(self.inventory_limit),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub id: VenueId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_maker_fee_bp")]
    pub maker_fee_bp: f64,
    #[serde(default = "default_taker_fee_bp")]
    pub taker_fee_bp: f64,
    #[serde(default = "default_latency_ms")]
    pub latency_ms: f64,
    #[serde(default = "default_cancel_penalty_bp")]
    pub cancel_penalty_bp: f64,
}

fn default_tick_size() -> f64 { 0.01 }
fn default_lot_size() -> f64 { 1.0 }
fn default_base_spread_bp() -> f64 { 10.0 }
fn default_inventory_limit() -> f64 { 100.0 }
fn default_maker_fee_bp() -> f64 { 1.0 }
fn default_taker_fee_bp() -> f64 { 2.0 }
fn default_latency_ms() -> f64 { 1.0 }
fn default_cancel_penalty_bp() -> f64 { 0.1 }
fn default_fill_probability() -> f64 { 0.3 }

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    venues: Vec<VenueConfig>,
    #[serde(default)]
    data_file: String,
    #[serde(default = "default_fill_probability")]
    fill_probability: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub instruments: Vec<InstrumentConfig>,
    pub venues: Vec<VenueConfig>,
    pub params: HashMap<InstrumentId, MarketMakingParams>,
    pub data_file: String,
    pub fill_probability: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            venues: Vec::new(),
            params: HashMap::new(),
            data_file: String::new(),
            fill_probability: default_fill_probability(),
        }
    }
}

pub fn load(path: &str) -> Result<BacktestConfig, ConfigError> {
    let content = fs::read_to_string(Path::new(path))
        .map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
    let file: ConfigFile = serde_json::from_str(&content)
        .map_err(|source| ConfigError::Parse { path: path.to_string(), source })?;

    let mut params = HashMap::new();
    for ic in &file.instruments {
        params.insert(ic.id, ic.quoting_params());
    }

    Ok(BacktestConfig {
        instruments: file.instruments,
        venues: file.venues,
        params,
        data_file: file.data_file,
        fill_probability: file.fill_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn full_config_round_trip() {
        let path = write_temp(
            "mm_engine_cfg_full.json",
            r#"{
                "instruments": [
                    {"id": 1, "symbol": "AAA", "tick_size": 0.01, "lot_size": 1.0,
                     "base_spread_bp": 12.0, "inventory_limit": 50.0,
                     "params": {"min_spread_bp": 3.0, "size_base": 2.5}},
                    {"id": 2, "symbol": "BBB"}
                ],
                "venues": [
                    {"id": 1, "name": "V1", "maker_fee_bp": 0.5, "taker_fee_bp": 1.0,
                     "latency_ms": 2.0, "cancel_penalty_bp": 0.2},
                    {"id": 2, "name": "V2"}
                ],
                "data_file": "data/ticks.csv",
                "fill_probability": 0.7
            }"#,
        );
        let cfg = load(&path).unwrap();

        assert_eq!(cfg.instruments.len(), 2);
        assert_eq!(cfg.venues.len(), 2);
        assert_eq!(cfg.data_file, "data/ticks.csv");
        assert_eq!(cfg.fill_probability, 0.7);

        let p1 = cfg.params[&1];
        assert_eq!(p1.base_spread_bp, 12.0); // instrument-level value wins when not overridden
        assert_eq!(p1.min_spread_bp, 3.0); // explicit override
        assert_eq!(p1.size_base, 2.5);
        assert_eq!(p1.max_position, 50.0); // inherited from inventory_limit

        let p2 = cfg.params[&2];
        assert_eq!(p2.base_spread_bp, 10.0);
        assert_eq!(p2.max_position, 100.0);

        let v2 = &cfg.venues[1];
        assert_eq!(v2.maker_fee_bp, 1.0);
        assert_eq!(v2.taker_fee_bp, 2.0);
        assert_eq!(v2.latency_ms, 1.0);
        assert_eq!(v2.cancel_penalty_bp, 0.1);
    }

    #[test]
    fn missing_sections_default_empty() {
        let path = write_temp("mm_engine_cfg_empty.json", "{}");
        let cfg = load(&path).unwrap();
        assert!(cfg.instruments.is_empty());
        assert!(cfg.venues.is_empty());
        assert_eq!(cfg.data_file, "");
        assert_eq!(cfg.fill_probability, 0.3);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let path = write_temp("mm_engine_cfg_bad.json", "{ not json");
        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load("/nonexistent/mm_engine_cfg.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
