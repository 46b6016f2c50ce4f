//! Wire-frame parsing for Binance streams and the REST depth endpoint
//!
//! Frames arrive as JSON text. Prices and quantities are decimal strings
//! and are parsed into `rust_decimal::Decimal` so book arithmetic and
//! notional sums stay exact.

use crate::{
    data::{DepthDiff, DepthSnapshot, Trade, TradeSide},
    error::ParseError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Raw depth-diff frame: `{"U":…,"u":…,"b":[["p","q"],…],"a":[…]}`
#[derive(Debug, Deserialize)]
struct DepthDiffFrame {
    #[serde(rename = "U")]
    first_update_id: u64,
    #[serde(rename = "u")]
    final_update_id: u64,
    #[serde(rename = "b")]
    bids: Vec<[String; 2]>,
    #[serde(rename = "a")]
    asks: Vec<[String; 2]>,
}

/// Raw trade frame: `{"p":"…","q":"…","m":bool,"T":…}`
#[derive(Debug, Deserialize)]
struct TradeFrame {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    qty: String,
    /// true when the buyer was the maker, i.e. the aggressor sold
    #[serde(rename = "m")]
    buyer_is_maker: bool,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// REST depth response: `{"lastUpdateId":…,"bids":[["p","q"],…],"asks":[…]}`
#[derive(Debug, Deserialize)]
struct DepthSnapshotFrame {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

/// Binance-specific frame parser
#[derive(Debug, Default)]
pub struct BinanceDataParser;

impl BinanceDataParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an incremental depth-diff frame
    pub fn parse_diff(&self, data: &str) -> Result<DepthDiff, ParseError> {
        let frame: DepthDiffFrame = serde_json::from_str(data)
            .map_err(|e| ParseError::InvalidJson(format!("depth diff: {}", e)))?;

        Ok(DepthDiff {
            first_update_id: frame.first_update_id,
            final_update_id: frame.final_update_id,
            bids: parse_levels(&frame.bids)?,
            asks: parse_levels(&frame.asks)?,
        })
    }

    /// Parse a trade frame
    ///
    /// `m = true` means the buyer was the maker, so the aggressor was a
    /// seller; the canonical side records the aggressor.
    pub fn parse_trade(&self, data: &str) -> Result<Trade, ParseError> {
        let frame: TradeFrame = serde_json::from_str(data)
            .map_err(|e| ParseError::InvalidJson(format!("trade: {}", e)))?;

        Ok(Trade {
            price: parse_decimal(&frame.price, "p")?,
            size: parse_decimal(&frame.qty, "q")?,
            side: if frame.buyer_is_maker {
                TradeSide::Sell
            } else {
                TradeSide::Buy
            },
            timestamp_ms: frame.trade_time,
        })
    }

    /// Parse a REST depth snapshot body
    pub fn parse_snapshot(&self, data: &str) -> Result<DepthSnapshot, ParseError> {
        let frame: DepthSnapshotFrame = serde_json::from_str(data)
            .map_err(|e| ParseError::InvalidJson(format!("snapshot: {}", e)))?;

        Ok(DepthSnapshot {
            last_update_id: frame.last_update_id,
            bids: parse_levels(&frame.bids)?,
            asks: parse_levels(&frame.asks)?,
        })
    }
}

fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<(Decimal, Decimal)>, ParseError> {
    raw.iter()
        .map(|[price, qty]| Ok((parse_decimal(price, "price")?, parse_decimal(qty, "qty")?)))
        .collect()
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, ParseError> {
    Decimal::from_str(raw)
        .map_err(|e| ParseError::InvalidDataType(format!("invalid decimal for {}: {}", field, e)))
}
