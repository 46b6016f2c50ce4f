//! Data models for market data and derived order-flow structures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Trade side enumeration (aggressor side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// A single executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: Decimal,
    pub size: Decimal,
    pub side: TradeSide,
    /// Exchange trade time (milliseconds since Unix epoch)
    pub timestamp_ms: i64,
}

impl Trade {
    /// Quote-currency notional of this trade
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade[{}]: {} @ {} ({} ms)",
            self.side, self.size, self.price, self.timestamp_ms
        )
    }
}

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => write!(f, "bid"),
            BookSide::Ask => write!(f, "ask"),
        }
    }
}

/// Full-depth REST snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub last_update_id: u64,
    /// Absolute bid levels as (price, qty)
    pub bids: Vec<(Decimal, Decimal)>,
    /// Absolute ask levels as (price, qty)
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Incremental depth diff from the stream
///
/// A level with qty zero means delete that side at that price.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthDiff {
    pub first_update_id: u64,
    pub final_update_id: u64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Book update as a tagged variant: either a full snapshot or a validated diff
#[derive(Debug, Clone, PartialEq)]
pub enum BookUpdate {
    Snapshot(DepthSnapshot),
    Diff(DepthDiff),
}

impl fmt::Display for BookUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookUpdate::Snapshot(s) => write!(
                f,
                "Snapshot[id={}]: {} bids, {} asks",
                s.last_update_id,
                s.bids.len(),
                s.asks.len()
            ),
            BookUpdate::Diff(d) => write!(
                f,
                "Diff[U={}, u={}]: {} bids, {} asks",
                d.first_update_id,
                d.final_update_id,
                d.bids.len(),
                d.asks.len()
            ),
        }
    }
}

/// Volatility regime derived from the rolling ATR proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Unknown,
    Calm,
    Normal,
    Volatile,
    Extreme,
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityRegime::Unknown => "unknown",
            VolatilityRegime::Calm => "calm",
            VolatilityRegime::Normal => "normal",
            VolatilityRegime::Volatile => "volatile",
            VolatilityRegime::Extreme => "extreme",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a liquidity sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepDirection {
    /// Bid levels consumed by aggressive sellers
    Down,
    /// Ask levels consumed by aggressive buyers
    Up,
}

impl fmt::Display for SweepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepDirection::Down => write!(f, "down"),
            SweepDirection::Up => write!(f, "up"),
        }
    }
}

/// A liquidity sweep that passed adjacency, notional and trade confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedSweep {
    pub direction: SweepDirection,
    pub levels_removed: usize,
    /// Quote-currency notional of the swept cluster
    pub notional: Decimal,
    /// Prices of the swept levels, ascending
    pub prices: Vec<Decimal>,
    /// Elapsed milliseconds between the last two book updates
    pub time_ms: i64,
}

impl fmt::Display for ConfirmedSweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sweep[{}]: {} levels, notional {}, {} ms",
            self.direction, self.levels_removed, self.notional, self.time_ms
        )
    }
}

/// Absorption: aggressive volume met by passive depth without price movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absorption {
    /// Total traded volume in the detection window
    pub volume: Decimal,
    /// Relative price range over the window
    pub price_change_pct: f64,
    /// Side of the book soaking up the aggression
    pub absorbing_side: BookSide,
    /// Mean trade price in the window
    pub price_level: Decimal,
    /// Aggressive volume divided by available depth
    pub volume_to_depth_ratio: f64,
}

/// Rolling buy/sell volume aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaInfo {
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    /// Raw signed delta (buy - sell)
    pub delta: Decimal,
    /// Delta dampened by volatility: delta / (1 + |delta| * atr)
    pub normalized_delta: f64,
    /// buy / sell ratio, zero when sell volume is zero
    pub delta_ratio: f64,
    /// Adaptive window the aggregates were computed over
    pub window_seconds: f64,
}

/// Aggregated per-tick view of the market used by the signal generator
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    pub timestamp_ms: i64,
    /// Last trade price
    pub price: Decimal,
    /// Book mid price, falling back to the last trade when one side is empty
    pub mid_price: Option<Decimal>,
    pub delta: DeltaInfo,
    pub sweep: Option<ConfirmedSweep>,
    pub absorption: Option<Absorption>,
    pub total_trades: usize,
    pub volatility: VolatilityRegime,
    pub atr: Option<f64>,
    pub is_synced: bool,
}

/// Signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
        }
    }
}

/// Which pattern produced the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPattern {
    Sweep,
    NoSweep,
}

/// An emitted directional trading signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub price: Decimal,
    pub timestamp_ms: i64,
    /// Confidence score in [0, 100]
    pub confidence: u8,
    /// Human-readable component reasons
    pub reasons: Vec<String>,
    /// Raw delta at emission time
    pub delta: Decimal,
    /// Levels removed by the driving sweep (zero for no-sweep pattern)
    pub sweep_levels: usize,
    pub volatility: VolatilityRegime,
    pub pattern: SignalPattern,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({}%): {}",
            self.signal_type,
            self.price,
            self.confidence,
            self.reasons.join(" | ")
        )
    }
}

/// Reason a signal evaluation was suppressed by the regime filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    ExtremeVolatility,
    BookNotSynced,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::ExtremeVolatility => write!(f, "extreme_volatility"),
            FilterReason::BookNotSynced => write!(f, "book_not_synced"),
        }
    }
}

/// Aggregated signal-generation statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatistics {
    pub total_signals: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub avg_confidence: f64,
    pub signals_filtered: u64,
    /// Filtered evaluations as a percentage of all attempts
    pub filter_rate: f64,
    pub filter_reasons: HashMap<FilterReason, u64>,
}

/// Synchronizer state exposed for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub synced: bool,
    pub last_update_id: u64,
    pub desync_count: u32,
}

/// Periodic status record pushed to the output sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub timestamp_ms: i64,
    pub symbol: String,
    pub synced: bool,
    pub uptime_secs: f64,
    pub orderbook_updates: u64,
    pub trades: u64,
    pub delta: Decimal,
    pub volatility: VolatilityRegime,
    /// Present only on the final shutdown record
    pub signal_stats: Option<SignalStatistics>,
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[STATUS] sync: {} | uptime: {:.0}s | ob updates: {} | trades: {} | delta: {} | vol: {}",
            if self.synced { "ok" } else { "lost" },
            self.uptime_secs,
            self.orderbook_updates,
            self.trades,
            self.delta,
            self.volatility
        )
    }
}
