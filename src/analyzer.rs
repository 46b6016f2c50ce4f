//! Order-flow analysis
//!
//! Consumes validated book updates and trades, and derives the
//! short-horizon microstructure features the signal generator runs on:
//! rolling signed volume delta over a volatility-adaptive window, an ATR
//! proxy with a regime classification, trade-confirmed liquidity sweeps,
//! and volume/depth absorption.

use crate::{
    config::BotConfig,
    data::{
        Absorption, BookSide, BookUpdate, ConfirmedSweep, DeltaInfo, MarketState, SweepDirection,
        Trade, TradeSide, VolatilityRegime,
    },
    orderbook::OrderBook,
    trades::TradeBuffer,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Trade buffer bound
const TRADE_BUFFER_CAPACITY: usize = 10_000;

/// Price / price-change history bounds
const PRICE_HISTORY_CAPACITY: usize = 100;

/// Price-change samples required before the ATR proxy is considered known
const ATR_MIN_SAMPLES: usize = 20;

/// Window for matching-side trade confirmation of a sweep
const SWEEP_CONFIRM_WINDOW_MS: i64 = 2_000;

/// Absorption detection window and minimum sample size
const ABSORPTION_WINDOW_MS: i64 = 10_000;
const ABSORPTION_MIN_TRADES: usize = 10;

/// Book depth levels consulted for the absorption ratio
const ABSORPTION_DEPTH_LEVELS: usize = 10;

/// Adapt the delta window to current volatility
///
/// Quiet tape stretches the window (up to 2x base), fast tape shrinks it
/// (down to 0.6x base).
pub fn adapt_window(base_seconds: f64, atr: f64) -> f64 {
    let vol_factor = 0.0001 / atr.max(0.00001);
    base_seconds * vol_factor.clamp(0.6, 2.0)
}

/// Streaming order-flow analyzer for a single instrument
pub struct FlowAnalyzer {
    config: BotConfig,

    book: OrderBook,
    /// Book state before the most recent update, for removal diffing
    previous_book: OrderBook,
    /// Wall-clock time of the most recent book update of any kind
    book_update_ms: i64,
    snapshot_loaded: bool,
    stream_synced: bool,

    trades: TradeBuffer,
    buy_volume: VecDeque<(i64, Decimal)>,
    sell_volume: VecDeque<(i64, Decimal)>,

    current_price: Decimal,
    price_history: VecDeque<Decimal>,
    price_changes: VecDeque<f64>,
    atr: Option<f64>,

    base_delta_window: f64,
    current_delta_window: f64,
    volatility: VolatilityRegime,
}

impl FlowAnalyzer {
    pub fn new(config: BotConfig) -> Self {
        let max_levels = config.max_orderbook_levels;
        let base_window = config.delta_window_seconds;
        Self {
            trades: TradeBuffer::new(TRADE_BUFFER_CAPACITY, config.trade_history_seconds),
            config,
            book: OrderBook::new(max_levels),
            previous_book: OrderBook::new(max_levels),
            book_update_ms: 0,
            snapshot_loaded: false,
            stream_synced: false,
            buy_volume: VecDeque::new(),
            sell_volume: VecDeque::new(),
            current_price: Decimal::ZERO,
            price_history: VecDeque::with_capacity(PRICE_HISTORY_CAPACITY),
            price_changes: VecDeque::with_capacity(PRICE_HISTORY_CAPACITY),
            atr: None,
            base_delta_window: base_window,
            current_delta_window: base_window,
            volatility: VolatilityRegime::Unknown,
        }
    }

    /// Apply a validated book update
    ///
    /// Snapshots rebuild the ladder; the pre-update state is retained for
    /// sweep diffing. After a snapshot the previous book is empty so the
    /// rebuild itself can never read as a sweep.
    pub fn apply_book_update(&mut self, update: &BookUpdate, now_ms: i64) {
        match update {
            BookUpdate::Snapshot(snapshot) => {
                self.previous_book = OrderBook::new(self.config.max_orderbook_levels);
                self.book_update_ms = now_ms;
                self.book.apply_snapshot(snapshot);
                self.snapshot_loaded = true;
                tracing::info!(
                    last_update_id = snapshot.last_update_id,
                    bids = snapshot.bids.len(),
                    asks = snapshot.asks.len(),
                    "Order book rebuilt from snapshot"
                );
            }
            BookUpdate::Diff(diff) => {
                self.previous_book = self.book.snapshot_copy();
                self.book_update_ms = now_ms;
                self.book.apply_diff(diff);
            }
        }
    }

    /// Ingest a trade and refresh every trade-derived statistic
    pub fn add_trade(&mut self, trade: Trade, now_ms: i64) {
        self.current_price = trade.price;

        if let Some(&prev) = self.price_history.back() {
            if prev > Decimal::ZERO {
                let change = ((trade.price - prev).abs() / prev)
                    .to_f64()
                    .unwrap_or(0.0);
                if self.price_changes.len() >= PRICE_HISTORY_CAPACITY {
                    self.price_changes.pop_front();
                }
                self.price_changes.push_back(change);
            }
        }
        if self.price_history.len() >= PRICE_HISTORY_CAPACITY {
            self.price_history.pop_front();
        }
        self.price_history.push_back(trade.price);

        if self.price_changes.len() >= ATR_MIN_SAMPLES {
            let atr =
                self.price_changes.iter().sum::<f64>() / self.price_changes.len() as f64;
            self.atr = Some(atr);
            self.current_delta_window = adapt_window(self.base_delta_window, atr);
        }

        match trade.side {
            TradeSide::Buy => self.buy_volume.push_back((now_ms, trade.size)),
            TradeSide::Sell => self.sell_volume.push_back((now_ms, trade.size)),
        }

        self.trades.push(trade, now_ms);
        self.evict_volume_windows(now_ms);
        self.update_regime();
    }

    /// Mark whether the diff stream currently chains onto the snapshot
    pub fn set_synced(&mut self, synced: bool) {
        self.stream_synced = synced;
    }

    pub fn is_synced(&self) -> bool {
        self.snapshot_loaded && self.stream_synced
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn atr(&self) -> Option<f64> {
        self.atr
    }

    pub fn volatility(&self) -> VolatilityRegime {
        self.volatility
    }

    pub fn current_delta_window(&self) -> f64 {
        self.current_delta_window
    }

    fn evict_volume_windows(&mut self, now_ms: i64) {
        let cutoff = now_ms - (self.current_delta_window * 1000.0) as i64;
        while self
            .buy_volume
            .front()
            .map(|(ts, _)| *ts < cutoff)
            .unwrap_or(false)
        {
            self.buy_volume.pop_front();
        }
        while self
            .sell_volume
            .front()
            .map(|(ts, _)| *ts < cutoff)
            .unwrap_or(false)
        {
            self.sell_volume.pop_front();
        }
    }

    fn update_regime(&mut self) {
        if let Some(atr) = self.atr {
            self.volatility = if atr < 0.0001 {
                VolatilityRegime::Calm
            } else if atr < 0.0003 {
                VolatilityRegime::Normal
            } else if atr < 0.0007 {
                VolatilityRegime::Volatile
            } else {
                VolatilityRegime::Extreme
            };
        }
    }

    /// Rolling delta over the adaptive window
    pub fn delta(&self) -> DeltaInfo {
        let buy_volume: Decimal = self.buy_volume.iter().map(|(_, size)| *size).sum();
        let sell_volume: Decimal = self.sell_volume.iter().map(|(_, size)| *size).sum();
        let delta = buy_volume - sell_volume;
        let delta_f = delta.to_f64().unwrap_or(0.0);

        let normalized_delta = match self.atr {
            Some(atr) if atr > 0.0 => delta_f / (1.0 + delta_f.abs() * atr),
            _ => delta_f,
        };

        let delta_ratio = if sell_volume > Decimal::ZERO {
            (buy_volume / sell_volume).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        DeltaInfo {
            buy_volume,
            sell_volume,
            delta,
            normalized_delta,
            delta_ratio,
            window_seconds: self.current_delta_window,
        }
    }

    /// Detect a trade-confirmed liquidity sweep
    ///
    /// Bid removals are checked before ask removals; the first direction
    /// that passes adjacency, notional and trade confirmation wins.
    pub fn detect_sweep(&self, now_ms: i64) -> Option<ConfirmedSweep> {
        if !self.snapshot_loaded
            || !self.stream_synced
            || self.previous_book.is_empty()
            || self.book.is_empty()
        {
            return None;
        }

        let elapsed_ms = now_ms - self.book_update_ms;
        if elapsed_ms > self.config.liquidity_sweep_time_ms {
            return None;
        }

        let removed_bids = self.removed_levels(BookSide::Bid);
        let removed_asks = self.removed_levels(BookSide::Ask);
        let min_levels = self.config.liquidity_sweep_min_levels;

        if removed_bids.len() >= min_levels {
            if let Some(sweep) =
                self.qualify_sweep(&removed_bids, SweepDirection::Down, elapsed_ms, now_ms)
            {
                return Some(sweep);
            }
        }

        if removed_asks.len() >= min_levels {
            if let Some(sweep) =
                self.qualify_sweep(&removed_asks, SweepDirection::Up, elapsed_ms, now_ms)
            {
                return Some(sweep);
            }
        }

        None
    }

    /// Levels whose side size dropped to zero since the previous book
    fn removed_levels(&self, side: BookSide) -> Vec<(Decimal, Decimal)> {
        self.previous_book
            .levels()
            .filter_map(|(price, level)| {
                let prev_size = match side {
                    BookSide::Bid => level.bid,
                    BookSide::Ask => level.ask,
                };
                if prev_size <= Decimal::ZERO {
                    return None;
                }
                let gone = match self.book.level(price) {
                    None => true,
                    Some(current) => match side {
                        BookSide::Bid => current.bid.is_zero(),
                        BookSide::Ask => current.ask.is_zero(),
                    },
                };
                gone.then_some((*price, prev_size))
            })
            .collect()
    }

    fn qualify_sweep(
        &self,
        removed: &[(Decimal, Decimal)],
        direction: SweepDirection,
        elapsed_ms: i64,
        now_ms: i64,
    ) -> Option<ConfirmedSweep> {
        let group = largest_adjacent_group(removed, self.config.liquidity_sweep_min_levels);
        if group.len() < self.config.liquidity_sweep_min_levels {
            // Scattered removals, not a sweep
            return None;
        }

        let notional: Decimal = group.iter().map(|(price, qty)| price * qty).sum();
        if notional < self.config.min_sweep_notional {
            return None;
        }

        let prices: Vec<Decimal> = group.iter().map(|(price, _)| *price).collect();
        let zone_min = *prices.first()?;
        let zone_max = *prices.last()?;

        if !self.confirm_with_trades(zone_min, zone_max, direction, now_ms) {
            return None;
        }

        Some(ConfirmedSweep {
            direction,
            levels_removed: group.len(),
            notional,
            prices,
            time_ms: elapsed_ms,
        })
    }

    /// A sweep is only real if aggressive trades hit the swept zone
    fn confirm_with_trades(
        &self,
        zone_min: Decimal,
        zone_max: Decimal,
        direction: SweepDirection,
        now_ms: i64,
    ) -> bool {
        let expected_side = match direction {
            SweepDirection::Down => TradeSide::Sell,
            SweepDirection::Up => TradeSide::Buy,
        };

        let mut matched = false;
        let mut confirm_notional = Decimal::ZERO;
        for trade in self.trades.in_window(now_ms, SWEEP_CONFIRM_WINDOW_MS) {
            if trade.price < zone_min || trade.price > zone_max {
                continue;
            }
            if trade.side != expected_side {
                continue;
            }
            matched = true;
            confirm_notional += trade.notional();
        }

        matched && confirm_notional >= self.config.min_trade_confirm_notional
    }

    /// Detect absorption: heavy aggression that failed to move price
    pub fn detect_absorption(&self, now_ms: i64) -> Option<Absorption> {
        if self.trades.len() < ABSORPTION_MIN_TRADES {
            return None;
        }

        let recent: Vec<&Trade> = self
            .trades
            .newer_than(now_ms - ABSORPTION_WINDOW_MS)
            .collect();
        if recent.is_empty() {
            return None;
        }

        let total_volume: Decimal = recent.iter().map(|t| t.size).sum();
        let min_price = recent.iter().map(|t| t.price).min()?;
        let max_price = recent.iter().map(|t| t.price).max()?;
        if min_price <= Decimal::ZERO {
            return None;
        }
        let price_range_pct = ((max_price - min_price) / min_price).to_f64().unwrap_or(0.0);

        let mut max_movement = self.config.price_movement_threshold;
        if let Some(atr) = self.atr {
            let vol_multiplier = (atr / 0.0001).min(3.0);
            max_movement = self.config.price_movement_threshold * vol_multiplier;
        }
        if price_range_pct > max_movement {
            return None;
        }

        let buy_volume: Decimal = recent
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| t.size)
            .sum();
        let sell_volume: Decimal = recent
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .map(|t| t.size)
            .sum();

        let absorbing_side = if buy_volume > sell_volume {
            BookSide::Ask
        } else {
            BookSide::Bid
        };
        let aggressive_volume = buy_volume.max(sell_volume);

        let available_depth = self.book.depth(absorbing_side, ABSORPTION_DEPTH_LEVELS);
        if available_depth.is_zero() {
            return None;
        }

        let ratio = (aggressive_volume / available_depth).to_f64().unwrap_or(0.0);
        if ratio < self.config.min_absorption_ratio {
            return None;
        }

        let price_sum: Decimal = recent.iter().map(|t| t.price).sum();
        let price_level = price_sum / Decimal::from(recent.len() as u64);

        Some(Absorption {
            volume: total_volume,
            price_change_pct: price_range_pct,
            absorbing_side,
            price_level,
            volume_to_depth_ratio: ratio,
        })
    }

    /// Aggregate the per-tick view consumed by the signal generator
    pub fn market_state(&self, now_ms: i64) -> MarketState {
        MarketState {
            timestamp_ms: now_ms,
            price: self.current_price,
            mid_price: self.book.mid_price().or_else(|| {
                (self.current_price > Decimal::ZERO).then_some(self.current_price)
            }),
            delta: self.delta(),
            sweep: self.detect_sweep(now_ms),
            absorption: self.detect_absorption(now_ms),
            total_trades: self.trades.len(),
            volatility: self.volatility,
            atr: self.atr,
            is_synced: self.is_synced(),
        }
    }
}

/// Largest run of price-adjacent levels
///
/// Adjacency threshold is twice the median inter-level distance, so a
/// handful of removals scattered across the ladder never clusters.
fn largest_adjacent_group(
    levels: &[(Decimal, Decimal)],
    min_levels: usize,
) -> Vec<(Decimal, Decimal)> {
    if levels.is_empty() {
        return Vec::new();
    }

    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    if sorted.len() < 2 {
        return sorted;
    }

    let mut distances: Vec<Decimal> = sorted
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].0).abs())
        .collect();
    distances.sort();
    let median = distances[distances.len() / 2];
    let threshold = median * Decimal::from(2);

    let mut groups: Vec<Vec<(Decimal, Decimal)>> = Vec::new();
    let mut current = vec![sorted[0]];
    for pair in sorted.windows(2) {
        let distance = (pair[1].0 - pair[0].0).abs();
        if distance <= threshold {
            current.push(pair[1]);
        } else {
            if current.len() >= min_levels {
                groups.push(std::mem::take(&mut current));
            }
            current = vec![pair[1]];
        }
    }
    if current.len() >= min_levels {
        groups.push(current);
    }

    // First largest group wins ties
    let mut best: Vec<(Decimal, Decimal)> = Vec::new();
    for group in groups {
        if group.len() > best.len() {
            best = group;
        }
    }
    best
}
