//! Signal generation
//!
//! Tracks derived features (sweep recency, delta flips, absorption, price
//! reclaim) across market-state ticks and emits BUY/SELL signals with
//! confidence scores. Evaluations are gated by a cooldown and a market
//! regime filter; every suppression is counted by reason.

use crate::{
    config::BotConfig,
    data::{
        ConfirmedSweep, FilterReason, MarketState, Signal, SignalPattern, SignalStatistics,
        SignalType, SweepDirection, VolatilityRegime,
    },
};
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, VecDeque};

/// Emitted-signal ring size
const SIGNAL_HISTORY_CAPACITY: usize = 100;

/// Normalized-delta observations retained
const DELTA_HISTORY_CAPACITY: usize = 20;

/// Sweep context lifetime after detection
const SWEEP_CONTEXT_TTL_MS: i64 = 10_000;

/// Delta-flip flag lifetime past the most recent sweep
const FLIP_RESET_AFTER_SWEEP_MS: i64 = 5_000;

/// Direction of the most recent delta flip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaFlip {
    #[default]
    None,
    Bullish,
    Bearish,
}

/// Feature flags derived from recent market states
#[derive(Debug, Clone, Default)]
pub struct FeatureState {
    pub sweep_detected: bool,
    pub absorption_detected: bool,
    pub delta_flip: DeltaFlip,
    pub price_reclaim: bool,
}

/// Regime-filtered, cooldown-throttled signal generator
pub struct SignalGenerator {
    config: BotConfig,

    last_signal_ms: i64,
    history: VecDeque<Signal>,

    recent_sweep: Option<ConfirmedSweep>,
    sweep_ms: i64,
    previous_delta: f64,
    delta_history: VecDeque<f64>,
    features: FeatureState,

    signals_generated: u64,
    signals_filtered: u64,
    filter_reasons: HashMap<FilterReason, u64>,
}

impl SignalGenerator {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            last_signal_ms: 0,
            history: VecDeque::with_capacity(SIGNAL_HISTORY_CAPACITY),
            recent_sweep: None,
            sweep_ms: 0,
            previous_delta: 0.0,
            delta_history: VecDeque::with_capacity(DELTA_HISTORY_CAPACITY),
            features: FeatureState::default(),
            signals_generated: 0,
            signals_filtered: 0,
            filter_reasons: HashMap::new(),
        }
    }

    /// Run one evaluation tick: update features, then BUY before SELL
    pub fn generate(&mut self, state: &MarketState) -> Option<Signal> {
        self.update_state(state);

        if let Some(signal) = self.check_buy(state) {
            return Some(signal);
        }
        self.check_sell(state)
    }

    pub fn features(&self) -> &FeatureState {
        &self.features
    }

    pub fn history(&self) -> impl Iterator<Item = &Signal> {
        self.history.iter()
    }

    /// Update feature flags from the latest market state
    fn update_state(&mut self, state: &MarketState) {
        let now_ms = state.timestamp_ms;

        if let Some(sweep) = &state.sweep {
            tracing::debug!(
                direction = %sweep.direction,
                levels = sweep.levels_removed,
                notional = %sweep.notional,
                "Liquidity sweep detected"
            );
            self.recent_sweep = Some(sweep.clone());
            self.sweep_ms = now_ms;
            self.features.sweep_detected = true;
        } else if self.recent_sweep.is_some() && now_ms - self.sweep_ms > SWEEP_CONTEXT_TTL_MS {
            self.recent_sweep = None;
            self.features.sweep_detected = false;
        }

        self.features.absorption_detected = state.absorption.is_some();
        if let Some(absorption) = &state.absorption {
            tracing::debug!(
                volume = %absorption.volume,
                side = %absorption.absorbing_side,
                ratio = absorption.volume_to_depth_ratio,
                "Absorption detected"
            );
        }

        let current_delta = state.delta.normalized_delta;
        if self.delta_history.len() >= DELTA_HISTORY_CAPACITY {
            self.delta_history.pop_front();
        }
        self.delta_history.push_back(current_delta);

        if self.delta_history.len() >= 2 {
            let delta_change = current_delta - self.previous_delta;
            let min_flip = self.adaptive_min_flip(state.atr);

            if delta_change.abs() > min_flip {
                if self.previous_delta < -min_flip && current_delta > min_flip {
                    self.features.delta_flip = DeltaFlip::Bullish;
                    tracing::debug!(delta_change, "Delta flip: bullish");
                } else if self.previous_delta > min_flip && current_delta < -min_flip {
                    self.features.delta_flip = DeltaFlip::Bearish;
                    tracing::debug!(delta_change, "Delta flip: bearish");
                }
            } else if now_ms - self.sweep_ms > FLIP_RESET_AFTER_SWEEP_MS {
                self.features.delta_flip = DeltaFlip::None;
            }
        }
        self.previous_delta = current_delta;

        if let Some(sweep) = &self.recent_sweep {
            match sweep.direction {
                SweepDirection::Down => {
                    if let Some(min) = sweep.prices.iter().min() {
                        if state.price > *min {
                            self.features.price_reclaim = true;
                        }
                    }
                }
                SweepDirection::Up => {
                    if let Some(max) = sweep.prices.iter().max() {
                        if state.price < *max {
                            self.features.price_reclaim = true;
                        }
                    }
                }
            }
        }
    }

    /// Flip threshold scaled by volatility, independent of the regime cut-offs
    fn adaptive_min_flip(&self, atr: Option<f64>) -> f64 {
        match atr {
            Some(atr) => {
                let vol_factor = atr / 0.0003;
                self.config.min_delta_flip * vol_factor.clamp(0.5, 2.0)
            }
            None => self.config.min_delta_flip,
        }
    }

    fn in_cooldown(&self, now_ms: i64) -> bool {
        now_ms - self.last_signal_ms < (self.config.cooldown_seconds * 1000.0) as i64
    }

    /// Returns the reason the regime rejects signals right now, if any
    fn regime_filter(&mut self, state: &MarketState) -> Option<FilterReason> {
        if state.volatility == VolatilityRegime::Extreme {
            self.record_filter(FilterReason::ExtremeVolatility);
            return Some(FilterReason::ExtremeVolatility);
        }
        // Calm markets are allowed; only an unsynced book blocks
        if !state.is_synced {
            self.record_filter(FilterReason::BookNotSynced);
            return Some(FilterReason::BookNotSynced);
        }
        None
    }

    fn record_filter(&mut self, reason: FilterReason) {
        self.signals_filtered += 1;
        *self.filter_reasons.entry(reason).or_insert(0) += 1;
    }

    fn check_buy(&mut self, state: &MarketState) -> Option<Signal> {
        if self.in_cooldown(state.timestamp_ms) {
            return None;
        }
        if let Some(reason) = self.regime_filter(state) {
            tracing::debug!(%reason, "BUY signal filtered");
            return None;
        }

        if let Some(sweep) = self.recent_sweep.clone() {
            if sweep.direction == SweepDirection::Down
                && self.features.delta_flip == DeltaFlip::Bullish
            {
                return self.emit_with_sweep(SignalType::Buy, &sweep, state);
            }
        }

        if self.features.delta_flip == DeltaFlip::Bullish && self.features.absorption_detected {
            let delta = state.delta.delta.to_f64().unwrap_or(0.0);
            if delta > self.config.min_delta_flip * 2.0 {
                return self.emit_no_sweep(SignalType::Buy, state);
            }
        }

        None
    }

    fn check_sell(&mut self, state: &MarketState) -> Option<Signal> {
        if self.in_cooldown(state.timestamp_ms) {
            return None;
        }
        if let Some(reason) = self.regime_filter(state) {
            tracing::debug!(%reason, "SELL signal filtered");
            return None;
        }

        if let Some(sweep) = self.recent_sweep.clone() {
            if sweep.direction == SweepDirection::Up
                && self.features.delta_flip == DeltaFlip::Bearish
            {
                return self.emit_with_sweep(SignalType::Sell, &sweep, state);
            }
        }

        if self.features.delta_flip == DeltaFlip::Bearish && self.features.absorption_detected {
            let delta = state.delta.delta.to_f64().unwrap_or(0.0);
            if delta < -self.config.min_delta_flip * 2.0 {
                return self.emit_no_sweep(SignalType::Sell, state);
            }
        }

        None
    }

    /// Primary pattern: sweep plus flip, absorption and reclaim add on
    fn emit_with_sweep(
        &mut self,
        signal_type: SignalType,
        sweep: &ConfirmedSweep,
        state: &MarketState,
    ) -> Option<Signal> {
        let mut confidence = 0u8;
        let mut reasons = Vec::new();

        confidence += 30;
        let arrow = match sweep.direction {
            SweepDirection::Down => "↓",
            SweepDirection::Up => "↑",
        };
        reasons.push(format!("sweep {} ({} levels)", arrow, sweep.levels_removed));

        match (signal_type, self.features.delta_flip) {
            (SignalType::Buy, DeltaFlip::Bullish) => {
                confidence += 40;
                reasons.push("delta flip ↑".to_string());
            }
            (SignalType::Sell, DeltaFlip::Bearish) => {
                confidence += 40;
                reasons.push("delta flip ↓".to_string());
            }
            _ => {}
        }

        if self.features.absorption_detected {
            confidence += 20;
            reasons.push("absorption confirmed".to_string());
        }
        if self.features.price_reclaim {
            confidence += 10;
            reasons.push("price reclaim".to_string());
        }

        if confidence < 70 {
            return None;
        }

        let signal = Signal {
            signal_type,
            price: state.price,
            timestamp_ms: state.timestamp_ms,
            confidence,
            reasons,
            delta: state.delta.delta,
            sweep_levels: sweep.levels_removed,
            volatility: state.volatility,
            pattern: SignalPattern::Sweep,
        };
        Some(self.commit(signal))
    }

    /// Alternative pattern for quiet tape: strong flip plus absorption
    fn emit_no_sweep(&mut self, signal_type: SignalType, state: &MarketState) -> Option<Signal> {
        let mut confidence = 0u8;
        let mut reasons = Vec::new();

        match (signal_type, self.features.delta_flip) {
            (SignalType::Buy, DeltaFlip::Bullish) => {
                confidence += 50;
                reasons.push("strong delta flip ↑".to_string());
            }
            (SignalType::Sell, DeltaFlip::Bearish) => {
                confidence += 50;
                reasons.push("strong delta flip ↓".to_string());
            }
            _ => {}
        }

        if self.features.absorption_detected {
            confidence += 30;
            match signal_type {
                SignalType::Buy => reasons.push("absorption support".to_string()),
                SignalType::Sell => reasons.push("absorption resistance".to_string()),
            }
        }

        let delta = state.delta.delta.to_f64().unwrap_or(0.0);
        match signal_type {
            SignalType::Buy if delta > self.config.min_delta_flip * 3.0 => {
                confidence += 20;
                reasons.push("very strong buying".to_string());
            }
            SignalType::Sell if delta < -self.config.min_delta_flip * 3.0 => {
                confidence += 20;
                reasons.push("very strong selling".to_string());
            }
            _ => {}
        }

        // Lower bar than the sweep pattern
        if confidence < 60 {
            return None;
        }

        let signal = Signal {
            signal_type,
            price: state.price,
            timestamp_ms: state.timestamp_ms,
            confidence,
            reasons,
            delta: state.delta.delta,
            sweep_levels: 0,
            volatility: state.volatility,
            pattern: SignalPattern::NoSweep,
        };
        Some(self.commit(signal))
    }

    fn commit(&mut self, signal: Signal) -> Signal {
        tracing::info!(%signal, "Signal emitted");
        self.last_signal_ms = signal.timestamp_ms;
        if self.history.len() >= SIGNAL_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(signal.clone());
        self.signals_generated += 1;
        self.reset_features();
        signal
    }

    /// Clear all feature context after an emission; later ticks re-detect
    fn reset_features(&mut self) {
        self.recent_sweep = None;
        self.features = FeatureState::default();
    }

    /// Aggregate statistics including the filter breakdown
    pub fn statistics(&self) -> SignalStatistics {
        let total_signals = self.history.len();
        let buy_signals = self
            .history
            .iter()
            .filter(|s| s.signal_type == SignalType::Buy)
            .count();
        let sell_signals = total_signals - buy_signals;
        let avg_confidence = if total_signals > 0 {
            self.history.iter().map(|s| s.confidence as f64).sum::<f64>() / total_signals as f64
        } else {
            0.0
        };

        let total_attempts = self.signals_generated + self.signals_filtered;
        let filter_rate = if total_attempts > 0 {
            self.signals_filtered as f64 / total_attempts as f64 * 100.0
        } else {
            0.0
        };

        SignalStatistics {
            total_signals,
            buy_signals,
            sell_signals,
            avg_confidence,
            signals_filtered: self.signals_filtered,
            filter_rate,
            filter_reasons: self.filter_reasons.clone(),
        }
    }
}
