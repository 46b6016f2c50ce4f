//! Engine configuration
//!
//! All tunables live in an immutable [`BotConfig`] record that is passed
//! into constructors. Defaults are the production values; every field can
//! be overridden from the environment via its upper-snake name
//! (e.g. `MIN_SWEEP_NOTIONAL=75000`).

use rust_decimal::Decimal;
use std::str::FromStr;

/// Configuration record for the order-flow engine
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Trading pair symbol (uppercase, e.g. "ETHUSDT")
    pub symbol: String,
    /// Exchange name (informational, carried into status records)
    pub exchange: String,
    /// Depth-diff stream endpoint
    pub orderbook_ws: String,
    /// Trade stream endpoint
    pub trades_ws: String,
    /// REST endpoint for the initial depth snapshot
    pub rest_depth_url: String,

    /// Base rolling window for buy/sell volume aggregation (seconds)
    pub delta_window_seconds: f64,
    /// Minimum aggressive-volume / available-depth ratio for absorption
    pub min_absorption_ratio: f64,
    /// Maximum relative price range tolerated during absorption
    pub price_movement_threshold: f64,

    /// Minimum adjacent levels removed to qualify as a sweep
    pub liquidity_sweep_min_levels: usize,
    /// Maximum book age for sweep detection (milliseconds)
    pub liquidity_sweep_time_ms: i64,
    /// Minimum notional of the swept cluster (quote currency)
    pub min_sweep_notional: Decimal,
    /// Minimum matching-side trade notional confirming a sweep
    pub min_trade_confirm_notional: Decimal,

    /// Minimum seconds between emitted signals
    pub cooldown_seconds: f64,
    /// Base delta-flip threshold
    pub min_delta_flip: f64,

    /// Soft cap on ladder size; eviction kicks in at twice this
    pub max_orderbook_levels: usize,
    /// Trade buffer retention window (seconds)
    pub trade_history_seconds: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".to_string(),
            exchange: "Binance".to_string(),
            orderbook_ws: "wss://stream.binance.com:9443/ws/ethusdt@depth@100ms".to_string(),
            trades_ws: "wss://stream.binance.com:9443/ws/ethusdt@trade".to_string(),
            rest_depth_url: "https://api.binance.com/api/v3/depth".to_string(),
            delta_window_seconds: 5.0,
            min_absorption_ratio: 2.0,
            price_movement_threshold: 0.0001,
            liquidity_sweep_min_levels: 3,
            liquidity_sweep_time_ms: 200,
            min_sweep_notional: Decimal::from(50_000),
            min_trade_confirm_notional: Decimal::from(25_000),
            cooldown_seconds: 30.0,
            min_delta_flip: 50.0,
            max_orderbook_levels: 50,
            trade_history_seconds: 60.0,
        }
    }
}

impl BotConfig {
    /// Build a configuration from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SYMBOL") {
            config.symbol = v.to_uppercase();
        }
        if let Ok(v) = std::env::var("EXCHANGE") {
            config.exchange = v;
        }
        if let Ok(v) = std::env::var("BINANCE_ORDERBOOK_WS") {
            config.orderbook_ws = v;
        }
        if let Ok(v) = std::env::var("BINANCE_TRADES_WS") {
            config.trades_ws = v;
        }
        if let Ok(v) = std::env::var("BINANCE_REST_DEPTH_URL") {
            config.rest_depth_url = v;
        }

        read_env("DELTA_WINDOW_SECONDS", &mut config.delta_window_seconds);
        read_env("MIN_ABSORPTION_RATIO", &mut config.min_absorption_ratio);
        read_env(
            "PRICE_MOVEMENT_THRESHOLD",
            &mut config.price_movement_threshold,
        );
        read_env(
            "LIQUIDITY_SWEEP_MIN_LEVELS",
            &mut config.liquidity_sweep_min_levels,
        );
        read_env("LIQUIDITY_SWEEP_TIME_MS", &mut config.liquidity_sweep_time_ms);
        read_env("MIN_SWEEP_NOTIONAL", &mut config.min_sweep_notional);
        read_env(
            "MIN_TRADE_CONFIRM_NOTIONAL",
            &mut config.min_trade_confirm_notional,
        );
        read_env("COOLDOWN_SECONDS", &mut config.cooldown_seconds);
        read_env("MIN_DELTA_FLIP", &mut config.min_delta_flip);
        read_env("MAX_ORDERBOOK_LEVELS", &mut config.max_orderbook_levels);
        read_env("TRADE_HISTORY_SECONDS", &mut config.trade_history_seconds);

        config
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("Symbol cannot be empty".to_string());
        }

        for (name, endpoint) in [
            ("orderbook_ws", &self.orderbook_ws),
            ("trades_ws", &self.trades_ws),
        ] {
            if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
                return Err(format!("{} must be a valid WebSocket URL", name));
            }
            if url::Url::parse(endpoint).is_err() {
                return Err(format!("{} is not a parseable URL", name));
            }
        }

        if !self.rest_depth_url.starts_with("http://")
            && !self.rest_depth_url.starts_with("https://")
        {
            return Err("rest_depth_url must be a valid HTTP URL".to_string());
        }

        if self.delta_window_seconds <= 0.0 {
            return Err("Delta window must be greater than 0".to_string());
        }
        if self.trade_history_seconds <= 0.0 {
            return Err("Trade history window must be greater than 0".to_string());
        }
        if self.cooldown_seconds < 0.0 {
            return Err("Cooldown cannot be negative".to_string());
        }
        if self.liquidity_sweep_min_levels == 0 {
            return Err("Sweep level minimum must be at least 1".to_string());
        }
        if self.liquidity_sweep_time_ms <= 0 {
            return Err("Sweep time window must be greater than 0".to_string());
        }
        if self.min_sweep_notional < Decimal::ZERO
            || self.min_trade_confirm_notional < Decimal::ZERO
        {
            return Err("Notional gates cannot be negative".to_string());
        }
        if self.min_absorption_ratio <= 0.0 {
            return Err("Absorption ratio must be greater than 0".to_string());
        }
        if self.max_orderbook_levels == 0 {
            return Err("Order book level cap must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn read_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring unparseable env override {}={}", key, raw),
        }
    }
}
