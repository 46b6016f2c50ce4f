//! # Binance Order Flow
//!
//! A real-time order-flow analysis engine for a single Binance spot
//! instrument. It keeps an incremental order book synchronized against a
//! REST snapshot, derives short-horizon microstructure features (signed
//! volume delta, liquidity sweeps, absorption, volatility regime), and
//! emits directional BUY/SELL signals with confidence scores.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Depth/trade WebSocket streams | [`connector`] |
//! | REST snapshot + retry | [`snapshot`] |
//! | `U`/`u` sequence validation | [`sync`] |
//! | Price ladder | [`orderbook`] |
//! | Delta / sweeps / absorption / regime | [`analyzer`] |
//! | Cooldown + regime-gated signals | [`signal`] |
//! | Orchestration and status records | [`bot`] |
//!
//! ## Quick Start
//!
//! ```rust
//! use binance_orderflow::prelude::*;
//!
//! // Defaults target ETHUSDT; everything is overridable via env vars
//! let config = BotConfig::default();
//! assert_eq!(config.symbol, "ETHUSDT");
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Offline use
//!
//! The analyzer and signal generator are plain synchronous state machines
//! driven by explicit timestamps, so they can be exercised without any
//! network transport:
//!
//! ```rust
//! use binance_orderflow::analyzer::FlowAnalyzer;
//! use binance_orderflow::config::BotConfig;
//!
//! let analyzer = FlowAnalyzer::new(BotConfig::default());
//! assert!(analyzer.book().is_empty());
//! ```

pub mod analyzer;
pub mod bot;
pub mod config;
pub mod connection;
pub mod connector;
pub mod data;
pub mod error;
pub mod events;
pub mod orderbook;
pub mod parser;
pub mod retry;
pub mod signal;
pub mod snapshot;
pub mod sync;
pub mod trades;

pub use analyzer::FlowAnalyzer;
pub use bot::{OrderFlowBot, ShutdownHandle};
pub use config::BotConfig;
pub use connector::BinanceConnector;
pub use data::*;
pub use error::{BotError, ConnectionError, ParseError, SnapshotError};
pub use events::{FeedEvent, LogSink, OutputSink};
pub use orderbook::{BookLevel, OrderBook};
pub use signal::SignalGenerator;
pub use sync::{DiffOutcome, StreamSynchronizer, SyncState};

/// Prelude - minimal public API surface
///
/// Import with: `use binance_orderflow::prelude::*;`
pub mod prelude {
    pub use crate::bot::{OrderFlowBot, ShutdownHandle};
    pub use crate::config::BotConfig;
    pub use crate::data::{
        MarketState, Signal, SignalPattern, SignalType, StatusRecord, Trade, TradeSide,
        VolatilityRegime,
    };
    pub use crate::error::BotError;
    pub use crate::events::{LogSink, OutputSink};
}

/// Initialize logging for the engine
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
