//! Bot orchestrator
//!
//! Owns the single consumer task: drains the feed channel, keeps the
//! analyzer and signal generator in step, and pushes signal and status
//! records to the output sink. Trades drive signal evaluation; book
//! updates drive periodic status reporting.

use crate::{
    analyzer::FlowAnalyzer,
    config::BotConfig,
    connector::BinanceConnector,
    data::{BookUpdate, StatusRecord, Trade},
    error::BotError,
    events::{FeedEvent, OutputSink},
    signal::SignalGenerator,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Feed channel bound shared by both producer tasks
const FEED_CHANNEL_CAPACITY: usize = 1_024;

/// Book updates between periodic status records
const STATUS_EVERY_UPDATES: u64 = 100;

/// Triggers a graceful stop of a running bot
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// Order-flow bot wiring connector, analyzer, signal generator and sink
pub struct OrderFlowBot {
    config: BotConfig,
    analyzer: FlowAnalyzer,
    signals: SignalGenerator,
    sink: Arc<dyn OutputSink>,
    shutdown: Arc<Notify>,
    start_ms: i64,
    orderbook_updates: u64,
    trade_count: u64,
}

impl OrderFlowBot {
    pub fn new(config: BotConfig, sink: Arc<dyn OutputSink>) -> Result<Self, BotError> {
        config.validate().map_err(BotError::Configuration)?;

        Ok(Self {
            analyzer: FlowAnalyzer::new(config.clone()),
            signals: SignalGenerator::new(config.clone()),
            config,
            sink,
            shutdown: Arc::new(Notify::new()),
            start_ms: 0,
            orderbook_updates: 0,
            trade_count: 0,
        })
    }

    /// Handle for requesting a graceful stop from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.shutdown),
        }
    }

    /// Run until shutdown or an unrecoverable snapshot failure
    pub async fn run(mut self) -> Result<(), BotError> {
        self.start_ms = chrono::Utc::now().timestamp_millis();

        tracing::info!(
            symbol = %self.config.symbol,
            exchange = %self.config.exchange,
            delta_window_secs = self.config.delta_window_seconds,
            cooldown_secs = self.config.cooldown_seconds,
            "Order flow bot starting"
        );

        let (tx, mut rx) = mpsc::channel::<FeedEvent>(FEED_CHANNEL_CAPACITY);
        let connector = BinanceConnector::new(self.config.clone(), tx);
        let handles = connector.start();
        let shutdown = Arc::clone(&self.shutdown);

        let result = loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(FeedEvent::Book(update)) => self.on_book_update(&connector, &update).await,
                    Some(FeedEvent::Trade(trade)) => self.on_trade(&connector, trade).await,
                    Some(FeedEvent::Fatal(e)) => break Err(BotError::Snapshot(e)),
                    None => break Err(BotError::ChannelClosed),
                },
                _ = shutdown.notified() => {
                    tracing::info!("Shutdown requested");
                    break Ok(());
                }
            }
        };

        connector.stop();
        handles.abort();
        self.emit_status(&connector, true).await;
        tracing::info!("Order flow bot stopped");
        result
    }

    async fn on_book_update(&mut self, connector: &BinanceConnector, update: &BookUpdate) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.analyzer.apply_book_update(update, now_ms);
        self.analyzer.set_synced(connector.is_synced());
        self.orderbook_updates += 1;

        if self.orderbook_updates % STATUS_EVERY_UPDATES == 0 {
            self.emit_status(connector, false).await;
        }
    }

    async fn on_trade(&mut self, connector: &BinanceConnector, trade: Trade) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.analyzer.set_synced(connector.is_synced());
        self.analyzer.add_trade(trade, now_ms);
        self.trade_count += 1;

        let state = self.analyzer.market_state(now_ms);
        if let Some(signal) = self.signals.generate(&state) {
            self.sink.on_signal(&signal).await;
        }
    }

    async fn emit_status(&self, connector: &BinanceConnector, include_signal_stats: bool) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let status = StatusRecord {
            timestamp_ms: now_ms,
            symbol: self.config.symbol.clone(),
            synced: connector.sync_stats().synced,
            uptime_secs: (now_ms - self.start_ms) as f64 / 1000.0,
            orderbook_updates: self.orderbook_updates,
            trades: self.trade_count,
            delta: self.analyzer.delta().delta,
            volatility: self.analyzer.volatility(),
            signal_stats: include_signal_stats.then(|| self.signals.statistics()),
        };
        self.sink.on_status(&status).await;
    }
}
