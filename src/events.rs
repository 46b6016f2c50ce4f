//! Feed events and the output boundary
//!
//! The two stream tasks produce typed [`FeedEvent`]s onto a single
//! bounded channel; one consumer task owns all mutable engine state, so
//! per-stream ordering is preserved without locks. Downstream consumers
//! (terminal UI, CSV logger, ...) sit behind the [`OutputSink`] trait.

use crate::{
    data::{BookUpdate, Signal, StatusRecord, Trade},
    error::SnapshotError,
};

/// Event produced by the connector's stream tasks
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Snapshot or applicable diff, already sequence-validated
    Book(BookUpdate),
    /// Canonical trade from the trade stream
    Trade(Trade),
    /// Initial snapshot could not be fetched within the retry budget
    Fatal(SnapshotError),
}

/// Consumer of signal and status records
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    async fn on_signal(&self, signal: &Signal);
    async fn on_status(&self, status: &StatusRecord);
    fn name(&self) -> &str;
}

/// Default sink that writes records to the tracing log
pub struct LogSink;

#[async_trait::async_trait]
impl OutputSink for LogSink {
    async fn on_signal(&self, signal: &Signal) {
        tracing::info!(
            signal_type = %signal.signal_type,
            price = %signal.price,
            confidence = signal.confidence,
            delta = %signal.delta,
            volatility = %signal.volatility,
            reasons = signal.reasons.join(" | "),
            "SIGNAL"
        );
    }

    async fn on_status(&self, status: &StatusRecord) {
        tracing::info!("{}", status);
        if let Some(stats) = &status.signal_stats {
            tracing::info!(
                total = stats.total_signals,
                buys = stats.buy_signals,
                sells = stats.sell_signals,
                avg_confidence = %format!("{:.1}", stats.avg_confidence),
                filtered = stats.signals_filtered,
                filter_rate = %format!("{:.1}%", stats.filter_rate),
                "Signal statistics"
            );
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
