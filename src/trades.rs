//! Time-windowed trade buffer

use crate::data::Trade;
use std::collections::VecDeque;

/// Bounded buffer of recent trades
///
/// Capacity-bounded like a ring; entries older than the retention window
/// are evicted on every push so reads only ever scan live data.
#[derive(Debug)]
pub struct TradeBuffer {
    trades: VecDeque<Trade>,
    capacity: usize,
    history_ms: i64,
}

impl TradeBuffer {
    pub fn new(capacity: usize, history_secs: f64) -> Self {
        Self {
            trades: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            history_ms: (history_secs * 1000.0) as i64,
        }
    }

    /// Append a trade and evict anything past capacity or retention
    pub fn push(&mut self, trade: Trade, now_ms: i64) {
        self.trades.push_back(trade);

        while self.trades.len() > self.capacity {
            self.trades.pop_front();
        }

        let cutoff = now_ms - self.history_ms;
        while self
            .trades
            .front()
            .map(|t| t.timestamp_ms < cutoff)
            .unwrap_or(false)
        {
            self.trades.pop_front();
        }
    }

    /// Trades with a timestamp inside the trailing window ending at `now_ms`
    pub fn in_window(&self, now_ms: i64, window_ms: i64) -> impl Iterator<Item = &Trade> {
        let cutoff = now_ms - window_ms;
        self.trades
            .iter()
            .filter(move |t| t.timestamp_ms >= cutoff && t.timestamp_ms <= now_ms)
    }

    /// Trades strictly newer than the cutoff
    pub fn newer_than(&self, cutoff_ms: i64) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(move |t| t.timestamp_ms > cutoff_ms)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
