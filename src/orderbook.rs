//! Order book state management
//!
//! A single price-keyed ladder holds both sides: each level carries a bid
//! size and an ask size, and a level with both sizes zero is evicted. The
//! ladder is rebuilt from REST snapshots and advanced by validated diffs.

use crate::data::{BookSide, DepthDiff, DepthSnapshot};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Per-price sizes on both sides of the book
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookLevel {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BookLevel {
    fn is_empty(&self) -> bool {
        self.bid.is_zero() && self.ask.is_zero()
    }
}

/// Order book ladder for a single instrument
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Price -> sizes, keyed ascending
    levels: BTreeMap<Decimal, BookLevel>,
    /// Final update id of the last applied snapshot or diff
    pub last_update_id: u64,
    /// Soft level cap; eviction kicks in past twice this
    max_levels: usize,
}

impl OrderBook {
    pub fn new(max_levels: usize) -> Self {
        Self {
            levels: BTreeMap::new(),
            last_update_id: 0,
            max_levels,
        }
    }

    /// Rebuild the ladder from a full snapshot
    pub fn apply_snapshot(&mut self, snapshot: &DepthSnapshot) {
        self.levels.clear();
        self.apply_side(BookSide::Bid, &snapshot.bids);
        self.apply_side(BookSide::Ask, &snapshot.asks);
        self.last_update_id = snapshot.last_update_id;
        self.evict_distant_levels();
    }

    /// Apply an incremental diff
    pub fn apply_diff(&mut self, diff: &DepthDiff) {
        self.apply_side(BookSide::Bid, &diff.bids);
        self.apply_side(BookSide::Ask, &diff.asks);
        self.last_update_id = diff.final_update_id;
        self.evict_distant_levels();
    }

    /// Apply (price, size) changes to one side
    ///
    /// A zero size removes that side's contribution; the level itself is
    /// deleted once both sides are zero.
    fn apply_side(&mut self, side: BookSide, changes: &[(Decimal, Decimal)]) {
        for &(price, size) in changes {
            if size.is_zero() {
                if let Some(level) = self.levels.get_mut(&price) {
                    match side {
                        BookSide::Bid => level.bid = Decimal::ZERO,
                        BookSide::Ask => level.ask = Decimal::ZERO,
                    }
                    if level.is_empty() {
                        self.levels.remove(&price);
                    }
                }
            } else {
                let level = self.levels.entry(price).or_default();
                match side {
                    BookSide::Bid => level.bid = size,
                    BookSide::Ask => level.ask = size,
                }
            }
        }
    }

    /// Highest price with a non-zero bid size
    pub fn best_bid(&self) -> Option<Decimal> {
        self.levels
            .iter()
            .rev()
            .find(|(_, level)| level.bid > Decimal::ZERO)
            .map(|(price, _)| *price)
    }

    /// Lowest price with a non-zero ask size
    pub fn best_ask(&self) -> Option<Decimal> {
        self.levels
            .iter()
            .find(|(_, level)| level.ask > Decimal::ZERO)
            .map(|(price, _)| *price)
    }

    /// Mid price, defined only when both sides are populated
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Sum of the n best sizes on one side
    pub fn depth(&self, side: BookSide, n_levels: usize) -> Decimal {
        match side {
            BookSide::Bid => self
                .levels
                .iter()
                .rev()
                .filter(|(_, level)| level.bid > Decimal::ZERO)
                .take(n_levels)
                .map(|(_, level)| level.bid)
                .sum(),
            BookSide::Ask => self
                .levels
                .iter()
                .filter(|(_, level)| level.ask > Decimal::ZERO)
                .take(n_levels)
                .map(|(_, level)| level.ask)
                .sum(),
        }
    }

    /// Copy of the current state, cheap enough to diff against later
    pub fn snapshot_copy(&self) -> Self {
        self.clone()
    }

    /// Iterate levels ascending by price
    pub fn levels(&self) -> impl Iterator<Item = (&Decimal, &BookLevel)> {
        self.levels.iter()
    }

    pub fn level(&self, price: &Decimal) -> Option<&BookLevel> {
        self.levels.get(price)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.last_update_id = 0;
    }

    /// Drop levels further than 1% from mid once the ladder exceeds twice
    /// the configured cap. Skipped while mid price is undefined.
    fn evict_distant_levels(&mut self) {
        if self.levels.len() <= self.max_levels * 2 {
            return;
        }
        let Some(mid) = self.mid_price() else {
            return;
        };
        let max_distance = mid * Decimal::new(1, 2);
        self.levels
            .retain(|price, _| (*price - mid).abs() <= max_distance);
    }
}
