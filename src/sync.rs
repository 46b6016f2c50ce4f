//! Diff-stream synchronization
//!
//! The depth stream is only consistent when chained onto a REST snapshot:
//! the first applicable diff must straddle the snapshot id
//! (`U <= lastUpdateId + 1 <= u`) and every later diff must extend the
//! book contiguously (`U == last_update_id + 1`). Diffs arriving before
//! the snapshot are buffered and drained once it lands; repeated gaps
//! force a fresh snapshot.

use crate::data::{DepthDiff, DepthSnapshot, SyncStats};
use std::collections::VecDeque;

/// Bound on the pre-snapshot diff buffer; oldest entries are dropped
const PENDING_BUFFER_CAPACITY: usize = 1_000;

/// Consecutive sequence gaps tolerated before a re-snapshot
const MAX_DESYNCS: u32 = 3;

/// Synchronizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No snapshot yet; incoming diffs are buffered
    Unsynced,
    /// Snapshot applied; waiting for the first diff that straddles it
    Buffering,
    /// Chained; diffs must be contiguous
    Synced,
}

/// What the caller should do with a diff it handed in
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// Held back until a snapshot arrives
    Buffered,
    /// Stale or not yet bridging the snapshot; dropped
    Skipped,
    /// Extends the book; apply it
    Apply(DepthDiff),
    /// Too many gaps; clear the book and request a fresh snapshot
    ResyncRequired,
}

/// Result of draining the pending buffer against a new snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDrain {
    /// Buffered diffs that chain onto the snapshot, in order
    pub applicable: Vec<DepthDiff>,
    /// A gap sequence inside the buffer already forced another resync
    pub resync_required: bool,
}

/// Sequencing state machine for the depth-diff stream
#[derive(Debug)]
pub struct StreamSynchronizer {
    state: SyncState,
    last_update_id: u64,
    desync_count: u32,
    pending: VecDeque<DepthDiff>,
    resyncs: u64,
}

impl StreamSynchronizer {
    pub fn new() -> Self {
        Self {
            state: SyncState::Unsynced,
            last_update_id: 0,
            desync_count: 0,
            pending: VecDeque::new(),
            resyncs: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            synced: self.is_synced(),
            last_update_id: self.last_update_id,
            desync_count: self.desync_count,
        }
    }

    /// Total re-snapshots forced by gap sequences
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Transport reconnected: discard everything and await a snapshot
    pub fn reset(&mut self) {
        self.state = SyncState::Unsynced;
        self.pending.clear();
        self.desync_count = 0;
    }

    /// Handle an incoming diff
    pub fn on_diff(&mut self, diff: DepthDiff) -> DiffOutcome {
        if self.state == SyncState::Unsynced {
            if self.pending.len() >= PENDING_BUFFER_CAPACITY {
                self.pending.pop_front();
            }
            self.pending.push_back(diff);
            return DiffOutcome::Buffered;
        }
        self.validate(diff)
    }

    /// Handle a snapshot: reset the chain anchor and drain the buffer
    pub fn on_snapshot(&mut self, snapshot: &DepthSnapshot) -> SnapshotDrain {
        self.last_update_id = snapshot.last_update_id;
        self.desync_count = 0;
        self.state = SyncState::Buffering;

        let buffered: Vec<DepthDiff> = self.pending.drain(..).collect();
        tracing::info!(
            last_update_id = self.last_update_id,
            buffered = buffered.len(),
            "Snapshot anchored, draining buffered diffs"
        );

        let mut applicable = Vec::new();
        for diff in buffered {
            match self.validate(diff) {
                DiffOutcome::Apply(d) => applicable.push(d),
                DiffOutcome::ResyncRequired => {
                    return SnapshotDrain {
                        applicable,
                        resync_required: true,
                    };
                }
                _ => {}
            }
        }

        SnapshotDrain {
            applicable,
            resync_required: false,
        }
    }

    fn validate(&mut self, diff: DepthDiff) -> DiffOutcome {
        match self.state {
            SyncState::Unsynced => DiffOutcome::Skipped,
            SyncState::Buffering => {
                let next = self.last_update_id + 1;
                if diff.first_update_id <= next && next <= diff.final_update_id {
                    tracing::info!(
                        first_update_id = diff.first_update_id,
                        final_update_id = diff.final_update_id,
                        "Order book sync established"
                    );
                    self.state = SyncState::Synced;
                    self.last_update_id = diff.final_update_id;
                    self.desync_count = 0;
                    DiffOutcome::Apply(diff)
                } else {
                    // Stale (u <= lastUpdateId) or not yet bridging
                    DiffOutcome::Skipped
                }
            }
            SyncState::Synced => {
                let expected = self.last_update_id + 1;
                if diff.first_update_id == expected {
                    self.desync_count = 0;
                    self.last_update_id = diff.final_update_id;
                    DiffOutcome::Apply(diff)
                } else {
                    self.desync_count += 1;
                    tracing::warn!(
                        expected,
                        got = diff.first_update_id,
                        desync_count = self.desync_count,
                        "Sequence gap in depth stream"
                    );

                    if self.desync_count >= MAX_DESYNCS {
                        tracing::error!("Repeated sequence gaps, re-snapshotting");
                        self.state = SyncState::Unsynced;
                        self.desync_count = 0;
                        self.pending.clear();
                        self.resyncs += 1;
                        DiffOutcome::ResyncRequired
                    } else {
                        // Tolerated gap: keep advancing so an isolated
                        // glitch does not stall the chain
                        self.last_update_id = diff.final_update_id;
                        DiffOutcome::Apply(diff)
                    }
                }
            }
        }
    }
}

impl Default for StreamSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(first: u64, last: u64) -> DepthDiff {
        DepthDiff {
            first_update_id: first,
            final_update_id: last,
            bids: vec![],
            asks: vec![],
        }
    }

    fn snapshot(id: u64) -> DepthSnapshot {
        DepthSnapshot {
            last_update_id: id,
            bids: vec![],
            asks: vec![],
        }
    }

    #[test]
    fn test_snapshot_then_in_order_diff() {
        let mut sync = StreamSynchronizer::new();
        let drain = sync.on_snapshot(&snapshot(100));
        assert!(drain.applicable.is_empty());

        let outcome = sync.on_diff(diff(101, 103));
        assert_eq!(outcome, DiffOutcome::Apply(diff(101, 103)));
        assert!(sync.is_synced());
        assert_eq!(sync.stats().last_update_id, 103);
    }

    #[test]
    fn test_buffered_diffs_span_snapshot() {
        let mut sync = StreamSynchronizer::new();

        assert_eq!(sync.on_diff(diff(98, 99)), DiffOutcome::Buffered);
        assert_eq!(sync.on_diff(diff(100, 102)), DiffOutcome::Buffered);
        assert_eq!(sync.on_diff(diff(103, 104)), DiffOutcome::Buffered);

        let drain = sync.on_snapshot(&snapshot(101));
        assert!(!drain.resync_required);
        // First is stale, second straddles 102, third chains
        assert_eq!(drain.applicable, vec![diff(100, 102), diff(103, 104)]);
        assert!(sync.is_synced());
        assert_eq!(sync.stats().last_update_id, 104);
    }

    #[test]
    fn test_straddling_diff_establishes_sync() {
        let mut sync = StreamSynchronizer::new();
        sync.on_snapshot(&snapshot(101));

        // Stale diffs are skipped while waiting for the bridge
        assert_eq!(sync.on_diff(diff(98, 99)), DiffOutcome::Skipped);
        assert_eq!(sync.on_diff(diff(100, 101)), DiffOutcome::Skipped);
        assert!(!sync.is_synced());

        assert_eq!(sync.on_diff(diff(100, 102)), DiffOutcome::Apply(diff(100, 102)));
        assert!(sync.is_synced());
    }

    #[test]
    fn test_three_gaps_force_resync() {
        let mut sync = StreamSynchronizer::new();
        sync.on_snapshot(&snapshot(199));
        assert_eq!(sync.on_diff(diff(200, 200)), DiffOutcome::Apply(diff(200, 200)));

        // First two gaps are tolerated and applied
        assert_eq!(sync.on_diff(diff(205, 209)), DiffOutcome::Apply(diff(205, 209)));
        assert_eq!(sync.stats().desync_count, 1);
        assert_eq!(sync.on_diff(diff(214, 215)), DiffOutcome::Apply(diff(214, 215)));
        assert_eq!(sync.stats().desync_count, 2);

        // Third gap forces a re-snapshot
        assert_eq!(sync.on_diff(diff(220, 221)), DiffOutcome::ResyncRequired);
        assert!(!sync.is_synced());
        assert_eq!(sync.state(), SyncState::Unsynced);
        assert_eq!(sync.resyncs(), 1);
    }

    #[test]
    fn test_good_sequence_resets_desync_count() {
        let mut sync = StreamSynchronizer::new();
        sync.on_snapshot(&snapshot(99));
        sync.on_diff(diff(100, 100));

        sync.on_diff(diff(105, 106)); // gap 1
        sync.on_diff(diff(110, 111)); // gap 2
        assert_eq!(sync.stats().desync_count, 2);

        // Contiguous diff clears the count
        sync.on_diff(diff(112, 113));
        assert_eq!(sync.stats().desync_count, 0);
        assert!(sync.is_synced());
    }

    #[test]
    fn test_reset_discards_pending() {
        let mut sync = StreamSynchronizer::new();
        sync.on_diff(diff(1, 2));
        sync.on_diff(diff(3, 4));
        sync.reset();

        let drain = sync.on_snapshot(&snapshot(0));
        assert!(drain.applicable.is_empty());
    }

    #[test]
    fn test_pending_buffer_drops_oldest() {
        let mut sync = StreamSynchronizer::new();
        for i in 0..(PENDING_BUFFER_CAPACITY as u64 + 10) {
            sync.on_diff(diff(i + 1, i + 1));
        }
        assert_eq!(sync.pending.len(), PENDING_BUFFER_CAPACITY);
        // Oldest were dropped, newest survive
        assert_eq!(sync.pending.front().unwrap().first_update_id, 11);
    }
}
