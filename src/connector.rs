//! Binance connector
//!
//! Drives the depth-diff and trade WebSocket streams as two producer
//! tasks feeding one bounded event channel. The depth task owns the
//! stream synchronizer: diffs arriving before the snapshot are buffered,
//! the snapshot fetch runs concurrently with frame reading, and repeated
//! sequence gaps or a reconnect force a fresh snapshot.

use crate::{
    config::BotConfig,
    connection::{self, CONNECT_TIMEOUT, STREAM_RECONNECT_DELAY},
    data::{BookUpdate, DepthSnapshot, SyncStats},
    error::SnapshotError,
    events::FeedEvent,
    parser::BinanceDataParser,
    snapshot::SnapshotFetcher,
    sync::{DiffOutcome, StreamSynchronizer},
};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

/// Spawned stream-task handles
pub struct ConnectorHandles {
    pub book: JoinHandle<()>,
    pub trades: JoinHandle<()>,
}

impl ConnectorHandles {
    pub fn abort(&self) {
        self.book.abort();
        self.trades.abort();
    }
}

/// WebSocket connector for one Binance spot instrument
pub struct BinanceConnector {
    config: BotConfig,
    events: mpsc::Sender<FeedEvent>,
    running: Arc<AtomicBool>,
    synchronizer: Arc<Mutex<StreamSynchronizer>>,
}

impl BinanceConnector {
    pub fn new(config: BotConfig, events: mpsc::Sender<FeedEvent>) -> Self {
        Self {
            config,
            events,
            running: Arc::new(AtomicBool::new(false)),
            synchronizer: Arc::new(Mutex::new(StreamSynchronizer::new())),
        }
    }

    /// Current synchronizer state for status reporting
    pub fn sync_stats(&self) -> SyncStats {
        self.synchronizer.lock().unwrap().stats()
    }

    pub fn is_synced(&self) -> bool {
        self.synchronizer.lock().unwrap().is_synced()
    }

    /// Signal both stream loops to exit at their next frame boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Spawn the depth and trade stream tasks
    pub fn start(&self) -> ConnectorHandles {
        self.running.store(true, Ordering::SeqCst);

        let book = tokio::spawn(run_book_stream(
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.running),
            Arc::clone(&self.synchronizer),
        ));
        let trades = tokio::spawn(run_trade_stream(
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.running),
        ));

        ConnectorHandles { book, trades }
    }
}

type SnapshotFuture<'a> =
    Pin<Box<dyn Future<Output = Result<DepthSnapshot, SnapshotError>> + Send + 'a>>;

async fn run_book_stream(
    config: BotConfig,
    events: mpsc::Sender<FeedEvent>,
    running: Arc<AtomicBool>,
    synchronizer: Arc<Mutex<StreamSynchronizer>>,
) {
    let parser = BinanceDataParser::new();
    let fetcher = SnapshotFetcher::new(&config);

    while running.load(Ordering::SeqCst) {
        let ws = match connection::connect(&config.orderbook_ws, CONNECT_TIMEOUT).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, "Depth stream connect failed, retrying");
                sleep(STREAM_RECONNECT_DELAY).await;
                continue;
            }
        };
        let (mut write, mut read) = ws.split();

        // Fresh connection: discard any stale chain and re-anchor
        synchronizer.lock().unwrap().reset();
        let mut need_snapshot = true;
        let mut snapshot_fut: Option<SnapshotFuture<'_>> = None;

        loop {
            if !running.load(Ordering::SeqCst) {
                let _ = write.close().await;
                return;
            }
            if need_snapshot && snapshot_fut.is_none() {
                need_snapshot = false;
                snapshot_fut = Some(Box::pin(fetcher.fetch()));
            }

            tokio::select! {
                result = async { snapshot_fut.as_mut().expect("snapshot future").await }, if snapshot_fut.is_some() => {
                    snapshot_fut = None;
                    match result {
                        Ok(snapshot) => {
                            let drain = synchronizer.lock().unwrap().on_snapshot(&snapshot);
                            need_snapshot = drain.resync_required;
                            if events.send(FeedEvent::Book(BookUpdate::Snapshot(snapshot))).await.is_err() {
                                return;
                            }
                            for diff in drain.applicable {
                                if events.send(FeedEvent::Book(BookUpdate::Diff(diff))).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Initial snapshot unrecoverable");
                            let _ = events.send(FeedEvent::Fatal(e)).await;
                            return;
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match parser.parse_diff(&text) {
                                Ok(diff) => {
                                    let outcome = synchronizer.lock().unwrap().on_diff(diff);
                                    match outcome {
                                        DiffOutcome::Apply(diff) => {
                                            if events.send(FeedEvent::Book(BookUpdate::Diff(diff))).await.is_err() {
                                                return;
                                            }
                                        }
                                        DiffOutcome::ResyncRequired => {
                                            need_snapshot = true;
                                        }
                                        DiffOutcome::Buffered | DiffOutcome::Skipped => {}
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Dropping malformed depth frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if write.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Depth stream closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Depth stream error");
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        if running.load(Ordering::SeqCst) {
            tracing::info!(
                delay_secs = STREAM_RECONNECT_DELAY.as_secs(),
                "Depth stream disconnected, reconnecting"
            );
            sleep(STREAM_RECONNECT_DELAY).await;
        }
    }
}

async fn run_trade_stream(
    config: BotConfig,
    events: mpsc::Sender<FeedEvent>,
    running: Arc<AtomicBool>,
) {
    let parser = BinanceDataParser::new();

    while running.load(Ordering::SeqCst) {
        let ws = match connection::connect(&config.trades_ws, CONNECT_TIMEOUT).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, "Trade stream connect failed, retrying");
                sleep(STREAM_RECONNECT_DELAY).await;
                continue;
            }
        };
        let (mut write, mut read) = ws.split();
        tracing::info!("Trade stream connected");

        while let Some(msg) = read.next().await {
            if !running.load(Ordering::SeqCst) {
                let _ = write.close().await;
                return;
            }
            match msg {
                Ok(Message::Text(text)) => match parser.parse_trade(&text) {
                    Ok(trade) => {
                        if events.send(FeedEvent::Trade(trade)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping malformed trade frame");
                    }
                },
                Ok(Message::Ping(data)) => {
                    if write.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Trade stream closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Trade stream error");
                    break;
                }
            }
        }

        if running.load(Ordering::SeqCst) {
            tracing::info!(
                delay_secs = STREAM_RECONNECT_DELAY.as_secs(),
                "Trade stream disconnected, reconnecting"
            );
            sleep(STREAM_RECONNECT_DELAY).await;
        }
    }
}
