use std::collections::VecDeque;
use std::sync::Arc;

use common::models::Detection;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::scan::ScanResult;

const ALERT_CHANNEL_CAPACITY: usize = 256;

struct Board {
    last_scan: Option<Arc<ScanResult>>,
    alerts: VecDeque<Detection>,
}

/// Point-in-time view handed out by `ScanState::view`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanView {
    pub last_scan: Option<Arc<ScanResult>>,
    pub alert_count: usize,
}

/// Shared scan output: the last-scan snapshot and the alert feed.
///
/// Both live behind one lock so a reader never sees a snapshot from one run
/// next to an alert count from another. The feed keeps at most `capacity`
/// alerts and drops the oldest first.
pub struct ScanState {
    board: RwLock<Board>,
    capacity: usize,
    alert_tx: broadcast::Sender<Detection>,
}

impl ScanState {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            board: RwLock::new(Board {
                last_scan: None,
                alerts: VecDeque::with_capacity(capacity.min(1_024)),
            }),
            capacity: capacity.max(1),
            alert_tx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Installs `result` as the last scan and appends its detections to the
    /// alert feed.
    pub async fn publish(&self, result: ScanResult) -> Arc<ScanResult> {
        let detections = result.detections();
        let snapshot = Arc::new(result);

        {
            let mut board = self.board.write().await;
            board.last_scan = Some(snapshot.clone());
            self.append(&mut board, &detections);
        }
        self.broadcast(detections);

        debug!(
            "Published scan with {} records",
            snapshot.results.len()
        );
        snapshot
    }

    /// Appends to the alert feed without replacing the last scan.
    pub async fn record_alerts(&self, detections: Vec<Detection>) {
        if detections.is_empty() {
            return;
        }
        {
            let mut board = self.board.write().await;
            self.append(&mut board, &detections);
        }
        debug!("Recorded {} out-of-band alerts", detections.len());
        self.broadcast(detections);
    }

    fn append(&self, board: &mut Board, detections: &[Detection]) {
        for detection in detections {
            if board.alerts.len() == self.capacity {
                board.alerts.pop_front();
            }
            board.alerts.push_back(detection.clone());
        }
    }

    fn broadcast(&self, detections: Vec<Detection>) {
        for detection in detections {
            // No subscribers is fine.
            let _ = self.alert_tx.send(detection);
        }
    }

    pub async fn view(&self) -> ScanView {
        let board = self.board.read().await;
        ScanView {
            last_scan: board.last_scan.clone(),
            alert_count: board.alerts.len(),
        }
    }

    pub async fn last_scan(&self) -> Option<Arc<ScanResult>> {
        self.board.read().await.last_scan.clone()
    }

    /// Newest first, at most `limit`.
    pub async fn recent_alerts(&self, limit: usize) -> Vec<Detection> {
        let board = self.board.read().await;
        board.alerts.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent alert for `symbol`, if any is still in the feed.
    pub async fn latest_for(&self, symbol: &str) -> Option<Detection> {
        let board = self.board.read().await;
        board
            .alerts
            .iter()
            .rev()
            .find(|d| d.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Detection> {
        self.alert_tx.subscribe()
    }
}
