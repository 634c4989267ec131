use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strategy::{PatternScanner, ScanResult};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub scanning: bool,
    pub last_scan: Option<Arc<ScanResult>>,
    pub active_alert_count: usize,
}

enum Schedule {
    Stopped,
    Running {
        stop_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

/// On/off switch for the recurring background scan.
///
/// At most one schedule exists at a time. Stopping prevents any further
/// scan from starting but lets one that is already running finish.
pub struct ScanningController {
    scanner: PatternScanner,
    universe: Vec<String>,
    interval: Duration,
    schedule: Mutex<Schedule>,
}

impl ScanningController {
    pub fn new(scanner: PatternScanner, universe: Vec<String>, interval: Duration) -> Self {
        Self {
            scanner,
            universe,
            interval,
            schedule: Mutex::new(Schedule::Stopped),
        }
    }

    pub async fn start(&self) -> StartOutcome {
        let mut schedule = self.schedule.lock().await;
        if let Schedule::Running { handle, .. } = &*schedule {
            if !handle.is_finished() {
                return StartOutcome::AlreadyRunning;
            }
            warn!("Scan schedule had exited on its own, restarting");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_schedule(
            self.scanner.clone(),
            self.universe.clone(),
            self.interval,
            stop_rx,
        ));
        *schedule = Schedule::Running { stop_tx, handle };

        info!(
            "Scanning started: {} symbols every {:?}",
            self.universe.len(),
            self.interval
        );
        StartOutcome::Started
    }

    /// Returns whether a running schedule was stopped.
    pub async fn stop(&self) -> bool {
        let mut schedule = self.schedule.lock().await;
        match std::mem::replace(&mut *schedule, Schedule::Stopped) {
            Schedule::Running { stop_tx, handle } => {
                // The loop may already be gone; nothing left to signal then.
                let _ = stop_tx.send(true);
                drop(handle);
                info!("Scanning stopped");
                true
            }
            Schedule::Stopped => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.schedule.lock().await, Schedule::Running { handle, .. } if !handle.is_finished())
    }

    pub async fn status(&self) -> ControllerStatus {
        let scanning = self.is_running().await;
        let view = self.scanner.state().view().await;
        ControllerStatus {
            scanning,
            last_scan: view.last_scan,
            active_alert_count: view.alert_count,
        }
    }
}

async fn run_schedule(
    scanner: PatternScanner,
    universe: Vec<String>,
    every: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                let scanner = scanner.clone();
                let universe = universe.clone();
                let run = tokio::spawn(async move { scanner.run_scan(&universe).await });
                if let Err(e) = run.await {
                    error!("Scheduled scan aborted: {}", e);
                }
            }
        }
    }

    info!("Scan schedule exited");
}
