//! Stats poller: aggregate counters from `GET /api/stats` on a fixed cadence

use crate::api::Backend;
use crate::types::AppEvent;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

/// Poll aggregate counters: once immediately, then every `interval_ms`.
/// Non-overlapping; a failed poll keeps the last counters on screen.
pub async fn run_stats_poller(backend: Arc<dyn Backend>, interval_ms: u64, tx: UnboundedSender<AppEvent>) {
    log::info!("[stats] poller started - every {interval_ms}ms");
    loop {
        match backend.stats().await {
            Ok(stats) => {
                log::debug!("[stats] total={} blocked={}", stats.total, stats.blocked);
                if tx.send(AppEvent::Stats(stats)).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("[stats] poll failed: {e}"),
        }
        sleep(Duration::from_millis(interval_ms)).await;
    }
    log::info!("[stats] poller stopped");
}
