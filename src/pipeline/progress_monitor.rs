//! # Progress Monitor Module
//!
//! Il progresso non viene riportato dai worker: il monitor conta i file
//! presenti nell'albero di output a intervalli regolari e aggiorna la barra.
//!
//! Termina quando:
//! - la percentuale raggiunge il 100%
//! - il pool di worker ha finito (dopo un ultimo campionamento)
//! - scade il timeout opzionale

use crate::file_manager::FileManager;
use crate::progress::ProgressManager;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Why the monitor stopped polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    Complete,
    PoolFinished,
    TimedOut,
}

/// `current * 100 / expected_total`, 100 when nothing is expected
pub fn percent(current: u64, expected_total: u64) -> u64 {
    if expected_total == 0 {
        return 100;
    }
    current.saturating_mul(100) / expected_total
}

pub struct ProgressMonitor {
    output_root: PathBuf,
    expected_total: u64,
    progress: ProgressManager,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl ProgressMonitor {
    pub fn new(
        output_root: PathBuf,
        expected_total: u64,
        progress: ProgressManager,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            output_root,
            expected_total,
            progress,
            poll_interval,
            timeout,
        }
    }

    /// Polls the output tree until one of the exit conditions holds.
    /// `done` flips to `true` once every worker has been joined.
    pub async fn watch(self, mut done: watch::Receiver<bool>) -> MonitorExit {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let pool_finished = *done.borrow();
            let current = self.sample().await;
            let pct = percent(current, self.expected_total);
            debug!("Progress sample: {}/{} ({}%)", current, self.expected_total, pct);

            if pct >= 100 {
                self.progress.finish("done");
                return MonitorExit::Complete;
            }
            if pool_finished {
                self.progress.abandon("workers finished");
                return MonitorExit::PoolFinished;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!("Progress monitor timed out at {}%", pct);
                self.progress.abandon("timed out");
                return MonitorExit::TimedOut;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = done.changed() => {
                    // A dropped sender means nobody will report completion.
                    if changed.is_err() {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
    }

    async fn sample(&self) -> u64 {
        let root = self.output_root.clone();
        let count = tokio::task::spawn_blocking(move || FileManager::count_files(&root))
            .await
            .unwrap_or(0);

        let current = count as u64;
        self.progress.set_current(current.min(self.expected_total));
        current
    }
}
