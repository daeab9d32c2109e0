//! # Pipeline Module
//!
//! Pipeline di compressione divisa in sottomoduli:
//! - `batch_compressor`: orchestratore principale (piano, worker, monitor, Ctrl-C)
//! - `materializer`: worker per singoli file (compressione o copia)
//! - `partitioner`: distribuzione a strisce dei file tra i worker
//! - `path_resolver`: calcolo centralizzato dei path di output
//! - `progress_monitor`: polling dell'albero di output e barra di progresso

pub mod batch_compressor;
pub mod materializer;
pub mod partitioner;
pub mod path_resolver;
pub mod progress_monitor;

pub use batch_compressor::{BatchCompressor, RunPlan, RunReport};
pub use materializer::{Materializer, Outcome};
pub use path_resolver::{OutputKind, PathResolver};
pub use progress_monitor::{MonitorExit, ProgressMonitor};

use tokio::sync::broadcast;
use tracing::debug;

/// Cooperative stop flag checked by workers between files.
/// Once a stop has been observed it stays set.
pub struct StopSignal {
    receiver: broadcast::Receiver<()>,
    stopped: bool,
}

impl StopSignal {
    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self { receiver, stopped: false }
    }

    /// Controlla se è stato ricevuto un segnale di stop
    pub fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }

        self.stopped = match self.receiver.try_recv() {
            Ok(_) => {
                debug!("Stop signal received, finishing current file only");
                true
            }
            Err(broadcast::error::TryRecvError::Empty) => false,
            Err(broadcast::error::TryRecvError::Lagged(_)) => {
                debug!("Stop signal was lagged, stopping anyway");
                true
            }
            Err(broadcast::error::TryRecvError::Closed) => false,
        };
        self.stopped
    }
}
