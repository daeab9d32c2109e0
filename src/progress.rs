//! # Progress Rendering and Statistics Module
//!
//! Questo modulo gestisce la barra di progresso e le statistiche della run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: barra `indicatif` a larghezza fissa; la posizione è il
//!   numero di file trovati su disco, la lunghezza il totale atteso
//! - `RunStats`: contatori per file compressi, copiati, saltati e falliti
//!
//! ## Visual feedback:
//! ```text
//! Progress: [------------------->                    ] 50 % (5/10)
//! ```
//!
//! ## Statistiche tracciate:
//! - **compressed**: file ri-codificati a qualità ridotta
//! - **copied**: file copiati byte per byte (target ambigui)
//! - **skipped**: destinazione già presente (run idempotente)
//! - **failed**: nomi dei file non elaborati e relativo errore
//! - **bytes_written**: byte totali scritti nell'albero di output

use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::pipeline::materializer::Outcome;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};

/// Renders the polling progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(expected_total: u64, width: u16) -> Self {
        let bar = ProgressBar::new(expected_total);

        let template = format!("Progress: [{{bar:{}}}] {{percent}} % ({{pos}}/{{len}}) {{msg}}", width);
        let style = ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("-> ");
        bar.set_style(style);

        Self { bar }
    }

    /// Hidden bar, for tests and non-interactive runs
    pub fn hidden(expected_total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(expected_total);
        Self { bar }
    }

    /// Sets the current number of output files found on disk
    pub fn set_current(&self, current: u64) {
        self.bar.set_position(current);
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Leaves the bar where it is, used when the total is never reached
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// Statistics for a compression run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub compressed: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
    pub bytes_written: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one file and logs it
    pub fn record(&mut self, file_name: &str, result: Result<Outcome, CompressError>) {
        match result {
            Ok(Outcome::Compressed { destination, bytes }) => {
                debug!("[OK] {} -> {} ({})", file_name, destination.display(), FileManager::format_size(bytes));
                self.compressed += 1;
                self.bytes_written += bytes;
            }
            Ok(Outcome::Copied { destination, bytes }) => {
                debug!("[COPY] {} -> {}", file_name, destination.display());
                self.copied += 1;
                self.bytes_written += bytes;
            }
            Ok(Outcome::Skipped { destination }) => {
                debug!("[SKIP] {}: {} already exists", file_name, destination.display());
                self.skipped += 1;
            }
            Err(e) => {
                error!("[ERROR] {}: {}", file_name, e);
                self.failed.push((file_name.to_string(), e.to_string()));
            }
        }
    }

    pub fn merge(&mut self, other: RunStats) {
        self.compressed += other.compressed;
        self.copied += other.copied;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
        self.bytes_written += other.bytes_written;
    }

    pub fn files_processed(&self) -> usize {
        self.compressed + self.copied + self.skipped + self.failed.len()
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Compressed: {} | Copied: {} | Skipped: {} | Failed: {} | Written: {}",
            self.files_processed(),
            self.compressed,
            self.copied,
            self.skipped,
            self.failed.len(),
            FileManager::format_size(self.bytes_written)
        )
    }
}
