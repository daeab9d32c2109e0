//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `jpeg_quality`: Qualità JPEG del re-encode (1-100, default: 50)
//! - `workers`: Numero di worker paralleli (default: 4)
//! - `output_dir_name`: Nome della directory di output dentro la sorgente (default: "IMG_compressed")
//! - `preserve_metadata`: Ricopia il blocco EXIF originale nel file compresso (default: true)
//! - `align_timestamps`: Allinea la mtime del file di output alla data di scatto (default: true)
//! - `progress_bar_width`: Larghezza della barra di progresso (default: 40)
//! - `poll_interval_ms`: Intervallo di polling del monitor (default: 1000)
//! - `progress_timeout_secs`: Limite massimo del monitor (default: None = nessun limite)
//!
//! ## Validazione:
//! - Controlla che jpeg_quality sia 1-100
//! - Controlla che workers, progress_bar_width e poll_interval_ms siano > 0
//! - Controlla che output_dir_name sia un singolo componente di path
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     jpeg_quality: 60,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::CompressError;

/// Configuration for a compression run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality used for the re-encode (1-100)
    pub jpeg_quality: u8,
    /// Number of parallel workers
    pub workers: usize,
    /// Name of the output directory created inside the source directory
    pub output_dir_name: String,
    /// Re-attach the original EXIF block to compressed files
    pub preserve_metadata: bool,
    /// Set the output modification time to the resolved capture date
    pub align_timestamps: bool,
    /// Width of the progress bar in characters
    pub progress_bar_width: u16,
    /// Milliseconds between two samples of the output tree
    pub poll_interval_ms: u64,
    /// Upper bound for the progress monitor (None = until done)
    pub progress_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jpeg_quality: 50,
            workers: 4,
            output_dir_name: "IMG_compressed".to_string(),
            preserve_metadata: true,
            align_timestamps: true,
            progress_bar_width: 40,
            poll_interval_ms: 1000,
            progress_timeout_secs: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), CompressError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(CompressError::Validation("JPEG quality must be between 1 and 100".to_string()));
        }

        if self.workers == 0 {
            return Err(CompressError::Validation("Number of workers must be greater than 0".to_string()));
        }

        if self.progress_bar_width == 0 {
            return Err(CompressError::Validation("Progress bar width must be greater than 0".to_string()));
        }

        if self.poll_interval_ms == 0 {
            return Err(CompressError::Validation("Poll interval must be greater than 0".to_string()));
        }

        // Il nome di output deve restare dentro la directory sorgente
        let mut components = Path::new(&self.output_dir_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(CompressError::Validation(format!(
                    "Output directory name must be a single path component: {:?}",
                    self.output_dir_name
                )));
            }
        }

        Ok(())
    }

    /// Output root for a given source directory
    pub fn output_root(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.output_dir_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_timeout(&self) -> Option<Duration> {
        self.progress_timeout_secs.map(Duration::from_secs)
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
