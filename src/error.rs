//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` per categorizzare gli errori di un singolo file
//!   e quelli di setup
//! - Integra con `thiserror` per la conversione automatica da errori standard
//! - Gli orchestratori propagano con `anyhow`, aggiungendo il contesto
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, destinazione già presente)
//! - `Image`: Errori di decode/encode JPEG
//! - `Exif`: Blocco EXIF presente ma non leggibile
//! - `Date`: Data di scatto non utilizzabile (es. timestamp prima del 1970)
//! - `Setup`: Errori fatali prima dell'avvio dei worker
//! - `Validation`: Parametri di configurazione non validi
//!
//! ## Politica:
//! Gli errori di un singolo file non interrompono mai il batch: vengono
//! loggati, contati in `RunStats` e il worker passa al file successivo.
//! Solo `Setup` e `Validation` fanno terminare l'esecuzione.

/// Custom error types for the compression pipeline
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF metadata error: {0}")]
    Exif(#[from] exif::Error),

    #[error("Unusable capture date: {0}")]
    Date(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl CompressError {
    /// True when the error only says that the destination is already on disk
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CompressError::Io(e) if e.kind() == std::io::ErrorKind::AlreadyExists)
    }
}
