//! # JPEG Year Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `date_resolver`: Catena di fallback per la data di scatto (EXIF → nome → birth time → sentinella)
//! - `file_manager`: Listing e classificazione della directory sorgente
//! - `image_processor`: Codec JPEG, orientamento e blocco EXIF
//! - `pipeline`: Orchestratore, worker, partizionamento e monitor di progresso
//! - `platform`: Informazioni sulla piattaforma
//! - `progress`: Barra di progresso e statistiche
//!
//! ## Utilizzo:
//! ```ignore
//! use jpeg_year_compressor::{BatchCompressor, Config};
//!
//! let compressor = BatchCompressor::new(&path, Config::default())?;
//! let report = compressor.run().await?;
//! ```

pub mod config;
pub mod date_resolver;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod pipeline;
pub mod platform;
pub mod progress;

pub use config::Config;
pub use date_resolver::{DateResolver, ResolvedDate};
pub use error::CompressError;
pub use pipeline::{BatchCompressor, RunReport};
pub use progress::RunStats;
