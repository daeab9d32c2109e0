//! # JPEG Year Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override da CLI
//! - Avvio del compressore e mappatura del risultato sull'exit code
//!
//! ## Exit code:
//! - `0`: completato (anche con file falliti, elencati nel riepilogo)
//! - `130`: interrotto con Ctrl-C dopo il join dei worker
//! - `1`: errore fatale di setup
//!
//! ## Esempio di utilizzo:
//! ```bash
//! jpeg-year-compressor /path/to/photos --quality 60 --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use jpeg_year_compressor::{BatchCompressor, Config};

#[derive(Parser)]
#[command(name = "jpeg-year-compressor")]
#[command(about = "Compress JPEG photos into per-year folders")]
struct Args {
    /// Directory containing the photos
    #[arg(default_value = ".")]
    source_directory: PathBuf,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Name of the output directory created inside the source directory
    #[arg(long)]
    output_name: Option<String>,

    /// JSON configuration file; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop the progress monitor after this many seconds
    #[arg(long)]
    progress_timeout: Option<u64>,

    /// Do not copy EXIF metadata into the compressed files
    #[arg(long)]
    no_metadata: bool,

    /// Write the effective configuration to this JSON file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    async fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path).await?,
            None => Config::default(),
        };

        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(output_name) = &self.output_name {
            config.output_dir_name = output_name.clone();
        }
        if self.progress_timeout.is_some() {
            config.progress_timeout_secs = self.progress_timeout;
        }
        if self.no_metadata {
            config.preserve_metadata = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(if verbose { "debug" } else { "info" }),
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> Result<u8> {
    let config = args.load_config().await?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path).await?;
        info!("Configuration saved to {}", path.display());
        return Ok(0);
    }

    let compressor = BatchCompressor::new(&args.source_directory, config)?;
    let report = compressor.run().await?;

    if report.interrupted {
        println!("[ctrl+c -> bye bye]");
    }
    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
