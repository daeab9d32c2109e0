//! # Materializer Module
//!
//! Worker per la materializzazione di un singolo file sorgente nell'albero
//! di output. Nessuno stato condiviso: ogni worker ha la sua istanza clonata
//! e l'unica risorsa comune è il filesystem.
//!
//! ## `compress` (target `.jpg`):
//! 1. Decode dell'immagine (pixel + EXIF)
//! 2. Risoluzione della data: EXIF → nome file → birth time → sentinella
//! 3. Creazione idempotente di `IMG_{anno}`
//! 4. Skip se la destinazione esiste già
//! 5. Normalizzazione dell'orientamento, re-encode, scrittura
//! 6. Allineamento best-effort della mtime alla data di scatto
//!
//! ## `copy_only` (target ambigui tipo `photo.jpg.tmp`):
//! Nessun decode: data da nome file o birth time, copia byte per byte con
//! suffisso `_copy`, stessa politica di directory e skip.

use crate::config::Config;
use crate::date_resolver::{DateResolver, ResolvedDate};
use crate::error::CompressError;
use crate::image_processor::{discard_partial, ImageCodec};
use crate::pipeline::path_resolver::{OutputKind, PathResolver};
use crate::pipeline::StopSignal;
use crate::progress::RunStats;
use std::fs::{File, FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Result of materializing one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Compressed { destination: PathBuf, bytes: u64 },
    Copied { destination: PathBuf, bytes: u64 },
    Skipped { destination: PathBuf },
}

/// Worker per elaborazione singoli file
#[derive(Clone)]
pub struct Materializer {
    source_dir: PathBuf,
    output_root: PathBuf,
    codec: Arc<dyn ImageCodec>,
    jpeg_quality: u8,
    preserve_metadata: bool,
    align_timestamps: bool,
}

impl Materializer {
    pub fn new(source_dir: &Path, output_root: &Path, config: &Config, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            output_root: output_root.to_path_buf(),
            codec,
            jpeg_quality: config.jpeg_quality,
            preserve_metadata: config.preserve_metadata,
            align_timestamps: config.align_timestamps,
        }
    }

    /// Re-encodes one canonical `.jpg` file into its year bucket
    pub fn compress(&self, file_name: &str) -> Result<Outcome, CompressError> {
        let source = self.source_dir.join(file_name);

        let mut image = self.codec.decode(&source)?;
        let date = DateResolver::resolve(
            file_name,
            image.date_time_original(),
            DateResolver::creation_time(&source),
        );
        debug!("{}: capture date {}", file_name, date);

        let destination = match self.prepare_destination(&date, file_name, OutputKind::Compressed)? {
            Ok(destination) => destination,
            Err(skipped) => return Ok(skipped),
        };

        image.normalize_orientation();

        let bytes = match self
            .codec
            .encode_and_save(&image, &destination, self.jpeg_quality, self.preserve_metadata)
        {
            Ok(bytes) => bytes,
            Err(e) if e.is_already_exists() => return Ok(Outcome::Skipped { destination }),
            Err(e) => {
                // Il nome di destinazione appartiene solo a questo file sorgente
                discard_partial(&destination);
                return Err(e);
            }
        };

        self.align_timestamp(&destination, &date);
        Ok(Outcome::Compressed { destination, bytes })
    }

    /// Copies an ambiguous `.jpg`-like file unchanged into its year bucket
    pub fn copy_only(&self, file_name: &str) -> Result<Outcome, CompressError> {
        let source = self.source_dir.join(file_name);

        let date = DateResolver::resolve(file_name, None, DateResolver::creation_time(&source));
        debug!("{}: capture date {}", file_name, date);

        let destination = match self.prepare_destination(&date, file_name, OutputKind::Copy)? {
            Ok(destination) => destination,
            Err(skipped) => return Ok(skipped),
        };

        let bytes = match copy_new(&source, &destination) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(Outcome::Skipped { destination }),
            Err(e) => return Err(e.into()),
        };

        self.align_timestamp(&destination, &date);
        info!("Copied without compressing: {}", file_name);
        Ok(Outcome::Copied { destination, bytes })
    }

    /// Runs one kind of work over a list of targets until done or stopped
    pub fn run_chunk(&self, targets: &[String], kind: OutputKind, stop: &mut StopSignal) -> RunStats {
        let mut stats = RunStats::new();

        for file_name in targets {
            if stop.should_stop() {
                info!("Stop requested, leaving {} file(s) of this chunk untouched", targets.len() - stats.files_processed());
                break;
            }

            let result = match kind {
                OutputKind::Compressed => self.compress(file_name),
                OutputKind::Copy => self.copy_only(file_name),
            };
            stats.record(file_name, result);
        }

        stats
    }

    /// Computes the destination and creates its bucket.
    /// The inner `Err` carries a skip outcome when the destination is already there.
    fn prepare_destination(
        &self,
        date: &ResolvedDate,
        file_name: &str,
        kind: OutputKind,
    ) -> Result<Result<PathBuf, Outcome>, CompressError> {
        PathResolver::ensure_dir(&PathResolver::bucket_dir(&self.output_root, date.year()))?;

        let destination = PathResolver::destination(&self.output_root, date.year(), file_name, kind);
        if destination.exists() {
            return Ok(Err(Outcome::Skipped { destination }));
        }
        Ok(Ok(destination))
    }

    /// Cosmetic: failures are logged at debug level and otherwise ignored
    fn align_timestamp(&self, destination: &Path, date: &ResolvedDate) {
        if !self.align_timestamps {
            return;
        }

        let result = date
            .to_system_time()
            .ok_or_else(|| CompressError::Date(date.as_str().to_string()))
            .and_then(|modified| set_modified(destination, modified).map_err(CompressError::from));

        if let Err(e) = result {
            debug!("Could not align timestamp of {}: {}", destination.display(), e);
        }
    }
}

/// Byte-exact copy that refuses to replace an existing destination
fn copy_new(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(destination)?;
    match io::copy(&mut reader, &mut writer).and_then(|bytes| writer.sync_all().map(|_| bytes)) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            drop(writer);
            discard_partial(destination);
            Err(e)
        }
    }
}

fn set_modified(path: &Path, modified: SystemTime) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(SystemTime::now()).set_modified(modified))
}
