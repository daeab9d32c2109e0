//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output e la creazione idempotente
//! delle directory per anno.
//!
//! ```text
//! Input:  /photos/IMG_20190304_120000.jpg   (anno risolto: 2019)
//! Output: /photos/IMG_compressed/IMG_2019/IMG_20190304_120000_compressed.jpg
//! ```

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tipo di file prodotto, decide il suffisso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Compressed,
    Copy,
}

impl OutputKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputKind::Compressed => "_compressed.jpg",
            OutputKind::Copy => "_copy.jpg",
        }
    }
}

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// `{output_root}/IMG_{year}`
    pub fn bucket_dir(output_root: &Path, year: &str) -> PathBuf {
        output_root.join(format!("IMG_{}", year))
    }

    /// Every `.jpg` in the name is replaced by the kind's suffix
    pub fn output_file_name(file_name: &str, kind: OutputKind) -> String {
        file_name.replace(".jpg", kind.suffix())
    }

    pub fn destination(output_root: &Path, year: &str, file_name: &str, kind: OutputKind) -> PathBuf {
        Self::bucket_dir(output_root, year).join(Self::output_file_name(file_name, kind))
    }

    /// Creates `dir` if missing. Losing a creation race to another worker is success.
    pub fn ensure_dir(dir: &Path) -> io::Result<()> {
        match std::fs::create_dir(dir) {
            Ok(()) => {
                debug!("Created directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
