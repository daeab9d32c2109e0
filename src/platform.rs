//! # Platform-specific utilities
//!
//! Informazioni sulla piattaforma per il debugging. La disponibilità della
//! data di creazione dei file (birth time) dipende da OS e filesystem, quindi
//! viene rilevata a runtime e mai assunta.

use std::fmt;
use std::path::Path;

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
    /// Whether the filesystem under the probed path reports creation times
    pub birth_time: bool,
}

impl SystemInfo {
    /// Collects platform constants and probes birth-time support on `probe`
    pub fn detect(probe: &Path) -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
            birth_time: supports_birth_time(probe),
        }
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}), file creation time {}",
            self.os,
            self.arch,
            self.family,
            if self.birth_time { "available" } else { "unavailable" }
        )
    }
}

pub fn supports_birth_time(path: &Path) -> bool {
    std::fs::metadata(path).and_then(|metadata| metadata.created()).is_ok()
}
