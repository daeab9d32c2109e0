//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file della directory sorgente e
//! dell'albero di output.
//!
//! ## Responsabilità:
//! - Listing non ricorsivo della directory sorgente (solo file regolari)
//! - Classificazione dei nomi in target da comprimere, da copiare o ignorati
//! - Conteggio ricorsivo dei file di output (usato dal monitor di progresso)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Regole di classificazione:
//! - **Compress**: il testo dopo l'ultimo `.` è esattamente `jpg`, file non nascosto
//! - **CopyOnly**: il nome contiene `.jpg` altrove (es. `photo.jpg.tmp`), non nascosto
//! - **Ignored**: tutto il resto, inclusi i file che iniziano con `.`
//!
//! Il confronto è case-sensitive: `foto.JPG` viene ignorato.
//!
//! ## Esempio:
//! ```ignore
//! let names = FileManager::list_file_names(Path::new("/photos"))?;
//! let (compress, copy) = FileManager::classify(&names);
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Classificazione di un singolo nome file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Compress,
    CopyOnly,
    Ignored,
}

/// Manages file discovery and classification
pub struct FileManager;

impl FileManager {
    /// Names of the regular files directly inside `dir`, sorted by name
    pub fn list_file_names(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_string()),
                None => warn!("Skipping file with non UTF-8 name: {}", entry.path().display()),
            }
        }

        Ok(names)
    }

    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Classify a single file name
    pub fn classify_name(name: &str) -> Classification {
        if name.is_empty() || Self::is_hidden(name) {
            return Classification::Ignored;
        }

        match name.rsplit_once('.') {
            Some((_, "jpg")) => Classification::Compress,
            _ if name.contains(".jpg") => Classification::CopyOnly,
            _ => Classification::Ignored,
        }
    }

    /// Splits a listing into (compress targets, copy-only targets), keeping listing order
    pub fn classify<S: AsRef<str>>(names: &[S]) -> (Vec<String>, Vec<String>) {
        let mut compress = Vec::new();
        let mut copy = Vec::new();

        for name in names {
            let name = name.as_ref();
            match Self::classify_name(name) {
                Classification::Compress => compress.push(name.to_string()),
                Classification::CopyOnly => copy.push(name.to_string()),
                Classification::Ignored => {}
            }
        }

        (compress, copy)
    }

    /// Recursive count of non-symlink files under `root` (0 if it does not exist yet)
    pub fn count_files(root: &Path) -> usize {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify_name() {
        assert_eq!(FileManager::classify_name("IMG_20190304_120000.jpg"), Classification::Compress);
        assert_eq!(FileManager::classify_name("photo.jpg.jpg"), Classification::Compress);
        assert_eq!(FileManager::classify_name("photo.jpg.tmp"), Classification::CopyOnly);
        assert_eq!(FileManager::classify_name("photo.jpg.bak"), Classification::CopyOnly);
        assert_eq!(FileManager::classify_name(".hidden.jpg"), Classification::Ignored);
        assert_eq!(FileManager::classify_name(".hidden.jpg.tmp"), Classification::Ignored);
        assert_eq!(FileManager::classify_name("photo.JPG"), Classification::Ignored);
        assert_eq!(FileManager::classify_name("photo.jpeg"), Classification::Ignored);
        assert_eq!(FileManager::classify_name("notes.txt"), Classification::Ignored);
        assert_eq!(FileManager::classify_name("jpg"), Classification::Ignored);
        assert_eq!(FileManager::classify_name(""), Classification::Ignored);
    }

    #[test]
    fn test_classify_is_exhaustive_and_ordered() {
        let names = vec![
            "b.jpg", ".a.jpg", "c.jpg.tmp", "readme.md", "a.jpg", "d.jpg.part", ".e.jpg.tmp",
        ];
        let (compress, copy) = FileManager::classify(&names);

        assert_eq!(compress, vec!["b.jpg", "a.jpg"]);
        assert_eq!(copy, vec!["c.jpg.tmp", "d.jpg.part"]);

        // ogni nome finisce in al più una lista, i file nascosti in nessuna
        for name in &names {
            let hits = compress.iter().filter(|n| n == name).count() + copy.iter().filter(|n| n == name).count();
            if name.starts_with('.') {
                assert_eq!(hits, 0);
            } else {
                assert!(hits <= 1);
            }
        }
    }

    #[test]
    fn test_list_file_names_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.jpg"), b"b").unwrap();
        fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();
        fs::create_dir(temp_dir.path().join("IMG_compressed")).unwrap();
        fs::create_dir(temp_dir.path().join("folder.jpg")).unwrap();
        fs::write(temp_dir.path().join("IMG_compressed").join("nested.jpg"), b"n").unwrap();

        let names = FileManager::list_file_names(temp_dir.path()).unwrap();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_list_file_names_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(FileManager::list_file_names(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_count_files_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("out");
        assert_eq!(FileManager::count_files(&root), 0);

        fs::create_dir_all(root.join("IMG_2019")).unwrap();
        fs::create_dir_all(root.join("IMG_2020")).unwrap();
        fs::write(root.join("IMG_2019").join("a_compressed.jpg"), b"a").unwrap();
        fs::write(root.join("IMG_2020").join("b_compressed.jpg"), b"b").unwrap();
        fs::write(root.join("IMG_2020").join("c_copy.jpg"), b"c").unwrap();

        assert_eq!(FileManager::count_files(&root), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_count_files_ignores_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("out");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("real.jpg"), b"r").unwrap();
        std::os::unix::fs::symlink(root.join("real.jpg"), root.join("link.jpg")).unwrap();

        assert_eq!(FileManager::count_files(&root), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
