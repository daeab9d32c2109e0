//! # Capture Date Resolution Module
//!
//! Questo modulo determina la data di scatto di una foto tramite una catena
//! ordinata di fallback. Il risultato decide solo il bucket di output
//! (`IMG_{anno}`) e la mtime del file generato.
//!
//! ## Catena di fallback (vince il primo risultato valido):
//! 1. **Metadata EXIF**: `DateTimeOriginal`, primi 10 caratteri (`YYYY:MM:DD`)
//! 2. **Nome file**: prefissi noti di fotocamere e app seguiti da `YYYYMMDD`
//! 3. **Filesystem**: data di creazione (birth time) se la piattaforma la espone
//! 4. **Sentinella**: `0000:01:01`
//!
//! ## Note:
//! - La risoluzione non fallisce mai: il chiamante riceve sempre una data utilizzabile
//! - I prefissi vengono provati nell'ordine della lista e ci si ferma al primo
//!   che produce una data valida
//! - mtime/ctime non vengono usati: sono artefatti della copia, non dello scatto

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;

/// Formato delle date risolte, identico a quello EXIF
pub const DATE_FORMAT: &str = "%Y:%m:%d";

/// Data restituita quando nessuna strategia produce un risultato
pub const SENTINEL_DATE: &str = "0000:01:01";

/// Known device/app naming prefixes, in the order they are tried
pub const NAME_PREFIXES: [&str; 8] = [
    "IMG_",
    "IMG-",
    "IMG",
    "WHATSAPP_IMAGE_",
    "SCREENSHOT_",
    "SCREENSHOT-",
    "SIGNAL-",
    "PXL_",
];

/// Strategia che ha prodotto la data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Metadata,
    FileName,
    Filesystem,
    Sentinel,
}

impl DateSource {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Metadata => "EXIF DateTimeOriginal",
            Self::FileName => "file name pattern",
            Self::Filesystem => "filesystem creation time",
            Self::Sentinel => "fallback sentinel",
        }
    }
}

/// A capture date in `YYYY:MM:DD` form, never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    value: String,
    source: DateSource,
}

impl ResolvedDate {
    fn new(value: String, source: DateSource) -> Self {
        Self { value, source }
    }

    pub fn sentinel() -> Self {
        Self::new(SENTINEL_DATE.to_string(), DateSource::Sentinel)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Four digit year, used to name the output bucket
    pub fn year(&self) -> &str {
        &self.value[..4]
    }

    pub fn source(&self) -> DateSource {
        self.source
    }

    pub fn naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.value, DATE_FORMAT).ok()
    }

    /// Local midnight of the capture date, `None` for the sentinel year `0000`.
    /// Dates before the Unix epoch are kept.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let date = self.naive_date().filter(|date| date.year() != 0)?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let local = Local.from_local_datetime(&midnight).earliest()?;
        Some(SystemTime::from(local))
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.source.description())
    }
}

/// Resolver senza stato per la catena di fallback
pub struct DateResolver;

impl DateResolver {
    /// Runs the whole chain. `exif_date` is the raw `DateTimeOriginal` text,
    /// `created` the file birth time if the platform reported one.
    pub fn resolve(file_name: &str, exif_date: Option<&str>, created: Option<SystemTime>) -> ResolvedDate {
        if let Some(date) = exif_date.and_then(Self::from_metadata) {
            return ResolvedDate::new(date, DateSource::Metadata);
        }
        if let Some(date) = Self::from_file_name(file_name) {
            return ResolvedDate::new(date, DateSource::FileName);
        }
        if let Some(date) = created.map(Self::from_creation_time) {
            return ResolvedDate::new(date, DateSource::Filesystem);
        }
        ResolvedDate::sentinel()
    }

    /// Takes the first 10 characters of an EXIF date (`2018:08:25 16:38:43`)
    pub fn from_metadata(raw: &str) -> Option<String> {
        let head: String = raw.trim().chars().take(10).collect();
        NaiveDate::parse_from_str(&head, DATE_FORMAT)
            .ok()
            .filter(|date| (0..=9999).contains(&date.year()))
            .map(|date| date.format(DATE_FORMAT).to_string())
    }

    /// Scans the upper-cased name for the known prefixes
    pub fn from_file_name(file_name: &str) -> Option<String> {
        let upper = file_name.to_uppercase();

        NAME_PREFIXES.iter().find_map(|prefix| {
            // segmento tra la prima e la seconda occorrenza del prefisso
            let segment = upper.split(prefix).nth(1)?;
            Self::parse_compact_date(segment)
        })
    }

    /// Formats a birth time as a local date
    pub fn from_creation_time(created: SystemTime) -> String {
        DateTime::<Local>::from(created).format(DATE_FORMAT).to_string()
    }

    /// Birth time of `path`, `None` where the platform or filesystem does not track it
    pub fn creation_time(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.created()).ok()
    }

    /// Parses the first 8 characters of `segment` as `YYYYMMDD`
    fn parse_compact_date(segment: &str) -> Option<String> {
        let digits: String = segment.chars().take(8).collect();
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let year: i32 = digits[0..4].parse().ok()?;
        let month: u32 = digits[4..6].parse().ok()?;
        let day: u32 = digits[6..8].parse().ok()?;

        NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format(DATE_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn is_valid_shape(value: &str) -> bool {
        value == SENTINEL_DATE || NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
    }

    #[test]
    fn test_metadata_outranks_file_name() {
        let date = DateResolver::resolve("IMG_20200101_101010.jpg", Some("2018:08:25 16:38:43"), None);
        assert_eq!(date.as_str(), "2018:08:25");
        assert_eq!(date.year(), "2018");
        assert_eq!(date.source(), DateSource::Metadata);
    }

    #[test]
    fn test_invalid_metadata_falls_through() {
        let date = DateResolver::resolve("IMG_20200101_101010.jpg", Some("    :  :     :  :  "), None);
        assert_eq!(date.as_str(), "2020:01:01");
        assert_eq!(date.source(), DateSource::FileName);

        assert_eq!(DateResolver::from_metadata(""), None);
        assert_eq!(DateResolver::from_metadata("2018:13:25 00:00:00"), None);
    }

    #[test]
    fn test_file_name_prefixes() {
        let cases = [
            ("IMG_20190304_120000.jpg", "2019:03:04"),
            ("img-20200521-wa0003.jpg", "2020:05:21"),
            ("IMG20171224183000.jpg", "2017:12:24"),
            ("WhatsApp_Image_20210102 at 10.00.00.jpg", "2021:01:02"),
            ("Screenshot_20220630-101112.jpg", "2022:06:30"),
            ("screenshot-20230101.jpg", "2023:01:01"),
            ("signal-20240229-123456.jpg", "2024:02:29"),
            ("PXL_20211105_091011123.jpg", "2021:11:05"),
        ];

        for (name, expected) in cases {
            assert_eq!(DateResolver::from_file_name(name).as_deref(), Some(expected), "{}", name);
        }
    }

    #[test]
    fn test_first_successful_prefix_wins() {
        // IMG_ e IMG falliscono, PXL_ produce la data
        let name = "IMG_backup_PXL_20200202_000000.jpg";
        assert_eq!(DateResolver::from_file_name(name).as_deref(), Some("2020:02:02"));

        // IMG_ e SIGNAL- sono entrambi validi: vince l'ordine della lista
        let name = "IMG_20190101_SIGNAL-20200101.jpg";
        assert_eq!(DateResolver::from_file_name(name).as_deref(), Some("2019:01:01"));
    }

    #[test]
    fn test_file_name_rejects_bad_dates() {
        assert_eq!(DateResolver::from_file_name("IMG_20201350_000000.jpg"), None);
        assert_eq!(DateResolver::from_file_name("IMG_2020.jpg"), None);
        assert_eq!(DateResolver::from_file_name("holiday.jpg"), None);
        assert_eq!(DateResolver::from_file_name("IMG_2019ÄÖÜ1.jpg"), None);
    }

    #[test]
    fn test_creation_time_fallback() {
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let date = DateResolver::resolve("holiday.jpg", None, Some(created));
        assert_eq!(date.source(), DateSource::Filesystem);
        assert_eq!(date.as_str(), DateTime::<Local>::from(created).format(DATE_FORMAT).to_string());
    }

    #[test]
    fn test_sentinel_when_everything_fails() {
        let date = DateResolver::resolve("holiday.jpg", None, None);
        assert_eq!(date.as_str(), SENTINEL_DATE);
        assert_eq!(date.year(), "0000");
        assert_eq!(date.source(), DateSource::Sentinel);
        assert!(date.to_system_time().is_none());
    }

    #[test]
    fn test_resolver_is_total() {
        let names = ["", ".", "IMG_", "IMG_99999999", "PXL_", "ÿÿÿÿ.jpg", "IMG_00000000.jpg"];
        let metadata = [None, Some(""), Some("garbage"), Some("0000:00:00 00:00:00")];

        for name in names {
            for exif in metadata {
                let date = DateResolver::resolve(name, exif, None);
                assert!(!date.as_str().is_empty());
                assert!(is_valid_shape(date.as_str()), "{:?} -> {}", name, date);
                assert_eq!(date.year().len(), 4);
            }
        }
    }

    #[test]
    fn test_to_system_time_is_local_midnight() {
        let date = DateResolver::resolve("IMG_20190304_120000.jpg", None, None);
        let time = date.to_system_time().unwrap();
        let local = DateTime::<Local>::from(time);
        assert_eq!(local.format(DATE_FORMAT).to_string(), "2019:03:04");
        assert_eq!(local.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn test_to_system_time_before_epoch() {
        let date = DateResolver::resolve("scan.jpg", Some("1965:06:01 10:00:00"), None);
        assert_eq!(date.year(), "1965");

        let time = date.to_system_time().unwrap();
        assert!(time < SystemTime::UNIX_EPOCH);
        let local = DateTime::<Local>::from(time);
        assert_eq!(local.format(DATE_FORMAT).to_string(), "1965:06:01");
    }
}
