//! # Image Processing Module
//!
//! Questo modulo incapsula il codec JPEG usato dalla pipeline. Il resto del
//! crate lo vede solo tramite il trait `ImageCodec` con due operazioni:
//! `decode` e `encode_and_save`.
//!
//! ## Pipeline per un singolo file:
//! 1. **Decode**: lettura dei byte, decode dei pixel con `image`, parsing del
//!    blocco EXIF con `kamadak-exif` (assenza di EXIF non è un errore)
//! 2. **Orientamento**: `DecodedImage::normalize_orientation` applica il tag
//!    Orientation ai pixel e riporta il tag a 1 nel blocco EXIF
//! 3. **Encode**: JPEG a qualità ridotta (default 50) senza chroma subsampling,
//!    l'encoder di `image` usa fattori 1x1 su tutti i canali
//! 4. **Metadata**: il blocco EXIF originale viene reinserito come segmento APP1
//! 5. **Scrittura**: `create_new`, quindi un file già presente non viene mai
//!    sovrascritto
//!
//! ## Trasformazioni per il tag Orientation:
//! | Valore | Trasformazione           |
//! |--------|--------------------------|
//! | 1      | nessuna                  |
//! | 2      | flip orizzontale         |
//! | 3      | rotazione 180°           |
//! | 4      | flip verticale           |
//! | 5      | rotazione 90° + flip     |
//! | 6      | rotazione 90°            |
//! | 7      | rotazione 270° + flip    |
//! | 8      | rotazione 270°           |

use crate::error::CompressError;
use exif::{In, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use std::fs::OpenOptions;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, warn};

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ORIENTATION_TAG: u16 = 0x0112;

/// Raw EXIF block (TIFF structure) plus the fields the pipeline reads
#[derive(Debug, Clone)]
pub struct ExifBlock {
    raw: Vec<u8>,
    date_time_original: Option<String>,
    orientation: Option<u32>,
}

impl ExifBlock {
    /// Parses the EXIF block of a JPEG file, `Ok(None)` when there is none
    pub fn from_jpeg_bytes(bytes: &[u8]) -> Result<Option<Self>, CompressError> {
        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let date_time_original = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .and_then(|field| match field.value {
                exif::Value::Ascii(ref parts) => parts.first().map(|p| String::from_utf8_lossy(p).into_owned()),
                _ => None,
            });

        let orientation = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0));

        Ok(Some(Self {
            raw: exif.buf().to_vec(),
            date_time_original,
            orientation,
        }))
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn date_time_original(&self) -> Option<&str> {
        self.date_time_original.as_deref()
    }

    pub fn orientation(&self) -> Option<u32> {
        self.orientation
    }

    /// Rewrites the Orientation entry of IFD0 to 1 (top-left)
    fn reset_orientation(&mut self) {
        if patch_orientation(&mut self.raw, 1) {
            self.orientation = Some(1);
        } else {
            debug!("Orientation tag not found in IFD0, EXIF block left untouched");
        }
    }
}

/// Immagine decodificata: pixel + metadata opzionali
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub metadata: Option<ExifBlock>,
}

impl DecodedImage {
    pub fn date_time_original(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.date_time_original())
    }

    pub fn orientation(&self) -> Option<u32> {
        self.metadata.as_ref().and_then(|m| m.orientation())
    }

    /// Applies the EXIF orientation to the pixels. Missing tag means nothing to do.
    pub fn normalize_orientation(&mut self) {
        let orientation = match self.orientation() {
            Some(o) if o != 1 => o,
            _ => return,
        };

        self.pixels = match orientation {
            2 => self.pixels.fliph(),
            3 => self.pixels.rotate180(),
            4 => self.pixels.flipv(),
            5 => self.pixels.rotate90().fliph(),
            6 => self.pixels.rotate90(),
            7 => self.pixels.rotate270().fliph(),
            8 => self.pixels.rotate270(),
            other => {
                warn!("Ignoring invalid EXIF orientation value {}", other);
                return;
            }
        };

        if let Some(metadata) = self.metadata.as_mut() {
            metadata.reset_orientation();
        }
    }
}

/// Codec collaborator used by the materializer
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage, CompressError>;

    /// Encodes `image` and writes it to `path`, which must not exist yet.
    /// Returns the number of bytes written.
    fn encode_and_save(
        &self,
        image: &DecodedImage,
        path: &Path,
        quality: u8,
        preserve_metadata: bool,
    ) -> Result<u64, CompressError>;
}

/// Codec JPEG basato su `image` + `kamadak-exif`
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encodes pixels only, without any metadata segment
    pub fn encode_to_vec(pixels: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressError> {
        let rgb = pixels.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ColorType::Rgb8,
        )?;
        Ok(buffer)
    }
}

impl ImageCodec for JpegCodec {
    fn decode(&self, path: &Path) -> Result<DecodedImage, CompressError> {
        let bytes = std::fs::read(path)?;
        let pixels = image::load_from_memory(&bytes)?;

        let metadata = match ExifBlock::from_jpeg_bytes(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Unreadable EXIF in {}: {}", path.display(), e);
                None
            }
        };

        Ok(DecodedImage { pixels, metadata })
    }

    fn encode_and_save(
        &self,
        image: &DecodedImage,
        path: &Path,
        quality: u8,
        preserve_metadata: bool,
    ) -> Result<u64, CompressError> {
        let mut bytes = Self::encode_to_vec(&image.pixels, quality)?;

        if preserve_metadata {
            if let Some(metadata) = &image.metadata {
                match insert_exif_segment(&bytes, metadata.raw()) {
                    Some(with_exif) => bytes = with_exif,
                    None => warn!("EXIF block too large to preserve for {}", path.display()),
                }
            }
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            drop(file);
            discard_partial(path);
            return Err(e.into());
        }

        Ok(bytes.len() as u64)
    }
}

/// Removes a destination left behind by a failed write, so a later run retries it
pub fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

/// Inserts `tiff` as an APP1 Exif segment after SOI (and after JFIF APP0 if present).
/// Returns `None` if the block does not fit in a single segment.
pub fn insert_exif_segment(jpeg: &[u8], tiff: &[u8]) -> Option<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[0..2] != [0xFF, 0xD8] {
        return None;
    }

    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    if segment_len > u16::MAX as usize {
        return None;
    }

    let mut insert_at = 2;
    if jpeg.len() >= 6 && jpeg[2..4] == [0xFF, 0xE0] {
        let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        if 4 + app0_len <= jpeg.len() {
            insert_at = 4 + app0_len;
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment_len + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(segment_len as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[insert_at..]);
    Some(out)
}

/// Overwrites the Orientation SHORT in IFD0 of a TIFF block. Returns false if not found.
fn patch_orientation(tiff: &mut [u8], value: u16) -> bool {
    let big_endian = match tiff.get(0..2) {
        Some(b"MM") => true,
        Some(b"II") => false,
        _ => return false,
    };

    let read_u16 = |buf: &[u8], at: usize| -> Option<u16> {
        let bytes: [u8; 2] = buf.get(at..at + 2)?.try_into().ok()?;
        Some(if big_endian { u16::from_be_bytes(bytes) } else { u16::from_le_bytes(bytes) })
    };
    let read_u32 = |buf: &[u8], at: usize| -> Option<u32> {
        let bytes: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
        Some(if big_endian { u32::from_be_bytes(bytes) } else { u32::from_le_bytes(bytes) })
    };

    let Some(ifd0) = read_u32(tiff, 4).map(|o| o as usize) else {
        return false;
    };
    let Some(count) = read_u16(tiff, ifd0) else {
        return false;
    };

    for index in 0..count as usize {
        let entry = ifd0 + 2 + index * 12;
        // tipo 3 = SHORT, count 1: il valore sta nei primi 2 byte del campo
        if read_u16(tiff, entry) == Some(ORIENTATION_TAG)
            && read_u16(tiff, entry + 2) == Some(3)
            && read_u32(tiff, entry + 4) == Some(1)
        {
            let encoded = if big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
            if let Some(slot) = tiff.get_mut(entry + 8..entry + 10) {
                slot.copy_from_slice(&encoded);
                return true;
            }
        }
    }

    false
}
