//! Binary PGM (`P5`) images, and a directory-backed [`ImageStore`] using them.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::error::GolError;
use crate::io::ImageStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PgmError {
    #[error("not a binary PGM file")]
    BadMagic,
    #[error("missing or unreadable {0} in header")]
    BadHeader(&'static str),
    #[error("unsupported maximum value {0}")]
    MaxValue(usize),
    #[error("expected {expected} pixels, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

pub fn encode(width: usize, height: usize, pixels: &[u8]) -> Vec<u8> {
    let mut bytes = format!("P5\n{width} {height}\n255\n").into_bytes();
    bytes.extend_from_slice(pixels);
    bytes
}

pub fn decode(bytes: &[u8]) -> Result<Image, PgmError> {
    let mut header = Header { bytes, pos: 0 };

    if header.next_token() != Some(b"P5".as_slice()) {
        return Err(PgmError::BadMagic);
    }
    let width = header.number("width")?;
    let height = header.number("height")?;
    let max_value = header.number("maximum value")?;
    if max_value == 0 || max_value > 255 {
        return Err(PgmError::MaxValue(max_value));
    }

    // Exactly one whitespace byte separates the header from the raster.
    let data = bytes.get(header.pos + 1..).unwrap_or_default();
    let expected = width
        .checked_mul(height)
        .ok_or(PgmError::BadHeader("dimensions"))?;
    if data.len() < expected {
        return Err(PgmError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    Ok(Image {
        width,
        height,
        pixels: data[..expected].to_vec(),
    })
}

struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    fn next_token(&mut self) -> Option<&'a [u8]> {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.bytes.get(self.pos) == Some(&b'#') {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }

        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        Some(&self.bytes[start..self.pos])
    }

    fn number(&mut self, field: &'static str) -> Result<usize, PgmError> {
        self.next_token()
            .and_then(|token| std::str::from_utf8(token).ok())
            .and_then(|text| text.parse().ok())
            .ok_or(PgmError::BadHeader(field))
    }
}

/// Reads `<input_dir>/<name>.pgm` and writes `<output_dir>/<name>.pgm`.
#[derive(Debug, Clone)]
pub struct PgmDirectory {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl PgmDirectory {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        PgmDirectory {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    fn path(dir: &Path, filename: &str) -> PathBuf {
        dir.join(format!("{filename}.pgm"))
    }
}

impl ImageStore for PgmDirectory {
    fn load(&mut self, filename: &str, width: usize, height: usize) -> Result<Vec<u8>, GolError> {
        let path = Self::path(&self.input_dir, filename);
        let bytes = fs::read(&path).map_err(|source| GolError::Storage {
            filename: path.display().to_string(),
            source,
        })?;

        let malformed = |reason: String| GolError::MalformedInput {
            filename: path.display().to_string(),
            reason,
        };
        let image = decode(&bytes).map_err(|err| malformed(err.to_string()))?;
        if image.width != width || image.height != height {
            return Err(malformed(format!(
                "image is {}x{}, expected {width}x{height}",
                image.width, image.height
            )));
        }
        Ok(image.pixels)
    }

    fn save(&mut self, filename: &str, width: usize, height: usize, pixels: &[u8]) -> Result<(), GolError> {
        let path = Self::path(&self.output_dir, filename);
        let storage = |source| GolError::Storage {
            filename: path.display().to_string(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(storage)?;
        fs::write(&path, encode(width, height, pixels)).map_err(storage)?;
        info!("wrote {}", path.display());
        Ok(())
    }
}
