//! Decoding, re-encoding and writing of downloaded images.

use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageError, ImageFormat, ImageOutputFormat};
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::FetchFailure;

/// Attempts at finding a free staging name before giving up
const MAX_NAME_ATTEMPTS: usize = 8;

/// Decode a response body, rejecting images above the pixel ceiling
pub(crate) fn decode(bytes: &[u8], max_pixels: u64) -> std::result::Result<DynamicImage, FetchFailure> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchFailure::Decode(e.to_string()))?;

    // Header only, so a decompression bomb is caught before allocation
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| FetchFailure::Decode(e.to_string()))?;

    let oversize = FetchFailure::Oversize {
        width,
        height,
        limit: max_pixels,
    };
    if width as u64 * height as u64 > max_pixels {
        return Err(oversize);
    }

    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchFailure::Decode(e.to_string()))?
        .decode()
        .map_err(|e| match e {
            ImageError::Limits(_) => oversize,
            other => FetchFailure::Decode(other.to_string()),
        })
}

/// Encode in the format named by `extension`, keeping the color mode when the
/// encoder accepts it and falling back to RGB once otherwise
pub(crate) fn encode(
    image: &DynamicImage,
    extension: &str,
    jpeg_quality: u8,
) -> std::result::Result<Vec<u8>, FetchFailure> {
    let format = output_format(extension, jpeg_quality)
        .ok_or_else(|| FetchFailure::Encode(format!("no encoder for '{}'", extension)))?;

    match encode_as(image, &format) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            debug!(
                "Encoding {:?} as {} failed ({}), retrying as RGB",
                image.color(),
                extension,
                e
            );
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            encode_as(&rgb, &format).map_err(|e| FetchFailure::Encode(e.to_string()))
        }
    }
}

fn output_format(extension: &str, jpeg_quality: u8) -> Option<ImageOutputFormat> {
    match ImageFormat::from_extension(extension)? {
        ImageFormat::Jpeg => Some(ImageOutputFormat::Jpeg(jpeg_quality)),
        other => Some(ImageOutputFormat::from(other)),
    }
}

fn encode_as(image: &DynamicImage, format: &ImageOutputFormat) -> image::ImageResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format.clone())?;
    Ok(cursor.into_inner())
}

/// Write encoded bytes under a fresh name in `temp_dir`.
///
/// An existing file is never overwritten: a taken name gets an opaque prefix.
/// Any other I/O error is fatal for the whole fetch.
pub(crate) fn write_staged(temp_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(PathBuf, u64)> {
    let (path, mut file) = reserve(temp_dir, file_name)?;

    if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(Error::fatal(&path, e));
    }

    Ok((path, bytes.len() as u64))
}

fn reserve(temp_dir: &Path, file_name: &str) -> Result<(PathBuf, File)> {
    let mut candidate = temp_dir.join(file_name);

    for _ in 0..MAX_NAME_ATTEMPTS {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} is taken, choosing another name", candidate.display());
                candidate = temp_dir.join(format!("{}-{}", Uuid::new_v4().simple(), file_name));
            }
            Err(e) => return Err(Error::fatal(temp_dir, e)),
        }
    }

    Err(Error::fatal(
        temp_dir,
        io::Error::new(io::ErrorKind::AlreadyExists, "no free staging name"),
    ))
}
