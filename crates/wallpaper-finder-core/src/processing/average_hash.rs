//! # Average Hash Module
//!
//! Content fingerprints for exact duplicate detection.
//!
//! ## Algorithm
//!
//! 1. Decode the image and drop any alpha channel.
//! 2. Shrink the RGB pixels onto an `N×N` grid with `image::imageops::thumbnail`,
//!    which averages the source pixels covered by each cell. When the grid
//!    divides the image evenly each cell is the exact mean of its block.
//! 3. Convert each cell to luma with integer weights:
//!    `(299·R + 587·G + 114·B + 500) / 1000`.
//! 4. Emit bit `1` for a cell whose luma is strictly greater than the mean of
//!    all `N²` cells, else `0`. The comparison is done exactly as
//!    `luma · N² > Σ luma`.
//!
//! ## Encoding
//!
//! Bits are taken in raster order (row by row, left to right). The first cell is
//! the most significant bit. The bit string is left-padded with zeros to a
//! multiple of four and rendered as lowercase hex, so the default 10×10 grid
//! always yields 25 characters.
//!
//! Two images are duplicates only when their fingerprints are equal. Size is
//! normalised by the grid, so a scaled re-encode of the same pixels matches,
//! but crops and edits do not.

use image::{imageops, DynamicImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Default side length of the sampling grid
pub const DEFAULT_HASH_SIZE: u32 = 10;

/// Fixed-length hexadecimal content signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes average-hash fingerprints on a fixed grid
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    hash_size: u32,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SIZE)
    }
}

impl Fingerprinter {
    /// Create a fingerprinter with an `hash_size × hash_size` grid
    pub fn new(hash_size: u32) -> Self {
        Self {
            hash_size: hash_size.max(1),
        }
    }

    /// Number of hex characters in every fingerprint
    pub fn fingerprint_len(&self) -> usize {
        let bits = (self.hash_size * self.hash_size) as usize;
        bits.div_ceil(4)
    }

    /// Decode a file and fingerprint its pixels
    pub fn fingerprint<P: AsRef<Path>>(&self, path: P) -> Result<Fingerprint> {
        let path = path.as_ref();
        let undecodable = |reason: String| Error::UndecodableImage {
            path: path.to_path_buf(),
            reason,
        };

        // Detect the format from content, not the extension
        let img = image::io::Reader::open(path)
            .map_err(|e| undecodable(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| undecodable(e.to_string()))?
            .decode()
            .map_err(|e| undecodable(e.to_string()))?;

        self.fingerprint_image(&img)
            .ok_or_else(|| undecodable("image has no pixels".to_string()))
    }

    /// Fingerprint an already decoded image; `None` for an empty image
    pub fn fingerprint_image(&self, img: &DynamicImage) -> Option<Fingerprint> {
        let rgb = img.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return None;
        }

        let grid = imageops::thumbnail(&rgb, self.hash_size, self.hash_size);
        let lumas: Vec<u32> = grid
            .pixels()
            .map(|pixel| {
                let [r, g, b] = pixel.0;
                luma(r as u32, g as u32, b as u32)
            })
            .collect();

        Some(Fingerprint(pack_hex(&average_bits(&lumas))))
    }
}

fn luma(r: u32, g: u32, b: u32) -> u32 {
    (r * 299 + g * 587 + b * 114 + 500) / 1000
}

/// One bit per sample: strictly above the mean
fn average_bits(lumas: &[u32]) -> Vec<bool> {
    let count = lumas.len() as u64;
    let sum: u64 = lumas.iter().map(|&l| l as u64).sum();
    lumas.iter().map(|&l| l as u64 * count > sum).collect()
}

/// Most significant bit first, zero-padded on the left to whole nibbles
fn pack_hex(bits: &[bool]) -> String {
    let padding = (4 - bits.len() % 4) % 4;
    let padded: Vec<bool> = std::iter::repeat(false)
        .take(padding)
        .chain(bits.iter().copied())
        .collect();

    padded
        .chunks(4)
        .map(|nibble| {
            let value = nibble
                .iter()
                .fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit));
            // A nibble is always a valid hex digit
            std::char::from_digit(value, 16).unwrap_or('0')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn half_and_half(size: u32) -> RgbImage {
        ImageBuffer::from_fn(size, size, |x, _| {
            if x < size / 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn pattern(size: u32, scale: u32) -> RgbImage {
        // Base 10x10 pattern replicated `scale` times per pixel
        ImageBuffer::from_fn(size * scale, size * scale, |x, y| {
            let (bx, by) = (x / scale, y / scale);
            Rgb([
                (bx * 25) as u8,
                (by * 25) as u8,
                ((bx * by) % 256) as u8,
            ])
        })
    }

    #[test]
    fn test_known_fingerprint() {
        let img = DynamicImage::ImageRgb8(half_and_half(10));
        let fingerprint = Fingerprinter::default().fingerprint_image(&img).unwrap();

        // Each row is 0000011111
        assert_eq!(fingerprint.as_str(), "07c1f07c1f07c1f07c1f07c1f");
    }

    #[test]
    fn test_top_half_bright() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(20, 20, |_, y| {
            if y < 10 {
                Rgb([200, 200, 200])
            } else {
                Rgb([10, 10, 10])
            }
        }));
        let fingerprint = Fingerprinter::default().fingerprint_image(&img).unwrap();
        assert_eq!(fingerprint.as_str(), "ffffffffffffc000000000000");
    }

    #[test]
    fn test_wide_image_shrinks_by_blocks() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgb([0, 0, 0])
            } else {
                Rgb([230, 230, 230])
            }
        }));
        let fingerprint = Fingerprinter::default().fingerprint_image(&img).unwrap();
        assert_eq!(fingerprint.as_str(), "07c1f07c1f07c1f07c1f07c1f");
    }

    #[test]
    fn test_uniform_image_is_all_zero() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(37, 23, Rgb([120, 40, 200])));
        let fingerprint = Fingerprinter::default().fingerprint_image(&img).unwrap();
        assert_eq!(fingerprint.as_str(), "0".repeat(25));
    }

    #[test]
    fn test_fingerprint_length_follows_grid() {
        let img = DynamicImage::ImageRgb8(pattern(10, 3));
        for size in [1, 3, 8, 10, 16] {
            let fingerprinter = Fingerprinter::new(size);
            let fingerprint = fingerprinter.fingerprint_image(&img).unwrap();
            assert_eq!(fingerprint.as_str().len(), fingerprinter.fingerprint_len());
        }
        assert_eq!(Fingerprinter::default().fingerprint_len(), 25);
    }

    #[test]
    fn test_rescaled_pixels_match() {
        let fingerprinter = Fingerprinter::default();
        let small = fingerprinter
            .fingerprint_image(&DynamicImage::ImageRgb8(pattern(10, 2)))
            .unwrap();
        let large = fingerprinter
            .fingerprint_image(&DynamicImage::ImageRgb8(pattern(10, 6)))
            .unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let rgba: RgbaImage = ImageBuffer::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 10])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let fingerprint = Fingerprinter::default()
            .fingerprint_image(&DynamicImage::ImageRgba8(rgba))
            .unwrap();
        assert_eq!(fingerprint.as_str(), "07c1f07c1f07c1f07c1f07c1f");
    }

    #[test]
    fn test_fingerprint_file_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pattern.png");
        pattern(10, 4).save(&path).unwrap();

        let fingerprinter = Fingerprinter::default();
        let first = fingerprinter.fingerprint(&path).unwrap();
        let second = fingerprinter.fingerprint(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_content_sniffing_ignores_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        half_and_half(10)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let fingerprint = Fingerprinter::default().fingerprint(&path).unwrap();
        assert_eq!(fingerprint.as_str(), "07c1f07c1f07c1f07c1f07c1f");
    }

    #[test]
    fn test_undecodable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = Fingerprinter::default().fingerprint(&path);
        assert!(matches!(result, Err(Error::UndecodableImage { .. })));
    }

    #[test]
    fn test_pack_hex_padding() {
        assert_eq!(pack_hex(&[true]), "1");
        assert_eq!(pack_hex(&[true, false, false, false, false]), "10");
        assert_eq!(pack_hex(&[true; 8]), "ff");
    }
}
