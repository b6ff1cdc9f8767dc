//! Image thumbnails for photographs
//!
//! Photographs are stored as PNG bytes. Images picked for a new note are
//! decoded, shrunk so their longer side fits the configured bound, then
//! re-encoded.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("failed to read image '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode thumbnail: {0}")]
    Encode(#[from] image::ImageError),
}

/// Load the image at `path` and return it as PNG bytes no larger than
/// `max_dimension` on either side
///
/// Images already within the bound keep their size.
pub fn downsample(path: &Path, max_dimension: u32) -> Result<Vec<u8>, ThumbnailError> {
    let bytes = std::fs::read(path).map_err(|source| ThumbnailError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let img = image::load_from_memory(&bytes).map_err(|source| ThumbnailError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let (w, h) = img.dimensions();
    let img = if w > max_dimension || h > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img
    };

    encode_png(&img)
}

/// A generated gradient used as the sample notebook's photograph
pub fn placeholder(size: u32) -> Result<Vec<u8>, ThumbnailError> {
    let size = size.max(1);
    let img = RgbImage::from_fn(size, size, |x, y| {
        let r = (x * 255 / size) as u8;
        let g = (y * 255 / size) as u8;
        Rgb([r, g, 180])
    });
    encode_png(&DynamicImage::ImageRgb8(img))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ThumbnailError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
