//! Pure Rust image processing backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Crop | `image::DynamicImage::resize_to_fill` (Lanczos3) |
//! | Fit / exact scale | `image::DynamicImage::resize_exact` (Lanczos3) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with configured quality |
//! | Encode → PNG / TIFF / WebP | `image::DynamicImage::save` (lossless) |
//!
//! Fit dimensions are computed by [`calculations::fit_within`] and executed
//! with `resize_exact`, so the reported descriptor dimensions always match
//! the file on disk bit-for-bit.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations;
use super::params::{CropParams, FitParams, Quality, ScaleParams};

/// Production backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify an `image` crate error: IO problems keep their cause, anything
/// else is a decode failure.
fn map_image_err(path: &Path, e: image::ImageError) -> BackendError {
    match e {
        image::ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode(format!("{}: {}", path.display(), other)),
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    image::ImageReader::open(path)
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| map_image_err(path, e))
}

/// Save a derivative, re-encoding in the format implied by the extension.
///
/// Output extensions always equal the sanitized source extension, so only
/// formats with compiled-in decoders appear here. JPEG takes the configured
/// quality; the remaining formats are lossless.
fn save_image(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let file = File::create(path).map_err(BackendError::Io)?;
            let writer = BufWriter::new(file);
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value() as u8);
            img.write_with_encoder(encoder)
                .map_err(|e| BackendError::Encode(format!("{}: {}", path.display(), e)))
        }
        _ => img
            .save(path)
            .map_err(|e| BackendError::Encode(format!("{}: {}", path.display(), e))),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) =
            image::image_dimensions(path).map_err(|e| map_image_err(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, params: &CropParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let cropped = img.resize_to_fill(params.width, params.height, FilterType::Lanczos3);
        save_image(&cropped, &params.output, params.quality)?;
        Ok(Dimensions {
            width: params.width,
            height: params.height,
        })
    }

    fn fit(&self, params: &FitParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let source = Dimensions {
            width: img.width(),
            height: img.height(),
        };
        let target = calculations::fit_within(
            source,
            params.max_width,
            params.max_height,
            params.allow_upsize,
        );
        let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.quality)?;
        Ok(target)
    }

    fn scale_exact(&self, params: &ScaleParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.quality)?;
        Ok(Dimensions {
            width: params.width,
            height: params.height,
        })
    }
}
