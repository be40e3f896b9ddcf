//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the derivative
//! pipeline needs: identify, crop, fit, and scale_exact. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend) —
//! pure Rust on the `image` crate. Tests substitute a recording mock.

use std::path::Path;

use thiserror::Error;

use super::params::{CropParams, FitParams, ScaleParams};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an image or derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Every operation that writes a derivative returns the resulting pixel
/// dimensions, which the pipeline records in the derivative descriptors.
pub trait ImageBackend: Sync {
    /// Read image dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Scale-to-fill and center-crop to exact dimensions.
    fn crop(&self, params: &CropParams) -> Result<Dimensions, BackendError>;

    /// Proportional fit within bounds, preserving aspect ratio.
    fn fit(&self, params: &FitParams) -> Result<Dimensions, BackendError>;

    /// Uniform scale to exact target dimensions.
    fn scale_exact(&self, params: &ScaleParams) -> Result<Dimensions, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    ///
    /// Result dimensions are computed from a configured source size via the
    /// same pure calculations the real backend uses. Uses Mutex (not
    /// RefCell) so it stays Sync like real backends.
    pub struct MockBackend {
        source_dims: Dimensions,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Crop {
            output: String,
            width: u32,
            height: u32,
        },
        Fit {
            output: String,
            max_width: Option<u32>,
            max_height: Option<u32>,
            allow_upsize: bool,
        },
        Scale {
            output: String,
            width: u32,
            height: u32,
        },
    }

    impl MockBackend {
        pub fn with_source(width: u32, height: u32) -> Self {
            Self {
                source_dims: Dimensions { width, height },
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Identify(path.to_string_lossy().to_string()));
            Ok(self.source_dims)
        }

        fn crop(&self, params: &CropParams) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Crop {
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
            });
            Ok(Dimensions {
                width: params.width,
                height: params.height,
            })
        }

        fn fit(&self, params: &FitParams) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Fit {
                output: params.output.to_string_lossy().to_string(),
                max_width: params.max_width,
                max_height: params.max_height,
                allow_upsize: params.allow_upsize,
            });
            Ok(calculations::fit_within(
                self.source_dims,
                params.max_width,
                params.max_height,
                params.allow_upsize,
            ))
        }

        fn scale_exact(&self, params: &ScaleParams) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Scale {
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
            });
            Ok(Dimensions {
                width: params.width,
                height: params.height,
            })
        }
    }

    #[test]
    fn mock_records_and_reports_crop_dimensions() {
        let backend = MockBackend::with_source(2000, 1000);

        let dims = backend
            .crop(&CropParams {
                source: "/src.jpg".into(),
                output: "/out.jpg".into(),
                width: 200,
                height: 100,
                quality: crate::imaging::Quality::default(),
            })
            .unwrap();

        assert_eq!(dims, Dimensions { width: 200, height: 100 });
        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Crop { width: 200, height: 100, .. }
        ));
    }

    #[test]
    fn mock_fit_applies_the_pure_calculation() {
        let backend = MockBackend::with_source(2000, 1000);

        let dims = backend
            .fit(&FitParams {
                source: "/src.jpg".into(),
                output: "/out.jpg".into(),
                max_width: Some(500),
                max_height: None,
                allow_upsize: false,
                quality: crate::imaging::Quality::default(),
            })
            .unwrap();

        assert_eq!(dims, Dimensions { width: 500, height: 250 });
    }
}
