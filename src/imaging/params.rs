//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`derive`](crate::derive) pipeline (which decides
//! what derivatives to create) and the [`backend`](super::backend) (which
//! does the actual pixel work), so a mock backend can stand in for tests.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Scale-to-fill then center-crop to exactly `width × height`.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// Proportional scale so the image fits within the bounds.
///
/// A `None` bound is unconstrained in that axis. Unless `allow_upsize` is
/// set the image never grows beyond its source resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub allow_upsize: bool,
    pub quality: Quality,
}

/// Uniform scale to exact target dimensions.
///
/// Used for the `1/retina_factor` downscale of the display original, where
/// the output must match the rounded arithmetic exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }
}
