//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Rounding is `f64::round` (half away from zero) throughout, so a 1001px
//! source at factor 2 yields a 501px display original.

use super::backend::Dimensions;

/// Divide source dimensions by the retina factor, rounding each axis.
///
/// Result axes never reach zero; a 1px axis stays 1px at any factor.
pub fn downscale(source: Dimensions, factor: u32) -> Dimensions {
    let f = f64::from(factor);
    Dimensions {
        width: round_div(source.width, f),
        height: round_div(source.height, f),
    }
}

fn round_div(value: u32, divisor: f64) -> u32 {
    ((f64::from(value) / divisor).round() as u32).max(1)
}

/// Multiply an optional thumbnail bound by the retina factor.
pub fn scale_bound(bound: Option<u32>, factor: u32) -> Option<u32> {
    bound.map(|b| b * factor)
}

/// Dimensions after a proportional fit within (optionally one-sided) bounds.
///
/// The scale is uniform, so the aspect ratio is preserved within ±1px of
/// rounding, and the result is clamped so an explicit bound is never
/// exceeded. Without `allow_upsize` the image never grows past its source
/// size; with it, the limiting bound is honored exactly.
pub fn fit_within(
    source: Dimensions,
    max_width: Option<u32>,
    max_height: Option<u32>,
    allow_upsize: bool,
) -> Dimensions {
    let mut scale = f64::INFINITY;
    if let Some(w) = max_width {
        scale = scale.min(f64::from(w) / f64::from(source.width));
    }
    if let Some(h) = max_height {
        scale = scale.min(f64::from(h) / f64::from(source.height));
    }
    if scale.is_infinite() {
        return source;
    }
    if !allow_upsize {
        scale = scale.min(1.0);
    }

    let mut width = ((f64::from(source.width) * scale).round() as u32).max(1);
    let mut height = ((f64::from(source.height) * scale).round() as u32).max(1);
    if let Some(w) = max_width {
        width = width.min(w);
    }
    if let Some(h) = max_height {
        height = height.min(h);
    }
    Dimensions { width, height }
}
