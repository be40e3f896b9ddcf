//! Image processing — pure Rust, no external binaries.
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Parameters**: data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//!
//! The derivative pipeline talks only to the trait; tests swap in the
//! recording mock from `backend::tests`.

pub mod backend;
mod calculations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{downscale, fit_within, scale_bound};
pub use params::{CropParams, FitParams, Quality, ScaleParams};
pub use rust_backend::RustBackend;
