//! # Imageset
//!
//! Derivative image set generation for uploads. Given one uploaded source
//! image and a per-field declaration of thumbnail variants, the pipeline
//! deterministically produces every derived file — source copy, retina
//! variants, display original, and thumbnails — and synthesizes the
//! validation constraints the upload must satisfy in the first place.
//!
//! # Architecture: One Upload, One Invocation
//!
//! The pipeline is synchronous and single-threaded per invocation. A
//! [`derive::DerivativePipeline`] is created for one model instance,
//! consumes one upload, and is discarded. Concurrency across uploads comes
//! from running independent invocations in parallel — each confined to its
//! own model-key-scoped directory, so writes never collide.
//!
//! ```text
//! registration   FieldSpec ──► rules::register_image_field ──► "dimensions:...|max:..."
//!                                                               (enforced externally)
//! upload         UploadHandle ──► DerivativePipeline::build ──► DerivativeSet
//!                                                               (persisted externally)
//! ```
//!
//! Constraint synthesis runs at field-registration time, before any upload
//! exists; derivative generation runs per accepted upload. Persistence,
//! request handling, and validation enforcement belong to the caller.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | TOML configuration: upload root, retina factor, size cap, field declarations |
//! | [`fields`] | Field/thumbnail specs, the startup-built [`fields::FieldRegistry`], the [`fields::HasImageFields`] capability trait |
//! | [`naming`] | Filename sanitization and derived-name construction (`_source`, `@2x`) |
//! | [`paths`] | Directory layout derivation from model identity, invocation-scoped cache |
//! | [`imaging`] | Resize engine: [`imaging::ImageBackend`] trait, pure dimension math, `image`-crate backend |
//! | [`derive`] | The orchestrator building complete derivative sets |
//! | [`rules`] | Constraint derivation and idempotent rule-string merging |
//!
//! # Design Decisions
//!
//! ## Typed Registry Over Runtime Config Lookup
//!
//! Field specifications are loaded once at startup into a
//! [`fields::FieldRegistry`] keyed by model type and validated there.
//! Lookups return explicit `Option` misses — no config access by runtime
//! identifier, no implicit nulls deep in the pipeline.
//!
//! ## Capability Trait Over Base-Class Mixins
//!
//! Entities that own image fields implement [`fields::HasImageFields`]
//! (model type, key, optional retina override). The pipeline depends only
//! on that trait, so any storage layer can drive it.
//!
//! ## All-Or-Nothing Derivative Sets
//!
//! A returned [`derive::DerivativeSet`] is always complete: every declared
//! thumbnail has its derivative (plus the retina twin when enabled). The
//! first failure aborts the build; partially-written files are reported as
//! orphans via the error, never as a result.
//!
//! ## Backend Behind a Trait
//!
//! Pixel work sits behind [`imaging::ImageBackend`] with a pure-Rust
//! `image`-crate implementation. Dimension arithmetic is pure and shared
//! with the test mock, so orchestration logic is testable without
//! encoding a single image.

pub mod config;
pub mod derive;
pub mod fields;
pub mod imaging;
pub mod naming;
pub mod paths;
pub mod rules;

pub use config::{ConfigError, PipelineConfig, RetinaFactor};
pub use derive::{
    Derivative, DerivativePipeline, DerivativeRole, DerivativeSet, PipelineError, UploadHandle,
};
pub use fields::{FieldRegistry, FieldSpec, HasImageFields, ResizePolicy, ThumbnailSpec};
pub use imaging::{ImageBackend, RustBackend};
pub use rules::{ConstraintSet, register_image_field};
