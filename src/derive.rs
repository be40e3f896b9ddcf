//! Derivative set generation for one uploaded image.
//!
//! [`DerivativePipeline`] is the orchestrator: it sanitizes the upload's
//! filename, moves the bytes into the resolved `original` directory, and
//! walks the field's thumbnail variants producing every required
//! derivative. With retina enabled (factor F) one upload yields:
//!
//! | Role | File | Contents |
//! |---|---|---|
//! | `original.source` | `slug_source.ext` | verbatim upload, never resized |
//! | `original.retina` | `slug@Fx.ext` | verbatim copy of the source |
//! | `original.file` | `slug.ext` | source downscaled by 1/F |
//! | `thumbnails.<name>.retina` | `<name>/slug@Fx.ext` | thumbnail at F× size |
//! | `thumbnails.<name>.original` | `<name>/slug.ext` | thumbnail at base size |
//!
//! With retina disabled, `original.file` is a verbatim copy and only the
//! base thumbnails are produced.
//!
//! The whole operation is all-or-nothing: the first failure aborts the
//! build and no derivative set is returned. Files already written by a
//! failed invocation are orphans for the caller to clean up — nothing is
//! retried.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, RetinaFactor};
use crate::fields::{FieldSpec, FieldSpecError, HasImageFields, ResizePolicy, ThumbnailSpec};
use crate::imaging::{
    self, BackendError, CropParams, Dimensions, FitParams, ImageBackend, Quality, ScaleParams,
};
use crate::naming::{self, NamingError, SanitizedName};
use crate::paths::{ORIGINAL_VARIANT, PathResolver};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid upload filename: {0}")]
    Filename(#[from] NamingError),
    #[error("invalid field spec: {0}")]
    InvalidFieldSpec(#[from] FieldSpecError),
    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),
    #[error("storage write failed at {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Attach the output path a backend error occurred at. Decode errors
    /// keep their own classification; everything else is a storage failure.
    fn from_backend(err: BackendError, path: &Path) -> Self {
        match err {
            BackendError::Decode(msg) => PipelineError::UnsupportedImageFormat(msg),
            BackendError::Io(source) => PipelineError::StorageWrite {
                path: path.to_path_buf(),
                source,
            },
            BackendError::Encode(msg) => PipelineError::StorageWrite {
                path: path.to_path_buf(),
                source: io::Error::other(msg),
            },
        }
    }

    fn storage(path: &Path, source: io::Error) -> Self {
        PipelineError::StorageWrite {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An uploaded file pending processing: the client's original filename plus
/// the temporary location of the bytes.
///
/// Consumed exactly once by [`DerivativePipeline::build`] — the temp file is
/// moved into the `original` directory and ceases to exist at its old path.
#[derive(Debug)]
pub struct UploadHandle {
    pub client_name: String,
    pub temp_path: PathBuf,
}

impl UploadHandle {
    pub fn new(client_name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            client_name: client_name.into(),
            temp_path: temp_path.into(),
        }
    }
}

/// Identifies one derivative within a set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivativeRole {
    /// The verbatim source copy (`slug_source.ext`).
    OriginalSource,
    /// The verbatim retina copy (`slug@Fx.ext`), retina only.
    OriginalRetina,
    /// The display original (`slug.ext`).
    OriginalFile,
    /// A thumbnail variant, base-sized or retina-sized.
    Thumbnail { name: String, retina: bool },
}

impl fmt::Display for DerivativeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivativeRole::OriginalSource => f.write_str("original.source"),
            DerivativeRole::OriginalRetina => f.write_str("original.retina"),
            DerivativeRole::OriginalFile => f.write_str("original.file"),
            DerivativeRole::Thumbnail { name, retina: true } => {
                write!(f, "thumbnails.{name}.retina")
            }
            DerivativeRole::Thumbnail { name, retina: false } => {
                write!(f, "thumbnails.{name}.original")
            }
        }
    }
}

/// One produced derivative: where it landed and its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    pub path: PathBuf,
    pub dimensions: Dimensions,
}

/// The complete output of one build, keyed by role.
///
/// A set returned from [`DerivativePipeline::build`] is always complete:
/// every thumbnail variant of the field has its `original` entry, plus a
/// `retina` entry when retina is enabled.
#[derive(Debug, Default)]
pub struct DerivativeSet {
    entries: BTreeMap<DerivativeRole, Derivative>,
}

impl DerivativeSet {
    fn insert(&mut self, role: DerivativeRole, path: PathBuf, dimensions: Dimensions) {
        debug!(role = %role, path = %path.display(), "derivative written");
        self.entries.insert(role, Derivative { path, dimensions });
    }

    pub fn get(&self, role: &DerivativeRole) -> Option<&Derivative> {
        self.entries.get(role)
    }

    /// The verbatim source copy; present in every complete set.
    pub fn source(&self) -> Option<&Derivative> {
        self.get(&DerivativeRole::OriginalSource)
    }

    pub fn thumbnail(&self, name: &str, retina: bool) -> Option<&Derivative> {
        self.get(&DerivativeRole::Thumbnail {
            name: name.to_string(),
            retina,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DerivativeRole, &Derivative)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One pipeline invocation, scoped to a single model instance.
///
/// Owns the [`PathResolver`] cache for its lifetime; create a fresh
/// pipeline per upload request and discard it afterwards.
pub struct DerivativePipeline<'a, B: ImageBackend> {
    backend: &'a B,
    config: &'a PipelineConfig,
    resolver: PathResolver,
    retina: RetinaFactor,
    quality: Quality,
}

impl<'a, B: ImageBackend> DerivativePipeline<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig, model: &impl HasImageFields) -> Self {
        let retina = model.retina_factor().unwrap_or(config.retina_factor);
        let resolver = PathResolver::new(
            &config.upload_root,
            model.model_type(),
            &model.model_key(),
        );
        Self {
            backend,
            config,
            resolver,
            retina,
            quality: Quality::new(config.quality),
        }
    }

    /// Generate the complete derivative set for one upload.
    pub fn build(
        &mut self,
        upload: UploadHandle,
        field: &FieldSpec,
    ) -> Result<DerivativeSet, PipelineError> {
        field.validate()?;
        let name = naming::sanitize_filename(&upload.client_name)?;

        let dir_hint = self.resolver.locate(ORIGINAL_VARIANT);
        let original_dir = self
            .resolver
            .resolve(ORIGINAL_VARIANT)
            .map_err(|e| PipelineError::storage(&dir_hint, e))?
            .to_path_buf();

        let source_path = original_dir.join(name.source_name());
        move_upload(&upload.temp_path, &source_path)?;
        let source_dims = self
            .backend
            .identify(&source_path)
            .map_err(|e| PipelineError::from_backend(e, &source_path))?;

        let mut set = DerivativeSet::default();
        set.insert(
            DerivativeRole::OriginalSource,
            source_path.clone(),
            source_dims,
        );

        match self.retina.enabled() {
            Some(factor) => self.build_retina_set(
                &mut set,
                field,
                &name,
                &original_dir,
                &source_path,
                source_dims,
                factor,
            )?,
            None => self.build_plain_set(
                &mut set,
                field,
                &name,
                &original_dir,
                &source_path,
                source_dims,
            )?,
        }

        debug!(
            field = field.name(),
            derivatives = set.len(),
            "derivative set complete"
        );
        Ok(set)
    }

    /// Retina branch: verbatim retina copy, downscaled display original,
    /// and a retina + base pair per thumbnail.
    #[allow(clippy::too_many_arguments)]
    fn build_retina_set(
        &mut self,
        set: &mut DerivativeSet,
        field: &FieldSpec,
        name: &SanitizedName,
        original_dir: &Path,
        source_path: &Path,
        source_dims: Dimensions,
        factor: u32,
    ) -> Result<(), PipelineError> {
        let retina_path = original_dir.join(name.retina_name(factor));
        fs::copy(source_path, &retina_path).map_err(|e| PipelineError::storage(&retina_path, e))?;
        set.insert(DerivativeRole::OriginalRetina, retina_path, source_dims);

        let display = imaging::downscale(source_dims, factor);
        let file_path = original_dir.join(name.file_name());
        let dims = self
            .backend
            .scale_exact(&ScaleParams {
                source: source_path.to_path_buf(),
                output: file_path.clone(),
                width: display.width,
                height: display.height,
                quality: self.quality,
            })
            .map_err(|e| PipelineError::from_backend(e, &file_path))?;
        set.insert(DerivativeRole::OriginalFile, file_path, dims);

        for (thumb_name, spec) in field.thumbnails() {
            let dir_hint = self.resolver.locate(thumb_name);
            let dir = self
                .resolver
                .resolve(thumb_name)
                .map_err(|e| PipelineError::storage(&dir_hint, e))?
                .to_path_buf();

            let retina_out = dir.join(name.retina_name(factor));
            let dims =
                self.render_thumbnail(source_path, &retina_out, field.name(), thumb_name, spec, factor)?;
            set.insert(
                DerivativeRole::Thumbnail {
                    name: thumb_name.to_string(),
                    retina: true,
                },
                retina_out,
                dims,
            );

            let base_out = dir.join(name.file_name());
            let dims =
                self.render_thumbnail(source_path, &base_out, field.name(), thumb_name, spec, 1)?;
            set.insert(
                DerivativeRole::Thumbnail {
                    name: thumb_name.to_string(),
                    retina: false,
                },
                base_out,
                dims,
            );
        }
        Ok(())
    }

    /// Non-retina branch: verbatim display original and one base thumbnail
    /// per variant.
    fn build_plain_set(
        &mut self,
        set: &mut DerivativeSet,
        field: &FieldSpec,
        name: &SanitizedName,
        original_dir: &Path,
        source_path: &Path,
        source_dims: Dimensions,
    ) -> Result<(), PipelineError> {
        let file_path = original_dir.join(name.file_name());
        fs::copy(source_path, &file_path).map_err(|e| PipelineError::storage(&file_path, e))?;
        set.insert(DerivativeRole::OriginalFile, file_path, source_dims);

        for (thumb_name, spec) in field.thumbnails() {
            let dir_hint = self.resolver.locate(thumb_name);
            let dir = self
                .resolver
                .resolve(thumb_name)
                .map_err(|e| PipelineError::storage(&dir_hint, e))?
                .to_path_buf();

            let out = dir.join(name.file_name());
            let dims = self.render_thumbnail(source_path, &out, field.name(), thumb_name, spec, 1)?;
            set.insert(
                DerivativeRole::Thumbnail {
                    name: thumb_name.to_string(),
                    retina: false,
                },
                out,
                dims,
            );
        }
        Ok(())
    }

    /// Produce a single thumbnail derivative at `factor` times the spec's
    /// target size, via the policy's backend operation.
    fn render_thumbnail(
        &self,
        source: &Path,
        output: &Path,
        field_name: &str,
        thumb_name: &str,
        spec: &ThumbnailSpec,
        factor: u32,
    ) -> Result<Dimensions, PipelineError> {
        let result = match spec.policy {
            ResizePolicy::Crop => {
                // Both bounds are guaranteed by field.validate(); a miss
                // here is a spec constructed outside the registry.
                let (Some(width), Some(height)) = (spec.width, spec.height) else {
                    return Err(FieldSpecError::CropBounds {
                        field: field_name.to_string(),
                        thumbnail: thumb_name.to_string(),
                    }
                    .into());
                };
                self.backend.crop(&CropParams {
                    source: source.to_path_buf(),
                    output: output.to_path_buf(),
                    width: width * factor,
                    height: height * factor,
                    quality: self.quality,
                })
            }
            ResizePolicy::Resize => self.backend.fit(&FitParams {
                source: source.to_path_buf(),
                output: output.to_path_buf(),
                max_width: imaging::scale_bound(spec.width, factor),
                max_height: imaging::scale_bound(spec.height, factor),
                allow_upsize: self.config.allow_upsize,
                quality: self.quality,
            }),
        };
        result.map_err(|e| PipelineError::from_backend(e, output))
    }

    /// Read-path lookup: where a stored file lives for one variant of a
    /// field. `None` for unknown variants — an expected miss, not an error.
    /// Does not touch the filesystem.
    pub fn thumbnail_path(
        &self,
        field: &FieldSpec,
        variant: &str,
        file_name: &str,
    ) -> Option<PathBuf> {
        if variant != ORIGINAL_VARIANT && field.thumbnail(variant).is_none() {
            return None;
        }
        Some(self.resolver.locate(variant).join(file_name))
    }
}

/// Move the uploaded temp file into place. Falls back to copy + remove when
/// the temp directory lives on a different filesystem.
fn move_upload(from: &Path, to: &Path) -> Result<(), PipelineError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| PipelineError::storage(to, e))?;
            if let Err(e) = fs::remove_file(from) {
                warn!(path = %from.display(), error = %e, "failed to remove consumed upload");
            }
            Ok(())
        }
        Err(e) => Err(PipelineError::storage(to, e)),
    }
}
