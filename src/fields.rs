//! Image field specifications and the typed model registry.
//!
//! A model declares its image fields in configuration: each field carries an
//! ordered set of named thumbnail variants (`admin`, `gallery`, ...) with a
//! target size and resize policy. At startup those declarations are loaded
//! into a [`FieldRegistry`] keyed by model type, validated once, and queried
//! with explicit miss handling — no lookup by runtime identifier, no
//! implicit nulls.
//!
//! Entities that own image fields implement the [`HasImageFields`]
//! capability trait; the pipeline depends only on that trait, not on any
//! base-type hierarchy.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldSpecError {
    #[error("field '{field}' declares no thumbnails")]
    NoThumbnails { field: String },
    #[error("field '{field}' thumbnail '{thumbnail}': crop policy requires both width and height")]
    CropBounds { field: String, thumbnail: String },
    #[error("field '{field}' thumbnail '{thumbnail}': resize policy requires width or height")]
    ResizeBounds { field: String, thumbnail: String },
    #[error("field '{field}' thumbnail '{thumbnail}': dimensions must be non-zero when set")]
    ZeroDimension { field: String, thumbnail: String },
    #[error("field '{field}': thumbnail name '{thumbnail}' is reserved")]
    ReservedName { field: String, thumbnail: String },
}

/// A [`FieldSpecError`] with the model type it was registered under.
#[derive(Error, Debug)]
#[error("model '{model}': {source}")]
pub struct RegistryError {
    pub model: String,
    #[source]
    pub source: FieldSpecError,
}

/// How a thumbnail derivative is produced from the source image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizePolicy {
    /// Scale to fill and center-crop: output dimensions are exact.
    #[default]
    Crop,
    /// Scale proportionally to fit within the bounds: aspect ratio is kept.
    Resize,
}

/// Target size and policy for one named thumbnail variant.
///
/// A `None` bound means unconstrained in that axis (only meaningful for the
/// `resize` policy; `crop` requires both bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub policy: ResizePolicy,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            policy: ResizePolicy::Crop,
        }
    }
}

impl ThumbnailSpec {
    fn validate(&self, field: &str, thumbnail: &str) -> Result<(), FieldSpecError> {
        let field = field.to_string();
        let thumbnail = thumbnail.to_string();
        if self.width == Some(0) || self.height == Some(0) {
            return Err(FieldSpecError::ZeroDimension { field, thumbnail });
        }
        match self.policy {
            ResizePolicy::Crop if self.width.is_none() || self.height.is_none() => {
                Err(FieldSpecError::CropBounds { field, thumbnail })
            }
            ResizePolicy::Resize if self.width.is_none() && self.height.is_none() => {
                Err(FieldSpecError::ResizeBounds { field, thumbnail })
            }
            _ => Ok(()),
        }
    }
}

/// Serde shape of one image field in the configuration file.
///
/// Thumbnail declaration order is preserved — it determines the order in
/// which derivatives are generated.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    #[serde(deserialize_with = "ordered_thumbnails")]
    pub thumbnails: Vec<(String, ThumbnailSpec)>,
}

/// Deserialize a thumbnail table keeping document order.
fn ordered_thumbnails<'de, D>(deserializer: D) -> Result<Vec<(String, ThumbnailSpec)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, ThumbnailSpec)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of thumbnail name to spec")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

/// One logical image field: its name plus the ordered thumbnail variants.
///
/// Immutable once constructed; validated when registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    thumbnails: Vec<(String, ThumbnailSpec)>,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        thumbnails: impl IntoIterator<Item = (String, ThumbnailSpec)>,
    ) -> Self {
        Self {
            name: name.into(),
            thumbnails: thumbnails.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Thumbnail variants in declaration order.
    pub fn thumbnails(&self) -> impl Iterator<Item = (&str, &ThumbnailSpec)> {
        self.thumbnails.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Look up one variant by name. A miss is an expected outcome on read
    /// paths, not an error.
    pub fn thumbnail(&self, name: &str) -> Option<&ThumbnailSpec> {
        self.thumbnails
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn validate(&self) -> Result<(), FieldSpecError> {
        if self.thumbnails.is_empty() {
            return Err(FieldSpecError::NoThumbnails {
                field: self.name.clone(),
            });
        }
        for (thumbnail, spec) in &self.thumbnails {
            // A variant named like the original directory would overwrite
            // the display original on disk.
            if thumbnail == crate::paths::ORIGINAL_VARIANT {
                return Err(FieldSpecError::ReservedName {
                    field: self.name.clone(),
                    thumbnail: thumbnail.clone(),
                });
            }
            spec.validate(&self.name, thumbnail)?;
        }
        Ok(())
    }
}

/// Capability interface for entities that own image fields.
///
/// The pipeline needs three things from its caller: a model type identifier
/// (drives the directory layout and registry lookups), a primary key, and an
/// optional per-instance retina override.
pub trait HasImageFields {
    /// Model type identifier, e.g. `"article"` or `"blog/Article"`.
    fn model_type(&self) -> &str;

    /// Primary key rendered for the directory layout.
    fn model_key(&self) -> String;

    /// Per-instance retina override. `None` defers to the process-wide
    /// configuration default.
    fn retina_factor(&self) -> Option<crate::config::RetinaFactor> {
        None
    }
}

/// Startup-populated mapping from model type to its image field specs.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    models: BTreeMap<String, Vec<FieldSpec>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the `[models]` configuration tables,
    /// validating every spec.
    pub fn from_config(
        models: &BTreeMap<String, BTreeMap<String, FieldConfig>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (model, fields) in models {
            let specs = fields
                .iter()
                .map(|(name, field)| FieldSpec::new(name.clone(), field.thumbnails.clone()))
                .collect();
            registry.register(model, specs)?;
        }
        Ok(registry)
    }

    /// Register a model's fields, replacing any previous registration.
    pub fn register(
        &mut self,
        model_type: &str,
        fields: Vec<FieldSpec>,
    ) -> Result<(), RegistryError> {
        for field in &fields {
            field.validate().map_err(|source| RegistryError {
                model: model_type.to_string(),
                source,
            })?;
        }
        self.models.insert(model_type.to_string(), fields);
        Ok(())
    }

    /// All fields declared for a model type. `None` for unknown models.
    pub fn fields_for(&self, model_type: &str) -> Option<&[FieldSpec]> {
        self.models.get(model_type).map(Vec::as_slice)
    }

    /// One field of one model. `None` when either level is unknown.
    pub fn field(&self, model_type: &str, field_name: &str) -> Option<&FieldSpec> {
        self.fields_for(model_type)?
            .iter()
            .find(|f| f.name() == field_name)
    }

    pub fn model_types(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop(w: u32, h: u32) -> ThumbnailSpec {
        ThumbnailSpec {
            width: Some(w),
            height: Some(h),
            policy: ResizePolicy::Crop,
        }
    }

    fn resize(w: Option<u32>, h: Option<u32>) -> ThumbnailSpec {
        ThumbnailSpec {
            width: w,
            height: h,
            policy: ResizePolicy::Resize,
        }
    }

    fn field(name: &str, thumbs: &[(&str, ThumbnailSpec)]) -> FieldSpec {
        FieldSpec::new(
            name,
            thumbs.iter().map(|(n, s)| (n.to_string(), *s)),
        )
    }

    #[test]
    fn thumbnails_keep_declaration_order() {
        let f = field(
            "cover",
            &[("zebra", crop(10, 10)), ("admin", crop(20, 20))],
        );
        let names: Vec<&str> = f.thumbnails().map(|(n, _)| n).collect();
        assert_eq!(names, ["zebra", "admin"]);
    }

    #[test]
    fn crop_without_height_is_invalid() {
        let f = field("cover", &[("bad", resize(Some(10), None))]);
        assert!(f.validate().is_ok());

        let mut spec = crop(10, 10);
        spec.height = None;
        let f = field("cover", &[("bad", spec)]);
        assert!(matches!(
            f.validate(),
            Err(FieldSpecError::CropBounds { .. })
        ));
    }

    #[test]
    fn resize_without_any_bound_is_invalid() {
        let f = field("cover", &[("bad", resize(None, None))]);
        assert!(matches!(
            f.validate(),
            Err(FieldSpecError::ResizeBounds { .. })
        ));
    }

    #[test]
    fn zero_dimension_is_invalid() {
        let f = field("cover", &[("bad", crop(0, 100))]);
        assert!(matches!(
            f.validate(),
            Err(FieldSpecError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn original_is_a_reserved_thumbnail_name() {
        let f = field("cover", &[("original", crop(100, 100))]);
        assert!(matches!(
            f.validate(),
            Err(FieldSpecError::ReservedName { .. })
        ));
    }

    #[test]
    fn empty_field_is_invalid() {
        let f = field("cover", &[]);
        assert!(matches!(
            f.validate(),
            Err(FieldSpecError::NoThumbnails { .. })
        ));
    }

    #[test]
    fn registry_lookup_hits_and_misses() {
        let mut registry = FieldRegistry::new();
        registry
            .register("article", vec![field("cover", &[("admin", crop(150, 150))])])
            .unwrap();

        assert!(registry.fields_for("article").is_some());
        assert!(registry.fields_for("page").is_none());
        assert!(registry.field("article", "cover").is_some());
        assert!(registry.field("article", "banner").is_none());
        assert!(registry.field("page", "cover").is_none());
    }

    #[test]
    fn registry_rejects_invalid_spec_naming_the_model() {
        let mut registry = FieldRegistry::new();
        let err = registry
            .register("article", vec![field("cover", &[])])
            .unwrap_err();
        assert_eq!(err.model, "article");
    }

    #[test]
    fn field_config_parses_ordered_toml() {
        let toml = r#"
            [thumbnails.zebra]
            width = 100
            height = 50

            [thumbnails.admin]
            width = 80
            height = 120
            policy = "resize"
        "#;
        let parsed: FieldConfig = toml::from_str(toml).unwrap();
        let names: Vec<&str> = parsed.thumbnails.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zebra", "admin"]);
        assert_eq!(parsed.thumbnails[1].1.policy, ResizePolicy::Resize);
    }

    #[test]
    fn thumbnail_spec_defaults_to_crop() {
        let parsed: ThumbnailSpec = toml::from_str("width = 10\nheight = 20").unwrap();
        assert_eq!(parsed.policy, ResizePolicy::Crop);
    }
}
