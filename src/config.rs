//! Pipeline configuration module.
//!
//! Handles loading and validating the pipeline's TOML configuration:
//! process-wide defaults (upload root, retina factor, upload size limit,
//! encode quality) plus the per-model image field declarations consumed by
//! [`FieldRegistry::from_config`](crate::fields::FieldRegistry::from_config).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All top-level options are optional - defaults shown below
//!
//! upload_root = "uploads"   # Base directory for derivative storage
//! retina_factor = 2         # Integer >= 2, or false to disable retina output
//! max_upload_bytes = 5242880 # Upload size cap enforced via the max: rule
//! quality = 90              # JPEG encode quality (1-100)
//! allow_upsize = false      # Permit resize-policy thumbs to exceed source size
//!
//! # Image fields are declared per model type. Thumbnail declaration order
//! # is preserved.
//! [models.article.cover_image.thumbnails.admin]
//! width = 150
//! height = 150
//! policy = "crop"
//!
//! [models.article.cover_image.thumbnails.gallery]
//! width = 1024
//! policy = "resize"
//! ```
//!
//! Config files are sparse — override just the values you want. Unknown
//! keys are rejected to catch typos early.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::fields::FieldConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Retina multiplier applied when generating `@Fx` derivatives.
///
/// In TOML this is either an integer (`retina_factor = 2`) or `false` to
/// disable retina output entirely. `true` selects the stock factor of 2.
/// A factor of 1 is rejected — it would produce `@1x` duplicates of every
/// derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RetinaFactorRepr")]
pub enum RetinaFactor {
    /// No retina derivatives; constraint arithmetic uses a factor of 1.
    Disabled,
    /// Produce retina derivatives at this multiple of the base resolution.
    Factor(u32),
}

impl RetinaFactor {
    /// The multiplier for constraint and scaling arithmetic (1 when disabled).
    pub fn multiplier(self) -> u32 {
        match self {
            RetinaFactor::Disabled => 1,
            RetinaFactor::Factor(f) => f,
        }
    }

    /// The factor when retina output is enabled.
    pub fn enabled(self) -> Option<u32> {
        match self {
            RetinaFactor::Disabled => None,
            RetinaFactor::Factor(f) => Some(f),
        }
    }
}

impl Default for RetinaFactor {
    fn default() -> Self {
        RetinaFactor::Factor(2)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RetinaFactorRepr {
    Flag(bool),
    Factor(u32),
}

impl TryFrom<RetinaFactorRepr> for RetinaFactor {
    type Error = String;

    fn try_from(repr: RetinaFactorRepr) -> Result<Self, Self::Error> {
        match repr {
            RetinaFactorRepr::Flag(false) => Ok(RetinaFactor::Disabled),
            RetinaFactorRepr::Flag(true) => Ok(RetinaFactor::default()),
            RetinaFactorRepr::Factor(f) if f >= 2 => Ok(RetinaFactor::Factor(f)),
            RetinaFactorRepr::Factor(f) => {
                Err(format!("retina_factor must be >= 2 or false, got {f}"))
            }
        }
    }
}

/// Pipeline configuration loaded from TOML.
///
/// All scalar fields have stock defaults; `models` is empty by default and
/// is fed to [`FieldRegistry::from_config`](crate::fields::FieldRegistry::from_config)
/// at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Base directory under which all derivative directories are created.
    pub upload_root: String,
    /// Process-wide retina default; models can override per instance.
    pub retina_factor: RetinaFactor,
    /// Maximum accepted upload size in bytes, emitted as the `max:` rule.
    pub max_upload_bytes: u64,
    /// JPEG encode quality (1-100) for generated derivatives.
    pub quality: u32,
    /// Allow `resize`-policy thumbnails to scale beyond the source size.
    pub allow_upsize: bool,
    /// Image field declarations: model type → field name → thumbnails.
    pub models: BTreeMap<String, BTreeMap<String, FieldConfig>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_root: "uploads".to_string(),
            retina_factor: RetinaFactor::default(),
            max_upload_bytes: 5 * 1024 * 1024,
            quality: 90,
            allow_upsize: false,
            models: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_root.is_empty() {
            return Err(ConfigError::Validation(
                "upload_root must not be empty".into(),
            ));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_upload_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload_root, "uploads");
        assert_eq!(config.retina_factor, RetinaFactor::Factor(2));
    }

    #[test]
    fn sparse_file_overrides_only_named_values() {
        let config = PipelineConfig::from_toml_str("quality = 80").unwrap();
        assert_eq!(config.quality, 80);
        assert_eq!(config.upload_root, "uploads");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml_str("qualty = 80"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn retina_factor_false_disables() {
        let config = PipelineConfig::from_toml_str("retina_factor = false").unwrap();
        assert_eq!(config.retina_factor, RetinaFactor::Disabled);
        assert_eq!(config.retina_factor.multiplier(), 1);
        assert_eq!(config.retina_factor.enabled(), None);
    }

    #[test]
    fn retina_factor_three() {
        let config = PipelineConfig::from_toml_str("retina_factor = 3").unwrap();
        assert_eq!(config.retina_factor.enabled(), Some(3));
    }

    #[test]
    fn retina_factor_one_is_rejected() {
        assert!(PipelineConfig::from_toml_str("retina_factor = 1").is_err());
    }

    #[test]
    fn quality_out_of_range_fails_validation() {
        assert!(matches!(
            PipelineConfig::from_toml_str("quality = 101"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn model_tables_parse() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [models.article.cover_image.thumbnails.admin]
            width = 150
            height = 150

            [models.article.cover_image.thumbnails.gallery]
            width = 1024
            policy = "resize"
            "#,
        )
        .unwrap();

        let fields = &config.models["article"];
        let cover = &fields["cover_image"];
        let names: Vec<&str> = cover.thumbnails.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["admin", "gallery"]);
    }
}
