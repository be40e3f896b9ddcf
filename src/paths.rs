//! Upload directory layout and resolution.
//!
//! Every derivative of one model instance lives under a directory derived
//! from the model's identity:
//!
//! ```text
//! uploads/
//! └── blog_article/            # lower-cased model type, separators → _
//!     └── 42/                  # primary key
//!         ├── original/        # source copy, retina copy, display original
//!         │   ├── cafe-photo_source.jpg
//!         │   ├── cafe-photo@2x.jpg
//!         │   └── cafe-photo.jpg
//!         └── admin/           # one directory per thumbnail variant
//!             ├── cafe-photo@2x.jpg
//!             └── cafe-photo.jpg
//! ```
//!
//! A [`PathResolver`] is owned by a single pipeline invocation and caches
//! each variant's resolved directory for its lifetime; the cache dies with
//! the invocation context.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Variant directory holding the source copy and display original.
pub const ORIGINAL_VARIANT: &str = "original";

/// Directory form of a model type identifier: `::`, `/` and `\` separators
/// become underscores, the result is lower-cased.
///
/// - `"blog/Article"` → `blog_article`
/// - `"admin::users::Avatar"` → `admin_users_avatar`
pub fn model_subdir(model_type: &str) -> String {
    model_type
        .replace("::", "_")
        .replace(['/', '\\'], "_")
        .trim_matches('_')
        .to_ascii_lowercase()
}

/// Resolves and creates variant directories for one model instance.
pub struct PathResolver {
    base: PathBuf,
    cache: HashMap<String, PathBuf>,
}

impl PathResolver {
    pub fn new(upload_root: impl AsRef<Path>, model_type: &str, model_key: &str) -> Self {
        let base = upload_root
            .as_ref()
            .join(model_subdir(model_type))
            .join(model_key);
        Self {
            base,
            cache: HashMap::new(),
        }
    }

    /// The directory a variant maps to, without touching the filesystem.
    /// Used on read paths where nothing should be created.
    pub fn locate(&self, variant: &str) -> PathBuf {
        self.base.join(variant)
    }

    /// Resolve the directory for a variant, creating it (and parents) if
    /// missing. Idempotent; a concurrent invocation creating the same
    /// directory is benign because `create_dir_all` treats "already exists"
    /// as success.
    pub fn resolve(&mut self, variant: &str) -> io::Result<&Path> {
        if !self.cache.contains_key(variant) {
            let dir = self.base.join(variant);
            fs::create_dir_all(&dir)?;
            debug!(dir = %dir.display(), "resolved upload directory");
            self.cache.insert(variant.to_string(), dir);
        }
        Ok(&self.cache[variant])
    }
}
