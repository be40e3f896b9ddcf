//! Validation rule synthesis for image fields.
//!
//! The external validation layer consumes pipe-delimited rule strings
//! (`required|dimensions:min_width=400,min_height=200|max:5242880`). This
//! module derives the constraints an upload must satisfy — minimum source
//! dimensions from the field's thumbnail specs and the configured upload
//! size cap — and merges them into a field's existing rule string.
//!
//! Synthesis runs once per field at registration time, before any upload
//! exists, via [`register_image_field`]. The merge is idempotent: stale
//! `dimensions:` and `max:` clauses are replaced, never accumulated.

use crate::config::RetinaFactor;
use crate::fields::FieldSpec;

/// Derived validation constraints for one image field.
///
/// Computed once per field registration and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSet {
    /// Minimum source width in pixels; 0 when no thumbnail bounds width.
    pub min_width: u32,
    /// Minimum source height in pixels; 0 when no thumbnail bounds height.
    pub min_height: u32,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
}

impl ConstraintSet {
    /// Derive the constraints for a field under the given retina factor.
    pub fn derive(field: &FieldSpec, retina: RetinaFactor, max_upload_bytes: u64) -> Self {
        let (min_width, min_height) = minimum_size(field, retina);
        Self {
            min_width,
            min_height,
            max_upload_bytes,
        }
    }
}

/// Minimum source dimensions for a field: the per-axis maximum across its
/// thumbnail specs, scaled by the retina factor (1 when disabled).
///
/// A source at least this large can produce every declared derivative
/// without upsizing. Unbounded axes contribute 0.
pub fn minimum_size(field: &FieldSpec, retina: RetinaFactor) -> (u32, u32) {
    let factor = retina.multiplier();
    let mut min_width = 0;
    let mut min_height = 0;
    for (_, thumb) in field.thumbnails() {
        min_width = min_width.max(thumb.width.unwrap_or(0));
        min_height = min_height.max(thumb.height.unwrap_or(0));
    }
    (min_width * factor, min_height * factor)
}

/// Merge derived constraints into an existing pipe-delimited rule string.
///
/// Any pre-existing `dimensions:` and `max:` clauses are dropped, then a
/// fresh `dimensions:min_width=W,min_height=H` clause (omitting zero
/// bounds, or the whole clause when both are zero) and a `max:<bytes>`
/// clause are appended. Other clauses keep their order. Re-running on the
/// output returns it unchanged.
pub fn synthesize_rule(existing: &str, constraints: &ConstraintSet) -> String {
    let mut clauses: Vec<String> = existing
        .split('|')
        .filter(|c| !c.is_empty())
        .filter(|c| !c.starts_with("dimensions:") && !c.starts_with("max:"))
        .map(str::to_string)
        .collect();

    let mut bounds = Vec::new();
    if constraints.min_width > 0 {
        bounds.push(format!("min_width={}", constraints.min_width));
    }
    if constraints.min_height > 0 {
        bounds.push(format!("min_height={}", constraints.min_height));
    }
    if !bounds.is_empty() {
        clauses.push(format!("dimensions:{}", bounds.join(",")));
    }
    clauses.push(format!("max:{}", constraints.max_upload_bytes));

    clauses.join("|")
}

/// Explicit field-registration step: derive the field's constraints and
/// return the merged rule string for the caller to store.
///
/// Called once during model/schema setup — this replaces construction-time
/// event wiring; nothing is registered implicitly.
pub fn register_image_field(
    field: &FieldSpec,
    existing_rule: &str,
    retina: RetinaFactor,
    max_upload_bytes: u64,
) -> String {
    let constraints = ConstraintSet::derive(field, retina, max_upload_bytes);
    synthesize_rule(existing_rule, &constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ResizePolicy, ThumbnailSpec};

    fn thumb(width: Option<u32>, height: Option<u32>) -> ThumbnailSpec {
        ThumbnailSpec {
            width,
            height,
            policy: ResizePolicy::Crop,
        }
    }

    fn field(thumbs: &[(&str, ThumbnailSpec)]) -> FieldSpec {
        FieldSpec::new(
            "cover",
            thumbs.iter().map(|(n, s)| (n.to_string(), *s)),
        )
    }

    fn constraints(min_width: u32, min_height: u32, max_upload_bytes: u64) -> ConstraintSet {
        ConstraintSet {
            min_width,
            min_height,
            max_upload_bytes,
        }
    }

    #[test]
    fn minimum_size_takes_per_axis_maximum_scaled_by_retina() {
        let f = field(&[
            ("thumb_a", thumb(Some(100), Some(50))),
            ("thumb_b", thumb(Some(80), Some(120))),
        ]);
        assert_eq!(minimum_size(&f, RetinaFactor::Factor(2)), (200, 240));
        assert_eq!(minimum_size(&f, RetinaFactor::Disabled), (100, 120));
    }

    #[test]
    fn minimum_size_treats_unbounded_axes_as_zero() {
        let f = field(&[("wide", thumb(Some(300), None))]);
        assert_eq!(minimum_size(&f, RetinaFactor::Factor(2)), (600, 0));
    }

    #[test]
    fn synthesize_into_empty_rule() {
        let rule = synthesize_rule("", &constraints(200, 240, 5_242_880));
        assert_eq!(rule, "dimensions:min_width=200,min_height=240|max:5242880");
    }

    #[test]
    fn synthesize_preserves_unrelated_clauses_in_order() {
        let rule = synthesize_rule(
            "required|image|mimes:jpeg,png",
            &constraints(200, 0, 1024),
        );
        assert_eq!(
            rule,
            "required|image|mimes:jpeg,png|dimensions:min_width=200|max:1024"
        );
    }

    #[test]
    fn synthesize_replaces_stale_clauses() {
        let rule = synthesize_rule(
            "required|dimensions:min_width=50,min_height=60|max:999",
            &constraints(200, 240, 1024),
        );
        assert_eq!(
            rule,
            "required|dimensions:min_width=200,min_height=240|max:1024"
        );
    }

    #[test]
    fn synthesize_is_idempotent() {
        let c = constraints(200, 240, 5_242_880);
        let once = synthesize_rule("required|image", &c);
        let twice = synthesize_rule(&once, &c);
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_bounds_omit_the_dimensions_clause() {
        let rule = synthesize_rule("required", &constraints(0, 0, 1024));
        assert_eq!(rule, "required|max:1024");
    }

    #[test]
    fn register_image_field_combines_derivation_and_merge() {
        let f = field(&[
            ("thumb_a", thumb(Some(100), Some(50))),
            ("thumb_b", thumb(Some(80), Some(120))),
        ]);
        let rule = register_image_field(&f, "required", RetinaFactor::Factor(2), 5_242_880);
        assert_eq!(
            rule,
            "required|dimensions:min_width=200,min_height=240|max:5242880"
        );
    }
}
