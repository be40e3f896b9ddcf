//! Filename sanitization for uploaded files.
//!
//! Client-supplied filenames are arbitrary: Unicode, spaces, mixed case,
//! even path separators. Everything stored on disk goes through
//! [`sanitize_filename`] first, which produces a `slug.ext` name that is
//! safe to embed in URLs and directory layouts.
//!
//! The derived names for one upload all share the same slug:
//! - `cafe-photo_source.jpg` — the verbatim source copy
//! - `cafe-photo@2x.jpg` — the retina variant
//! - `cafe-photo.jpg` — the display original and every thumbnail

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NamingError {
    /// The filename has no extension. Rejected outright rather than stored
    /// under a bare slug, so the caller can surface a validation message.
    #[error("filename '{0}' has no extension")]
    MissingExtension(String),
    /// Nothing usable remains of the base name after slugging
    /// (e.g. the name was entirely punctuation or unmapped script).
    #[error("filename '{0}' has no usable name part")]
    EmptyName(String),
}

/// A sanitized filename split into slug and extension.
///
/// Construct via [`sanitize_filename`]. The parts are kept separate because
/// every derived name (`_source`, `@2x`) is built by re-joining them with
/// an infix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedName {
    /// Lower-case ASCII slug of the original base name.
    pub stem: String,
    /// Lower-case extension, ASCII alphanumerics only.
    pub ext: String,
}

impl SanitizedName {
    /// Plain `slug.ext` name used for the display original and thumbnails.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }

    /// `slug_source.ext` — the name under which the untouched upload is kept.
    pub fn source_name(&self) -> String {
        format!("{}_source.{}", self.stem, self.ext)
    }

    /// `slug@Fx.ext` — the name for a retina variant at the given factor.
    pub fn retina_name(&self, factor: u32) -> String {
        format!("{}@{}x.{}", self.stem, factor, self.ext)
    }
}

/// Sanitize a client-supplied filename into a `slug.ext` name.
///
/// Handles these patterns:
/// - `"Café Photo.JPG"` → `cafe-photo.jpg`
/// - `"my.photo.final.png"` → `my-photo-final.png` (last dot wins)
/// - `"../../etc/secret.png"` → `secret.png` (directories stripped)
/// - `"photo"` → [`NamingError::MissingExtension`]
/// - `"***.jpg"` → [`NamingError::EmptyName`]
///
/// The result is a fixed point: sanitizing a sanitized name returns it
/// unchanged.
pub fn sanitize_filename(raw: &str) -> Result<SanitizedName, NamingError> {
    // Strip any directory components first. Path::file_name treats
    // backslashes as plain characters on Unix, so split on both separators.
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let path = Path::new(base);
    let ext: String = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect(),
        None => String::new(),
    };
    if ext.is_empty() {
        return Err(NamingError::MissingExtension(raw.to_string()));
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let slug = slugify(stem);
    if slug.is_empty() {
        return Err(NamingError::EmptyName(raw.to_string()));
    }

    Ok(SanitizedName { stem: slug, ext })
}

/// Lower-case ASCII slug: Latin-1 letters transliterated, every other
/// non-alphanumeric run collapsed to a single dash, no leading/trailing dash.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        for t in transliterate(c) {
            if t.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(t.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
    }

    slug
}

/// Map Latin-1 supplement letters to their ASCII base form.
///
/// Characters outside ASCII and this table act as separators.
fn transliterate(c: char) -> impl Iterator<Item = char> {
    let mapped: &'static str = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ç' | 'Ç' => "c",
        'ñ' | 'Ñ' => "n",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        'ð' | 'Ð' => "d",
        'þ' | 'Þ' => "th",
        _ if c.is_ascii() => return Transliterated::Keep(Some(c)),
        _ => "",
    };
    Transliterated::Mapped(mapped.chars())
}

/// Iterator over the ASCII expansion of a single character.
enum Transliterated {
    Keep(Option<char>),
    Mapped(std::str::Chars<'static>),
}

impl Iterator for Transliterated {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self {
            Transliterated::Keep(c) => c.take(),
            Transliterated::Mapped(chars) => chars.next(),
        }
    }
}
