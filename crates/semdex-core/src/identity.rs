//! Deterministic document identity.
//!
//! A document id is the URL-safe base64 encoding (no padding) of its
//! source locator. The mapping is a pure function of the locator string,
//! so re-indexing the same path or blob URL always targets the same row,
//! and it is reversible, so distinct locators can never collide.
//!
//! The URL-safe alphabet keeps ids usable as a single path segment
//! (`DELETE /api/documents/{id}`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Derive the document id for a source locator.
///
/// ```rust
/// use semdex_core::identity::{identify, locator_of};
///
/// let id = identify("/srv/docs/plan.md");
/// assert_eq!(id, identify("/srv/docs/plan.md"));
/// assert_eq!(locator_of(&id).as_deref(), Some("/srv/docs/plan.md"));
/// ```
pub fn identify(source_locator: &str) -> String {
    URL_SAFE_NO_PAD.encode(source_locator.as_bytes())
}

/// Recover the source locator from an id produced by [`identify`].
///
/// Returns `None` for strings that are not valid ids.
pub fn locator_of(id: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(id).ok()?;
    String::from_utf8(bytes).ok()
}

/// Display name for a locator: the last path segment, without any URL
/// query or fragment. Falls back to the whole locator.
pub fn filename_from_locator(source_locator: &str) -> String {
    let without_query = source_locator
        .split(['?', '#'])
        .next()
        .unwrap_or(source_locator);
    without_query
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(source_locator)
        .to_string()
}
