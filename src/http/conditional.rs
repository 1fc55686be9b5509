//! Conditional request module
//!
//! `ETag` generation and `If-None-Match` evaluation for static assets.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute the `ETag` for a body: quoted `length-hash`, both hex
#[must_use]
pub fn etag_for(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// Whether the client's `If-None-Match` header matches the computed `ETag`.
/// Handles comma-separated candidate lists and the `*` wildcard.
#[must_use]
pub fn etag_matches(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|candidates| {
        candidates
            .split(',')
            .any(|c| c.trim() == etag || c.trim() == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_stable_and_content_sensitive() {
        let a = etag_for(b"hello");
        assert_eq!(a, etag_for(b"hello"));
        assert_ne!(a, etag_for(b"hello!"));
        assert!(a.starts_with('"') && a.ends_with('"'));
    }

    #[test]
    fn test_etag_match() {
        let etag = etag_for(b"hello");
        assert!(etag_matches(Some(&etag), &etag));
        assert!(etag_matches(Some("*"), &etag));
        assert!(etag_matches(Some(&format!("\"other\", {etag}")), &etag));
        assert!(!etag_matches(Some("\"other\""), &etag));
        assert!(!etag_matches(None, &etag));
    }
}
