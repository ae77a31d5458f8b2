//! Locator normalization and stable identifiers.
//!
//! Two submissions that differ only in query string, fragment, or trailing
//! slashes map to the same canonical url and therefore the same id.

use thiserror::Error;
use url::Url;

/// FNV-1a 32-bit offset basis
const FNV_OFFSET: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime
const FNV_PRIME: u32 = 0x0100_0193;

/// Tag prefixed to every stable id
const ID_TAG: char = 'h';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("invalid locator '{input}': {reason}")]
    InvalidLocator { input: String, reason: String },
}

/// Canonicalize a locator: drop query and fragment, strip trailing slashes
/// (a bare `/` path is kept).
pub fn normalize(locator: &str) -> Result<String, LocatorError> {
    let mut url = parse_absolute(locator)?;
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 {
        let trimmed = path.trim_end_matches('/');
        url.set_path(trimmed);
    }

    Ok(url.to_string())
}

/// Whether the url's host belongs to `domain`
pub fn is_allowed_host(locator: &str, domain: &str) -> bool {
    match Url::parse(locator.trim()) {
        Ok(url) => url
            .host_str()
            .map(|host| host.to_ascii_lowercase().ends_with(&domain.to_ascii_lowercase()))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Deterministic, non-cryptographic id: `h` + 8 hex digits of FNV-1a over
/// the UTF-8 bytes of `text`.
pub fn stable_id(text: &str) -> String {
    let hash = text.bytes().fold(FNV_OFFSET, |h, byte| {
        (h ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    });
    format!("{}{:08x}", ID_TAG, hash)
}

fn parse_absolute(locator: &str) -> Result<Url, LocatorError> {
    let url = Url::parse(locator.trim()).map_err(|e| LocatorError::InvalidLocator {
        input: locator.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(LocatorError::InvalidLocator {
            input: locator.to_string(),
            reason: "not a hierarchical url".to_string(),
        });
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize("https://tenant.sharepoint.com/path/a/?x=1#frag").unwrap(),
            "https://tenant.sharepoint.com/path/a"
        );
    }

    #[test]
    fn test_normalize_strips_repeated_trailing_slashes() {
        assert_eq!(
            normalize("https://tenant.sharepoint.com/path/a///").unwrap(),
            "https://tenant.sharepoint.com/path/a"
        );
    }

    #[test]
    fn test_normalize_keeps_root_path() {
        assert_eq!(
            normalize("https://tenant.sharepoint.com/?q=1").unwrap(),
            "https://tenant.sharepoint.com/"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "https://tenant.sharepoint.com/path/a/?x=1#frag",
            "https://tenant.sharepoint.com/",
            "https://tenant.sharepoint.com/sites/x/Recordings/Weekly%20Sync.mp4",
            "http://localhost:8080/a/b/",
        ] {
            let once = normalize(input).unwrap();
            assert_eq!(normalize(&once).unwrap(), once, "input: {}", input);
        }
    }

    #[test]
    fn test_normalize_rejects_relative_and_garbage() {
        assert!(normalize("/path/only").is_err());
        assert!(normalize("not a url").is_err());
        assert!(normalize("").is_err());
        assert!(normalize("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_allowed_host() {
        assert!(is_allowed_host("https://tenant.sharepoint.com/a", "sharepoint.com"));
        assert!(is_allowed_host("https://Tenant-My.SharePoint.com/a", "sharepoint.com"));
        assert!(!is_allowed_host("https://example.com/a", "sharepoint.com"));
        assert!(!is_allowed_host("garbage", "sharepoint.com"));
    }

    #[test]
    fn test_stable_id_known_values() {
        // FNV-1a reference vectors
        assert_eq!(stable_id(""), "h811c9dc5");
        assert_eq!(stable_id("a"), "he40c292c");
        assert_eq!(stable_id("foobar"), "hbf9cf968");
    }

    #[test]
    fn test_stable_id_is_deterministic_and_order_sensitive() {
        assert_eq!(stable_id("abc"), stable_id("abc"));
        assert_ne!(stable_id("abc"), stable_id("cba"));
        assert_eq!(stable_id("abc").len(), 9);
    }
}
