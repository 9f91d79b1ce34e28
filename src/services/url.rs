//! URL service
//!
//! Normalization, validation and hashing of page URLs. Page URLs are
//! stored in a canonical internal form: leading and trailing slash, no
//! duplicate slashes, no surrounding whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters allowed in an internal page URL (after normalization)
static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([a-zA-Z0-9\-._~!$&'()*+,;=:@%]+/)*$").unwrap());

#[derive(Debug, Default, Clone)]
pub struct UrlService;

impl UrlService {
    pub fn new() -> Self {
        Self
    }

    /// Bring a candidate URL into canonical internal form.
    pub fn fix_url(&self, url: &str) -> String {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return "/".to_string();
        }

        let mut fixed = String::with_capacity(trimmed.len() + 2);
        fixed.push('/');
        let mut prev_slash = true;
        for c in trimmed.chars() {
            if c == '/' {
                if !prev_slash {
                    fixed.push('/');
                }
                prev_slash = true;
            } else {
                fixed.push(c);
                prev_slash = false;
            }
        }
        if !fixed.ends_with('/') {
            fixed.push('/');
        }
        fixed
    }

    /// Validate a normalized internal URL.
    pub fn is_valid_url(&self, url: &str) -> bool {
        url == "/" || URL_PATTERN.is_match(url)
    }

    /// Hash used for indexed URL lookups. Case-insensitive: the hash is
    /// computed over the lowercased URL.
    pub fn url_hash(&self, url: &str) -> String {
        format!("{:x}", md5::compute(url.to_lowercase().as_bytes()))
    }

    /// Case-insensitive URL equality on normalized forms.
    pub fn urls_equal(&self, left: &str, right: &str) -> bool {
        left.eq_ignore_ascii_case(right)
    }
}
