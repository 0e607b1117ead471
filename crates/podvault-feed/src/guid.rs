//! Stable identifiers for podcasts and episodes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha256};

/// Replace every run of characters outside `[A-Za-z0-9=_-]` with a single `-`.
pub fn sanitize(guid: &str) -> String {
    let mut out = String::with_capacity(guid.len());
    let mut in_run = false;
    for c in guid.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '=' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

/// Derive a guid from arbitrary text when a feed does not provide one.
pub fn derive(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    sanitize(&URL_SAFE.encode(digest))
}
