// PromptTrail anchor fingerprints
// A short content digest stored with each anchor, so a message id reused for
// different text is detected instead of silently resolving to the wrong span.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::digest;

/// Number of digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 12;

/// SHA-256 of `text`, truncated and URL-safe base64 encoded.
pub fn fingerprint(text: &str) -> String {
    let d = digest::digest(&digest::SHA256, text.as_bytes());
    URL_SAFE_NO_PAD.encode(&d.as_ref()[..FINGERPRINT_BYTES])
}

/// Whether `text` still matches a stored fingerprint. Anchors without one always match.
pub fn matches(stored: Option<&str>, text: &str) -> bool {
    match stored {
        Some(fp) => fingerprint(text) == fp,
        None => true,
    }
}
