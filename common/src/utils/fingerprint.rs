use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Normalize free text for fingerprinting: NFC, lowercased, inner
/// whitespace collapsed to single spaces, trimmed.
pub fn normalize(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic content fingerprint over normalized title and content.
///
/// The separator keeps ("ab", "c") and ("a", "bc") from colliding.
pub fn content_fingerprint(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(title).as_bytes());
    hasher.update(b"||");
    hasher.update(normalize(content).as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")
}
