use serde::Serialize;
use sha2::{Digest, Sha256};

/// Describes what `truncate_text` did to a field. When content was cut,
/// `sha256` fingerprints the full original so the payload can be verified
/// or deduplicated later without storing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TruncationMeta {
    pub truncated: bool,
    pub orig_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kept_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl TruncationMeta {
    fn untouched(orig_len: usize) -> Self {
        Self {
            truncated: false,
            orig_len,
            kept_len: None,
            sha256: None,
        }
    }
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`.
pub fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Keep at most `max_chars` characters of `text`. Lengths are counted in
/// chars, not bytes, so the cut never lands inside a code point.
pub fn truncate_text(text: &str, max_chars: usize) -> (String, TruncationMeta) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), TruncationMeta::untouched(text.chars().count())),
        Some((byte_idx, _)) => {
            let head = &text[..byte_idx];
            let meta = TruncationMeta {
                truncated: true,
                orig_len: text.chars().count(),
                kept_len: Some(max_chars),
                sha256: Some(sha256_hex(text)),
            };
            (head.to_string(), meta)
        }
    }
}
