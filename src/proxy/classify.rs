//! Response classification: manifest, binary media, or plain text.
//!
//! Runs exactly once per request against the body the response will be
//! served from — never a second origin fetch to sniff.

use tracing::debug;

/// What the proxy decided a buffered origin response is.
///
/// Derived once per response; the transform dispatch never re-evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// An HLS playlist — gets the line rewrite treatment.
    Manifest,
    /// Binary media (segments, keys, images) — gets disguise stripping.
    BinaryMedia,
    /// Anything else — passed through untouched.
    PlainText,
}

/// Declared content types that assert an HLS manifest.
const MANIFEST_CONTENT_TYPES: [&str; 4] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// Fraction of control bytes above which a body is considered binary.
const BINARY_CONTROL_RATIO: f64 = 0.1;

/// Classify a fully buffered response.
///
/// The sniffed `#EXTM3U` marker outranks the declared content type in both
/// directions: a body carrying the marker is a manifest whatever the origin
/// declared, and a declared manifest type without the marker is not one.
/// The control-byte heuristic catches origins that serve segments under
/// generic or text types.
pub fn classify(declared_content_type: &str, body: &[u8]) -> Classification {
    if sniff_manifest(body) {
        return Classification::Manifest;
    }

    let declared = declared_content_type.to_ascii_lowercase();
    if MANIFEST_CONTENT_TYPES.iter().any(|t| declared.contains(t)) {
        debug!(
            "declared manifest type '{}' but body lacks #EXTM3U marker",
            declared_content_type
        );
    }

    if is_binary_content_type(&declared) || control_byte_ratio(body) > BINARY_CONTROL_RATIO {
        return Classification::BinaryMedia;
    }

    Classification::PlainText
}

/// `#EXTM3U` after leading whitespace.
fn sniff_manifest(body: &[u8]) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body[start..].starts_with(b"#EXTM3U")
}

fn is_binary_content_type(declared: &str) -> bool {
    declared.contains("video/")
        || declared.contains("audio/")
        || declared.contains("image/")
        || declared.contains("application/octet-stream")
}

/// Fraction of bytes that are control characters other than tab/LF/CR.
fn control_byte_ratio(body: &[u8]) -> f64 {
    if body.is_empty() {
        return 0.0;
    }
    let control = body
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();
    control as f64 / body.len() as f64
}
