//! Disguise-prefix stripping for binary media payloads.
//!
//! Some origins prepend a fixed image header to media segments so that
//! intermediate inspection sees a picture instead of a transport stream.
//! When the configured signature matches the front of a buffered payload,
//! the prefix is cut off and the true media type restored.

use bytes::Bytes;

/// Default magic: the first seven bytes of a PNG file.
pub const PNG_PREFIX: [u8; 7] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A];

/// Default media type hiding behind the disguise.
pub const DEFAULT_REAL_CONTENT_TYPE: &str = "video/mp2t";

/// Externally supplied disguise description.
///
/// `strip_len` may exceed `magic.len()` when the disguise is a whole
/// wrapper rather than just its signature. Observed deployments disagree on
/// both values, so nothing here is hardcoded at the call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct DisguiseSignature {
    /// Bytes expected at offset zero of a disguised payload.
    pub magic: Vec<u8>,
    /// Leading bytes to discard when the magic matches.
    pub strip_len: usize,
    /// Declared content type for the response after a strip.
    pub real_content_type: String,
}

impl Default for DisguiseSignature {
    fn default() -> Self {
        Self {
            magic: PNG_PREFIX.to_vec(),
            strip_len: PNG_PREFIX.len(),
            real_content_type: DEFAULT_REAL_CONTENT_TYPE.to_string(),
        }
    }
}

/// Strip the disguise prefix from `body` if it is present.
///
/// Returns the (possibly shortened) body and whether a strip happened.
/// Range responses are never touched: their byte offsets are
/// origin-relative and shifting them would corrupt playback. A mismatch or
/// a body shorter than the magic is a normal outcome, not a failure.
pub fn strip_disguise(
    body: Bytes,
    is_range_request: bool,
    signature: &DisguiseSignature,
) -> (Bytes, bool) {
    if is_range_request
        || signature.magic.is_empty()
        || body.len() < signature.magic.len()
        || body.len() < signature.strip_len
    {
        return (body, false);
    }

    if !body.starts_with(&signature.magic) {
        return (body, false);
    }

    let stripped = body.slice(signature.strip_len..);
    (stripped, true)
}
