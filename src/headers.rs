//! Case-insensitive header bundles and the URL-safe token codec.
//!
//! Per-resource upstream headers survive a manifest rewrite by riding in a
//! `headers=` query parameter: base64 (URL-safe alphabet, no padding) over a
//! JSON object of name/value pairs. Tokens minted by older browser clients
//! come from `btoa`, so decoding accepts the standard alphabet as well.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Structural failure while decoding a header token.
///
/// Always recovered by callers: log, continue with an empty bundle.
#[derive(Debug, Error)]
pub enum HeaderDecodeError {
    #[error("token is not valid base64")]
    Base64,
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token payload is not an object of string values")]
    NotAnObject,
}

/// Ordered header map with case-insensitive names.
///
/// [`HeaderBundle::insert`] keeps the first occurrence of a name (duplicate
/// de-duplication is deterministic); [`HeaderBundle::set`] replaces.
/// Insertion order is preserved for iteration, but equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct HeaderBundle {
    entries: Vec<(String, String)>,
}

impl HeaderBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First-occurrence-wins insert. Returns `false` when the name was
    /// already present and the new value was dropped.
    pub fn insert(&mut self, name: &str, value: &str) -> bool {
        if self.get(name).is_some() {
            return false;
        }
        self.entries.push((name.to_string(), value.to_string()));
        true
    }

    /// Replace any existing value for `name`, or append.
    pub fn set(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Header names in insertion order, comma-joined. Feeds
    /// `Access-Control-Expose-Headers`.
    pub fn joined_names(&self) -> String {
        self.entries
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for HeaderBundle {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for HeaderBundle {}

/// Encode a bundle as a URL-safe token.
///
/// An empty bundle encodes to an empty string; callers must then omit the
/// query parameter entirely rather than emit `headers=`.
pub fn encode_token(bundle: &HeaderBundle) -> String {
    if bundle.is_empty() {
        return String::new();
    }
    let mut map = serde_json::Map::new();
    for (name, value) in bundle.iter() {
        map.insert(name.to_string(), Value::String(value.to_string()));
    }
    URL_SAFE_NO_PAD.encode(Value::Object(map).to_string())
}

/// Decode a token back into a bundle.
pub fn decode_token(token: &str) -> Result<HeaderBundle, HeaderDecodeError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| STANDARD.decode(token))
        .map_err(|_| HeaderDecodeError::Base64)?;

    let payload: Value = serde_json::from_slice(&raw)?;
    let Value::Object(map) = payload else {
        return Err(HeaderDecodeError::NotAnObject);
    };

    let mut bundle = HeaderBundle::new();
    for (name, value) in &map {
        let Value::String(value) = value else {
            return Err(HeaderDecodeError::NotAnObject);
        };
        bundle.insert(name, value);
    }
    Ok(bundle)
}

/// Tolerant decode for the serving path: a structural failure is logged and
/// yields an empty bundle, never an error for the request.
pub fn decode_token_lossy(token: &str) -> HeaderBundle {
    match decode_token(token) {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!("discarding malformed headers token: {}", e);
            HeaderBundle::new()
        }
    }
}
