//! Reference resolution and outbound proxy URL construction.

use crate::headers::{HeaderBundle, encode_token};
use thiserror::Error;
use url::Url;

/// A manifest line's reference could not be parsed against its base.
///
/// Contained per line: the rewriter logs it and leaves the line as-is.
#[derive(Debug, Error)]
#[error("cannot resolve '{reference}': {source}")]
pub struct UrlResolutionError {
    pub reference: String,
    #[source]
    source: url::ParseError,
}

/// Resolve a possibly-relative reference against the URL of the manifest it
/// appeared in. Absolute references pass through, relative paths and
/// scheme-relative authorities resolve per standard URL rules.
pub fn resolve(reference: &str, base: &Url) -> Result<Url, UrlResolutionError> {
    base.join(reference).map_err(|source| UrlResolutionError {
        reference: reference.to_string(),
        source,
    })
}

/// Compose the proxy URL a player will fetch instead of the origin URL.
///
/// The target travels as one opaque percent-encoded query value, never
/// split. The `headers` parameter is appended only when the bundle is
/// non-empty — an empty token is never emitted.
pub fn build_proxy_url(origin: &str, target: &Url, bundle: &HeaderBundle) -> String {
    let mut proxied = format!(
        "{}/proxy?url={}",
        origin.trim_end_matches('/'),
        urlencoding::encode(target.as_str())
    );
    if !bundle.is_empty() {
        proxied.push_str("&headers=");
        proxied.push_str(&encode_token(bundle));
    }
    proxied
}
