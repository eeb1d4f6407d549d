//! The proxy pipeline: fetch, classify, transform, assemble.
//!
//! One request is one strictly linear pass — fetch the target, buffer the
//! body once, classify it once, apply exactly one transform, hand back an
//! assembled response. There are no retries and no second fetch for
//! sniffing; classification runs on the same buffer the response is served
//! from.

pub mod classify;
pub mod manifest;
pub mod normalize;
pub mod resolve;

use crate::{
    config::Config,
    error::{GateError, Result},
    headers::HeaderBundle,
    metrics,
};
use bytes::Bytes;
use classify::Classification;
use normalize::strip_disguise;
use reqwest::{
    Client,
    header::{CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RANGE, USER_AGENT},
};
use tracing::{info, warn};
use url::Url;

/// HLS manifest media type stamped on every rewritten playlist response.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Response headers never forwarded to the client: hop-by-hop headers, plus
/// Content-Length because the body length changes under rewriting and
/// stripping (the server recomputes it from the final body).
const STRIPPED_RESPONSE_HEADERS: [&str; 3] = ["connection", "transfer-encoding", "content-length"];

/// One inbound proxy request, parsed and validated by the serving layer.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Absolute target to fetch from the origin.
    pub target: Url,
    /// Client `Range` header value, forwarded verbatim.
    pub range: Option<String>,
    /// Per-resource upstream headers decoded from the `headers` token.
    pub headers: HeaderBundle,
}

/// Assembled response for the client.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    /// Sanitized header set, CORS included, content type final.
    pub headers: HeaderBundle,
    pub body: Bytes,
}

/// Drive one request end to end.
///
/// The proxy's own public origin (`config.base_url`) is what rewritten
/// manifest references point back at.
pub async fn run(client: &Client, config: &Config, req: ProxyRequest) -> Result<ProxyResponse> {
    let response = fetch_origin(client, config, &req).await?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        metrics::record_origin_error();
        let body = response.bytes().await.unwrap_or_default();
        return Err(GateError::UpstreamStatus { status, body });
    }

    let declared = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let mut headers = sanitize_headers(response.headers());

    // The one and only buffering of the origin body.
    let body = response.bytes().await?;

    match classify::classify(&declared, &body) {
        Classification::Manifest => {
            info!("rewriting manifest from {}", req.target);
            let text = String::from_utf8_lossy(&body);
            let rewritten = manifest::rewrite(&text, &req.target, &config.base_url, &req.headers);
            headers.set("Content-Type", MANIFEST_CONTENT_TYPE);
            metrics::record_transform("manifest");
            Ok(ProxyResponse {
                status,
                headers,
                body: Bytes::from(rewritten.into_bytes()),
            })
        }
        Classification::BinaryMedia => {
            let mut body = body;
            if let Some(signature) = &config.disguise {
                let (normalized, stripped) =
                    strip_disguise(body, req.range.is_some(), signature);
                body = normalized;
                if stripped {
                    info!(
                        "stripped {}-byte disguise prefix from {}",
                        signature.strip_len, req.target
                    );
                    // The origin's declared type described the disguise,
                    // not the payload.
                    headers.set("Content-Type", &signature.real_content_type);
                    metrics::record_transform("strip");
                }
            }
            Ok(ProxyResponse {
                status,
                headers,
                body,
            })
        }
        Classification::PlainText => Ok(ProxyResponse {
            status,
            headers,
            body,
        }),
    }
}

/// Build the outbound header set and fetch the target, following redirects.
///
/// Precedence, lowest to highest: fixed defaults, the decoded header
/// bundle, the client's own `Range`. Bundle entries that are not valid
/// HTTP header names or values are skipped, not fatal.
async fn fetch_origin(
    client: &Client,
    config: &Config,
    req: &ProxyRequest,
) -> Result<reqwest::Response> {
    let mut outbound = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&config.upstream_user_agent) {
        outbound.insert(USER_AGENT, ua);
    }
    outbound.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    for (name, value) in req.headers.iter() {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("skipping invalid upstream header name '{}'", name);
            continue;
        };
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                outbound.insert(header_name, header_value);
            }
            Err(_) => warn!("skipping invalid value for upstream header '{}'", name),
        }
    }

    if let Some(range) = &req.range {
        match HeaderValue::from_str(range) {
            Ok(value) => {
                outbound.insert(RANGE, value);
            }
            Err(_) => warn!("ignoring malformed Range header"),
        }
    }

    info!("fetching origin resource: {}", req.target);
    Ok(client
        .get(req.target.clone())
        .headers(outbound)
        .send()
        .await?)
}

/// Collapse, strip, and re-CORS the origin's response headers.
///
/// Duplicate names keep their first occurrence. Hop-by-hop headers and the
/// origin's own `Access-Control-*` headers go away (they would fight the
/// proxy's CORS policy); the surviving set is then exposed to browsers
/// wholesale.
pub fn sanitize_headers(origin_headers: &HeaderMap) -> HeaderBundle {
    let mut sanitized = HeaderBundle::new();
    for (name, value) in origin_headers {
        let name = name.as_str();
        if STRIPPED_RESPONSE_HEADERS.contains(&name) || name.starts_with("access-control-") {
            continue;
        }
        let Ok(value) = value.to_str() else {
            warn!("dropping non-text origin header '{}'", name);
            continue;
        };
        sanitized.insert(name, value);
    }

    let exposed = sanitized.joined_names();
    sanitized.set("Access-Control-Allow-Origin", "*");
    if !exposed.is_empty() {
        sanitized.set("Access-Control-Expose-Headers", &exposed);
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let sanitized = sanitize_headers(&origin_headers(&[
            ("content-type", "video/mp2t"),
            ("connection", "keep-alive"),
            ("transfer-encoding", "chunked"),
            ("content-length", "12345"),
        ]));

        assert_eq!(sanitized.get("content-type"), Some("video/mp2t"));
        assert_eq!(sanitized.get("connection"), None);
        assert_eq!(sanitized.get("transfer-encoding"), None);
        assert_eq!(sanitized.get("content-length"), None);
    }

    #[test]
    fn origin_cors_headers_are_replaced_with_ours() {
        let sanitized = sanitize_headers(&origin_headers(&[
            ("access-control-allow-origin", "https://player.example"),
            ("access-control-expose-headers", "X-Origin-Secret"),
            ("content-type", "text/plain"),
        ]));

        assert_eq!(sanitized.get("access-control-allow-origin"), Some("*"));
        assert_eq!(
            sanitized.get("access-control-expose-headers"),
            Some("content-type")
        );
    }

    #[test]
    fn duplicate_headers_keep_first_occurrence() {
        let sanitized = sanitize_headers(&origin_headers(&[
            ("x-cache", "HIT"),
            ("x-cache", "MISS"),
        ]));
        assert_eq!(sanitized.get("x-cache"), Some("HIT"));
    }

    #[test]
    fn expose_headers_lists_surviving_names() {
        let sanitized = sanitize_headers(&origin_headers(&[
            ("content-type", "text/plain"),
            ("connection", "close"),
            ("x-cache", "HIT"),
        ]));
        assert_eq!(
            sanitized.get("access-control-expose-headers"),
            Some("content-type, x-cache")
        );
    }

    #[test]
    fn empty_origin_header_set_still_gets_cors() {
        let sanitized = sanitize_headers(&HeaderMap::new());
        assert_eq!(sanitized.get("access-control-allow-origin"), Some("*"));
        assert_eq!(sanitized.get("access-control-expose-headers"), None);
    }
}
