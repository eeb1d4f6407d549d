use crate::{
    error::{GateError, Result},
    headers::decode_token_lossy,
    metrics,
    proxy::{self, ProxyRequest},
    server::{state::AppState, url_validation::validate_target_url},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Query parameters of the proxy endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyParams {
    /// Percent-encoded absolute URL of the origin resource.
    url: Option<String>,
    /// Opaque header bundle token minted by the manifest rewriter.
    headers: Option<String>,
}

/// Proxy an origin manifest or media segment to the player.
pub async fn serve_proxy(
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let request = parse_request(&params, &request_headers)?;
    if !state.config.allow_private_networks {
        validate_target_url(&request.target)?;
    }

    info!(
        "proxying {}{}",
        request.target,
        if request.range.is_some() {
            " (range request)"
        } else {
            ""
        }
    );

    match proxy::run(&state.http_client, &state.config, request).await {
        Ok(outcome) => {
            metrics::record_request("proxy", outcome.status);
            metrics::record_duration("proxy", start);
            assemble_response(outcome)
        }
        Err(e) => {
            metrics::record_request("proxy", e.client_status().as_u16());
            metrics::record_duration("proxy", start);
            Err(e)
        }
    }
}

/// Answer a CORS preflight. No origin fetch happens here.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Content-Type, Authorization, Range",
            ),
            (header::ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}

/// Parse the inbound request into a [`ProxyRequest`].
///
/// The target must be an absolute http(s) URL. The header token is decoded
/// tolerantly — a malformed token degrades to an empty bundle rather than
/// failing the request.
fn parse_request(params: &ProxyParams, request_headers: &HeaderMap) -> Result<ProxyRequest> {
    let raw = params
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| GateError::InvalidTarget("missing 'url' query parameter".to_string()))?;

    let target =
        Url::parse(raw).map_err(|e| GateError::InvalidTarget(format!("'{raw}': {e}")))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(GateError::InvalidTarget(format!(
            "scheme '{}' not allowed",
            target.scheme()
        )));
    }

    let headers = params
        .headers
        .as_deref()
        .map(decode_token_lossy)
        .unwrap_or_default();

    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    Ok(ProxyRequest {
        target,
        range,
        headers,
    })
}

/// Convert the pipeline's outcome into an Axum response.
fn assemble_response(outcome: proxy::ProxyResponse) -> Result<Response> {
    let status = StatusCode::from_u16(outcome.status)
        .map_err(|_| GateError::Internal(format!("origin status {} out of range", outcome.status)))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in outcome.headers.iter() {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("dropping unassemblable response header '{}'", name);
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            warn!("dropping unassemblable response header value for '{}'", name);
            continue;
        };
        builder = builder.header(name, value);
    }

    builder
        .body(Body::from(outcome.body))
        .map_err(|e| GateError::Internal(format!("response assembly failed: {e}")))
}
