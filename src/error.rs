use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;
use tracing::error;

/// Convenience alias used by handlers and the proxy pipeline.
pub type Result<T> = std::result::Result<T, GateError>;

/// Request-terminating failures.
///
/// Per-line and per-token failures (`UrlResolutionError`,
/// `HeaderDecodeError`) are recovered where they occur and never reach this
/// enum.
#[derive(Debug, Error)]
pub enum GateError {
    /// Origin could not be reached at all.
    #[error("origin fetch failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Origin answered with a non-success status; mirrored to the client
    /// together with the origin's own error body.
    #[error("origin returned status {status}")]
    UpstreamStatus { status: u16, body: Bytes },

    /// The `url` query parameter is missing or not an absolute http(s) URL.
    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    /// The target resolves into a private or reserved network.
    #[error("target not allowed: {0}")]
    ForbiddenTarget(String),

    /// Anything unexpected inside the transform pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Client-visible status for this error.
    pub fn client_status(&self) -> StatusCode {
        match self {
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::UpstreamStatus { status, .. } => clamp_upstream_status(*status),
            GateError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            GateError::ForbiddenTarget(_) => StatusCode::FORBIDDEN,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Clamp an origin status into the client-error/server-error range.
///
/// A redirect or other sub-400 status reaching the error path means the
/// origin answered with something we cannot mirror as an error; report 500.
fn clamp_upstream_status(status: u16) -> StatusCode {
    if (400..=599).contains(&status) {
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        error!("request failed: {}", self);

        let status = self.client_status();
        let body = match self {
            GateError::UpstreamStatus { body, .. } => body,
            other => Bytes::from(format!("Proxy error: {other}")),
        };

        (
            status,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            ],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_mirrored() {
        let err = GateError::UpstreamStatus {
            status: 404,
            body: Bytes::from_static(b"not here"),
        };
        assert_eq!(err.client_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn sub_400_upstream_status_becomes_500() {
        for status in [101, 200, 204, 301, 399] {
            let err = GateError::UpstreamStatus {
                status,
                body: Bytes::new(),
            };
            assert_eq!(err.client_status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn out_of_range_upstream_status_becomes_500() {
        let err = GateError::UpstreamStatus {
            status: 600,
            body: Bytes::new(),
        };
        assert_eq!(err.client_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_statuses_pass_through_unclamped() {
        for status in [400, 403, 418, 500, 503, 599] {
            let err = GateError::UpstreamStatus {
                status,
                body: Bytes::new(),
            };
            assert_eq!(err.client_status().as_u16(), status);
        }
    }

    #[test]
    fn invalid_target_is_bad_request() {
        let err = GateError::InvalidTarget("nope".to_string());
        assert_eq!(err.client_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_target_is_403() {
        let err = GateError::ForbiddenTarget("10.0.0.1".to_string());
        assert_eq!(err.client_status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn error_response_carries_cors_header() {
        let resp = GateError::Internal("boom".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn upstream_status_response_keeps_origin_body() {
        use http_body_util::BodyExt;

        let resp = GateError::UpstreamStatus {
            status: 404,
            body: Bytes::from_static(b"origin said no"),
        }
        .into_response();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"origin said no");
    }
}
