use crate::proxy::normalize::{DEFAULT_REAL_CONTENT_TYPE, DisguiseSignature, PNG_PREFIX};
use std::env;

/// Default browser user agent presented to origins that gate on it.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/237.84.2.178 Safari/537.36";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public origin of this proxy, used when rewriting manifest references
    pub base_url: String,
    pub is_dev: bool,
    /// User agent presented to origins
    pub upstream_user_agent: String,
    /// Per-IP requests allowed per minute; 0 disables limiting
    pub rate_limit_rpm: u32,
    /// Permit targets in private address space (local dev and tests)
    pub allow_private_networks: bool,
    /// Disguise prefix to detect and strip from binary payloads; `None`
    /// disables stripping entirely
    pub disguise: Option<DisguiseSignature>,
}

impl Config {
    /// Load configuration from environment variables.
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and
    /// BASE_URL are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Base URL: required in prod, defaults to localhost in dev
        let base_url = if is_dev {
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
        } else {
            env::var("BASE_URL").map_err(|_| "BASE_URL is required in production")?
        };

        let upstream_user_agent =
            env::var("UPSTREAM_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let allow_private_networks = env::var("ALLOW_PRIVATE_NETWORKS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let disguise = disguise_from_env()?;

        Ok(Config {
            port,
            base_url,
            is_dev,
            upstream_user_agent,
            rate_limit_rpm,
            allow_private_networks,
            disguise,
        })
    }
}

/// Parse the disguise signature settings.
///
/// `DISGUISE_SIGNATURE` is a comma-separated list of decimal byte values
/// (`137,80,78,71,13,10,26`), or `none`/`off`/empty to disable stripping.
/// Deployments disagree on both the bytes and how much to discard, so the
/// whole description is operator-supplied; the default matches the common
/// 7-byte PNG disguise. `DISGUISE_STRIP_LEN` defaults to the signature
/// length and may exceed it when the disguise is a larger wrapper.
fn disguise_from_env() -> Result<Option<DisguiseSignature>, Box<dyn std::error::Error>> {
    let magic = match env::var("DISGUISE_SIGNATURE") {
        Err(_) => PNG_PREFIX.to_vec(),
        Ok(raw) => {
            let raw = raw.trim().to_string();
            if raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off")
            {
                return Ok(None);
            }
            raw.split(',')
                .map(|b| b.trim().parse::<u8>())
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| {
                    format!("DISGUISE_SIGNATURE must be comma-separated byte values, got '{raw}'")
                })?
        }
    };

    let strip_len = match env::var("DISGUISE_STRIP_LEN") {
        Err(_) => magic.len(),
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("DISGUISE_STRIP_LEN must be an integer, got '{raw}'"))?,
    };

    let real_content_type =
        env::var("DISGUISE_CONTENT_TYPE").unwrap_or_else(|_| DEFAULT_REAL_CONTENT_TYPE.to_string());

    Ok(Some(DisguiseSignature {
        magic,
        strip_len,
        real_content_type,
    }))
}
