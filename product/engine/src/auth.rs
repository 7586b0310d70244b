use crate::config::OAuthCredentials;
use crate::http::{self, redact_url_for_log, snippet};
use crate::{EngineError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

pub const CATALOG_SCOPE: &str = "technology.catalog.read";

/// Bearer credential for one run. Never cached; every run re-authenticates.
#[derive(Clone)]
pub struct AuthToken {
    value: String,
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &format_args!("<{} chars>", self.value.len()))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Client-credentials grant against the token endpoint.
pub fn fetch_token<FLog>(
    endpoint: &str,
    credentials: &OAuthCredentials,
    mut log_line: FLog,
) -> Result<AuthToken>
where
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    log_line(
        "info",
        "auth_started",
        serde_json::json!({
            "endpoint": redact_url_for_log(endpoint),
            "client_id": credentials.client_id,
            "scope": CATALOG_SCOPE,
        }),
    )?;

    let body = format!("grant_type=client_credentials&scope={CATALOG_SCOPE}");
    let agent = http::agent(http::AUTH_TIMEOUT, http::API_USER_AGENT);
    let mut response = agent
        .post(endpoint)
        .header("Authorization", basic_auth_header(credentials).as_str())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .send(body.as_str())
        .map_err(|e| EngineError::Auth(format!("network error while requesting token: {e}")))?;

    let status = response.status().as_u16();
    let raw = http::read_body(&mut response).map_err(|e| {
        EngineError::Auth(format!("failed to read token response (HTTP {status}): {e}"))
    })?;

    if !response.status().is_success() {
        return Err(EngineError::Auth(format!(
            "token endpoint returned HTTP {status}: {}",
            snippet(&raw, 200)
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&raw).map_err(|e| {
        EngineError::Auth(format!("token response is not valid JSON: {e}"))
    })?;
    let token = parsed
        .id_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            EngineError::Auth("token response does not contain an `id_token`".to_string())
        })?;

    log_line(
        "info",
        "auth_finished",
        serde_json::json!({ "token_chars": token.len() }),
    )?;

    Ok(AuthToken::new(token))
}

fn basic_auth_header(credentials: &OAuthCredentials) -> String {
    let pair = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", STANDARD.encode(pair))
}
