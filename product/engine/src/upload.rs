use crate::http::{self, redact_url_for_log, snippet};
use crate::{EngineError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

const UNKNOWN_HOST_ERROR: &str = "unknown imgBB error";

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ImgbbResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ImgbbData>,
    #[serde(default)]
    error: Option<ImgbbError>,
}

#[derive(Debug, Deserialize)]
struct ImgbbData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImgbbError {
    #[serde(default)]
    message: Option<String>,
}

impl ImgbbResponse {
    fn host_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// Uploads the file as a base64 form field and returns the hosted URL.
pub fn upload_image<FLog>(
    endpoint: &str,
    api_key: &str,
    image_path: &Path,
    mut log_line: FLog,
) -> Result<UploadResult>
where
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    let data = std::fs::read(image_path).map_err(|e| {
        EngineError::Upload(format!(
            "failed to read {}: {e}",
            image_path.to_string_lossy()
        ))
    })?;
    let encoded = STANDARD.encode(&data);

    log_line(
        "info",
        "upload_started",
        serde_json::json!({
            "endpoint": redact_url_for_log(endpoint),
            "bytes": data.len(),
        }),
    )?;

    let agent = http::agent(http::UPLOAD_TIMEOUT, http::DEFAULT_USER_AGENT);
    let mut response = agent
        .post(endpoint)
        .query("key", api_key)
        .send_form([("image", encoded.as_str())])
        .map_err(|e| {
            EngineError::Upload(format!("network error while uploading to imgBB: {e}"))
        })?;

    let status = response.status().as_u16();
    let body = http::read_body(&mut response).map_err(|e| {
        EngineError::Upload(format!("failed to read imgBB response (HTTP {status}): {e}"))
    })?;
    let parsed: Option<ImgbbResponse> = serde_json::from_str(&body).ok();

    if !response.status().is_success() {
        let detail = parsed
            .as_ref()
            .and_then(ImgbbResponse::host_message)
            .map(str::to_string)
            .unwrap_or_else(|| snippet(&body, 200));
        return Err(EngineError::Upload(format!(
            "imgBB returned HTTP {status}: {detail}"
        )));
    }

    let parsed = parsed.ok_or_else(|| {
        EngineError::Upload(format!(
            "imgBB returned a non-JSON response: {}",
            snippet(&body, 200)
        ))
    })?;
    if !parsed.success {
        let message = parsed.host_message().unwrap_or(UNKNOWN_HOST_ERROR);
        return Err(EngineError::Upload(format!("imgBB API error: {message}")));
    }

    let url = parsed
        .data
        .and_then(|d| d.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| EngineError::Upload("imgBB response is missing data.url".to_string()))?;

    log_line(
        "info",
        "upload_finished",
        serde_json::json!({ "url": url }),
    )?;

    Ok(UploadResult { url })
}
