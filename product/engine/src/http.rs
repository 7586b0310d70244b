use std::time::Duration;
use url::Url;

pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(15);
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_USER_AGENT: &str = concat!("vistashop/", env!("CARGO_PKG_VERSION"));
pub const API_USER_AGENT: &str = "OpenPlatform/1.0";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.85 Safari/537.36";

pub type HttpResponse = ureq::http::Response<ureq::Body>;

/// Each stage gets its own agent so a run never shares connections with
/// another run. Status codes are inspected by the caller.
pub fn agent(timeout: Duration, user_agent: &str) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder();
    config = config
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .user_agent(user_agent);
    config.build().into()
}

pub fn read_body(response: &mut HttpResponse) -> Result<String, ureq::Error> {
    response.body_mut().read_to_string()
}

pub fn header_string(response: &HttpResponse, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

/// Trims a response body so error messages stay readable.
pub fn snippet(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// URL on a loopback port that was just released, so connections are refused.
#[cfg(test)]
pub(crate) fn closed_port_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}{path}")
}
