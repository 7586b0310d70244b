use crate::paths::AppPaths;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 882;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub imgbb_upload: String,
    pub token: String,
    pub visual_search: String,
    /// Locale product page template; `{slug}` and `{code}` are substituted.
    pub product_url_template: String,
    pub retail_referer: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            imgbb_upload: "https://api.imgbb.com/1/upload".to_string(),
            token: "https://auth.inditex.com:443/openam/oauth2/itxid/itxidmp/access_token"
                .to_string(),
            visual_search: "https://api.inditex.com/pubvsearch/products".to_string(),
            product_url_template: "https://www.zara.com/es/en/{slug}-p{code}.html".to_string(),
            retail_referer: "https://www.zara.com/".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub oauth: OAuthCredentials,
    pub imgbb_api_key: String,
    pub endpoints: Endpoints,
    pub thumbnail_width: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(rename = "indiTEx", default)]
    inditex: RawInditexSection,
    #[serde(rename = "imgBB", default)]
    imgbb: RawImgbbSection,
    #[serde(default)]
    endpoints: Endpoints,
    #[serde(default)]
    thumbnail: RawThumbnailSection,
}

#[derive(Debug, Default, Deserialize)]
struct RawInditexSection {
    oauth_client_id: Option<String>,
    oauth_client_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImgbbSection {
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawThumbnailSection {
    width: Option<RawWidth>,
}

/// `width` may be written as `882` or `"882"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWidth {
    Number(u32),
    Text(String),
}

impl RawWidth {
    fn parse(self) -> Result<u32> {
        let value = match self {
            RawWidth::Number(v) => Some(v),
            RawWidth::Text(text) => text.trim().parse::<u32>().ok(),
        };
        match value {
            Some(v) if v > 0 => Ok(v),
            _ => Err(EngineError::Config(
                "thumbnail.width must be a positive integer".to_string(),
            )),
        }
    }
}

pub fn load_config(paths: &AppPaths) -> Result<AppConfig> {
    let path = paths.config_path();
    if !path.exists() {
        return Err(EngineError::Config(format!(
            "config file not found at {}",
            path.to_string_lossy()
        )));
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        EngineError::Config(format!(
            "failed to read config file at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    parse_config(&raw).map_err(|e| match e {
        EngineError::Config(msg) => {
            EngineError::Config(format!("{msg} (in {})", path.to_string_lossy()))
        }
        other => other,
    })
}

pub fn parse_config(raw: &str) -> Result<AppConfig> {
    let parsed: RawConfig = if raw.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(raw)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))?
    };

    let client_id = required(parsed.inditex.oauth_client_id, "indiTEx.oauth_client_id")?;
    let client_secret = required(
        parsed.inditex.oauth_client_secret,
        "indiTEx.oauth_client_secret",
    )?;
    let imgbb_api_key = required(parsed.imgbb.api_key, "imgBB.api_key")?;

    let thumbnail_width = match parsed.thumbnail.width {
        Some(raw) => raw.parse()?,
        None => DEFAULT_THUMBNAIL_WIDTH,
    };

    Ok(AppConfig {
        oauth: OAuthCredentials {
            client_id,
            client_secret,
        },
        imgbb_api_key,
        endpoints: parsed.endpoints,
        thumbnail_width,
    })
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    let trimmed = value.as_deref().unwrap_or("").trim();
    if trimmed.is_empty() {
        return Err(EngineError::Config(format!("missing required key `{key}`")));
    }
    Ok(trimmed.to_string())
}
