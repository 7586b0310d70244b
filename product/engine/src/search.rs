use crate::auth::AuthToken;
use crate::http::{self, redact_url_for_log, snippet};
use crate::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;

pub const SEARCH_PAGE: u32 = 1;
pub const SEARCH_PER_PAGE: u32 = 5;

const BODY_UNAVAILABLE: &str = "response body unavailable";
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PriceValue {
    pub current: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Price {
    pub value: PriceValue,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductImage {
    pub url: String,
}

/// One match from the visual search API. Every wire field is optional; the
/// API has been seen to send numeric ids and prices as well as strings.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProductRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Price,
    pub link: Option<String>,
    pub brand: Option<String>,
    pub images: Vec<ProductImage>,
}

impl ProductRecord {
    /// Returns `None` when the element is not a JSON object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let price = obj.get("price").map(parse_price).unwrap_or_default();
        let images = match obj.get("images") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| scalar_string(item.get("url")?))
                .map(|url| ProductImage { url })
                .collect(),
            _ => Vec::new(),
        };

        Some(Self {
            id: obj.get("id").and_then(scalar_string),
            name: obj.get("name").and_then(scalar_string),
            price,
            link: obj.get("link").and_then(scalar_string),
            brand: obj.get("brand").and_then(scalar_string),
            images,
        })
    }

    pub fn first_image_url(&self) -> Option<&str> {
        self.images.first().map(|img| img.url.as_str())
    }
}

fn parse_price(value: &Value) -> Price {
    let value_obj = value.get("value");
    Price {
        value: PriceValue {
            current: value_obj.and_then(|v| v.get("current")).and_then(scalar_string),
            original: value_obj.and_then(|v| v.get("original")).and_then(scalar_string),
        },
        currency: value.get("currency").and_then(scalar_string),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    let out = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Single authenticated search for the hosted image; no pagination.
pub fn visual_search<FLog>(
    endpoint: &str,
    image_url: &str,
    token: &AuthToken,
    mut log_line: FLog,
) -> Result<Vec<ProductRecord>>
where
    FLog: FnMut(&str, &str, Value) -> Result<()>,
{
    log_line(
        "info",
        "search_started",
        serde_json::json!({
            "endpoint": redact_url_for_log(endpoint),
            "image_url": image_url,
            "page": SEARCH_PAGE,
            "per_page": SEARCH_PER_PAGE,
        }),
    )?;

    let agent = http::agent(http::SEARCH_TIMEOUT, http::API_USER_AGENT);
    let mut response = agent
        .get(endpoint)
        .query("image", image_url)
        .query("page", SEARCH_PAGE.to_string())
        .query("perPage", SEARCH_PER_PAGE.to_string())
        .header("Authorization", token.bearer_header().as_str())
        .header("Content-Type", "application/json")
        .call()
        .map_err(|e| EngineError::Search(format!("network error during visual search: {e}")))?;

    let status = response.status().as_u16();
    let body = http::read_body(&mut response);

    if !response.status().is_success() {
        let detail = body
            .as_deref()
            .map(|b| snippet(b, MAX_ERROR_BODY_CHARS))
            .unwrap_or_else(|_| BODY_UNAVAILABLE.to_string());
        return Err(EngineError::Search(format!(
            "search API returned HTTP {status}. Response: {detail}"
        )));
    }

    let body = body.map_err(|e| {
        EngineError::Search(format!(
            "failed to read search response: {e}. Response: {BODY_UNAVAILABLE}"
        ))
    })?;
    let decoded: Value = serde_json::from_str(&body).map_err(|e| {
        EngineError::Search(format!(
            "search response is not valid JSON: {e}. Response: {}",
            snippet(&body, MAX_ERROR_BODY_CHARS)
        ))
    })?;

    let products = products_from_json(&decoded, &mut log_line)?;
    log_line(
        "info",
        "search_finished",
        serde_json::json!({
            "count": products.len(),
            "first_product": decoded.as_array().and_then(|items| items.first()),
        }),
    )?;
    Ok(products)
}

/// A non-list response means "no matches", not a failure.
fn products_from_json<FLog>(decoded: &Value, log_line: &mut FLog) -> Result<Vec<ProductRecord>>
where
    FLog: FnMut(&str, &str, Value) -> Result<()>,
{
    let Some(items) = decoded.as_array() else {
        log_line(
            "warn",
            "search_response_not_a_list",
            serde_json::json!({ "response": decoded }),
        )?;
        return Ok(Vec::new());
    };

    let mut products = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match ProductRecord::from_json(item) {
            Some(product) => products.push(product),
            None => {
                log_line(
                    "warn",
                    "search_result_skipped",
                    serde_json::json!({ "index": index, "value": item }),
                )?;
            }
        }
    }
    Ok(products)
}
