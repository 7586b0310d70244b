use crate::search::ProductRecord;
use serde::Serialize;

const MISSING: &str = "N/A";
const UNTITLED: &str = "Untitled";
const NO_PREVIEW: &str = "no preview";
const PREVIEW_WIDTH_PX: u32 = 100;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedProduct {
    pub id: String,
    pub name: String,
    pub price: String,
    pub link: Option<String>,
    pub brand: String,
    /// First catalog image from the search API.
    pub catalog_image: Option<String>,
    /// Image scraped from the retail page, if any.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RenderedResults {
    pub products: Vec<RenderedProduct>,
}

pub fn render_product(record: &ProductRecord, thumbnail: Option<String>) -> RenderedProduct {
    let price = match (&record.price.value.current, &record.price.currency) {
        (Some(current), Some(currency)) => format!("{current} {currency}"),
        (Some(current), None) => current.clone(),
        (None, _) => MISSING.to_string(),
    };

    RenderedProduct {
        id: record.id.clone().unwrap_or_else(|| MISSING.to_string()),
        name: record.name.clone().unwrap_or_else(|| UNTITLED.to_string()),
        price,
        link: record.link.clone().filter(|l| !l.trim().is_empty()),
        brand: record.brand.clone().unwrap_or_else(|| MISSING.to_string()),
        catalog_image: record.first_image_url().and_then(http_only),
        thumbnail: thumbnail.as_deref().and_then(http_only),
    }
}

fn http_only(url: &str) -> Option<String> {
    if url.starts_with("http") {
        Some(url.to_string())
    } else {
        None
    }
}

impl RenderedResults {
    pub fn header(&self) -> String {
        match self.products.len() {
            1 => "1 product found".to_string(),
            n => format!("{n} products found"),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n", self.header());
        for (i, p) in self.products.iter().enumerate() {
            out.push_str(&format!("\n#{} {}\n", i + 1, p.name));
            out.push_str(&format!("  ID:        {}\n", p.id));
            out.push_str(&format!("  Price:     {}\n", p.price));
            out.push_str(&format!("  Brand:     {}\n", p.brand));
            out.push_str(&format!(
                "  Link:      {}\n",
                p.link.as_deref().unwrap_or("not available")
            ));
            if let Some(img) = &p.catalog_image {
                out.push_str(&format!("  Image:     {img}\n"));
            }
            out.push_str(&format!(
                "  Thumbnail: {}\n",
                p.thumbnail.as_deref().unwrap_or(NO_PREVIEW)
            ));
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = format!("<b>{}</b><br/><br/>\n", escape_html(&self.header()));
        for p in &self.products {
            let name = escape_html(&p.name);
            if let Some(img) = &p.catalog_image {
                out.push_str(&format!(
                    "<img src=\"{}\" width=\"{PREVIEW_WIDTH_PX}\" alt=\"Thumb {name}\"><br/>\n",
                    escape_html(img)
                ));
            }
            match &p.thumbnail {
                Some(thumb) => out.push_str(&format!(
                    "<img src=\"{}\" width=\"{PREVIEW_WIDTH_PX}\" alt=\"Page image {name}\"><br/>\n",
                    escape_html(thumb)
                )),
                None => out.push_str(&format!("<p>{NO_PREVIEW}</p>\n")),
            }
            let link = match &p.link {
                Some(link) => {
                    let link = escape_html(link);
                    format!("<a href=\"{link}\">{link}</a>")
                }
                None => "not available".to_string(),
            };
            out.push_str(&format!(
                "<b>ID:</b> {}<br/>\n<b>Name:</b> {name}<br/>\n<b>Price:</b> {}<br/>\n<b>Link:</b> {link}<br/>\n<b>Brand:</b> {}<br/><hr/>\n",
                escape_html(&p.id),
                escape_html(&p.price),
                escape_html(&p.brand),
            ));
        }
        out
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
