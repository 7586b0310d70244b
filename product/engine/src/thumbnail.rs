use crate::canonical::LinkCanonicalizer;
use crate::http::{self, redact_url_for_log};
use scraper::{Html, Selector};
use url::Url;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const WIDTH_PARAM: &str = "w";

/// Best-effort lookup of a product's page image. Every failure degrades to
/// `None`; nothing here can abort a search run.
pub struct ThumbnailResolver<'c> {
    canonicalizer: &'c dyn LinkCanonicalizer,
    referer: String,
    agent: ureq::Agent,
}

impl<'c> ThumbnailResolver<'c> {
    pub fn new(canonicalizer: &'c dyn LinkCanonicalizer, referer: impl Into<String>) -> Self {
        Self {
            canonicalizer,
            referer: referer.into(),
            agent: http::agent(http::THUMBNAIL_TIMEOUT, http::BROWSER_USER_AGENT),
        }
    }

    pub fn resolve<FLog>(
        &self,
        link: &str,
        width: u32,
        display_name: Option<&str>,
        mut log_line: FLog,
    ) -> Option<String>
    where
        FLog: FnMut(&str, &str, serde_json::Value) -> crate::Result<()>,
    {
        let page_url = self.canonicalizer.canonicalize(link, display_name);
        let _ = log_line(
            "info",
            "thumbnail_page_fetch",
            serde_json::json!({
                "link": redact_url_for_log(link),
                "canonical": page_url,
            }),
        );

        let request = self
            .agent
            .get(page_url.as_str())
            .header("Accept", ACCEPT_HTML)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Referer", self.referer.as_str());
        let mut response = match request.call() {
            Ok(resp) => resp,
            Err(err) => {
                let _ = log_line(
                    "warn",
                    "thumbnail_page_fetch_failed",
                    serde_json::json!({
                        "url": redact_url_for_log(&page_url),
                        "error": err.to_string(),
                    }),
                );
                return None;
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let _ = log_line(
                "warn",
                "thumbnail_page_status",
                serde_json::json!({
                    "url": redact_url_for_log(&page_url),
                    "status": status,
                }),
            );
            return None;
        }

        let content_type = http::header_string(&response, "content-type");
        let html = match http::read_body(&mut response) {
            Ok(body) => body,
            Err(err) => {
                let _ = log_line(
                    "warn",
                    "thumbnail_page_read_failed",
                    serde_json::json!({
                        "url": redact_url_for_log(&page_url),
                        "error": err.to_string(),
                    }),
                );
                return None;
            }
        };

        let found = extract_thumbnail(&html, &page_url, width);
        let _ = log_line(
            if found.is_some() { "info" } else { "warn" },
            "thumbnail_extracted",
            serde_json::json!({
                "url": redact_url_for_log(&page_url),
                "content_type": content_type,
                "html_bytes": html.len(),
                "found": found.is_some(),
            }),
        );
        found
    }
}

/// Picks the page's representative image: the Open Graph image (resized to
/// `width`), else the first `srcset` entry of the `picture.media-image`
/// container.
pub fn extract_thumbnail(html: &str, page_url: &str, width: u32) -> Option<String> {
    let document = Html::parse_document(html);
    let base_url = Url::parse(page_url).ok();

    if let Some(raw) = og_image_content(&document) {
        let absolute = absolutize(&raw, base_url.as_ref());
        return Some(with_width_param(&absolute, width));
    }

    let raw = media_picture_source(&document)?;
    Some(absolutize(&raw, base_url.as_ref()))
}

fn og_image_content(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[property="og:image"]"#).expect("og:image selector");
    let meta = document.select(&selector).next()?;
    let content = meta.value().attr("content")?.trim();
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}

fn media_picture_source(document: &Html) -> Option<String> {
    let selector_picture = Selector::parse("picture.media-image").expect("picture selector");
    let selector_source = Selector::parse("source").expect("source selector");

    let picture = document.select(&selector_picture).next()?;
    let source = picture.select(&selector_source).next()?;
    let srcset = source.value().attr("srcset")?;
    first_srcset_url(srcset)
}

fn first_srcset_url(srcset: &str) -> Option<String> {
    let first = srcset.split(',').next()?.trim();
    first.split_whitespace().next().map(str::to_string)
}

fn absolutize(raw: &str, base_url: Option<&Url>) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    base_url
        .and_then(|base| base.join(raw).ok())
        .map(|joined| joined.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Sets the `w` query parameter, keeping every other parameter and its order.
fn with_width_param(url: &str, width: u32) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(v) => v,
        Err(_) => return url.to_string(),
    };
    let width = width.to_string();

    let mut seen_width = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (k, v) in parsed.query_pairs().into_owned() {
        if k == WIDTH_PARAM {
            if seen_width {
                continue;
            }
            seen_width = true;
            pairs.push((k, width.clone()));
        } else {
            pairs.push((k, v));
        }
    }
    if !seen_width {
        pairs.push((WIDTH_PARAM.to_string(), width));
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    let query = serializer.finish();
    parsed.set_query(Some(&query));
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::SlugCanonicalizer;

    const PAGE: &str = "https://www.zara.com/es/en/shirt-p1.html";

    fn no_log(_: &str, _: &str, _: serde_json::Value) -> crate::Result<()> {
        Ok(())
    }

    fn canonicalizer() -> SlugCanonicalizer {
        SlugCanonicalizer::new("https://www.zara.com/es/en/{slug}-p{code}.html")
    }

    #[test]
    fn og_image_width_is_rewritten() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://x/img.jpg?w=100">
        </head><body></body></html>"#;
        let out = extract_thumbnail(html, PAGE, 882).expect("thumbnail");
        let parsed = Url::parse(&out).expect("url");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("w".to_string(), "882".to_string())]);
        assert_eq!(out, "https://x/img.jpg?w=882");
    }

    #[test]
    fn og_image_rewrite_preserves_other_params() {
        let html = r#"<meta property="og:image"
            content="https://static.zara.net/photos/a.jpg?ts=1700&w=100&f=auto">"#;
        let out = extract_thumbnail(html, PAGE, 882).expect("thumbnail");
        assert_eq!(out, "https://static.zara.net/photos/a.jpg?ts=1700&w=882&f=auto");
    }

    #[test]
    fn og_image_without_width_gets_one_appended() {
        let html = r#"<meta property="og:image" content="https://x/img.jpg?ts=5">"#;
        let out = extract_thumbnail(html, PAGE, 400).expect("thumbnail");
        assert_eq!(out, "https://x/img.jpg?ts=5&w=400");
    }

    #[test]
    fn relative_og_image_is_resolved_against_page() {
        let html = r#"<meta property="og:image" content="//static.zara.net/p/a.jpg?w=1">"#;
        let out = extract_thumbnail(html, PAGE, 882).expect("thumbnail");
        assert_eq!(out, "https://static.zara.net/p/a.jpg?w=882");
    }

    #[test]
    fn picture_srcset_is_the_fallback() {
        let html = r#"<html><body>
            <picture class="media-image">
              <source srcset="https://x/a.jpg 1x, https://x/b.jpg 2x">
              <img src="https://x/c.jpg">
            </picture>
        </body></html>"#;
        assert_eq!(
            extract_thumbnail(html, PAGE, 882).as_deref(),
            Some("https://x/a.jpg")
        );
    }

    #[test]
    fn empty_og_content_falls_through_to_picture() {
        let html = r#"<meta property="og:image" content="  ">
            <picture class="media-image"><source srcset="https://x/a.jpg 300w"></picture>"#;
        assert_eq!(
            extract_thumbnail(html, PAGE, 882).as_deref(),
            Some("https://x/a.jpg")
        );
    }

    #[test]
    fn page_without_either_structure_yields_none() {
        let html = r#"<html><body>
            <picture class="other"><source srcset="https://x/a.jpg 1x"></picture>
            <img src="https://x/plain.jpg">
        </body></html>"#;
        assert_eq!(extract_thumbnail(html, PAGE, 882), None);
    }

    #[test]
    fn picture_without_srcset_yields_none() {
        let html = r#"<picture class="media-image"><source src="https://x/a.jpg"></picture>"#;
        assert_eq!(extract_thumbnail(html, PAGE, 882), None);
    }

    #[test]
    fn resolver_fetches_with_browser_headers() {
        let mut server = mockito::Server::new();
        let page = server
            .mock("GET", "/es/en/shirt-p1.html")
            .match_header("referer", "https://www.zara.com/")
            .match_header("accept-language", ACCEPT_LANGUAGE)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<meta property="og:image" content="https://x/img.jpg?w=100">"#)
            .create();

        let c = canonicalizer();
        let resolver = ThumbnailResolver::new(&c, "https://www.zara.com/");
        let link = format!("{}/es/en/shirt-p1.html", server.url());
        let out = resolver.resolve(&link, 882, Some("Shirt"), no_log);

        page.assert();
        assert_eq!(out.as_deref(), Some("https://x/img.jpg?w=882"));
    }

    #[test]
    fn resolver_swallows_http_errors() {
        let mut server = mockito::Server::new();
        let _page = server.mock("GET", "/gone").with_status(404).create();

        let c = canonicalizer();
        let resolver = ThumbnailResolver::new(&c, "https://www.zara.com/");
        let mut events: Vec<String> = Vec::new();
        let out = resolver.resolve(&format!("{}/gone", server.url()), 882, None, |_, event, _| {
            events.push(event.to_string());
            Ok(())
        });

        assert_eq!(out, None);
        assert!(events.iter().any(|e| e == "thumbnail_page_status"), "events={events:?}");
    }

    #[test]
    fn resolver_swallows_network_errors() {
        let c = canonicalizer();
        let resolver = ThumbnailResolver::new(&c, "https://www.zara.com/");
        let out = resolver.resolve(&http::closed_port_url("/p"), 882, None, no_log);
        assert_eq!(out, None);
    }
}
