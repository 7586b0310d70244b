//! Product link canonicalization.
//!
//! Search results sometimes carry links without the `www.` host or without a
//! readable slug (`.../-P01234567.html`). Retail pages served from such links
//! tend to redirect to a landing page instead of the product, so the link is
//! rebuilt from the product name and code before it is fetched.

use url::{Host, Url};

/// Rewrites a product link into the form the retail site serves directly.
pub trait LinkCanonicalizer {
    fn canonicalize(&self, link: &str, display_name: Option<&str>) -> String;
}

#[derive(Debug, Clone)]
pub struct SlugCanonicalizer {
    /// `{slug}` and `{code}` are substituted.
    template: String,
}

impl SlugCanonicalizer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl LinkCanonicalizer for SlugCanonicalizer {
    fn canonicalize(&self, link: &str, display_name: Option<&str>) -> String {
        let link = ensure_www_host(link.trim());

        let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) else {
            return link;
        };
        let Some(code) = code_from_bare_segment(&link) else {
            return link;
        };

        self.template
            .replace("{slug}", &slugify(name))
            .replace("{code}", code)
    }
}

fn ensure_www_host(link: &str) -> String {
    let Ok(mut parsed) = Url::parse(link) else {
        return link.to_string();
    };
    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        _ => return link.to_string(),
    };
    if host.starts_with("www.") {
        return link.to_string();
    }

    let normalized = format!("www.{}", host.trim_start_matches('.'));
    if parsed.set_host(Some(&normalized)).is_err() {
        return link.to_string();
    }
    parsed.to_string()
}

/// Returns the product code when the last path segment is a bare `-P<code>`
/// with no slug in front of it.
fn code_from_bare_segment(link: &str) -> Option<&str> {
    let without_query = link.split(['?', '#']).next().unwrap_or(link);
    let last = without_query.rsplit('/').next()?;
    if !last.starts_with("-P") {
        return None;
    }
    let code = last.trim_start_matches(['-', 'P']);
    let code = match code.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => code,
    };
    if code.is_empty() {
        return None;
    }
    Some(code)
}

pub fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zara() -> SlugCanonicalizer {
        SlugCanonicalizer::new("https://www.zara.com/es/en/{slug}-p{code}.html")
    }

    #[test]
    fn adds_www_prefix_once() {
        let out = zara().canonicalize("https://zara.com/es/en/shirt-p1.html", None);
        assert_eq!(out, "https://www.zara.com/es/en/shirt-p1.html");

        let out = zara().canonicalize("https://www.zara.com/es/en/shirt-p1.html", None);
        assert_eq!(out, "https://www.zara.com/es/en/shirt-p1.html");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let c = zara();
        for link in [
            "https://zara.com/es/en/shirt-p1.html?v1=2",
            "https://zara.com/-P1234.html",
            "http://shop.example.org/a/b",
        ] {
            let once = c.canonicalize(link, Some("Cool Shirt"));
            let twice = c.canonicalize(&once, Some("Cool Shirt"));
            assert_eq!(once, twice, "link={link}");
            let host = Url::parse(&once).expect("url").host_str().map(str::to_string);
            let host = host.expect("host");
            assert!(host.starts_with("www."), "host={host}");
            assert!(!host.starts_with("www.www."), "host={host}");
        }
    }

    #[test]
    fn rebuilds_slug_from_display_name() {
        let out = zara().canonicalize("https://zara.com/-P1234.html", Some("Cool Shirt"));
        assert!(out.contains("cool-shirt-p1234"), "out={out}");
        assert_eq!(out, "https://www.zara.com/es/en/cool-shirt-p1234.html");
    }

    #[test]
    fn bare_code_without_name_is_only_host_normalized() {
        let out = zara().canonicalize("https://zara.com/-P1234.html", None);
        assert_eq!(out, "https://www.zara.com/-P1234.html");

        let out = zara().canonicalize("https://zara.com/-P1234.html", Some("  "));
        assert_eq!(out, "https://www.zara.com/-P1234.html");
    }

    #[test]
    fn existing_slug_passes_through() {
        let link = "https://www.zara.com/es/en/linen-blend-shirt-p04391401.html?v1=12";
        assert_eq!(zara().canonicalize(link, Some("Linen Shirt")), link);
    }

    #[test]
    fn malformed_and_ip_links_pass_through() {
        assert_eq!(zara().canonicalize("not a url", None), "not a url");
        assert_eq!(
            zara().canonicalize("http://127.0.0.1:8080/p/1", None),
            "http://127.0.0.1:8080/p/1"
        );
    }

    #[test]
    fn code_extraction_strips_extension_and_query() {
        assert_eq!(
            code_from_bare_segment("https://x/-P0123.html?v1=9"),
            Some("0123")
        );
        assert_eq!(code_from_bare_segment("https://x/-P0123"), Some("0123"));
        assert_eq!(code_from_bare_segment("https://x/-P.html"), None);
        assert_eq!(code_from_bare_segment("https://x/shirt-P0123.html"), None);
    }
}
