//! Asset extraction out of an HTML page body.
//!
//! A deliberately small tag scan, not an HTML parser: `img` and
//! `script` tags contribute their `src`, `link` tags contribute their
//! `href` when the `rel` names a downloadable resource. References are
//! resolved against the page URL and deduplicated in document order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]*\ssrc\s*=\s*["'](?P<src>[^"']+)["']"#).expect("img pattern")
});
static SCRIPT_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script[^>]*\ssrc\s*=\s*["'](?P<src>[^"']+)["']"#).expect("script pattern")
});
static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link[^>]*>").expect("link pattern"));
static LINK_REL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\srel\s*=\s*["'](?P<rel>[^"']+)["']"#).expect("link rel pattern")
});
static LINK_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\shref\s*=\s*["'](?P<href>[^"']+)["']"#).expect("link href pattern")
});

/// `link` rel values that point at a fetched resource rather than
/// metadata like canonical or alternate.
const DOWNLOADABLE_RELS: &[&str] = &["stylesheet", "icon", "shortcut icon", "apple-touch-icon"];

/// Absolute asset URLs referenced by `body`, in document order,
/// without duplicates. Unresolvable and `data:` references are
/// silently dropped.
pub fn extract_asset_urls(base: &Url, body: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    let mut push = |raw: &str| {
        if raw.starts_with("data:") {
            return;
        }
        if let Ok(resolved) = base.join(raw) {
            if seen.insert(resolved.to_string()) {
                assets.push(resolved);
            }
        }
    };

    for caps in IMG_SRC.captures_iter(body) {
        push(&caps["src"]);
    }
    for caps in SCRIPT_SRC.captures_iter(body) {
        push(&caps["src"]);
    }
    for tag in LINK_TAG.find_iter(body) {
        let tag = tag.as_str();
        let rel = match LINK_REL.captures(tag) {
            Some(caps) => caps["rel"].to_ascii_lowercase(),
            None => continue,
        };
        if !DOWNLOADABLE_RELS.contains(&rel.as_str()) {
            continue;
        }
        if let Some(caps) = LINK_HREF.captures(tag) {
            push(&caps["href"]);
        }
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://validfakehost.com/page/index.html").unwrap()
    }

    fn extracted(body: &str) -> Vec<String> {
        extract_asset_urls(&base(), body)
            .iter()
            .map(Url::to_string)
            .collect()
    }

    #[test]
    fn collects_img_and_script_sources() {
        let body = r#"<html><img src="logo.png"><script src="/js/app.js"></script></html>"#;
        assert_eq!(
            extracted(body),
            vec![
                "http://validfakehost.com/page/logo.png",
                "http://validfakehost.com/js/app.js",
            ]
        );
    }

    #[test]
    fn link_rel_filter_keeps_downloadable_resources_only() {
        let body = concat!(
            r#"<link rel="stylesheet" href="style.css">"#,
            r#"<link rel="canonical" href="http://other.com/">"#,
            r#"<link href="fav.ico" rel="Shortcut Icon">"#,
        );
        assert_eq!(
            extracted(body),
            vec![
                "http://validfakehost.com/page/style.css",
                "http://validfakehost.com/page/fav.ico",
            ]
        );
    }

    #[test]
    fn absolute_and_protocol_relative_urls_resolve() {
        let body = r#"<img src="http://cdn.validfakehost.com/a.png"><img src="//cdn.validfakehost.com/b.png">"#;
        assert_eq!(
            extracted(body),
            vec![
                "http://cdn.validfakehost.com/a.png",
                "http://cdn.validfakehost.com/b.png",
            ]
        );
    }

    #[test]
    fn duplicates_and_data_uris_are_dropped() {
        let body = concat!(
            r#"<img src="logo.png">"#,
            r#"<img src="logo.png">"#,
            r#"<img src="data:image/png;base64,AAAA">"#,
        );
        assert_eq!(extracted(body), vec!["http://validfakehost.com/page/logo.png"]);
    }

    #[test]
    fn attribute_casing_and_quoting_are_tolerated() {
        let body = r#"<IMG alt='x' SRC='upper.png'><Script type="module" src='m.js'></Script>"#;
        assert_eq!(
            extracted(body),
            vec![
                "http://validfakehost.com/page/upper.png",
                "http://validfakehost.com/page/m.js",
            ]
        );
    }
}
