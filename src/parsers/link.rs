use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use url::{form_urlencoded, Url};

static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:")
        .expect("Invalid scheme regex")
});

/// Canonical comparison form of a link: query parameters sorted by key
/// (stable, blank values kept), trailing slashes stripped from the path and
/// the fragment dropped. Unparseable input is normalized textually.
pub fn normalize_link(link: &str) -> String {
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }

    match Url::parse(link) {
        Ok(url) if url.has_host() => canonical_url(&url),
        _ => canonical_text(link),
    }
}

fn canonical_url(url: &Url) -> String {
    let mut out = format!("{}://", url.scheme());

    if !url.username().is_empty() {
        out.push_str(url.username());
        if let Some(password) = url.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }

    out.push_str(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }

    out.push_str(url.path().trim_end_matches('/'));

    let query = sorted_query(url.query_pairs());
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }

    out
}

fn canonical_text(link: &str) -> String {
    let without_fragment = link.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    };

    let mut out = path.trim_end_matches('/').to_string();
    let query = sorted_query(form_urlencoded::parse(query.as_bytes()));
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    out
}

fn sorted_query<'a, I>(pairs: I) -> String
where
    I: Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
{
    let mut pairs: Vec<(String, String)> = pairs
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    serde_urlencoded::to_string(&pairs).unwrap_or_default()
}

/// Resolve an href found on `page` into an absolute link.
///
/// Scheme-prefixed hrefs are kept verbatim, root-relative ones are joined to
/// the page's scheme and host, anything else is joined to the page URL itself.
pub fn resolve_href(href: &str, page: &Url) -> Result<String, url::ParseError> {
    let href = href.trim();

    if SCHEME_REGEX.is_match(href) {
        return Ok(href.to_string());
    }

    if href.starts_with('/') {
        let mut origin = page.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        return origin.join(href).map(String::from);
    }

    page.join(href).map(String::from)
}
