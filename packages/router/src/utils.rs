//! Stateless helpers for classifying urls and clicks.

use spa_history::ClickEvent;
use url::{Origin, Url};

/// The origin of `url`, serialized as `scheme://host[:port]`. Blank if it has none.
///
/// Uses the tuple origin when the scheme has one, falls back to the scheme, host and port of urls
/// with an opaque origin, and finally to the textual `scheme://authority` prefix.
///
/// ```rust
/// # use spa_router::utils::origin_from;
/// let url = "http://foo:123/bar".parse().unwrap();
/// assert_eq!(origin_from(&url), "http://foo:123");
/// ```
pub fn origin_from(url: &Url) -> String {
    if let origin @ Origin::Tuple(..) = url.origin() {
        return origin.ascii_serialization();
    }

    if let Some(host) = url.host_str() {
        return match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };
    }

    textual_origin(url.as_str()).unwrap_or_default()
}

/// Like [`origin_from`], but resolves `raw` against `base` first.
pub fn origin_from_str(raw: &str, base: &Url) -> String {
    base.join(raw)
        .map(|url| origin_from(&url))
        .unwrap_or_default()
}

fn textual_origin(raw: &str) -> Option<String> {
    let (scheme, rest) = raw.split_once("://")?;
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    if scheme.is_empty() || !scheme.chars().all(is_word) {
        return None;
    }
    let authority = rest.split('/').next().unwrap_or_default();
    Some(format!("{scheme}://{authority}"))
}

/// Whether `a` and `b` share an origin. Urls without an origin never match anything.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    let origin = origin_from(a);
    !origin.is_empty() && origin == origin_from(b)
}

/// The query of `url` the way `location.search` reports it: `?` plus the query, or blank.
pub fn search(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("?{query}"),
        _ => String::new(),
    }
}

/// The fragment of `url` the way `location.hash` reports it: `#` plus the fragment, or blank.
pub fn hash(url: &Url) -> String {
    match url.fragment() {
        Some(fragment) if !fragment.is_empty() => format!("#{fragment}"),
        _ => String::new(),
    }
}

/// `pathname + search`: the part of a location that decides which document is shown.
pub fn path_and_search(url: &Url) -> String {
    format!("{}{}", url.path(), search(url))
}

/// `pathname + search + hash`: a location relative to its origin.
pub fn href(url: &Url) -> String {
    format!("{}{}", path_and_search(url), hash(url))
}

/// Whether navigating from `current` to `target` would only scroll within the same document.
///
/// That is the case when `target` has a fragment and the same path and query as `current`.
pub fn is_navigation_hash(target: &Url, current: &Url) -> bool {
    !hash(target).is_empty() && path_and_search(target) == path_and_search(current)
}

/// The destination of a click, if it is one a router may take over.
///
/// Clicks with a modifier key, with anything but the primary button, that were already cancelled,
/// or that did not land in a link are left alone. So are links with an explicit `target`, since
/// those open somewhere other than the current document. An empty `href` is kept; it resolves to
/// the current page.
pub fn resolve_click_target(event: &ClickEvent) -> Option<&str> {
    if event.ctrl_key
        || event.meta_key
        || event.alt_key
        || event.shift_key
        || event.button != 0
        || event.default_prevented
    {
        return None;
    }

    let link = event.link.as_ref()?;
    let opens_elsewhere = link.target.as_deref().is_some_and(|target| !target.is_empty());
    if opens_elsewhere {
        return None;
    }
    Some(&link.href)
}

/// The validator used when none is configured.
///
/// Accepts any pathname that does not contain a `.`, except for a trailing `.html`.
pub fn default_validate(url: &Url) -> bool {
    let path = url.path();
    let stem = path.strip_suffix(".html").unwrap_or(path);
    !stem.contains('.')
}
