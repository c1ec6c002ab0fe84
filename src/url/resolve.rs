use crate::url::Origin;
use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a raw attribute value into an absolute URL
///
/// # Resolution Steps
///
/// 1. For `<use>` elements, drop everything from the first `#` (inline SVG
///    symbol references never name a download target)
/// 2. A value that already carries a scheme and host is used as-is
/// 3. `//host.tld/path` carries a host but no scheme; `http` is assumed
/// 4. Otherwise clean up markup noise and join against the current page:
///    - `..` segments are dropped, and a value that started with `../` becomes
///      root-relative
///    - leading `./` is removed
///    - a leading `//` that is not followed by a host collapses to `/`
///
/// # Arguments
///
/// * `origin` - Origin of the crawl session, used when the page URL is not absolute
/// * `page_url` - URL of the page the value was found on
/// * `raw` - The attribute value as written in the markup
/// * `tag` - Name of the element carrying the attribute
///
/// # Returns
///
/// * `Ok(Url)` - The fully qualified URL
/// * `Err(UrlError)` - The value is empty, malformed, or not fetchable (e.g. `data:`)
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::{base_origin, resolve_reference};
///
/// let origin = base_origin("https://example.com/").unwrap();
/// let page = Url::parse("https://example.com/docs/intro").unwrap();
///
/// let url = resolve_reference(&origin, &page, "img/logo.png", "img").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/img/logo.png");
///
/// let url = resolve_reference(&origin, &page, "/icons.svg#home", "use").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/icons.svg");
/// ```
pub fn resolve_reference(origin: &Origin, page_url: &Url, raw: &str, tag: &str) -> UrlResult<Url> {
    let mut value = raw.trim();
    if tag.eq_ignore_ascii_case("use") {
        value = value.split('#').next().unwrap_or_default();
    }

    if value.is_empty() {
        return Err(UrlError::Parse(format!("empty reference on <{}>", tag)));
    }

    if let Ok(absolute) = Url::parse(value) {
        return if absolute.has_host() {
            Ok(absolute)
        } else {
            Err(UrlError::InvalidScheme(format!(
                "'{}' does not point at a fetchable resource",
                value
            )))
        };
    }

    if let Some(rest) = value.strip_prefix("//") {
        if looks_like_host(rest) {
            return Url::parse(&format!("http://{}", rest))
                .map_err(|e| UrlError::Parse(format!("{}: {}", value, e)));
        }
    }

    let cleaned = clean_relative(value);
    let base = if page_url.has_host() {
        page_url.clone()
    } else {
        origin.root_url()?
    };

    base.join(&cleaned)
        .map_err(|e| UrlError::Parse(format!("{}: {}", value, e)))
}

/// Removes `..` segments and leading `./` or `//` noise from a relative reference
fn clean_relative(value: &str) -> String {
    let split_at = value.find(['?', '#']).unwrap_or(value.len());
    let (path, tail) = value.split_at(split_at);

    let climbs_up = path == ".." || path.starts_with("../");

    let mut cleaned = path
        .split('/')
        .filter(|segment| *segment != "..")
        .collect::<Vec<_>>()
        .join("/");

    while let Some(rest) = cleaned.strip_prefix("./") {
        cleaned = rest.to_string();
    }

    while cleaned.starts_with("//") {
        cleaned.remove(0);
    }

    if climbs_up && !cleaned.starts_with('/') {
        cleaned.insert(0, '/');
    }

    cleaned.push_str(tail);
    cleaned
}

/// Checks whether the first segment of a scheme-less `//` reference is a host
fn looks_like_host(rest: &str) -> bool {
    let first = rest.split(['/', '?', '#']).next().unwrap_or_default();
    !first.is_empty() && (first.contains('.') || first.contains(':') || first == "localhost")
}
