use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// Scheme, host and port of a website; the unit of same-site comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    /// Lowercase host name
    pub host: String,
    pub port: Option<u16>,
}

impl Origin {
    /// Builds an origin from an already parsed URL
    pub fn from_url(url: &Url) -> UrlResult<Self> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UrlError::InvalidUrl(url.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )));
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_lowercase(),
            port: url.port(),
        })
    }

    /// Host with its explicit port, as sent in a `Host` header
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Root URL of the origin (`scheme://authority/`)
    pub fn root_url(&self) -> UrlResult<Url> {
        Url::parse(&format!("{}/", self)).map_err(|e| UrlError::Parse(e.to_string()))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

/// Extracts the origin of a URL string
///
/// # Arguments
///
/// * `url` - The URL to extract the origin from
///
/// # Returns
///
/// * `Ok(Origin)` - Scheme, lowercase host and explicit port of the URL
/// * `Err(UrlError)` - The URL is malformed or lacks a scheme or host
///
/// # Examples
///
/// ```
/// use site_mirror::url::base_origin;
///
/// let origin = base_origin("https://Example.COM:8443/docs/").unwrap();
/// assert_eq!(origin.host, "example.com");
/// assert_eq!(origin.to_string(), "https://example.com:8443");
/// ```
pub fn base_origin(url: &str) -> UrlResult<Origin> {
    let parsed = Url::parse(url).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase | url::ParseError::EmptyHost => {
            UrlError::InvalidUrl(url.to_string())
        }
        other => UrlError::Parse(other.to_string()),
    })?;
    Origin::from_url(&parsed)
}

/// Checks whether a URL belongs to the crawled site
///
/// A URL matches when its host equals the origin host or is a subdomain of it
/// (suffix match on a dot boundary). Scheme and port are not compared, so
/// `http://` and `https://` pages of one site are mirrored together.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::{base_origin, is_same_origin};
///
/// let origin = base_origin("https://site.example/").unwrap();
/// assert!(is_same_origin(&origin, &Url::parse("https://cdn.site.example/a.js").unwrap()));
/// assert!(!is_same_origin(&origin, &Url::parse("https://notsite.example/").unwrap()));
/// ```
pub fn is_same_origin(origin: &Origin, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    host == origin.host
        || host
            .strip_suffix(origin.host.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Top-level directory keeping another host's files apart from the origin's
///
/// Files of the origin host itself live at the top of the mirror, so this
/// returns `None` for them, for URLs without a host and when no origin has
/// been established yet. Subdomains and external hosts get their lowercase
/// host name.
pub fn host_directory(origin: Option<&Origin>, url: &Url) -> Option<String> {
    let origin = origin?;
    let host = url.host_str()?.to_lowercase();
    (host != origin.host).then_some(host)
}
