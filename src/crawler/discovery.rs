//! Read-only discovery
//!
//! Walks the same pages a mirror crawl would, down to `max-depth`, but only
//! collects what was asked for: URLs of one kind of resource, text matching a
//! pattern, comments or whole elements. Nothing is written to storage.

use crate::crawler::CrawlOrchestrator;
use crate::document::{Document, TagFilter};
use crate::url::{attribute_for_tag, is_same_origin, resolve_reference, Origin};
use crate::{MirrorError, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use tracing::{debug, info, warn};
use url::Url;

/// Addresses, case-insensitive
pub const EMAIL_PATTERN: &str = r"(?i)[\w.+-]+@[\w-]+(?:\.[\w-]+)*\.[a-z]{2,}";

/// E.164-style numbers; the country code and the number are joined
pub const PHONE_PATTERN: &str = r"(\+\d{1,3})?[\s-]?(\d{7,16})";

/// A kind of resource that can be listed with [`CrawlOrchestrator::find_urls`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Links,
    Stylesheets,
    Scripts,
    Fonts,
    Images,
    Videos,
    Audios,
}

impl ResourceKind {
    /// Elements that carry a resource of this kind
    pub fn filters(&self) -> Vec<TagFilter> {
        match self {
            Self::Links => vec![TagFilter::new("a")],
            Self::Stylesheets => vec![
                TagFilter::new("link").attr("rel", "stylesheet"),
                TagFilter::new("link").attr("type", "text/css"),
            ],
            Self::Scripts => vec![TagFilter::new("script")],
            Self::Fonts => vec![
                TagFilter::new("link").attr("rel", "preload"),
                TagFilter::new("link").attr("as", "font"),
            ],
            Self::Images => vec![
                TagFilter::new("img"),
                TagFilter::new("link").attr_prefix("type", "image/"),
                TagFilter::new("meta").attr("property", "og:image"),
            ],
            Self::Videos => vec![
                TagFilter::new("video"),
                TagFilter::new("source").attr_prefix("type", "video/"),
            ],
            Self::Audios => vec![
                TagFilter::new("audio"),
                TagFilter::new("source").attr_prefix("type", "audio/"),
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Stylesheets => "stylesheets",
            Self::Scripts => "scripts",
            Self::Fonts => "fonts",
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Audios => "audios",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "links" => Ok(Self::Links),
            "stylesheets" => Ok(Self::Stylesheets),
            "scripts" => Ok(Self::Scripts),
            "fonts" => Ok(Self::Fonts),
            "images" => Ok(Self::Images),
            "videos" => Ok(Self::Videos),
            "audios" => Ok(Self::Audios),
            other => Err(MirrorError::Validation(format!(
                "unknown resource kind '{}'",
                other
            ))),
        }
    }
}

/// What to look for in a discovery walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Search {
    /// URLs of one resource kind
    Urls(ResourceKind),
    Emails,
    PhoneNumbers,
    /// Matches of a regular expression
    Pattern(String),
    Comments,
    /// Outer markup of elements matching a filter
    Tags(TagFilter),
    TagsById(String),
    TagsByClass(String),
}

impl Search {
    /// Column heading used when the results are exported
    pub fn heading(&self) -> String {
        match self {
            Self::Urls(kind) => kind.to_string(),
            Self::Emails => "emails".to_string(),
            Self::PhoneNumbers => "phone numbers".to_string(),
            Self::Pattern(_) => "matches".to_string(),
            Self::Comments => "comments".to_string(),
            Self::Tags(_) | Self::TagsById(_) | Self::TagsByClass(_) => "tags".to_string(),
        }
    }
}

/// What one page contributed to a discovery walk
struct PageFindings<T> {
    items: Vec<T>,
    links: Vec<Url>,
}

impl CrawlOrchestrator {
    /// Runs any discovery search, returning its results as text
    pub async fn find(&self, search: &Search) -> Result<Vec<String>> {
        match search {
            Search::Urls(kind) => Ok(self
                .find_urls(*kind)
                .await?
                .into_iter()
                .map(String::from)
                .collect()),
            Search::Emails => self.find_emails().await,
            Search::PhoneNumbers => self.find_phone_numbers().await,
            Search::Pattern(pattern) => self.find_pattern(pattern).await,
            Search::Comments => self.find_comments().await,
            Search::Tags(filter) => self.find_all_tags(std::slice::from_ref(filter)).await,
            Search::TagsById(id) => self.find_tags_by_id(id).await,
            Search::TagsByClass(class) => self.find_tags_by_class(class).await,
        }
    }

    /// Lists the URLs of one kind of resource reachable from the start page
    ///
    /// Resource URLs are returned once each, in the order they were first
    /// found; external ones are included.
    ///
    /// # Errors
    ///
    /// Fails if the start URL is invalid. Pages that cannot be fetched are
    /// logged and skipped.
    pub async fn find_urls(&self, kind: ResourceKind) -> Result<Vec<Url>> {
        let filters = kind.filters();
        self.discover(kind.as_str(), |origin, base, document| {
            match document.find_any(&filters) {
                Ok(elements) => elements
                    .iter()
                    .filter_map(|element| {
                        let attribute = attribute_for_tag(element.tag_name())?;
                        let value = element.get_attribute(attribute)?;
                        resolve_reference(origin, base, value, element.tag_name()).ok()
                    })
                    .collect(),
                Err(e) => {
                    warn!("Cannot search {}: {}", base, e);
                    Vec::new()
                }
            }
        })
        .await
    }

    /// Lists email addresses found in page text and link targets
    pub async fn find_emails(&self) -> Result<Vec<String>> {
        self.find_matches("emails", EMAIL_PATTERN).await
    }

    /// Lists phone numbers found in page text and link targets
    pub async fn find_phone_numbers(&self) -> Result<Vec<String>> {
        self.find_matches("phone numbers", PHONE_PATTERN).await
    }

    /// Lists matches of a regular expression in page text and link targets
    ///
    /// Link targets are searched as written in the markup, so `mailto:` and
    /// `tel:` links are covered. A pattern with capture groups yields the
    /// groups joined together instead of the whole match.
    ///
    /// # Errors
    ///
    /// `MirrorError::Validation` if the pattern does not compile.
    pub async fn find_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        self.find_matches("matches", pattern).await
    }

    /// Lists the contents of markup comments
    pub async fn find_comments(&self) -> Result<Vec<String>> {
        self.discover("comments", |_, _, document| document.comments())
            .await
    }

    /// Lists the outer markup of elements matching any of the filters
    ///
    /// Identical elements repeated across pages, such as a shared navigation
    /// bar, are listed once.
    pub async fn find_all_tags(&self, filters: &[TagFilter]) -> Result<Vec<String>> {
        self.discover("tags", |_, base, document| {
            document.outer_markup(filters).unwrap_or_else(|e| {
                warn!("Cannot search {}: {}", base, e);
                Vec::new()
            })
        })
        .await
    }

    /// Lists the outer markup of elements with the given `id`
    pub async fn find_tags_by_id(&self, id: &str) -> Result<Vec<String>> {
        self.find_all_tags(&[TagFilter::with_id(id)]).await
    }

    /// Lists the outer markup of elements carrying the given class
    pub async fn find_tags_by_class(&self, class: &str) -> Result<Vec<String>> {
        self.find_all_tags(&[TagFilter::with_class(class)]).await
    }

    async fn find_matches(&self, what: &str, pattern: &str) -> Result<Vec<String>> {
        let regex = Regex::new(pattern)
            .map_err(|e| MirrorError::Validation(format!("invalid pattern '{}': {}", pattern, e)))?;

        self.discover(what, |_, _, document| {
            let mut haystack = document.text();
            for href in link_targets(document) {
                haystack.push('\n');
                haystack.push_str(&href);
            }
            pattern_matches(&regex, &haystack)
        })
        .await
    }

    /// Walks pages level by level and collects what `extract` finds on each
    ///
    /// Pages are visited down to `max-depth`, following same-origin links
    /// only. Findings are returned once each, in the order they were first
    /// found.
    async fn discover<T, F>(&self, what: &str, extract: F) -> Result<Vec<T>>
    where
        T: Clone + Eq + Hash,
        F: Fn(&Origin, &Url, &Document) -> Vec<T>,
    {
        let origin = self.session().establish_origin(&self.config().mirror.start_url)?.clone();
        let start = Url::parse(&self.config().mirror.start_url)?;
        let max_depth = self.config().mirror.max_depth;

        info!("Looking for {} from {} to depth {}", what, start, max_depth);

        let mut seen_pages: HashSet<Url> = HashSet::from([start.clone()]);
        let mut seen_items: HashSet<T> = HashSet::new();
        let mut found = Vec::new();
        let mut level = vec![start];

        for depth in 0..=max_depth {
            let workers = self
                .writer()
                .fetcher()
                .limiter()
                .suitable_worker_count(level.len());

            let findings: Vec<Option<PageFindings<T>>> = stream::iter(level)
                .map(|page| self.scan_page(&origin, page, &extract, depth < max_depth))
                .buffered(workers)
                .collect()
                .await;

            let mut next_level = Vec::new();
            for page in findings.into_iter().flatten() {
                for item in page.items {
                    if seen_items.insert(item.clone()) {
                        found.push(item);
                    }
                }
                for link in page.links {
                    if seen_pages.insert(link.clone()) {
                        next_level.push(link);
                    }
                }
            }

            debug!("Level {}: {} {} so far", depth, found.len(), what);
            if next_level.is_empty() {
                break;
            }
            level = next_level;
        }

        info!("Found {} {}", found.len(), what);
        Ok(found)
    }

    /// Fetches one page, runs `extract` on it and optionally collects links to follow
    async fn scan_page<T, F>(
        &self,
        origin: &Origin,
        page: Url,
        extract: &F,
        collect_links: bool,
    ) -> Option<PageFindings<T>>
    where
        F: Fn(&Origin, &Url, &Document) -> Vec<T>,
    {
        let fetched = match self.writer().fetcher().fetch(&page).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Skipping {}: {}", page, e);
                return None;
            }
        };

        let document = Document::parse(fetched.text());
        let base = &fetched.url;
        let items = extract(origin, base, &document);

        let links = if collect_links {
            link_targets(&document)
                .iter()
                .filter(|href| !href.starts_with('#'))
                .filter_map(|href| resolve_reference(origin, base, href, "a").ok())
                .map(|mut url| {
                    url.set_fragment(None);
                    url
                })
                .filter(|url| is_same_origin(origin, url))
                .collect()
        } else {
            Vec::new()
        };

        Some(PageFindings { items, links })
    }
}

/// Raw `href` values of every anchor
fn link_targets(document: &Document) -> Vec<String> {
    document
        .find_all(&TagFilter::new("a"))
        .unwrap_or_default()
        .iter()
        .filter_map(|anchor| anchor.get_attribute("href"))
        .map(str::to_string)
        .collect()
}

/// Every match of `pattern`, with capture groups joined when it has any
fn pattern_matches(pattern: &Regex, haystack: &str) -> Vec<String> {
    if pattern.captures_len() > 1 {
        pattern
            .captures_iter(haystack)
            .map(|captures| {
                captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|group| group.as_str())
                    .collect::<String>()
            })
            .filter(|joined| !joined.is_empty())
            .collect()
    } else {
        pattern
            .find_iter(haystack)
            .map(|found| found.as_str().to_string())
            .collect()
    }
}
