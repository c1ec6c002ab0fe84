use crate::ConfigError;
use std::fmt;
use std::str::FromStr;

/// How an attribute condition compares against the element's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    /// One of the whitespace separated words equals the value (`rel=icon`
    /// matches `rel="shortcut icon"`)
    Word(String),
    /// The whole attribute equals the value
    Exact(String),
    /// The attribute starts with the value (`type^=video/`)
    Prefix(String),
}

/// One attribute condition of a [`TagFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrCondition {
    pub name: String,
    pub matcher: AttrMatch,
}

/// A tag name plus attribute conditions selecting mirrorable elements
///
/// The compact text form is `tag|attr=value,attr2=value2`; `attr^=value`
/// requests a prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub tag: String,
    pub conditions: Vec<AttrCondition>,
}

impl TagFilter {
    /// A filter matching every element with the given tag name
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.trim().to_ascii_lowercase(),
            conditions: Vec::new(),
        }
    }

    /// A filter matching elements of any tag name
    pub fn any() -> Self {
        Self::new("*")
    }

    /// Elements of any tag whose `id` is exactly `id`
    pub fn with_id(id: &str) -> Self {
        let mut filter = Self::any();
        filter.conditions.push(AttrCondition {
            name: "id".to_string(),
            matcher: AttrMatch::Exact(id.trim().to_string()),
        });
        filter
    }

    /// Elements of any tag carrying `class` among their classes
    pub fn with_class(class: &str) -> Self {
        Self::any().attr("class", class)
    }

    /// A filter with word-match attribute conditions
    ///
    /// Values containing whitespace must match the attribute exactly.
    pub fn with_attrs<'a>(tag: &str, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut filter = Self::new(tag);
        for (name, value) in attrs {
            filter = filter.attr(name, value);
        }
        filter
    }

    /// Adds a word-match (or exact, for multi-word values) condition
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        let value = value.trim();
        let matcher = if value.split_whitespace().count() > 1 {
            AttrMatch::Exact(value.to_string())
        } else {
            AttrMatch::Word(value.to_string())
        };
        self.conditions.push(AttrCondition {
            name: name.trim().to_ascii_lowercase(),
            matcher,
        });
        self
    }

    /// Adds a prefix-match condition
    pub fn attr_prefix(mut self, name: &str, prefix: &str) -> Self {
        self.conditions.push(AttrCondition {
            name: name.trim().to_ascii_lowercase(),
            matcher: AttrMatch::Prefix(prefix.trim().to_string()),
        });
        self
    }

    /// CSS selector equivalent of this filter
    pub fn to_selector(&self) -> String {
        let mut selector = self.tag.clone();
        for condition in &self.conditions {
            let (op, value) = match &condition.matcher {
                AttrMatch::Word(v) => ("~=", v),
                AttrMatch::Exact(v) => ("=", v),
                AttrMatch::Prefix(v) => ("^=", v),
            };
            selector.push_str(&format!(
                "[{}{}\"{}\"]",
                condition.name,
                op,
                value.replace('\\', "\\\\").replace('"', "\\\"")
            ));
        }
        selector
    }

    /// The built-in table of elements whose resources get mirrored
    pub fn defaults() -> Vec<TagFilter> {
        let mut filters = vec![
            TagFilter::new("script"),
            TagFilter::new("link").attr("rel", "stylesheet"),
            TagFilter::new("img"),
            TagFilter::new("use"),
            TagFilter::new("video"),
            TagFilter::new("link").attr("as", "font"),
            TagFilter::new("link").attr("rel", "preload"),
            TagFilter::new("link").attr("rel", "shortcut"),
            TagFilter::new("link").attr("rel", "icon"),
            TagFilter::new("link").attr("rel", "shortcut icon"),
            TagFilter::new("link").attr("rel", "apple-touch-icon"),
        ];

        for image_type in [
            "image/x-icon",
            "image/png",
            "image/jpg",
            "image/jpeg",
            "image/svg",
            "image/webp",
        ] {
            filters.push(TagFilter::new("link").attr("type", image_type));
        }

        filters.push(TagFilter::new("meta").attr("property", "og:image"));
        filters
    }
}

impl FromStr for TagFilter {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (tag, attrs) = match spec.split_once('|') {
            Some((tag, attrs)) => (tag, Some(attrs)),
            None => (spec, None),
        };

        let tag = tag.trim();
        let valid = tag == "*" || tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if tag.is_empty() || !valid {
            return Err(ConfigError::InvalidFilter(format!(
                "'{}' does not start with a valid tag name",
                spec
            )));
        }

        let mut filter = TagFilter::new(tag);
        let Some(attrs) = attrs else {
            return Ok(filter);
        };

        for pair in attrs.split(',').filter(|p| !p.trim().is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::InvalidFilter(format!("'{}' is not an attr=value pair", pair))
            })?;
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');

            filter = match name.strip_suffix('^') {
                Some(name) if !name.trim().is_empty() => filter.attr_prefix(name, value),
                None if !name.trim().is_empty() => filter.attr(name, value),
                _ => {
                    return Err(ConfigError::InvalidFilter(format!(
                        "'{}' has an empty attribute name",
                        pair
                    )))
                }
            };
        }

        Ok(filter)
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        for (i, condition) in self.conditions.iter().enumerate() {
            let sep = if i == 0 { '|' } else { ',' };
            match &condition.matcher {
                AttrMatch::Word(v) | AttrMatch::Exact(v) => {
                    write!(f, "{}{}={}", sep, condition.name, v)?
                }
                AttrMatch::Prefix(v) => write!(f, "{}{}^={}", sep, condition.name, v)?,
            }
        }
        Ok(())
    }
}
