//! Markup document handling
//!
//! Elements are located with `scraper` and attribute rewrites are applied by
//! streaming the original markup through `lol_html`, so everything the
//! crawler does not touch is written back byte for byte.

mod filter;

pub use filter::{AttrCondition, AttrMatch, TagFilter};

use crate::{MirrorError, Result};
use lol_html::html_content::Element as RewriteElement;
use lol_html::{rewrite_str, ElementContentHandlers, RewriteStrSettings};
use scraper::{Html, Node, Selector};
use std::borrow::Cow;
use std::collections::HashSet;

/// A snapshot of one element found in a [`Document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    /// Lowercase tag name
    pub fn tag_name(&self) -> &str {
        &self.tag
    }

    /// Value of an attribute, with character references decoded
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A pending attribute rewrite
#[derive(Debug, Clone)]
struct Patch {
    tag: String,
    attribute: String,
    original: String,
    value: String,
}

/// A parsed markup document whose attributes can be rewritten
///
/// `Document` keeps the source text and a list of patches rather than a live
/// DOM, so it can be held across `.await` points and moved between tasks.
#[derive(Debug, Clone)]
pub struct Document {
    markup: String,
    patches: Vec<Patch>,
}

impl Document {
    /// Parses markup into a document
    pub fn parse(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            patches: Vec::new(),
        }
    }

    /// The markup as it was parsed, without pending patches
    pub fn source(&self) -> &str {
        &self.markup
    }

    /// Finds every element matching a filter, in document order
    pub fn find_all(&self, filter: &TagFilter) -> Result<Vec<Element>> {
        self.find_any(std::slice::from_ref(filter))
    }

    /// Finds every element matching at least one of the filters
    ///
    /// Elements matched by several filters are returned once, in document order.
    pub fn find_any(&self, filters: &[TagFilter]) -> Result<Vec<Element>> {
        let Some(selector) = selector_for(filters)? else {
            return Ok(Vec::new());
        };

        let html = Html::parse_document(&self.markup);
        let elements = html
            .select(&selector)
            .map(|node| Element {
                tag: node.value().name().to_ascii_lowercase(),
                attributes: node
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                    .collect(),
            })
            .collect();

        Ok(elements)
    }

    /// Outer markup of every element matching at least one of the filters
    pub fn outer_markup(&self, filters: &[TagFilter]) -> Result<Vec<String>> {
        let Some(selector) = selector_for(filters)? else {
            return Ok(Vec::new());
        };

        let html = Html::parse_document(&self.markup);
        Ok(html.select(&selector).map(|node| node.html()).collect())
    }

    /// Text content of the document, one text node per line
    pub fn text(&self) -> String {
        let html = Html::parse_document(&self.markup);
        let text: Vec<&str> = html
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        text.join("\n")
    }

    /// Contents of every markup comment, trimmed, in document order
    pub fn comments(&self) -> Vec<String> {
        let html = Html::parse_document(&self.markup);
        html.tree
            .values()
            .filter_map(Node::as_comment)
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty())
            .collect()
    }

    /// Rewrites an attribute of an element
    ///
    /// Every element sharing the element's tag and current attribute value is
    /// rewritten when the document is serialized.
    pub fn set_attribute(&mut self, element: &Element, name: &str, value: &str) {
        let Some(original) = element.get_attribute(name) else {
            return;
        };

        let name = name.to_ascii_lowercase();
        self.patches.retain(|p| {
            !(p.tag == element.tag && p.attribute == name && p.original == original)
        });
        self.patches.push(Patch {
            tag: element.tag.clone(),
            attribute: name,
            original: original.to_string(),
            value: value.to_string(),
        });
    }

    /// Number of attribute rewrites waiting to be serialized
    pub fn pending_patches(&self) -> usize {
        self.patches.len()
    }

    /// Serializes the document with every pending patch applied
    pub fn serialize(&self) -> Result<String> {
        if self.patches.is_empty() {
            return Ok(self.markup.clone());
        }

        let tags: HashSet<&str> = self.patches.iter().map(|p| p.tag.as_str()).collect();
        let mut handlers = Vec::with_capacity(tags.len());

        for tag in tags {
            let selector = tag
                .parse::<lol_html::Selector>()
                .map_err(|e| MirrorError::Rewrite(format!("selector '{}': {}", tag, e)))?;
            let patches: Vec<&Patch> = self.patches.iter().filter(|p| p.tag == tag).collect();

            handlers.push((
                Cow::Owned(selector),
                ElementContentHandlers::default().element(move |el| {
                    apply_patches(el, &patches)?;
                    Ok(())
                }),
            ));
        }

        rewrite_str(
            &self.markup,
            RewriteStrSettings {
                element_content_handlers: handlers,
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|e| MirrorError::Rewrite(e.to_string()))
    }
}

/// One selector matching any of the filters, or `None` when there are none
fn selector_for(filters: &[TagFilter]) -> Result<Option<Selector>> {
    if filters.is_empty() {
        return Ok(None);
    }

    let css = filters
        .iter()
        .map(TagFilter::to_selector)
        .collect::<Vec<_>>()
        .join(", ");
    Selector::parse(&css)
        .map(Some)
        .map_err(|e| MirrorError::Validation(format!("invalid selector '{}': {:?}", css, e)))
}

fn apply_patches(
    el: &mut RewriteElement,
    patches: &[&Patch],
) -> std::result::Result<(), lol_html::errors::AttributeNameError> {
    for patch in patches {
        let matches = el
            .get_attribute(&patch.attribute)
            .is_some_and(|raw| decode_attribute(&raw) == patch.original);
        if matches {
            el.set_attribute(&patch.attribute, &patch.value)?;
        }
    }
    Ok(())
}

/// Decodes every character reference in a raw attribute value
///
/// `lol_html` hands out attribute values as written in the source, while
/// `find_any` reads them through the HTML tokenizer. Running the raw value
/// through that same tokenizer makes both sides compare equal for named,
/// decimal and hexadecimal references alike.
fn decode_attribute(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let fragment = Html::parse_fragment(&format!(
        r#"<i data-raw="{}"></i>"#,
        raw.replace('"', "&quot;")
    ));
    let decoded = fragment
        .tree
        .values()
        .filter_map(Node::as_element)
        .find(|element| element.name() == "i")
        .and_then(|element| element.attr("data-raw"))
        .map(str::to_string);

    match decoded {
        Some(decoded) => Cow::Owned(decoded),
        None => Cow::Borrowed(raw),
    }
}
