/// Extensions of paths that are already mirrored pages in their own right
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm", "xhtml"];

/// Returns the attribute that carries an element's resource reference
///
/// # Examples
///
/// ```
/// use site_mirror::url::attribute_for_tag;
///
/// assert_eq!(attribute_for_tag("img"), Some("src"));
/// assert_eq!(attribute_for_tag("LINK"), Some("href"));
/// assert_eq!(attribute_for_tag("div"), None);
/// ```
pub fn attribute_for_tag(tag: &str) -> Option<&'static str> {
    match tag.to_ascii_lowercase().as_str() {
        "audio" | "iframe" | "track" | "img" | "source" | "script" | "embed" | "video" => {
            Some("src")
        }
        "link" | "a" | "use" => Some("href"),
        "meta" => Some("content"),
        "object" => Some("data"),
        "form" => Some("action"),
        _ => None,
    }
}

/// Checks whether a URL path already names a markup document
///
/// Such pages keep their own filename in the mirror instead of becoming
/// `<path>/<markup-filename>`.
pub fn is_markup_path(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && MARKUP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}
