//! Local path derivation and relative-reference arithmetic
//!
//! All paths produced here are relative to the storage root, made of plain
//! `Normal` components, so they can be joined onto the root and compared
//! with each other component by component.

use crate::url::{host_directory, is_markup_path, Origin};
use percent_encoding::percent_decode_str;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Splits a URL path into directory segments and the final segment
///
/// Empty, `.` and `..` segments are dropped so the result can never climb out
/// of the storage root.
pub fn path_segments(url: &Url) -> (Vec<String>, String) {
    let path = url.path();
    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(decode_segment)
        .collect();

    if path.ends_with('/') || segments.is_empty() {
        return (segments, String::new());
    }

    let last = segments.pop().unwrap_or_default();
    (segments, last)
}

/// Like [`path_segments`], with files of other hosts moved under a
/// directory named after the host
pub fn local_segments(origin: Option<&Origin>, url: &Url) -> (Vec<String>, String) {
    let (mut dirs, last) = path_segments(url);
    if let Some(host) = host_directory(origin, url) {
        dirs.insert(0, host);
    }
    (dirs, last)
}

/// Directory (relative to the storage root) and filename of a mirrored page
///
/// `/about` becomes `about/<markup_filename>`, `/docs/page.html` keeps its own
/// name, and the site root maps to `<markup_filename>` at the top. Pages of a
/// subdomain go under a directory named after it.
pub fn page_location(origin: Option<&Origin>, url: &Url, markup_filename: &str) -> (PathBuf, String) {
    let (dirs, last) = local_segments(origin, url);

    if !last.is_empty() && is_markup_path(url.path()) {
        return (dirs.iter().collect(), last);
    }

    let mut dir: PathBuf = dirs.iter().collect();
    if !last.is_empty() {
        dir.push(last);
    }
    (dir, markup_filename.to_string())
}

/// Splits a filename into stem and extension (including the dot)
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(i) if i > 0 => filename.split_at(i),
        _ => (filename, ""),
    }
}

/// Returns the filename with a random lowercase alphanumeric id inserted
/// before its extension
///
/// # Examples
///
/// ```
/// use site_mirror::mirror::generate_unique_filename;
///
/// let name = generate_unique_filename("style.css");
/// assert!(name.starts_with("style"));
/// assert!(name.ends_with(".css"));
/// assert!(name.len() > "style.css".len());
/// ```
pub fn generate_unique_filename(filename: &str) -> String {
    let (stem, ext) = split_extension(filename);
    format!("{}{}{}", stem, generate_unique_id(), ext)
}

/// A random id of 4 to 6 characters from `[0-9a-z]`
pub fn generate_unique_id() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(4..=6);
    (&mut rng)
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(len)
        .collect()
}

/// Computes the reference from a page's directory to a mirrored file
///
/// Both paths must be relative to the same root. The result uses forward
/// slashes and starts with `./` unless it already starts with `..`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use site_mirror::mirror::compute_relative_reference;
///
/// assert_eq!(compute_relative_reference(Path::new(""), Path::new("a/b.png")), "./a/b.png");
/// assert_eq!(
///     compute_relative_reference(Path::new("docs/intro"), Path::new("css/site.css")),
///     "../../css/site.css"
/// );
/// ```
pub fn compute_relative_reference(from_dir: &Path, to_file: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().filter(is_named).collect();
    let to: Vec<Component<'_>> = to_file.components().filter(is_named).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::with_capacity(from.len() - common + to.len() - common);
    parts.extend(std::iter::repeat("..".to_string()).take(from.len() - common));
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

fn is_named(component: &Component<'_>) -> bool {
    matches!(component, Component::Normal(_))
}

/// Percent-decodes a path segment, keeping it on one directory level
fn decode_segment(segment: &str) -> String {
    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    if decoded.contains(['/', '\\']) || decoded == ".." || decoded == "." || decoded.is_empty() {
        segment.to_string()
    } else {
        decoded.into_owned()
    }
}
