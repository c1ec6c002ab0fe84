//! Optional translation of mirrored pages
//!
//! Translation runs on the fully rewritten markup right before a page is
//! written for the last time, so attribute values already point at local files
//! and are left alone by the engine.

mod http;

pub use http::HttpTranslator;

use crate::config::TranslationConfig;
use crate::{MirrorError, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use std::sync::Arc;

/// Language codes accepted by the LibreTranslate engine
const LIBRETRANSLATE_LANGUAGES: &[&str] = &[
    "ar", "az", "bg", "bn", "ca", "cs", "da", "de", "el", "en", "eo", "es", "et", "fa", "fi",
    "fr", "ga", "he", "hi", "hu", "id", "it", "ja", "ko", "lt", "lv", "ms", "nb", "nl", "pl",
    "pt", "ro", "ru", "sk", "sl", "sq", "sv", "th", "tl", "tr", "uk", "ur", "vi", "zh", "zt",
];

/// Name of the built-in HTTP engine
pub const LIBRETRANSLATE: &str = "libretranslate";

/// A markup translation engine
pub trait Translator: Send + Sync {
    /// Translates the text of an HTML document, leaving markup intact
    fn translate_markup<'a>(&'a self, markup: &'a str, target: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Name used in logs and errors
    fn engine_name(&self) -> &str;

    /// Returns true if the engine can translate into the language
    fn supports(&self, language: &str) -> bool;
}

/// Returns the language codes an engine supports
pub fn supported_languages(engine: &str) -> &'static [&'static str] {
    if engine.eq_ignore_ascii_case(LIBRETRANSLATE) {
        LIBRETRANSLATE_LANGUAGES
    } else {
        &[]
    }
}

/// Returns true if the engine can translate into the language
pub fn is_supported(engine: &str, language: &str) -> bool {
    let language = language.trim().to_ascii_lowercase();
    supported_languages(engine).contains(&language.as_str())
}

/// Builds the translator described by a configuration
///
/// # Errors
///
/// `MirrorError::UnsupportedLanguage` if the engine is unknown or cannot
/// translate into the target language.
pub fn build_translator(config: &TranslationConfig, client: Client) -> Result<Arc<dyn Translator>> {
    if !is_supported(&config.engine, &config.target_language) {
        return Err(MirrorError::UnsupportedLanguage {
            code: config.target_language.clone(),
            engine: config.engine.clone(),
        });
    }

    let endpoint = url::Url::parse(&config.endpoint)?;
    Ok(Arc::new(HttpTranslator::new(
        client,
        endpoint,
        config.api_key.clone(),
    )))
}
