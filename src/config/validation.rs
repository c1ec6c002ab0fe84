use crate::config::types::{
    Config, Credentials, LimiterConfig, MirrorConfig, PauseDuration, TranslationConfig,
};
use crate::translate;
use crate::url::{base_origin, is_same_origin, Origin};
use crate::ConfigError;
use url::Url;

/// Largest request budget a configuration may ask for
pub const MAX_REQUEST_BUDGET: u32 = 100;

/// Shortest fixed pause, in seconds, a configuration may ask for
pub const MIN_PAUSE_SECS: u64 = 5;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let origin = validate_mirror_config(&config.mirror)?;
    validate_limiter_config(&config.limiter)?;
    config.scrapable_filters()?;

    if let Some(credentials) = &config.credentials {
        validate_credentials(credentials, &origin)?;
    }

    if let Some(translation) = &config.translation {
        validate_translation_config(translation)?;
    }

    Ok(())
}

/// Validates the mirror section and returns the crawl origin
fn validate_mirror_config(config: &MirrorConfig) -> Result<Origin, ConfigError> {
    let origin = base_origin(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url: {}", e)))?;

    if !config.markup_filename.ends_with(".html") {
        return Err(ConfigError::File(format!(
            "markup-filename must end with .html, got '{}'",
            config.markup_filename
        )));
    }

    if config.markup_filename.contains('/') {
        return Err(ConfigError::File(format!(
            "markup-filename must be a bare filename, got '{}'",
            config.markup_filename
        )));
    }

    if config.storage_root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage-root cannot be empty".to_string(),
        ));
    }

    Ok(origin)
}

/// Validates request budget and pause settings
fn validate_limiter_config(config: &LimiterConfig) -> Result<(), ConfigError> {
    if config.request_budget < 1 || config.request_budget > MAX_REQUEST_BUDGET {
        return Err(ConfigError::Validation(format!(
            "request-budget must be between 1 and {}, got {}",
            MAX_REQUEST_BUDGET, config.request_budget
        )));
    }

    if let PauseDuration::Fixed(pause) = config.pause_duration {
        if pause.as_secs() < MIN_PAUSE_SECS {
            return Err(ConfigError::Validation(format!(
                "pause-duration must be at least {} seconds, got {}",
                MIN_PAUSE_SECS,
                pause.as_secs()
            )));
        }
    }

    Ok(())
}

/// Validates login credentials against the crawl origin
///
/// Every field must be non-empty and the auth URL must live on the crawl's host.
pub fn validate_credentials(credentials: &Credentials, origin: &Origin) -> Result<(), ConfigError> {
    let required = [
        ("auth_url", &credentials.auth_url),
        ("auth_username_field", &credentials.auth_username_field),
        ("auth_password_field", &credentials.auth_password_field),
        ("auth_username", &credentials.auth_username),
        ("auth_password", &credentials.auth_password),
    ];

    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidCredentials(format!(
                "'{}' cannot be empty",
                key
            )));
        }
    }

    let auth_url = Url::parse(&credentials.auth_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid auth_url: {}", e)))?;

    if !is_same_origin(origin, &auth_url) {
        return Err(ConfigError::InvalidUrl(format!(
            "auth_url '{}' is not on the crawl host '{}'",
            credentials.auth_url, origin.host
        )));
    }

    Ok(())
}

/// Validates the translation target before any crawling starts
fn validate_translation_config(config: &TranslationConfig) -> Result<(), ConfigError> {
    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid translation endpoint: {}", e)))?;

    if !translate::is_supported(&config.engine, &config.target_language) {
        return Err(ConfigError::UnsupportedLanguage {
            code: config.target_language.clone(),
            engine: config.engine.clone(),
        });
    }

    Ok(())
}
