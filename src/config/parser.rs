use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_mirror::config::load_config;
///
/// let config = load_config(Path::new("mirror.toml")).unwrap();
/// println!("Request budget: {}", config.limiter.request_budget);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    // Validation happens before any network activity
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at crawl start so two mirror runs can be matched to the settings
/// that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PauseDuration;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = create_temp_config(
            r#"
[mirror]
start-url = "https://example.com/"
"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.mirror.max_depth, 0);
        assert_eq!(config.mirror.markup_filename, "index.html");
        assert_eq!(config.limiter.request_budget, 20);
        assert_eq!(config.limiter.pause_duration, PauseDuration::Auto);
        assert_eq!(config.limiter.max_retries, 3);
        assert!(config.credentials.is_none());
        assert!(config.scrapable.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let file = create_temp_config(
            r#"
[mirror]
start-url = "https://example.com/"
max-depth = 2
markup-filename = "page.html"
storage-root = "./out"
overwrite = true

[limiter]
request-budget = 40
pause-duration = 8
max-retries = 5

[[scrapable]]
tag = "link"
attrs = { rel = "stylesheet" }

[[scrapable]]
tag = "img"

[credentials]
auth_url = "https://example.com/login"
auth_username_field = "user"
auth_password_field = "pass"
auth_username = "me"
auth_password = "secret"

[credentials.additional_auth_fields]
remember = "1"

[translation]
target-language = "fr"
endpoint = "https://translate.example.com/translate"
"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.mirror.max_depth, 2);
        assert!(config.mirror.overwrite);
        assert_eq!(
            config.limiter.pause_duration,
            PauseDuration::Fixed(Duration::from_secs(8))
        );
        assert_eq!(config.scrapable_filters().unwrap().len(), 2);

        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.auth_username_field, "user");
        assert_eq!(
            credentials.additional_auth_fields.get("remember"),
            Some(&"1".to_string())
        );

        let translation = config.translation.unwrap();
        assert_eq!(translation.engine, "libretranslate");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/mirror.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_credential_key_is_rejected() {
        let file = create_temp_config(
            r#"
[mirror]
start-url = "https://example.com/"

[credentials]
auth_url = "https://example.com/login"
auth_username_field = "user"
auth_username = "me"
auth_password = "secret"
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config(
            r#"
[mirror]
start-url = "https://example.com/"

[limiter]
request-budget = 0
"#,
        );
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
