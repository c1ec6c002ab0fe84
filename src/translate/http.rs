use crate::translate::{is_supported, Translator, LIBRETRANSLATE};
use crate::{MirrorError, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// Translator speaking the LibreTranslate JSON protocol
pub struct HttpTranslator {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(client: Client, endpoint: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    async fn translate(&self, markup: &str, target: &str) -> Result<String> {
        if !self.supports(target) {
            return Err(MirrorError::UnsupportedLanguage {
                code: target.to_string(),
                engine: LIBRETRANSLATE.to_string(),
            });
        }

        debug!("Translating {} bytes of markup into '{}'", markup.len(), target);
        let request = TranslateRequest {
            q: markup,
            source: "auto",
            target,
            format: "html",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| MirrorError::Translation(e.to_string()))?;

        let status = response.status();
        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| MirrorError::Translation(format!("unreadable response ({}): {}", status, e)))?;

        match (body.translated_text, body.error) {
            (Some(text), _) if status.is_success() => Ok(text),
            (_, Some(error)) => Err(MirrorError::Translation(error)),
            _ => Err(MirrorError::Translation(format!(
                "engine answered {} without a translation",
                status
            ))),
        }
    }
}

impl Translator for HttpTranslator {
    fn translate_markup<'a>(&'a self, markup: &'a str, target: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.translate(markup, target))
    }

    fn engine_name(&self) -> &str {
        LIBRETRANSLATE
    }

    fn supports(&self, language: &str) -> bool {
        is_supported(LIBRETRANSLATE, language)
    }
}
