//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client (one cookie jar per crawl)
//! - The one-time login handshake when credentials are configured
//! - Admission through the rate limiter before every request
//! - Retry and backoff on rate limiting and server errors

use crate::config::HttpConfig;
use crate::crawler::headers::{pick_user_agent, request_headers};
use crate::crawler::limiter::RateLimiter;
use crate::state::CrawlSession;
use crate::{MirrorError, Result};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

/// Name of the cookie carrying the login form's CSRF token
const CSRF_COOKIE: &str = "csrftoken";

/// Form field the CSRF token is posted back in
const CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// The body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What to do with the outcome of one request attempt
#[derive(Debug)]
pub enum ResponseVerdict {
    /// The resource was fetched
    Ok(FetchedResource),
    /// A transient failure; worth retrying while the retry budget lasts
    Retryable(String),
    /// A client error other than the terminal ones; spends one retry, then gives up
    Rejected(String),
    /// The resource will not become available; give up without retrying
    Stale(String),
}

/// Classification of a non-success HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 429 and 5xx
    Transient,
    /// 403, 404 and 410
    Terminal,
    /// Any other status
    Rejected,
}

/// Classifies an HTTP status for retry purposes
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | Success |
/// | 429, 5xx | Transient (retried with backoff) |
/// | 403, 404, 410 | Terminal (stale immediately, no retry spent) |
/// | other | Rejected (stale after spending one retry) |
pub fn classify_status(status: StatusCode) -> StatusClass {
    match status {
        s if s.is_success() => StatusClass::Success,
        StatusCode::TOO_MANY_REQUESTS => StatusClass::Transient,
        s if s.is_server_error() => StatusClass::Transient,
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => StatusClass::Terminal,
        _ => StatusClass::Rejected,
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client keeps a cookie store so a login survives for the whole crawl,
/// and follows redirects.
///
/// # Example
///
/// ```no_run
/// use site_mirror::config::HttpConfig;
/// use site_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs authenticated, rate-limited GET requests for a crawl
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    session: Arc<CrawlSession>,
    auth: OnceCell<()>,
    sticky_agent: OnceLock<String>,
}

impl Fetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, session: Arc<CrawlSession>) -> Self {
        Self {
            client,
            limiter,
            session,
            auth: OnceCell::new(),
            sticky_agent: OnceLock::new(),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Request Flow
    ///
    /// 1. Log in once if credentials are stored and the session is not yet
    ///    authenticated
    /// 2. Wait for the rate limiter to admit the request
    /// 3. Send the GET and judge the response
    /// 4. On a transient failure spend one retry and back off for twice the
    ///    pause duration; once retries run out, reset them and give up
    ///
    /// # Errors
    ///
    /// * `MirrorError::StaleRequest` - the resource is unavailable; the caller
    ///   skips it and carries on
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        self.ensure_authenticated().await;

        loop {
            self.limiter.acquire().await;

            match self.attempt(url).await {
                ResponseVerdict::Ok(resource) => {
                    debug!("Fetched {} ({} bytes)", url, resource.body.len());
                    return Ok(resource);
                }
                ResponseVerdict::Retryable(reason) => {
                    self.limiter.on_error_response();
                    if self.limiter.can_retry() {
                        let backoff = self.limiter.backoff_duration();
                        warn!("{} for {}, retrying in {:?}", reason, url, backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    self.limiter.reset_retries();
                    warn!("{} for {}, retries exhausted; moving on", reason, url);
                    return Err(self.stale(url));
                }
                ResponseVerdict::Rejected(reason) => {
                    self.limiter.on_error_response();
                    if !self.limiter.can_retry() {
                        self.limiter.reset_retries();
                    }
                    warn!("{} for {}; moving on", reason, url);
                    return Err(self.stale(url));
                }
                ResponseVerdict::Stale(reason) => {
                    warn!("{} for {}; moving on", reason, url);
                    return Err(self.stale(url));
                }
            }
        }
    }

    /// Sends one request and judges the outcome
    async fn attempt(&self, url: &Url) -> ResponseVerdict {
        debug!("GET {}", url);
        let headers = request_headers(self.session.origin(), url, &self.user_agent());

        let response = match self.client.get(url.clone()).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => return ResponseVerdict::Retryable(format!("Network error ({})", e)),
        };

        let status = response.status();
        match classify_status(status) {
            StatusClass::Success => {}
            StatusClass::Transient => {
                return ResponseVerdict::Retryable(format!("HTTP {}", status.as_u16()))
            }
            StatusClass::Terminal => {
                return ResponseVerdict::Stale(format!("HTTP {}", status.as_u16()))
            }
            StatusClass::Rejected => {
                return ResponseVerdict::Rejected(format!("HTTP {}", status.as_u16()))
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(body) => ResponseVerdict::Ok(FetchedResource {
                url: final_url,
                status: status.as_u16(),
                content_type,
                body: body.to_vec(),
            }),
            Err(e) => ResponseVerdict::Retryable(format!("Body read error ({})", e)),
        }
    }

    /// Logs in at most once per fetcher, however many workers ask
    async fn ensure_authenticated(&self) {
        if !self.session.needs_authentication() {
            return;
        }

        self.auth
            .get_or_init(|| async {
                if let Err(e) = self.authenticate().await {
                    error!("{}; continuing unauthenticated", e);
                }
            })
            .await;
    }

    /// Runs the login handshake
    ///
    /// GETs the login page to obtain the CSRF cookie, then POSTs the
    /// credentials, any additional fields and the token. A 2xx answer marks
    /// the session authenticated.
    pub async fn authenticate(&self) -> Result<()> {
        let Some(credentials) = self.session.credentials() else {
            return Ok(());
        };

        let auth_url = Url::parse(&credentials.auth_url)?;
        info!("Authenticating at {}", auth_url);

        let headers = request_headers(self.session.origin(), &auth_url, &self.user_agent());
        let page = self
            .client
            .get(auth_url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        let csrf_token = page
            .cookies()
            .find(|cookie| cookie.name() == CSRF_COOKIE)
            .map(|cookie| cookie.value().to_string());

        let mut form: Vec<(String, String)> = vec![
            (
                credentials.auth_username_field.clone(),
                credentials.auth_username.clone(),
            ),
            (
                credentials.auth_password_field.clone(),
                credentials.auth_password.clone(),
            ),
        ];
        form.extend(
            credentials
                .additional_auth_fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if let Some(token) = csrf_token {
            form.push((CSRF_FIELD.to_string(), token));
        }

        let response = self
            .client
            .post(auth_url.clone())
            .headers(headers)
            .form(&form)
            .send()
            .await?;

        if response.status().is_success() {
            self.session.mark_authenticated();
            info!("Authenticated");
            Ok(())
        } else {
            Err(MirrorError::AuthenticationFailed {
                url: auth_url.to_string(),
                status: Some(response.status().as_u16()),
            })
        }
    }

    /// Agent for the next request; fixed for the crawl once credentials are in play
    fn user_agent(&self) -> String {
        if self.session.credentials().is_some() {
            self.sticky_agent.get_or_init(pick_user_agent).clone()
        } else {
            pick_user_agent()
        }
    }

    fn stale(&self, url: &Url) -> MirrorError {
        MirrorError::StaleRequest {
            url: url.to_string(),
        }
    }
}
