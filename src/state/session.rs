use crate::config::{validate_credentials, Credentials};
use crate::url::{base_origin, Origin};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;

/// One mirror run
///
/// The origin is fixed by the first URL the session sees and never changes
/// afterwards; every same-origin decision of the run compares against it.
#[derive(Debug)]
pub struct CrawlSession {
    origin: OnceLock<Origin>,
    level_reached: AtomicU32,
    max_depth: u32,
    storage_root: PathBuf,
    credentials: Option<Credentials>,
    authenticated: AtomicBool,
    started_at: DateTime<Utc>,
}

impl CrawlSession {
    /// Creates a session that has not seen any URL yet
    pub fn new(max_depth: u32, storage_root: impl Into<PathBuf>, credentials: Option<Credentials>) -> Self {
        Self {
            origin: OnceLock::new(),
            level_reached: AtomicU32::new(0),
            max_depth,
            storage_root: storage_root.into(),
            credentials,
            authenticated: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    /// Fixes the session origin from the first URL passed in
    ///
    /// Later calls return the origin already stored, whatever URL they pass.
    /// Stored credentials are checked against the origin when it is first set.
    ///
    /// # Errors
    ///
    /// * `UrlError::InvalidUrl` - the URL lacks a scheme or host
    /// * `ConfigError` - the auth URL does not belong to the origin's host
    pub fn establish_origin(&self, url: &str) -> Result<&Origin> {
        if let Some(origin) = self.origin.get() {
            return Ok(origin);
        }

        let origin = base_origin(url)?;
        if let Some(credentials) = &self.credentials {
            validate_credentials(credentials, &origin)?;
        }

        Ok(self.origin.get_or_init(|| origin))
    }

    /// The session origin, if one has been established
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.get()
    }

    /// The session origin, failing if the crawl has not started
    pub fn require_origin(&self) -> Result<&Origin> {
        self.origin
            .get()
            .ok_or_else(|| MirrorError::Validation("crawl origin has not been established".to_string()))
    }

    /// Deepest traversal level reached so far
    pub fn level_reached(&self) -> u32 {
        self.level_reached.load(Ordering::SeqCst)
    }

    /// Records that the crawl descended one more level
    pub fn advance_level(&self) -> u32 {
        self.level_reached.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns true if credentials are stored but not yet used successfully
    pub fn needs_authentication(&self) -> bool {
        self.credentials.is_some() && !self.is_authenticated()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Clears origin, depth progress and authentication for a fresh run
    pub fn reset(&mut self) {
        self.origin.take();
        self.level_reached.store(0, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
        self.started_at = Utc::now();
    }
}
