use crate::crawler::{FetchedResource, Fetcher};
use crate::mirror::paths::{generate_unique_filename, local_segments, split_extension};
use crate::mirror::{DownloadOutcome, ResourceCache, ResourceRecord};
use crate::output::MirrorStats;
use crate::storage::Storage;
use crate::url::Origin;
use crate::{MirrorError, Result};
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// How a single download is named and stored
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Filename to save under instead of the URL's last path segment
    pub save_as: Option<String>,
    /// Directory (relative to the storage root) instead of the URL's path
    pub save_to: Option<PathBuf>,
    /// Require the URL (and `save_as`) to carry a file extension
    pub check_extension: bool,
    /// Add a random id to the filename of query-string URLs not seen before
    pub unique_if_queried: bool,
    /// Fetch again even if the file already exists
    pub overwrite: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            save_as: None,
            save_to: None,
            check_extension: true,
            unique_if_queried: false,
            overwrite: false,
        }
    }
}

impl DownloadOptions {
    /// Options used for resources embedded in crawled pages
    pub fn for_embedded(overwrite: bool) -> Self {
        Self {
            check_extension: false,
            unique_if_queried: true,
            overwrite,
            ..Self::default()
        }
    }
}

/// One entry of a batch download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    pub save_as: Option<String>,
    pub save_to: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            save_as: None,
            save_to: None,
        }
    }
}

/// Persists fetched resources under the storage root
pub struct MirrorWriter {
    fetcher: Arc<Fetcher>,
    cache: Arc<ResourceCache>,
    storage: Arc<dyn Storage>,
    root: PathBuf,
    stats: Arc<MirrorStats>,
}

impl MirrorWriter {
    pub fn new(
        fetcher: Arc<Fetcher>,
        cache: Arc<ResourceCache>,
        storage: Arc<dyn Storage>,
        root: impl Into<PathBuf>,
        stats: Arc<MirrorStats>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            storage,
            root: root.into(),
            stats,
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// Derives the directory and filename a URL is stored under
    ///
    /// Files from hosts other than `origin` go under a directory named after
    /// their host unless `save_to` is given.
    ///
    /// # Errors
    ///
    /// `MirrorError::Validation` when no usable filename can be derived, the
    /// extension check fails, or `save_to` tries to leave the storage root.
    pub fn target_for(
        origin: Option<&Origin>,
        url: &Url,
        options: &DownloadOptions,
    ) -> Result<(PathBuf, String)> {
        let (dirs, last) = local_segments(origin, url);
        let (_, url_ext) = split_extension(&last);

        if options.check_extension && url_ext.is_empty() && options.save_as.is_none() {
            return Err(MirrorError::Validation(format!(
                "no file extension found in {}; provide a save-as name",
                url
            )));
        }

        let filename = match &options.save_as {
            Some(name) => {
                let (stem, ext) = split_extension(name);
                if stem.is_empty() || ext.is_empty() || name.contains(['/', '\\']) {
                    return Err(MirrorError::Validation(format!(
                        "invalid save-as name '{}'",
                        name
                    )));
                }
                if options.check_extension && ext != url_ext {
                    return Err(MirrorError::Validation(format!(
                        "save-as extension '{}' does not match '{}' in {}",
                        ext, url_ext, url
                    )));
                }
                name.clone()
            }
            None => last,
        };

        if filename.is_empty() {
            return Err(MirrorError::Validation(format!(
                "cannot derive a filename from {}; provide a save-as name",
                url
            )));
        }

        let dir = match &options.save_to {
            Some(dir) => {
                let escapes = dir
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
                if escapes {
                    return Err(MirrorError::Validation(format!(
                        "save-to directory '{}' must stay inside the storage root",
                        dir.display()
                    )));
                }
                dir.clone()
            }
            None => dirs.iter().collect(),
        };

        Ok((dir, filename))
    }

    /// Downloads a resource and stores it in the mirror
    ///
    /// # Flow
    ///
    /// 1. Derive directory and filename (see [`MirrorWriter::target_for`])
    /// 2. For URLs with a query string, answer from the cache when the query
    ///    was seen before; otherwise optionally make the filename unique and
    ///    register the new record once written
    /// 3. Skip the network if the file exists and `overwrite` is off
    /// 4. Fetch and write the bytes
    ///
    /// # Errors
    ///
    /// * `MirrorError::Validation` - no usable target path
    /// * `MirrorError::StaleRequest` - the fetch gave up
    /// * `MirrorError::Storage` - the file could not be written
    pub async fn download_and_store(&self, url: &Url, options: &DownloadOptions) -> Result<ResourceRecord> {
        let (dir, filename) = Self::target_for(self.fetcher.session().origin(), url, options)?;
        let query = url.query().unwrap_or_default().to_string();

        if query.is_empty() {
            return self.store(url, &dir.join(&filename), &query, options.overwrite).await;
        }

        if let Some(existing) = self.cache.lookup(&query) {
            debug!("Query '{}' already mirrored as {}", query, existing.path.display());
            self.stats.record_cache_hit();
            return Ok(ResourceRecord {
                outcome: DownloadOutcome::Cached,
                ..existing
            });
        }

        let filename = if options.unique_if_queried {
            generate_unique_filename(&filename)
        } else {
            filename
        };
        let target = dir.join(filename);

        let (record, initialized) = self
            .cache
            .get_or_try_init(&query, || self.store(url, &target, &query, options.overwrite))
            .await?;

        if initialized {
            Ok(record)
        } else {
            self.stats.record_cache_hit();
            Ok(ResourceRecord {
                outcome: DownloadOutcome::Cached,
                ..record
            })
        }
    }

    /// Downloads several URLs through the same limiter
    ///
    /// `defaults` supplies the flags and any fallback `save_as`/`save_to`;
    /// results come back in request order.
    pub async fn download_urls(
        &self,
        requests: Vec<DownloadRequest>,
        defaults: &DownloadOptions,
    ) -> Vec<Result<ResourceRecord>> {
        let workers = self
            .fetcher
            .limiter()
            .suitable_worker_count(requests.len());

        stream::iter(requests)
            .map(|request| async move {
                let options = DownloadOptions {
                    save_as: request.save_as.or_else(|| defaults.save_as.clone()),
                    save_to: request.save_to.or_else(|| defaults.save_to.clone()),
                    ..defaults.clone()
                };
                self.download_and_store(&request.url, &options).await
            })
            .buffered(workers)
            .collect()
            .await
    }

    /// Fetches a page and stores it unmodified
    ///
    /// Pages are always fetched, since their markup is rewritten against the
    /// live site.
    pub async fn store_page(&self, url: &Url, relative_path: &Path) -> Result<FetchedResource> {
        let fetched = self.fetch(url).await?;
        self.storage
            .write_file(&self.root.join(relative_path), &fetched.body)?;
        debug!("Saved raw page {} to {}", url, relative_path.display());
        Ok(fetched)
    }

    /// Overwrites a stored page with its final markup
    pub fn write_markup(&self, relative_path: &Path, markup: &str) -> Result<()> {
        self.storage
            .write_file(&self.root.join(relative_path), markup.as_bytes())?;
        Ok(())
    }

    async fn store(&self, url: &Url, relative_path: &Path, query: &str, overwrite: bool) -> Result<ResourceRecord> {
        let record = |outcome| ResourceRecord {
            source_url: url.clone(),
            query: query.to_string(),
            path: relative_path.to_path_buf(),
            outcome,
        };

        let absolute = self.root.join(relative_path);
        if !overwrite && self.storage.file_exists(&absolute) {
            debug!("{} already exists, not fetching {}", absolute.display(), url);
            self.stats.record_existing();
            return Ok(record(DownloadOutcome::Existing));
        }

        let fetched = self.fetch(url).await?;
        self.storage.write_file(&absolute, &fetched.body)?;
        self.stats.record_download();
        info!("Downloaded {}", url);

        Ok(record(DownloadOutcome::Downloaded))
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        self.fetcher.fetch(url).await.map_err(|e| {
            if matches!(e, MirrorError::StaleRequest { .. }) {
                self.stats.record_stale();
            }
            e
        })
    }
}
