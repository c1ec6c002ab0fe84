//! Crawl orchestrator - the depth-bounded mirror traversal
//!
//! The traversal is iterative: each level is a list of [`MirrorNode`]s whose
//! raw markup is already on disk. Processing a node mirrors its embedded
//! resources, fetches the same-origin pages it links to (these become the next
//! level), rewrites every handled reference and writes the page a final time.

use crate::config::Config;
use crate::crawler::{build_http_client, Fetcher, RateLimiter};
use crate::document::{Document, Element, TagFilter};
use crate::mirror::{
    compute_relative_reference, generate_unique_filename, page_location, DownloadOptions,
    MirrorWriter, ResourceCache,
};
use crate::output::{write_summary, CrawlStatistics, MirrorStats, RunSummary};
use crate::state::CrawlSession;
use crate::storage::{open_storage, Storage};
use crate::translate::{build_translator, Translator};
use crate::url::{attribute_for_tag, is_same_origin, resolve_reference, Origin};
use crate::{MirrorError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Filename of the markdown run summary written under the storage root
const SUMMARY_FILENAME: &str = "summary.md";

/// One mirrored page waiting to have its references rewritten
#[derive(Debug, Clone)]
pub struct MirrorNode {
    /// URL the page was fetched from
    pub url: Url,
    /// File location relative to the storage root
    pub path: PathBuf,
    /// Raw markup as fetched
    pub markup: String,
    /// Traversal level, 0 for the start page
    pub depth: u32,
}

impl MirrorNode {
    /// Directory of the page relative to the storage root
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}

/// Pages claimed during this session, keyed by host, URL path and query
///
/// A slot is only filled once its page has been stored; a stale fetch leaves
/// it empty so a later link can try again.
#[derive(Default)]
struct VisitedPages {
    slots: Mutex<HashMap<String, Arc<OnceCell<PathBuf>>>>,
}

impl VisitedPages {
    fn slot(&self, key: &str) -> Arc<OnceCell<PathBuf>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.to_string()).or_default().clone()
    }

    fn insert(&self, key: &str, path: PathBuf) {
        let _ = self.slot(key).set(path);
    }

    /// Path of a page already stored, without claiming a slot for it
    fn get(&self, key: &str) -> Option<PathBuf> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).and_then(|cell| cell.get().cloned())
    }

    fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|cell| cell.initialized()).count()
    }
}

/// Identity of a page in the visited registry: host, path and query
fn page_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.query() {
        Some(query) => format!("{}{}?{}", host, url.path(), query),
        None => format!("{}{}", host, url.path()),
    }
}

/// What a worker did with one link target
enum LinkOutcome {
    /// The link now points at a mirrored page; `node` is set if this worker fetched it
    Mirrored {
        reference: String,
        node: Option<MirrorNode>,
    },
    Skipped,
}

/// Shared, cheaply clonable context handed to every worker task
#[derive(Clone)]
struct WorkerContext {
    writer: Arc<MirrorWriter>,
    visited: Arc<VisitedPages>,
    origin: Origin,
    markup_filename: Arc<str>,
    overwrite: bool,
}

/// Drives a mirror crawl from the start page down to `max-depth`
pub struct CrawlOrchestrator {
    config: Arc<Config>,
    session: Arc<CrawlSession>,
    writer: Arc<MirrorWriter>,
    filters: Arc<Vec<TagFilter>>,
    translator: Option<Arc<dyn Translator>>,
    stats: Arc<MirrorStats>,
    visited: Arc<VisitedPages>,
    config_hash: Option<String>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator writing to the local filesystem
    ///
    /// # Errors
    ///
    /// * `MirrorError::Config` - the scrapable table is malformed
    /// * `MirrorError::UnsupportedLanguage` - the translation target is unsupported
    /// * `MirrorError::Reqwest` - the HTTP client could not be built
    pub fn new(config: Config) -> Result<Self> {
        Self::with_storage(config, open_storage())
    }

    /// Creates an orchestrator writing through the given storage backend
    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let filters = config.scrapable_filters()?;
        let client = build_http_client(&config.http)?;

        let limiter = Arc::new(RateLimiter::new(
            config.limiter.request_budget,
            config.pause(),
            config.limiter.max_retries,
        ));
        let session = Arc::new(CrawlSession::new(
            config.mirror.max_depth,
            config.mirror.storage_root.clone(),
            config.credentials.clone(),
        ));
        let fetcher = Arc::new(Fetcher::new(client.clone(), limiter, Arc::clone(&session)));
        let stats = Arc::new(MirrorStats::new());
        let writer = Arc::new(MirrorWriter::new(
            fetcher,
            Arc::new(ResourceCache::new()),
            storage,
            config.mirror.storage_root.clone(),
            Arc::clone(&stats),
        ));

        let translator = match &config.translation {
            Some(translation) => Some(build_translator(translation, client)?),
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            session,
            writer,
            filters: Arc::new(filters),
            translator,
            stats,
            visited: Arc::new(VisitedPages::default()),
            config_hash: None,
        })
    }

    /// Replaces the translator built from the configuration
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Records the configuration hash in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    pub fn writer(&self) -> &Arc<MirrorWriter> {
        &self.writer
    }

    /// Current value of the crawl counters
    pub fn stats(&self) -> CrawlStatistics {
        self.stats.snapshot()
    }

    /// Number of distinct pages stored so far
    pub fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    /// Runs the mirror crawl
    ///
    /// # Flow
    ///
    /// 1. Fix the session origin from the start URL
    /// 2. Fetch the start page and store it under `storage-path/markup-filename`
    /// 3. For each level, mirror every page's resources and, while depth
    ///    remains, fetch the pages it links to as the next level
    /// 4. Write the markdown summary and return the final counters
    ///
    /// # Errors
    ///
    /// Fails if the start URL is invalid or the start page cannot be fetched.
    /// Failures of single resources or linked pages are logged and skipped
    /// unless [`MirrorError::is_local`] says otherwise.
    pub async fn run(&self) -> Result<CrawlStatistics> {
        let mirror = &self.config.mirror;
        let origin = self.session.establish_origin(&mirror.start_url)?.clone();
        let start_url = Url::parse(&mirror.start_url)?;

        info!(
            "Mirroring {} (origin {}) to depth {} under {}",
            start_url,
            origin,
            mirror.max_depth,
            mirror.storage_root.display()
        );

        let entry_path = PathBuf::from(&mirror.storage_path).join(&mirror.markup_filename);
        let fetched = self.writer.store_page(&start_url, &entry_path).await?;
        self.visited.insert(&page_key(&start_url), entry_path.clone());
        if fetched.url != start_url {
            self.visited.insert(&page_key(&fetched.url), entry_path.clone());
        }

        let mut level = vec![MirrorNode {
            url: fetched.url.clone(),
            path: entry_path,
            markup: fetched.text(),
            depth: 0,
        }];
        let mut depth_remaining = mirror.max_depth;

        loop {
            let current = self.session.level_reached();
            info!("Mirroring level {} ({} pages)", current, level.len());

            let follow_links = depth_remaining > 0;
            let mut next_level = Vec::new();
            for node in level {
                match self.mirror_page(&origin, node, follow_links).await {
                    Ok(children) => next_level.extend(children),
                    Err(e) if e.is_local() => {
                        error!("Failed to mirror page: {}", e);
                        self.stats.record_failure();
                    }
                    Err(e) => return Err(e),
                }
            }

            self.stats.set_levels_reached(current);

            if !follow_links || next_level.is_empty() {
                break;
            }

            self.session.advance_level();
            depth_remaining -= 1;
            level = next_level;
        }

        let statistics = self.stats.snapshot();
        info!(
            "Mirror complete: {} pages, {} resources across {} levels",
            statistics.pages_mirrored,
            statistics.resources_mirrored(),
            statistics.levels_reached
        );

        self.write_run_summary(&statistics);
        Ok(statistics)
    }

    /// Mirrors one page and returns the pages it newly pulled in
    async fn mirror_page(&self, origin: &Origin, node: MirrorNode, follow_links: bool) -> Result<Vec<MirrorNode>> {
        debug!("Processing {} at level {}", node.url, node.depth);
        let mut document = Document::parse(node.markup.as_str());
        let context = self.worker_context(origin);

        let elements = document.find_any(&self.filters)?;
        let resources = group_by_reference(elements);
        let rewrites = self.mirror_resources(&context, &node, &resources).await;
        apply_rewrites(&mut document, &resources, &rewrites);

        let anchors = document.find_all(&TagFilter::new("a"))?;
        let links = group_by_reference(anchors);
        let mut children = Vec::new();
        if follow_links {
            let (link_rewrites, new_nodes) = self.mirror_links(&context, &node, &links).await;
            apply_rewrites(&mut document, &links, &link_rewrites);
            children = new_nodes;
        } else {
            let link_rewrites = visited_links(&context, &node, &links);
            apply_rewrites(&mut document, &links, &link_rewrites);
        }

        let mut markup = document.serialize()?;
        if let Some(translator) = &self.translator {
            markup = self.translate(translator.as_ref(), &node, markup).await;
        }

        self.writer.write_markup(&node.path, &markup)?;
        self.stats.record_page();
        info!(
            "Mirrored {} -> {} ({} references rewritten)",
            node.url,
            node.path.display(),
            document.pending_patches()
        );

        Ok(children)
    }

    /// Downloads every distinct embedded resource of a page concurrently
    ///
    /// Returns the relative reference for each attribute value that was mirrored.
    async fn mirror_resources(
        &self,
        context: &WorkerContext,
        node: &MirrorNode,
        resources: &[(String, Vec<Element>)],
    ) -> HashMap<String, String> {
        let workers = self.worker_count(resources.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        debug!("Mirroring {} resources of {} with {} workers", resources.len(), node.url, workers);

        for (value, elements) in resources {
            let Some(tag) = elements.first().map(|e| e.tag_name().to_string()) else {
                continue;
            };
            let context = context.clone();
            let semaphore = Arc::clone(&semaphore);
            let page_url = node.url.clone();
            let page_dir = node.directory().to_path_buf();
            let value = value.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = mirror_resource(&context, &page_url, &page_dir, &value, &tag).await;
                (value, outcome)
            });
        }

        let mut rewrites = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((value, Ok(Some(reference)))) => {
                    rewrites.insert(value, reference);
                }
                Ok((_, Ok(None))) => {}
                Ok((value, Err(e))) => {
                    if !matches!(e, MirrorError::StaleRequest { .. }) {
                        self.stats.record_failure();
                    }
                    warn!("Skipping resource '{}' on {}: {}", value, node.url, e);
                }
                Err(e) => {
                    self.stats.record_failure();
                    error!("Resource worker failed: {}", e);
                }
            }
        }

        rewrites
    }

    /// Mirrors the same-origin pages a page links to
    ///
    /// Returns the rewritten references and the pages fetched for the next level.
    async fn mirror_links(
        &self,
        context: &WorkerContext,
        node: &MirrorNode,
        links: &[(String, Vec<Element>)],
    ) -> (HashMap<String, String>, Vec<MirrorNode>) {
        let workers = self.worker_count(links.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        debug!("Following {} links of {} with {} workers", links.len(), node.url, workers);

        for (value, _) in links {
            let context = context.clone();
            let semaphore = Arc::clone(&semaphore);
            let page_url = node.url.clone();
            let page_dir = node.directory().to_path_buf();
            let depth = node.depth + 1;
            let value = value.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = mirror_link(&context, &page_url, &page_dir, &value, depth).await;
                (value, outcome)
            });
        }

        let mut rewrites = HashMap::new();
        let mut children = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((value, Ok(LinkOutcome::Mirrored { reference, node: child }))) => {
                    rewrites.insert(value, reference);
                    children.extend(child);
                }
                Ok((_, Ok(LinkOutcome::Skipped))) => {}
                Ok((value, Err(e))) => {
                    if !matches!(e, MirrorError::StaleRequest { .. }) {
                        self.stats.record_failure();
                    }
                    warn!("Not following '{}' on {}: {}", value, node.url, e);
                }
                Err(e) => {
                    self.stats.record_failure();
                    error!("Link worker failed: {}", e);
                }
            }
        }

        children.sort_by(|a, b| a.path.cmp(&b.path));
        (rewrites, children)
    }

    async fn translate(&self, translator: &dyn Translator, node: &MirrorNode, markup: String) -> String {
        let Some(target) = self.config.translation.as_ref().map(|t| t.target_language.as_str()) else {
            return markup;
        };

        match translator.translate_markup(&markup, target).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(
                    "{} translation of {} failed, keeping original: {}",
                    translator.engine_name(),
                    node.url,
                    e
                );
                self.stats.record_failure();
                markup
            }
        }
    }

    fn worker_context(&self, origin: &Origin) -> WorkerContext {
        WorkerContext {
            writer: Arc::clone(&self.writer),
            visited: Arc::clone(&self.visited),
            origin: origin.clone(),
            markup_filename: Arc::from(self.config.mirror.markup_filename.as_str()),
            overwrite: self.config.mirror.overwrite,
        }
    }

    fn worker_count(&self, items: usize) -> usize {
        self.writer
            .fetcher()
            .limiter()
            .suitable_worker_count(items)
    }

    fn write_run_summary(&self, statistics: &CrawlStatistics) {
        let summary = RunSummary {
            start_url: self.config.mirror.start_url.clone(),
            started_at: self.session.started_at(),
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            statistics: statistics.clone(),
        };

        let path = self.config.mirror.storage_root.join(SUMMARY_FILENAME);
        match write_summary(&path, &summary) {
            Ok(()) => info!("Run summary written to {}", path.display()),
            Err(e) => warn!("Failed to write run summary: {}", e),
        }
    }
}

/// Resolves and downloads one embedded resource
///
/// Returns `None` when the reference is not something to mirror (inline data,
/// another site).
async fn mirror_resource(
    context: &WorkerContext,
    page_url: &Url,
    page_dir: &Path,
    value: &str,
    tag: &str,
) -> Result<Option<String>> {
    let url = match resolve_reference(&context.origin, page_url, value, tag) {
        Ok(url) => url,
        Err(e) => {
            debug!("Not mirroring '{}': {}", value, e);
            return Ok(None);
        }
    };

    if !is_same_origin(&context.origin, &url) {
        debug!("Not mirroring external resource {}", url);
        return Ok(None);
    }

    let options = DownloadOptions::for_embedded(context.overwrite);
    let record = context.writer.download_and_store(&url, &options).await?;
    Ok(Some(compute_relative_reference(page_dir, &record.path)))
}

/// Resolves one link and fetches its target page unless it was mirrored before
async fn mirror_link(
    context: &WorkerContext,
    page_url: &Url,
    page_dir: &Path,
    value: &str,
    depth: u32,
) -> Result<LinkOutcome> {
    let Some((url, fragment)) = link_target(context, page_url, value) else {
        return Ok(LinkOutcome::Skipped);
    };

    let key = page_key(&url);
    let slot = context.visited.slot(&key);
    let mut fetched_node = None;
    let claimed = &mut fetched_node;
    let target = &url;

    let path = slot
        .get_or_try_init(move || async move {
            let (dir, mut filename) = page_location(Some(&context.origin), target, &context.markup_filename);
            if target.query().is_some() {
                filename = generate_unique_filename(&filename);
            }
            let path = dir.join(filename);

            let fetched = context.writer.store_page(target, &path).await?;
            *claimed = Some(MirrorNode {
                url: fetched.url.clone(),
                path: path.clone(),
                markup: fetched.text(),
                depth,
            });
            Ok::<_, MirrorError>(path)
        })
        .await?
        .clone();

    if fetched_node.is_none() {
        debug!("{} already mirrored as {}", url, path.display());
    }

    Ok(LinkOutcome::Mirrored {
        reference: link_reference(page_dir, &path, fragment),
        node: fetched_node,
    })
}

/// Resolves a link to a same-origin page, split from its fragment
///
/// Fragment-only, unresolvable and external links yield `None`.
fn link_target(context: &WorkerContext, page_url: &Url, value: &str) -> Option<(Url, Option<String>)> {
    if value.starts_with('#') {
        return None;
    }

    let mut url = match resolve_reference(&context.origin, page_url, value, "a") {
        Ok(url) => url,
        Err(e) => {
            debug!("Not following '{}': {}", value, e);
            return None;
        }
    };
    let fragment = url.fragment().map(str::to_string);
    url.set_fragment(None);

    if !is_same_origin(&context.origin, &url) {
        debug!("Not following external link {}", url);
        return None;
    }

    Some((url, fragment))
}

fn link_reference(page_dir: &Path, path: &Path, fragment: Option<String>) -> String {
    let mut reference = compute_relative_reference(page_dir, path);
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        reference.push('#');
        reference.push_str(&fragment);
    }
    reference
}

/// Rewrites links to pages stored earlier in the crawl, fetching nothing
///
/// Used on the last level, where links are no longer followed.
fn visited_links(
    context: &WorkerContext,
    node: &MirrorNode,
    links: &[(String, Vec<Element>)],
) -> HashMap<String, String> {
    links
        .iter()
        .filter_map(|(value, _)| {
            let (url, fragment) = link_target(context, &node.url, value)?;
            let path = context.visited.get(&page_key(&url))?;
            Some((value.clone(), link_reference(node.directory(), &path, fragment)))
        })
        .collect()
}

/// Groups elements by the value of their resource attribute, in document order
///
/// Elements without a resource attribute, or with an empty one, are dropped.
fn group_by_reference(elements: Vec<Element>) -> Vec<(String, Vec<Element>)> {
    let mut groups: Vec<(String, Vec<Element>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for element in elements {
        let Some(attribute) = attribute_for_tag(element.tag_name()) else {
            continue;
        };
        let Some(value) = element.get_attribute(attribute).map(str::trim) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        match index.get(value) {
            Some(&i) => groups[i].1.push(element),
            None => {
                index.insert(value.to_string(), groups.len());
                groups.push((value.to_string(), vec![element]));
            }
        }
    }

    groups
}

fn apply_rewrites(document: &mut Document, groups: &[(String, Vec<Element>)], rewrites: &HashMap<String, String>) {
    for (value, elements) in groups {
        let Some(reference) = rewrites.get(value) else {
            continue;
        };
        for element in elements {
            if let Some(attribute) = attribute_for_tag(element.tag_name()) {
                document.set_attribute(element, attribute, reference);
            }
        }
    }
}
