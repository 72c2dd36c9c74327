//! Sitemap resolution: fetch a root document and expand sitemap indexes.
//!
//! A root `<urlset>` is handed to the processor as-is. A root
//! `<sitemapindex>` is filtered, then each child is fetched with bounded
//! parallelism. Children must share the root's origin and must themselves be
//! `<urlset>` documents. The first failing child cancels the rest: pending
//! children are never fetched and in-flight requests are abandoned, while a
//! batch already handed to the processor is processed to completion.

use super::config::{FetchConfig, LeafSetProcessor};
use super::error::FetchError;
use super::http_client::{BoxError, HttpClient, ReqwestClient};
use super::task_group::TaskGroup;
use crate::document::{parse_async, Document, DocumentKind, SitemapRef, UrlEntry};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Resolve `root` and return every URL entry found.
///
/// Entries from a root `<urlset>` keep document order. Entries from an index
/// arrive in child completion order, which is not guaranteed to match the
/// index. If `config` carries its own processor, entries go there instead
/// and the returned vector is empty.
pub async fn resolve_all(root: &str, config: FetchConfig) -> Result<Vec<UrlEntry>, FetchError> {
    if let Some(processor) = config.processor.clone() {
        run(root, &config, processor).await?;
        return Ok(Vec::new());
    }

    let collector = Arc::new(Collector::default());
    run(root, &config, collector.clone()).await?;
    Ok(collector.take())
}

/// Resolve `root`, streaming each `<urlset>` through the configured processor
/// as soon as it is parsed.
///
/// Batches delivered before a failure are not retracted. Without a processor
/// the documents are fetched and validated, and their entries dropped.
pub async fn resolve(root: &str, config: FetchConfig) -> Result<(), FetchError> {
    let processor = config
        .processor
        .clone()
        .unwrap_or_else(|| Arc::new(Discard) as Arc<dyn LeafSetProcessor>);
    run(root, &config, processor).await
}

/// Fetch and parse a single sitemap document.
///
/// Non-2xx responses fail with [`FetchError::HttpStatus`] carrying the start
/// of the body. The response is released before returning on every path.
pub async fn fetch_document(client: &dyn HttpClient, url: &Url) -> Result<Document, FetchError> {
    debug!("fetching sitemap {url}");
    let resp = client
        .get(url)
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    if !resp.is_success() {
        let status = resp.status;
        let body = resp.body_snippet().await;
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status,
            body,
        });
    }

    parse_async(resp.body)
        .await
        .map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
}

async fn run(
    root: &str,
    config: &FetchConfig,
    processor: Arc<dyn LeafSetProcessor>,
) -> Result<(), FetchError> {
    let root_url = parse_url(root)?;
    let client: Arc<dyn HttpClient> = match &config.client {
        Some(client) => Arc::clone(client),
        None => Arc::new(ReqwestClient::new().map_err(|source| FetchError::Transport {
            url: root.to_string(),
            source,
        })?),
    };
    let token = config
        .cancellation
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();
    let cancelled = || FetchError::Cancelled {
        url: root.to_string(),
    };

    let document = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(cancelled()),
        document = fetch_document(client.as_ref(), &root_url) => document?,
    };

    let sitemaps = match document {
        Document::UrlSet(set) => {
            info!("{root} is a urlset with {} entries", set.urls.len());
            return processor
                .process(None, set.urls)
                .await
                .map_err(|source| FetchError::Processor {
                    url: root.to_string(),
                    source,
                });
        }
        Document::SitemapIndex(index) => index.sitemaps,
    };

    let listed = sitemaps.len();
    let sitemaps = match &config.filter {
        Some(filter) => filter(sitemaps),
        None => sitemaps,
    };
    let limit = config.parallelism();
    info!(
        "{root} is a sitemap index with {listed} children, fetching {} with parallelism {limit}",
        sitemaps.len()
    );

    let mut group = TaskGroup::with_token(limit, token.clone());
    for sitemap in sitemaps {
        if group.is_cancelled() {
            break;
        }
        let unit = fetch_child(
            Arc::clone(&client),
            Arc::clone(&processor),
            group.token().clone(),
            root_url.clone(),
            sitemap,
        );
        if !group.spawn(unit).await {
            break;
        }
    }
    group.wait().await?;

    // Child failures surface through `wait`; a cancelled token here means the
    // caller cancelled.
    if token.is_cancelled() {
        return Err(cancelled());
    }
    debug!("{root} resolved");
    Ok(())
}

async fn fetch_child(
    client: Arc<dyn HttpClient>,
    processor: Arc<dyn LeafSetProcessor>,
    token: CancellationToken,
    root: Url,
    sitemap: SitemapRef,
) -> Result<(), FetchError> {
    let result = fetch_child_inner(
        client.as_ref(),
        processor.as_ref(),
        &token,
        &root,
        &sitemap,
    )
    .await;
    if let Err(e) = &result {
        warn!("child sitemap {} failed: {e}", sitemap.location);
    }
    result
}

async fn fetch_child_inner(
    client: &dyn HttpClient,
    processor: &dyn LeafSetProcessor,
    token: &CancellationToken,
    root: &Url,
    sitemap: &SitemapRef,
) -> Result<(), FetchError> {
    let url = parse_url(&sitemap.location)?;
    if !same_origin(root, &url) {
        return Err(FetchError::OriginMismatch {
            url: sitemap.location.clone(),
            root: root.origin().ascii_serialization(),
        });
    }

    // Dropping the fetch releases the request and its body. The processor
    // call below is never raced.
    let document = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("abandoned {} after cancellation", sitemap.location);
            return Ok(());
        }
        document = fetch_document(client, &url) => document?,
    };

    match document {
        Document::UrlSet(set) => {
            debug!("{} has {} entries", sitemap.location, set.urls.len());
            processor
                .process(Some(sitemap), set.urls)
                .await
                .map_err(|source| FetchError::Processor {
                    url: sitemap.location.clone(),
                    source,
                })
        }
        other => Err(FetchError::UnexpectedDocument {
            url: sitemap.location.clone(),
            expected: DocumentKind::UrlSet,
            found: other.kind(),
        }),
    }
}

fn parse_url(location: &str) -> Result<Url, FetchError> {
    Url::parse(location).map_err(|source| FetchError::InvalidUrl {
        url: location.to_string(),
        source,
    })
}

/// Scheme, host and port must all match; default ports are normalized.
fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Accumulator used by [`resolve_all`].
#[derive(Default)]
struct Collector {
    urls: Mutex<Vec<UrlEntry>>,
}

impl Collector {
    fn take(&self) -> Vec<UrlEntry> {
        match self.urls.lock() {
            Ok(mut urls) => std::mem::take(&mut *urls),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl LeafSetProcessor for Collector {
    async fn process(
        &self,
        _source: Option<&SitemapRef>,
        urls: Vec<UrlEntry>,
    ) -> Result<(), BoxError> {
        let mut guard = self.urls.lock().map_err(|_| "url accumulator poisoned")?;
        guard.extend(urls);
        Ok(())
    }
}

struct Discard;

#[async_trait]
impl LeafSetProcessor for Discard {
    async fn process(
        &self,
        source: Option<&SitemapRef>,
        urls: Vec<UrlEntry>,
    ) -> Result<(), BoxError> {
        debug!(
            "dropping {} entries from {}",
            urls.len(),
            source.map_or("root", |s| s.location.as_str())
        );
        Ok(())
    }
}
