//! Resolver configuration and caller hooks.

use super::http_client::{BoxError, HttpClient};
use crate::document::{SitemapRef, UrlEntry};
use async_trait::async_trait;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Receives the entries of every `<urlset>` found while resolving.
///
/// `source` is `None` when the root document itself was a `<urlset>`, and
/// the index entry that pointed at the document otherwise. Calls for
/// different children may run concurrently and arrive in completion order.
/// An error aborts the whole resolution.
#[async_trait]
pub trait LeafSetProcessor: Send + Sync {
    async fn process(
        &self,
        source: Option<&SitemapRef>,
        urls: Vec<UrlEntry>,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl<F> LeafSetProcessor for F
where
    F: Fn(Option<&SitemapRef>, Vec<UrlEntry>) -> Result<(), BoxError> + Send + Sync,
{
    async fn process(
        &self,
        source: Option<&SitemapRef>,
        urls: Vec<UrlEntry>,
    ) -> Result<(), BoxError> {
        self(source, urls)
    }
}

/// Selects which index entries are fetched. Runs before any child request.
pub type SitemapFilter = Arc<dyn Fn(Vec<SitemapRef>) -> Vec<SitemapRef> + Send + Sync>;

/// Options for [`resolve`](super::fetcher::resolve) and
/// [`resolve_all`](super::fetcher::resolve_all). Every field is optional.
#[derive(Clone, Default)]
pub struct FetchConfig {
    /// Transport. Defaults to [`ReqwestClient::new`](super::http_client::ReqwestClient::new).
    pub client: Option<Arc<dyn HttpClient>>,
    /// Maximum concurrent child fetches. Defaults to the number of
    /// available CPUs; zero also means the default.
    pub max_parallelism: Option<usize>,
    /// Index entry filter. Defaults to keeping every entry.
    pub filter: Option<SitemapFilter>,
    /// Entry sink. `resolve_all` collects entries itself when unset.
    pub processor: Option<Arc<dyn LeafSetProcessor>>,
    /// Parent cancellation token. Cancelling it aborts all outstanding work;
    /// child failures never cancel it.
    pub cancellation: Option<CancellationToken>,
}

impl FetchConfig {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client` as the transport.
    pub fn with_client(self, client: impl HttpClient + 'static) -> Self {
        self.with_shared_client(Arc::new(client))
    }

    /// Use an already shared transport.
    pub fn with_shared_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Fetch at most `limit` children at once. Zero means the default.
    pub fn with_max_parallelism(mut self, limit: usize) -> Self {
        self.max_parallelism = Some(limit);
        self
    }

    /// Keep only the index entries `filter` returns.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<SitemapRef>) -> Vec<SitemapRef> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Send every `<urlset>` batch to `processor`.
    pub fn with_processor(mut self, processor: impl LeafSetProcessor + 'static) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Like [`with_processor`](Self::with_processor), for a plain closure.
    pub fn with_processor_fn<F>(self, processor: F) -> Self
    where
        F: Fn(Option<&SitemapRef>, Vec<UrlEntry>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.with_processor(processor)
    }

    /// Abort resolution when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The effective child fetch limit.
    pub fn parallelism(&self) -> usize {
        match self.max_parallelism {
            Some(limit) if limit > 0 => limit,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("client", &self.client.as_ref().map(|_| "custom"))
            .field("max_parallelism", &self.max_parallelism)
            .field("filter", &self.filter.is_some())
            .field("processor", &self.processor.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}
