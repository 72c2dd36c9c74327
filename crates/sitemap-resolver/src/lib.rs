//! Sitemap retrieval for crawlers.
//!
//! [`document`] parses `<urlset>` and `<sitemapindex>` documents from a
//! single pass over a byte stream. [`acquisition`] fetches a root sitemap
//! and, when it is an index, resolves its same-origin children in parallel.
//!
//! ```no_run
//! use sitemap_resolver::{resolve_all, FetchConfig};
//!
//! # async fn run() -> Result<(), sitemap_resolver::FetchError> {
//! let config = FetchConfig::new().with_max_parallelism(4);
//! let urls = resolve_all("https://example.com/sitemap.xml", config).await?;
//! for url in &urls {
//!     println!("{}", url.location);
//! }
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod document;

pub use acquisition::{
    fetch_document, resolve, resolve_all, BoxError, FetchConfig, FetchError, HttpClient,
    HttpResponse, LeafSetProcessor, ReqwestClient,
};
pub use document::{
    parse, parse_async, parse_str, ChangeFrequency, Document, DocumentKind, ParseError,
    Precision, SitemapIndex, SitemapRef, UrlEntry, UrlSet, W3cDateTime,
};
