//! Acquisition layer: HTTP transport, bounded fan-out, and sitemap resolution.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod task_group;

pub use config::{FetchConfig, LeafSetProcessor, SitemapFilter};
pub use error::FetchError;
pub use fetcher::{fetch_document, resolve, resolve_all};
pub use http_client::{BodyReader, BoxError, HttpClient, HttpResponse, ReqwestClient};
pub use task_group::TaskGroup;
