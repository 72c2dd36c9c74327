//! Errors surfaced by the sitemap resolver.

use super::http_client::BoxError;
use crate::document::{DocumentKind, ParseError};

/// A fatal error while resolving a sitemap. Every variant names the location
/// it concerns.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid sitemap URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch {url}: expected 2xx, got {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        /// The first few KiB of the response body.
        body: String,
    },

    #[error("failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },

    #[error("expected {expected} at {url}, got {found}")]
    UnexpectedDocument {
        url: String,
        expected: DocumentKind,
        found: DocumentKind,
    },

    #[error("refusing to fetch {url} as it is a different origin than {root}")]
    OriginMismatch { url: String, root: String },

    /// The caller's cancellation token fired before resolution finished.
    #[error("resolving {url} was cancelled")]
    Cancelled { url: String },

    #[error("processing the entries of {url} failed: {source}")]
    Processor {
        url: String,
        #[source]
        source: BoxError,
    },
}

impl FetchError {
    /// The location the error concerns.
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Transport { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::Parse { url, .. }
            | Self::UnexpectedDocument { url, .. }
            | Self::OriginMismatch { url, .. }
            | Self::Cancelled { url }
            | Self::Processor { url, .. } => url,
        }
    }

    /// HTTP status code for [`FetchError::HttpStatus`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
