//! Sitemap documents: model types, W3C datetimes, and the streaming parser.

pub mod datetime;
pub mod parser;
pub mod types;

pub use datetime::{DateTimeError, Precision, W3cDateTime};
pub use parser::{parse, parse_async, parse_str, ParseError};
pub use types::{
    Alternates, ChangeFrequency, Document, DocumentKind, SitemapIndex, SitemapRef, UrlEntry,
    UrlSet,
};
