//! Sitemap document model: leaf `<urlset>` and index `<sitemapindex>` documents.

use super::datetime::W3cDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Localized variants of a URL, keyed by `hreflang`.
pub type Alternates = BTreeMap<String, String>;

/// How frequently the page at a URL is likely to change.
///
/// Advisory only. Values outside the seven documented tokens are kept
/// verbatim in [`ChangeFrequency::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
    Other(String),
}

impl ChangeFrequency {
    /// The value as written in a sitemap.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ChangeFrequency {
    fn from(s: &str) -> Self {
        match s {
            "always" => Self::Always,
            "hourly" => Self::Hourly,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" => Self::Yearly,
            "never" => Self::Never,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChangeFrequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChangeFrequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A crawlable document listed in a `<urlset>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlEntry {
    /// `<loc>`: the URL of the page. Always non-empty.
    pub location: String,
    /// `<lastmod>`.
    pub last_modified: Option<W3cDateTime>,
    /// `<changefreq>`.
    pub change_frequency: Option<ChangeFrequency>,
    /// `<priority>`. Conventionally 0.0 to 1.0, 0.5 when absent. Not clamped.
    pub priority: Option<f64>,
    /// `<xhtml:link rel="alternate" hreflang=".." href=".."/>` children.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alternates: Alternates,
}

impl UrlEntry {
    /// An entry with only a location.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
            change_frequency: None,
            priority: None,
            alternates: Alternates::new(),
        }
    }
}

/// A pointer to a child sitemap listed in a `<sitemapindex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitemapRef {
    /// `<loc>`: the URL of the child sitemap.
    pub location: String,
    /// `<lastmod>`.
    pub last_modified: Option<W3cDateTime>,
}

impl SitemapRef {
    /// A reference to `location` without a `lastmod`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
        }
    }
}

/// A leaf sitemap: entries in document order, not deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlSet {
    pub urls: Vec<UrlEntry>,
}

/// An index sitemap: child references in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapIndex {
    pub sitemaps: Vec<SitemapRef>,
}

/// Which root element a document was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    UrlSet,
    SitemapIndex,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlSet => f.write_str("<urlset>"),
            Self::SitemapIndex => f.write_str("<sitemapindex>"),
        }
    }
}

/// A parsed sitemap document. Exactly one variant per parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Document {
    UrlSet(UrlSet),
    SitemapIndex(SitemapIndex),
}

impl Document {
    /// Which root element the document had.
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::UrlSet(_) => DocumentKind::UrlSet,
            Self::SitemapIndex(_) => DocumentKind::SitemapIndex,
        }
    }
}
