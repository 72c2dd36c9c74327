//! Single-pass sitemap parser.
//!
//! The input is usually a one-shot HTTP body, so the root element is
//! identified while streaming: `<urlset>` and `<sitemapindex>` are decoded,
//! every other element is skipped along with its subtree. The same push
//! decoder backs the blocking ([`parse`]) and async ([`parse_async`]) readers.

use super::datetime::{DateTimeError, W3cDateTime};
use super::types::{
    Alternates, ChangeFrequency, Document, DocumentKind, SitemapIndex, SitemapRef, UrlEntry,
    UrlSet,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use tokio::io::AsyncBufRead;

/// Errors produced while decoding a sitemap document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The byte stream is not well-formed XML, or could not be read.
    #[error("failed to read XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// A `<urlset>` or `<sitemapindex>` was found but its content is invalid.
    #[error("malformed sitemap: {reason}")]
    Malformed { reason: String },
    #[error("invalid <lastmod>: {0}")]
    InvalidDateTime(#[from] DateTimeError),
    /// The stream ended without a `<urlset>` or `<sitemapindex>` element.
    #[error("no <urlset> or <sitemapindex> root element found")]
    NoMatchingRoot,
    #[error("expected {expected}, got {found}")]
    UnexpectedRoot {
        expected: DocumentKind,
        found: DocumentKind,
    },
}

fn malformed(reason: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        reason: reason.into(),
    }
}

/// Parse a sitemap from a blocking reader.
pub fn parse<R: BufRead>(reader: R) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);
    let mut decoder = Decoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => return decoder.finish(),
            event => decoder.feed(event)?,
        }
        buf.clear();
    }
}

/// Parse a sitemap from an async reader, such as a streamed response body.
pub async fn parse_async<R: AsyncBufRead + Unpin>(reader: R) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);
    let mut decoder = Decoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into_async(&mut buf).await? {
            Event::Eof => return decoder.finish(),
            event => decoder.feed(event)?,
        }
        buf.clear();
    }
}

/// Parse a sitemap held in memory.
pub fn parse_str(xml: &str) -> Result<Document, ParseError> {
    parse(xml.as_bytes())
}

impl UrlSet {
    /// Decode a document that must be a `<urlset>`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        match parse(reader)? {
            Document::UrlSet(set) => Ok(set),
            other => Err(ParseError::UnexpectedRoot {
                expected: DocumentKind::UrlSet,
                found: other.kind(),
            }),
        }
    }
}

impl SitemapIndex {
    /// Decode a document that must be a `<sitemapindex>`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        match parse(reader)? {
            Document::SitemapIndex(index) => Ok(index),
            other => Err(ParseError::UnexpectedRoot {
                expected: DocumentKind::SitemapIndex,
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

/// One open element on the decoder stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Skip,
    UrlSet,
    SitemapIndex,
    Url,
    Sitemap,
    Field(Field),
    Link,
}

impl Frame {
    fn name(self) -> &'static str {
        match self {
            Frame::Skip => "an unknown element",
            Frame::UrlSet => "<urlset>",
            Frame::SitemapIndex => "<sitemapindex>",
            Frame::Url => "<url>",
            Frame::Sitemap => "<sitemap>",
            Frame::Field(Field::Loc) => "<loc>",
            Frame::Field(Field::LastMod) => "<lastmod>",
            Frame::Field(Field::ChangeFreq) => "<changefreq>",
            Frame::Field(Field::Priority) => "<priority>",
            Frame::Link => "<link>",
        }
    }
}

/// Raw child values of the `<url>` or `<sitemap>` being decoded.
#[derive(Debug, Default)]
struct RawEntry {
    location: Option<String>,
    last_modified: Option<String>,
    change_frequency: Option<String>,
    priority: Option<String>,
    alternates: Alternates,
}

impl RawEntry {
    fn location(&mut self, element: &str) -> Result<String, ParseError> {
        match self.location.take() {
            Some(loc) if !loc.is_empty() => Ok(loc),
            _ => Err(malformed(format!("{element} without <loc>"))),
        }
    }

    fn last_modified(&mut self) -> Result<Option<W3cDateTime>, ParseError> {
        match self.last_modified.take().filter(|s| !s.is_empty()) {
            Some(s) => Ok(Some(W3cDateTime::parse(&s)?)),
            None => Ok(None),
        }
    }

    fn into_url_entry(mut self) -> Result<UrlEntry, ParseError> {
        let location = self.location("<url>")?;
        let last_modified = self.last_modified()?;
        let priority = match self.priority.filter(|s| !s.is_empty()) {
            Some(p) => Some(
                p.parse::<f64>()
                    .map_err(|_| malformed(format!("invalid <priority> {p:?} for {location}")))?,
            ),
            None => None,
        };
        let change_frequency = self
            .change_frequency
            .filter(|s| !s.is_empty())
            .map(|s| ChangeFrequency::from(s.as_str()));

        Ok(UrlEntry {
            location,
            last_modified,
            change_frequency,
            priority,
            alternates: self.alternates,
        })
    }

    fn into_sitemap_ref(mut self) -> Result<SitemapRef, ParseError> {
        Ok(SitemapRef {
            location: self.location("<sitemap>")?,
            last_modified: self.last_modified()?,
        })
    }
}

/// Push decoder fed one XML event at a time.
#[derive(Debug, Default)]
struct Decoder {
    stack: Vec<Frame>,
    urls: Vec<UrlEntry>,
    sitemaps: Vec<SitemapRef>,
    current: RawEntry,
    text: String,
    result: Option<Document>,
}

impl Decoder {
    fn feed(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(ref e) => self.start(e),
            Event::Empty(ref e) => {
                self.start(e)?;
                self.end()
            }
            Event::End(_) => self.end(),
            Event::Text(ref e) => {
                if self.in_field() {
                    self.text.push_str(&e.unescape()?);
                }
                Ok(())
            }
            Event::CData(ref e) => {
                if self.in_field() {
                    let text = std::str::from_utf8(e)
                        .map_err(|_| malformed("CDATA section is not valid UTF-8"))?;
                    self.text.push_str(text);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn in_field(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Field(_)))
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let parent = self.stack.last().copied();
        let frame = match (parent, e.local_name().as_ref()) {
            // The first recognized root wins; later top-level elements are skipped.
            (None, b"urlset") if self.result.is_none() => Frame::UrlSet,
            (None, b"sitemapindex") if self.result.is_none() => Frame::SitemapIndex,
            (Some(Frame::UrlSet), b"url") => Frame::Url,
            (Some(Frame::SitemapIndex), b"sitemap") => Frame::Sitemap,
            (Some(Frame::Url | Frame::Sitemap), b"loc") => Frame::Field(Field::Loc),
            (Some(Frame::Url | Frame::Sitemap), b"lastmod") => Frame::Field(Field::LastMod),
            (Some(Frame::Url), b"changefreq") => Frame::Field(Field::ChangeFreq),
            (Some(Frame::Url), b"priority") => Frame::Field(Field::Priority),
            (Some(Frame::Url), b"link") => {
                self.alternate_link(e)?;
                Frame::Link
            }
            _ => Frame::Skip,
        };

        match frame {
            Frame::Url | Frame::Sitemap => self.current = RawEntry::default(),
            Frame::Field(_) => self.text.clear(),
            _ => {}
        }
        self.stack.push(frame);
        Ok(())
    }

    fn end(&mut self) -> Result<(), ParseError> {
        let Some(frame) = self.stack.pop() else {
            return Err(malformed("closing tag without a matching opening tag"));
        };

        match frame {
            Frame::Field(field) => {
                let value = self.text.trim().to_string();
                self.text.clear();
                match field {
                    Field::Loc => self.current.location = Some(value),
                    Field::LastMod => self.current.last_modified = Some(value),
                    Field::ChangeFreq => self.current.change_frequency = Some(value),
                    Field::Priority => self.current.priority = Some(value),
                }
            }
            Frame::Url => {
                let raw = std::mem::take(&mut self.current);
                self.urls.push(raw.into_url_entry()?);
            }
            Frame::Sitemap => {
                let raw = std::mem::take(&mut self.current);
                self.sitemaps.push(raw.into_sitemap_ref()?);
            }
            Frame::UrlSet => {
                let urls = std::mem::take(&mut self.urls);
                self.result = Some(Document::UrlSet(UrlSet { urls }));
            }
            Frame::SitemapIndex => {
                let sitemaps = std::mem::take(&mut self.sitemaps);
                self.result = Some(Document::SitemapIndex(SitemapIndex { sitemaps }));
            }
            Frame::Skip | Frame::Link => {}
        }
        Ok(())
    }

    /// Record an `<xhtml:link>` child; only `rel="alternate"` is kept.
    fn alternate_link(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let mut rel = None;
        let mut hreflang = None;
        let mut href = None;

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.local_name().as_ref() {
                b"rel" => rel = Some(value),
                b"hreflang" => hreflang = Some(value),
                b"href" => href = Some(value),
                _ => {}
            }
        }

        if rel.as_deref() == Some("alternate") {
            self.current
                .alternates
                .insert(hreflang.unwrap_or_default(), href.unwrap_or_default());
        }
        Ok(())
    }

    fn finish(self) -> Result<Document, ParseError> {
        if let Some(frame) = self.stack.last() {
            return Err(malformed(format!(
                "document ended inside {}",
                frame.name()
            )));
        }
        self.result.ok_or(ParseError::NoMatchingRoot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::datetime::Precision;

    const SAMPLE_URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">
    <url>
        <loc>http://www.example.com/bar</loc>
        <lastmod>2005-01-01</lastmod>
        <changefreq>monthly</changefreq>
        <priority>0.8</priority>
    </url>
    <url>
        <loc>http://www.example.com/foo</loc>
        <changefreq>weekly</changefreq>
        <xhtml:link rel="alternate" hreflang="de" href="http://www.example.com/foo?hl=de"/>
        <xhtml:link rel="alternate" hreflang="de-ch" href="http://www.example.com/foo?hl=de-ch"/>
        <xhtml:link rel="alternate" hreflang="en" href="http://www.example.com/foo?hl=en"/>
    </url>
</urlset>"#;

    const SAMPLE_INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <sitemap>
        <loc>http://www.example.com/sitemap1.xml.gz</loc>
        <lastmod>2004-10-01T18:23:17+00:00</lastmod>
    </sitemap>
    <sitemap>
        <loc>http://www.example.com/sitemap2.xml.gz</loc>
        <lastmod>2005-01-01</lastmod>
    </sitemap>
</sitemapindex>"#;

    fn url_set(xml: &str) -> UrlSet {
        match parse_str(xml).unwrap() {
            Document::UrlSet(set) => set,
            other => panic!("expected urlset, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_parse_urlset() {
        let set = url_set(SAMPLE_URLSET);
        assert_eq!(set.urls.len(), 2);

        let bar = &set.urls[0];
        assert_eq!(bar.location, "http://www.example.com/bar");
        assert_eq!(bar.change_frequency, Some(ChangeFrequency::Monthly));
        assert_eq!(bar.priority, Some(0.8));
        let lastmod = bar.last_modified.unwrap();
        assert_eq!(lastmod.precision(), Precision::Day);
        assert_eq!(lastmod.to_string(), "2005-01-01");
        assert!(bar.alternates.is_empty());

        let foo = &set.urls[1];
        assert_eq!(foo.location, "http://www.example.com/foo");
        assert_eq!(foo.change_frequency, Some(ChangeFrequency::Weekly));
        assert_eq!(foo.priority, None);
        assert_eq!(foo.last_modified, None);
        assert_eq!(foo.alternates.len(), 3);
        assert_eq!(foo.alternates["de"], "http://www.example.com/foo?hl=de");
        assert_eq!(foo.alternates["de-ch"], "http://www.example.com/foo?hl=de-ch");
        assert_eq!(foo.alternates["en"], "http://www.example.com/foo?hl=en");
    }

    #[test]
    fn test_parse_sitemap_index() {
        let index = SitemapIndex::from_reader(SAMPLE_INDEX.as_bytes()).unwrap();
        assert_eq!(index.sitemaps.len(), 2);
        assert_eq!(index.sitemaps[0].location, "http://www.example.com/sitemap1.xml.gz");
        assert_eq!(
            index.sitemaps[0].last_modified.unwrap().precision(),
            Precision::Second
        );
        assert_eq!(
            index.sitemaps[1].last_modified.unwrap().precision(),
            Precision::Day
        );
    }

    #[test]
    fn test_typed_reader_rejects_other_root() {
        let err = UrlSet::from_reader(SAMPLE_INDEX.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedRoot {
                expected: DocumentKind::UrlSet,
                found: DocumentKind::SitemapIndex,
            }
        ));
    }

    #[test]
    fn test_unrecognized_root_is_an_error() {
        assert!(matches!(parse_str("<foo/>"), Err(ParseError::NoMatchingRoot)));
        assert!(matches!(parse_str(""), Err(ParseError::NoMatchingRoot)));
        // A urlset nested under an unknown root is skipped with its parent.
        let nested = "<foo><urlset><url><loc>http://a/</loc></url></urlset></foo>";
        assert!(matches!(parse_str(nested), Err(ParseError::NoMatchingRoot)));
    }

    #[test]
    fn test_unknown_siblings_are_skipped() {
        let xml = r#"<?xml version="1.0"?>
<!-- generated -->
<meta><urlset/></meta>
<urlset xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
    <note>ignored</note>
    <url>
        <loc>http://a.example/1</loc>
        <image:image><image:loc>http://a.example/1.png</image:loc></image:image>
    </url>
</urlset>
<urlset><url><loc>http://a.example/second-root</loc></url></urlset>"#;

        let set = url_set(xml);
        assert_eq!(set.urls.len(), 1);
        assert_eq!(set.urls[0].location, "http://a.example/1");
    }

    #[test]
    fn test_empty_urlset_is_a_result() {
        assert_eq!(url_set("<urlset/>").urls.len(), 0);
    }

    #[test]
    fn test_alternates_filtering_and_last_write_wins() {
        let xml = r#"<urlset xmlns:xhtml="http://www.w3.org/1999/xhtml"><url>
            <loc>http://a.example/</loc>
            <xhtml:link rel="canonical" hreflang="fr" href="http://a.example/canonical"/>
            <xhtml:link rel="alternate" hreflang="de" href="http://a.example/de-1"/>
            <xhtml:link rel="alternate" hreflang="de" href="http://a.example/de-2"/>
            <link rel="Alternate" hreflang="it" href="http://a.example/it"/>
        </url></urlset>"#;

        let entry = &url_set(xml).urls[0];
        assert_eq!(entry.alternates.len(), 1);
        assert_eq!(entry.alternates["de"], "http://a.example/de-2");
        assert!(!entry.alternates.contains_key("fr"));
        assert!(!entry.alternates.contains_key("it"));
    }

    #[test]
    fn test_unknown_changefreq_is_kept_verbatim() {
        let xml = "<urlset><url><loc>http://a/</loc><changefreq>fortnightly</changefreq></url></urlset>";
        assert_eq!(
            url_set(xml).urls[0].change_frequency,
            Some(ChangeFrequency::Other("fortnightly".to_string()))
        );
    }

    #[test]
    fn test_text_is_trimmed_and_unescaped() {
        let xml = "<urlset><url><loc>\n  http://a/?x=1&amp;y=2\n</loc></url>\
                   <url><loc><![CDATA[http://a/cdata]]></loc></url></urlset>";
        let set = url_set(xml);
        assert_eq!(set.urls[0].location, "http://a/?x=1&y=2");
        assert_eq!(set.urls[1].location, "http://a/cdata");
    }

    #[test]
    fn test_malformed_children_fail() {
        let bad_priority = "<urlset><url><loc>http://a/</loc><priority>high</priority></url></urlset>";
        assert!(matches!(
            parse_str(bad_priority),
            Err(ParseError::Malformed { .. })
        ));

        let bad_lastmod = "<urlset><url><loc>http://a/</loc><lastmod>yesterday</lastmod></url></urlset>";
        assert!(matches!(
            parse_str(bad_lastmod),
            Err(ParseError::InvalidDateTime(_))
        ));

        let missing_loc = "<sitemapindex><sitemap><lastmod>2005-01-01</lastmod></sitemap></sitemapindex>";
        assert!(matches!(
            parse_str(missing_loc),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_broken_xml_fails() {
        let mismatched = "<urlset><url><loc>http://a/</url></urlset>";
        assert!(matches!(parse_str(mismatched), Err(ParseError::Xml(_))));

        let truncated = "<urlset><url><loc>http://a/</loc></url>";
        assert!(matches!(
            parse_str(truncated),
            Err(ParseError::Xml(_) | ParseError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_parse_async_matches_blocking() {
        let doc = parse_async(SAMPLE_URLSET.as_bytes()).await.unwrap();
        assert_eq!(doc, parse_str(SAMPLE_URLSET).unwrap());

        let doc = parse_async(SAMPLE_INDEX.as_bytes()).await.unwrap();
        assert_eq!(doc.kind(), DocumentKind::SitemapIndex);
    }
}
