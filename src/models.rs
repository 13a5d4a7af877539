//! Data models shared by the harvesting core and the scrapers.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Record`]: a keyed bag of scrape-specific attributes (also used as a
//!   [`Candidate`] before deduplication)
//! - [`SourceDescriptor`]: a static description of one page to fetch
//! - [`Document`]: fetched or rendered markup handed to an extractor
//! - [`HeadlineReport`]: the envelope written by the headline scraper
//!
//! Attribute maps are `BTreeMap`s so serialized output is stable between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Attribute values are optional strings; `None` serializes as JSON `null`.
pub type Attributes = BTreeMap<String, Option<String>>;

/// A harvested record.
///
/// `key` is the dedup identity (a slug, or a `title|url` composite) and never
/// changes once the record lands in a harvest mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    /// Stable dedup identity.
    pub key: String,
    /// Scrape-specific attributes (name, href, image; or title, url, section, kind).
    pub attributes: Attributes,
}

/// A record straight out of an extractor, possibly colliding with others.
pub type Candidate = Record;

impl Record {
    /// Create a record with no attributes.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), Some(value.into()));
        self
    }

    /// Builder-style setter for an attribute that may be absent.
    pub fn with_opt(mut self, name: &str, value: Option<String>) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Look up a populated attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_deref())
    }
}

/// A static, immutable description of one source page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    /// Short identifier used in logs.
    pub id: String,
    /// Where to fetch the page from.
    pub locator: Url,
    /// Grouping label carried onto every record from this source (e.g. the section name).
    pub label: String,
}

/// Markup retrieved for one locator, either from a browser snapshot or an HTTP body.
#[derive(Debug, Clone)]
pub struct Document {
    /// Locator the markup came from; relative links are resolved against it.
    pub locator: Url,
    /// Grouping label of the source, when the document came from a fixed source list.
    pub label: Option<String>,
    /// Raw markup.
    pub body: String,
}

impl Document {
    pub fn new(locator: Url, body: impl Into<String>) -> Self {
        Self {
            locator,
            label: None,
            body: body.into(),
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The JSON document written by the headline scraper.
#[derive(Debug, Deserialize, Serialize)]
pub struct HeadlineReport {
    /// When the crawl finished.
    pub generated_at: DateTime<Utc>,
    /// Number of sources that were attempted.
    pub sources: usize,
    /// Number of headlines in `headlines`.
    pub count: usize,
    /// Deduplicated headlines sorted by section, then key.
    pub headlines: Vec<Attributes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = Record::new("grinning-face")
            .with("name", "Grinning Face")
            .with_opt("image", None);

        assert_eq!(record.key, "grinning-face");
        assert_eq!(record.attr("name"), Some("Grinning Face"));
        assert_eq!(record.attr("image"), None);
        assert!(record.attributes.contains_key("image"));
    }

    #[test]
    fn test_attributes_serialize_null() {
        let record = Record::new("k").with_opt("image", None);
        let json = serde_json::to_string(&record.attributes).unwrap();
        assert_eq!(json, r#"{"image":null}"#);
    }

    #[test]
    fn test_source_descriptor_deserialization() {
        let yaml = r#"
id: world
locator: https://www.bbc.com/news/world
label: World
"#;
        let source: SourceDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.id, "world");
        assert_eq!(source.locator.host_str(), Some("www.bbc.com"));
        assert_eq!(source.label, "World");
    }

    #[test]
    fn test_document_labelled() {
        let doc = Document::new(Url::parse("https://example.com/").unwrap(), "<html></html>")
            .labelled("Home");
        assert_eq!(doc.label.as_deref(), Some("Home"));
    }

    #[test]
    fn test_headline_report_serialization() {
        let report = HeadlineReport {
            generated_at: Utc::now(),
            sources: 2,
            count: 0,
            headlines: vec![],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"sources\":2"));
        assert!(json.contains("generated_at"));
    }
}
