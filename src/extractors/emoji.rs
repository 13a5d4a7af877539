//! Emoji reference page extraction.
//!
//! Entries on the listing page are links to per-emoji pages whose last path
//! segment is a stable slug (`/apple/ios-18/grinning-face` ->
//! `grinning-face`). An entry is only kept when its thumbnail points at the
//! configured image host; placeholder and lazy-loading images are ignored
//! until the real URL has been mounted.

use super::{Extractor, collapse_whitespace, jsonld, last_path_segment, resolve_link};
use crate::models::{Candidate, Document, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::trace;
use url::Url;

static ENTRY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static THUMBNAIL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Extracts `slug -> {name, href, image}` candidates.
#[derive(Debug, Clone)]
pub struct EmojiExtractor {
    image_host: Regex,
}

impl EmojiExtractor {
    pub fn new(image_host: Regex) -> Self {
        Self { image_host }
    }

    /// Build from the pattern string in configuration.
    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(pattern)?))
    }

    /// Entries described by JSON-LD `ItemList` data.
    pub fn extract_structured(&self, document: &Document, html: &Html) -> Vec<Candidate> {
        let mut out = Vec::new();
        for block in jsonld::blocks(html) {
            jsonld::visit_objects(&block, &mut |map| {
                if let Some(candidate) = self.structured_entry(&document.locator, map) {
                    out.push(candidate);
                }
            });
        }
        out
    }

    /// Entries found as `<a href><img></a>` in the rendered markup.
    pub fn extract_markup(&self, document: &Document, html: &Html) -> Vec<Candidate> {
        html.select(&ENTRY_LINK)
            .filter_map(|link| self.markup_entry(&document.locator, link))
            .collect()
    }

    fn structured_entry(&self, base: &Url, map: &Map<String, Value>) -> Option<Candidate> {
        let href = jsonld::string_field(map, "url")?;
        let image = jsonld::string_field(map, "image")?;
        let name = jsonld::string_field(map, "name");
        self.candidate(base, &href, &image, name)
    }

    fn markup_entry(&self, base: &Url, link: ElementRef<'_>) -> Option<Candidate> {
        let href = link.value().attr("href")?;
        let img = link.select(&THUMBNAIL).next()?;
        let image = self.image_url(base, img)?;

        let name = img
            .value()
            .attr("alt")
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty())
            .or_else(|| link.value().attr("title").map(collapse_whitespace))
            .or_else(|| Some(collapse_whitespace(&link.text().collect::<String>())))
            .filter(|s| !s.is_empty());

        self.candidate(base, href, image.as_str(), name)
    }

    /// First of `src`, `data-src`, or any `srcset` entry that resolves onto
    /// the image host.
    fn image_url(&self, base: &Url, img: ElementRef<'_>) -> Option<Url> {
        let attrs = img.value();
        let direct = ["src", "data-src"]
            .iter()
            .filter_map(|name| attrs.attr(name));
        let srcset = ["srcset", "data-srcset"]
            .iter()
            .filter_map(|name| attrs.attr(name))
            .flat_map(|set| set.split(',').filter_map(|entry| entry.split_whitespace().next()));

        direct
            .chain(srcset)
            .filter_map(|raw| resolve_link(base, raw))
            .find(|url| self.image_host.is_match(url.as_str()))
    }

    fn candidate(
        &self,
        base: &Url,
        href: &str,
        image: &str,
        name: Option<String>,
    ) -> Option<Candidate> {
        let href = resolve_link(base, href)?;
        let image = resolve_link(base, image)?;
        if !self.image_host.is_match(image.as_str()) {
            trace!(%href, %image, "Thumbnail not on image host yet");
            return None;
        }
        let key = last_path_segment(&href)?;
        Some(
            Record::new(key)
                .with_opt("name", name)
                .with("href", href.as_str())
                .with("image", image.as_str()),
        )
    }
}

impl Extractor for EmojiExtractor {
    fn extract(&self, document: &Document) -> Vec<Candidate> {
        let html = Html::parse_document(&document.body);
        let mut out = self.extract_structured(document, &html);
        out.extend(self.extract_markup(document, &html));
        out
    }
}
