//! Headline extraction for news homepages and section pages.

use super::{Extractor, collapse_whitespace, jsonld, resolve_link};
use crate::models::{Candidate, Document, Record};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static INNER_HEADLINE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h1, h2, h3, [data-testid="card-headline"]"#).unwrap()
});

const ARTICLE_TYPES: &[&str] = &[
    "NewsArticle",
    "Article",
    "ReportageNewsArticle",
    "AnalysisNewsArticle",
    "BlogPosting",
    "LiveBlogPosting",
    "ListItem",
];

/// Extracts `title|url` keyed headline candidates.
#[derive(Debug, Clone)]
pub struct HeadlineExtractor {
    min_title_len: usize,
    denylist: Vec<String>,
}

impl HeadlineExtractor {
    pub fn new(min_title_len: usize, denylist: &[String]) -> Self {
        Self {
            min_title_len,
            denylist: denylist.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Headlines declared in JSON-LD (`NewsArticle.headline`, `ItemList` entries).
    pub fn extract_structured(&self, document: &Document, html: &Html) -> Vec<Candidate> {
        let mut out = Vec::new();
        for block in jsonld::blocks(html) {
            jsonld::visit_objects(&block, &mut |map| {
                if let Some(candidate) = self.structured_entry(document, map) {
                    out.push(candidate);
                }
            });
        }
        out
    }

    /// Anchors that wrap a heading, or sit inside a heading or story card.
    pub fn extract_markup(&self, document: &Document, html: &Html) -> Vec<Candidate> {
        html.select(&ANCHOR)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let title = headline_text(anchor)?;
                self.candidate(document, &title, href, "markup")
            })
            .collect()
    }

    fn structured_entry(
        &self,
        document: &Document,
        map: &Map<String, Value>,
    ) -> Option<Candidate> {
        let title = match jsonld::string_field(map, "headline") {
            Some(headline) => headline,
            None if jsonld::has_type(map, ARTICLE_TYPES) => jsonld::string_field(map, "name")?,
            None => return None,
        };
        let url = jsonld::string_field(map, "url")?;
        self.candidate(document, &title, &url, "structured")
    }

    /// Whether a cleaned-up title looks like a real headline.
    pub fn accepts_title(&self, title: &str) -> bool {
        if title.chars().count() < self.min_title_len {
            return false;
        }
        let lower = title.to_lowercase();
        !self.denylist.iter().any(|phrase| lower.contains(phrase))
    }

    fn candidate(
        &self,
        document: &Document,
        title: &str,
        href: &str,
        kind: &str,
    ) -> Option<Candidate> {
        let title = collapse_whitespace(title);
        if !self.accepts_title(&title) {
            return None;
        }
        let url = resolve_link(&document.locator, href)?;
        Some(
            Record::new(headline_key(&title, &url))
                .with("title", title)
                .with("url", url.as_str())
                .with_opt("section", document.label.clone())
                .with("kind", kind),
        )
    }
}

/// Composite identity of a headline.
pub fn headline_key(title: &str, url: &Url) -> String {
    format!("{}|{}", title, url)
}

/// Title text for an anchor: the heading it wraps, or its own text when the
/// anchor sits inside a heading or a story card (`[data-testid*=card]`).
/// Anything else is navigation.
fn headline_text(anchor: ElementRef<'_>) -> Option<String> {
    if let Some(inner) = anchor.select(&INNER_HEADLINE).next() {
        return Some(inner.text().collect::<String>());
    }
    let in_headline_container = anchor.ancestors().filter_map(ElementRef::wrap).any(|el| {
        matches!(el.value().name(), "h1" | "h2" | "h3")
            || el
                .value()
                .attr("data-testid")
                .is_some_and(|id| id.contains("card"))
    });
    in_headline_container.then(|| anchor.text().collect::<String>())
}

impl Extractor for HeadlineExtractor {
    fn extract(&self, document: &Document) -> Vec<Candidate> {
        let html = Html::parse_document(&document.body);
        let mut out = self.extract_structured(document, &html);
        out.extend(self.extract_markup(document, &html));
        out
    }
}
