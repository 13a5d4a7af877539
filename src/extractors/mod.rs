//! Extractors turn a fetched or rendered [`Document`] into candidate records.
//!
//! An extractor is a pure function of the markup: it never touches the
//! network or the page it was handed. Each one is best-effort over individual
//! nodes, so a malformed JSON-LD block or an anchor without an `href` is
//! skipped and extraction carries on with the rest of the document.
//!
//! Two strategies usually run over the same document, structured data first
//! and plain markup second, and their outputs are concatenated. Duplicates
//! between them are left for the deduplicator.
//!
//! | Extractor | Key | Attributes |
//! |-----------|-----|------------|
//! | [`emoji::EmojiExtractor`] | last path segment of the entry link | `name`, `href`, `image` |
//! | [`headlines::HeadlineExtractor`] | `title|url` | `title`, `url`, `section`, `kind` |

pub mod emoji;
pub mod headlines;
pub mod jsonld;

use crate::models::{Candidate, Document};
use crate::utils::is_plain_file_name;
use url::Url;

/// Produces candidate records from a document.
pub trait Extractor {
    fn extract(&self, document: &Document) -> Vec<Candidate>;
}

/// Runs two extractors over the same document and concatenates their output.
impl<A, B> Extractor for (A, B)
where
    A: Extractor,
    B: Extractor,
{
    fn extract(&self, document: &Document) -> Vec<Candidate> {
        let mut out = self.0.extract(document);
        out.extend(self.1.extract(document));
        out
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a link against the document locator.
///
/// Fragment-only, `javascript:`, `mailto:` and `tel:` links yield `None`.
/// The fragment of the resolved URL is dropped.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Last non-empty path segment of a URL, percent-decoded, e.g. `grinning-face`
/// for `https://emojipedia.org/apple/ios-18/grinning-face/`.
///
/// Segments that decode to something other than a plain file name (`..`,
/// anything with a path separator) are rejected, since the slug later names
/// files on disk.
pub fn last_path_segment(url: &Url) -> Option<String> {
    let raw = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(raw).ok()?.into_owned();
    is_plain_file_name(&decoded).then_some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn doc(body: &str) -> Document {
        Document::new(Url::parse("https://example.com/news/").unwrap(), body)
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Hello \n\t world  "), "Hello world");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_resolve_link_relative() {
        let base = Url::parse("https://example.com/news/").unwrap();
        assert_eq!(
            resolve_link(&base, "/world/story-1#comments").unwrap().as_str(),
            "https://example.com/world/story-1"
        );
        assert_eq!(
            resolve_link(&base, "story-2").unwrap().as_str(),
            "https://example.com/news/story-2"
        );
    }

    #[test]
    fn test_resolve_link_rejects_non_navigational() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(resolve_link(&base, "#top").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
        assert!(resolve_link(&base, "mailto:desk@example.com").is_none());
        assert!(resolve_link(&base, "   ").is_none());
    }

    #[test]
    fn test_last_path_segment() {
        let url = Url::parse("https://emojipedia.org/apple/ios-18/grinning-face/").unwrap();
        assert_eq!(last_path_segment(&url).as_deref(), Some("grinning-face"));

        let root = Url::parse("https://emojipedia.org/").unwrap();
        assert_eq!(last_path_segment(&root), None);

        let encoded = Url::parse("https://emojipedia.org/apple/pi%C3%B1ata").unwrap();
        assert_eq!(last_path_segment(&encoded).as_deref(), Some("piñata"));
    }

    #[test]
    fn test_last_path_segment_rejects_traversal() {
        for href in [
            "https://emojipedia.org/apple/..%2F..%2Fpwned",
            "https://emojipedia.org/apple/%2E%2E",
            "https://emojipedia.org/apple/a%5Cb",
        ] {
            let url = Url::parse(href).unwrap();
            assert_eq!(last_path_segment(&url), None, "{href}");
        }
    }

    struct Fixed(Vec<&'static str>);

    impl Extractor for Fixed {
        fn extract(&self, _: &Document) -> Vec<Candidate> {
            self.0.iter().map(|k| Record::new(*k)).collect()
        }
    }

    #[test]
    fn test_pair_concatenates() {
        let keys: Vec<String> = (Fixed(vec!["a"]), Fixed(vec!["a", "b"]))
            .extract(&doc(""))
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "a", "b"]);
    }
}
