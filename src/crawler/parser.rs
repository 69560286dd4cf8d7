//! HTML parser for extracting links and page content
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from `<a>` and `<area>` tags)
//! - Page title, meta description and document language
//! - Indexable body text
//!
//! Two comment markers control indexing. Text between
//! `<!-- [CRAWL_IGNORE] -->` and `<!-- [/CRAWL_IGNORE] -->` is left out of
//! the body text; a page containing `<!-- [CRAWL_FULL_IGNORE] -->` is not
//! indexed at all. Links inside ignored regions are still followed.

use scraper::{ElementRef, Html, Node, Selector};
use std::borrow::Cow;
use std::sync::OnceLock;
use url::Url;

const IGNORE_START: &str = "[CRAWL_IGNORE]";
const IGNORE_END: &str = "[/CRAWL_IGNORE]";
const FULL_IGNORE: &str = "[CRAWL_FULL_IGNORE]";

/// Elements whose text never reaches the index
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new run of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// From `<title>`, falling back to the first `<h1>`
    pub title: Option<String>,

    /// From `<meta name="description">`
    pub description: Option<String>,

    /// From `<html lang>`
    pub language: Option<String>,

    /// Whitespace-collapsed body text
    pub text: String,

    /// Links found on the page, resolved but not normalized, in document order
    pub links: Vec<Url>,

    /// Page carries the full-ignore marker
    pub full_ignore: bool,

    /// Set when the body was not valid UTF-8; links are then not extracted
    pub parse_error: Option<String>,
}

struct PageSelectors {
    links: Selector,
    base: Selector,
    title: Selector,
    h1: Selector,
    description: Selector,
    html: Selector,
    body: Selector,
}

impl PageSelectors {
    fn new() -> Self {
        Self {
            links: Selector::parse("a[href], area[href]").expect("link selector"),
            base: Selector::parse("base[href]").expect("base selector"),
            title: Selector::parse("title").expect("title selector"),
            h1: Selector::parse("h1").expect("h1 selector"),
            description: Selector::parse(r#"meta[name="description"]"#).expect("description selector"),
            html: Selector::parse("html").expect("html selector"),
            body: Selector::parse("body").expect("body selector"),
        }
    }
}

fn selectors() -> &'static PageSelectors {
    static SELECTORS: OnceLock<PageSelectors> = OnceLock::new();
    SELECTORS.get_or_init(PageSelectors::new)
}

/// Decodes a response body, falling back to lossy UTF-8
///
/// The flag is true when the body was not valid UTF-8.
pub fn decode_body(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), false),
        Err(_) => (Cow::Owned(String::from_utf8_lossy(bytes).into_owned()), true),
    }
}

/// Parses a raw response body
///
/// A body that is not valid UTF-8 is decoded lossily and parsed for
/// content, but yields no links and records a parse error.
pub fn parse_body(body: &[u8], page_url: &Url) -> ParsedPage {
    let (text, lossy) = decode_body(body);
    let mut page = parse_html(&text, page_url);

    if lossy {
        page.links.clear();
        page.parse_error = Some("Response body is not valid UTF-8".to_string());
    }

    page
}

/// Parses HTML content and extracts links and page content
///
/// # Example
///
/// ```
/// use sitesearch::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html lang="en"><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &page_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let (text, full_ignore) = extract_text(&document);

    ParsedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        language: extract_language(&document),
        text,
        links: extract_links(&document, page_url).collect(),
        full_ignore,
        parse_error: None,
    }
}

/// Lazily yields the links of `document` in document order
///
/// Hrefs are resolved against `<base href>` when present, otherwise
/// against `page_url`. Non-HTTP(S) schemes and fragment-only hrefs are
/// skipped. Duplicates are kept.
pub fn extract_links<'a>(document: &'a Html, page_url: &Url) -> impl Iterator<Item = Url> + 'a {
    let base = document_base(document, page_url);

    document
        .select(&selectors().links)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(move |href| resolve_link(href, &base))
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    document
        .select(&selectors().base)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only or empty hrefs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
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

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let s = selectors();
    document
        .select(&s.title)
        .next()
        .and_then(element_text)
        .or_else(|| document.select(&s.h1).next().and_then(element_text))
}

fn extract_description(document: &Html) -> Option<String> {
    document
        .select(&selectors().description)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn extract_language(document: &Html) -> Option<String> {
    document
        .select(&selectors().html)
        .next()
        .and_then(|element| element.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects the body text and reports whether the full-ignore marker is present
///
/// Adjacent text nodes are joined as written, so inline markup inside a word
/// keeps the word whole. A space separates text from different block-level
/// elements and text on either side of a `<br>`.
fn extract_text(document: &Html) -> (String, bool) {
    let full_ignore = document
        .tree
        .root()
        .descendants()
        .any(|node| matches!(node.value(), Node::Comment(c) if c.trim() == FULL_IGNORE));

    let Some(body) = document.select(&selectors().body).next() else {
        return (String::new(), full_ignore);
    };

    let mut ignoring = false;
    let mut text = String::new();
    let mut last_block = None;
    let mut boundary = false;

    for node in body.descendants() {
        match node.value() {
            Node::Comment(comment) => match comment.trim() {
                IGNORE_START => ignoring = true,
                IGNORE_END => ignoring = false,
                _ => {}
            },
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => boundary = true,
            Node::Text(content) if !ignoring => {
                let skipped = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .map_or(false, |e| SKIPPED_ELEMENTS.contains(&e.name()))
                });
                if skipped {
                    continue;
                }

                let block = node
                    .ancestors()
                    .find(|ancestor| {
                        ancestor
                            .value()
                            .as_element()
                            .map_or(false, |e| BLOCK_ELEMENTS.contains(&e.name()))
                    })
                    .map(|ancestor| ancestor.id());

                if boundary || block != last_block {
                    text.push(' ');
                }
                text.push_str(content);
                last_block = block;
                boundary = false;
            }
            _ => {}
        }
    }

    (collapse_whitespace(&text), full_ignore)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
