//! Relevance ranking and pagination
//!
//! Ranking is intentionally simple and deterministic: the score of a document
//! is the number of occurrences of the query tokens in its title and body,
//! ties are broken by URL in ascending order.

const EXCERPT_CHARS: usize = 160;
const EXCERPT_LEAD: usize = 40;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Short passage of the body around the first match
    pub excerpt: String,
    pub score: u32,
}

/// One page of search results with pagination metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub query: String,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub total_matches: usize,
    pub total_pages: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchPage {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Splits a query into lowercase alphanumeric tokens, dropping duplicates
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Counts occurrences of `tokens` in `title` and `body`, case-insensitively
pub fn score(tokens: &[String], title: &str, body: &str) -> u32 {
    let title = title.to_lowercase();
    let body = body.to_lowercase();

    tokens
        .iter()
        .map(|token| (title.matches(token.as_str()).count() + body.matches(token.as_str()).count()) as u32)
        .sum()
}

/// Returns a short passage of `body` starting shortly before the first token match
pub fn excerpt(body: &str, tokens: &[String]) -> String {
    let first_match = tokens
        .iter()
        .filter_map(|t| find_char_offset(body, t))
        .min()
        .unwrap_or(0);

    let start = first_match.saturating_sub(EXCERPT_LEAD);
    let total = body.chars().count();
    let mut passage: String = body.chars().skip(start).take(EXCERPT_CHARS).collect();

    if start > 0 {
        passage.insert_str(0, "...");
    }
    if start + EXCERPT_CHARS < total {
        passage.push_str("...");
    }
    passage
}

/// Character offset in `haystack` where lowercase `needle` first matches case-insensitively
///
/// Offsets count characters of the original text, so characters that
/// lowercase to several characters do not shift the result.
fn find_char_offset(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }

    haystack
        .char_indices()
        .enumerate()
        .find_map(|(offset, (byte_idx, _))| {
            let mut rest = haystack[byte_idx..].chars().flat_map(char::to_lowercase);
            needle.chars().all(|c| rest.next() == Some(c)).then_some(offset)
        })
}

/// Sorts hits by descending score then ascending URL and cuts out one page
///
/// `page` 0 is treated as page 1; pages past the end are empty but still
/// report the correct totals.
pub fn paginate(query: &str, mut hits: Vec<SearchHit>, page: usize, page_size: usize) -> SearchPage {
    let page = page.max(1);
    let page_size = page_size.max(1);

    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.url.cmp(&b.url)));

    let total_matches = hits.len();
    let total_pages = (total_matches + page_size - 1) / page_size;

    let hits = hits
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    SearchPage {
        query: query.to_string(),
        page,
        page_size,
        total_matches,
        total_pages,
        hits,
    }
}
