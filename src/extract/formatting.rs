//! Local formatting comparison between a source text and its translation.
//!
//! Webtoon scripts mark speech types with bracketed tags (`[SFX]`,
//! `[Narration]`, `[Thought]`) and split pages with headers such as
//! `[Page 3]`. A translation that drops either is flagged here without
//! asking the model.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::report::FormattingReport;

/// Page delimiter at the start of a line: `[Page N]`, `Page N:`,
/// `--- Page N ---` or `<page N>`.
static PAGE_DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:\[[ \t]*page[ \t]*\d+[ \t]*\]|page[ \t]*\d+[ \t]*:|-{2,}[ \t]*page[ \t]*\d+[ \t]*-{2,}|<[ \t]*page[ \t]*\d+[ \t]*>)",
    )
    .expect("page delimiter pattern should compile")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[ \t]*([^\[\]\n\d][^\[\]\n]{0,38})[ \t]*\]").expect("tag pattern should compile")
});

/// True if the text opens with a page delimiter.
pub(crate) fn starts_with_page_delimiter(text: &str) -> bool {
    PAGE_DELIMITER
        .find(text.trim_start())
        .is_some_and(|m| m.start() == 0)
}

/// Number of page delimiters in `text`.
pub fn count_page_headers(text: &str) -> usize {
    PAGE_DELIMITER.find_iter(text).count()
}

/// Occurrences of each bracketed tag, excluding page headers.
pub fn count_tags(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for caps in TAG.captures_iter(text) {
        let Some(name) = caps.get(1) else { continue };
        let name = name.as_str().trim();
        if name.to_lowercase().starts_with("page") {
            continue;
        }
        *counts.entry(format!("[{}]", name)).or_insert(0) += 1;
    }
    counts
}

/// Compare tag markers and page headers between `source` and `translated`.
///
/// A tag is missing when it appears fewer times in the translation than in
/// the source. Page headers are present when the translation has at least
/// as many as the source.
pub fn check_formatting(source: &str, translated: &str) -> FormattingReport {
    let source_tags = count_tags(source);
    let translated_tags = count_tags(translated);

    let missing_tags: Vec<String> = source_tags
        .iter()
        .filter(|(tag, count)| translated_tags.get(*tag).copied().unwrap_or(0) < **count)
        .map(|(tag, _)| tag.clone())
        .collect();

    FormattingReport {
        tag_consistency: missing_tags.is_empty(),
        page_headers_present: count_page_headers(translated) >= count_page_headers(source),
        missing_tags,
    }
}
