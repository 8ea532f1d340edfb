//! Field-level parsing: embedded JSON, field scraping, bullet lists,
//! glossary lines, formatting flags and scores.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::report::{
    EntityType, FormattingReport, Gender, GlossarySuggestion, Role, DEFAULT_READABILITY_SCORE,
};
use super::sections::SectionTable;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*$").expect("code fence pattern should compile")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:[-*•+]|\d{1,2}[.)])[ \t]+(.*)$").expect("bullet pattern should compile")
});

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d{1,4}").expect("integer pattern should compile"));

static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]\n]{1,40}\]").expect("tag pattern should compile"));

/// `"chapterMemory": "..."` with JSON string escapes.
static QUOTED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)"?(?P<key>chapter[_ ]?memory|chapter[_ ]?summary)"?[ \t]*[:=][ \t]*"(?P<value>(?:[^"\\]|\\.)*)""#)
        .expect("quoted field pattern should compile")
});

/// `chapterMemory: ...` up to the end of the line.
static BARE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)"?(?P<key>chapter[_ ]?memory|chapter[_ ]?summary)"?[ \t]*[:=][ \t]*(?P<value>[^"\s][^\n]*)$"#)
        .expect("bare field pattern should compile")
});

static SCORE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"?readability[_ ]?score"?[ \t]*[:=][ \t]*"?(?P<value>-?\d{1,4})"#)
        .expect("score field pattern should compile")
});

const EMPTY_MARKERS: &[&str] = &["none", "n/a", "na", "nil", "null", "-", "no issues", "nothing"];

/// Strip code fences, cut the outermost `{...}` or `[...]` and turn raw
/// line breaks and tabs into spaces. Returns `None` when no payload is
/// present.
pub(crate) fn normalize_payload(section: &str) -> Option<String> {
    let unfenced = CODE_FENCE.replace_all(section, "");
    let text = unfenced.as_ref();

    let open = text.find(['{', '['])?;
    let close_char = if text[open..].starts_with('{') { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    if close <= open {
        return None;
    }

    Some(
        text[open..=close]
            .chars()
            .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
            .collect(),
    )
}

/// Strictly parse a section's embedded payload.
pub(crate) fn parse_payload(section: &str) -> Option<Result<Value, serde_json::Error>> {
    normalize_payload(section).map(|payload| serde_json::from_str(&payload))
}

/// Lenient typed reads over a JSON object, accepting camelCase or snake_case.
pub(crate) struct JsonFields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> JsonFields<'a> {
    pub fn new(value: &'a Value) -> Option<Self> {
        value.as_object().map(|map| Self { map })
    }

    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.map.get(*k)).filter(|v| !v.is_null())
    }

    pub fn string(&self, keys: &[&str]) -> Option<String> {
        match self.get(keys)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(value_to_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(joined).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }

    pub fn list(&self, keys: &[&str], table: &SectionTable) -> Option<Vec<String>> {
        let items = match self.get(keys)? {
            Value::Array(items) => clean_items(items.iter().filter_map(value_to_text), table),
            Value::String(s) => split_list(s, table),
            _ => return None,
        };
        Some(items).filter(|items| !items.is_empty())
    }

    pub fn score(&self, keys: &[&str]) -> Option<u8> {
        match self.get(keys)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(clamp_score),
            Value::String(s) => parse_score(s),
            _ => None,
        }
    }

    pub fn glossary(&self, keys: &[&str]) -> Option<Vec<GlossarySuggestion>> {
        let entries = glossary_from_value(self.get(keys)?);
        Some(entries).filter(|e| !e.is_empty())
    }

    pub fn formatting(&self, keys: &[&str]) -> Option<FormattingReport> {
        formatting_from_value(self.get(keys)?)
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        Value::Object(map) => {
            // {"issue": "..."} style entries
            let text = map
                .values()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(": ");
            Some(text)
        }
        other => Some(other.to_string()),
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_flag(s),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Glossary entries from a JSON array of objects or strings.
pub(crate) fn glossary_from_value(value: &Value) -> Vec<GlossarySuggestion> {
    let Value::Array(items) = value else {
        return match value {
            Value::String(s) => parse_glossary_lines(s),
            _ => Vec::new(),
        };
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(line) => parse_glossary_line(line),
            Value::Object(_) => {
                let fields = JsonFields::new(item)?;
                let source = fields.string(&["source", "original", "term", "sourceTerm", "source_term"])?;
                let target = fields.string(&[
                    "target",
                    "translation",
                    "translated",
                    "targetTerm",
                    "target_term",
                ])?;
                let mut entry = GlossarySuggestion::new(source, target);
                if let Some(t) = fields
                    .string(&["entityType", "entity_type", "type", "category"])
                    .and_then(|t| EntityType::from_str(&t))
                {
                    entry.entity_type = t;
                }
                entry.gender = fields.string(&["gender"]).and_then(|g| Gender::from_str(&g));
                entry.role = fields.string(&["role"]).and_then(|r| Role::from_str(&r));
                entry.note = fields.string(&["note", "notes", "reason", "context"]);
                Some(entry)
            }
            _ => None,
        })
        .collect()
}

/// Formatting flags from a JSON object.
pub(crate) fn formatting_from_value(value: &Value) -> Option<FormattingReport> {
    let fields = JsonFields::new(value)?;
    let mut report = FormattingReport::default();
    if let Some(b) = fields
        .get(&["tagConsistency", "tag_consistency", "tagsConsistent"])
        .and_then(value_bool)
    {
        report.tag_consistency = b;
    }
    if let Some(b) = fields
        .get(&["pageHeadersPresent", "page_headers_present", "pageHeaders"])
        .and_then(value_bool)
    {
        report.page_headers_present = b;
    }
    if let Some(tags) = fields.get(&["missingTags", "missing_tags"]) {
        report.missing_tags = match tags {
            Value::Array(items) => items
                .iter()
                .filter_map(value_to_text)
                .filter(|t| !is_empty_marker(t))
                .collect(),
            Value::String(s) => parse_tag_list(s),
            _ => Vec::new(),
        };
    }
    Some(report)
}

/// Scrape `chapterMemory` and `chapterSummary` out of a malformed payload.
pub(crate) fn scrape_notes(text: &str) -> (Option<String>, Option<String>) {
    let mut memory = None;
    let mut summary = None;

    let quoted = QUOTED_FIELD.captures_iter(text).map(|c| {
        let raw = c.name("value").map_or("", |m| m.as_str());
        (field_key(&c), unescape_json(raw))
    });
    let bare = BARE_FIELD.captures_iter(text).map(|c| {
        let raw = c.name("value").map_or("", |m| m.as_str());
        (field_key(&c), raw.trim().trim_end_matches([',', '}']).trim().to_string())
    });

    for (key, value) in quoted.chain(bare) {
        if value.is_empty() {
            continue;
        }
        let slot = if key.contains("memory") { &mut memory } else { &mut summary };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    (memory, summary)
}

/// Scrape `readabilityScore` out of a malformed payload.
pub(crate) fn scrape_score(text: &str) -> Option<u8> {
    SCORE_FIELD
        .captures(text)
        .and_then(|c| c.name("value"))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(clamp_score)
}

fn field_key(caps: &regex::Captures<'_>) -> String {
    caps.name("key").map_or(String::new(), |m| m.as_str().to_lowercase())
}

fn unescape_json(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string())
        .trim()
        .to_string()
}

/// First integer in `text`, clamped to 0..=100.
pub(crate) fn parse_score(text: &str) -> Option<u8> {
    FIRST_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(clamp_score)
}

pub(crate) fn score_or_default(score: Option<u8>) -> u8 {
    score.unwrap_or(DEFAULT_READABILITY_SCORE)
}

fn clamp_score(n: i64) -> u8 {
    n.clamp(0, 100) as u8
}

fn is_empty_marker(item: &str) -> bool {
    let cleaned = item
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '.' | '`') || c.is_whitespace())
        .to_lowercase();
    cleaned.is_empty() || EMPTY_MARKERS.contains(&cleaned.as_str())
}

/// Stray markdown heading bits: `##`, `**`, `---`, or a section label.
fn is_heading_fragment(item: &str, table: &SectionTable) -> bool {
    let trimmed = item.trim();
    if trimmed.starts_with('#') {
        return true;
    }
    if trimmed
        .chars()
        .all(|c| matches!(c, '*' | '_' | '-' | '=' | ':' | '`') || c.is_whitespace())
    {
        return true;
    }
    table.is_label(trimmed)
}

fn clean_items<I>(items: I, table: &SectionTable) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !is_empty_marker(s) && !is_heading_fragment(s, table))
        .collect()
}

/// Split a list section on bullet markers.
///
/// Lines without a marker continue the previous item. When the section has
/// no markers at all, every non-empty line is an item.
pub(crate) fn split_list(text: &str, table: &SectionTable) -> Vec<String> {
    let has_bullets = text.lines().any(|l| BULLET.is_match(l));
    let mut items: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !has_bullets {
            items.push(trimmed.to_string());
            continue;
        }
        match BULLET.captures(line).and_then(|c| c.get(1)) {
            Some(entry) => items.push(entry.as_str().trim().to_string()),
            None => match items.last_mut() {
                Some(last) if !is_heading_fragment(trimmed, table) => {
                    last.push(' ');
                    last.push_str(trimmed);
                }
                _ => items.push(trimmed.to_string()),
            },
        }
    }

    clean_items(items, table)
}

/// Parse glossary lines of the form `source → target (type, gender, role): note`.
pub(crate) fn parse_glossary_lines(text: &str) -> Vec<GlossarySuggestion> {
    text.lines()
        .map(|line| match BULLET.captures(line).and_then(|c| c.get(1)) {
            Some(entry) => entry.as_str(),
            None => line,
        })
        .filter_map(parse_glossary_line)
        .collect()
}

pub(crate) fn parse_glossary_line(line: &str) -> Option<GlossarySuggestion> {
    let line = line.trim();
    if line.is_empty() || is_empty_marker(line) || line.starts_with('#') {
        return None;
    }

    let (source, rest, colon_separated) = ["→", "->", "=>", "="]
        .iter()
        .find_map(|sep| line.split_once(sep).map(|(a, b)| (a, b, false)))
        .or_else(|| line.split_once(':').map(|(a, b)| (a, b, true)))?;

    // A bare colon only separates a glossary entry when tags follow or the
    // source side is a non-Latin term; otherwise the line is prose.
    if colon_separated && !rest.contains('(') && source.is_ascii() {
        return None;
    }

    let (target, tags, note) = match rest.find('(') {
        Some(open) => {
            let close = rest[open..].find(')').map(|i| open + i)?;
            let after = rest[close + 1..].trim_start_matches(|c: char| {
                matches!(c, ':' | '-' | '–' | '—') || c.is_whitespace()
            });
            (&rest[..open], Some(&rest[open + 1..close]), after)
        }
        None if !colon_separated => match rest.split_once(':') {
            Some((target, note)) => (target, None, note),
            None => (rest, None, ""),
        },
        None => (rest, None, ""),
    };

    let source = clean_term(source);
    let target = clean_term(target);
    if source.is_empty() || target.is_empty() {
        return None;
    }

    let mut entry = GlossarySuggestion::new(source, target);
    if let Some(tags) = tags {
        for tag in tags.split([',', '/', ';']) {
            if let Some(t) = EntityType::from_str(tag) {
                entry.entity_type = t;
            } else if let Some(g) = Gender::from_str(tag) {
                entry.gender = Some(g);
            } else if let Some(r) = Role::from_str(tag) {
                entry.role = Some(r);
            }
        }
    }
    let note = note.trim();
    if !note.is_empty() {
        entry.note = Some(note.to_string());
    }
    Some(entry)
}

fn clean_term(term: &str) -> String {
    term.trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '"' | '\'' | '`' | '“' | '”') || c.is_whitespace())
        .to_string()
}

/// Yes/no style flag.
fn parse_flag(value: &str) -> Option<bool> {
    let v = value
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '.' | '"'))
        .to_lowercase();
    let first = v.split_whitespace().next().unwrap_or("");
    match first.trim_end_matches([',', ';']) {
        "yes" | "true" | "y" | "ok" | "consistent" | "present" | "pass" | "passed" => Some(true),
        "no" | "false" | "n" | "inconsistent" | "missing" | "absent" | "fail" | "failed" => {
            Some(false)
        }
        _ => None,
    }
}

fn parse_tag_list(value: &str) -> Vec<String> {
    let bracketed: Vec<String> = BRACKET_TAG
        .find_iter(value)
        .map(|m| m.as_str().to_string())
        .collect();
    if !bracketed.is_empty() {
        return bracketed;
    }
    value
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !is_empty_marker(t))
        .collect()
}

/// Formatting flags from `Key: value` lines.
pub(crate) fn parse_formatting_lines(text: &str) -> Option<FormattingReport> {
    let mut report = FormattingReport::default();
    let mut found = false;

    for line in text.lines() {
        let line = match BULLET.captures(line).and_then(|c| c.get(1)) {
            Some(entry) => entry.as_str(),
            None => line,
        };
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key
            .trim_matches(|c: char| matches!(c, '*' | '_') || c.is_whitespace())
            .to_lowercase();
        if key.contains("tag") && key.contains("consist") {
            if let Some(b) = parse_flag(value) {
                report.tag_consistency = b;
                found = true;
            }
        } else if key.contains("page") && key.contains("header") {
            if let Some(b) = parse_flag(value) {
                report.page_headers_present = b;
                found = true;
            }
        } else if key.contains("missing") {
            report.missing_tags = parse_tag_list(value);
            found = true;
        }
    }

    found.then_some(report)
}
