//! Section splitting: the implicit lead plus `==`-style headings.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Section {
    pub index: i64,
    pub heading: Option<String>,
    pub level: Option<i64>,
    pub anchor: Option<String>,
    pub content: String,
    pub is_lead: bool,
}

/// Splits a page into sections. Detection runs on the cleaned text (so
/// headings inside comments do not count); the emitted content comes from
/// the raw text. The lead is always section 0.
pub(crate) fn scan(raw: &str, clean: &str) -> Vec<Section> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    // (line start, line end, heading text, level)
    let mut headings: Vec<(usize, usize, String, i64)> = Vec::new();
    let mut offset = 0;
    for line in clean.split_inclusive('\n') {
        if let Some((heading, level)) = heading_of(line) {
            headings.push((offset, offset + line.len(), heading, level));
        }
        offset += line.len();
    }

    let lead_end = headings.first().map(|h| h.0).unwrap_or(raw.len());
    let mut sections = vec![Section {
        index: 0,
        heading: None,
        level: None,
        anchor: None,
        content: raw[..lead_end].trim_end().to_string(),
        is_lead: true,
    }];

    for (pos, (_, body_start, heading, level)) in headings.iter().enumerate() {
        let body_end = headings.get(pos + 1).map(|h| h.0).unwrap_or(raw.len());
        sections.push(Section {
            index: (pos + 1) as i64,
            heading: Some(heading.clone()),
            level: Some(*level),
            anchor: Some(anchor_of(heading)),
            content: raw[*body_start..body_end].trim_end().to_string(),
            is_lead: false,
        });
    }

    sections
}

/// Recognizes `== Heading ==` lines: 2 to 6 equals on both sides, starting
/// at column zero. Single-equals lines are treated as prose.
fn heading_of(line: &str) -> Option<(String, i64)> {
    let t = line.trim_end();
    if !t.starts_with("==") || !t.ends_with('=') {
        return None;
    }
    let bytes = t.as_bytes();
    let leading = bytes.iter().take_while(|&&b| b == b'=').count();
    let trailing = bytes.iter().rev().take_while(|&&b| b == b'=').count();
    let level = leading.min(trailing).min(6);
    if level < 2 || t.len() < 2 * level + 1 {
        return None;
    }
    let inner = t[level..t.len() - level].trim();
    if inner.is_empty() {
        return None;
    }
    Some((inner.to_string(), level as i64))
}

/// Heading slug used as the section anchor.
fn anchor_of(heading: &str) -> String {
    heading.replace("''", "").trim().replace(' ', "_")
}
