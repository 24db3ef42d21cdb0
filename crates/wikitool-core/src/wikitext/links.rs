//! Wikilink scanning: page links, categories, and the prose word count.

use super::spans;
use crate::site::{Site, NS_FILE};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Internal,
    Interwiki,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Interwiki => "interwiki",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedLink {
    /// Link target before any `|` or `#`, whitespace-normalized.
    pub target: String,
    pub link_type: LinkType,
    /// Namespace id when the target carries a recognized prefix; `None` for
    /// Main and interwiki targets.
    pub namespace: Option<i64>,
}

struct Wikilink {
    start: usize,
    end: usize,
    target: String,
    display: Option<String>,
}

/// Finds `[[...]]` spans, tolerating one level of nesting inside captions.
fn scan_wikilinks(text: &str) -> Vec<Wikilink> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            let start = i;
            let mut depth = 1u32;
            let mut j = i + 2;
            let mut close = None;
            while j + 1 < bytes.len() {
                if bytes[j] == b'[' && bytes[j + 1] == b'[' {
                    depth += 1;
                    j += 2;
                } else if bytes[j] == b']' && bytes[j + 1] == b']' {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(j);
                        break;
                    }
                    j += 2;
                } else {
                    j += 1;
                }
            }
            let Some(close) = close else {
                break;
            };
            let inner = &text[start + 2..close];
            let (target, display) = split_inner(inner);
            out.push(Wikilink {
                start,
                end: close + 2,
                target,
                display,
            });
            i = close + 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Target before the first top-level pipe; display text after the last one.
fn split_inner(inner: &str) -> (String, Option<String>) {
    let mut depth: i64 = 0;
    let mut pipes = Vec::new();
    for (pos, ch) in inner.char_indices() {
        match ch {
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            '|' if depth == 0 => pipes.push(pos),
            _ => {}
        }
    }
    match (pipes.first(), pipes.last()) {
        (Some(&first), Some(&last)) => (
            inner[..first].to_string(),
            Some(inner[last + 1..].to_string()),
        ),
        _ => (inner.to_string(), None),
    }
}

fn normalize_target(raw: &str) -> String {
    let replaced = raw.replace('_', " ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_prefix_ci(target: &str, prefix: &str) -> bool {
    target
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Scans page links. `text` must already have template invocations blanked;
/// category membership links are excluded here (see [`scan_categories`]).
/// Deduplicated on `(target, link_type)`, first occurrence wins.
pub(crate) fn scan_links(text: &str, site: &Site) -> Vec<ParsedLink> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for link in scan_wikilinks(text) {
        let mut raw = link.target.trim();
        let escaped = raw.starts_with(':');
        if escaped {
            raw = raw[1..].trim_start();
        }
        // Drop the fragment.
        let raw = raw.split('#').next().unwrap_or("");
        let target = normalize_target(raw);
        if target.is_empty() {
            continue;
        }
        // Bare category links declare membership, not a link. With the
        // leading-colon escape they are ordinary links to the category page.
        if !escaped && has_prefix_ci(&target, "Category:") {
            continue;
        }

        let (link_type, namespace) = if has_prefix_ci(&target, "File:")
            || has_prefix_ci(&target, "Image:")
        {
            (LinkType::Internal, Some(NS_FILE))
        } else if site.is_interwiki(&target) {
            (LinkType::Interwiki, None)
        } else {
            let ns = site.namespace_of_title(&target);
            (
                LinkType::Internal,
                if ns.id == 0 { None } else { Some(ns.id) },
            )
        };

        if seen.insert((target.clone(), link_type)) {
            out.push(ParsedLink {
                target,
                link_type,
                namespace,
            });
        }
    }
    out
}

/// Collects `[[Category:X]]` membership anywhere in the text, including
/// inside template invocations. Sort keys after `|` are ignored.
pub(crate) fn scan_categories(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for link in scan_wikilinks(text) {
        let raw = link.target.trim();
        if !has_prefix_ci(raw, "Category:") {
            continue;
        }
        let name = normalize_target(&raw["Category:".len()..]);
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

/// Counts prose words. `text` must already have templates blanked; this
/// additionally hides refs and galleries, reduces links to their displayed
/// text (category/file/image links to nothing), strips residual markup, and
/// counts whitespace-separated tokens containing at least one alphanumeric
/// character.
pub(crate) fn word_count(text: &str) -> i64 {
    let text = spans::blank_tag_spans(text, "ref");
    let text = spans::blank_tag_spans(&text, "gallery");

    let mut visible = String::with_capacity(text.len());
    let mut cursor = 0;
    for link in scan_wikilinks(&text) {
        visible.push_str(&text[cursor..link.start]);
        cursor = link.end;

        let target = link.target.trim().trim_start_matches(':').trim_start();
        if has_prefix_ci(target, "Category:")
            || has_prefix_ci(target, "File:")
            || has_prefix_ci(target, "Image:")
        {
            continue;
        }
        match &link.display {
            Some(display) => visible.push_str(display),
            None => visible.push_str(target),
        }
    }
    visible.push_str(&text[cursor..]);

    // Residual inline HTML and emphasis markup.
    let visible = lazy_regex!(r"<[^>\n]*>").replace_all(&visible, " ");
    let visible = visible.replace("''", " ");

    visible
        .split_whitespace()
        .filter(|token| token.chars().any(|c| c.is_alphanumeric()))
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_site;

    #[test]
    fn plain_and_piped_links() {
        let site = default_site();
        let links = scan_links("[[Alpha]] and [[Beta|the second]]", &site);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "Alpha");
        assert_eq!(links[0].link_type, LinkType::Internal);
        assert_eq!(links[0].namespace, None);
        assert_eq!(links[1].target, "Beta");
    }

    #[test]
    fn fragment_and_underscores() {
        let site = default_site();
        let links = scan_links("[[Some_Page#Section|x]]", &site);
        assert_eq!(links[0].target, "Some Page");
    }

    #[test]
    fn namespace_and_interwiki_classification() {
        let site = default_site();
        let links = scan_links(
            "[[Template:Stub]] [[wikipedia:Rust]] [[File:A.png|thumb|cap]] [[Image:B.jpg]]",
            &site,
        );
        assert_eq!(links[0].namespace, Some(10));
        assert_eq!(links[0].link_type, LinkType::Internal);
        assert_eq!(links[1].link_type, LinkType::Interwiki);
        assert_eq!(links[1].namespace, None);
        assert_eq!(links[2].namespace, Some(6));
        assert_eq!(links[3].namespace, Some(6));
    }

    #[test]
    fn category_links_are_membership_not_links() {
        let site = default_site();
        let text = "[[Category:Hidden]] [[:Category:Visible]]";
        let links = scan_links(text, &site);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Category:Visible");
        assert_eq!(links[0].namespace, Some(14));

        let cats = scan_categories(text);
        assert_eq!(cats, vec!["Hidden"]);
    }

    #[test]
    fn category_sort_keys_ignored() {
        assert_eq!(scan_categories("[[Category:People|Doe, John]]"), vec!["People"]);
        assert_eq!(scan_categories("[[category:lower_case]]"), vec!["lower case"]);
    }

    #[test]
    fn self_anchor_links_are_skipped() {
        let site = default_site();
        assert!(scan_links("[[#section]]", &site).is_empty());
    }

    #[test]
    fn word_count_rules() {
        // Visible prose: "Alpha is a test page with" + displayed "a link"
        // + "and" + plain target "Beta." = 10 tokens.
        let text = "Alpha is a test page with [[Target|a link]] and [[Beta]].\n\
                    [[File:X.png|thumb|ignored]] [[Category:Ignored]]\n\
                    <ref>ignored citation</ref>\n\
                    <gallery>a.png\nb.png</gallery>";
        assert_eq!(word_count(text), 10);
    }

    #[test]
    fn word_count_counts_nothing_in_empty_markup() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("''''"), 0);
        assert_eq!(word_count("<div class=\"x\"></div>"), 0);
    }
}
