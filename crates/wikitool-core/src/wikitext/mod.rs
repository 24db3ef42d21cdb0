//! Wikitext tokenizer and extractors.
//!
//! Everything here is scanner-based (byte walks with depth counters); the
//! few regexes live in [`lua`] and the tag-span finder. For a fixed input
//! the outputs are deterministic: document order, first occurrence wins for
//! deduplicated collections.

mod cargo;
mod links;
mod sections;
mod spans;
mod template;

pub mod lua;

pub use cargo::{CargoColumn, CargoDeclare, CargoQuery, CargoStore};
pub use links::{LinkType, ParsedLink};
pub use lua::{ModuleDep, ModuleDepType};
pub use sections::Section;
pub use template::{normalize_template_name, TemplateCall, TemplateParam};

use crate::site::Site;

/// Everything a single parse of one page's wikitext produces.
#[derive(Clone, Debug, Default)]
pub struct ParsedPage {
    pub is_redirect: bool,
    pub redirect_target: Option<String>,
    pub links: Vec<ParsedLink>,
    pub categories: Vec<String>,
    pub templates: Vec<TemplateCall>,
    pub sections: Vec<Section>,
    pub cargo_declares: Vec<CargoDeclare>,
    pub cargo_stores: Vec<CargoStore>,
    pub cargo_queries: Vec<CargoQuery>,
    /// Raw JSON from a `<templatedata>` block, if present and valid.
    pub template_data: Option<String>,
    pub shortdesc: Option<String>,
    pub display_title: Option<String>,
    pub word_count: i64,
}

/// Parses one page of wikitext. Redirect pages short-circuit: only the
/// redirect target is reported.
pub fn parse(content: &str, site: &Site) -> ParsedPage {
    let (is_redirect, redirect_target) = parse_redirect(content);
    if is_redirect {
        return ParsedPage {
            is_redirect: true,
            redirect_target,
            ..ParsedPage::default()
        };
    }

    // Comments and nowiki spans are blanked once; all scans below share the
    // cleaned text. Newlines are preserved so offsets and line structure
    // still match the raw content.
    let clean = spans::blank_hidden(content);
    let scan = template::scan(&clean);

    let mut page = ParsedPage::default();
    for call in scan.calls {
        match call.body {
            template::CallBody::Template(tpl) => page.templates.push(tpl),
            template::CallBody::Magic(word, value) => match word {
                template::MagicWord::Shortdesc => page.shortdesc = Some(value),
                template::MagicWord::DisplayTitle => page.display_title = Some(value),
            },
            template::CallBody::ParserFunction(func) => {
                cargo::route(&func, &content[func.span.clone()], &mut page);
            }
        }
    }

    page.categories = links::scan_categories(&clean);

    // Links inside template invocations do not count as page links.
    let without_templates = spans::blank_ranges(&clean, &scan.top_spans);
    page.links = links::scan_links(&without_templates, site);

    page.sections = sections::scan(content, &clean);
    page.template_data = extract_template_data(content);
    page.word_count = links::word_count(&without_templates);

    page
}

/// `(is_redirect, target)`. A page is a redirect when its trimmed content
/// starts with `#REDIRECT` (any case); the target may still be missing on
/// malformed pages.
pub fn parse_redirect(content: &str) -> (bool, Option<String>) {
    let trimmed = content.trim_start();
    if !trimmed
        .get(..9)
        .map(|head| head.eq_ignore_ascii_case("#redirect"))
        .unwrap_or(false)
    {
        return (false, None);
    }
    let Some(start) = trimmed.find("[[") else {
        return (true, None);
    };
    let Some(end) = trimmed[start + 2..].find("]]") else {
        return (true, None);
    };
    let inner = &trimmed[start + 2..start + 2 + end];
    let target = inner
        .split('|')
        .next()
        .unwrap_or("")
        .split('#')
        .next()
        .unwrap_or("")
        .trim();
    if target.is_empty() {
        (true, None)
    } else {
        (true, Some(target.to_string()))
    }
}

/// Extracts the JSON payload of a `<templatedata>` block, if it parses.
fn extract_template_data(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    let open = lower.find("<templatedata")?;
    let body_start = content[open..].find('>')? + open + 1;
    let close = lower[body_start..].find("</templatedata>")? + body_start;
    let json = content[body_start..close].trim();
    serde_json::from_str::<serde_json::Value>(json).ok()?;
    Some(json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_site;

    #[test]
    fn redirect_detection() {
        assert_eq!(
            parse_redirect("#REDIRECT [[New Page]]"),
            (true, Some("New Page".to_string()))
        );
        assert_eq!(
            parse_redirect("  #redirect [[Target|display]]\n[[Category:X]]"),
            (true, Some("Target".to_string()))
        );
        assert_eq!(
            parse_redirect("#Redirect [[Target#Section]]"),
            (true, Some("Target".to_string()))
        );
        assert_eq!(parse_redirect("#REDIRECT"), (true, None));
        assert_eq!(parse_redirect("Not a #REDIRECT [[X]]"), (false, None));
    }

    #[test]
    fn redirect_page_skips_other_outputs() {
        let site = default_site();
        let page = parse("#REDIRECT [[New]]\n[[Category:Old]]", &site);
        assert!(page.is_redirect);
        assert_eq!(page.redirect_target.as_deref(), Some("New"));
        assert!(page.links.is_empty());
        assert!(page.categories.is_empty());
        assert!(page.templates.is_empty());
        assert_eq!(page.word_count, 0);
    }

    #[test]
    fn full_article_parse() {
        let site = default_site();
        let text = "\
{{SHORTDESC:A test page}}
{{Infobox person|name=Alice|age=30}}
'''Alpha''' is a [[test page]] with [[Target|a link]].

== History ==
It references [[wikipedia:Rust]] and [[File:Logo.png|thumb]].
<!-- [[Hidden]] -->
[[Category:Examples]]
";
        let page = parse(text, &site);
        assert_eq!(page.shortdesc.as_deref(), Some("A test page"));
        assert_eq!(page.templates.len(), 1);
        assert_eq!(page.templates[0].name, "Infobox person");
        assert_eq!(page.categories, vec!["Examples".to_string()]);

        let targets: Vec<&str> = page.links.iter().map(|l| l.target.as_str()).collect();
        assert!(targets.contains(&"test page"));
        assert!(targets.contains(&"Target"));
        assert!(targets.contains(&"wikipedia:Rust"));
        assert!(targets.contains(&"File:Logo.png"));
        assert!(!targets.contains(&"Hidden"));

        assert_eq!(page.sections.len(), 2);
        assert!(page.sections[0].is_lead);
        assert_eq!(page.sections[1].heading.as_deref(), Some("History"));
    }

    #[test]
    fn templatedata_extraction() {
        let text = "doc\n<templatedata>{\"params\":{\"name\":{}}}</templatedata>\n";
        assert_eq!(
            extract_template_data(text).as_deref(),
            Some("{\"params\":{\"name\":{}}}")
        );
        assert_eq!(extract_template_data("<templatedata>{broken</templatedata>"), None);
        assert_eq!(extract_template_data("no block here"), None);
    }

    #[test]
    fn deterministic_output() {
        let site = default_site();
        let text = "[[A]] [[B]] [[A]] {{T|x}} {{T|x}} [[Category:C]] [[Category:C]]";
        let one = parse(text, &site);
        let two = parse(text, &site);
        let targets: Vec<&str> = one.links.iter().map(|l| l.target.as_str()).collect();
        assert_eq!(targets, vec!["A", "B"]);
        assert_eq!(one.categories, vec!["C"]);
        // Template usage is a bag: duplicates kept.
        assert_eq!(one.templates.len(), 2);
        assert_eq!(one.templates.len(), two.templates.len());
        assert_eq!(targets.len(), two.links.len());
    }
}
