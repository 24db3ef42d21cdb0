//! Template invocation scanner: `{{Name|pos|named=value}}`, parser
//! functions (`{{#cargo_store:...}}`), and magic words
//! (`{{SHORTDESC:...}}`). Calls are emitted innermost-first.

use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateParam {
    /// Ordinal of the parameter within its call, 0-based.
    pub index: i64,
    pub name: Option<String>,
    pub value: String,
    pub is_named: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateCall {
    pub name: String,
    pub params: Vec<TemplateParam>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MagicWord {
    Shortdesc,
    DisplayTitle,
}

#[derive(Clone, Debug)]
pub(crate) struct ParserFunction {
    /// Lower-cased function name including the `#`, e.g. `#cargo_declare`.
    pub name: String,
    /// Raw argument parts, pipe-split at depth zero. The text after the
    /// function's colon is the first part.
    pub parts: Vec<String>,
    pub span: Range<usize>,
}

#[derive(Clone, Debug)]
pub(crate) enum CallBody {
    Template(TemplateCall),
    Magic(MagicWord, String),
    ParserFunction(ParserFunction),
}

#[derive(Clone, Debug)]
pub(crate) struct ScannedCall {
    pub body: CallBody,
}

#[derive(Clone, Debug)]
pub(crate) struct Scan {
    pub calls: Vec<ScannedCall>,
    /// Byte ranges of the outermost template invocations.
    pub top_spans: Vec<Range<usize>>,
}

/// Scans cleaned wikitext for template invocations. Triple-brace parameter
/// placeholders (`{{{1}}}`) are blanked first so they cannot desync the
/// brace counter.
pub(crate) fn scan(clean: &str) -> Scan {
    let masked = blank_triple_braces(clean);
    let bytes = masked.as_bytes();

    let mut stack: Vec<usize> = Vec::new();
    let mut calls = Vec::new();
    let mut top_spans = Vec::new();

    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            stack.push(i);
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            match stack.pop() {
                Some(start) => {
                    let end = i + 2;
                    if stack.is_empty() {
                        top_spans.push(start..end);
                    }
                    if let Some(body) = parse_call(&masked[start + 2..i], start..end) {
                        calls.push(ScannedCall { body });
                    }
                    i += 2;
                }
                None => i += 1,
            }
        } else {
            i += 1;
        }
    }

    Scan { calls, top_spans }
}

fn parse_call(body: &str, span: Range<usize>) -> Option<CallBody> {
    let parts = split_parts(body);
    let first = parts.first()?.trim();
    if first.is_empty() {
        return None;
    }

    if first.starts_with('#') {
        let (name, first_arg) = match first.split_once(':') {
            Some((name, arg)) => (name.trim().to_ascii_lowercase(), Some(arg.trim().to_string())),
            None => (first.to_ascii_lowercase(), None),
        };
        let mut func_parts = Vec::new();
        func_parts.extend(first_arg);
        func_parts.extend(parts.iter().skip(1).map(|p| p.trim().to_string()));
        return Some(CallBody::ParserFunction(ParserFunction {
            name,
            parts: func_parts,
            span,
        }));
    }

    if let Some((word, value)) = first.split_once(':') {
        let keyword = word.trim().to_ascii_uppercase();
        let magic = match keyword.as_str() {
            "SHORTDESC" => Some(MagicWord::Shortdesc),
            "DISPLAYTITLE" => Some(MagicWord::DisplayTitle),
            _ => None,
        };
        if let Some(magic) = magic {
            return Some(CallBody::Magic(magic, value.trim().to_string()));
        }
    }

    let mut params = Vec::new();
    for (ordinal, part) in parts.iter().skip(1).enumerate() {
        match split_named(part) {
            Some((name, value)) => params.push(TemplateParam {
                index: ordinal as i64,
                name: Some(name),
                value,
                is_named: true,
            }),
            None => params.push(TemplateParam {
                index: ordinal as i64,
                name: None,
                value: part.trim().to_string(),
                is_named: false,
            }),
        }
    }

    Some(CallBody::Template(TemplateCall {
        name: normalize_template_name(first),
        params,
    }))
}

/// Splits a call body on `|` at bracket depth zero, so nested invocations
/// and links stay inside their parameter values.
fn split_parts(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth: i64 = 0;
    let mut current = String::new();
    for ch in body.chars() {
        match ch {
            '{' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '}' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            '|' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// `name=value` at depth zero with a non-empty name; anything else is a
/// positional parameter.
pub(crate) fn split_named(part: &str) -> Option<(String, String)> {
    let mut depth: i64 = 0;
    for (pos, ch) in part.char_indices() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            '=' if depth == 0 => {
                let name = part[..pos].trim();
                if name.is_empty() {
                    return None;
                }
                return Some((name.to_string(), part[pos + 1..].trim().to_string()));
            }
            _ => {}
        }
    }
    None
}

/// Canonical template name: underscores to spaces, whitespace collapsed,
/// first letter upper-cased, optional `Template:` prefix stripped.
pub fn normalize_template_name(raw: &str) -> String {
    let mut name = raw.trim();
    if name
        .get(..9)
        .map(|head| head.eq_ignore_ascii_case("template:"))
        .unwrap_or(false)
    {
        name = name[9..].trim_start();
    }
    let replaced = name.replace('_', " ");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => collapsed,
    }
}

/// Blanks `{{{...}}}` parameter placeholders innermost-first, preserving
/// newlines and byte length.
fn blank_triple_braces(text: &str) -> String {
    let mut bytes = text.as_bytes().to_vec();
    loop {
        let close = match find_seq(&bytes, b"}}}", 0) {
            Some(pos) => pos,
            None => break,
        };
        let open = match rfind_seq(&bytes[..close], b"{{{") {
            Some(pos) => pos,
            None => break,
        };
        for byte in &mut bytes[open..close + 3] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
    }
    String::from_utf8(bytes).expect("blanking preserves utf-8")
}

fn find_seq(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn rfind_seq(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_calls(text: &str) -> Vec<TemplateCall> {
        scan(text)
            .calls
            .into_iter()
            .filter_map(|c| match c.body {
                CallBody::Template(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn simple_call_with_params() {
        let calls = template_calls("{{Infobox person|name=Alice|age=30|unnamed}}");
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.name, "Infobox person");
        assert_eq!(call.params.len(), 3);
        assert_eq!(call.params[0].name.as_deref(), Some("name"));
        assert_eq!(call.params[0].value, "Alice");
        assert!(call.params[0].is_named);
        assert_eq!(call.params[2].name, None);
        assert_eq!(call.params[2].value, "unnamed");
        assert!(!call.params[2].is_named);
    }

    #[test]
    fn nested_calls_innermost_first() {
        let calls = template_calls("{{Outer|arg={{Inner|1}}}}");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "Inner");
        assert_eq!(calls[1].name, "Outer");
        // The outer call keeps the nested source in its parameter value.
        assert_eq!(calls[1].params[0].value, "{{Inner|1}}");
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_template_name("infobox_person"), "Infobox person");
        assert_eq!(normalize_template_name("  cite   web "), "Cite web");
        assert_eq!(normalize_template_name("Template:Stub"), "Stub");
        assert_eq!(normalize_template_name("template: stub"), "Stub");
    }

    #[test]
    fn pipes_inside_links_stay_in_values() {
        let calls = template_calls("{{T|caption=[[Page|display]]}}");
        assert_eq!(calls[0].params[0].value, "[[Page|display]]");
    }

    #[test]
    fn magic_words_and_parser_functions() {
        let scan = scan("{{SHORTDESC:Short text}} {{#cargo_store:_table=T|x=1}} {{DISPLAYTITLE:''t''}}");
        let mut shortdesc = None;
        let mut display = None;
        let mut funcs = Vec::new();
        for call in scan.calls {
            match call.body {
                CallBody::Magic(MagicWord::Shortdesc, v) => shortdesc = Some(v),
                CallBody::Magic(MagicWord::DisplayTitle, v) => display = Some(v),
                CallBody::ParserFunction(f) => funcs.push(f),
                CallBody::Template(_) => {}
            }
        }
        assert_eq!(shortdesc.as_deref(), Some("Short text"));
        assert_eq!(display.as_deref(), Some("''t''"));
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "#cargo_store");
        assert_eq!(funcs[0].parts, vec!["_table=T", "x=1"]);
    }

    #[test]
    fn triple_brace_placeholders_are_ignored() {
        let calls = template_calls("{{T|a={{{1}}}|b=2}}");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "T");
        assert_eq!(calls[0].params[1].name.as_deref(), Some("b"));
        // The placeholder itself is blanked out of the value.
        assert_eq!(calls[0].params[0].value, "");
    }

    #[test]
    fn unbalanced_braces_do_not_panic() {
        assert!(template_calls("{{Open|never closed").is_empty());
        assert!(template_calls("}} orphan {{").is_empty());
        let calls = template_calls("{{Ok}} }}");
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn whole_call_span_is_reported() {
        let text = "xx {{A}} yy {{B|{{C}}}} zz";
        let scan = scan(text);
        let spans: Vec<&str> = scan.top_spans.iter().map(|s| &text[s.clone()]).collect();
        assert_eq!(spans, vec!["{{A}}", "{{B|{{C}}}}"]);
    }
}
