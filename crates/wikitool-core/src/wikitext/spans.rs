//! Hidden-span blanking. Replaced bytes become spaces; newlines survive so
//! byte offsets and line numbers keep matching the original text.

use std::ops::Range;

/// Blanks HTML comments and `<nowiki>` spans.
pub(crate) fn blank_hidden(text: &str) -> String {
    let mut out = text.as_bytes().to_vec();
    blank_delimited(&mut out, b"<!--", b"-->");
    blank_tag(&mut out, "nowiki");
    String::from_utf8(out).expect("blanking preserves utf-8")
}

/// Blanks `<tag ...>...</tag>` spans (and self-closing `<tag/>`),
/// case-insensitively. Used for nowiki, ref and gallery content.
pub(crate) fn blank_tag_spans(text: &str, tag: &str) -> String {
    let mut out = text.as_bytes().to_vec();
    blank_tag(&mut out, tag);
    String::from_utf8(out).expect("blanking preserves utf-8")
}

/// Blanks the given byte ranges of `text`.
pub(crate) fn blank_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = text.as_bytes().to_vec();
    let len = out.len();
    for range in ranges {
        blank(&mut out, range.start, range.end.min(len));
    }
    String::from_utf8(out).expect("blanking preserves utf-8")
}

fn blank(bytes: &mut [u8], start: usize, end: usize) {
    for byte in &mut bytes[start..end] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}

fn blank_delimited(bytes: &mut Vec<u8>, open: &[u8], close: &[u8]) {
    let mut i = 0;
    while let Some(start) = find_seq(bytes, open, i) {
        match find_seq(bytes, close, start + open.len()) {
            Some(end) => {
                let stop = end + close.len();
                blank(bytes, start, stop);
                i = stop;
            }
            None => {
                // Unterminated: hide through end of text.
                let len = bytes.len();
                blank(bytes, start, len);
                break;
            }
        }
    }
}

fn blank_tag(bytes: &mut Vec<u8>, tag: &str) {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut i = 0;
    while let Some(start) = find_seq_ci(bytes, open.as_bytes(), i) {
        // Require a real tag boundary so `<ref` does not match `<references>`.
        if let Some(&next) = bytes.get(start + open.len()) {
            if next.is_ascii_alphanumeric() {
                i = start + open.len();
                continue;
            }
        }
        // Find the end of the opening tag itself.
        let Some(tag_end) = bytes[start..].iter().position(|&b| b == b'>') else {
            let len = bytes.len();
            blank(bytes, start, len);
            break;
        };
        let tag_end = start + tag_end;
        if tag_end >= 1 && bytes[tag_end - 1] == b'/' {
            // Self-closing.
            blank(bytes, start, tag_end + 1);
            i = tag_end + 1;
            continue;
        }
        match find_seq_ci(bytes, close.as_bytes(), tag_end) {
            Some(end) => {
                let stop = end + close.len();
                blank(bytes, start, stop);
                i = stop;
            }
            None => {
                let len = bytes.len();
                blank(bytes, start, len);
                break;
            }
        }
    }
}

fn find_seq(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn find_seq_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_blanked_preserving_newlines() {
        let text = "a<!-- hidden\nlines -->b";
        let clean = blank_hidden(text);
        assert_eq!(clean.len(), text.len());
        assert_eq!(clean.matches('\n').count(), 1);
        assert!(clean.contains('a') && clean.contains('b'));
        assert!(!clean.contains("hidden"));
    }

    #[test]
    fn nowiki_spans_are_blanked() {
        let clean = blank_hidden("x<nowiki>[[Not a link]]</nowiki>y");
        assert!(!clean.contains("Not a link"));
        assert!(clean.contains('x') && clean.contains('y'));

        let clean = blank_hidden("a<NOWIKI>b</NOWIKI>c");
        assert!(!clean.contains('b'));
    }

    #[test]
    fn self_closing_and_unterminated() {
        let clean = blank_hidden("a<nowiki/>b");
        assert_eq!(clean, "a         b");

        let clean = blank_hidden("a<!-- runs off the end");
        assert_eq!(&clean[..1], "a");
        assert!(!clean.contains("runs"));
    }

    #[test]
    fn ref_spans() {
        let clean = blank_tag_spans("text<ref name=\"a\">cite</ref> more<ref name=b />tail", "ref");
        assert!(!clean.contains("cite"));
        assert!(clean.contains("more"));
        assert!(clean.contains("tail"));
    }

    #[test]
    fn ranges() {
        let clean = blank_ranges("abcdef", &[1..3]);
        assert_eq!(clean, "a  def");
    }
}
