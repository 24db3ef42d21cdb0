//! Site model: the namespace table and the bidirectional mapping between
//! wiki titles and repository file paths.
//!
//! The mapping is a bijection for every title the wiki can produce:
//! `path_to_title(title_to_path(t)) == t`. Redirect pages are routed into a
//! `_redirects/` subfolder next to their canonical location so that a
//! redirect "Foo" and an article "foo" can coexist on case-insensitive
//! filesystems.

use crate::{types::PageType, Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const NS_MAIN: i64 = 0;
pub const NS_TALK: i64 = 1;
pub const NS_USER: i64 = 2;
pub const NS_PROJECT: i64 = 4;
pub const NS_FILE: i64 = 6;
pub const NS_MEDIAWIKI: i64 = 8;
pub const NS_TEMPLATE: i64 = 10;
pub const NS_HELP: i64 = 12;
pub const NS_CATEGORY: i64 = 14;
pub const NS_MODULE: i64 = 828;

/// File extensions the scanners recognize as syncable sources.
pub const SOURCE_EXTENSIONS: &[&str] = &[".wiki", ".wikitext", ".lua", ".css", ".js"];

#[derive(Clone, Debug, Deserialize)]
pub struct NamespaceDef {
    pub id: i64,
    /// Canonical prefix without the trailing colon; empty for Main.
    pub name: String,
    /// Folder name under `wiki_content/` (content namespaces only).
    pub folder: String,
    /// Template namespaces live under `templates/<bucket>/` instead.
    #[serde(default)]
    pub template_ns: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct SiteConfigFile {
    namespaces: Vec<NamespaceDef>,
    #[serde(default)]
    interwiki: Vec<String>,
    /// Ordered `(title prefix, bucket)` pairs; first match wins.
    #[serde(default)]
    template_buckets: Vec<(String, String)>,
}

/// Immutable site configuration: built once at startup and handed to every
/// component that needs the codec.
#[derive(Clone, Debug)]
pub struct Site {
    namespaces: Vec<NamespaceDef>,
    interwiki: Vec<String>,
    buckets: Vec<(String, String)>,
    content_dir: String,
    templates_dir: String,
}

impl Site {
    pub fn from_json(json: &str) -> Result<Site> {
        let parsed: SiteConfigFile = serde_json::from_str(json)?;
        if !parsed.namespaces.iter().any(|ns| ns.id == NS_MAIN) {
            return Err(Error::ConfigMissing(
                "site config must define the Main namespace (id 0)".to_string(),
            ));
        }
        Ok(Site {
            namespaces: parsed.namespaces,
            interwiki: parsed.interwiki,
            buckets: parsed.template_buckets,
            content_dir: "wiki_content".to_string(),
            templates_dir: "templates".to_string(),
        })
    }

    pub fn with_dirs(mut self, content_dir: &str, templates_dir: &str) -> Site {
        self.content_dir = content_dir.trim_end_matches('/').to_string();
        self.templates_dir = templates_dir.trim_end_matches('/').to_string();
        self
    }

    pub fn content_dir(&self) -> &str {
        &self.content_dir
    }

    pub fn templates_dir(&self) -> &str {
        &self.templates_dir
    }

    pub fn namespaces(&self) -> &[NamespaceDef] {
        &self.namespaces
    }

    pub fn namespace_by_id(&self, id: i64) -> Option<&NamespaceDef> {
        self.namespaces.iter().find(|ns| ns.id == id)
    }

    fn main_namespace(&self) -> &NamespaceDef {
        self.namespace_by_id(NS_MAIN).expect("Main namespace checked at load")
    }

    /// Content (non-template) namespaces, i.e. those stored under
    /// `wiki_content/<folder>/`.
    pub fn content_namespaces(&self) -> impl Iterator<Item = &NamespaceDef> {
        self.namespaces.iter().filter(|ns| !ns.template_ns)
    }

    /// Splits a title into its namespace and the bare title. Unknown
    /// prefixes fall back to Main with the title intact.
    pub fn split_title<'t>(&self, title: &'t str) -> (&NamespaceDef, &'t str) {
        if let Some(colon) = title.find(':') {
            let prefix = &title[..colon];
            for ns in &self.namespaces {
                if !ns.name.is_empty() && ns.name.eq_ignore_ascii_case(prefix) {
                    return (ns, &title[colon + 1..]);
                }
            }
        }
        (self.main_namespace(), title)
    }

    pub fn namespace_of_title(&self, title: &str) -> &NamespaceDef {
        self.split_title(title).0
    }

    /// Whether a link target starts with a registered interwiki prefix.
    pub fn is_interwiki(&self, target: &str) -> bool {
        match target.find(':') {
            Some(colon) => {
                let prefix = &target[..colon];
                self.interwiki.iter().any(|iw| iw.eq_ignore_ascii_case(prefix))
            }
            None => false,
        }
    }

    /// Functional bucket for a template/module/mediawiki title. First
    /// matching prefix of the ordered mapping wins; `misc` otherwise.
    pub fn template_bucket(&self, title: &str) -> &str {
        if title.starts_with("MediaWiki:") {
            return "mediawiki";
        }
        for (prefix, bucket) in &self.buckets {
            if title.starts_with(prefix.as_str()) {
                return bucket;
            }
        }
        "misc"
    }

    /// Distinct bucket folder names, in mapping order, always including
    /// `mediawiki` and the `misc` fallback.
    pub fn bucket_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (_, bucket) in &self.buckets {
            if !out.contains(&bucket.as_str()) {
                out.push(bucket);
            }
        }
        for extra in ["mediawiki", "misc"] {
            if !out.contains(&extra) {
                out.push(extra);
            }
        }
        out
    }

    /// File extension for a title in a namespace, dot included.
    pub fn file_extension(&self, ns_id: i64, bare_title: &str) -> &'static str {
        match ns_id {
            NS_MODULE => {
                if bare_title.ends_with("/styles.css") {
                    ".css"
                } else {
                    ".lua"
                }
            }
            NS_MEDIAWIKI => {
                if bare_title.ends_with(".css") {
                    ".css"
                } else if bare_title.ends_with(".js") {
                    ".js"
                } else {
                    ".wiki"
                }
            }
            _ => ".wiki",
        }
    }

    /// MediaWiki content model string for a title.
    pub fn content_model(&self, ns_id: i64, bare_title: &str) -> &'static str {
        match ns_id {
            NS_MODULE => {
                if bare_title.ends_with("/styles.css") {
                    "sanitized-css"
                } else {
                    "Scribunto"
                }
            }
            NS_MEDIAWIKI => {
                if bare_title.ends_with(".css") {
                    "css"
                } else if bare_title.ends_with(".js") {
                    "javascript"
                } else {
                    "wikitext"
                }
            }
            _ => "wikitext",
        }
    }

    pub fn page_type(&self, ns_id: i64, is_redirect: bool) -> PageType {
        if is_redirect {
            return PageType::Redirect;
        }
        match ns_id {
            NS_TEMPLATE => PageType::Template,
            NS_MODULE => PageType::Module,
            NS_MEDIAWIKI => PageType::Mediawiki,
            NS_CATEGORY => PageType::Category,
            NS_FILE => PageType::File,
            _ => PageType::Article,
        }
    }

    /// Encoded filename for a title, without directory or extension.
    pub fn title_to_filename(&self, title: &str) -> String {
        let (_, bare) = self.split_title(title);
        encode_segment(bare)
    }

    /// Repository-relative path for a title.
    pub fn title_to_path(&self, title: &str, is_redirect: bool) -> String {
        let (ns, bare) = self.split_title(title);

        if ns.template_ns {
            let bucket = self.template_bucket(title);
            let encoded = match ns.id {
                NS_TEMPLATE => format!("Template_{}", bare.replace(' ', "_")),
                NS_MODULE => {
                    if let Some(base) = bare.strip_suffix("/styles.css") {
                        format!("Module_{}_styles", base.replace(' ', "_"))
                    } else {
                        format!("Module_{}", bare.replace(' ', "_"))
                    }
                }
                // MediaWiki pages keep their own name; .css/.js keep their
                // extension verbatim.
                _ => {
                    if !is_redirect && (bare.ends_with(".css") || bare.ends_with(".js")) {
                        return format!("{}/{bucket}/{bare}", self.templates_dir);
                    }
                    bare.replace(' ', "_")
                }
            };
            let ext = if is_redirect { ".wiki" } else { self.file_extension(ns.id, bare) };
            return if is_redirect {
                format!("{}/{bucket}/_redirects/{encoded}{ext}", self.templates_dir)
            } else {
                format!("{}/{bucket}/{encoded}{ext}", self.templates_dir)
            };
        }

        let filename = encode_segment(bare);
        let ext = self.file_extension(ns.id, bare);
        if is_redirect {
            format!("{}/{}/_redirects/{filename}{ext}", self.content_dir, ns.folder)
        } else {
            format!("{}/{}/{filename}{ext}", self.content_dir, ns.folder)
        }
    }

    /// Recovers the title from a repository-relative path. Unrecognized
    /// locations decode the file name and land in Main, which keeps the
    /// round trip stable.
    pub fn path_to_title(&self, relpath: &str) -> String {
        let normalized = normalize_separators(relpath);

        if let Some(rest) = normalized.strip_prefix(&format!("{}/", self.content_dir)) {
            return self.content_path_to_title(rest);
        }
        if let Some(rest) = normalized.strip_prefix(&format!("{}/", self.templates_dir)) {
            return self.template_path_to_title(rest);
        }

        decode_segment(strip_source_extension(
            Path::new(&normalized)
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or(relpath),
        ))
    }

    fn content_path_to_title(&self, rel: &str) -> String {
        let mut segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return String::new();
        }

        let folder = segments.remove(0);
        segments.retain(|s| *s != "_redirects" && *s != "Redirect");
        let filename = segments.last().copied().unwrap_or("");
        let name = decode_segment(strip_source_extension(filename));

        let ns = self
            .content_namespaces()
            .find(|ns| ns.folder == folder)
            .unwrap_or_else(|| self.main_namespace());
        if ns.name.is_empty() {
            name
        } else {
            format!("{}:{name}", ns.name)
        }
    }

    fn template_path_to_title(&self, rel: &str) -> String {
        let segments: Vec<&str> = rel
            .split('/')
            .filter(|s| !s.is_empty() && *s != "_redirects" && *s != "redirects")
            .collect();
        if segments.is_empty() {
            return String::new();
        }

        let bucket = segments[0];
        let rest = &segments[1..];

        if bucket == "mediawiki" {
            if rest.is_empty() {
                return "MediaWiki:".to_string();
            }
            let mut parts = Vec::new();
            for (index, segment) in rest.iter().enumerate() {
                let value = if index == rest.len() - 1 {
                    strip_wiki_extension(segment)
                } else {
                    segment
                };
                parts.push(decode_segment(value));
            }
            return format!("MediaWiki:{}", parts.join("/"));
        }

        // Template/Module subpages are stored as real directory segments
        // below the `Template_*`/`Module_*` base file.
        if let Some(base_index) = rest
            .iter()
            .position(|s| s.starts_with("Template_") || s.starts_with("Module_"))
        {
            let base = rest[base_index];
            let base_ext = Path::new(base)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            let clean_base = strip_source_extension(base);
            let (prefix, skip) = if clean_base.starts_with("Module_") {
                ("Module", 7)
            } else {
                ("Template", 9)
            };
            let mut base_name = clean_base[skip..].to_string();
            let mut subpages: Vec<&str> = rest[base_index + 1..].to_vec();
            if prefix == "Module"
                && subpages.is_empty()
                && base_name.ends_with("_styles")
                && base_ext == "css"
            {
                base_name.truncate(base_name.len().saturating_sub(7));
                subpages = vec!["styles.css"];
            }
            let base_title = base_name.replace('_', " ");
            if subpages.is_empty() {
                return format!("{prefix}:{base_title}");
            }
            let mut decoded = Vec::new();
            for (index, segment) in subpages.iter().enumerate() {
                let value = if index == subpages.len() - 1 {
                    strip_subpage_extension(segment)
                } else {
                    segment
                };
                decoded.push(decode_segment(value));
            }
            return format!("{prefix}:{base_title}/{}", decoded.join("/"));
        }

        let filename = rest.last().copied().unwrap_or(bucket);
        decode_segment(strip_source_extension(filename))
    }
}

/// `' '→'_'`, `'/'→"___"`, `':'→"--"`. Lossless together with
/// [`decode_segment`] because none of the replacement sequences occur in
/// canonical MediaWiki titles.
pub fn encode_segment(value: &str) -> String {
    value.replace(' ', "_").replace('/', "___").replace(':', "--")
}

pub fn decode_segment(value: &str) -> String {
    value.replace("___", "/").replace("--", ":").replace('_', " ")
}

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn strip_source_extension(value: &str) -> &str {
    strip_one_of(value, SOURCE_EXTENSIONS)
}

fn strip_wiki_extension(value: &str) -> &str {
    strip_one_of(value, &[".wiki", ".wikitext"])
}

fn strip_subpage_extension(value: &str) -> &str {
    strip_one_of(value, &[".wiki", ".wikitext", ".lua"])
}

fn strip_one_of<'v>(value: &'v str, extensions: &[&str]) -> &'v str {
    for ext in extensions {
        if let Some(stripped) = value.strip_suffix(ext) {
            return stripped;
        }
    }
    value
}
