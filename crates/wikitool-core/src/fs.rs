//! Project-rooted filesystem view: reading, writing and scanning the
//! `wiki_content/` and `templates/` trees.

use crate::{
    hash::content_hash,
    site::{normalize_separators, Site, SOURCE_EXTENSIONS},
    wikitext,
    Result,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::UNIX_EPOCH,
};
use walkdir::WalkDir;

/// One syncable file, as read from disk.
#[derive(Clone, Debug)]
pub struct FileInfo {
    /// Relative to the project root, `/`-separated.
    pub filepath: String,
    pub filename: String,
    pub content: String,
    pub content_hash: String,
    pub mtime_ms: i64,
    pub title: String,
    pub namespace: i64,
    pub is_redirect: bool,
    pub redirect_target: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Filesystem {
    root: PathBuf,
    site: Arc<Site>,
}

impl Filesystem {
    pub fn new(root: impl Into<PathBuf>, site: Arc<Site>) -> Filesystem {
        Filesystem {
            root: root.into(),
            site,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn absolute(&self, relpath: &str) -> PathBuf {
        self.root.join(relpath)
    }

    pub fn exists(&self, relpath: &str) -> bool {
        self.absolute(relpath).exists()
    }

    pub fn read_file(&self, relpath: &str) -> Result<FileInfo> {
        let absolute = self.absolute(relpath);
        let content = fs::read_to_string(&absolute)?;
        let mtime_ms = mtime_millis(&absolute)?;
        Ok(self.file_info(relpath, content, mtime_ms))
    }

    /// Writes a file, creating intermediate directories. Returns the new
    /// modification time in milliseconds.
    pub fn write_file(&self, relpath: &str, content: &str) -> Result<i64> {
        let absolute = self.absolute(relpath);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&absolute, content)?;
        mtime_millis(&absolute)
    }

    /// Returns true when the file existed and was removed.
    pub fn delete_file(&self, relpath: &str) -> Result<bool> {
        let absolute = self.absolute(relpath);
        if !absolute.exists() {
            return Ok(false);
        }
        fs::remove_file(&absolute)?;
        Ok(true)
    }

    /// Enumerates `<contentDir>/<Folder>/**/*.wiki` for every content
    /// namespace folder, including `_redirects/` and the legacy `Redirect/`
    /// layout. Output is sorted by path.
    pub fn scan_content_files(&self) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        let content_root = self.root.join(self.site.content_dir());
        if !content_root.exists() {
            return Ok(out);
        }
        let mut seen_folders: Vec<&str> = Vec::new();
        for ns in self.site.content_namespaces() {
            if seen_folders.contains(&ns.folder.as_str()) {
                continue;
            }
            seen_folders.push(ns.folder.as_str());
            let base = content_root.join(&ns.folder);
            if !base.exists() {
                continue;
            }
            for entry in WalkDir::new(&base).follow_links(false) {
                let entry = entry.map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("wiki") {
                    continue;
                }
                out.push(self.read_absolute(path)?);
            }
        }
        out.sort_by(|a, b| a.filepath.cmp(&b.filepath));
        Ok(out)
    }

    /// Enumerates syncable files under the templates tree: anything whose
    /// name marks it as a template or module source, plus the `mediawiki/`
    /// bucket and redirect folders. Output is sorted by path.
    pub fn scan_template_files(&self) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        let templates_root = self.root.join(self.site.templates_dir());
        if !templates_root.exists() {
            return Ok(out);
        }
        for entry in WalkDir::new(&templates_root).follow_links(false) {
            let entry = entry
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = path.file_name().and_then(|f| f.to_str()).unwrap_or("");
            if !SOURCE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                continue;
            }
            let relative = self.relative_of(path)?;
            if !is_syncable_template_path(&relative, self.site.templates_dir()) {
                continue;
            }
            out.push(self.read_absolute(path)?);
        }
        out.sort_by(|a, b| a.filepath.cmp(&b.filepath));
        Ok(out)
    }

    pub fn scan_all(&self, include_templates: bool) -> Result<Vec<FileInfo>> {
        let mut files = self.scan_content_files()?;
        if include_templates {
            files.extend(self.scan_template_files()?);
        }
        files.sort_by(|a, b| a.filepath.cmp(&b.filepath));
        Ok(files)
    }

    /// Creates every content namespace folder and its `_redirects/`
    /// subfolder. Idempotent.
    pub fn ensure_content_folders(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let content_root = self.root.join(self.site.content_dir());
        let mut seen: Vec<&str> = Vec::new();
        for ns in self.site.content_namespaces() {
            if seen.contains(&ns.folder.as_str()) {
                continue;
            }
            seen.push(ns.folder.as_str());
            for dir in [
                content_root.join(&ns.folder),
                content_root.join(&ns.folder).join("_redirects"),
            ] {
                if !dir.exists() {
                    fs::create_dir_all(&dir)?;
                    created.push(dir);
                }
            }
        }
        Ok(created)
    }

    /// Creates every template bucket folder and its `_redirects/` subfolder.
    /// Idempotent.
    pub fn ensure_template_folders(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let templates_root = self.root.join(self.site.templates_dir());
        for bucket in self.site.bucket_names() {
            for dir in [
                templates_root.join(bucket),
                templates_root.join(bucket).join("_redirects"),
            ] {
                if !dir.exists() {
                    fs::create_dir_all(&dir)?;
                    created.push(dir);
                }
            }
        }
        Ok(created)
    }

    fn read_absolute(&self, path: &Path) -> Result<FileInfo> {
        let relative = self.relative_of(path)?;
        let content = fs::read_to_string(path)?;
        let mtime_ms = mtime_millis(path)?;
        Ok(self.file_info(&relative, content, mtime_ms))
    }

    fn relative_of(&self, path: &Path) -> Result<String> {
        let rel = path.strip_prefix(&self.root).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is outside the project root", path.display()),
            )
        })?;
        Ok(normalize_separators(&rel.to_string_lossy()))
    }

    fn file_info(&self, relpath: &str, content: String, mtime_ms: i64) -> FileInfo {
        let filepath = normalize_separators(relpath);
        let (is_redirect, redirect_target) = wikitext::parse_redirect(&content);
        let title = self.site.path_to_title(&filepath);
        let namespace = self.site.namespace_of_title(&title).id;
        let filename = Path::new(&filepath)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(&filepath)
            .to_string();
        FileInfo {
            content_hash: content_hash(&content),
            filepath,
            filename,
            content,
            mtime_ms,
            title,
            namespace,
            is_redirect,
            redirect_target,
        }
    }
}

fn mtime_millis(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let duration = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(duration.as_millis() as i64)
}

/// A template-tree file is syncable when a path segment names a template or
/// module source, or it lives under `mediawiki/` or a redirects folder.
fn is_syncable_template_path(relative: &str, templates_dir: &str) -> bool {
    let rest = relative
        .strip_prefix(&format!("{templates_dir}/"))
        .unwrap_or(relative);
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "_redirects" || *s == "redirects") {
        return true;
    }
    if segments
        .iter()
        .any(|s| s.starts_with("Template_") || s.starts_with("Module_"))
    {
        return true;
    }
    segments.first().copied() == Some("mediawiki")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_site;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, Filesystem) {
        let temp = tempdir().expect("tempdir");
        let fs_view = Filesystem::new(temp.path(), Arc::new(default_site()));
        (temp, fs_view)
    }

    #[test]
    fn write_read_delete_roundtrip() {
        let (_temp, fsv) = fixture();
        let mtime = fsv
            .write_file("wiki_content/Main/Alpha.wiki", "'''Alpha''' content")
            .expect("write");
        assert!(mtime > 0);

        let info = fsv.read_file("wiki_content/Main/Alpha.wiki").expect("read");
        assert_eq!(info.title, "Alpha");
        assert_eq!(info.namespace, 0);
        assert_eq!(info.filename, "Alpha.wiki");
        assert!(!info.is_redirect);
        assert_eq!(info.content_hash.len(), 16);

        assert!(fsv.delete_file("wiki_content/Main/Alpha.wiki").expect("delete"));
        assert!(!fsv.delete_file("wiki_content/Main/Alpha.wiki").expect("second delete"));
    }

    #[test]
    fn scan_content_includes_redirect_folders() {
        let (_temp, fsv) = fixture();
        fsv.write_file("wiki_content/Main/Alpha.wiki", "text").expect("write");
        fsv.write_file(
            "wiki_content/Main/_redirects/Old.wiki",
            "#REDIRECT [[Alpha]]",
        )
        .expect("write");
        fsv.write_file("wiki_content/Main/Redirect/Legacy.wiki", "#REDIRECT [[Alpha]]")
            .expect("write");
        fsv.write_file("wiki_content/Main/notes.txt", "not wikitext")
            .expect("write");
        fsv.write_file("wiki_content/Category/Stuff.wiki", "[[Category:Root]]")
            .expect("write");

        let files = fsv.scan_content_files().expect("scan");
        let paths: Vec<&str> = files.iter().map(|f| f.filepath.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "wiki_content/Category/Stuff.wiki",
                "wiki_content/Main/Alpha.wiki",
                "wiki_content/Main/Redirect/Legacy.wiki",
                "wiki_content/Main/_redirects/Old.wiki",
            ]
        );

        let redirect = files.iter().find(|f| f.title == "Old").expect("redirect row");
        assert!(redirect.is_redirect);
        assert_eq!(redirect.redirect_target.as_deref(), Some("Alpha"));
        assert_eq!(
            files.iter().find(|f| f.title == "Legacy").map(|f| f.is_redirect),
            Some(true)
        );
    }

    #[test]
    fn scan_templates_filters_non_syncable() {
        let (_temp, fsv) = fixture();
        fsv.write_file(
            "templates/infobox/Template_Infobox_person.wiki",
            "{{#cargo_declare:_table=People|name=String}}",
        )
        .expect("write");
        fsv.write_file("templates/navbox/Module_Navbar.lua", "return {}")
            .expect("write");
        fsv.write_file("templates/mediawiki/Common.css", "body {}")
            .expect("write");
        fsv.write_file("templates/infobox/README.wiki", "not syncable")
            .expect("write");
        fsv.write_file("templates/infobox/_redirects/Template_Old.wiki", "#REDIRECT [[Template:Infobox person]]")
            .expect("write");

        let files = fsv.scan_template_files().expect("scan");
        let titles: Vec<&str> = files.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Template:Infobox person"));
        assert!(titles.contains(&"Module:Navbar"));
        assert!(titles.contains(&"MediaWiki:Common.css"));
        assert!(titles.contains(&"Template:Old"));
        assert!(!titles.iter().any(|t| t.contains("README")));

        let module = files.iter().find(|f| f.title == "Module:Navbar").expect("module");
        assert_eq!(module.namespace, 828);
    }

    #[test]
    fn ensure_folders_is_idempotent() {
        let (_temp, fsv) = fixture();
        let first = fsv.ensure_content_folders().expect("first");
        assert!(!first.is_empty());
        let second = fsv.ensure_content_folders().expect("second");
        assert!(second.is_empty());

        let first = fsv.ensure_template_folders().expect("first");
        assert!(first.iter().any(|p| p.ends_with("infobox")));
        assert!(first.iter().any(|p| p.ends_with("misc/_redirects")));
        let second = fsv.ensure_template_folders().expect("second");
        assert!(second.is_empty());
    }
}
