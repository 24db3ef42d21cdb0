//! Process settings: environment variables, the optional `.env` file, the
//! site configuration JSON, and project-root resolution.
//!
//! Settings are resolved once at startup and handed to the constructed
//! components; nothing here is re-read mid-run.

use crate::{site::Site, Error, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

/// Default site configuration compiled into the binary. A
/// `config/remilia-parser.json` in the project root overrides it.
pub const EMBEDDED_SITE_CONFIG: &str = include_str!("../../../config/remilia-parser.json");

pub const SITE_CONFIG_RELPATH: &str = "config/remilia-parser.json";

pub fn default_site() -> Site {
    Site::from_json(EMBEDDED_SITE_CONFIG).expect("embedded site config is valid")
}

/// Loads the site configuration, preferring an on-disk copy under the
/// project root.
pub fn load_site(project_root: &Path) -> Result<Site> {
    let on_disk = project_root.join(SITE_CONFIG_RELPATH);
    if on_disk.exists() {
        let json = fs::read_to_string(&on_disk)?;
        return Site::from_json(&json);
    }
    Ok(default_site())
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub project_root: PathBuf,
    pub db_path: PathBuf,
    pub wiki_url: Option<String>,
    pub api_url: Option<String>,
    pub bot_user: Option<String>,
    pub bot_pass: Option<String>,
    /// Minimum delay between read requests, milliseconds.
    pub rate_limit_read_ms: u64,
    /// Minimum delay between write requests, milliseconds.
    pub rate_limit_write_ms: u64,
    pub http_timeout_ms: u64,
    pub http_retries: u32,
}

impl Settings {
    /// Resolves settings from the process environment, consulting a `.env`
    /// file at the project root for keys the environment does not set.
    pub fn load() -> Result<Settings> {
        let cwd = env::current_dir()?;
        let process_env: HashMap<String, String> = env::vars().collect();
        let settings = Self::resolve(&cwd, &process_env);
        tracing::debug!(
            project_root = %settings.project_root.display(),
            db_path = %settings.db_path.display(),
            api_url = settings.api_url.as_deref().unwrap_or("(unset)"),
            "resolved settings"
        );
        Ok(settings)
    }

    pub fn resolve(cwd: &Path, process_env: &HashMap<String, String>) -> Settings {
        let root_override = process_env
            .get("WIKITOOL_PROJECT_ROOT")
            .or_else(|| process_env.get("WIKITOOL_ROOT"))
            .map(|v| absolutize(Path::new(v.trim()), cwd));
        let project_root =
            root_override.unwrap_or_else(|| detect_project_root(cwd));

        let dotenv = parse_dotenv_file(&project_root.join(".env"));
        let lookup = |key: &str| -> Option<String> {
            process_env
                .get(key)
                .or_else(|| dotenv.get(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = lookup("WIKITOOL_DB")
            .map(|v| absolutize(Path::new(&v), &project_root))
            .unwrap_or_else(|| project_root.join("data").join("wikitool.db"));

        Settings {
            db_path,
            wiki_url: lookup("WIKI_URL"),
            api_url: lookup("WIKI_API_URL").or_else(|| {
                lookup("WIKI_URL").map(|u| format!("{}/api.php", u.trim_end_matches('/')))
            }),
            bot_user: lookup("WIKI_BOT_USER"),
            bot_pass: lookup("WIKI_BOT_PASS"),
            rate_limit_read_ms: lookup_u64(&lookup, "WIKI_RATE_LIMIT_READ", 100),
            rate_limit_write_ms: lookup_u64(&lookup, "WIKI_RATE_LIMIT_WRITE", 1000),
            http_timeout_ms: lookup_u64(&lookup, "WIKI_HTTP_TIMEOUT_MS", 30_000),
            http_retries: lookup_u64(&lookup, "WIKI_HTTP_RETRIES", 2) as u32,
            project_root,
        }
    }

    pub fn api_url(&self) -> Result<&str> {
        self.api_url.as_deref().ok_or_else(|| {
            Error::ConfigMissing("WIKI_API_URL (or WIKI_URL) is not set".to_string())
        })
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.bot_user.as_deref(), self.bot_pass.as_deref()) {
            (Some(user), Some(pass)) => Ok((user, pass)),
            _ => Err(Error::AuthRequired(
                "set WIKI_BOT_USER and WIKI_BOT_PASS to push".to_string(),
            )),
        }
    }
}

fn lookup_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Walks ancestors of `cwd` looking for a `wiki_content/` folder; falls back
/// to `cwd` itself.
fn detect_project_root(cwd: &Path) -> PathBuf {
    let mut cursor = Some(cwd);
    while let Some(dir) = cursor {
        if dir.join("wiki_content").exists() {
            return dir.to_path_buf();
        }
        cursor = dir.parent();
    }
    cwd.to_path_buf()
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Minimal `.env` reader: `KEY=VALUE` lines, `#` comments, optional single
/// or double quotes around the value. No interpolation.
fn parse_dotenv_file(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(text) => parse_dotenv(&text),
        Err(_) => HashMap::new(),
    }
}

fn parse_dotenv(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            out.insert(key.to_string(), value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn dotenv_parsing() {
        let parsed = parse_dotenv(
            "# comment\n\
             WIKI_BOT_USER=bot\n\
             WIKI_BOT_PASS=\"se=cret\"\n\
             export WIKI_URL='https://wiki.example.org'\n\
             BROKEN LINE\n",
        );
        assert_eq!(parsed.get("WIKI_BOT_USER").unwrap(), "bot");
        assert_eq!(parsed.get("WIKI_BOT_PASS").unwrap(), "se=cret");
        assert_eq!(parsed.get("WIKI_URL").unwrap(), "https://wiki.example.org");
        assert!(!parsed.contains_key("BROKEN LINE"));
    }

    #[test]
    fn env_wins_over_dotenv() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        std::fs::create_dir_all(root.join("wiki_content")).expect("layout");
        std::fs::write(root.join(".env"), "WIKI_URL=https://from-dotenv\n").expect("dotenv");

        let mut env = HashMap::new();
        env.insert(
            "WIKITOOL_PROJECT_ROOT".to_string(),
            root.to_string_lossy().to_string(),
        );
        let settings = Settings::resolve(root, &env);
        assert_eq!(settings.wiki_url.as_deref(), Some("https://from-dotenv"));

        env.insert("WIKI_URL".to_string(), "https://from-env".to_string());
        let settings = Settings::resolve(root, &env);
        assert_eq!(settings.wiki_url.as_deref(), Some("https://from-env"));
        // api_url is derived from WIKI_URL when WIKI_API_URL is absent.
        assert_eq!(settings.api_url.as_deref(), Some("https://from-env/api.php"));
    }

    #[test]
    fn project_root_heuristic_walks_ancestors() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("project");
        let nested = root.join("wiki_content").join("Main");
        std::fs::create_dir_all(&nested).expect("layout");

        let settings = Settings::resolve(&nested, &HashMap::new());
        assert_eq!(settings.project_root, root);
        assert_eq!(settings.db_path, root.join("data").join("wikitool.db"));
    }

    #[test]
    fn defaults_and_overrides() {
        let temp = tempdir().expect("tempdir");
        let mut env = HashMap::new();
        env.insert(
            "WIKITOOL_PROJECT_ROOT".to_string(),
            temp.path().to_string_lossy().to_string(),
        );
        let settings = Settings::resolve(temp.path(), &env);
        assert_eq!(settings.rate_limit_read_ms, 100);
        assert_eq!(settings.http_timeout_ms, 30_000);
        assert_eq!(settings.http_retries, 2);
        assert!(settings.api_url().is_err());
        assert!(settings.credentials().is_err());

        env.insert("WIKI_RATE_LIMIT_READ".to_string(), "250".to_string());
        let settings = Settings::resolve(temp.path(), &env);
        assert_eq!(settings.rate_limit_read_ms, 250);
    }
}
