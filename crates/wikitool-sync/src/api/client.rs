//! HTTP implementation of [`MediaWiki`] over the action API.
//!
//! Every response is consumed as `formatversion=2` JSON. Edits carry a CSRF
//! token and `baserevid`; a stale token is refreshed once and retried. The
//! shared [`RateLimiter`] is acquired before the first attempt of every
//! request; retry attempts bypass it so a failure is not throttled twice.

use super::{
    rate_limit::RateLimiter,
    types::{
        DeleteOutcome, EditOutcome, EditRequest, ListQuery, QueryPageItems, RemotePageInfo,
        RemoteRevision,
    },
    MediaWiki,
};
use crate::{Error, Result};
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};
use wikitool_core::settings::Settings;

/// Server-side cap on `titles=` per query request.
const BATCH_LIMIT: usize = 50;
/// `maxlag` advisory sent with every request.
const MAX_LAG_SECS: u64 = 5;

pub struct Client {
    http: reqwest::Client,
    api_url: String,
    limiter: RateLimiter,
    timeout: Duration,
    retries: u32,
    authenticated: std::sync::atomic::AtomicBool,
    csrf_token: tokio::sync::Mutex<Option<String>>,
}

impl Client {
    /// Builds an anonymous client from settings. Call [`Client::login`] to
    /// authenticate it.
    pub fn new(settings: &Settings) -> Result<Client> {
        let api_url = settings.api_url()?.to_string();
        let http = reqwest::ClientBuilder::new()
            .user_agent(format!(
                "{pkg}/{version} ({repo})",
                pkg = env!("CARGO_PKG_NAME"),
                version = env!("CARGO_PKG_VERSION"),
                repo = env!("CARGO_PKG_REPOSITORY"),
            ))
            .cookie_store(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Client {
            http,
            limiter: RateLimiter::for_api_url(
                &api_url,
                Duration::from_millis(settings.rate_limit_read_ms),
                Duration::from_millis(settings.rate_limit_write_ms),
            ),
            api_url,
            timeout: Duration::from_millis(settings.http_timeout_ms),
            retries: settings.http_retries,
            authenticated: std::sync::atomic::AtomicBool::new(false),
            csrf_token: tokio::sync::Mutex::new(None),
        })
    }

    /// Acquires a bot session and a CSRF token.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let login_token = self.fetch_token("login").await?;
        let response = self
            .call(
                &[
                    ("action", "login".to_string()),
                    ("lgname", username.to_string()),
                    ("lgpassword", password.to_string()),
                    ("lgtoken", login_token),
                ],
                true,
            )
            .await?;
        let result = response
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("");
        if result != "Success" {
            return Err(Error::AuthRequired(format!(
                "login failed for {username}: {result}"
            )));
        }
        self.authenticated
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let csrf = self.fetch_token("csrf").await?;
        *self.csrf_token.lock().await = Some(csrf);
        tracing::info!(username, "logged in to wiki");
        Ok(())
    }

    async fn fetch_token(&self, kind: &str) -> Result<String> {
        let response = self
            .call(
                &[
                    ("action", "query".to_string()),
                    ("meta", "tokens".to_string()),
                    ("type", kind.to_string()),
                ],
                false,
            )
            .await?;
        response
            .pointer(&format!("/query/tokens/{kind}token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Api {
                code: "missingtoken".to_string(),
                info: format!("no {kind} token in response"),
            })
    }

    async fn csrf(&self) -> Result<String> {
        {
            let token = self.csrf_token.lock().await;
            if let Some(token) = token.as_ref() {
                return Ok(token.clone());
            }
        }
        let fresh = self.fetch_token("csrf").await?;
        *self.csrf_token.lock().await = Some(fresh.clone());
        Ok(fresh)
    }

    async fn refresh_csrf(&self) -> Result<String> {
        let fresh = self.fetch_token("csrf").await?;
        *self.csrf_token.lock().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// One API call with rate limiting and the retry policy: transport
    /// errors and 5xx retry with exponential backoff; `maxlag`/429 honor
    /// the server's advised delay.
    async fn call(&self, params: &[(&str, String)], write: bool) -> Result<Value> {
        let mut form: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        form.push(("format".to_string(), "json".to_string()));
        form.push(("formatversion".to_string(), "2".to_string()));
        form.push(("maxlag".to_string(), MAX_LAG_SECS.to_string()));

        let mut attempt: u32 = 0;
        loop {
            if attempt == 0 {
                self.limiter.acquire(write).await;
            }

            let request = if write {
                self.http.post(&self.api_url).form(&form)
            } else {
                self.http.get(&self.api_url).query(&form)
            };
            let response = request.timeout(self.timeout).send().await;

            let response = match response {
                Ok(response) => response,
                Err(err) if attempt < self.retries => {
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(error = %err, ?backoff, attempt, "transport error, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let status = response.status();
            let retry_after = retry_after_secs(&response);
            if status.is_server_error() && attempt < self.retries {
                let backoff = backoff_delay(attempt);
                tracing::warn!(status = status.as_u16(), ?backoff, "server error, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }
            if status.as_u16() == 429 {
                if attempt < self.retries {
                    let delay = Duration::from_secs(retry_after.unwrap_or(MAX_LAG_SECS));
                    tracing::warn!(?delay, "throttled by server, sleeping");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            if !status.is_success() {
                return Err(Error::Api {
                    code: status.as_u16().to_string(),
                    info: format!("HTTP error from {url}", url = self.api_url),
                });
            }

            let value: Value = response.json().await?;
            if let Some(error) = value.get("error") {
                let code = error
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let info = error
                    .get("info")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                if code == "maxlag" || code == "ratelimited" {
                    if attempt < self.retries {
                        let delay = Duration::from_secs(retry_after.unwrap_or(MAX_LAG_SECS));
                        tracing::warn!(code, ?delay, "server asked us to back off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(Error::RateLimited {
                        retry_after_secs: retry_after,
                    });
                }
                return Err(Error::Api { code, info });
            }

            return Ok(value);
        }
    }

    fn info_from_page(page: &Value) -> Option<RemotePageInfo> {
        if page.get("missing").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        Some(RemotePageInfo {
            title: page.get("title")?.as_str()?.to_string(),
            namespace: page.get("ns").and_then(Value::as_i64).unwrap_or(0),
            lastrevid: page.get("lastrevid").and_then(Value::as_i64).unwrap_or(0),
            touched: page
                .get("touched")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
    }

    fn revision_from_page(page: &Value) -> Option<(String, RemoteRevision)> {
        if page.get("missing").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        let title = page.get("title")?.as_str()?.to_string();
        let revision = page.get("revisions")?.get(0)?;
        let slot = revision.pointer("/slots/main")?;
        Some((
            title,
            RemoteRevision {
                content: slot.get("content")?.as_str()?.to_string(),
                revision_id: revision.get("revid").and_then(Value::as_i64).unwrap_or(0),
                timestamp: revision
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                content_model: slot
                    .get("contentmodel")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        ))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.min(6)))
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

impl MediaWiki for Client {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn list_pages(&self, query: &ListQuery) -> Result<Vec<RemotePageInfo>> {
        let mut out = Vec::new();
        for namespace in &query.namespaces {
            let mut continue_params: Vec<(String, String)> = Vec::new();
            loop {
                let mut params: Vec<(&str, String)> = vec![
                    ("action", "query".to_string()),
                    ("prop", "info".to_string()),
                ];
                match &query.category {
                    Some(category) => {
                        params.push(("generator", "categorymembers".to_string()));
                        params.push(("gcmtitle", format!("Category:{category}")));
                        params.push(("gcmlimit", "max".to_string()));
                    }
                    None => {
                        params.push(("generator", "allpages".to_string()));
                        params.push(("gapnamespace", namespace.to_string()));
                        params.push(("gaplimit", "max".to_string()));
                        if let Some(from) = &query.apfrom {
                            params.push(("gapfrom", from.clone()));
                        }
                    }
                }
                for (key, value) in &continue_params {
                    params.push((key.as_str(), value.clone()));
                }

                let response = self.call(&params, false).await?;
                if let Some(pages) = response.pointer("/query/pages").and_then(Value::as_array) {
                    for page in pages {
                        if let Some(info) = Self::info_from_page(page) {
                            if info.namespace == *namespace {
                                out.push(info);
                            }
                        }
                    }
                }

                continue_params.clear();
                match response.get("continue").and_then(Value::as_object) {
                    Some(next) => {
                        for (key, value) in next {
                            if let Some(text) = value.as_str() {
                                continue_params.push((key.clone(), text.to_string()));
                            }
                        }
                    }
                    None => break,
                }

                if let Some(limit) = query.limit {
                    if out.len() as u64 >= limit {
                        out.truncate(limit as usize);
                        break;
                    }
                }
            }

            // Category listings are not namespace-partitioned; one request
            // round covers every namespace.
            if query.category.is_some() {
                break;
            }
        }

        out.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(out)
    }

    async fn get_page_content(&self, title: &str) -> Result<Option<RemoteRevision>> {
        let response = self
            .call(
                &[
                    ("action", "query".to_string()),
                    ("titles", title.to_string()),
                    ("prop", "revisions".to_string()),
                    ("rvprop", "content|ids|timestamp".to_string()),
                    ("rvslots", "main".to_string()),
                ],
                false,
            )
            .await?;
        let page = response.pointer("/query/pages/0");
        Ok(page.and_then(Self::revision_from_page).map(|(_, rev)| rev))
    }

    async fn get_page_info(&self, title: &str) -> Result<Option<RemotePageInfo>> {
        let response = self
            .call(
                &[
                    ("action", "query".to_string()),
                    ("titles", title.to_string()),
                    ("prop", "info".to_string()),
                ],
                false,
            )
            .await?;
        Ok(response
            .pointer("/query/pages/0")
            .and_then(Self::info_from_page))
    }

    async fn fetch_batch(&self, titles: &[String]) -> Result<BTreeMap<String, RemoteRevision>> {
        let mut out = BTreeMap::new();
        for chunk in titles.chunks(BATCH_LIMIT) {
            let response = self
                .call(
                    &[
                        ("action", "query".to_string()),
                        ("titles", chunk.join("|")),
                        ("prop", "revisions".to_string()),
                        ("rvprop", "content|ids|timestamp".to_string()),
                        ("rvslots", "main".to_string()),
                    ],
                    false,
                )
                .await?;
            if let Some(pages) = response.pointer("/query/pages").and_then(Value::as_array) {
                for page in pages {
                    if let Some((title, revision)) = Self::revision_from_page(page) {
                        out.insert(title, revision);
                    }
                }
            }
        }
        Ok(out)
    }

    async fn edit(&self, request: &EditRequest) -> Result<EditOutcome> {
        if !self.is_authenticated() {
            return Err(Error::AuthRequired(
                "editing requires a logged-in client".to_string(),
            ));
        }

        let mut token = self.csrf().await?;
        for refresh in [false, true] {
            if refresh {
                token = self.refresh_csrf().await?;
            }
            let mut params: Vec<(&str, String)> = vec![
                ("action", "edit".to_string()),
                ("title", request.title.clone()),
                ("text", request.content.clone()),
                ("summary", request.summary.clone()),
                ("token", token.clone()),
            ];
            if let Some(base_revid) = request.base_revid {
                params.push(("baserevid", base_revid.to_string()));
            }
            if request.bot {
                params.push(("bot", "1".to_string()));
            }

            match self.call(&params, true).await {
                Ok(response) => {
                    let edit = response.get("edit").cloned().unwrap_or(Value::Null);
                    let result = edit.get("result").and_then(Value::as_str).unwrap_or("");
                    if result != "Success" {
                        return Err(Error::Api {
                            code: "editfailed".to_string(),
                            info: format!("edit of \"{}\" returned {result}", request.title),
                        });
                    }
                    let no_change = edit.get("nochange").is_some();
                    return Ok(EditOutcome {
                        new_revid: edit.get("newrevid").and_then(Value::as_i64).unwrap_or(0),
                        timestamp: edit
                            .get("newtimestamp")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        no_change,
                    });
                }
                Err(Error::Api { code, info }) => {
                    return Err(map_edit_error(&request.title, code, info));
                }
                // Session/token expiry: refresh once, then give up.
                Err(err) if !refresh && is_bad_token(&err) => continue,
                Err(err) => return Err(err),
            }
        }
        unreachable!("edit loop always returns")
    }

    async fn delete(&self, title: &str, reason: &str) -> Result<DeleteOutcome> {
        if !self.is_authenticated() {
            return Err(Error::AuthRequired(
                "deleting requires a logged-in client".to_string(),
            ));
        }
        let token = self.csrf().await?;
        let response = self
            .call(
                &[
                    ("action", "delete".to_string()),
                    ("title", title.to_string()),
                    ("reason", reason.to_string()),
                    ("token", token),
                ],
                true,
            )
            .await
            .map_err(|err| match err {
                Error::Api { code, info } => map_edit_error(title, code, info),
                other => other,
            })?;
        Ok(DeleteOutcome {
            logid: response
                .pointer("/delete/logid")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        })
    }

    async fn get_parsed_html(&self, title: &str) -> Result<Option<String>> {
        let response = self
            .call(
                &[
                    ("action", "parse".to_string()),
                    ("page", title.to_string()),
                    ("prop", "text".to_string()),
                ],
                false,
            )
            .await;
        match response {
            Ok(value) => Ok(value
                .pointer("/parse/text")
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(Error::Api { code, .. }) if code == "missingtitle" => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_query_page_items(
        &self,
        query_page: &str,
        limit: u64,
    ) -> Result<QueryPageItems> {
        let response = self
            .call(
                &[
                    ("action", "query".to_string()),
                    ("list", "querypage".to_string()),
                    ("qppage", query_page.to_string()),
                    ("qplimit", limit.to_string()),
                ],
                false,
            )
            .await?;
        let items = response
            .pointer("/query/querypage/results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|item| item.get("title").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(QueryPageItems {
            items,
            truncated: response.get("continue").is_some(),
        })
    }
}

fn is_bad_token(err: &Error) -> bool {
    matches!(err, Error::Api { code, .. } if code == "badtoken" || code == "notoken")
}

fn map_edit_error(title: &str, code: String, info: String) -> Error {
    match code.as_str() {
        "editconflict" => Error::EditConflict {
            title: title.to_string(),
        },
        "permissiondenied" | "protectedpage" | "cascadeprotected" | "customcssjsprotected"
        | "permissions" => Error::PermissionDenied {
            title: title.to_string(),
            code,
        },
        "ratelimited" => Error::RateLimited {
            retry_after_secs: None,
        },
        "missingtitle" => Error::MissingPage(title.to_string()),
        _ => Error::Api { code, info },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_error_mapping() {
        assert!(matches!(
            map_edit_error("T", "editconflict".to_string(), String::new()),
            Error::EditConflict { .. }
        ));
        assert!(matches!(
            map_edit_error("T", "protectedpage".to_string(), String::new()),
            Error::PermissionDenied { .. }
        ));
        assert!(matches!(
            map_edit_error("T", "missingtitle".to_string(), String::new()),
            Error::MissingPage(_)
        ));
        assert!(matches!(
            map_edit_error("T", "weird".to_string(), "info".to_string()),
            Error::Api { .. }
        ));
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        // Capped.
        assert_eq!(backoff_delay(20), backoff_delay(6));
    }

    #[test]
    fn revision_parsing_from_formatversion2() {
        let page: Value = serde_json::from_str(
            r#"{
                "pageid": 1, "ns": 0, "title": "Foo",
                "revisions": [{
                    "revid": 10, "timestamp": "2024-01-01T00:00:00Z",
                    "slots": {"main": {"contentmodel": "wikitext", "content": "Hello"}}
                }]
            }"#,
        )
        .expect("json");
        let (title, revision) = Client::revision_from_page(&page).expect("revision");
        assert_eq!(title, "Foo");
        assert_eq!(revision.content, "Hello");
        assert_eq!(revision.revision_id, 10);
        assert_eq!(revision.content_model.as_deref(), Some("wikitext"));

        let missing: Value =
            serde_json::from_str(r#"{"ns":0,"title":"Gone","missing":true}"#).expect("json");
        assert!(Client::revision_from_page(&missing).is_none());
    }

    #[test]
    fn info_parsing() {
        let page: Value = serde_json::from_str(
            r#"{"pageid":1,"ns":0,"title":"Foo","lastrevid":12,"touched":"2024-01-02T00:00:00Z"}"#,
        )
        .expect("json");
        let info = Client::info_from_page(&page).expect("info");
        assert_eq!(info.lastrevid, 12);
        assert_eq!(info.touched, "2024-01-02T00:00:00Z");
    }
}
