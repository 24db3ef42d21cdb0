//! Pull: remote → local. Incremental by default, driven by per-namespace
//! `touched` watermarks committed after every batch so an interrupted pull
//! resumes where it stopped.

use super::SyncEngine;
use crate::{
    api::{ListQuery, MediaWiki, RemoteRevision},
    Result,
};
use wikitool_core::{
    hash::content_hash,
    site::{NS_MEDIAWIKI, NS_MODULE, NS_TEMPLATE},
    types::{
        now_iso, PageError, ProgressEvent, ProgressFn, PullReport, SyncLogEntry, SyncOperation,
        SyncOutcome, SyncStatus,
    },
    wikitext,
};
use wikitool_store::{fts, indexer, migrate, pages, synclog, PageUpsert};

pub struct PullOptions {
    pub namespaces: Vec<i64>,
    pub category: Option<String>,
    /// Ignore the watermark and fetch everything.
    pub full: bool,
    /// Let the wiki win over locally-diverged files.
    pub overwrite_local: bool,
    pub include_templates: bool,
    pub on_progress: Option<ProgressFn>,
}

impl Default for PullOptions {
    fn default() -> Self {
        PullOptions {
            namespaces: vec![0],
            category: None,
            full: false,
            overwrite_local: false,
            include_templates: false,
            on_progress: None,
        }
    }
}

pub(super) enum ApplyOutcome {
    Created,
    Updated,
    Skipped,
}

fn watermark_key(namespaces: &[i64]) -> String {
    let mut sorted = namespaces.to_vec();
    sorted.sort_unstable();
    let key = sorted
        .iter()
        .map(|ns| ns.to_string())
        .collect::<Vec<_>>()
        .join("_");
    format!("last_pull_ns_{key}")
}

impl<C: MediaWiki> SyncEngine<C> {
    #[tracing::instrument(level = "info", skip(self, opts),
                          fields(namespaces = ?opts.namespaces, full = opts.full))]
    pub async fn pull(&self, opts: &PullOptions) -> Result<PullReport> {
        migrate::require_valid_schema(self.db())?;

        let mut namespaces = opts.namespaces.clone();
        if opts.include_templates {
            for ns in [NS_TEMPLATE, NS_MODULE, NS_MEDIAWIKI] {
                if !namespaces.contains(&ns) {
                    namespaces.push(ns);
                }
            }
        }

        let watermark_key = watermark_key(&namespaces);
        let watermark = self.db().get_config(&watermark_key)?;

        let mut infos = self
            .client()
            .list_pages(&ListQuery {
                namespaces: namespaces.clone(),
                category: opts.category.clone(),
                ..ListQuery::default()
            })
            .await?;
        if !opts.full {
            if let Some(mark) = &watermark {
                infos.retain(|info| info.touched.as_str() > mark.as_str());
            }
        }
        infos.sort_by(|a, b| a.title.cmp(&b.title));

        let total = infos.len() as u64;
        let mut done = 0u64;
        let mut max_touched = watermark.unwrap_or_default();
        let mut report = PullReport::default();

        'batches: for batch in infos.chunks(50) {
            if self.cancel_flag().is_cancelled() {
                report.cancelled = true;
                break;
            }
            let titles: Vec<String> = batch.iter().map(|info| info.title.clone()).collect();
            let revisions = self.client().fetch_batch(&titles).await?;

            for info in batch {
                if self.cancel_flag().is_cancelled() {
                    report.cancelled = true;
                    break 'batches;
                }
                done += 1;
                match revisions.get(&info.title) {
                    Some(revision) => {
                        match self.apply_remote(&info.title, revision, opts.overwrite_local) {
                            Ok(ApplyOutcome::Created) => report.created += 1,
                            Ok(ApplyOutcome::Updated) => report.updated += 1,
                            Ok(ApplyOutcome::Skipped) => report.skipped += 1,
                            Err(err) if err.is_page_scoped() => {
                                report.errors.push(PageError::new(&info.title, &err));
                                tracing::warn!(title = %info.title, error = %err,
                                               "pull: page failed");
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    // Deleted between listing and fetch.
                    None => report.skipped += 1,
                }
                if info.touched.as_str() > max_touched.as_str() {
                    max_touched = info.touched.clone();
                }
                if let Some(on_progress) = &opts.on_progress {
                    on_progress(ProgressEvent {
                        done,
                        total: Some(total),
                        title: info.title.clone(),
                    });
                }
            }

            // Crash-safe watermark: everything up to here is committed.
            if !max_touched.is_empty() {
                self.db().set_config(&watermark_key, &max_touched)?;
            }
        }

        synclog::log_sync(
            self.db(),
            &SyncLogEntry {
                operation: SyncOperation::Pull,
                page_title: None,
                status: if report.errors.is_empty() {
                    SyncOutcome::Success
                } else {
                    SyncOutcome::Failed
                },
                revision_id: None,
                error_message: report.errors.first().map(|e| e.message.clone()),
                details: Some(serde_json::to_string(&report)?),
            },
        )?;

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "pull finished"
        );
        Ok(report)
    }

    /// Applies one remote revision to the working tree and database. The
    /// local file is never clobbered unless `overwrite_local` is set or it
    /// matches the last-synced content.
    pub(super) fn apply_remote(
        &self,
        title: &str,
        revision: &RemoteRevision,
        overwrite_local: bool,
    ) -> Result<ApplyOutcome> {
        let (is_redirect, redirect_target) = wikitext::parse_redirect(&revision.content);
        let filepath = self.site().title_to_path(title, is_redirect);
        let remote_hash = content_hash(&revision.content);
        let existing = pages::get_page(self.db(), title)?;

        let local = if self.fs().exists(&filepath) {
            Some(self.fs().read_file(&filepath)?)
        } else {
            None
        };
        let local_hash = local.as_ref().map(|info| info.content_hash.clone());

        if let Some(local_hash) = &local_hash {
            if *local_hash != remote_hash && !overwrite_local {
                let db_has_remote = existing
                    .as_ref()
                    .map(|page| page.content_hash == remote_hash)
                    .unwrap_or(false);
                if !db_has_remote {
                    // The wiki moved under a locally-diverged file: record
                    // the remote state in the database, leave the file.
                    pages::upsert_page(
                        self.db(),
                        &PageUpsert {
                            namespace: Some(self.site().namespace_of_title(title).id),
                            content: Some(revision.content.clone()),
                            wiki_modified_at: Some(revision.timestamp.clone()),
                            revision_id: Some(revision.revision_id),
                            sync_status: Some(SyncStatus::WikiModified),
                            filepath: Some(filepath.clone()),
                            ..PageUpsert::new(title)
                        },
                    )?;
                    self.reindex(title)?;
                }
                return Ok(ApplyOutcome::Skipped);
            }
        }

        if local_hash.as_deref() == Some(remote_hash.as_str()) {
            if let Some(page) = &existing {
                if page.revision_id == Some(revision.revision_id)
                    && page.sync_status == SyncStatus::Synced
                {
                    return Ok(ApplyOutcome::Skipped);
                }
            }
        }

        let file_mtime = match (&local_hash, local) {
            (Some(hash), Some(info)) if *hash == remote_hash => info.mtime_ms,
            _ => self.fs().write_file(&filepath, &revision.content)?,
        };

        // Redirect flips move the file between the canonical folder and
        // `_redirects/`; drop the stale copy.
        if let Some(page) = &existing {
            if !page.filepath.is_empty() && page.filepath != filepath {
                self.fs().delete_file(&page.filepath)?;
            }
        }

        let namespace = self.site().namespace_of_title(title).id;
        let (_, bare) = self.site().split_title(title);
        let template_category = self
            .site()
            .namespace_by_id(namespace)
            .filter(|ns| ns.template_ns)
            .map(|_| self.site().template_bucket(title).to_string());
        let filename = filepath.rsplit('/').next().unwrap_or(&filepath).to_string();

        let created = existing.is_none();
        pages::upsert_page(
            self.db(),
            &PageUpsert {
                namespace: Some(namespace),
                page_type: Some(self.site().page_type(namespace, is_redirect)),
                filename: Some(filename),
                filepath: Some(filepath),
                template_category: Some(template_category),
                content: Some(revision.content.clone()),
                file_mtime: Some(file_mtime),
                wiki_modified_at: Some(revision.timestamp.clone()),
                last_synced_at: Some(now_iso()),
                sync_status: Some(SyncStatus::Synced),
                is_redirect: Some(is_redirect),
                redirect_target: Some(redirect_target),
                content_model: Some(
                    revision
                        .content_model
                        .clone()
                        .unwrap_or_else(|| self.site().content_model(namespace, bare).to_string()),
                ),
                revision_id: Some(revision.revision_id),
                ..PageUpsert::new(title)
            },
        )?;
        self.reindex(title)?;

        Ok(if created {
            ApplyOutcome::Created
        } else {
            ApplyOutcome::Updated
        })
    }

    /// Rebuilds the derived rows and the content-tier FTS entry for one
    /// page from its database row.
    pub(super) fn reindex(&self, title: &str) -> Result<()> {
        if let Some(page) = pages::get_page(self.db(), title)? {
            indexer::update_page_index(self.db(), self.site(), &page)?;
            fts::index_page(self.db(), fts::TIER_CONTENT, title, &page.content)?;
        }
        Ok(())
    }
}
