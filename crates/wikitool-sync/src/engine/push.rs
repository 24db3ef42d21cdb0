//! Push: local → remote. Never edits a page whose remote moved past the
//! last sync unless forced; the server's edit-conflict response is the
//! final authority either way.

use super::{changes::ChangesOptions, SyncEngine};
use crate::{
    api::{EditRequest, MediaWiki},
    Error, Result,
};
use wikitool_core::{
    types::{
        now_iso, Change, ChangeKind, PageError, ProgressEvent, ProgressFn, PushAction,
        PushReport, PushedPage, SyncLogEntry, SyncOperation, SyncOutcome, SyncStatus,
    },
};
use wikitool_store::{migrate, pages, synclog, PageUpsert};

pub struct PushOptions {
    pub summary: String,
    pub dry_run: bool,
    /// Skip the conflict probe; local wins.
    pub force: bool,
    /// Also delete remote pages whose local file disappeared.
    pub delete: bool,
    pub include_templates: bool,
    pub namespaces: Option<Vec<i64>>,
    pub on_progress: Option<ProgressFn>,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            summary: "wikitool push".to_string(),
            dry_run: false,
            force: false,
            delete: false,
            include_templates: false,
            namespaces: None,
            on_progress: None,
        }
    }
}

impl<C: MediaWiki> SyncEngine<C> {
    #[tracing::instrument(level = "info", skip(self, opts),
                          fields(dry_run = opts.dry_run, force = opts.force))]
    pub async fn push(&self, opts: &PushOptions) -> Result<PushReport> {
        migrate::require_valid_schema(self.db())?;
        if !opts.dry_run && !self.client().is_authenticated() {
            return Err(Error::AuthRequired(
                "push needs bot credentials; set WIKI_BOT_USER / WIKI_BOT_PASS".to_string(),
            ));
        }

        let changes = self.get_changes(&ChangesOptions {
            namespaces: opts.namespaces.clone(),
            include_templates: opts.include_templates,
        })?;

        let total = changes.len() as u64;
        let mut report = PushReport::default();

        for (done, change) in changes.iter().enumerate() {
            if self.cancel_flag().is_cancelled() {
                break;
            }
            match change.kind {
                ChangeKind::Synced => {
                    report.unchanged += 1;
                    report.pages.push(PushedPage {
                        title: change.title.clone(),
                        action: PushAction::Unchanged,
                    });
                }
                ChangeKind::Conflict => {
                    report.conflicts.push(change.title.clone());
                }
                ChangeKind::NewLocal | ChangeKind::ModifiedLocal => {
                    self.push_one(change, opts, &mut report).await?;
                }
                ChangeKind::DeletedLocal => {
                    if opts.delete {
                        self.delete_one(change, opts, &mut report).await?;
                    }
                }
            }
            if let Some(on_progress) = &opts.on_progress {
                on_progress(ProgressEvent {
                    done: done as u64 + 1,
                    total: Some(total),
                    title: change.title.clone(),
                });
            }
        }

        report.success = report.conflicts.is_empty() && report.errors.is_empty();

        if !opts.dry_run {
            synclog::log_sync(
                self.db(),
                &SyncLogEntry {
                    operation: SyncOperation::Push,
                    page_title: None,
                    status: if report.success {
                        SyncOutcome::Success
                    } else if report.conflicts.is_empty() {
                        SyncOutcome::Failed
                    } else {
                        SyncOutcome::Conflict
                    },
                    revision_id: None,
                    error_message: report.errors.first().map(|e| e.message.clone()),
                    details: Some(serde_json::to_string(&report)?),
                },
            )?;
        }

        tracing::info!(
            pushed = report.pushed,
            unchanged = report.unchanged,
            conflicts = report.conflicts.len(),
            errors = report.errors.len(),
            "push finished"
        );
        Ok(report)
    }

    async fn push_one(
        &self,
        change: &Change,
        opts: &PushOptions,
        report: &mut PushReport,
    ) -> Result<()> {
        let title = &change.title;
        let intended = if change.kind == ChangeKind::NewLocal {
            PushAction::Created
        } else {
            PushAction::Pushed
        };
        let db_page = pages::get_page(self.db(), title)?;

        // The file may have changed since classification; send what is on
        // disk right now.
        let Some(filepath) = &change.filepath else {
            report.errors.push(PageError::new(title, "no filepath"));
            return Ok(());
        };
        let file = match self.fs().read_file(filepath) {
            Ok(file) => file,
            Err(err) => {
                report.errors.push(PageError::new(title, &err));
                report.pages.push(PushedPage {
                    title: title.clone(),
                    action: PushAction::Error,
                });
                return Ok(());
            }
        };

        if !opts.force {
            if let Some(remote) = self.client().get_page_info(title).await? {
                let stale = match &db_page {
                    Some(page) => {
                        page.revision_id != Some(remote.lastrevid)
                            || page
                                .last_synced_at
                                .as_deref()
                                .map(|synced| remote.touched.as_str() > synced)
                                .unwrap_or(true)
                    }
                    // Remote page exists but the database has never seen it.
                    None => true,
                };
                if stale {
                    report.conflicts.push(title.clone());
                    if db_page.is_some() {
                        pages::update_sync_status(self.db(), title, SyncStatus::Conflict)?;
                    }
                    tracing::warn!(title = %title, "push: remote changed, conflict");
                    return Ok(());
                }
            }
        }

        if opts.dry_run {
            report.pushed += 1;
            report.pages.push(PushedPage {
                title: title.clone(),
                action: intended,
            });
            return Ok(());
        }

        let edit = self
            .client()
            .edit(&EditRequest {
                title: title.clone(),
                content: file.content.clone(),
                summary: opts.summary.clone(),
                // Forced pushes skip server-side conflict detection too;
                // local wins unconditionally.
                base_revid: if opts.force {
                    None
                } else {
                    db_page.as_ref().and_then(|page| page.revision_id)
                },
                bot: true,
            })
            .await;

        match edit {
            Ok(outcome) => {
                let action = if outcome.no_change {
                    PushAction::Unchanged
                } else {
                    intended
                };
                pages::upsert_page(
                    self.db(),
                    &PageUpsert {
                        namespace: Some(file.namespace),
                        content: Some(file.content.clone()),
                        filepath: Some(file.filepath.clone()),
                        filename: Some(file.filename.clone()),
                        file_mtime: Some(file.mtime_ms),
                        page_type: Some(
                            self.site().page_type(file.namespace, file.is_redirect),
                        ),
                        is_redirect: Some(file.is_redirect),
                        redirect_target: Some(file.redirect_target.clone()),
                        wiki_modified_at: if outcome.timestamp.is_empty() {
                            None
                        } else {
                            Some(outcome.timestamp.clone())
                        },
                        last_synced_at: Some(now_iso()),
                        sync_status: Some(SyncStatus::Synced),
                        revision_id: if outcome.no_change {
                            None
                        } else {
                            Some(outcome.new_revid)
                        },
                        ..PageUpsert::new(title.clone())
                    },
                )?;
                self.reindex(title)?;
                if outcome.no_change {
                    report.unchanged += 1;
                } else {
                    report.pushed += 1;
                }
                report.pages.push(PushedPage {
                    title: title.clone(),
                    action,
                });
                synclog::log_sync(
                    self.db(),
                    &SyncLogEntry {
                        operation: SyncOperation::Push,
                        page_title: Some(title.clone()),
                        status: SyncOutcome::Success,
                        revision_id: if outcome.no_change {
                            None
                        } else {
                            Some(outcome.new_revid)
                        },
                        error_message: None,
                        details: None,
                    },
                )?;
            }
            Err(Error::EditConflict { .. }) => {
                // The wiki changed mid-flight; the server is ground truth.
                report.conflicts.push(title.clone());
                if db_page.is_some() {
                    pages::update_sync_status(self.db(), title, SyncStatus::Conflict)?;
                }
            }
            Err(err) if err.is_page_scoped() => {
                report.errors.push(PageError::new(title, &err));
                report.pages.push(PushedPage {
                    title: title.clone(),
                    action: PushAction::Error,
                });
                synclog::log_sync(
                    self.db(),
                    &SyncLogEntry {
                        operation: SyncOperation::Push,
                        page_title: Some(title.clone()),
                        status: SyncOutcome::Failed,
                        revision_id: None,
                        error_message: Some(err.to_string()),
                        details: None,
                    },
                )?;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn delete_one(
        &self,
        change: &Change,
        opts: &PushOptions,
        report: &mut PushReport,
    ) -> Result<()> {
        let title = &change.title;
        if opts.dry_run {
            report.pages.push(PushedPage {
                title: title.clone(),
                action: PushAction::Deleted,
            });
            return Ok(());
        }
        match self
            .client()
            .delete(title, "Removed from the local source tree")
            .await
        {
            Ok(outcome) => {
                pages::delete_page(self.db(), title)?;
                report.pages.push(PushedPage {
                    title: title.clone(),
                    action: PushAction::Deleted,
                });
                synclog::log_sync(
                    self.db(),
                    &SyncLogEntry {
                        operation: SyncOperation::Delete,
                        page_title: Some(title.clone()),
                        status: SyncOutcome::Success,
                        revision_id: None,
                        error_message: None,
                        details: Some(format!("{{\"logid\":{}}}", outcome.logid)),
                    },
                )?;
            }
            Err(err) if err.is_page_scoped() => {
                report.errors.push(PageError::new(title, &err));
                report.pages.push(PushedPage {
                    title: title.clone(),
                    action: PushAction::Error,
                });
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}
