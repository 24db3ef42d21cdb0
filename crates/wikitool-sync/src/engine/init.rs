//! Hydrate the database from an existing checkout.

use super::SyncEngine;
use crate::{api::MediaWiki, Result};
use wikitool_core::types::{
    InitFromFilesReport, PageError, SyncLogEntry, SyncOperation, SyncOutcome, SyncStatus,
};
use wikitool_store::{migrate, pages, synclog, PageUpsert};

#[derive(Clone, Copy, Debug, Default)]
pub struct InitOptions {
    pub include_templates: bool,
}

impl<C: MediaWiki> SyncEngine<C> {
    /// Scans the working tree and registers every syncable file. Files whose
    /// content already matches the stored row are marked synced; everything
    /// else becomes `new`, waiting for a push.
    #[tracing::instrument(level = "info", skip(self, opts))]
    pub fn init_from_files(&self, opts: &InitOptions) -> Result<InitFromFilesReport> {
        migrate::require_valid_schema(self.db())?;

        let files = self.fs().scan_all(opts.include_templates)?;
        let mut report = InitFromFilesReport::default();

        for file in files {
            if self.cancel_flag().is_cancelled() {
                break;
            }
            let existing = pages::get_page(self.db(), &file.title)?;
            let matches_stored = existing
                .as_ref()
                .map(|page| page.content_hash == file.content_hash)
                .unwrap_or(false);
            let sync_status = if matches_stored {
                SyncStatus::Synced
            } else {
                SyncStatus::New
            };

            let namespace = file.namespace;
            let template_category = self
                .site()
                .namespace_by_id(namespace)
                .filter(|ns| ns.template_ns)
                .map(|_| self.site().template_bucket(&file.title).to_string());
            let (_, bare) = self.site().split_title(&file.title);
            let content_model = self.site().content_model(namespace, bare).to_string();

            let result = pages::upsert_page(
                self.db(),
                &PageUpsert {
                    namespace: Some(namespace),
                    page_type: Some(self.site().page_type(namespace, file.is_redirect)),
                    filename: Some(file.filename.clone()),
                    filepath: Some(file.filepath.clone()),
                    template_category: Some(template_category),
                    content: Some(file.content.clone()),
                    file_mtime: Some(file.mtime_ms),
                    sync_status: Some(sync_status),
                    is_redirect: Some(file.is_redirect),
                    redirect_target: Some(file.redirect_target.clone()),
                    content_model: Some(content_model),
                    ..PageUpsert::new(file.title.clone())
                },
            )
            .and_then(|_| self.reindex(&file.title));

            match result {
                Ok(()) => {
                    if matches_stored {
                        report.unchanged += 1;
                    } else {
                        report.imported += 1;
                    }
                }
                Err(err) => {
                    report.errors.push(PageError::new(&file.title, &err));
                    tracing::warn!(title = %file.title, error = %err, "init: file failed");
                }
            }
        }

        synclog::log_sync(
            self.db(),
            &SyncLogEntry {
                operation: SyncOperation::Init,
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

        Ok(report)
    }
}
