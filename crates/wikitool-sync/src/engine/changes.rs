//! Three-way change classification: wiki ↔ database ↔ file.

use super::SyncEngine;
use crate::{api::MediaWiki, Result};
use std::collections::BTreeMap;
use wikitool_core::{
    fs::FileInfo,
    types::{Change, ChangeKind, PageRecord, SyncStatus},
};
use wikitool_store::{pages, PageFilter};

#[derive(Clone, Debug, Default)]
pub struct ChangesOptions {
    pub namespaces: Option<Vec<i64>>,
    pub include_templates: bool,
}

impl<C: MediaWiki> SyncEngine<C> {
    /// Classifies every title present in the database or the working tree.
    /// Pure: no state is mutated, output is ordered by title.
    pub fn get_changes(&self, opts: &ChangesOptions) -> Result<Vec<Change>> {
        let db_pages = pages::get_pages(
            self.db(),
            &PageFilter {
                namespaces: opts.namespaces.clone(),
                ..PageFilter::default()
            },
        )?;
        let files = self.fs().scan_all(opts.include_templates)?;
        Ok(classify(self.site(), db_pages, files, opts))
    }
}

fn classify(
    site: &wikitool_core::site::Site,
    db_pages: Vec<PageRecord>,
    files: Vec<FileInfo>,
    opts: &ChangesOptions,
) -> Vec<Change> {
    let mut merged: BTreeMap<String, (Option<FileInfo>, Option<PageRecord>)> = BTreeMap::new();

    for file in files {
        if let Some(namespaces) = &opts.namespaces {
            if !namespaces.contains(&file.namespace) {
                continue;
            }
        }
        let title = file.title.clone();
        merged.entry(title).or_default().0 = Some(file);
    }
    for page in db_pages {
        if !opts.include_templates {
            let is_template_ns = site
                .namespace_by_id(page.namespace)
                .map(|ns| ns.template_ns)
                .unwrap_or(false);
            if is_template_ns {
                continue;
            }
        }
        let title = page.title.clone();
        merged.entry(title).or_default().1 = Some(page);
    }

    let mut out = Vec::new();
    for (title, entry) in merged {
        let change = match entry {
            (Some(file), Some(page)) => {
                let kind = if page.sync_status == SyncStatus::New {
                    ChangeKind::NewLocal
                } else if file.content_hash == page.content_hash {
                    ChangeKind::Synced
                } else if matches!(
                    page.sync_status,
                    SyncStatus::WikiModified | SyncStatus::Conflict
                ) {
                    ChangeKind::Conflict
                } else {
                    ChangeKind::ModifiedLocal
                };
                Change {
                    title,
                    kind,
                    namespace: file.namespace,
                    filepath: Some(file.filepath),
                    local_hash: Some(file.content_hash),
                    db_hash: Some(page.content_hash),
                }
            }
            (Some(file), None) => {
                if file.content.trim().is_empty() {
                    continue;
                }
                Change {
                    title,
                    kind: ChangeKind::NewLocal,
                    namespace: file.namespace,
                    filepath: Some(file.filepath),
                    local_hash: Some(file.content_hash),
                    db_hash: None,
                }
            }
            (None, Some(page)) => Change {
                title,
                kind: ChangeKind::DeletedLocal,
                namespace: page.namespace,
                filepath: if page.filepath.is_empty() {
                    None
                } else {
                    Some(page.filepath)
                },
                local_hash: None,
                db_hash: Some(page.content_hash),
            },
            (None, None) => continue,
        };
        out.push(change);
    }
    out
}
