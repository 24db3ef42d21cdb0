use super::open_runtime;
use crate::Result;
use std::sync::Arc;
use wikitool_core::types::ChangeKind;
use wikitool_sync::{ChangesOptions, SyncEngine};

/// Show the change classification between the working tree and the database.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Restrict to these namespace ids.
    #[arg(long = "namespace", value_name = "NS")]
    namespaces: Vec<i64>,

    /// Include template, module and MediaWiki pages.
    #[arg(long, default_value_t = false)]
    templates: bool,

    /// Also list unchanged pages.
    #[arg(long, default_value_t = false)]
    all: bool,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;
    // Status is offline: a client is never constructed.
    let engine = SyncEngine::new(
        runtime.db,
        runtime.fs,
        wikitool_sync::OfflineClient,
        Arc::clone(&runtime.site),
    );

    let changes = engine.get_changes(&ChangesOptions {
        namespaces: if args.namespaces.is_empty() {
            None
        } else {
            Some(args.namespaces.clone())
        },
        include_templates: args.templates,
    })?;

    let mut counts = std::collections::BTreeMap::new();
    for change in &changes {
        *counts.entry(change.kind.as_str()).or_insert(0u64) += 1;
        if change.kind == ChangeKind::Synced && !args.all {
            continue;
        }
        println!(
            "{kind:<16} {title}",
            kind = change.kind.as_str(),
            title = change.title
        );
    }

    println!();
    for (kind, count) in counts {
        println!("{kind:<16} {count}");
    }
    Ok(())
}
