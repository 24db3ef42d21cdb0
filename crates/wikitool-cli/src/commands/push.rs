use super::open_engine;
use crate::Result;
use wikitool_sync::PushOptions;

/// Send local changes to the wiki.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Edit summary for every pushed revision.
    #[arg(long, default_value = "wikitool push", env = "WIKITOOL_EDIT_SUMMARY")]
    summary: String,

    /// Report what would change without editing anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Push even when the wiki changed since the last sync (local wins).
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Delete remote pages whose local file was removed.
    #[arg(long, default_value_t = false)]
    delete: bool,

    /// Include template, module and MediaWiki namespaces.
    #[arg(long, default_value_t = false)]
    templates: bool,

    /// Restrict to these namespace ids.
    #[arg(long = "namespace", value_name = "NS")]
    namespaces: Vec<i64>,
}

pub async fn main(args: Args) -> Result<()> {
    let engine = open_engine(!args.dry_run).await?;

    let report = engine
        .push(&PushOptions {
            summary: args.summary.clone(),
            dry_run: args.dry_run,
            force: args.force,
            delete: args.delete,
            include_templates: args.templates,
            namespaces: if args.namespaces.is_empty() {
                None
            } else {
                Some(args.namespaces.clone())
            },
            on_progress: None,
        })
        .await?;

    for page in &report.pages {
        if matches!(
            page.action,
            wikitool_core::types::PushAction::Unchanged
        ) {
            continue;
        }
        println!("{action:<8} {title}", action = format!("{:?}", page.action).to_lowercase(), title = page.title);
    }
    for title in &report.conflicts {
        println!("conflict {title}  (resolve with `pull --overwrite-local` or `push --force`)");
    }
    for error in &report.errors {
        println!(
            "error    {title}: {message}",
            title = error.title.as_deref().unwrap_or("-"),
            message = error.message
        );
    }
    println!(
        "push{dry}: {pushed} pushed, {unchanged} unchanged, {conflicts} conflict(s), {errors} error(s)",
        dry = if args.dry_run { " (dry run)" } else { "" },
        pushed = report.pushed,
        unchanged = report.unchanged,
        conflicts = report.conflicts.len(),
        errors = report.errors.len()
    );

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
