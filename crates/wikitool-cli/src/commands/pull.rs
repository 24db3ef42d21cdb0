use super::open_engine;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use wikitool_sync::PullOptions;

/// Fetch changed pages from the wiki into the working tree.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Namespace ids to pull. Defaults to the main namespace.
    #[arg(long = "namespace", value_name = "NS")]
    namespaces: Vec<i64>,

    /// Restrict to members of this category.
    #[arg(long)]
    category: Option<String>,

    /// Ignore the incremental watermark and fetch everything.
    #[arg(long, default_value_t = false)]
    full: bool,

    /// Overwrite locally modified files with the wiki's content.
    #[arg(long, default_value_t = false)]
    overwrite_local: bool,

    /// Include template, module and MediaWiki namespaces.
    #[arg(long, default_value_t = false)]
    templates: bool,
}

pub async fn main(args: Args) -> Result<()> {
    let engine = open_engine(false).await?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{pos}/{len} {wide_msg}").expect("progress template"),
    );
    let progress_bar = bar.clone();

    let report = engine
        .pull(&PullOptions {
            namespaces: if args.namespaces.is_empty() {
                vec![0]
            } else {
                args.namespaces.clone()
            },
            category: args.category.clone(),
            full: args.full,
            overwrite_local: args.overwrite_local,
            include_templates: args.templates,
            on_progress: Some(Box::new(move |event| {
                if let Some(total) = event.total {
                    progress_bar.set_length(total);
                }
                progress_bar.set_position(event.done);
                progress_bar.set_message(event.title);
            })),
        })
        .await?;
    bar.finish_and_clear();

    println!(
        "pull: {created} created, {updated} updated, {skipped} skipped, {errors} error(s){cancelled}",
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        errors = report.errors.len(),
        cancelled = if report.cancelled { " (cancelled)" } else { "" }
    );
    for error in &report.errors {
        println!(
            "  error {title}: {message}",
            title = error.title.as_deref().unwrap_or("-"),
            message = error.message
        );
    }
    Ok(())
}
