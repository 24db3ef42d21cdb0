use super::open_runtime;
use crate::Result;
use wikitool_store::indexer::{rebuild_index, RebuildOptions};

/// Rebuild every derived table from the stored page content.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Restrict the rebuild scan to these namespace ids.
    #[arg(long = "namespace", value_name = "NS")]
    namespaces: Vec<i64>,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;

    let report = rebuild_index(
        &runtime.db,
        &runtime.site,
        &RebuildOptions {
            namespaces: if args.namespaces.is_empty() {
                None
            } else {
                Some(args.namespaces.clone())
            },
            on_progress: None,
        },
    )?;

    println!(
        "reindexed {pages} page(s): {links} links, {categories} categories, \
         {templates} template calls, {sections} sections, {redirects} redirects, \
         {module_deps} module deps, {cargo} cargo rows",
        pages = report.pages,
        links = report.links,
        categories = report.categories,
        templates = report.templates,
        sections = report.sections,
        redirects = report.redirects,
        module_deps = report.module_deps,
        cargo = report.cargo_rows
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
