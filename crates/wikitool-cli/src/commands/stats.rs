use super::open_runtime;
use crate::Result;
use wikitool_store::stats::get_stats;

/// Database statistics: pages by namespace/status/type plus derived-table
/// row counts.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Emit JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;
    let stats = get_stats(&runtime.db)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("pages: {}", stats.pages);
    println!("by namespace:");
    for (ns, count) in &stats.by_namespace {
        println!("  {ns:>6}  {count}");
    }
    println!("by sync status:");
    for (status, count) in &stats.by_sync_status {
        println!("  {status:<16} {count}");
    }
    println!("by page type:");
    for (page_type, count) in &stats.by_page_type {
        println!("  {page_type:<16} {count}");
    }
    println!("derived tables:");
    for (table, count) in &stats.table_counts {
        println!("  {table:<20} {count}");
    }
    Ok(())
}
