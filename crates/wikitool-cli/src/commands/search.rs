use super::open_runtime;
use crate::Result;
use wikitool_store::fts;

/// Full-text search over the indexed documentation tiers.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// FTS5 query string.
    query: String,

    /// Restrict to one tier: content, extension, technical.
    #[arg(long)]
    tier: Option<String>,

    #[arg(long, default_value_t = 20)]
    limit: u64,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;
    let hits = fts::search(&runtime.db, &args.query, args.tier.as_deref(), args.limit)?;
    if hits.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for hit in hits {
        println!("[{tier}] {title}", tier = hit.tier, title = hit.title);
        println!("    {snippet}", snippet = hit.snippet.replace('\n', " "));
    }
    Ok(())
}
