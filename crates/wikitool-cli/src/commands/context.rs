use super::open_runtime;
use crate::Result;
use wikitool_store::queries::{get_context_bundle, ContextOptions};

/// Emit the aggregated context bundle for one page as JSON.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Page title, e.g. "Milady Maker" or "Template:Infobox person".
    title: String,

    /// Include the raw page content in the bundle.
    #[arg(long, default_value_t = false)]
    content: bool,

    /// Include Cargo table contexts.
    #[arg(long, default_value_t = false)]
    cargo: bool,

    /// Maximum number of sections included.
    #[arg(long, default_value_t = 10)]
    sections: usize,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;
    let bundle = get_context_bundle(
        &runtime.db,
        &runtime.site,
        &args.title,
        &ContextOptions {
            include_content: args.content,
            max_sections: args.sections,
            include_cargo: args.cargo,
        },
    )?;
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}
