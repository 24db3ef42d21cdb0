use super::open_runtime;
use crate::Result;
use wikitool_store::synclog::get_sync_logs;

/// Show recent sync-log entries.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    #[arg(long, default_value_t = 20)]
    limit: u64,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;
    let rows = get_sync_logs(&runtime.db, args.limit)?;
    if rows.is_empty() {
        println!("sync log is empty");
        return Ok(());
    }
    for row in rows {
        println!(
            "{timestamp}  {operation:<7} {status:<8} {title}{error}",
            timestamp = row.timestamp,
            operation = row.operation,
            status = row.status,
            title = row.page_title.as_deref().unwrap_or("-"),
            error = row
                .error_message
                .map(|message| format!("  ({message})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
