use super::open_runtime;
use crate::Result;
use wikitool_store::migrate;

/// Apply pending schema migrations and report schema health.
#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Only check the schema, do not apply anything.
    #[arg(long, default_value_t = false)]
    check: bool,
}

pub async fn main(args: Args) -> Result<()> {
    let runtime = open_runtime()?;

    if !args.check {
        let report = migrate::run_migrations(&runtime.db)?;
        for version in &report.applied {
            println!("applied {version}");
        }
        if report.applied.is_empty() {
            println!("schema already current");
        }
    }

    let status = migrate::validate_schema(&runtime.db)?;
    println!(
        "schema {current} / expected {expected}: {verdict}",
        current = status.current_version.as_deref().unwrap_or("(none)"),
        expected = status.expected_version,
        verdict = if status.valid { "ok" } else { "INVALID" }
    );
    if !status.missing_tables.is_empty() {
        println!("missing tables: {}", status.missing_tables.join(", "));
    }
    if !status.valid {
        std::process::exit(1);
    }
    Ok(())
}
