//! `wikitool` binary: thin subcommands over the library crates.

mod commands;

use clap::Parser;
use tracing::Level;

type Error = anyhow::Error;
type Result<T> = std::result::Result<T, Error>;

#[derive(clap::Parser, Debug)]
#[command(name = "wikitool", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Set this flag to enable logging to stderr as JSON. Logs are in a text format by default.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    Context(commands::context::Args),
    Init(commands::init::Args),
    Log(commands::log::Args),
    Migrate(commands::migrate::Args),
    Pull(commands::pull::Args),
    Push(commands::push::Args),
    Reindex(commands::reindex::Args),
    Search(commands::search::Args),
    Stats(commands::stats::Args),
    Status(commands::status::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = std::time::Instant::now();

    let args = Args::parse();

    init_logging(args.log_json)?;

    if tracing::enabled!(Level::DEBUG) {
        tracing::debug!(args = ?args, "parsed CLI args");
    }

    match args.command {
        Command::Context(cmd_args) => commands::context::main(cmd_args).await?,
        Command::Init(cmd_args) => commands::init::main(cmd_args).await?,
        Command::Log(cmd_args) => commands::log::main(cmd_args).await?,
        Command::Migrate(cmd_args) => commands::migrate::main(cmd_args).await?,
        Command::Pull(cmd_args) => commands::pull::main(cmd_args).await?,
        Command::Push(cmd_args) => commands::push::main(cmd_args).await?,
        Command::Reindex(cmd_args) => commands::reindex::main(cmd_args).await?,
        Command::Search(cmd_args) => commands::search::main(cmd_args).await?,
        Command::Stats(cmd_args) => commands::stats::main(cmd_args).await?,
        Command::Status(cmd_args) => commands::status::main(cmd_args).await?,
    };

    let duration = start_time.elapsed();
    tracing::debug!(?duration, "wikitool::main() returning");

    Ok(())
}

fn init_logging(log_json: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if log_json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
