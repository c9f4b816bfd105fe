use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use scrollfeed::{browse, normalize, telemetry};

#[derive(Parser)]
#[command(name = "scrollfeed", about = "Paginated feed coordinator CLI")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical cache key for a set of filters
    Normalize(normalize::NormalizeCmd),
    /// Scroll a feed from an HTTP endpoint or a fixture file
    Browse(browse::BrowseCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and SCROLLFEED_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Normalize(args) => normalize::run(args)?,
        Commands::Browse(args) => browse::run(args).await?,
    }

    Ok(())
}
