use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rempo::cli::CliApp;
use rempo::cli_types::{Cli, Command};
use rempo::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "rempo=debug"
        } else {
            "rempo=warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let app = CliApp::new(config, cli.verbose)?;

    match cli.command {
        Command::Scan(args) => app.scan(args).await,
        Command::List(args) => app.list(args).await,
        Command::Details(args) => app.details(args).await,
        Command::Summary(args) => app.summary(args).await,
        Command::Config => app.show_config(),
        Command::Init(args) => app.init(args),
    }
}
