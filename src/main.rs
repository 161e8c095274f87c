use clap::Parser;
use tracing_subscriber::EnvFilter;

use redash2dbsql::cli::{self, Cli};
use redash2dbsql::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let failed = cli::run(cli, config).await?;
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
