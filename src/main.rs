use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use teller::{cli, server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "teller")]
#[command(about = "Account and ledger core for a retail banking backend")]
enum Cli {
    /// Replay a workload file and print the final statement
    Replay { input: PathBuf },
    /// Run the TCP session server
    Serve {
        #[arg(long, default_value = "0.0.0.0:9090")]
        bind: String,
        #[arg(long, default_value = "1000")]
        max_connections: usize,
        #[arg(long, default_value = "teller-journal.log")]
        journal: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse() {
        Cli::Replay { input } => {
            // No logging in replay mode, stdout carries the statement
            cli::run(input).await?;
        }
        Cli::Serve {
            bind,
            max_connections,
            journal,
        } => {
            // Initialize logging only for server mode
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(
                    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
                )
                .init();

            server::run(bind, max_connections, journal).await?;
        }
    }

    Ok(())
}
