use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use remanent::api::{Cli, Command, run_http_server};

const DEFAULT_LOG_FILTER: &str = "remanent=info,tower_http=info";

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let settings = match args.settings() {
                Ok(settings) => settings,
                Err(msg) => {
                    error!("Invalid configuration: {msg}");
                    std::process::exit(2);
                }
            };
            if let Err(e) = run_http_server(args.addr(), settings).await {
                error!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}
