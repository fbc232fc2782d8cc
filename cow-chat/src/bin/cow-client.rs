use anyhow::Result;
use clap::Parser;

use cow_chat::{cli::ClientArgs, client, telemetry::init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Chat output owns stdout; diagnostics go to stderr.
    init_tracing("warn", std::io::stderr);

    client::run(ClientArgs::parse()).await
}
