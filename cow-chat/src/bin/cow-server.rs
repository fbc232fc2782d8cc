use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use cow_chat::{cli::ServerArgs, server::Server, telemetry::init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info", std::io::stdout);

    let args = ServerArgs::parse();
    let listener = TcpListener::bind(args.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr()))?;
    let server = Server::new(listener);
    let addr = server.local_addr()?;
    info!("server listening on {}", addr);

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
