use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::{directory::Directory, session::Session};

/// Last line every connected client receives when the server stops.
pub const SHUTDOWN_NOTICE: &str = "Server shutting down";

/// Accepts TCP clients and runs one [`Session`] task per connection, all of
/// them sharing a single [`Directory`].
pub struct Server {
    listener: TcpListener,
    directory: Arc<Directory>,
}

impl Server {
    /// Creates a server whose catalog is every known cow figure.
    pub fn new(listener: TcpListener) -> Self {
        Self::with_directory(listener, Arc::new(Directory::default()))
    }

    pub fn with_directory(listener: TcpListener, directory: Arc<Directory>) -> Self {
        Self {
            listener,
            directory,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn directory(&self) -> Arc<Directory> {
        Arc::clone(&self.directory)
    }

    /// Serves clients until `shutdown` resolves, then tells every connected
    /// client goodbye and closes their sessions.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            directory,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    let closed = directory.disconnect_all(SHUTDOWN_NOTICE).await;
                    info!(sessions = closed, "server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &directory);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    directory: &Arc<Directory>,
) {
    match result {
        Ok((stream, peer)) => spawn_session(stream, peer, directory),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_session(stream: TcpStream, peer: SocketAddr, directory: &Arc<Directory>) {
    let directory = Arc::clone(directory);
    tokio::spawn(async move {
        if let Err(err) = serve_connection(stream, peer, directory).await {
            warn!(peer = %peer, error = ?err, "client connection closed with error");
        }
    });
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    directory: Arc<Directory>,
) -> Result<()> {
    let session = Session::open(peer.to_string(), directory)
        .await
        .with_context(|| format!("failed to open session for {peer}"))?;
    info!(peer = %peer, "client connected");

    let (reader, writer) = stream.into_split();
    let reason = session.run(BufReader::new(reader), writer).await?;
    info!(peer = %peer, ?reason, "client disconnected");

    Ok(())
}
