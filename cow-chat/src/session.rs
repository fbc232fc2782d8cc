use std::sync::Arc;

use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Split},
    select,
};
use tracing::{debug, warn};

use crate::{
    command::Command,
    directory::{ConnectionKey, Directory, Outbox, RegisterError},
    message::{line_source, write_line},
    processor::{self, Flow},
};

/// Where a session is in its lifecycle while it is still owned.
///
/// [`Session::run`] consumes the session, so a returned close reason marks a
/// session whose writer is shut down and whose directory entry is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing(CloseReason),
}

/// Why a session left the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side of the stream.
    EndOfInput,
    /// The peer sent `quit`.
    Quit,
    /// The directory dropped this connection's outbound queue.
    OutboxClosed,
    /// Reading or writing the transport failed.
    Transport,
}

enum Event {
    Inbound(std::io::Result<Option<Vec<u8>>>),
    Outbound(Option<String>),
}

/// Server side of one client connection.
///
/// The session owns the receiving end of its outbound queue; everything else
/// (including this session's own replies) reaches the peer by enqueueing
/// through the [`Directory`].
pub struct Session {
    key: ConnectionKey,
    directory: Arc<Directory>,
    outbox: Outbox,
    state: SessionState,
}

impl Session {
    /// Registers `key` with the directory and returns a session ready to run.
    pub async fn open(
        key: impl Into<ConnectionKey>,
        directory: Arc<Directory>,
    ) -> Result<Self, RegisterError> {
        let key = key.into();
        let outbox = directory.register(key.clone()).await?;
        Ok(Self {
            key,
            directory,
            outbox,
            state: SessionState::Active,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the duplex loop until the session closes, then releases the
    /// writer and the directory entry.
    ///
    /// Transport errors are returned after cleanup has happened.
    pub async fn run<R, W>(mut self, reader: R, mut writer: W) -> Result<CloseReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = line_source(reader);
        let outcome = self.drive(&mut lines, &mut writer).await;

        let outcome = match outcome {
            Ok(CloseReason::Quit) => self.flush_farewell(&mut writer).await,
            other => other,
        };

        if let Err(err) = writer.shutdown().await {
            debug!(peer = %self.key, error = ?err, "writer shutdown failed");
        }
        drop(writer);
        self.close().await;

        outcome
    }

    async fn drive<R, W>(&mut self, lines: &mut Split<R>, writer: &mut W) -> Result<CloseReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while self.state == SessionState::Active {
            let event = select! {
                segment = lines.next_segment() => Event::Inbound(segment),
                message = self.outbox.recv() => Event::Outbound(message),
            };

            match event {
                Event::Inbound(segment) => self.on_inbound(segment).await?,
                Event::Outbound(message) => self.on_outbound(message, writer).await?,
            }
        }

        match self.state {
            SessionState::Closing(reason) => Ok(reason),
            _ => Ok(CloseReason::EndOfInput),
        }
    }

    async fn on_inbound(&mut self, segment: std::io::Result<Option<Vec<u8>>>) -> Result<()> {
        let segment = match segment {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                self.state = SessionState::Closing(CloseReason::EndOfInput);
                return Ok(());
            }
            Err(err) => {
                self.state = SessionState::Closing(CloseReason::Transport);
                return Err(err.into());
            }
        };

        let command = Command::decode(&segment);
        if processor::process(&self.directory, &self.key, command).await == Flow::Close {
            self.state = SessionState::Closing(CloseReason::Quit);
        }
        Ok(())
    }

    async fn on_outbound<W>(&mut self, message: Option<String>, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(message) = message else {
            self.state = SessionState::Closing(CloseReason::OutboxClosed);
            return Ok(());
        };

        if let Err(err) = write_line(writer, &message).await {
            self.state = SessionState::Closing(CloseReason::Transport);
            return Err(err.into());
        }
        Ok(())
    }

    /// Writes whatever is still queued, the farewell included, before the
    /// writer is shut down.
    async fn flush_farewell<W>(&mut self, writer: &mut W) -> Result<CloseReason>
    where
        W: AsyncWrite + Unpin,
    {
        while let Ok(message) = self.outbox.try_recv() {
            if let Err(err) = write_line(writer, &message).await {
                warn!(peer = %self.key, error = ?err, "failed to deliver farewell");
                return Err(err.into());
            }
        }
        Ok(CloseReason::Quit)
    }

    async fn close(&mut self) {
        self.outbox.close();
        if let Some(identity) = self.directory.unregister(&self.key).await {
            debug!(peer = %self.key, identity = %identity, "released identity on disconnect");
        }
    }
}
