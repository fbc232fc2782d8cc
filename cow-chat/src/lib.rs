//! Multi-client cow chat over plain TCP text lines.
//!
//! See `README.md` for usage and the wire commands. Each module focuses on a
//! concrete responsibility:
//!
//! - [`cli`] parses the positional arguments of the server and client binaries.
//! - [`directory`] is the shared registry of connections, logged-in cows and
//!   the pool of cows still free to log in as.
//! - [`command`] turns one decoded wire line into a [`command::Command`].
//! - [`processor`] executes a command against the directory and queues the
//!   replies.
//! - [`session`] drives the per-connection duplex loop on the server.
//! - [`server`] accepts TCP connections and spawns one session per client.
//! - [`client`] is the terminal client: an interactive prompt thread feeding a
//!   network loop that mirrors the server session.
//! - [`cowsay`] renders text into speech bubbles said by a cow figure.
//! - [`message`] holds the newline framing helpers shared by both sides.
//! - [`telemetry`] installs the `tracing` subscriber used by the binaries.

pub mod cli;
pub mod client;
pub mod command;
pub mod cowsay;
pub mod directory;
pub mod message;
pub mod processor;
pub mod server;
pub mod session;
pub mod telemetry;
