//! Terminal client.
//!
//! Two units of concurrency cooperate here:
//!
//! - a [`Prompt`] running on its own OS thread, blocked on stdin, which turns
//!   what the user types into wire commands;
//! - a [`Dispatcher`] on the tokio runtime, which multiplexes the socket and
//!   the queue of commands the prompt hands over through a [`CommandQueue`].
//!
//! The queue is an unbounded tokio channel: sending never blocks the prompt
//! and wakes the network loop from the other thread, and commands reach the
//! server in the order they were typed.

use std::{
    io::{self as stdio, BufRead, Write},
    thread,
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    cli::ClientArgs,
    message::{decode_line, line_source, write_line},
};

pub const PROMPT: &str = ">>> ";
pub const INTRO: &str = "Welcome to the chat. Please log in. Type help or ? to list commands.";

const HELP_TOPICS: &[(&str, &str)] = &[
    ("cows", "See available cows for login.\n\nFormat: cows"),
    ("exit", "Turn off client.\n\nFormat: exit"),
    ("help", "List commands, or show help for one of them.\n\nFormat: help [command]"),
    ("login", "Try to login as cow_name.\n\nFormat: login cow_name"),
    ("logout", "Log out and give your cow back.\n\nFormat: logout"),
    ("quit", "Log out and disconnect from server.\n\nFormat: quit"),
    ("say", "Send message directly to user.\n\nFormat: say dst_name message text"),
    ("who", "See logged users.\n\nFormat: who"),
    ("yield", "Send broadcast message to all logged users.\n\nFormat: yield message text"),
];

pub async fn run(args: ClientArgs) -> Result<()> {
    let addr = args.server_addr();
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    info!("connected to {addr}");

    let (reader, writer) = stream.into_split();
    let (queue, dispatcher) = dispatcher();
    spawn_prompt(queue).context("failed to start prompt thread")?;

    dispatcher
        .with_prompt(PROMPT)
        .run(BufReader::new(reader), writer, tokio::io::stdout())
        .await?;
    info!("dispatcher exiting");

    Ok(())
}

/// Starts the interactive prompt on a dedicated thread reading stdin.
///
/// The thread is detached: the process ends when the dispatcher does, even if
/// the prompt is still blocked on a read.
pub fn spawn_prompt(queue: CommandQueue) -> stdio::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("prompt".into())
        .spawn(move || {
            let stdin = stdio::stdin();
            if let Err(error) = Prompt::new(stdin.lock(), stdio::stdout(), queue).run() {
                warn!(?error, "prompt stopped");
            }
        })
}

/// Creates a linked command queue and dispatcher.
pub fn dispatcher() -> (CommandQueue, Dispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CommandQueue { tx },
        Dispatcher {
            outbound: rx,
            prompt: None,
        },
    )
}

/// Cloneable, thread-safe producer side of the dispatcher's outbound queue.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandQueue {
    /// Queues a wire command. Returns `false` once the dispatcher is gone.
    pub fn push(&self, command: impl Into<String>) -> bool {
        self.tx.send(command.into()).is_ok()
    }
}

enum Event {
    Inbound(Option<Vec<u8>>),
    Outbound(Option<String>),
}

/// Client-side duplex loop: prints what the server sends and writes what the
/// prompt queues.
pub struct Dispatcher {
    outbound: mpsc::UnboundedReceiver<String>,
    prompt: Option<&'static str>,
}

impl Dispatcher {
    /// Reprints `prompt` after every displayed line so the user keeps a
    /// visible input cursor while messages arrive.
    pub fn with_prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Runs until the server closes the connection.
    ///
    /// When every [`CommandQueue`] has been dropped the loop keeps reading so
    /// that replies to the last commands (the farewell included) still show.
    pub async fn run<R, W, D>(mut self, reader: R, mut writer: W, mut display: D) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        D: AsyncWrite + Unpin,
    {
        let mut lines = line_source(reader);
        let mut outbound_open = true;

        loop {
            let event = select! {
                segment = lines.next_segment() => Event::Inbound(segment?),
                command = self.outbound.recv(), if outbound_open => Event::Outbound(command),
            };

            match event {
                Event::Inbound(Some(segment)) => self.show(&mut display, &segment).await?,
                Event::Inbound(None) => break,
                Event::Outbound(Some(command)) => write_line(&mut writer, &command)
                    .await
                    .context("failed to send command")?,
                Event::Outbound(None) => {
                    debug!("command queue closed");
                    outbound_open = false;
                }
            }
        }

        display
            .write_all(b"\r*** server closed the connection\n")
            .await?;
        display.flush().await?;
        if let Err(error) = writer.shutdown().await {
            debug!(?error, "failed to shutdown client writer cleanly");
        }
        Ok(())
    }

    async fn show<D>(&self, display: &mut D, segment: &[u8]) -> stdio::Result<()>
    where
        D: AsyncWrite + Unpin,
    {
        let line = match decode_line(segment) {
            Ok(line) => line.to_string(),
            Err(_) => String::from_utf8_lossy(segment).into_owned(),
        };

        let rendered = match self.prompt {
            Some(prompt) => format!("\r{line}\n{prompt}"),
            None => format!("{line}\n"),
        };
        display.write_all(rendered.as_bytes()).await?;
        display.flush().await
    }
}

/// What one line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    /// Queue this wire command and keep prompting.
    Send(String),
    /// Queue this wire command and stop prompting.
    Leave(String),
    Help(Option<String>),
    Unknown(String),
    Nothing,
}

impl PromptAction {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return PromptAction::Nothing;
        }
        if let Some(topic) = line.strip_prefix('?') {
            return PromptAction::Help(non_empty(topic));
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword {
            "cows" | "logout" | "who" => PromptAction::Send(keyword.to_string()),
            "login" | "say" | "yield" => PromptAction::Send(format!("{keyword} {rest}")),
            "quit" | "exit" => PromptAction::Leave("quit".to_string()),
            "help" => PromptAction::Help(non_empty(rest)),
            _ => PromptAction::Unknown(line.to_string()),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Line-oriented interactive shell feeding a [`CommandQueue`].
pub struct Prompt<I, O> {
    input: I,
    output: O,
    queue: CommandQueue,
}

impl<I, O> Prompt<I, O>
where
    I: BufRead,
    O: Write,
{
    pub fn new(input: I, output: O, queue: CommandQueue) -> Self {
        Self {
            input,
            output,
            queue,
        }
    }

    /// Reads commands until `quit`/`exit` or end of input. End of input is
    /// treated as `quit` so the server still releases the cow.
    pub fn run(mut self) -> stdio::Result<()> {
        writeln!(self.output, "{INTRO}")?;
        let mut line = String::new();

        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                self.queue.push("quit");
                return Ok(());
            }

            match PromptAction::parse(&line) {
                PromptAction::Send(command) => {
                    if !self.queue.push(command) {
                        return Ok(());
                    }
                }
                PromptAction::Leave(command) => {
                    self.queue.push(command);
                    return Ok(());
                }
                PromptAction::Help(topic) => self.help(topic.as_deref())?,
                PromptAction::Unknown(line) => {
                    writeln!(self.output, "*** Unknown syntax: {line}")?
                }
                PromptAction::Nothing => {}
            }
        }
    }

    fn help(&mut self, topic: Option<&str>) -> stdio::Result<()> {
        let Some(topic) = topic else {
            let header = "Documented commands (type help <topic>):";
            let names: Vec<&str> = HELP_TOPICS.iter().map(|(name, _)| *name).collect();
            writeln!(self.output)?;
            writeln!(self.output, "{header}")?;
            writeln!(self.output, "{}", "=".repeat(header.len()))?;
            writeln!(self.output, "{}", names.join("  "))?;
            return writeln!(self.output);
        };

        match HELP_TOPICS.iter().find(|(name, _)| *name == topic) {
            Some((_, text)) => writeln!(self.output, "{text}"),
            None => writeln!(self.output, "*** No help on {topic}"),
        }
    }
}
