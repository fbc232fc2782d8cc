use tracing::debug;

use crate::{
    command::Command,
    cowsay,
    directory::{Directory, LoginError, SendError},
};

pub const WRONG_COMMAND: &str = "Wrong command";
pub const FAREWELL: &str = "Bye bye!";
pub const LOGGED_OUT: &str = "Successfully logged out";
pub const LOGIN_FIRST: &str = "Error: login before chatting!";

/// Tag used for broadcasts from connections that never logged in.
const ANONYMOUS: &str = "anonymous";

/// What the session should do after a command has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Executes `command` on behalf of connection `key`.
///
/// Replies go through the issuer's own outbound queue, so they are delivered
/// in order with everything else queued for that connection.
pub async fn process(directory: &Directory, key: &str, command: Command) -> Flow {
    match command {
        Command::Cows => handle_cows(directory, key).await,
        Command::Who => handle_who(directory, key).await,
        Command::Login { identity } => handle_login(directory, key, &identity).await,
        Command::Logout => handle_logout(directory, key).await,
        Command::Say { destination, text } => handle_say(directory, key, &destination, &text).await,
        Command::Yield { text } => handle_yield(directory, key, &text).await,
        Command::Quit => {
            handle_quit(directory, key).await;
            return Flow::Close;
        }
        Command::Empty => {}
        Command::Unknown => directory.send_to(key, WRONG_COMMAND).await,
    }
    Flow::Continue
}

async fn handle_cows(directory: &Directory, key: &str) {
    let available = directory.list_available().await;
    directory
        .send_to(key, format!("Available: {}", available.join(" | ")))
        .await;
}

async fn handle_who(directory: &Directory, key: &str) {
    let logged = directory.list_logged().await;
    directory
        .send_to(key, format!("Logged: {}", logged.join(" | ")))
        .await;
}

async fn handle_login(directory: &Directory, key: &str, identity: &str) {
    let reply = match directory.login(key, identity).await {
        Ok(()) => format!("Successfully logged as {identity}"),
        Err(LoginError::AlreadyLoggedIn(current)) => {
            format!("Warning: already logged as {current}, logout first")
        }
        Err(LoginError::IdentityTaken(identity)) => format!("Cow '{identity}' is not available"),
        Err(LoginError::NotRegistered(_)) => {
            debug!(peer = %key, identity, "login from a connection that is already gone");
            return;
        }
    };
    directory.send_to(key, reply).await;
}

async fn handle_logout(directory: &Directory, key: &str) {
    directory.logout(key).await;
    directory.send_to(key, LOGGED_OUT).await;
}

async fn handle_say(directory: &Directory, key: &str, destination: &str, text: &str) {
    let Some(sender) = directory.identity_of(key).await else {
        directory.send_to(key, LOGIN_FIRST).await;
        return;
    };

    let message = format!("({sender}, private)\n{}", cowsay::render(text, &sender));
    if let Err(SendError::NotLogged(destination)) =
        directory.send_to_identity(destination, message).await
    {
        directory
            .send_to(key, format!("Error: {destination} is not logged!"))
            .await;
    }
}

async fn handle_yield(directory: &Directory, key: &str, text: &str) {
    let sender = directory.identity_of(key).await;
    let (tag, figure) = match &sender {
        Some(identity) => (identity.as_str(), identity.as_str()),
        None => (ANONYMOUS, cowsay::DEFAULT_FIGURE),
    };

    let message = format!("({tag}, global)\n{}", cowsay::render(text, figure));
    directory.broadcast(key, message).await;
}

async fn handle_quit(directory: &Directory, key: &str) {
    if let Some(identity) = directory.logout(key).await {
        debug!(peer = %key, identity = %identity, "released identity on quit");
    }
    directory.send_to(key, FAREWELL).await;
}
