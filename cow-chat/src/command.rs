use crate::message::decode_line;

/// One wire command sent by a client.
///
/// The keyword is case-sensitive and the arity is exact: `login milk extra`
/// is as wrong as `LOGIN milk`. Free text (`say`, `yield`) is re-joined with
/// single spaces, so runs of whitespace in a message collapse to one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cows,
    Who,
    Login { identity: String },
    Logout,
    Say { destination: String, text: String },
    Yield { text: String },
    Quit,
    Empty,
    Unknown,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Command::Empty,
            ["cows"] => Command::Cows,
            ["who"] => Command::Who,
            ["login", identity] => Command::Login {
                identity: identity.to_string(),
            },
            ["logout"] => Command::Logout,
            ["say", destination, text @ ..] => Command::Say {
                destination: destination.to_string(),
                text: text.join(" "),
            },
            ["yield", text @ ..] => Command::Yield {
                text: text.join(" "),
            },
            ["quit"] => Command::Quit,
            _ => Command::Unknown,
        }
    }

    /// Parses a raw wire segment. Bytes that are not UTF-8 count as an
    /// unrecognised command rather than a transport failure.
    pub fn decode(segment: &[u8]) -> Self {
        match decode_line(segment) {
            Ok(line) => Command::parse(line),
            Err(_) => Command::Unknown,
        }
    }
}
