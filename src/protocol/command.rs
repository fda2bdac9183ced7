//! Command definitions
//!
//! Represents commands from clients and parses them from request lines.

use crate::error::{KvError, Result};
use crate::wal::Operation;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Set,
    Get,
    Delete,
}

impl CommandType {
    /// Whether commands of this type must go through the WAL
    pub fn is_mutating(self) -> bool {
        matches!(self, CommandType::Set | CommandType::Delete)
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a key to a value
    Set { key: String, value: String },

    /// Get a value by key
    Get { key: String },

    /// Delete a key
    Delete { key: String },
}

impl Command {
    /// Parse one request line.
    ///
    /// ```text
    /// SET <key> <value...>   value is the rest of the line
    /// GET <key>
    /// DEL <key>
    /// ```
    ///
    /// Command names are case-insensitive. Keys are single tokens; a `SET`
    /// value keeps any inner and trailing whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let line = input.trim_end_matches(['\r', '\n']);
        if line.contains(['\r', '\n']) {
            return Err(KvError::Parse("command must be a single line".to_string()));
        }

        let (name, rest) = next_token(line);
        if name.is_empty() {
            return Err(KvError::Parse("empty command".to_string()));
        }

        match name.to_ascii_uppercase().as_str() {
            "SET" => {
                let (key, value) = next_token(rest);
                if key.is_empty() || value.is_empty() {
                    return Err(KvError::Parse(
                        "SET command requires 2 arguments: key and value".to_string(),
                    ));
                }
                Ok(Command::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "GET" => Ok(Command::Get {
                key: single_key("GET", rest)?,
            }),
            "DEL" => Ok(Command::Delete {
                key: single_key("DEL", rest)?,
            }),
            _ => Err(KvError::UnknownCommand(name.to_string())),
        }
    }

    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Set { .. } => CommandType::Set,
            Command::Get { .. } => CommandType::Get,
            Command::Delete { .. } => CommandType::Delete,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } | Command::Get { key } | Command::Delete { key } => key,
        }
    }

    /// The WAL operation for a mutating command, `None` for reads
    pub fn to_operation(&self) -> Option<Operation> {
        match self {
            Command::Set { key, value } => Some(Operation::Set {
                key: key.clone(),
                value: value.clone(),
            }),
            Command::Delete { key } => Some(Operation::Delete { key: key.clone() }),
            Command::Get { .. } => None,
        }
    }
}

impl From<Operation> for Command {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Set { key, value } => Command::Set { key, value },
            Operation::Delete { key } => Command::Delete { key },
        }
    }
}

/// Split off the first whitespace-delimited token.
///
/// Returns the token and the remainder with its leading whitespace removed.
fn next_token(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim_start()),
        None => (input, ""),
    }
}

fn single_key(name: &str, args: &str) -> Result<String> {
    let (key, extra) = next_token(args);
    if key.is_empty() || !extra.trim().is_empty() {
        return Err(KvError::Parse(format!(
            "{} command requires 1 argument: key",
            name
        )));
    }
    Ok(key.to_string())
}
