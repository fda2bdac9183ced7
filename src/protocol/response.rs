//! Response definitions
//!
//! Represents responses to clients.

use std::fmt;

/// Text sent for a successful mutation
pub const OK: &str = "OK";

/// Text sent when a key does not exist
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Prefix of error lines
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Successful outcome of a command.
///
/// A missing key is a normal outcome for both `GET` and `DEL`, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `SET` applied
    Stored,

    /// `DEL` removed an existing key
    Deleted,

    /// `GET` found a value
    ///
    /// Sent verbatim with no framing, so a stored value that reads
    /// `NOT_FOUND` or starts with `ERROR: ` looks the same on the wire as a
    /// miss or an error. Clients that need to tell them apart must avoid
    /// storing such values.
    Value(String),

    /// `GET` or `DEL` on an absent key
    NotFound,
}

impl Response {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Response::NotFound)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Stored | Response::Deleted => f.write_str(OK),
            Response::Value(value) => f.write_str(value),
            Response::NotFound => f.write_str(NOT_FOUND),
        }
    }
}
