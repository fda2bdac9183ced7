//! Protocol Module
//!
//! Defines the line protocol for client-server communication.
//!
//! ## Request Format
//! One command per `\n`-terminated line:
//! ```text
//! SET <key> <value...>
//! GET <key>
//! DEL <key>
//! ```
//!
//! ## Response Format
//! One line per request:
//! ```text
//! OK                  SET, or DEL of an existing key
//! <value>             GET hit
//! NOT_FOUND           GET or DEL miss
//! ERROR: <message>    parse, WAL or server error
//! ```
//!
//! Values are not escaped or prefixed: a value equal to `NOT_FOUND`, or one
//! starting with `ERROR: `, cannot be told apart from those replies.

mod command;
mod response;

pub use command::{Command, CommandType};
pub use response::{Response, ERROR_PREFIX, NOT_FOUND, OK};
