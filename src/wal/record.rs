//! WAL Record definitions
//!
//! Defines the structure of individual WAL records and their line encoding.

use std::fmt;

use crate::error::{KvError, Result};

/// Prefix of every encoded record line
const LSN_PREFIX: &str = "LSN=";

const OP_SET: &str = "SET";
const OP_DELETE: &str = "DEL";

/// Operations that can be logged
///
/// This is what a caller hands to the WAL: a record without an LSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Set a key to a value
    Set { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    /// The key this operation mutates
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. } | Operation::Delete { key } => key,
        }
    }

    /// Check that the operation encodes to exactly one record line.
    ///
    /// Keys must be non-empty and free of whitespace. Values may contain
    /// spaces but no line breaks.
    pub fn validate(&self) -> Result<()> {
        let key = self.key();
        if key.is_empty() {
            return Err(KvError::Parse("key must not be empty".to_string()));
        }
        if key.contains(char::is_whitespace) {
            return Err(KvError::Parse(format!("key {:?} contains whitespace", key)));
        }
        if let Operation::Set { value, .. } = self {
            if value.contains(['\r', '\n']) {
                return Err(KvError::Parse(format!(
                    "value for key {:?} contains a line break",
                    key
                )));
            }
        }
        Ok(())
    }

    fn op_code(&self) -> &'static str {
        match self {
            Operation::Set { .. } => OP_SET,
            Operation::Delete { .. } => OP_DELETE,
        }
    }
}

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Log Sequence Number, assigned by the flush worker
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,
}

impl Record {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self { lsn, operation }
    }

    /// Append the encoded line (newline included) to `buf`.
    ///
    /// Format: `LSN=<lsn> <SET|DEL> <key> <value>\n`. The value of a `DEL`
    /// line is empty but its separator space is still written.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let value = match &self.operation {
            Operation::Set { value, .. } => value.as_str(),
            Operation::Delete { .. } => "",
        };

        buf.extend_from_slice(LSN_PREFIX.as_bytes());
        buf.extend_from_slice(self.lsn.to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.operation.op_code().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.operation.key().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
    }

    /// Encode to a freshly allocated buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.operation.key().len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode one line (without its trailing newline).
    ///
    /// Everything after the separator following the key is the value,
    /// taken verbatim, so values containing spaces survive a round trip.
    pub fn decode(line: &str) -> Result<Self> {
        let rest = line
            .strip_prefix(LSN_PREFIX)
            .ok_or_else(|| corrupt("missing LSN prefix", line))?;

        let (lsn, rest) = rest
            .split_once(' ')
            .ok_or_else(|| corrupt("missing operation", line))?;
        let lsn: u64 = lsn
            .parse()
            .map_err(|_| corrupt("invalid LSN", line))?;

        let (op, rest) = rest
            .split_once(' ')
            .ok_or_else(|| corrupt("missing key", line))?;

        let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
        if key.is_empty() {
            return Err(corrupt("empty key", line));
        }

        let operation = match op {
            OP_SET => Operation::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
            OP_DELETE => Operation::Delete {
                key: key.to_string(),
            },
            other => return Err(corrupt(&format!("unknown operation '{}'", other), line)),
        };

        Ok(Self { lsn, operation })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LSN={} {} {}",
            self.lsn,
            self.operation.op_code(),
            self.operation.key()
        )
    }
}

fn corrupt(reason: &str, line: &str) -> KvError {
    KvError::CorruptRecord(format!("{}: {:?}", reason, line))
}
