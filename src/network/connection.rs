//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::ERROR_PREFIX;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,

    /// Longest accepted request line, newline excluded
    max_message_size: usize,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, engine: Arc<Engine>, max_message_size: usize) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
            max_message_size,
        })
    }

    /// Close the connection after `timeout` without a request.
    ///
    /// A zero timeout disables the limit.
    pub fn set_idle_timeout(&mut self, timeout: Duration) -> Result<()> {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads request lines in a loop and sends one response line each.
    /// Returns when the client disconnects, idles out, or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let request = match self.read_request() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    // Read timeout (Windows uses TimedOut instead of WouldBlock)
                    tracing::debug!("Idle timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    tracing::debug!("Connection closed by client {}: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e @ KvError::Protocol(_)) => {
                    tracing::warn!("Closing connection to {}: {}", self.peer_addr, e);
                    let _ = self.send_line(&format!("{}{}", ERROR_PREFIX, e));
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let reply = match std::str::from_utf8(&request) {
                Ok(line) => {
                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    tracing::trace!("Received request from {}: {:?}", self.peer_addr, line);
                    self.execute_request(line)
                }
                Err(_) => format!("{}request is not valid UTF-8", ERROR_PREFIX),
            };

            if let Err(e) = self.send_line(&reply) {
                // If the client disconnected before we could send the response
                // (e.g. connection abort/reset/broken pipe), log and exit gracefully
                // rather than treating it as a server error.
                if let KvError::Io(ref io_err) = e {
                    match io_err.kind() {
                        io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::BrokenPipe => {
                            tracing::debug!(
                                "Client {} disconnected before response could be sent: {}",
                                self.peer_addr,
                                e
                            );
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Read one request line, newline included.
    ///
    /// Returns `None` on a clean end of stream and a protocol error when the
    /// line is longer than `max_message_size`.
    fn read_request(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let limit = self.max_message_size as u64 + 1;

        let read = (&mut self.reader).take(limit).read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() != Some(&b'\n') && buf.len() > self.max_message_size {
            return Err(KvError::Protocol(format!(
                "message exceeds {} bytes",
                self.max_message_size
            )));
        }

        Ok(Some(buf))
    }

    /// Run a request through the engine and render the reply line
    fn execute_request(&self, line: &str) -> String {
        match self.engine.process(line) {
            Ok(response) => response.to_string(),
            Err(e) => format!("{}{}", ERROR_PREFIX, e),
        }
    }

    /// Send one response line to the client
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
