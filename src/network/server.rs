//! TCP Server
//!
//! Accepts connections and dispatches each to its own thread.

use std::collections::HashMap;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::NetworkConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::ERROR_PREFIX;

use super::connection::Connection;

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for walkv
///
/// ## Concurrency:
/// - One accept loop (the thread calling `run`)
/// - One thread per admitted client
/// - At most `max_connections` clients at once; extra clients are told so
///   and disconnected
pub struct Server {
    config: NetworkConfig,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,

    /// Handles to open client sockets, used to unblock readers on shutdown
    clients: Arc<Mutex<HashMap<u64, TcpStream>>>,
}

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Server {
    /// Bind the listener; no connection is accepted until `run`
    pub fn bind(config: &NetworkConfig, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.address)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config: config.clone(),
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            clients: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Number of clients currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Start the server (blocking until shutdown is signaled)
    ///
    /// On shutdown, open client sockets are closed and their threads joined
    /// before returning.
    pub fn run(&self) -> Result<()> {
        tracing::info!("TCP server listening on {}", self.local_addr()?);

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut next_id: u64 = 0;

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    workers.retain(|worker| !worker.is_finished());
                    next_id += 1;
                    if let Some(worker) = self.admit(next_id, stream, peer) {
                        workers.push(worker);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        let open: Vec<TcpStream> = self.clients.lock().drain().map(|(_, s)| s).collect();
        tracing::info!("Server shutting down, closing {} connections", open.len());
        for stream in open {
            let _ = stream.shutdown(Shutdown::Both);
        }
        for worker in workers {
            let _ = worker.join();
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Take a connection slot and spawn the handler, or turn the client away
    fn admit(&self, id: u64, stream: TcpStream, peer: SocketAddr) -> Option<JoinHandle<()>> {
        // Accepted sockets may inherit non-blocking mode from the listener
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping connection from {}: {}", peer, e);
            return None;
        }

        let slot = match ConnectionSlot::acquire(&self.active, self.config.max_connections) {
            Some(slot) => slot,
            None => {
                tracing::warn!("Too many connections, rejecting client {}", peer);
                reject(stream);
                return None;
            }
        };

        match stream.try_clone() {
            Ok(handle) => {
                self.clients.lock().insert(id, handle);
            }
            Err(e) => {
                tracing::warn!("Dropping connection from {}: {}", peer, e);
                return None;
            }
        }

        let engine = Arc::clone(&self.engine);
        let clients = Arc::clone(&self.clients);
        let max_message_size = self.config.max_message_size;
        let idle_timeout = self.config.idle_timeout;

        let spawned = thread::Builder::new()
            .name(format!("walkv-conn-{}", id))
            .spawn(move || {
                let _slot = slot;
                let result = Connection::new(stream, engine, max_message_size).and_then(|mut conn| {
                    conn.set_idle_timeout(idle_timeout)?;
                    conn.handle()
                });
                if let Err(e) = result {
                    tracing::warn!("Connection {} ended with error: {}", peer, e);
                }
                clients.lock().remove(&id);
            });

        match spawned {
            Ok(worker) => Some(worker),
            Err(e) => {
                tracing::error!("Failed to spawn handler for {}: {}", peer, e);
                if let Some(stream) = self.clients.lock().remove(&id) {
                    let _ = stream.shutdown(Shutdown::Both);
                }
                None
            }
        }
    }
}

/// Best-effort refusal message before closing
fn reject(mut stream: TcpStream) {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(1)));
    let _ = writeln!(stream, "{}too many connections", ERROR_PREFIX);
    let _ = stream.shutdown(Shutdown::Both);
}

/// One unit of the connection-count gate, released on drop
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        let previous = active.fetch_add(1, Ordering::AcqRel);
        if previous >= max {
            active.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
