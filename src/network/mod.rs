//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread with a connection-count gate
//! - One thread per client connection, each with an idle timeout
//! - Requests routed through Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
