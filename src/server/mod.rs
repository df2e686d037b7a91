//! Listener and connection bookkeeping.

pub mod listener;
pub mod tracker;

pub use listener::Server;
pub use tracker::{ActiveConnections, ConnectionGuard};
