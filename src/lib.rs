//! filesrv - Concurrent static file server
//!
//! Serves files from a document root over a one-line `GET <path> HTTP/1.1`
//! protocol, one task per connection.

pub mod config;
pub mod http;
pub mod server;
