//! Request handling for the file server.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine, owns the socket
//! - **`parser`**: Validates one request line
//! - **`request`**: Parsed request and the classified request error
//! - **`response`**: Response outcome and its wire encoding
//! - **`writer`**: Writes an encoded response to the client
//! - **`mime`**: Content type detection from the file name
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for one request line
//!        └──────┬──────┘
//!               │ Line received (or read error to report)
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← Parse, resolve, read the file
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │   Responding     │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent (or write failed)
//!               ▼
//!        ┌──────────────────┐
//!        │    Closing       │ ← Linger, then close the socket
//!        └──────────────────┘
//! ```
//!
//! A transport fault while reading skips straight to `Closing`.
//!
//! # Wire format
//!
//! ```text
//! GET /index.html HTTP/1.1
//!
//! HTTP/1.1 200 OK
//! Content-Type: text/html
//!
//! <file contents>
//! ```
//!
//! Errors are a single status line such as `HTTP/1.1 404 Not Found`.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
