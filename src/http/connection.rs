use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::http::mime::ContentType;
use crate::http::parser::parse_request_line;
use crate::http::request::{Request, RequestError};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::tracker::ConnectionGuard;

/// Longest request line accepted before the request is rejected.
pub const MAX_REQUEST_LINE: usize = 8 * 1024;

/// Caps how much trailing input is drained before closing.
const DISCARD_ROUNDS: usize = 16;

/// Per-connection settings shared by every handler of one server.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Document root
    pub root: PathBuf,
    /// Bounds reading the request line and writing the response
    pub op_timeout: Duration,
    /// Delay before the socket is closed
    pub linger: Duration,
}

impl ConnectionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            root: cfg.static_files.root.clone(),
            op_timeout: cfg.server.op_timeout(),
            linger: cfg.server.linger(),
        }
    }
}

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    settings: Arc<ConnectionSettings>,
    fault: Option<anyhow::Error>,
    // Declared last: released only after the stream above has been dropped
    _guard: ConnectionGuard,
}

#[derive(Debug)]
pub enum ConnectionState {
    Reading,
    Dispatching(String),
    Responding(Response),
    Closing,
    Closed,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        settings: Arc<ConnectionSettings>,
        guard: ConnectionGuard,
    ) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(1024),
            state: ConnectionState::Reading,
            settings,
            fault: None,
            _guard: guard,
        }
    }

    /// Drives the connection through every state to `Closed`.
    ///
    /// `Closing` is reached on every path. A transport fault that cut the
    /// exchange short is returned once the socket is closed; the connection
    /// never fails in any other way.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            self.state = match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request_line().await {
                    Ok(Ok(line)) => ConnectionState::Dispatching(line),
                    Ok(Err(err)) => ConnectionState::Responding(err.into()),
                    Err(e) => {
                        self.fault = Some(e);
                        ConnectionState::Closing
                    }
                },

                ConnectionState::Dispatching(line) => {
                    ConnectionState::Responding(self.dispatch(&line).await)
                }

                ConnectionState::Responding(response) => {
                    self.respond(&response).await;
                    ConnectionState::Closing
                }

                ConnectionState::Closing => {
                    self.close().await;
                    ConnectionState::Closed
                }

                ConnectionState::Closed => break,
            };
        }

        match self.fault.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reads up to and including the first `\n`.
    ///
    /// The outer error is a transport fault; the inner one is answered to the
    /// client.
    async fn read_request_line(&mut self) -> anyhow::Result<Result<String, RequestError>> {
        match timeout(self.settings.op_timeout, self.fill_line()).await {
            Ok(res) => res,
            Err(_) => {
                tracing::debug!(peer = %self.peer, "Timed out waiting for request line");
                Ok(Err(RequestError::new("Request timed out")))
            }
        }
    }

    async fn fill_line(&mut self) -> anyhow::Result<Result<String, RequestError>> {
        loop {
            let newline = self.buffer.iter().position(|&b| b == b'\n');
            if newline.unwrap_or(self.buffer.len()) > MAX_REQUEST_LINE {
                return Ok(Err(RequestError::new("Request line too long")));
            }

            if let Some(end) = newline {
                let line = self.buffer.split_to(end + 1);
                return Ok(Ok(String::from_utf8_lossy(&line).into_owned()));
            }

            self.buffer.reserve(1024);
            let n = self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .context("Failed to read request line")?;

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(Err(RequestError::connection_closed()));
                }
                // Peer closed without a line break; what arrived is the line
                let line = self.buffer.split();
                return Ok(Ok(String::from_utf8_lossy(&line).into_owned()));
            }
        }
    }

    async fn dispatch(&self, line: &str) -> Response {
        let request = match parse_request_line(line) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(peer = %self.peer, error = %err, "Malformed request");
                return err.into();
            }
        };

        tracing::debug!(peer = %self.peer, path = %request.path, "Request received");

        match serve_file(&self.settings.root, &request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(peer = %self.peer, path = %request.path, "Not found");
                err.into()
            }
        }
    }

    async fn respond(&mut self, response: &Response) {
        tracing::debug!(
            peer = %self.peer,
            status = response.status().as_u16(),
            "Sending response"
        );

        let mut writer = ResponseWriter::new(response);
        match timeout(self.settings.op_timeout, writer.write_to_stream(&mut self.stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fault = Some(e.context("Failed to write response")),
            Err(_) => {
                self.fault = Some(anyhow::anyhow!(
                    "Timed out writing response, {} bytes unsent",
                    writer.remaining()
                ));
            }
        }
    }

    async fn close(&mut self) {
        tokio::time::sleep(self.settings.linger).await;

        // Unread input would turn the close into a reset and may cost the
        // peer the response
        self.discard_unread();

        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(peer = %self.peer, error = %e, "Shutdown failed");
        }
        tracing::debug!(peer = %self.peer, "Closing connection");
    }

    fn discard_unread(&mut self) {
        let mut scratch = [0u8; 1024];
        for _ in 0..DISCARD_ROUNDS {
            match self.stream.try_read(&mut scratch) {
                Ok(n) if n > 0 => continue,
                _ => break,
            }
        }
    }
}

/// Resolves `request` against `root` and reads the file behind it.
///
/// Anything that is not a readable regular file is a 404.
pub async fn serve_file(root: &Path, request: &Request) -> Result<Response, RequestError> {
    let path = request.resolve(root)?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| RequestError::not_found())?;
    if !metadata.is_file() {
        return Err(RequestError::not_found());
    }

    let body = tokio::fs::read(&path)
        .await
        .map_err(|_| RequestError::not_found())?;

    Ok(Response::ok(body, ContentType::for_path(&path)))
}
