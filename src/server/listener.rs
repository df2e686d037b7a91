//! Listening socket and accept loop
//!
//! The accept loop runs as its own task and spawns one task per accepted
//! connection without waiting for it. Stopping the server cancels the accept
//! loop and closes the listening socket; connections already accepted are
//! left to finish on their own timeouts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::server::tracker::ActiveConnections;

/// Pause after a failed accept so a persistent fault does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

pub struct Server {
    /// Present until `start` moves it into the accept task
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    active: ActiveConnections,
    shutdown: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    settings: Arc<ConnectionSettings>,
    accept_timeout: Duration,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until [`Server::start`].
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let addr = cfg.server.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            closed: Arc::new(AtomicBool::new(false)),
            active: ActiveConnections::new(),
            shutdown,
            accept_task: None,
            settings: Arc::new(ConnectionSettings::from_config(cfg)),
            accept_timeout: cfg.server.op_timeout(),
        })
    }

    /// Launches the accept loop and returns immediately.
    ///
    /// Does nothing once the server is closed or already started.
    pub fn start(&mut self) {
        if self.is_closed() {
            return;
        }
        let Some(listener) = self.listener.take() else {
            return;
        };

        let accept_loop = AcceptLoop {
            listener,
            shutdown: self.shutdown.subscribe(),
            closed: Arc::clone(&self.closed),
            active: self.active.clone(),
            settings: Arc::clone(&self.settings),
            accept_timeout: self.accept_timeout,
        };

        info!(root = %self.settings.root.display(), "Serving files");
        self.accept_task = Some(tokio::spawn(accept_loop.run()));
    }

    /// Stops accepting and closes the listening socket.
    ///
    /// Returns once the accept loop has exited, so no connection is accepted
    /// afterwards. In-flight connections are not waited for. Calling it
    /// again is a no-op.
    pub async fn stop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // No receivers left only means the accept loop is already gone
        let _ = self.shutdown.send(true);

        // Never started: the socket is still ours to close
        drop(self.listener.take());

        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!("Accept loop ended abnormally: {}", e);
            }
        }

        info!(
            active = self.active.count(),
            "Server stopped on {}", self.local_addr
        );
    }

    /// Same as [`Server::stop`].
    pub async fn close(&mut self) {
        self.stop().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connection handlers currently alive.
    pub fn active_connections(&self) -> usize {
        self.active.count()
    }

    /// Starts the server, waits for `signal`, then stops it.
    pub async fn serve_until<F>(mut self, signal: F)
    where
        F: Future<Output = ()>,
    {
        self.start();
        signal.await;
        self.stop().await;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.shutdown.send(true);
            if let Some(task) = self.accept_task.take() {
                task.abort();
            }
        }
    }
}

struct AcceptLoop {
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
    closed: Arc<AtomicBool>,
    active: ActiveConnections,
    settings: Arc<ConnectionSettings>,
    accept_timeout: Duration,
}

impl AcceptLoop {
    async fn run(mut self) {
        loop {
            if self.closed.load(Ordering::Acquire) || *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                // Err means the server was dropped
                _ = self.shutdown.changed() => break,

                res = timeout(self.accept_timeout, self.listener.accept()) => match res {
                    Ok(Ok((stream, peer))) => {
                        debug!("Accepted connection from {}", peer);

                        let guard = self.active.acquire();
                        let settings = Arc::clone(&self.settings);
                        tokio::spawn(async move {
                            let conn = Connection::new(stream, peer, settings, guard);
                            if let Err(e) = conn.run().await {
                                warn!("Connection error from {}: {:#}", peer, e);
                            }
                        });
                    }
                    Ok(Err(e)) => {
                        debug!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    Err(_) => {
                        // Nothing arrived this round
                    }
                }
            }
        }

        debug!("Accept loop finished, closing listener");
    }
}

/// Binds, serves until Ctrl-C or the configured run duration, then stops.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let server = Server::bind(cfg).await?;
    let run_for = cfg.server.run_for();

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server
        .serve_until(async move {
            tokio::select! {
                _ = ctrl_c => info!("Shutdown signal received"),
                _ = sleep_for(run_for) => info!("Run duration elapsed"),
            }
        })
        .await;

    Ok(())
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}
