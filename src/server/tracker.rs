//! Active connection accounting
//!
//! The count is observability only; it never gates admission.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter of connection handlers currently alive.
#[derive(Debug, Clone, Default)]
pub struct ActiveConnections {
    count: Arc<AtomicUsize>,
}

impl ActiveConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more connection. The returned guard gives it back when
    /// dropped.
    pub fn acquire(&self) -> ConnectionGuard {
        self.count.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

/// Held by a connection handler for its whole life.
#[derive(Debug)]
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
