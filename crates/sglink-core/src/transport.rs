//! Transport trait for signal generator communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the board.
//! The serial implementation lives in `sglink-transport`; a scripted mock
//! for tests lives in `sglink-test-harness`.
//!
//! The shape follows the readiness model of a buffered serial port: a write
//! either completes within a deadline or is left pending, and reading is a
//! two-step "wait until bytes are available, then take everything that is
//! buffered". The line framer in `sglink-isc` drives exactly one exchange at
//! a time through `&mut` access, so implementations need no locking.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a signal generator board.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying port. Opening an already-open transport is a no-op.
    async fn open(&mut self) -> Result<()>;

    /// Close the underlying port. Closing a closed transport is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Whether the port is currently open.
    fn is_open(&self) -> bool;

    /// Write `data` and wait up to `timeout` for it to leave the host.
    ///
    /// Returns `Ok(true)` if the write was acknowledged within `timeout`,
    /// `Ok(false)` if it is still pending. Returns
    /// [`Error::NotConnected`](crate::error::Error::NotConnected) when the
    /// port is closed.
    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool>;

    /// Wait up to `timeout` for inbound bytes to become available.
    ///
    /// Returns `Ok(false)` when the timeout elapses with nothing buffered.
    async fn wait_for_data(&mut self, timeout: Duration) -> Result<bool>;

    /// Take every byte currently buffered. May return an empty vector.
    async fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Human-readable name of the port, for logging.
    fn name(&self) -> &str {
        "transport"
    }
}
