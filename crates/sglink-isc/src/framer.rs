//! Line framer: one write-then-collect exchange with the board.
//!
//! [`exchange`] writes a command frame, then keeps reading until the reply
//! is complete, the board reports an error, or the port goes away. The raw
//! reply buffer belongs to the exchange and is handed back inside the
//! [`ExchangeOutcome`].
//!
//! Completion is decided on the accumulated text after every read:
//!
//! 1. the error token `ERR` anywhere in the buffer ends the exchange with
//!    [`ExchangeOutcome::ErrorToken`], even if the terminator arrived in the
//!    same read;
//! 2. otherwise the terminator (`\r\n` or `OK\r\n`) ends it with
//!    [`ExchangeOutcome::Complete`];
//! 3. otherwise a closed port ends it with [`ExchangeOutcome::PortClosed`].
//!
//! Bytes already waiting on the port when an exchange starts belong to an
//! earlier reply (for example the tail of a line cut short by `ERR`) and
//! are discarded before the command is written.
//!
//! There is no iteration cap. Without a deadline in [`ExchangeTiming`] the
//! loop waits as long as the board stays connected and silent; a deadline
//! turns that into [`ExchangeOutcome::Timeout`] with the partial text.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use sglink_core::error::{Error, Result};
use sglink_core::events::{DeviceEvent, LogLine};
use sglink_core::transport::Transport;

use crate::protocol::{Command, ERROR_TOKEN};

/// How one exchange may spend its time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTiming {
    /// How long a write may take before it counts as unacknowledged.
    pub write_timeout: Duration,
    /// How long each read waits for new bytes.
    pub read_timeout: Duration,
    /// Upper bound on the whole read phase. `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for ExchangeTiming {
    fn default() -> Self {
        ExchangeTiming {
            write_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_millis(500),
            deadline: None,
        }
    }
}

/// How an exchange ended. Exactly one per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The terminator arrived. Carries the whole reply.
    Complete(String),
    /// The board embedded `ERR` in its reply. Carries everything read.
    ErrorToken(String),
    /// The deadline passed first. Carries the partial reply.
    Timeout(String),
    /// The port was closed before or during the exchange.
    PortClosed,
}

impl ExchangeOutcome {
    /// Reply text, if the exchange got as far as reading.
    pub fn text(&self) -> Option<&str> {
        match self {
            ExchangeOutcome::Complete(text)
            | ExchangeOutcome::ErrorToken(text)
            | ExchangeOutcome::Timeout(text) => Some(text),
            ExchangeOutcome::PortClosed => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ExchangeOutcome::Complete(_))
    }

    /// The complete reply, or the matching [`Error`].
    ///
    /// [`Error::Timeout`] carries no text. The partial reply of a timed-out
    /// exchange is still published as the inbound [`DeviceEvent::Log`] line,
    /// and [`text()`](Self::text) returns it before conversion.
    pub fn into_result(self) -> Result<String> {
        match self {
            ExchangeOutcome::Complete(text) => Ok(text),
            ExchangeOutcome::ErrorToken(text) => Err(Error::DeviceError(text)),
            ExchangeOutcome::Timeout(_) => Err(Error::Timeout),
            ExchangeOutcome::PortClosed => Err(Error::NotConnected),
        }
    }
}

/// Upper bound on reads spent draining stale input, so a board that keeps
/// talking cannot stall an exchange before its write.
const MAX_STALE_READS: usize = 32;

/// Drop whatever is already buffered or pending on the port.
///
/// Returns the number of bytes dropped.
async fn discard_stale_input(transport: &mut dyn Transport) -> Result<usize> {
    let mut dropped = 0;
    for _ in 0..MAX_STALE_READS {
        if !transport.wait_for_data(Duration::ZERO).await? {
            break;
        }
        let stale = transport.read_available().await?;
        if stale.is_empty() {
            break;
        }
        trace!(
            port = transport.name(),
            bytes = stale.len(),
            data = ?String::from_utf8_lossy(&stale),
            "discarding stale input"
        );
        dropped += stale.len();
    }
    Ok(dropped)
}

fn emit(events: &broadcast::Sender<DeviceEvent>, line: LogLine) {
    // No subscribers is fine.
    let _ = events.send(DeviceEvent::Log(line));
}

/// Run one exchange: write `command`, collect the reply until `terminator`.
///
/// Emits the outbound line (only if the write was acknowledged) and the
/// final inbound text as [`DeviceEvent::Log`] on `events`.
///
/// A read failure other than the port disappearing closes the transport,
/// so the exchange ends as [`ExchangeOutcome::PortClosed`] and the caller
/// has to reconnect.
pub async fn exchange(
    transport: &mut dyn Transport,
    command: &Command,
    terminator: &str,
    timing: &ExchangeTiming,
    events: &broadcast::Sender<DeviceEvent>,
) -> ExchangeOutcome {
    if !transport.is_open() {
        debug!(command = %command, "port closed, exchange not started");
        return ExchangeOutcome::PortClosed;
    }

    match discard_stale_input(transport).await {
        Ok(0) => {}
        Ok(n) => debug!(port = transport.name(), bytes = n, "discarded stale input"),
        Err(e) if e.is_disconnect() || !transport.is_open() => {
            debug!(error = %e, "port closed while discarding stale input");
            return ExchangeOutcome::PortClosed;
        }
        Err(e) => warn!(error = %e, "failed to discard stale input"),
    }

    let line = command.line();
    debug!(port = transport.name(), tx = %line, "TX");

    match transport.write(&command.encode(), timing.write_timeout).await {
        Ok(true) => emit(events, LogLine::outbound(line)),
        Ok(false) => warn!(
            port = transport.name(),
            command = %line,
            timeout_ms = timing.write_timeout.as_millis(),
            "write not acknowledged, reading anyway"
        ),
        Err(e) if e.is_disconnect() || !transport.is_open() => {
            debug!(error = %e, "port closed during write");
            return ExchangeOutcome::PortClosed;
        }
        Err(e) => warn!(error = %e, command = %line, "write failed, reading anyway"),
    }

    let started = Instant::now();
    let mut raw: Vec<u8> = Vec::new();

    let outcome = loop {
        let wait = match timing.deadline {
            Some(deadline) => {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    break ExchangeOutcome::Timeout(String::from_utf8_lossy(&raw).into_owned());
                }
                timing.read_timeout.min(deadline - elapsed)
            }
            None => timing.read_timeout,
        };

        let received = match transport.wait_for_data(wait).await {
            Ok(true) => transport.read_available().await,
            Ok(false) => Ok(Vec::new()),
            Err(e) => Err(e),
        };

        match received {
            Ok(bytes) => raw.extend_from_slice(&bytes),
            Err(e) if e.is_disconnect() => {
                debug!(error = %e, "port closed while reading");
                break ExchangeOutcome::PortClosed;
            }
            Err(e) => {
                tracing::error!(port = transport.name(), error = %e, "read failed, closing port");
                if let Err(close_err) = transport.close().await {
                    warn!(error = %close_err, "failed to close port after read error");
                }
                break ExchangeOutcome::PortClosed;
            }
        }

        let text = String::from_utf8_lossy(&raw);
        if text.contains(ERROR_TOKEN) {
            break ExchangeOutcome::ErrorToken(text.into_owned());
        }
        if text.contains(terminator) {
            break ExchangeOutcome::Complete(text.into_owned());
        }
        if !transport.is_open() {
            break ExchangeOutcome::PortClosed;
        }
    };

    let inbound = String::from_utf8_lossy(&raw).into_owned();
    debug!(port = transport.name(), rx = ?inbound, "RX");
    emit(events, LogLine::inbound(inbound));

    outcome
}
