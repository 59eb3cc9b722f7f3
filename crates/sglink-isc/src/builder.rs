//! IscBuilder -- fluent builder for constructing [`IscSession`] instances.
//!
//! Separates configuration from construction so that callers can pick the
//! serial port (or let it be autodetected), the channel and the exchange
//! timing before opening the port.
//!
//! # Example
//!
//! ```no_run
//! use sglink_isc::builder::IscBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> sglink_core::Result<()> {
//! let session = IscBuilder::new()
//!     .serial_port("/dev/ttyACM0")
//!     .read_timeout(Duration::from_millis(300))
//!     .exchange_deadline(Duration::from_secs(5))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::info;

use sglink_core::error::{Error, Result};
use sglink_core::transport::Transport;
use sglink_transport::{autodetect, list_ports, DeviceFilter, SerialConfig, SerialTransport};

use crate::commands::DEFAULT_CHANNEL;
use crate::framer::ExchangeTiming;
use crate::session::IscSession;

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fluent builder for [`IscSession`].
///
/// Everything except the port has a default matching the ISC board, so the
/// simplest usage is:
///
/// ```ignore
/// let session = IscBuilder::new().serial_port("COM4").build().await?;
/// ```
#[derive(Debug, Clone)]
pub struct IscBuilder {
    serial_port: Option<String>,
    device_filter: Option<DeviceFilter>,
    serial: SerialConfig,
    channel: u8,
    timing: ExchangeTiming,
    event_capacity: usize,
}

impl IscBuilder {
    pub fn new() -> Self {
        IscBuilder {
            serial_port: None,
            device_filter: None,
            serial: SerialConfig::default(),
            channel: DEFAULT_CHANNEL,
            timing: ExchangeTiming::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM4`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Find the port at build time by USB vendor/product id.
    ///
    /// Ignored if [`serial_port()`](Self::serial_port) was also called.
    pub fn autodetect(mut self, filter: DeviceFilter) -> Self {
        self.device_filter = Some(filter);
        self
    }

    /// Override the default baud rate (115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial.baud_rate = baud;
        self
    }

    /// Set the serial driver's per-operation I/O timeout (default: 10s).
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.serial.io_timeout = timeout;
        self
    }

    /// Set the channel addressed by every command (default: 0).
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Set how long a write may take before it counts as unacknowledged
    /// (default: 250ms).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.timing.write_timeout = timeout;
        self
    }

    /// Set how long each read waits for new bytes (default: 500ms).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timing.read_timeout = timeout;
        self
    }

    /// Bound the read phase of every exchange. Without a deadline an
    /// exchange waits as long as the board stays connected.
    pub fn exchange_deadline(mut self, deadline: Duration) -> Self {
        self.timing.deadline = Some(deadline);
        self
    }

    /// Set the capacity of the event channel (default: 256).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be greater than zero".into(),
            ));
        }
        if self.timing.read_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "read_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Build an [`IscSession`] with a caller-provided transport.
    ///
    /// The transport is used as is: it is not opened here. This is the
    /// entry point for tests (pass a `MockTransport` from
    /// `sglink-test-harness`).
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<IscSession> {
        self.validate()?;
        Ok(IscSession::new(
            transport,
            self.channel,
            self.timing,
            self.event_capacity,
        ))
    }

    /// Build an [`IscSession`] on a serial port and connect it.
    ///
    /// Requires [`serial_port()`](Self::serial_port) or
    /// [`autodetect()`](Self::autodetect). With autodetection the first
    /// matching port is used.
    pub async fn build(self) -> Result<IscSession> {
        self.validate()?;

        let port = match (&self.serial_port, &self.device_filter) {
            (Some(port), _) => port.clone(),
            (None, Some(filter)) => {
                let ports = list_ports()?;
                let candidates = autodetect(&ports, filter)?;
                let port = candidates
                    .into_iter()
                    .next()
                    .ok_or(Error::NoCandidateDevice)?
                    .name;
                info!(port = %port, "autodetected board");
                port
            }
            (None, None) => {
                return Err(Error::InvalidParameter(
                    "serial_port or autodetect is required for build()".into(),
                ));
            }
        };

        let transport = SerialTransport::new(&port, self.serial.clone());
        let mut session = self.build_with_transport(Box::new(transport))?;
        session.connect().await?;
        Ok(session)
    }
}

impl Default for IscBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sglink_test_harness::MockTransport;

    #[test]
    fn builder_defaults() {
        let builder = IscBuilder::new();
        assert_eq!(builder.channel, 0);
        assert_eq!(builder.serial.baud_rate, 115_200);
        assert_eq!(builder.timing, ExchangeTiming::default());
        assert_eq!(builder.event_capacity, 256);
        assert!(builder.serial_port.is_none());
        assert!(builder.device_filter.is_none());
    }

    #[test]
    fn builder_fluent_chain() {
        let builder = IscBuilder::new()
            .serial_port("/dev/ttyACM0")
            .baud_rate(9600)
            .channel(1)
            .write_timeout(Duration::from_millis(100))
            .read_timeout(Duration::from_millis(200))
            .exchange_deadline(Duration::from_secs(3))
            .io_timeout(Duration::from_secs(2))
            .event_capacity(16);

        assert_eq!(builder.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(builder.serial.baud_rate, 9600);
        assert_eq!(builder.serial.io_timeout, Duration::from_secs(2));
        assert_eq!(builder.channel, 1);
        assert_eq!(builder.timing.write_timeout, Duration::from_millis(100));
        assert_eq!(builder.timing.read_timeout, Duration::from_millis(200));
        assert_eq!(builder.timing.deadline, Some(Duration::from_secs(3)));
        assert_eq!(builder.event_capacity, 16);
    }

    #[test]
    fn build_with_transport_keeps_channel() {
        let session = IscBuilder::new()
            .channel(2)
            .build_with_transport(Box::new(MockTransport::new()))
            .unwrap();
        assert_eq!(session.channel(), 2);
        assert!(session.is_connected());
    }

    #[test]
    fn zero_event_capacity_is_rejected() {
        let result = IscBuilder::new()
            .event_capacity(0)
            .build_with_transport(Box::new(MockTransport::new()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let result = IscBuilder::new()
            .read_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn build_requires_a_port() {
        let result = IscBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn build_on_missing_port_fails() {
        let result = IscBuilder::new()
            .serial_port("/dev/sglink-no-such-port")
            .build()
            .await;
        assert!(result.is_err());
    }
}
