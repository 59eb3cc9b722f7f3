//! Serial port transport for signal generator boards.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for the USB virtual COM port an ISC board presents.
//! The board talks 115200 baud, 8 data bits, no parity, one stop bit and no
//! flow control, which is what [`SerialConfig::default`] describes.
//!
//! A transport is created closed with [`SerialTransport::new`] and opened
//! through [`Transport::open`], so a caller can pick a port, open it, close
//! it and open it again without rebuilding anything.
//!
//! # Example
//!
//! ```no_run
//! use sglink_transport::{SerialConfig, SerialTransport};
//! use sglink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> sglink_core::Result<()> {
//! let mut transport = SerialTransport::new("/dev/ttyACM0", SerialConfig::default());
//! transport.open().await?;
//!
//! transport.write(b"$IDN,0\r\n", Duration::from_millis(250)).await?;
//! if transport.wait_for_data(Duration::from_millis(500)).await? {
//!     let bytes = transport.read_available().await?;
//!     println!("{}", String::from_utf8_lossy(&bytes));
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::BytesMut;
use sglink_core::error::{Error, Result};
use sglink_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Write a whole frame, then flush within whatever is left of `timeout`.
///
/// The frame is never cut short: a half-written command would corrupt the
/// next one on the wire. Only the flush is bounded, and running out of time
/// yields `Ok(false)`.
async fn write_frame<W>(writer: &mut W, data: &[u8], timeout: Duration) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let started = tokio::time::Instant::now();
    writer.write_all(data).await?;

    let remaining = timeout.saturating_sub(started.elapsed());
    if remaining.is_zero() {
        return Ok(false);
    }
    match tokio::time::timeout(remaining, writer.flush()).await {
        Ok(flushed) => flushed.map(|()| true),
        Err(_) => Ok(false),
    }
}

/// Size of a single read from the port.
const READ_CHUNK: usize = 256;

/// Serial port configuration.
///
/// Defaults match the ISC board:
/// - 115200 baud
/// - 8 data bits
/// - 1 stop bit
/// - No parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Number of data bits.
    pub data_bits: DataBits,
    /// Number of stop bits.
    pub stop_bits: StopBits,
    /// Parity checking.
    pub parity: Parity,
    /// Flow control.
    pub flow_control: FlowControl,
    /// Timeout handed to the serial driver for each blocking read or write.
    ///
    /// Exchange reads and writes carry their own, shorter timeouts.
    pub io_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            io_timeout: Duration::from_secs(10),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port transport for a signal generator board.
pub struct SerialTransport {
    /// The underlying serial port stream, `None` while closed.
    port: Option<SerialStream>,
    /// Port name for opening and logging.
    port_name: String,
    config: SerialConfig,
    /// Bytes read by `wait_for_data` and not yet handed out.
    rx_buf: BytesMut,
}

impl SerialTransport {
    /// Create a closed transport for `port` (e.g. `/dev/ttyACM0` or `COM3`).
    pub fn new(port: &str, config: SerialConfig) -> Self {
        Self {
            port: None,
            port_name: port.to_string(),
            config,
            rx_buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Create a transport and open it immediately.
    pub async fn connect(port: &str, config: SerialConfig) -> Result<Self> {
        let mut transport = Self::new(port, config);
        transport.open().await?;
        Ok(transport)
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// The configuration this transport opens with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

/// Broken pipes and unplugged devices mean the port is gone.
fn map_io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::NotConnected
    {
        Error::ConnectionLost
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let config = &self.config;
        tracing::debug!(
            port = %self.port_name,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let serial_stream = tokio_serial::new(&self.port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .timeout(config.io_timeout)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %self.port_name, error = %e, "Failed to open serial port");
                Error::Transport(format!(
                    "Failed to open serial port {}: {}",
                    self.port_name, e
                ))
            })?;

        tracing::info!(
            port = %self.port_name,
            baud_rate = config.baud_rate,
            "Serial port opened successfully"
        );

        self.rx_buf.clear();
        self.port = Some(serial_stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            // Dropping the stream closes the port.
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        self.rx_buf.clear();

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        match write_frame(port, data, timeout).await {
            Ok(true) => {
                tracing::trace!(port = %self.port_name, "Data sent successfully");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to send data"
                );
                Err(map_io_error(e))
            }
            Ok(false) => {
                tracing::debug!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "Write not acknowledged within timeout"
                );
                Ok(false)
            }
        }
    }

    async fn wait_for_data(&mut self, timeout: Duration) -> Result<bool> {
        if !self.rx_buf.is_empty() {
            return Ok(true);
        }
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = [0u8; READ_CHUNK];
        match tokio::time::timeout(timeout, port.read(&mut buf)).await {
            Ok(Ok(0)) => {
                // End of stream: the device went away.
                tracing::warn!(port = %self.port_name, "Serial port reported end of stream");
                self.port = None;
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                self.rx_buf.extend_from_slice(&buf[..n]);
                Ok(true)
            }
            Ok(Err(e)) => {
                tracing::error!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to receive data"
                );
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Ok(false)
            }
        }
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        if self.port.is_none() && self.rx_buf.is_empty() {
            return Err(Error::NotConnected);
        }
        Ok(self.rx_buf.split().to_vec())
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.io_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_data_bits_conversion() {
        let _: tokio_serial::DataBits = DataBits::Five.into();
        let _: tokio_serial::DataBits = DataBits::Eight.into();
    }

    #[test]
    fn test_parity_and_flow_conversion() {
        let _: tokio_serial::Parity = Parity::Even.into();
        let _: tokio_serial::FlowControl = FlowControl::Hardware.into();
        let _: tokio_serial::StopBits = StopBits::Two.into();
    }

    #[tokio::test]
    async fn slow_write_still_sends_whole_frame() {
        let (mut board, mut host) = tokio::io::duplex(4);
        let frame = b"$SWPD,0,2400.00,2500.00,1.00,40.00,0\r\n";

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut buf = [0u8; 4];
            loop {
                tokio::time::sleep(Duration::from_millis(2)).await;
                let n = board.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            received
        });

        let acknowledged = write_frame(&mut host, frame, Duration::from_millis(1))
            .await
            .unwrap();
        drop(host);

        assert!(!acknowledged);
        assert_eq!(reader.await.unwrap(), frame.to_vec());
    }

    #[tokio::test]
    async fn quick_write_is_acknowledged() {
        let (mut board, mut host) = tokio::io::duplex(64);
        assert!(write_frame(&mut host, b"$IDN,0\r\n", Duration::from_millis(100))
            .await
            .unwrap());

        let mut buf = [0u8; 8];
        board.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"$IDN,0\r\n");
    }

    #[test]
    fn new_transport_is_closed() {
        let transport = SerialTransport::new("/dev/null-sglink", SerialConfig::default());
        assert!(!transport.is_open());
        assert_eq!(transport.port_name(), "/dev/null-sglink");
        assert_eq!(Transport::name(&transport), "/dev/null-sglink");
    }

    #[tokio::test]
    async fn closed_transport_rejects_io() {
        let mut transport = SerialTransport::new("/dev/null-sglink", SerialConfig::default());
        let write = transport.write(b"$IDN,0\r\n", Duration::from_millis(10)).await;
        assert!(matches!(write, Err(Error::NotConnected)));
        let wait = transport.wait_for_data(Duration::from_millis(10)).await;
        assert!(matches!(wait, Err(Error::NotConnected)));
        let read = transport.read_available().await;
        assert!(matches!(read, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut transport = SerialTransport::new("/dev/null-sglink", SerialConfig::default());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn open_missing_port_fails() {
        let mut transport =
            SerialTransport::new("/dev/sglink-no-such-port", SerialConfig::default());
        let result = transport.open().await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(!transport.is_open());
    }
}
