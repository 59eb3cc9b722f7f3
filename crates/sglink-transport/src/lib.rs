//! Transport implementations for sglink.
//!
//! This crate provides the concrete [`Transport`](sglink_core::Transport)
//! for ISC signal generator boards and the port discovery helpers:
//!
//! - [`SerialTransport`]: the board's USB virtual COM port
//! - [`list_ports`] / [`autodetect`]: find boards by USB vendor/product id
//! - [`PortWatcher`]: periodic port-list refresh for host loops
//!
//! # Example
//!
//! ```no_run
//! use sglink_transport::{autodetect, list_ports, DeviceFilter, SerialConfig, SerialTransport};
//!
//! # async fn example() -> sglink_core::Result<()> {
//! let ports = list_ports()?;
//! let boards = autodetect(&ports, &DeviceFilter::default())?;
//! let transport = SerialTransport::connect(&boards[0].name, SerialConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod serial;

pub use discovery::{
    autodetect, list_ports, ports_changed, DeviceFilter, PortInfo, PortWatcher, UsbId,
    ISC_PRODUCT_ID, ISC_VENDOR_ID,
};
pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
