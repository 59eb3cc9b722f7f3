//! sglink-core: Core traits, types, and error definitions for sglink.
//!
//! This crate defines the device-agnostic pieces the protocol engine and its
//! callers share, without pulling in a serial port implementation.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`DeviceEvent`] / [`LogLine`] -- session notifications and the command log
//! - [`SweepSample`] / [`SweepResult`] -- S11 sweep measurements
//! - [`dbm_to_watt`] / [`watt_to_dbm`] -- power unit conversion
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;
pub mod units;

// Re-export key types at crate root for ergonomic `use sglink_core::*`.
pub use error::{Error, Result};
pub use events::{DeviceEvent, Direction, LogLine};
pub use transport::Transport;
pub use types::{S11Notation, SweepResult, SweepSample, SweepSampleError};
pub use units::{dbm_to_watt, watt_to_dbm};
