//! sglink-test-harness: Test utilities and mock transports for sglink.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without a signal generator board attached.

pub mod mock_serial;

pub use mock_serial::MockTransport;
