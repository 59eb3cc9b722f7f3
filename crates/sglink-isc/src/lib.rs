//! ISC signal generator protocol engine for sglink.
//!
//! This crate drives the line-oriented text protocol spoken by ISC RF signal
//! generator boards. It provides:
//!
//! - **Protocol codec** ([`protocol`]) -- encode `$NAME,arg,...\r\n` command
//!   frames and decode single-line and `OK`-terminated block replies.
//! - **Command builders** ([`commands`]) -- one builder per board command
//!   (identity, status, frequency, power, DLL, RF output, sweep).
//! - **Line framer** ([`framer`]) -- one write-then-collect exchange over a
//!   [`Transport`](sglink_core::Transport), tolerant of partial reads, with
//!   error-token and port-loss detection.
//! - **Sweep parser** ([`sweep`]) -- turn a sweep reply into ordered samples
//!   with S11 in dB and reflection in percent.
//! - **Session** ([`session`]) -- typed operations on one board, the command
//!   log and connection events on a broadcast channel.
//! - **Builder** ([`builder`]) -- fluent construction of [`IscSession`] with
//!   the board's defaults.
//!
//! # Example
//!
//! ```
//! use sglink_isc::commands::cmd_set_frequency;
//! use sglink_isc::sweep::parse_sweep;
//!
//! let cmd = cmd_set_frequency(0, "2400");
//! assert_eq!(cmd.encode(), b"$FCS,0,2400\r\n");
//!
//! let result = parse_sweep("$SWPD,0,2400,10,-5\r\n$SWPD,0,2401,10,-6\r\nOK\r\n").unwrap();
//! assert_eq!(result.len(), 2);
//! assert_eq!(result.samples()[1].s11_db, -16.0);
//! ```

pub mod builder;
pub mod commands;
pub mod framer;
pub mod protocol;
pub mod session;
pub mod sweep;

pub use builder::IscBuilder;
pub use commands::{SweepPower, SweepRequest};
pub use framer::{exchange, ExchangeOutcome, ExchangeTiming};
pub use protocol::{Command, Reply, ReplyShape};
pub use session::IscSession;
pub use sweep::{parse_sweep, SweepError};
