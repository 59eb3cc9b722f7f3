//! Error types for sglink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! device-level errors are all captured here.

/// The error type for all sglink operations.
///
/// Exchange-level conditions (error token, port closed mid-read, deadline)
/// are reported as an `ExchangeOutcome` by the line framer rather than as
/// errors; the variants here cover what a session surfaces to its caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open failure, enumeration failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unparseable reply, unexpected reply shape).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The exchange deadline elapsed before the reply was complete.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a command or builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The port is not open.
    #[error("not connected")]
    NotConnected,

    /// The port was closed while an exchange was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// Autodetection found no port matching the device filter.
    #[error("no signal generator board detected on any port")]
    NoCandidateDevice,

    /// The device replied with an `ERR` token. Carries the raw reply.
    #[error("device reported an error: {0}")]
    DeviceError(String),

    /// The sweep reply was missing its sample marker or completion terminator.
    #[error("sweep data invalid or incomplete")]
    SweepMalformed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the port is gone and must be reopened.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::NotConnected | Error::ConnectionLost)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_no_candidate() {
        assert_eq!(
            Error::NoCandidateDevice.to_string(),
            "no signal generator board detected on any port"
        );
    }

    #[test]
    fn error_display_device_error() {
        let e = Error::DeviceError("$FCS,0,ERR3\r\n".into());
        assert!(e.to_string().starts_with("device reported an error: $FCS,0,ERR3"));
    }

    #[test]
    fn error_display_sweep_malformed() {
        assert_eq!(
            Error::SweepMalformed.to_string(),
            "sweep data invalid or incomplete"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn disconnect_classification() {
        assert!(Error::NotConnected.is_disconnect());
        assert!(Error::ConnectionLost.is_disconnect());
        assert!(!Error::Timeout.is_disconnect());
        assert!(!Error::Protocol("x".into()).is_disconnect());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
