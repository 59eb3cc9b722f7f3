//! Session event and command-log types.
//!
//! Events are emitted by a session through a `tokio::sync::broadcast`
//! channel. The command log shown to an operator (`>` for outbound frames,
//! `<` for replies) travels on the same channel as [`DeviceEvent::Log`].

use std::fmt;

/// Prefix rendered in front of outbound log lines.
pub const OUTBOUND_PREFIX: &str = ">\t";
/// Prefix rendered in front of each physical line of an inbound reply.
pub const INBOUND_PREFIX: &str = "<\t";

const LINE_END: &str = "\r\n";

/// Direction of a logged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Outbound,
    /// Device to host.
    Inbound,
}

/// One entry in the command log.
///
/// `text` is the raw frame text (outbound without its line terminator,
/// inbound exactly as accumulated). [`Display`](fmt::Display) renders it
/// with the direction prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub direction: Direction,
    pub text: String,
}

impl LogLine {
    pub fn outbound(text: impl Into<String>) -> Self {
        LogLine {
            direction: Direction::Outbound,
            text: text.into(),
        }
    }

    pub fn inbound(text: impl Into<String>) -> Self {
        LogLine {
            direction: Direction::Inbound,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Outbound => write!(f, "{OUTBOUND_PREFIX}{}", self.text),
            Direction::Inbound => write!(f, "{INBOUND_PREFIX}{}", prefix_reply_lines(&self.text)),
        }
    }
}

/// Re-insert the inbound prefix after every line terminator except the last.
///
/// Single-line replies are returned unchanged.
fn prefix_reply_lines(text: &str) -> String {
    let terminators = text.matches(LINE_END).count();
    if terminators <= 1 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + terminators * INBOUND_PREFIX.len());
    let mut seen = 0;
    let mut rest = text;
    while let Some(pos) = rest.find(LINE_END) {
        let end = pos + LINE_END.len();
        out.push_str(&rest[..end]);
        seen += 1;
        if seen < terminators {
            out.push_str(INBOUND_PREFIX);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// An event emitted by a session.
///
/// Delivered best-effort through a bounded broadcast channel; slow consumers
/// may miss events.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A frame was written to or read from the device.
    Log(LogLine),

    /// The port was opened.
    Connected {
        /// Port name.
        port: String,
    },

    /// The port was closed, either on request or because it failed.
    Disconnected {
        /// Port name.
        port: String,
    },

    /// A sweep completed and replaced the session's previous result.
    SweepCompleted {
        /// Number of samples in the new result.
        samples: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_rendering() {
        let line = LogLine::outbound("$FCS,0,2400");
        assert_eq!(line.to_string(), ">\t$FCS,0,2400");
    }

    #[test]
    fn single_line_reply_rendering() {
        let line = LogLine::inbound("$FCG,0,2450.00\r\n");
        assert_eq!(line.to_string(), "<\t$FCG,0,2450.00\r\n");
    }

    #[test]
    fn multi_line_reply_rendering() {
        let line = LogLine::inbound("$SWPD,0,2400,10,-5\r\n$SWPD,0,2401,10,-6\r\nOK\r\n");
        assert_eq!(
            line.to_string(),
            "<\t$SWPD,0,2400,10,-5\r\n<\t$SWPD,0,2401,10,-6\r\n<\tOK\r\n"
        );
    }

    #[test]
    fn unterminated_tail_keeps_prefix_placement() {
        // Two terminators: only the first gets a prefix re-inserted.
        let line = LogLine::inbound("a\r\nb\r\nc");
        assert_eq!(line.to_string(), "<\ta\r\n<\tb\r\nc");
    }

    #[test]
    fn empty_reply_rendering() {
        assert_eq!(LogLine::inbound("").to_string(), "<\t");
    }
}
