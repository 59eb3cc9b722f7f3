//! ISC text-protocol encoder/decoder.
//!
//! The board speaks a line-oriented ASCII protocol over its virtual COM port.
//!
//! # Command format
//!
//! ```text
//! $<NAME>,<arg1>,...,<argN>\r\n
//! ```
//!
//! - `NAME`: uppercase command token with a leading `$` (e.g. `$FCS`).
//! - args: zero or more comma-separated fields; the first is normally the
//!   channel number.
//! - Terminator: `\r\n`.
//!
//! # Reply format
//!
//! Most commands answer with a single `,`-separated line ending in `\r\n`.
//! Extended status and sweeps answer with several lines followed by a final
//! `OK\r\n`. Any reply may contain the literal `ERR`, which means the board
//! rejected the command.

use std::fmt;

use bytes::{BufMut, BytesMut};
use sglink_core::error::{Error, Result};

/// Line terminator for commands and single-line replies.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Terminator of a multi-line reply block.
pub const BLOCK_TERMINATOR: &str = "OK\r\n";

/// Token the board embeds in a reply to report an error.
pub const ERROR_TOKEN: &str = "ERR";

/// Separator between the fields of a command or reply line.
pub const FIELD_SEPARATOR: char = ',';

/// The shape of reply a command produces, which decides when it is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyShape {
    /// One line ending in `\r\n`.
    #[default]
    SingleLine,
    /// Several lines ending in `OK\r\n`.
    Block,
}

impl ReplyShape {
    /// The literal suffix that marks the reply as complete.
    pub fn terminator(self) -> &'static str {
        match self {
            ReplyShape::SingleLine => LINE_TERMINATOR,
            ReplyShape::Block => BLOCK_TERMINATOR,
        }
    }
}

/// An outbound command: a name token plus ordered string arguments.
///
/// Arguments are sent as given; formatting and range checking are the
/// caller's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
    reply: ReplyShape,
}

impl Command {
    /// Build a command expecting a single-line reply.
    pub fn new<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            reply: ReplyShape::SingleLine,
        }
    }

    /// Same command, expecting the given reply shape instead.
    pub fn expecting(self, reply: ReplyShape) -> Self {
        Command { reply, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn reply_shape(&self) -> ReplyShape {
        self.reply
    }

    /// The command line without its terminator, as shown in the command log.
    pub fn line(&self) -> String {
        let mut line = self.name.clone();
        for arg in &self.args {
            line.push(FIELD_SEPARATOR);
            line.push_str(arg);
        }
        line
    }

    /// Encode the command into raw bytes ready for transmission.
    pub fn encode(&self) -> Vec<u8> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        encode_command(&self.name, &args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// Encode a command name and arguments into a `\r\n`-terminated frame.
///
/// # Example
///
/// ```
/// use sglink_isc::protocol::encode_command;
///
/// assert_eq!(encode_command("$FCS", &["0", "2400"]), b"$FCS,0,2400\r\n");
/// assert_eq!(encode_command("$IDN", &["0"]), b"$IDN,0\r\n");
/// ```
pub fn encode_command(name: &str, args: &[&str]) -> Vec<u8> {
    let capacity = name.len()
        + args.iter().map(|a| a.len() + 1).sum::<usize>()
        + LINE_TERMINATOR.len();
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_slice(name.as_bytes());
    for arg in args {
        buf.put_u8(FIELD_SEPARATOR as u8);
        buf.put_slice(arg.as_bytes());
    }
    buf.put_slice(LINE_TERMINATOR.as_bytes());
    buf.to_vec()
}

/// Whether a reply contains the board's error token.
pub fn is_error_reply(text: &str) -> bool {
    text.contains(ERROR_TOKEN)
}

/// A decoded single-line reply.
///
/// The board echoes the command name first, then the channel and any value
/// fields: `$FCG,0,2450.00\r\n` decodes to name `$FCG` and fields
/// `["0", "2450.00"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    name: String,
    fields: Vec<String>,
}

impl Reply {
    /// Decode the first line of `text`.
    ///
    /// # Example
    ///
    /// ```
    /// use sglink_isc::protocol::Reply;
    ///
    /// let reply = Reply::parse("$FCG,0,2450.00\r\n").unwrap();
    /// assert_eq!(reply.name(), "$FCG");
    /// assert_eq!(reply.value(), Some("2450.00"));
    /// ```
    pub fn parse(text: &str) -> Result<Reply> {
        let line = text.split(LINE_TERMINATOR).next().unwrap_or("").trim();
        if line.is_empty() {
            return Err(Error::Protocol("empty reply".into()));
        }

        let mut parts = line.split(FIELD_SEPARATOR);
        let name = parts.next().unwrap_or_default().to_string();
        let fields = parts.map(str::to_string).collect();
        Ok(Reply { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields after the name, in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The last field, which carries the value for get commands.
    pub fn value(&self) -> Option<&str> {
        self.fields.last().map(String::as_str)
    }

    /// The last field as a number.
    pub fn value_f64(&self) -> Result<f64> {
        let value = self
            .value()
            .ok_or_else(|| Error::Protocol(format!("reply {} carries no value", self.name)))?;
        value.trim().parse().map_err(|_| {
            Error::Protocol(format!("reply {} value {value:?} is not a number", self.name))
        })
    }
}

/// The lines of an `OK`-terminated block, without the `OK` line.
///
/// Empty lines are dropped. Text after the `OK` line is ignored.
pub fn block_lines(text: &str) -> Vec<&str> {
    text.split(LINE_TERMINATOR)
        .take_while(|line| *line != "OK")
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_name_only() {
        assert_eq!(encode_command("$VER", &[]), b"$VER\r\n");
    }

    #[test]
    fn encode_joins_arguments_in_order() {
        assert_eq!(
            encode_command("$DLCS", &["0", "2400", "2500", "2450", "1", "0.5", "100"]),
            b"$DLCS,0,2400,2500,2450,1,0.5,100\r\n"
        );
    }

    #[test]
    fn command_line_and_encoding_agree() {
        let cmd = Command::new("$FCS", ["0", "2400"]);
        assert_eq!(cmd.line(), "$FCS,0,2400");
        assert_eq!(cmd.to_string(), "$FCS,0,2400");
        assert_eq!(cmd.encode(), b"$FCS,0,2400\r\n");
        assert_eq!(cmd.name(), "$FCS");
        assert_eq!(cmd.args(), ["0".to_string(), "2400".to_string()]);
    }

    #[test]
    fn arguments_are_passed_through_verbatim() {
        // No validation: whatever the caller typed goes on the wire.
        let cmd = Command::new("$PWRS", ["0", " 12.5abc"]);
        assert_eq!(cmd.encode(), b"$PWRS,0, 12.5abc\r\n");
    }

    #[test]
    fn reply_shape_terminators() {
        assert_eq!(ReplyShape::SingleLine.terminator(), "\r\n");
        assert_eq!(ReplyShape::Block.terminator(), "OK\r\n");
        assert_eq!(ReplyShape::default(), ReplyShape::SingleLine);

        let cmd = Command::new("$ST", ["0", "1"]).expecting(ReplyShape::Block);
        assert_eq!(cmd.reply_shape(), ReplyShape::Block);
        assert_eq!(cmd.line(), "$ST,0,1");
    }

    #[test]
    fn error_token_detection() {
        assert!(is_error_reply("$FCS,0,ERR4\r\n"));
        assert!(!is_error_reply("$FCS,0,OK\r\n"));
    }

    #[test]
    fn reply_parse_fields() {
        let reply = Reply::parse("$PWRG,0,47.50\r\n").unwrap();
        assert_eq!(reply.name(), "$PWRG");
        assert_eq!(reply.fields(), ["0".to_string(), "47.50".to_string()]);
        assert_eq!(reply.value_f64().unwrap(), 47.5);
    }

    #[test]
    fn reply_parse_uses_first_line_only() {
        let reply = Reply::parse("$IDN,0,ISC-SG\r\ntrailing\r\n").unwrap();
        assert_eq!(reply.value(), Some("ISC-SG"));
    }

    #[test]
    fn reply_parse_empty_is_protocol_error() {
        assert!(matches!(Reply::parse(""), Err(Error::Protocol(_))));
        assert!(matches!(Reply::parse("\r\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn reply_without_value() {
        let reply = Reply::parse("$ERRC\r\n").unwrap();
        assert_eq!(reply.value(), None);
        assert!(matches!(reply.value_f64(), Err(Error::Protocol(_))));
    }

    #[test]
    fn reply_non_numeric_value() {
        let reply = Reply::parse("$VER,0,2.1.0\r\n").unwrap();
        assert!(matches!(reply.value_f64(), Err(Error::Protocol(_))));
    }

    #[test]
    fn block_lines_drop_ok_and_blanks() {
        let lines = block_lines("$ST,0,1,0x0\r\n$ST,0,2,0x4\r\nOK\r\n");
        assert_eq!(lines, vec!["$ST,0,1,0x0", "$ST,0,2,0x4"]);
    }

    #[test]
    fn block_lines_of_bare_ok() {
        assert!(block_lines("OK\r\n").is_empty());
    }
}
