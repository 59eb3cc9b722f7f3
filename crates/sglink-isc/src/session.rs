//! IscSession -- a connection to one ISC signal generator board.
//!
//! The session owns the [`Transport`], the exchange timing, the event
//! channel and the result of the last sweep. Every operation borrows the
//! session mutably, so exactly one exchange is in flight at a time.
//!
//! Typed methods ([`frequency`](IscSession::frequency),
//! [`sweep`](IscSession::sweep), ...) build the command, run one exchange
//! through the [`framer`](crate::framer) and decode the reply.
//! [`execute`](IscSession::execute) runs any [`Command`] and hands back the
//! raw [`ExchangeOutcome`].

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use sglink_core::error::{Error, Result};
use sglink_core::events::DeviceEvent;
use sglink_core::transport::Transport;
use sglink_core::types::SweepResult;

use crate::commands::{self, SweepRequest};
use crate::framer::{self, ExchangeOutcome, ExchangeTiming};
use crate::protocol::{block_lines, Command, Reply, ERROR_TOKEN, LINE_TERMINATOR};
use crate::sweep::parse_sweep;

/// A session with one ISC board.
///
/// Constructed via [`IscBuilder`](crate::builder::IscBuilder).
pub struct IscSession {
    transport: Box<dyn Transport>,
    channel: u8,
    timing: ExchangeTiming,
    event_tx: broadcast::Sender<DeviceEvent>,
    last_sweep: Option<SweepResult>,
}

impl IscSession {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        channel: u8,
        timing: ExchangeTiming,
        event_capacity: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity);
        IscSession {
            transport,
            channel,
            timing,
            event_tx,
            last_sweep: None,
        }
    }

    /// Subscribe to session events: the command log, connection changes and
    /// completed sweeps.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_tx.subscribe()
    }

    /// Name of the underlying port.
    pub fn port_name(&self) -> &str {
        self.transport.name()
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn timing(&self) -> &ExchangeTiming {
        &self.timing
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    fn emit(&self, event: DeviceEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Open the port. Does nothing if it is already open.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_open() {
            return Ok(());
        }
        self.transport.open().await?;
        info!(port = %self.port_name(), "connected");
        self.emit(DeviceEvent::Connected {
            port: self.port_name().to_string(),
        });
        Ok(())
    }

    /// Close the port. Does nothing if it is already closed.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.transport.is_open() {
            return Ok(());
        }
        self.transport.close().await?;
        info!(port = %self.port_name(), "disconnected");
        self.emit(DeviceEvent::Disconnected {
            port: self.port_name().to_string(),
        });
        Ok(())
    }

    /// Run one exchange for `command`, completing on the terminator its
    /// reply shape calls for.
    ///
    /// If the port goes away during the exchange a
    /// [`DeviceEvent::Disconnected`] is emitted.
    pub async fn execute(&mut self, command: &Command) -> ExchangeOutcome {
        let was_open = self.transport.is_open();
        let outcome = framer::exchange(
            self.transport.as_mut(),
            command,
            command.reply_shape().terminator(),
            &self.timing,
            &self.event_tx,
        )
        .await;

        if was_open && !self.transport.is_open() {
            warn!(port = %self.port_name(), command = %command, "port lost during exchange");
            self.emit(DeviceEvent::Disconnected {
                port: self.port_name().to_string(),
            });
        }
        outcome
    }

    /// Execute a single-line command and decode its reply.
    async fn query(&mut self, command: Command) -> Result<Reply> {
        let text = self.execute(&command).await.into_result()?;
        Reply::parse(&text)
    }

    async fn query_f64(&mut self, command: Command) -> Result<f64> {
        self.query(command).await?.value_f64()
    }

    // -----------------------------------------------------------------
    // Identity and status
    // -----------------------------------------------------------------

    /// Board identity (`$IDN`).
    pub async fn identity(&mut self) -> Result<Reply> {
        self.query(commands::cmd_identity(self.channel)).await
    }

    /// Firmware version (`$VER`).
    pub async fn version(&mut self) -> Result<Reply> {
        self.query(commands::cmd_version(self.channel)).await
    }

    /// Combined status code (`$ST`).
    pub async fn status(&mut self) -> Result<Reply> {
        self.query(commands::cmd_status(self.channel)).await
    }

    /// Every active status line (`$ST,ch,1`), without the closing `OK`.
    pub async fn status_verbose(&mut self) -> Result<Vec<String>> {
        let text = self
            .execute(&commands::cmd_status_verbose(self.channel))
            .await
            .into_result()?;
        Ok(block_lines(&text).into_iter().map(str::to_string).collect())
    }

    /// Clear the board's error state (`$ERRC`).
    ///
    /// The board echoes `$ERRC,ch`, whose name contains the error token, so
    /// the framer reports it as an error reply. Only an echo carrying `ERR`
    /// in one of its fields is a real failure.
    pub async fn clear_errors(&mut self) -> Result<()> {
        let command = commands::cmd_clear_errors(self.channel);
        match self.execute(&command).await {
            ExchangeOutcome::ErrorToken(text) if is_clear_errors_echo(&text) => Ok(()),
            ExchangeOutcome::ErrorToken(text) => Err(Error::DeviceError(text)),
            outcome => outcome.into_result().map(|_| ()),
        }
    }

    // -----------------------------------------------------------------
    // Frequency and power
    // -----------------------------------------------------------------

    /// Output frequency in MHz (`$FCG`).
    pub async fn frequency(&mut self) -> Result<f64> {
        self.query_f64(commands::cmd_read_frequency(self.channel)).await
    }

    /// Set the output frequency in MHz (`$FCS`). The value is sent as given.
    pub async fn set_frequency(&mut self, mhz: &str) -> Result<Reply> {
        self.query(commands::cmd_set_frequency(self.channel, mhz)).await
    }

    /// Measured PA power (`$PPG`).
    pub async fn pa_power(&mut self) -> Result<Reply> {
        self.query(commands::cmd_read_pa_power(self.channel)).await
    }

    /// Power setpoint (`$PWRG`).
    pub async fn power(&mut self) -> Result<f64> {
        self.query_f64(commands::cmd_read_power(self.channel)).await
    }

    /// Set the power setpoint (`$PWRS`). The value is sent as given.
    pub async fn set_power(&mut self, value: &str) -> Result<Reply> {
        self.query(commands::cmd_set_power(self.channel, value)).await
    }

    // -----------------------------------------------------------------
    // DLL and RF output
    // -----------------------------------------------------------------

    /// Configure the DLL (`$DLCS`) with its six parameters.
    pub async fn configure_dll(&mut self, params: [&str; 6]) -> Result<Reply> {
        self.query(commands::cmd_configure_dll(self.channel, params))
            .await
    }

    /// Enable or disable the DLL (`$DLES`).
    pub async fn set_dll_enabled(&mut self, on: bool) -> Result<Reply> {
        self.query(commands::cmd_set_dll_enabled(self.channel, on))
            .await
    }

    /// Enable or disable RF output (`$ECS`).
    pub async fn set_rf_enabled(&mut self, on: bool) -> Result<Reply> {
        self.query(commands::cmd_set_rf_enabled(self.channel, on))
            .await
    }

    // -----------------------------------------------------------------
    // Sweep
    // -----------------------------------------------------------------

    /// Run an S11 sweep and keep its result.
    ///
    /// On success the new result replaces the previous one and a
    /// [`DeviceEvent::SweepCompleted`] is emitted. On any failure the
    /// previous result stays in place; see [`clear_sweep`](Self::clear_sweep).
    pub async fn sweep(&mut self, request: &SweepRequest) -> Result<&SweepResult> {
        let text = self
            .execute(&request.to_command(self.channel))
            .await
            .into_result()?;
        let result = parse_sweep(&text)?;

        if result.skipped_lines() > 0 {
            debug!(skipped = result.skipped_lines(), "sweep reply had non-sample lines");
        }
        for issue in result.issues() {
            warn!(%issue, "sweep sample field read as 0");
        }

        self.emit(DeviceEvent::SweepCompleted {
            samples: result.len(),
        });
        Ok(&*self.last_sweep.insert(result))
    }

    /// Result of the last successful sweep.
    pub fn last_sweep(&self) -> Option<&SweepResult> {
        self.last_sweep.as_ref()
    }

    /// Drop the last sweep result.
    pub fn clear_sweep(&mut self) -> Option<SweepResult> {
        self.last_sweep.take()
    }

    /// Close the port and give the transport back.
    pub async fn into_transport(mut self) -> Result<Box<dyn Transport>> {
        self.disconnect().await?;
        Ok(self.transport)
    }
}

impl std::fmt::Debug for IscSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IscSession")
            .field("port", &self.transport.name())
            .field("channel", &self.channel)
            .field("timing", &self.timing)
            .field("last_sweep", &self.last_sweep.as_ref().map(SweepResult::len))
            .finish()
    }
}

/// A complete `$ERRC` echo with no error token outside its name.
fn is_clear_errors_echo(text: &str) -> bool {
    if !text.contains(LINE_TERMINATOR) {
        return false;
    }
    match Reply::parse(text) {
        Ok(reply) => {
            reply.name() == commands::CLEAR_ERRORS
                && !reply.fields().iter().any(|f| f.contains(ERROR_TOKEN))
        }
        Err(_) => false,
    }
}
