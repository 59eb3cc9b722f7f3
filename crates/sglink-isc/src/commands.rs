//! ISC command builders.
//!
//! One function per board command, each returning a [`Command`] with the
//! right name token and reply shape. All builders are pure; values are
//! taken as strings and sent verbatim, so callers decide on formatting
//! ([`format_value`] gives the two-decimal form the board documentation
//! uses).
//!
//! | Builder                  | Frame                         | Reply  |
//! |--------------------------|-------------------------------|--------|
//! | [`cmd_identity`]         | `$IDN,ch`                     | line   |
//! | [`cmd_version`]          | `$VER,ch`                     | line   |
//! | [`cmd_status`]           | `$ST,ch`                      | line   |
//! | [`cmd_status_verbose`]   | `$ST,ch,1`                    | block  |
//! | [`cmd_clear_errors`]     | `$ERRC,ch`                    | line   |
//! | [`cmd_read_frequency`]   | `$FCG,ch`                     | line   |
//! | [`cmd_set_frequency`]    | `$FCS,ch,f`                   | line   |
//! | [`cmd_read_pa_power`]    | `$PPG,ch`                     | line   |
//! | [`cmd_read_power`]       | `$PWRG,ch`                    | line   |
//! | [`cmd_set_power`]        | `$PWRS,ch,p`                  | line   |
//! | [`cmd_configure_dll`]    | `$DLCS,ch,p1,...,p6`          | line   |
//! | [`cmd_set_dll_enabled`]  | `$DLES,ch,0/1`                | line   |
//! | [`cmd_set_rf_enabled`]   | `$ECS,ch,0/1`                 | line   |
//! | [`cmd_sweep`]            | `$SWPD,ch,start,stop,step,p,0`| block  |

use sglink_core::units::watt_to_dbm;

use crate::protocol::{Command, ReplyShape};

/// Channel addressed when the caller does not choose one.
pub const DEFAULT_CHANNEL: u8 = 0;

pub const IDENTITY: &str = "$IDN";
pub const VERSION: &str = "$VER";
pub const STATUS: &str = "$ST";
pub const CLEAR_ERRORS: &str = "$ERRC";
pub const FREQUENCY_GET: &str = "$FCG";
pub const FREQUENCY_SET: &str = "$FCS";
pub const PA_POWER_GET: &str = "$PPG";
pub const POWER_GET: &str = "$PWRG";
pub const POWER_SET: &str = "$PWRS";
pub const DLL_CONFIGURE: &str = "$DLCS";
pub const DLL_ENABLE: &str = "$DLES";
pub const RF_ENABLE: &str = "$ECS";
pub const SWEEP_DBM: &str = "$SWPD";

/// Format a number the way the board documentation writes values.
///
/// ```
/// use sglink_isc::commands::format_value;
///
/// assert_eq!(format_value(2450.0), "2450.00");
/// assert_eq!(format_value(0.126), "0.13");
/// ```
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Build an "identity" query (`$IDN,ch`).
pub fn cmd_identity(channel: u8) -> Command {
    Command::new(IDENTITY, [channel.to_string()])
}

/// Build a "firmware version" query (`$VER,ch`).
pub fn cmd_version(channel: u8) -> Command {
    Command::new(VERSION, [channel.to_string()])
}

/// Build a "status" query (`$ST,ch`). The board answers with an error code.
pub fn cmd_status(channel: u8) -> Command {
    Command::new(STATUS, [channel.to_string()])
}

/// Build a verbose "status" query (`$ST,ch,1`).
///
/// The extra argument makes the board list every active error on its own
/// line instead of returning a combined code, so the reply is a block.
pub fn cmd_status_verbose(channel: u8) -> Command {
    Command::new(STATUS, [channel.to_string(), "1".to_string()]).expecting(ReplyShape::Block)
}

/// Build a "clear errors" command (`$ERRC,ch`).
pub fn cmd_clear_errors(channel: u8) -> Command {
    Command::new(CLEAR_ERRORS, [channel.to_string()])
}

/// Build a "read frequency" query (`$FCG,ch`).
pub fn cmd_read_frequency(channel: u8) -> Command {
    Command::new(FREQUENCY_GET, [channel.to_string()])
}

/// Build a "set frequency" command (`$FCS,ch,mhz`).
pub fn cmd_set_frequency(channel: u8, mhz: &str) -> Command {
    Command::new(FREQUENCY_SET, [channel.to_string(), mhz.to_string()])
}

/// Build a "read PA power" measurement query (`$PPG,ch`).
pub fn cmd_read_pa_power(channel: u8) -> Command {
    Command::new(PA_POWER_GET, [channel.to_string()])
}

/// Build a "read power setpoint" query (`$PWRG,ch`).
pub fn cmd_read_power(channel: u8) -> Command {
    Command::new(POWER_GET, [channel.to_string()])
}

/// Build a "set power" command (`$PWRS,ch,value`).
pub fn cmd_set_power(channel: u8, value: &str) -> Command {
    Command::new(POWER_SET, [channel.to_string(), value.to_string()])
}

/// Build a "configure DLL" command (`$DLCS,ch,p1,...,p6`).
///
/// The six values are the board's DLL parameters in the order the board
/// expects them.
pub fn cmd_configure_dll(channel: u8, params: [&str; 6]) -> Command {
    let args = std::iter::once(channel.to_string()).chain(params.iter().map(|p| p.to_string()));
    Command::new(DLL_CONFIGURE, args)
}

/// Build a "DLL enable/disable" command (`$DLES,ch,1` / `$DLES,ch,0`).
pub fn cmd_set_dll_enabled(channel: u8, on: bool) -> Command {
    Command::new(DLL_ENABLE, [channel.to_string(), flag(on).to_string()])
}

/// Build an "RF output enable/disable" command (`$ECS,ch,1` / `$ECS,ch,0`).
pub fn cmd_set_rf_enabled(channel: u8, on: bool) -> Command {
    Command::new(RF_ENABLE, [channel.to_string(), flag(on).to_string()])
}

/// Build an S11 sweep in dBm (`$SWPD,ch,start,stop,step,power,0`).
///
/// Frequencies are in MHz, power in dBm. The trailing `0` is a fixed
/// argument of the sweep command.
pub fn cmd_sweep(channel: u8, start: &str, stop: &str, step: &str, power_dbm: &str) -> Command {
    Command::new(
        SWEEP_DBM,
        [
            channel.to_string(),
            start.to_string(),
            stop.to_string(),
            step.to_string(),
            power_dbm.to_string(),
            "0".to_string(),
        ],
    )
    .expecting(ReplyShape::Block)
}

/// Sweep output power, entered in either unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepPower {
    Dbm(f64),
    Watt(f64),
}

impl SweepPower {
    /// The power in dBm, converting from watts if needed.
    pub fn dbm(self) -> f64 {
        match self {
            SweepPower::Dbm(dbm) => dbm,
            SweepPower::Watt(watt) => watt_to_dbm(watt),
        }
    }
}

/// Typed parameters of an S11 sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRequest {
    pub start_mhz: f64,
    pub stop_mhz: f64,
    pub step_mhz: f64,
    pub power: SweepPower,
}

impl SweepRequest {
    /// Encode as a [`cmd_sweep`] command with two-decimal values.
    pub fn to_command(&self, channel: u8) -> Command {
        cmd_sweep(
            channel,
            &format_value(self.start_mhz),
            &format_value(self.stop_mhz),
            &format_value(self.step_mhz),
            &format_value(self.power.dbm()),
        )
    }
}
