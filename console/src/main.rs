// sglink console -- CLI tool for driving an ISC signal generator board from
// the command line.
//
// Usage:
//   sglink-console ports
//   sglink-console detect
//   sglink-console watch --interval 1
//   sglink-console --port /dev/ttyACM0 identity
//   sglink-console --auto freq set 2450
//   sglink-console --auto --deadline-ms 5000 sweep --start 2400 --stop 2500 --step 1 --dbm 40
//   sglink-console convert watt-to-dbm 10

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sglink_core::events::DeviceEvent;
use sglink_core::types::{S11Notation, SweepResult};
use sglink_core::units::{dbm_to_watt, watt_to_dbm};
use sglink_isc::{IscBuilder, IscSession, SweepPower, SweepRequest};
use sglink_transport::{DeviceFilter, PortInfo, PortWatcher, autodetect, list_ports};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// sglink console -- control an ISC signal generator board.
#[derive(Parser)]
#[command(name = "sglink-console", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyACM0, COM4).
    #[arg(long, conflicts_with = "auto")]
    port: Option<String>,

    /// Connect to the first port whose USB id matches the board.
    #[arg(long)]
    auto: bool,

    /// USB vendor id used by --auto and `detect`.
    #[arg(long, default_value_t = sglink_transport::ISC_VENDOR_ID)]
    vid: u16,

    /// USB product id used by --auto and `detect`.
    #[arg(long, default_value_t = sglink_transport::ISC_PRODUCT_ID)]
    pid: u16,

    /// Override the default baud rate (115200).
    #[arg(long)]
    baud: Option<u32>,

    /// Channel addressed by every command.
    #[arg(long, default_value_t = 0)]
    channel: u8,

    /// Write acknowledgment timeout in milliseconds.
    #[arg(long, default_value_t = 250)]
    write_timeout_ms: u64,

    /// Per-read timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    read_timeout_ms: u64,

    /// Give up on an exchange after this many milliseconds. Unbounded if unset.
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Increase diagnostic output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the serial ports the OS offers.
    Ports,

    /// List the ports that look like a signal generator board.
    Detect,

    /// Print the port list whenever it changes.
    Watch {
        /// Poll interval in seconds.
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },

    /// Query the board identity.
    Identity,

    /// Query the firmware version.
    Version,

    /// Query the status.
    Status {
        /// List every active status line.
        #[arg(long)]
        verbose: bool,
    },

    /// Clear the board's error state.
    ClearErrors,

    /// Frequency operations.
    Freq {
        #[command(subcommand)]
        action: FreqAction,
    },

    /// Read the measured PA power.
    PaPower,

    /// Power setpoint operations.
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },

    /// DLL operations.
    Dll {
        #[command(subcommand)]
        action: DllAction,
    },

    /// RF output operations.
    Rf {
        #[command(subcommand)]
        action: Toggle,
    },

    /// Run an S11 sweep and print the samples.
    Sweep(SweepArgs),

    /// Convert between dBm and watts.
    Convert {
        #[command(subcommand)]
        action: ConvertAction,
    },
}

#[derive(Subcommand)]
enum FreqAction {
    /// Read the output frequency.
    Get,
    /// Set the output frequency.
    Set {
        /// Frequency in MHz, sent as typed.
        mhz: String,
    },
}

#[derive(Subcommand)]
enum PowerAction {
    /// Read the power setpoint.
    Get,
    /// Set the power setpoint.
    Set {
        /// Power value, sent as typed.
        value: String,
    },
}

#[derive(Subcommand)]
enum DllAction {
    /// Configure the DLL.
    Configure {
        /// Lower frequency limit (MHz).
        lower: String,
        /// Upper frequency limit (MHz).
        upper: String,
        /// Start frequency (MHz).
        start: String,
        /// Step frequency (MHz).
        step: String,
        /// Reflection threshold (dB).
        threshold: String,
        /// Main delay (ms).
        delay: String,
    },
    /// Enable the DLL.
    On,
    /// Disable the DLL.
    Off,
}

#[derive(Subcommand)]
enum Toggle {
    /// Switch on.
    On,
    /// Switch off.
    Off,
}

#[derive(Args)]
struct SweepArgs {
    /// Start frequency in MHz.
    #[arg(long)]
    start: f64,

    /// Stop frequency in MHz.
    #[arg(long)]
    stop: f64,

    /// Step in MHz.
    #[arg(long)]
    step: f64,

    /// Sweep power in dBm.
    #[arg(long, conflicts_with = "watt", required_unless_present = "watt")]
    dbm: Option<f64>,

    /// Sweep power in watts.
    #[arg(long)]
    watt: Option<f64>,

    /// Show reflection in percent instead of S11 in dB.
    #[arg(long)]
    linear: bool,
}

#[derive(Subcommand)]
enum ConvertAction {
    /// Convert dBm to watts.
    DbmToWatt { dbm: f64 },
    /// Convert watts to dBm.
    WattToDbm { watt: f64 },
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn device_filter(cli: &Cli) -> DeviceFilter {
    DeviceFilter {
        vid: cli.vid,
        pid: cli.pid,
    }
}

async fn create_session(cli: &Cli) -> Result<IscSession> {
    let mut builder = IscBuilder::new()
        .channel(cli.channel)
        .write_timeout(Duration::from_millis(cli.write_timeout_ms))
        .read_timeout(Duration::from_millis(cli.read_timeout_ms));

    if let Some(ms) = cli.deadline_ms {
        builder = builder.exchange_deadline(Duration::from_millis(ms));
    }
    if let Some(baud) = cli.baud {
        builder = builder.baud_rate(baud);
    }

    builder = match (&cli.port, cli.auto) {
        (Some(port), _) => builder.serial_port(port),
        (None, true) => builder.autodetect(device_filter(cli)),
        (None, false) => bail!("--port or --auto is required for this command"),
    };

    let session = builder.build().await.context("failed to open the board")?;
    debug!(port = %session.port_name(), "session ready");
    Ok(session)
}

/// Print the command log lines queued on `events`.
fn print_log(events: &mut broadcast::Receiver<DeviceEvent>) {
    loop {
        match events.try_recv() {
            Ok(DeviceEvent::Log(line)) if line.text.ends_with('\n') => print!("{line}"),
            Ok(DeviceEvent::Log(line)) => println!("{line}"),
            Ok(DeviceEvent::Disconnected { port }) => eprintln!("[event] {port} disconnected"),
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                eprintln!("[warning] missed {n} log lines");
            }
            Err(_) => break,
        }
    }
}

fn print_ports(ports: &[PortInfo]) {
    if ports.is_empty() {
        println!("No serial ports found.");
        return;
    }
    for port in ports {
        match port.usb {
            Some(usb) => println!("{:<20} USB {:04x}:{:04x}", port.name, usb.vid, usb.pid),
            None => println!("{:<20} -", port.name),
        }
    }
}

fn print_sweep(result: &SweepResult, notation: S11Notation) {
    println!(
        "{:>12} {:>12} {:>12} {:>16}",
        "Freq (MHz)", "Fwd (dBm)", "Rfl (dBm)",
        notation.label()
    );
    for (sample, (_, value)) in result.samples().iter().zip(result.series(notation)) {
        println!(
            "{:>12.2} {:>12.2} {:>12.2} {:>16.3}",
            sample.frequency_mhz, sample.forward_power_dbm, sample.reflected_power_dbm, value
        );
    }
    println!("{} samples", result.len());
    if result.skipped_lines() > 0 {
        println!("{} lines skipped", result.skipped_lines());
    }
    for issue in result.issues() {
        println!("warning: {issue}");
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_ports() -> Result<()> {
    let ports = list_ports().context("failed to list serial ports")?;
    print_ports(&ports);
    Ok(())
}

fn cmd_detect(filter: &DeviceFilter) -> Result<()> {
    let ports = list_ports().context("failed to list serial ports")?;
    let boards = autodetect(&ports, filter)?;
    print_ports(&boards);
    Ok(())
}

async fn cmd_watch(interval: u64) -> Result<()> {
    if interval == 0 {
        bail!("--interval must be at least 1 second");
    }
    let mut watcher = PortWatcher::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    println!("Watching serial ports (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(ports) = watcher.poll().context("failed to list serial ports")? {
                    println!("--- {} port(s) ---", ports.len());
                    print_ports(ports);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
                return Ok(());
            }
        }
    }
}

fn cmd_convert(action: &ConvertAction) {
    match action {
        ConvertAction::DbmToWatt { dbm } => println!("{dbm} dBm = {} W", dbm_to_watt(*dbm)),
        ConvertAction::WattToDbm { watt } => println!("{watt} W = {} dBm", watt_to_dbm(*watt)),
    }
}

async fn run_device_command(
    session: &mut IscSession,
    command: &Command,
    events: &mut broadcast::Receiver<DeviceEvent>,
) -> Result<()> {
    match command {
        Command::Identity => {
            session.identity().await?;
        }
        Command::Version => {
            session.version().await?;
        }
        Command::Status { verbose: false } => {
            session.status().await?;
        }
        Command::Status { verbose: true } => {
            let lines = session.status_verbose().await?;
            print_log(events);
            if lines.is_empty() {
                println!("No active status lines.");
            }
        }
        Command::ClearErrors => session.clear_errors().await?,
        Command::Freq { action } => match action {
            FreqAction::Get => {
                let mhz = session.frequency().await?;
                print_log(events);
                println!("Frequency: {mhz:.2} MHz");
            }
            FreqAction::Set { mhz } => {
                session.set_frequency(mhz).await?;
            }
        },
        Command::PaPower => {
            session.pa_power().await?;
        }
        Command::Power { action } => match action {
            PowerAction::Get => {
                let value = session.power().await?;
                print_log(events);
                println!("Power setpoint: {value:.2}");
            }
            PowerAction::Set { value } => {
                session.set_power(value).await?;
            }
        },
        Command::Dll { action } => match action {
            DllAction::Configure {
                lower,
                upper,
                start,
                step,
                threshold,
                delay,
            } => {
                session
                    .configure_dll([lower, upper, start, step, threshold, delay].map(String::as_str))
                    .await?;
            }
            DllAction::On => {
                session.set_dll_enabled(true).await?;
            }
            DllAction::Off => {
                session.set_dll_enabled(false).await?;
            }
        },
        Command::Rf { action } => {
            session.set_rf_enabled(matches!(action, Toggle::On)).await?;
        }
        Command::Sweep(args) => {
            let power = match (args.dbm, args.watt) {
                (Some(dbm), _) => SweepPower::Dbm(dbm),
                (None, Some(watt)) => SweepPower::Watt(watt),
                (None, None) => bail!("--dbm or --watt is required"),
            };
            let request = SweepRequest {
                start_mhz: args.start,
                stop_mhz: args.stop,
                step_mhz: args.step,
                power,
            };
            let notation = if args.linear {
                S11Notation::Linear
            } else {
                S11Notation::Logarithmic
            };
            let result = session.sweep(&request).await?;
            print_log(events);
            print_sweep(result, notation);
        }
        Command::Ports | Command::Detect | Command::Watch { .. } | Command::Convert { .. } => {
            unreachable!("handled without a session")
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that do not need the board.
    match &cli.command {
        Command::Ports => return cmd_ports(),
        Command::Detect => return cmd_detect(&device_filter(&cli)),
        Command::Watch { interval } => return cmd_watch(*interval).await,
        Command::Convert { action } => {
            cmd_convert(action);
            return Ok(());
        }
        _ => {}
    }

    let mut session = create_session(&cli).await?;
    let mut events = session.subscribe();

    let result = run_device_command(&mut session, &cli.command, &mut events).await;
    print_log(&mut events);
    session.disconnect().await.ok();
    result
}
