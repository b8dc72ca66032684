use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cec_bridge::{
    BridgeConfig, CecBridge, Event, EventIterator, LoggingMode, LogicalAddress, PhysicalAddress,
    RemoteButton,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

/// HDMI-CEC bridge
///
/// Drives cec-client (or a TCP peer speaking its line protocol), prints what
/// happens on the CEC bus and sends commands to devices.
#[derive(Parser, Debug)]
#[command(name = "cec-bridge")]
#[command(about = "Monitor and control HDMI-CEC devices through cec-client")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (camelCase keys, e.g. cecClientPath, comPort)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the cec-client executable
    #[arg(long)]
    pub cec_client: Option<String>,

    /// Adapter port passed to cec-client
    #[arg(short = 'p', long)]
    pub com_port: Option<String>,

    /// Connect to HOST:PORT instead of spawning cec-client
    #[arg(long)]
    pub connect: Option<String>,

    /// Reconnect with backoff when the connection fails
    #[arg(long)]
    pub reconnect: bool,

    /// How long to wait for cec-client to open the adapter, in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Log output: silent, development or debug
    #[arg(long, default_value = "development")]
    pub log_mode: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print bus events until Ctrl+C
    Monitor {
        /// One JSON object per event
        #[arg(long)]
        json: bool,
    },
    /// Scan the bus and print the device inventory
    Scan {
        #[arg(long)]
        json: bool,
    },
    /// Send a raw cec-client command line
    Send { text: String },
    /// Power a device on or put it in standby
    Power {
        index: LogicalAddress,
        #[arg(value_enum)]
        state: PowerState,
    },
    /// Announce a device as the active source, or withdraw it
    ActiveSource {
        index: LogicalAddress,
        address: PhysicalAddress,
        #[arg(long)]
        off: bool,
    },
    /// Press and release a remote-control key, e.g. volume_up
    Key {
        index: LogicalAddress,
        button: RemoteButton,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Standby,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mode = LoggingMode::from_name(&args.log_mode)
        .with_context(|| format!("unknown log mode {:?}", args.log_mode))?;
    cec_bridge::init_logging(mode).context("failed to initialize logging")?;

    let config = build_config(&args)?;
    let bridge = CecBridge::new(config).context("invalid bridge configuration")?;
    let events = bridge.subscribe();
    bridge.start().context("failed to start the bridge")?;

    let outcome = run(&bridge, &events, &args);
    if let Err(e) = bridge.stop() {
        warn!("Stopping the bridge failed: {}", e);
    }
    outcome
}

fn run(bridge: &CecBridge, events: &EventIterator, args: &Args) -> Result<()> {
    wait_for_connection(events, Duration::from_secs(args.connect_timeout));

    match &args.command {
        Command::Monitor { json } => monitor(bridge, events, *json),
        Command::Scan { json } => scan(bridge, *json),
        Command::Send { text } => Ok(bridge.send(text)?),
        Command::Power { index, state } => {
            let equipment = bridge.add_equipment(*index, PhysicalAddress::default());
            Ok(equipment.set_power(*state == PowerState::On)?)
        }
        Command::ActiveSource {
            index,
            address,
            off,
        } => {
            let equipment = bridge.add_equipment(*index, *address);
            Ok(equipment.set_active_source(!off)?)
        }
        Command::Key { index, button } => {
            let equipment = bridge.add_equipment(*index, PhysicalAddress::default());
            Ok(equipment.press_remote_button(*button)?)
        }
    }
}

/// Build the configuration: file first, then command-line overrides.
fn build_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            BridgeConfig::from_json_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => BridgeConfig::new(),
    };

    if let Some(path) = &args.cec_client {
        config = config.with_cec_client_path(path.clone());
    }
    if let Some(port) = &args.com_port {
        config = config.with_com_port(port.clone());
    }
    if let Some(peer) = &args.connect {
        let (host, port) = parse_peer(peer)?;
        config = config.with_socket(host, port);
    }
    if args.reconnect {
        config = config.with_reconnect(true);
    }
    Ok(config)
}

fn parse_peer(peer: &str) -> Result<(String, u16)> {
    let Some((host, port)) = peer.rsplit_once(':') else {
        bail!("expected HOST:PORT, got {peer:?}");
    };
    if host.is_empty() {
        bail!("missing host in {peer:?}");
    }
    let port = port
        .parse()
        .with_context(|| format!("invalid port in {peer:?}"))?;
    Ok((host.to_string(), port))
}

/// Wait for cec-client to report the adapter open; carry on regardless.
fn wait_for_connection(events: &EventIterator, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Some(Event::ConnectionStatus { online: true, .. }) => {
                info!("CEC adapter connected");
                return;
            }
            Some(_) => continue,
            None => break,
        }
    }
    warn!("No connection confirmation within {:?}; continuing", timeout);
}

fn monitor(bridge: &CecBridge, events: &EventIterator, json: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    info!("Monitoring (Ctrl+C to quit)");
    while running.load(Ordering::SeqCst) {
        let Some(event) = events.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{}", describe(&event));
        }
        if matches!(event, Event::ConnectionStatus { online: false, .. })
            && !bridge.config().reconnect
        {
            bail!("connection lost");
        }
    }
    Ok(())
}

fn scan(bridge: &CecBridge, json: bool) -> Result<()> {
    let scan = bridge.discover()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
        return Ok(());
    }

    if scan.timed_out {
        warn!("Scan timed out; the inventory may be incomplete");
    }
    println!("{:<3} {:<8} {:<16} {:<14} {:<8} ACTIVE", "#", "ADDRESS", "NAME", "VENDOR", "POWER");
    for device in &scan.devices {
        println!(
            "{:<3} {:<8} {:<16} {:<14} {:<8} {}",
            device.index,
            device.address,
            device.osd_name,
            device.vendor,
            if device.powered_on { "on" } else { "standby" },
            if device.active_source { "yes" } else { "no" },
        );
    }
    Ok(())
}

fn describe(event: &Event) -> String {
    let device = event
        .device()
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    match event {
        Event::PowerOn { .. } => format!("[{device}] power on"),
        Event::PowerOff { .. } => format!("[{device}] standby"),
        Event::ActiveSourceOn { .. } => format!("[{device}] active source"),
        Event::ActiveSourceOff { .. } => format!("[{device}] inactive source"),
        Event::Raw { text, .. } => format!("[{device}] {text}"),
        Event::ConnectionStatus { online, reason } => {
            format!("[bridge] {} ({reason})", if *online { "online" } else { "offline" })
        }
    }
}
