//! Bus monitor - prints every CEC event and the device inventory
//!
//! Starts cec-client, scans the bus once, registers every device found as
//! equipment and then prints events until Ctrl+C.
//!
//! Run with: cargo run -p hdmi-cec-bridge --example monitor -- [COM_PORT]
//!
//! Set `CEC_BRIDGE_LOG_MODE=development` for bridge logs on stderr.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cec_bridge::{BridgeConfig, CecBridge, Event};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    cec_bridge::init_logging_from_env()?;

    let mut config = BridgeConfig::new();
    if let Some(port) = std::env::args().nth(1) {
        config = config.with_com_port(port);
    }

    println!("=== HDMI-CEC Bus Monitor ===\n");
    let bridge = CecBridge::new(config)?;
    let events = bridge.subscribe();
    bridge.start()?;
    println!("Started {}", bridge.config().cec_client_path);

    println!("\nScanning the bus...");
    let scan = bridge.discover()?;
    if scan.timed_out {
        println!("Scan timed out; showing what arrived");
    }
    for device in &scan.devices {
        println!(
            "  #{} {:<16} {:<10} {:<12} power={} active={}",
            device.index,
            device.osd_name,
            device.address,
            device.vendor,
            if device.powered_on { "on" } else { "standby" },
            device.active_source,
        );
        if let Err(e) = bridge.add_discovered(device) {
            println!("    skipped: {e}");
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    println!("\nWaiting for events (Ctrl+C to quit)...\n");
    while running.load(Ordering::SeqCst) {
        let Some(event) = events.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        match &event {
            Event::ConnectionStatus { online, reason } => {
                println!("[status] online={online} ({reason})");
            }
            Event::Raw { device, text } => {
                let device = device.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                println!("[{device}] {text}");
            }
            other => println!("[{}] {}", other.device().map(|d| d.to_string()).unwrap_or_default(), other.kind()),
        }
    }

    println!("\nShutting down...");
    for equipment in bridge.equipment_list() {
        let snapshot = equipment.snapshot();
        println!(
            "  #{} power={:?} active={:?}",
            snapshot.index, snapshot.power, snapshot.active_source
        );
    }
    bridge.stop()?;
    Ok(())
}
