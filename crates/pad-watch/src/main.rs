#![deny(static_mut_refs)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openpad_driver::ControllerDriver;
use openpad_hid_sixaxis_protocol::{SONY_VENDOR_ID, SixaxisReport, product_ids};
use openpad_usb_host::mock::MockHostBus;
use openpad_usb_host::{BusEvent, DeviceDescriptor, UsbHostBus, descriptor_types};

/// Watch decoded SIXAXIS controller state through the OpenPad driver.
#[derive(Parser)]
#[command(
    name = "pad-watch",
    about = "SIXAXIS controller state watcher for the OpenPad driver stack"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated controller session and print decoded reports
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "100")]
        interval_ms: u64,
        /// Number of polling ticks to run (0 = run until interrupted)
        #[arg(long, default_value = "100")]
        ticks: u64,
        /// Block until the controller reaches ready before polling
        #[arg(long)]
        wait: bool,
    },
    /// Watch a real controller over USB (requires the `usb` feature)
    #[cfg(feature = "usb")]
    Live {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "10")]
        interval_ms: u64,
        /// Number of polling ticks to run (0 = run until interrupted)
        #[arg(long, default_value = "0")]
        ticks: u64,
        /// Block until the controller reaches ready before polling
        #[arg(long)]
        wait: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch {
            interval_ms,
            ticks,
            wait,
        } => watch_simulated(Duration::from_millis(interval_ms), ticks, wait),
        #[cfg(feature = "usb")]
        Commands::Live {
            interval_ms,
            ticks,
            wait,
        } => watch_live(Duration::from_millis(interval_ms), ticks, wait),
    }
}

const CLASS_HID: u8 = 0x03;

/// Configuration descriptor matching the pad's real layout: one HID
/// interface with an interrupt OUT/IN endpoint pair.
fn sixaxis_config() -> Vec<u8> {
    let mut buf = vec![0x09, descriptor_types::CONFIGURATION, 41, 0, 0x01, 0x01, 0x00, 0x80, 0x32];
    buf.extend_from_slice(&[0x09, descriptor_types::INTERFACE, 0, 0, 0x02, CLASS_HID, 0x00, 0x00, 0x00]);
    buf.extend_from_slice(&[0x09, descriptor_types::HID, 0x11, 0x01, 0x00, 0x01, 0x22, 0x94, 0x00]);
    buf.extend_from_slice(&[0x07, descriptor_types::ENDPOINT, 0x02, 0x03, 64, 0, 0x0A]);
    buf.extend_from_slice(&[0x07, descriptor_types::ENDPOINT, 0x81, 0x03, 64, 0, 0x0A]);
    buf
}

fn simulated_bus() -> MockHostBus {
    let mut bus = MockHostBus::new();
    bus.set_config_descriptor(sixaxis_config());
    bus.set_device_descriptor(DeviceDescriptor {
        vendor_id: SONY_VENDOR_ID,
        product_id: product_ids::SIXAXIS,
        device_class: 0x00,
        max_packet_size_0: 64,
    });
    bus.set_control_response(vec![0u8; 17]);
    bus.push_event(BusEvent::Attached { address: 1 });
    bus
}

/// Synthetic input report with the left stick sweeping across its range
/// and a cross press every sixteenth tick.
fn wobble_report(tick: u64) -> Vec<u8> {
    let sweep = (tick % 256) as u8;
    let mut data = vec![0u8; 48];
    data[0] = 0x01;
    data[6] = sweep;
    data[7] = 255 - sweep;
    data[8] = 128;
    data[9] = 128;
    if tick % 16 == 0 {
        data[3] |= 0x40;
        data[24] = 0xFF;
    }
    data
}

fn watch_simulated(interval: Duration, ticks: u64, wait: bool) -> Result<()> {
    let mut driver = ControllerDriver::new(simulated_bus());
    driver.initialize().context("host transport init failed")?;

    if wait {
        wait_for_ready(&mut driver, interval)?;
    }

    let mut tick = 0u64;
    while ticks == 0 || tick < ticks {
        if driver.is_ready() {
            driver.bus_mut().queue_report(wobble_report(tick));
        }
        driver.tick()?;
        if let Some(report) = driver.current_report() {
            print_report(tick, &report);
        }
        std::thread::sleep(interval);
        tick += 1;
    }
    Ok(())
}

#[cfg(feature = "usb")]
fn watch_live(interval: Duration, ticks: u64, wait: bool) -> Result<()> {
    use openpad_usb_host::rusb_backend::RusbHostBus;

    let bus = RusbHostBus::new(SONY_VENDOR_ID, product_ids::SIXAXIS)
        .context("libusb context init failed")?;
    let mut driver = ControllerDriver::new(bus);
    driver.initialize().context("host transport init failed")?;

    println!(
        "Watching VID=0x{SONY_VENDOR_ID:04X} PID=0x{:04X}...",
        product_ids::SIXAXIS
    );
    if wait {
        wait_for_ready(&mut driver, interval)?;
    }

    let mut tick = 0u64;
    while ticks == 0 || tick < ticks {
        driver.tick()?;
        if let Some(report) = driver.current_report() {
            print_report(tick, &report);
        }
        std::thread::sleep(interval);
        tick += 1;
    }
    Ok(())
}

fn wait_for_ready<B: UsbHostBus>(
    driver: &mut ControllerDriver<B>,
    interval: Duration,
) -> Result<()> {
    while !driver.is_ready() {
        driver.tick()?;
        std::thread::sleep(interval);
    }
    println!("controller ready");
    Ok(())
}

fn print_report(tick: u64, report: &SixaxisReport) {
    println!(
        "[{tick:>5}] L=({:>3},{:>3}) R=({:>3},{:>3}) ps={} buttons=[{}]",
        report.left_stick.x,
        report.left_stick.y,
        report.right_stick.x,
        report.right_stick.y,
        u8::from(report.ps),
        pressed_buttons(report),
    );
}

fn pressed_buttons(report: &SixaxisReport) -> String {
    let b = &report.buttons;
    let named = [
        (b.select, "select"),
        (b.start, "start"),
        (b.up, "up"),
        (b.right, "right"),
        (b.down, "down"),
        (b.left, "left"),
        (b.l1, "l1"),
        (b.l2, "l2"),
        (b.r1, "r1"),
        (b.r2, "r2"),
        (b.triangle, "triangle"),
        (b.circle, "circle"),
        (b.cross, "cross"),
        (b.square, "square"),
        (b.left_stick, "l3"),
        (b.right_stick, "r3"),
    ];
    let pressed: Vec<&str> = named
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
    pressed.join(" ")
}
