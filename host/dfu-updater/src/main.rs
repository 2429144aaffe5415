// Licensed under the Apache-2.0 license

use anyhow::{bail, Context};
use clap::Parser;
use clap_num::maybe_hex;
use core::time::Duration;
use dfu_updater::config::{SerialConfig, SessionConfig, DEFAULT_BAUD_RATE};
use dfu_updater::image::get_named_region;
use dfu_updater::segment::Segment;
use dfu_updater::serial::SerialTransport;
use dfu_updater::session::DustSession;
use dfu_updater::transport::DustSocket;
use dust_common::protocol::{AckFrequency, LengthCode};
use dust_common::DUST_CRC16_POLYNOMIAL;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Push a firmware image to a device over a DUST serial link", long_about = None)]
struct Cli {
    /// ELF firmware image, or a plain binary with --raw
    image: PathBuf,

    /// Serial port the device is attached to
    port: String,

    #[arg(default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Sections whose name starts with this prefix form the transferred region
    #[arg(long, default_value = ".text")]
    section: String,

    /// Send the whole file instead of an ELF section
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Packets between acknowledgments (1, 8, 16, ..., 512)
    #[arg(long, default_value = "8", value_parser = parse_ack_frequency)]
    ack_frequency: AckFrequency,

    /// Bytes per DATA packet (32, 64, 128 or 256)
    #[arg(long, default_value = "32", value_parser = parse_payload_size)]
    payload_size: LengthCode,

    #[arg(long, value_parser = maybe_hex::<u16>, default_value_t = DUST_CRC16_POLYNOMIAL)]
    polynomial: u16,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 8)]
    max_retries: u32,

    #[arg(long, default_value_t = 3)]
    connect_attempts: u32,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_ack_frequency(s: &str) -> Result<AckFrequency, String> {
    let count: u16 = s.parse().map_err(|e| format!("{}", e))?;
    AckFrequency::from_packet_count(count)
        .ok_or_else(|| format!("{} is not one of 1, 8, 16, 32, 64, 128, 256, 512", count))
}

fn parse_payload_size(s: &str) -> Result<LengthCode, String> {
    let size: usize = s.parse().map_err(|e| format!("{}", e))?;
    LengthCode::from_byte_count(size)
        .ok_or_else(|| format!("{} is not one of 32, 64, 128, 256", size))
}

fn load_segment(cli: &Cli) -> anyhow::Result<Segment> {
    let contents = std::fs::read(&cli.image)
        .with_context(|| format!("failed to read {}", cli.image.display()))?;
    if cli.raw {
        return Ok(Segment::new(&cli.section, &[contents.as_slice()]));
    }
    let chunks = get_named_region(&contents, &cli.section)
        .with_context(|| format!("failed to extract {} from {}", cli.section, cli.image.display()))?;
    for chunk in &chunks {
        info!("Section {}: {} bytes", chunk.name, chunk.data.len());
    }
    Ok(Segment::new(&cli.section, &chunks))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let segment = load_segment(&cli)?;
    if segment.is_empty() {
        bail!("region {} of {} is empty", cli.section, cli.image.display());
    }
    info!(
        "Region {}: {} bytes, {} packets of {} bytes",
        segment.name(),
        segment.size(),
        segment.packet_count(cli.payload_size.byte_count()),
        cli.payload_size.byte_count()
    );

    let serial_config = SerialConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        ..SerialConfig::new(cli.port.as_str(), cli.baud_rate)
    };
    let session_config = SessionConfig {
        ack_frequency: cli.ack_frequency,
        length_code: cli.payload_size,
        max_retries: cli.max_retries,
        connect_attempts: cli.connect_attempts,
        polynomial: cli.polynomial,
    };

    let socket = SerialTransport
        .open_with(&serial_config)
        .with_context(|| format!("failed to open {}", serial_config.port))?;
    let mut session = DustSession::new(socket, session_config);
    let result = session.run(&segment);
    session.into_socket().disconnect();
    result.context("firmware update failed")?;

    info!("Firmware update complete");
    Ok(())
}
