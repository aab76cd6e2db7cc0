//! doorlock - door lock firmware runner
//!
//! Runs the firmware against simulated peripherals. Standard input and
//! standard output are the serial link to the host, so the binary can sit
//! behind a pipe or a pseudo-terminal; logs go to standard error.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use doorlock_core::SlotId;
use doorlock_firmware::{FirmwareBuilder, FirmwareConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod board;

/// doorlock - door lock firmware runner
#[derive(Parser, Debug)]
#[command(name = "doorlock")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Identification cooldown in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Longest accepted inbound line in bytes
    #[arg(long)]
    max_line_length: Option<usize>,

    /// Pre-enroll a simulated finger in this slot (repeatable)
    #[arg(long = "enrolled", value_name = "SLOT")]
    enrolled: Vec<SlotId>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

impl Cli {
    fn load_config(&self) -> Result<FirmwareConfig> {
        let mut config = match &self.config {
            Some(path) => FirmwareConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => FirmwareConfig::default(),
        };

        if let Some(ms) = self.cooldown_ms {
            config.timing.cooldown_ms = ms;
        }
        if let Some(limit) = self.max_line_length {
            config.serial.max_line_length = limit;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    if cli.dump_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    init_tracing(cli.log_level.as_deref());
    info!(version = doorlock_firmware::VERSION, "doorlock starting");

    let (devices, handles) = board::simulated(&config);
    for slot in &cli.enrolled {
        handles.seed_template(*slot);
        info!(slot, "simulated template stored");
    }

    let firmware = FirmwareBuilder::new(config)
        .keypad(devices.keypad)
        .display(devices.display)
        .fingerprint_sensor(devices.sensor)
        .card_reader(devices.reader)
        .relay(devices.relay)
        .buzzer(devices.buzzer)
        .light(devices.light)
        .serial(tokio::io::stdin(), tokio::io::stdout())
        .build()
        .context("Failed to assemble firmware")?;

    let mut units = firmware.spawn();

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for interrupt")?;
            info!("interrupt received, shutting down");
        }
        exited = units.wait_any() => {
            if let Some((unit, termination)) = exited {
                warn!(%unit, ?termination, "unit exited, shutting down");
            }
        }
    }

    let report = units.shutdown().await;
    drop(handles);

    if !report.is_clean() {
        bail!(
            "firmware stopped with {} failed and {} panicked units",
            report.failed,
            report.panicked
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["doorlock"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config, FirmwareConfig::default());
        assert!(cli.enrolled.is_empty());
        assert!(!cli.dump_config);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "doorlock",
            "--cooldown-ms",
            "250",
            "--max-line-length",
            "128",
            "--enrolled",
            "3",
            "--enrolled",
            "9",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.timing.cooldown_ms, 250);
        assert_eq!(config.serial.max_line_length, 128);
        assert_eq!(cli.enrolled, vec![3, 9]);
    }

    #[test]
    fn test_cli_rejects_missing_config_file() {
        let cli = Cli::parse_from(["doorlock", "--config", "/nonexistent/doorlock.toml"]);
        assert!(cli.load_config().is_err());
    }
}
